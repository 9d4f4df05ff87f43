#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for bucket client operations.
///
/// Use this target for logging individual list, copy, delete, get and put calls.
pub const TRACING_TARGET_CLIENT: &str = "sluice_object::client";

/// Tracing target for bulk transfer walks.
///
/// Use this target for logging walk progress, pagination, and rejected requests.
pub const TRACING_TARGET_TRANSFER: &str = "sluice_object::transfer";

pub mod client;
/// Backend trait and bucket store providers.
pub mod providers;
/// Paginated bulk copy/delete over a bucket prefix.
pub mod transfer;
/// Shared types (Error, ObjectLocation, ListingPage).
pub mod types;

#[doc(hidden)]
pub mod prelude;

pub use client::ObjectClient;
pub use types::{Error, Result};
