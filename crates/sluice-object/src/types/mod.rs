//! Types shared by the client, the providers and the transfer walker.

mod error;
mod listing;
mod location;

pub use error::{Error, Result};
pub use listing::{ListRequest, ListingPage};
pub use location::ObjectLocation;
