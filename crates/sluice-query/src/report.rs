//! Shaping raw result rows into a per-category count report.
//!
//! Result files carry one header row, then rows whose column 1 is a category
//! (e.g. a client version) and column 2 an integer count. The report is
//! written as:
//!
//! ```json
//! { "versions": { "v1": 3, "v2": 5 }, "count": 8 }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const CATEGORY_COLUMN: usize = 1;
const COUNT_COLUMN: usize = 2;

/// Per-category counts plus their total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReport {
    /// Count per category; repeated categories are summed.
    pub versions: BTreeMap<String, u64>,
    /// Sum of all counts.
    pub count: u64,
}

impl VersionReport {
    /// Add `count` to `category`.
    ///
    /// A repeated category accumulates rather than replacing its earlier
    /// count, so `count` always equals the sum of `versions`.
    pub fn add(&mut self, category: impl Into<String>, count: u64) {
        *self.versions.entry(category.into()).or_default() += count;
        self.count += count;
    }
}

/// Aggregate header-less rows into a [`VersionReport`].
///
/// # Errors
///
/// Returns [`Error::MalformedRow`] naming the first row (counted from 1) that
/// has fewer than three columns or a count that is not a non-negative
/// integer.
pub fn construct_report<I, R, S>(rows: I) -> Result<VersionReport>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let mut report = VersionReport::default();

    for (index, row) in rows.into_iter().enumerate() {
        let row = row.as_ref();
        let number = index + 1;

        let (Some(category), Some(count)) = (row.get(CATEGORY_COLUMN), row.get(COUNT_COLUMN))
        else {
            return Err(Error::malformed_row(
                number,
                format!("expected at least 3 columns, found {}", row.len()),
            ));
        };

        let count = count.as_ref().trim();
        let count = count
            .parse::<u64>()
            .map_err(|_| Error::malformed_row(number, format!("count '{count}' is not an integer")))?;

        report.add(category.as_ref(), count);
    }

    Ok(report)
}

/// Read a result CSV, skipping its header row.
///
/// Rows may have differing column counts; shape checks are left to
/// [`construct_report`].
///
/// # Errors
///
/// Returns [`Error::Csv`] if the data is not valid CSV.
pub fn parse_result_csv(data: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
