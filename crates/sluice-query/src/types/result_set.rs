use serde::{Deserialize, Serialize};

/// Rows returned for a finished query, all pages concatenated.
///
/// For `SELECT` statements the service sends the column names as the first
/// row; [`ResultSet::data_rows`] skips it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    /// Wrap rows in service order.
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Column names, if the service sent any rows.
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Rows after the header row.
    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or_default()
    }

    /// Whether the set has no data rows.
    pub fn is_empty(&self) -> bool {
        self.data_rows().is_empty()
    }
}
