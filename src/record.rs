use std::fmt;

use serde::{Deserialize, Serialize};

/// A scraped field: either the value read from the page, or the marker for
/// "we tried and could not read it".
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<T> {
    Value(T),
    Unavailable,
}

impl<T> Extracted<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Extracted::Value(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Extracted::Value(v) => Some(v),
            Extracted::Unavailable => None,
        }
    }
}

impl<T: Default> Extracted<T> {
    pub fn unwrap_or_default(self) -> T {
        self.into_option().unwrap_or_default()
    }
}

impl<T, E> From<Result<T, E>> for Extracted<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Extracted::Value(v),
            Err(_) => Extracted::Unavailable,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Extracted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extracted::Value(v) => v.fmt(f),
            Extracted::Unavailable => f.write_str("N/A"),
        }
    }
}

/// A company as written to the CSV file, stored in the database and shown by
/// the `companies` commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub company_name: String,
    pub ebitda_source: Option<String>,
    pub cif_source: Option<String>,
    pub cif: String,
    pub ebitda: Option<f64>,
}
