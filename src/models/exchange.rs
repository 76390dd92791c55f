//! Persisted question/answer exchanges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed query and the answer that was returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub query: String,
    pub response: String,
    /// Location used by the last weather lookup, if any
    pub city: Option<String>,
    /// Date (`YYYY-MM-DD`) used by the last weather lookup, if any
    pub date: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Exchange {
    /// Create an exchange stamped with the current time
    pub fn new<Q: Into<String>, R: Into<String>>(query: Q, response: R) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
            city: None,
            date: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_lookup(mut self, city: Option<String>, date: Option<String>) -> Self {
        self.city = city;
        self.date = date;
        self
    }
}
