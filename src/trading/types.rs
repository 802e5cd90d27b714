//! Trading API response types.

use serde::{Deserialize, Serialize};

/// Account balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Available balance in cents
    pub balance: i64,
    /// Portfolio value in cents, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_value: Option<i64>,
}

/// Paging parameters shared by portfolio listings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageRequest {
    /// Maximum number of entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Cursor returned by the previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}
