use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: i64,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Note {
    /// The day part of `updated_at`, for card footers.
    pub fn updated_day(&self) -> &str {
        self.updated_at
            .split_once(' ')
            .map_or(self.updated_at.as_str(), |(day, _)| day)
    }
}

/// Trims new note content and rejects it if nothing is left.
pub fn validate_content(content: &str) -> Result<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::InvalidInput("note content is empty".to_string()));
    }
    Ok(content)
}
