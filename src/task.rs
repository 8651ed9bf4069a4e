use crate::error::{Error, Result};
use crate::expiry;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub start: String, // HH:MM
    pub end: String,   // HH:MM, empty or malformed never expires
    pub description: String,
    pub completed: bool,
    pub date: Option<String>, // creation day, absent in older images
    pub created_at: String,
}

impl Task {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        expiry::is_expired(&self.end, self.date.as_deref(), now)
    }
}

/// Raw user input for a new task, before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub start: String,
    pub end: String,
    pub description: String,
}

/// A validated task ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub start: String,
    pub end: String,
    pub description: String,
    pub date: String,
}

impl TaskDraft {
    /// Trims the input and fills in the blanks: start defaults to the current
    /// time, end to `default_end`, and the date is today.
    pub fn resolve(&self, now: NaiveDateTime, default_end: &str) -> Result<NewTask> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("task title is required".to_string()));
        }
        let start = match self.start.trim() {
            "" => now.format(TIME_FORMAT).to_string(),
            s => s.to_string(),
        };
        let end = match self.end.trim() {
            "" => default_end.to_string(),
            s => s.to_string(),
        };
        Ok(NewTask {
            title: title.to_string(),
            start,
            end,
            description: self.description.trim().to_string(),
            date: now.format(DATE_FORMAT).to_string(),
        })
    }
}
