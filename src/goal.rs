//! Long-term goals ("targets").
//!
//! Goals never touch the database. The whole list is written as JSON under
//! [`GOALS_KEY`] whenever a goal is added or removed.

use crate::error::{Error, Result};
use crate::kv::KeyValueStore;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::{info, warn};

pub const GOALS_KEY: &str = "medsync_goals";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Remaining { days: i64, hours: i64 },
    Accomplished,
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remaining { days, hours } => write!(f, "{days}d {hours}h LEFT"),
            Self::Accomplished => write!(f, "STATUS: ACCOMPLISHED"),
        }
    }
}

impl Goal {
    /// A goal running from `now` until 23:59:59 local time on `day`.
    pub fn new(title: &str, day: NaiveDate, now: DateTime<Utc>) -> Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("goal title is required".to_string()));
        }
        let end_local = day
            .and_hms_opt(23, 59, 59)
            .and_then(|end| Local.from_local_datetime(&end).earliest())
            .ok_or_else(|| Error::InvalidInput(format!("no local end of day for {day}")))?;
        Ok(Self {
            title: title.to_string(),
            start_date: now,
            end_date: end_local.with_timezone(&Utc),
        })
    }

    /// Share of the goal's span already elapsed, clamped to `0.0..=100.0`.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if now >= self.end_date {
            return 100.0;
        }
        let total = (self.end_date - self.start_date).num_milliseconds();
        if total <= 0 {
            return 100.0;
        }
        let elapsed = (now - self.start_date).num_milliseconds();
        (elapsed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn countdown(&self, now: DateTime<Utc>) -> Countdown {
        let left = self.end_date - now;
        if left.num_milliseconds() <= 0 {
            return Countdown::Accomplished;
        }
        Countdown::Remaining {
            days: left.num_days(),
            hours: left.num_hours() % 24,
        }
    }
}

pub struct GoalBook {
    goals: Vec<Goal>,
    kv: Rc<dyn KeyValueStore>,
}

impl std::fmt::Debug for GoalBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoalBook").field("goals", &self.goals).finish_non_exhaustive()
    }
}

impl GoalBook {
    /// Loads the saved goal list. A value that does not parse is logged and
    /// treated as no goals; it is overwritten on the next change.
    pub fn load(kv: Rc<dyn KeyValueStore>) -> Result<Self> {
        let goals = match kv.get(GOALS_KEY)? {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|err| {
                warn!(%err, "discarding unreadable goal list");
                Vec::new()
            }),
            None => Vec::new(),
        };
        Ok(Self { goals, kv })
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn add(&mut self, goal: Goal) -> Result<()> {
        info!(title = %goal.title, end = %goal.end_date, "added goal");
        self.goals.push(goal);
        self.save()
    }

    pub fn remove(&mut self, index: usize) -> Result<Goal> {
        if index >= self.goals.len() {
            return Err(Error::UnknownGoal(index));
        }
        let goal = self.goals.remove(index);
        self.save()?;
        info!(title = %goal.title, "removed goal");
        Ok(goal)
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string(&self.goals)?;
        self.kv.set(GOALS_KEY, &json)
    }
}
