//! Personal planner: time-boxed tasks, notes and long-term targets.
//!
//! Tasks and notes live in an in-memory SQLite database whose image is
//! written to a key-value store after every change; targets are kept as a
//! JSON list beside it. A task is active until the clock passes its end time
//! on the day it was created, after which it shows up in history.

pub mod config;
pub mod error;
pub mod expiry;
pub mod goal;
pub mod kv;
pub mod logging;
pub mod note;
pub mod planner;
pub mod store;
pub mod task;
pub mod ui;

pub use error::{Error, Result};
