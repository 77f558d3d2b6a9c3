//! Lead acknowledgement: reconciles sales leads, sends a one-time
//! acknowledgement email and flags overdue follow-ups.

pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod personalize;
pub mod pipeline;
pub mod store;
