//! Utility functions for timestamp handling.

pub mod timestamps;

pub use timestamps::{
    format_log_timestamp, now_utc, parse_log_timestamp, Timestamp, TimestampError,
};
