//! Reviews: findings raised by review roles and how they are parsed.

pub mod entities;
pub mod parsing;

pub use entities::{Finding, NO_PROGRESS_SENTINEL, Review, ReviewStatus, Severity};
pub use parsing::{OutputParseError, normalize_relative, parse_review_response, parse_touched_files};
