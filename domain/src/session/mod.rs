//! Generation sessions.
//!
//! - [`configuration::SessionConfiguration`]: value-equality cache key
//! - [`stream::SessionEvent`]: events streamed while a reply is produced

pub mod configuration;
pub mod stream;
