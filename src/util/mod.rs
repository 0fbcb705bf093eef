//! Utility functions for common operations.
//!
//! - **URL validation**: scheme and private-network checks for feed URLs
//! - **Text processing**: character-limit truncation, control-char stripping
//!   and markdown escaping for outgoing chat messages

mod text;
mod url_validator;

pub use text::{escape_markdown, strip_control_chars, truncate_chars};
pub use url_validator::{validate_feed_url, UrlValidationError};
