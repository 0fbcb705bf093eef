//! Feed retrieval and parsing.
//!
//! - [`fetcher`] downloads a feed body with a timeout and a size cap
//! - [`parser`] turns a JSON or CSV body into [`Record`]s keyed by the
//!   configured identifier field
//!
//! # Example
//!
//! ```ignore
//! let bytes = fetch_feed(&client, &feed.url, timeout).await?;
//! let ParseResult { records, skipped } = parse_records(&bytes, &feed)?;
//! ```

mod fetcher;
mod parser;

pub use fetcher::{fetch_feed, FetchError, MAX_FEED_SIZE};
pub use parser::{parse_records, ParseError, ParseResult, Record};
