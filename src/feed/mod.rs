//! Feed retrieval and interpretation.
//!
//! - [`fetcher`] - non-blocking fetches delivered as an ordered event channel
//! - [`accumulator`] - reassembles chunked transfers per feed
//! - [`parser`] - tolerant RSS/Atom parsing via `feed-rs`
//! - [`diff`] - selects entries newer than a feed's watermark

pub mod accumulator;
pub mod diff;
pub mod fetcher;
pub mod parser;

pub use accumulator::TransferAccumulator;
pub use diff::{diff, NewEntries};
pub use fetcher::{FetchError, FetchEvent, FetchStatus, Fetcher, HttpFetcher};
pub use parser::{chronological, parse_entries, Entry};
