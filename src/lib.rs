//! feedmark: periodic feed polling with durable per-feed watermarks.
//!
//! Each tick fetches every configured feed, parses the document, works out
//! which entries are newer than the last one printed, emits them oldest
//! first and records the newest emitted id so nothing is repeated or lost
//! across restarts.
//!
//! # Pipeline
//!
//! ```text
//! tick ─► Scheduler ─► Coordinator::run_cycle (one task per feed)
//!                          │  FetchEvent stream
//!                          ▼
//!                    TransferAccumulator ─► parser ─► diff ─► Sink
//!                                                      │
//!                                                      ▼
//!                                                 watermarks
//! ```

pub mod config;
pub mod feed;
pub mod poller;
pub mod storage;
pub mod util;
