use std::sync::{Arc, Mutex, MutexGuard};

use crate::feed::{
    chronological, diff, parse_entries, FetchError, FetchStatus, Fetcher, TransferAccumulator,
};
use crate::storage::{Database, Feed};

use super::sink::{entry_line, error_line, Sink};

/// How one cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The document was processed. `emitted` may be zero.
    Completed {
        emitted: usize,
        watermark: Option<String>,
    },
    /// The cycle failed; the error line has already been emitted.
    Failed(FetchError),
}

impl CycleOutcome {
    pub fn emitted(&self) -> usize {
        match self {
            Self::Completed { emitted, .. } => *emitted,
            Self::Failed(_) => 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Runs fetch → accumulate → parse → diff → emit → persist for one feed.
///
/// Every failure stops at this boundary: it is reported on the sink with
/// the feed's name and turned into [`CycleOutcome::Failed`], never
/// propagated to the scheduler or to other feeds.
pub struct Coordinator {
    db: Database,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn Sink>,
    transfers: Mutex<TransferAccumulator>,
}

impl Coordinator {
    pub fn new(db: Database, fetcher: Arc<dyn Fetcher>, sink: Arc<dyn Sink>) -> Self {
        Self {
            db,
            fetcher,
            sink,
            transfers: Mutex::new(TransferAccumulator::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Fetch `feed` and process the result.
    ///
    /// Suspends only while waiting for fetch events; everything after the
    /// document is complete runs straight through.
    pub async fn run_cycle(&self, feed: &Feed) -> CycleOutcome {
        let Some(url) = feed.url.as_deref() else {
            return self.report(FetchError::MissingUrl {
                feed: feed.name.clone(),
            });
        };

        tracing::debug!(feed = %feed.name, url = %url, "Starting cycle");
        let mut events = self.fetcher.start_fetch(url);

        while let Some(event) = events.recv().await {
            if let Some(outcome) = self
                .on_fetch_event(&feed.name, &event.chunk, event.status)
                .await
            {
                return outcome;
            }
        }

        // The fetch went away without a terminal status
        if self.transfers().discard(&feed.name) {
            tracing::debug!(feed = %feed.name, "Discarded buffer of abandoned fetch");
        }
        self.report(FetchError::Transfer {
            feed: feed.name.clone(),
        })
    }

    /// Handle one chunk/status pair for `feed`.
    ///
    /// Returns `None` while the transfer is in progress and the cycle's
    /// outcome once `status` is terminal.
    pub async fn on_fetch_event(
        &self,
        feed: &str,
        chunk: &[u8],
        status: FetchStatus,
    ) -> Option<CycleOutcome> {
        let accumulated = self.transfers().accumulate(feed, chunk, status);

        match accumulated {
            Ok(None) => None,
            Ok(Some(document)) => Some(match self.process_document(feed, &document).await {
                Ok(outcome) => outcome,
                Err(e) => self.report(e),
            }),
            Err(e) => Some(self.report(e)),
        }
    }

    /// Emit the entries of `document` newer than the stored watermark, then
    /// advance the watermark to the last one emitted.
    ///
    /// Lines are emitted before the watermark is written: if that write
    /// fails the same entries come out again next cycle rather than being
    /// lost.
    async fn process_document(&self, feed: &str, document: &[u8]) -> Result<CycleOutcome, FetchError> {
        let entries = chronological(parse_entries(document));

        let current = self
            .db
            .get_watermark(feed)
            .await
            .map_err(|e| storage_error(feed, e))?;

        let new = diff(&entries, current.as_deref());
        for entry in new.entries {
            self.sink.emit(&entry_line(feed, entry));
        }

        if new.advanced() {
            if let Some(id) = new.watermark {
                self.db
                    .set_watermark(feed, id)
                    .await
                    .map_err(|e| storage_error(feed, e))?;
            }
        }

        tracing::debug!(
            feed = %feed,
            parsed = entries.len(),
            emitted = new.entries.len(),
            "Cycle complete"
        );

        Ok(CycleOutcome::Completed {
            emitted: new.entries.len(),
            watermark: new.watermark.map(str::to_string),
        })
    }

    /// Print `err` for the operator and wrap it as a failed outcome.
    pub(crate) fn report(&self, err: FetchError) -> CycleOutcome {
        match &err {
            FetchError::Storage { feed, reason } => {
                tracing::warn!(feed = %feed, reason = %reason, "Cycle failed");
            }
            other => tracing::warn!(feed = %other.feed(), error = %other, "Cycle failed"),
        }
        self.sink.emit(&error_line(&err));
        CycleOutcome::Failed(err)
    }

    fn transfers(&self) -> MutexGuard<'_, TransferAccumulator> {
        self.transfers.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn buffered_transfers(&self) -> usize {
        self.transfers().in_flight()
    }
}

fn storage_error(feed: &str, err: anyhow::Error) -> FetchError {
    FetchError::Storage {
        feed: feed.to_string(),
        reason: format!("{err:#}"),
    }
}
