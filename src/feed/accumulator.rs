use std::collections::HashMap;

use super::fetcher::{FetchError, FetchStatus};

/// Per-feed reassembly buffers for in-flight transfers.
///
/// Chunks arrive tagged [`FetchStatus::InProgress`] and are appended to the
/// buffer for their feed. The terminal status either hands back the whole
/// document or turns into a [`FetchError`]; both paths drop the buffer so a
/// failed feed cannot grow it across retries.
///
/// Buffers are keyed by lowercase feed name, matching the case-insensitive
/// feed identity used everywhere else.
#[derive(Debug, Default)]
pub struct TransferAccumulator {
    buffers: HashMap<String, Vec<u8>>,
}

impl TransferAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk/status pair for `feed`.
    ///
    /// # Returns
    ///
    /// - `Ok(None)` while the transfer is still in progress
    /// - `Ok(Some(document))` on success, the concatenation of every chunk
    ///   including the one passed with the success status
    ///
    /// # Errors
    ///
    /// Any failure status is returned as the matching [`FetchError`] naming
    /// `feed`. The partial buffer is discarded.
    pub fn accumulate(
        &mut self,
        feed: &str,
        chunk: &[u8],
        status: FetchStatus,
    ) -> Result<Option<Vec<u8>>, FetchError> {
        let key = feed.to_lowercase();

        if status == FetchStatus::InProgress {
            self.buffers.entry(key).or_default().extend_from_slice(chunk);
            return Ok(None);
        }

        let buffered = self.buffers.remove(&key);

        if let Some(err) = status.into_error(feed) {
            if let Some(partial) = buffered {
                tracing::debug!(feed = %feed, discarded = partial.len(), "Dropped partial transfer");
            }
            return Err(err);
        }

        let mut document = buffered.unwrap_or_default();
        document.extend_from_slice(chunk);
        Ok(Some(document))
    }

    /// Drop whatever has been buffered for `feed`. Returns true if anything
    /// was pending.
    pub fn discard(&mut self, feed: &str) -> bool {
        self.buffers.remove(&feed.to_lowercase()).is_some()
    }

    /// Bytes buffered so far for `feed`.
    pub fn buffered_len(&self, feed: &str) -> usize {
        self.buffers
            .get(&feed.to_lowercase())
            .map_or(0, Vec::len)
    }

    /// Number of feeds with an open buffer.
    pub fn in_flight(&self) -> usize {
        self.buffers.len()
    }
}
