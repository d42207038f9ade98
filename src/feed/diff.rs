use super::parser::Entry;

/// Outcome of comparing a chronological entry list against a watermark.
#[derive(Debug, PartialEq, Eq)]
pub struct NewEntries<'a> {
    /// Entries not yet emitted, oldest first.
    pub entries: &'a [Entry],
    /// Watermark after emitting `entries`: the last new id, or the previous
    /// watermark when nothing is new.
    pub watermark: Option<&'a str>,
}

impl NewEntries<'_> {
    /// True when the watermark moved and needs persisting.
    pub fn advanced(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// Select the entries after `watermark` in a chronological sequence.
///
/// A watermark that is unset, or that matches no entry (first poll, or the
/// entry has scrolled out of the feed's window), makes every entry new.
/// Re-emitting a window after the watermark ages out is preferred to
/// silently dropping entries.
pub fn diff<'a>(entries: &'a [Entry], watermark: Option<&'a str>) -> NewEntries<'a> {
    let start = watermark
        .and_then(|w| entries.iter().position(|e| e.id == w))
        .map_or(0, |pos| pos + 1);

    let new = &entries[start..];
    let watermark = new.last().map(|e| e.id.as_str()).or(watermark);

    NewEntries {
        entries: new,
        watermark,
    }
}
