use feed_rs::parser;
use sha2::{Digest, Sha256};

/// One syndication item, reduced to what the poller prints and diffs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
}

const UNTITLED: &str = "(untitled)";

/// Parse a complete feed document into entries, in document order.
///
/// Never fails: a document `feed-rs` cannot make sense of yields an empty
/// list. Feeds conventionally list newest first, so callers wanting
/// chronological order should pass the result through [`chronological`].
pub fn parse_entries(bytes: &[u8]) -> Vec<Entry> {
    // Missing ids stay blank so `entry_id` can derive a stable one; the
    // parser's own fallback includes random UUIDs.
    let parser = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build();

    let feed = match parser.parse(bytes) {
        Ok(feed) => feed,
        Err(e) => {
            tracing::warn!(error = %e, bytes = bytes.len(), "Unparseable feed document, no entries recovered");
            return Vec::new();
        }
    };

    feed.entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let title = entry
                .title
                .map(|t| t.content)
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED.to_string());

            let native = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let id = entry_id(native, link.as_deref(), &title);

            Entry { id, title, link }
        })
        .collect()
}

/// Reverse newest-first document order into oldest-first.
pub fn chronological(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.reverse();
    entries
}

/// Native id when present, otherwise a digest of link and title so the
/// same item hashes to the same id on every poll.
fn entry_id(native: Option<&str>, link: Option<&str>, title: &str) -> String {
    if let Some(id) = native {
        let trimmed = id.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!("{}|{}", link.unwrap_or(""), title);
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <item>
      <title>Newest</title>
      <link>https://example.com/3</link>
      <guid>guid-3</guid>
    </item>
    <item>
      <title>Middle</title>
      <link>https://example.com/2</link>
      <guid>guid-2</guid>
    </item>
    <item>
      <title>Oldest</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_items_in_document_order() {
        let entries = parse_entries(RSS.as_bytes());
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["guid-3", "guid-2", "guid-1"]);
        assert_eq!(entries[0].title, "Newest");
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/3"));
    }

    #[test]
    fn chronological_puts_oldest_first() {
        let entries = chronological(parse_entries(RSS.as_bytes()));
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Oldest", "Middle", "Newest"]);
    }

    #[test]
    fn parses_atom_entries() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title>
  <id>urn:feed</id>
  <updated>2024-01-02T00:00:00Z</updated>
  <entry>
    <title>Second</title>
    <id>urn:entry:2</id>
    <link href="https://example.com/b"/>
    <updated>2024-01-02T00:00:00Z</updated>
  </entry>
  <entry>
    <title>First</title>
    <id>urn:entry:1</id>
    <link href="https://example.com/a"/>
    <updated>2024-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let entries = parse_entries(atom.as_bytes());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "urn:entry:2");
        assert_eq!(entries[1].link.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn malformed_document_yields_no_entries() {
        assert!(parse_entries(b"<not valid xml").is_empty());
        assert!(parse_entries(b"").is_empty());
        assert!(parse_entries(b"plain text, not a feed").is_empty());
    }

    #[test]
    fn empty_channel_yields_no_entries() {
        let xml = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title></channel></rss>"#;
        assert!(parse_entries(xml.as_bytes()).is_empty());
    }

    #[test]
    fn missing_guid_gets_stable_id() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title>
  <item><title>No GUID</title><link>https://example.com/no-guid</link></item>
</channel></rss>"#;

        let first = parse_entries(xml.as_bytes());
        let second = parse_entries(xml.as_bytes());
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(
            first[0].id,
            entry_id(None, Some("https://example.com/no-guid"), "No GUID")
        );
    }

    #[test]
    fn title_only_item_gets_stable_id() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title>
  <item><title>Title only</title></item>
</channel></rss>"#;

        let first = parse_entries(xml.as_bytes());
        let second = parse_entries(xml.as_bytes());
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].id, entry_id(None, None, "Title only"));
    }

    #[test]
    fn missing_title_uses_placeholder() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title>
  <item><guid>g1</guid></item>
</channel></rss>"#;

        let entries = parse_entries(xml.as_bytes());
        assert_eq!(entries[0].title, "(untitled)");
        assert_eq!(entries[0].link, None);
    }

    #[test]
    fn entry_id_prefers_trimmed_native_id() {
        assert_eq!(entry_id(Some("  abc  "), Some("https://x"), "T"), "abc");
    }

    #[test]
    fn entry_id_falls_back_to_digest() {
        let a = entry_id(None, Some("https://example.com/1"), "Title");
        let b = entry_id(Some("   "), Some("https://example.com/1"), "Title");
        let c = entry_id(None, Some("https://example.com/2"), "Title");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
