//! The polling pipeline.
//!
//! - [`scheduler`] - timer-driven fan-out, one cycle per feed per tick,
//!   with a single-flight guard per feed
//! - [`coordinator`] - one feed's fetch → parse → diff → emit → persist cycle
//! - [`sink`] - where entry and error lines go

pub mod coordinator;
pub mod scheduler;
pub mod sink;

pub use coordinator::{Coordinator, CycleOutcome};
pub use scheduler::{Scheduler, Tick};
pub use sink::{MemorySink, Sink, StdoutSink};

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use tokio::sync::mpsc;

    use crate::feed::{FetchEvent, FetchStatus, Fetcher};

    /// RSS document listing `items` (id, title) in the given order, each
    /// linking to `https://example.com/<id>`.
    pub(crate) fn rss(items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(id, title)| {
                format!(
                    "<item><guid>{id}</guid><title>{title}</title><link>https://example.com/{id}</link></item>"
                )
            })
            .collect();
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>{body}</channel></rss>"#)
    }

    enum Script {
        Events(Vec<FetchEvent>),
        Hold,
    }

    /// Fetcher replaying queued responses per URL. Unscripted calls end in
    /// a transfer error.
    #[derive(Default)]
    pub(crate) struct ScriptedFetcher {
        scripts: Mutex<HashMap<String, VecDeque<Script>>>,
        held: Mutex<Vec<mpsc::Sender<FetchEvent>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn script(&self, url: &str, events: Vec<FetchEvent>) {
            self.push(url, Script::Events(events));
        }

        /// Deliver `document` in one chunk, then success.
        pub(crate) fn respond(&self, url: &str, document: String) {
            self.script(
                url,
                vec![
                    FetchEvent::chunk(document.into_bytes()),
                    FetchEvent::done(FetchStatus::Success),
                ],
            );
        }

        pub(crate) fn fail(&self, url: &str, status: FetchStatus) {
            self.script(url, vec![FetchEvent::done(status)]);
        }

        /// Next fetch of `url` stays open until [`finish_held`](Self::finish_held).
        pub(crate) fn hold(&self, url: &str) {
            self.push(url, Script::Hold);
        }

        pub(crate) fn finish_held(&self, status: FetchStatus) {
            for tx in self.held.lock().unwrap().drain(..) {
                tx.try_send(FetchEvent::done(status)).unwrap();
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn push(&self, url: &str, script: Script) {
            self.scripts
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(script);
        }
    }

    impl Fetcher for ScriptedFetcher {
        fn start_fetch(&self, url: &str) -> mpsc::Receiver<FetchEvent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(VecDeque::pop_front);

            match script {
                Some(Script::Hold) => {
                    let (tx, rx) = mpsc::channel(1);
                    self.held.lock().unwrap().push(tx);
                    rx
                }
                Some(Script::Events(events)) => replay(events),
                None => replay(vec![FetchEvent::done(FetchStatus::TransferError)]),
            }
        }
    }

    fn replay(events: Vec<FetchEvent>) -> mpsc::Receiver<FetchEvent> {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.try_send(event).unwrap();
        }
        rx
    }
}
