use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::config::parse_interval;
use crate::feed::FetchError;
use crate::storage::{Feed, INTERVAL_KEY};

use super::coordinator::{Coordinator, CycleOutcome};

/// How often a running loop checks the settings table for a new interval.
pub const SETTINGS_RELOAD_PERIOD: Duration = Duration::from_secs(2);

/// What one tick started.
///
/// Dropping a `Tick` detaches its cycles; they keep running.
#[derive(Debug, Default)]
pub struct Tick {
    /// Cycles started by this tick, by feed name.
    pub started: Vec<(String, JoinHandle<CycleOutcome>)>,
    /// Feeds whose previous cycle was still in flight.
    pub skipped: Vec<String>,
    /// Feeds with no URL configured.
    pub unconfigured: Vec<String>,
}

impl Tick {
    /// Wait for every started cycle, in start order.
    ///
    /// A cycle task that panicked is logged and left out.
    pub async fn join(self) -> Vec<(String, CycleOutcome)> {
        let mut outcomes = Vec::with_capacity(self.started.len());
        for (feed, handle) in self.started {
            match handle.await {
                Ok(outcome) => outcomes.push((feed, outcome)),
                Err(e) => tracing::error!(feed = %feed, error = %e, "Cycle task aborted"),
            }
        }
        outcomes
    }
}

/// Fires a cycle per configured feed on every tick.
///
/// Cycles run as independent tasks and are never awaited by the
/// scheduler. A feed whose previous cycle has not finished is skipped for
/// that tick, so two transfers never share one feed's buffer.
pub struct Scheduler {
    coordinator: Arc<Coordinator>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    interval: watch::Sender<Duration>,
    /// Raw setting value the current interval was derived from.
    interval_raw: Mutex<String>,
}

impl Scheduler {
    /// `interval_raw` is the stored interval setting, parsed with the
    /// usual fallback.
    pub fn new(coordinator: Arc<Coordinator>, interval_raw: &str) -> Self {
        let (tx, _) = watch::channel(parse_interval(interval_raw));
        Self {
            coordinator,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            interval: tx,
            interval_raw: Mutex::new(interval_raw.to_string()),
        }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Current poll interval.
    pub fn interval(&self) -> Duration {
        *self.interval.borrow()
    }

    /// Enumerate the configured feeds and start one cycle for each.
    ///
    /// # Errors
    ///
    /// Only if the feed list itself cannot be read. Per-feed problems are
    /// reported on the sink and recorded in the returned [`Tick`].
    pub async fn on_tick(&self) -> Result<Tick> {
        let feeds = self.coordinator.database().list_feeds().await?;
        let mut tick = Tick::default();

        for feed in feeds {
            if feed.url.is_none() {
                self.coordinator.report(FetchError::MissingUrl {
                    feed: feed.name.clone(),
                });
                tick.unconfigured.push(feed.name);
                continue;
            }

            let name = feed.name.clone();
            match self.start_cycle(feed) {
                Some(handle) => tick.started.push((name, handle)),
                None => tick.skipped.push(name),
            }
        }

        tracing::info!(
            started = tick.started.len(),
            skipped = tick.skipped.len(),
            unconfigured = tick.unconfigured.len(),
            "Tick"
        );
        Ok(tick)
    }

    /// Spawn a cycle for `feed` unless one is already in flight.
    pub fn start_cycle(&self, feed: Feed) -> Option<JoinHandle<CycleOutcome>> {
        let Some(guard) = InFlightGuard::acquire(&self.in_flight, feed.key()) else {
            tracing::warn!(feed = %feed.name, "Previous cycle still in flight, skipping this tick");
            return None;
        };

        let coordinator = Arc::clone(&self.coordinator);
        Some(tokio::spawn(async move {
            let _guard = guard;
            coordinator.run_cycle(&feed).await
        }))
    }

    /// Apply a new raw interval value, falling back to the default for
    /// anything that is not a positive number of seconds. A running
    /// [`run`](Self::run) loop re-registers its timer when the effective
    /// interval changes.
    pub fn on_interval_changed(&self, raw: &str) -> Duration {
        let period = parse_interval(raw);
        *self.interval_raw.lock().unwrap_or_else(|e| e.into_inner()) = raw.to_string();
        self.interval.send_if_modified(|current| {
            if *current == period {
                false
            } else {
                *current = period;
                true
            }
        });
        period
    }

    /// Tick on the current interval until `shutdown` resolves.
    ///
    /// With `poll_on_start` the first tick fires immediately, otherwise
    /// after one full interval. The stored interval setting is re-read
    /// every [`SETTINGS_RELOAD_PERIOD`] and applied if it changed.
    pub async fn run<F>(&self, shutdown: F, poll_on_start: bool)
    where
        F: Future<Output = ()>,
    {
        let mut interval_rx = self.interval.subscribe();
        let period = *interval_rx.borrow_and_update();
        let mut timer = new_timer(period, poll_on_start);
        let mut settings_check = tokio::time::interval(SETTINGS_RELOAD_PERIOD);
        settings_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = period.as_secs(), "Poller started");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::info!("Poller stopping");
                    break;
                }

                Ok(()) = interval_rx.changed() => {
                    let period = *interval_rx.borrow_and_update();
                    timer = new_timer(period, false);
                    tracing::info!(interval_secs = period.as_secs(), "Poll timer re-registered");
                }

                _ = timer.tick() => {
                    if let Err(e) = self.on_tick().await {
                        tracing::warn!(error = %e, "Could not list feeds for this tick");
                    }
                }

                _ = settings_check.tick() => {
                    self.reload_interval().await;
                }
            }
        }
    }

    /// Pick up an interval change written to the settings table.
    async fn reload_interval(&self) {
        let raw = match self.coordinator.database().get_setting(INTERVAL_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read interval setting");
                return;
            }
        };

        let unchanged = *self.interval_raw.lock().unwrap_or_else(|e| e.into_inner()) == raw;
        if !unchanged {
            self.on_interval_changed(&raw);
        }
    }
}

fn new_timer(period: Duration, immediate: bool) -> Interval {
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut timer = interval_at(start, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// Membership in the in-flight set, released on drop (including when the
/// cycle task panics).
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<String>>>, key: String) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone());
        inserted.then(|| Self {
            set: Arc::clone(set),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}
