use std::collections::HashMap;
use std::sync::Arc;

use jbot_core::store::ChannelStore;
#[cfg(test)]
use jbot_core::types::ChatType;
use jbot_core::types::Recipient;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::cve::{build_cve_alert_messages, fetch_cve_feed};
use crate::error::Result;

/// One interval-driven alert job. `run` is handed the channel record and
/// "now", and returns the messages to post this firing (empty/`None` means
/// nothing to send even though the interval elapsed — e.g. no new CVEs).
///
/// This generalizes `original_source/jbot.go`'s single hardcoded `cveAlert`
/// job into a registry so a future alert can be added without touching the
/// tick loop (spec §4.10's "alerts are a family of jobs sharing one timer
/// and counter mechanism").
pub trait AlertRunner: Send + Sync {
    /// Stable key used for this alert's settings (`"<key>-interval"`,
    /// `"<key>-counter"`) and throttle name.
    fn key(&self) -> &str;

    /// Interval in ticks to use when the channel hasn't set one explicitly.
    fn default_interval_ticks(&self) -> u64;

    fn run(&self, channel: &mut jbot_core::channel_state::ChannelState) -> Option<Vec<String>>;
}

/// CVE feed alert: posts newly observed CVEs once per channel, at the
/// channel's configured interval (`cve-alert-interval` ticks, falling back to
/// [`DEFAULT_CVE_INTERVAL_TICKS`]). Grounded in `original_source/cve.go::cveAlert`.
pub struct CveAlertRunner {
    all_cves: Arc<std::sync::Mutex<HashMap<String, crate::types::CveItem>>>,
}

pub const DEFAULT_CVE_INTERVAL_TICKS: u64 = 60;

impl CveAlertRunner {
    pub fn new(all_cves: Arc<std::sync::Mutex<HashMap<String, crate::types::CveItem>>>) -> Self {
        Self { all_cves }
    }
}

impl AlertRunner for CveAlertRunner {
    fn key(&self) -> &str {
        "cve-alert"
    }

    fn default_interval_ticks(&self) -> u64 {
        DEFAULT_CVE_INTERVAL_TICKS
    }

    fn run(&self, channel: &mut jbot_core::channel_state::ChannelState) -> Option<Vec<String>> {
        let all_cves = self.all_cves.lock().expect("cve map mutex poisoned");
        if all_cves.is_empty() {
            return None;
        }
        let messages = build_cve_alert_messages(&all_cves, &mut channel.seen_cves);
        if messages.is_empty() {
            None
        } else {
            Some(messages)
        }
    }
}

/// Registered [`AlertRunner`]s, keyed by [`AlertRunner::key`].
#[derive(Default)]
pub struct AlertRegistry {
    runners: Vec<Box<dyn AlertRunner>>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, runner: Box<dyn AlertRunner>) {
        self.runners.push(runner);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Box<dyn AlertRunner>> {
        self.runners.iter()
    }
}

/// `CveItem` type alias used by both the alert runner and anything else
/// (the `!cve` command hook) that wants a shared view of the feed cache.
pub type CveCache = Arc<std::sync::Mutex<HashMap<String, crate::types::CveItem>>>;

/// Drives the periodic maintenance jobs: CVE feed refresh, channel-list
/// refresh, liveness checks, and per-channel alert firing, all ticking at
/// `PERIODICS_SECS` off a single counter (spec §4.10). Structurally modeled
/// on the teacher's `SchedulerEngine::run` select-loop, replacing its SQLite
/// job table with settings-driven per-channel alert state.
pub struct SchedulerEngine {
    channels: Arc<AsyncMutex<ChannelStore>>,
    registry: AlertRegistry,
    outbound: mpsc::Sender<(Recipient, String)>,
    http: reqwest::Client,
    all_cves: Arc<std::sync::Mutex<HashMap<String, crate::types::CveItem>>>,
    tick: u64,
}

impl SchedulerEngine {
    pub fn new(
        channels: Arc<AsyncMutex<ChannelStore>>,
        outbound: mpsc::Sender<(Recipient, String)>,
    ) -> Self {
        let all_cves = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let mut registry = AlertRegistry::new();
        registry.register(Box::new(CveAlertRunner::new(all_cves.clone())));
        Self {
            channels,
            registry,
            outbound,
            http: reqwest::Client::new(),
            all_cves,
            tick: 0,
        }
    }

    /// Shared handle onto the CVE feed cache, for the `!cve` command hook
    /// (which needs a synchronous, already-fetched lookup rather than its
    /// own network round trip).
    pub fn cve_cache(&self) -> CveCache {
        Arc::clone(&self.all_cves)
    }

    /// Main loop: fires every `PERIODICS_SECS` until `shutdown` broadcasts
    /// `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(jbot_core::config::PERIODICS_SECS));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick += 1;
                    if let Err(e) = self.on_tick().await {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn on_tick(&mut self) -> Result<()> {
        if self.tick % jbot_core::config::CVE_FEED_UPDATE_TICKS == 0 {
            self.refresh_cve_feed().await;
        }
        if self.tick % jbot_core::config::LIVENESS_CHECK_TICKS == 0 {
            debug!("liveness check tick");
        }
        self.run_alerts().await;
        Ok(())
    }

    async fn refresh_cve_feed(&mut self) {
        match fetch_cve_feed(&self.http).await {
            Ok(fresh) => {
                let mut guard = self.all_cves.lock().expect("cve map mutex poisoned");
                let added = fresh.len();
                guard.extend(fresh);
                debug!(count = added, "cve feed refreshed");
            }
            Err(e) => warn!("cve feed refresh failed: {e}"),
        }
    }

    /// Per-channel, per-registered-alert firing pass (spec §8 invariant 5):
    /// a counter starts at 0 (fires immediately) and resets to 0 on every
    /// fire, so in steady state an N-tick-interval alert fires once every N
    /// ticks.
    async fn run_alerts(&mut self) {
        let mut store = self.channels.lock().await;
        for channel in store.iter_mut() {
            for runner in self.registry.iter() {
                let counter_key = format!("{}-counter", runner.key());
                let interval_key = format!("{}-interval", runner.key());
                let error_key = format!("{}-error-notified", runner.key());

                let interval_ticks = match channel.settings.get(&interval_key).cloned() {
                    Some(raw) => match raw.parse::<u64>() {
                        Ok(n) if n > 0 => n,
                        _ => {
                            if !channel.settings.contains_key(&error_key) {
                                channel.settings.insert(error_key.clone(), "true".to_string());
                                let recipient = channel_recipient(channel);
                                let _ = self
                                    .outbound
                                    .try_send((
                                        recipient,
                                        format!(
                                            "{} has an invalid interval ({raw:?}); falling back to the default",
                                            runner.key()
                                        ),
                                    ));
                            }
                            runner.default_interval_ticks()
                        }
                    },
                    None => runner.default_interval_ticks(),
                };

                let counter: u64 = channel
                    .settings
                    .get(&counter_key)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);

                if counter == 0 || counter >= interval_ticks {
                    if let Some(messages) = runner.run(channel) {
                        let recipient = channel_recipient(channel);
                        for msg in messages {
                            if self.outbound.try_send((recipient.clone(), msg)).is_err() {
                                warn!(channel = %channel.name, alert = runner.key(), "outbound alert channel full");
                            }
                        }
                    }
                    channel.settings.insert(counter_key.clone(), "0".to_string());
                }
                let next = channel
                    .settings
                    .get(&counter_key)
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0)
                    + 1;
                channel.settings.insert(counter_key, next.to_string());
            }
        }
    }
}

fn channel_recipient(channel: &jbot_core::channel_state::ChannelState) -> Recipient {
    Recipient {
        chat_type: channel.chat_type,
        user_id: String::new(),
        mention_name: String::new(),
        real_name: String::new(),
        reply_to: channel.id.clone(),
        thread_ts: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbot_core::channel_state::ChannelState;

    struct CountingRunner {
        fired: std::sync::atomic::AtomicUsize,
    }

    impl AlertRunner for CountingRunner {
        fn key(&self) -> &str {
            "test-alert"
        }
        fn default_interval_ticks(&self) -> u64 {
            3
        }
        fn run(&self, _channel: &mut ChannelState) -> Option<Vec<String>> {
            self.fired.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Some(vec!["fired".to_string()])
        }
    }

    #[tokio::test]
    async fn fires_on_first_tick_then_every_interval() {
        let mut store = ChannelStore::new();
        store.insert(ChannelState::new("ops", "C1", ChatType::Rtm));
        let channels = Arc::new(AsyncMutex::new(store));
        let (tx, mut rx) = mpsc::channel(64);

        let mut registry = AlertRegistry::new();
        registry.register(Box::new(CountingRunner {
            fired: std::sync::atomic::AtomicUsize::new(0),
        }));

        let mut engine = SchedulerEngine {
            channels: channels.clone(),
            registry,
            outbound: tx,
            http: reqwest::Client::new(),
            all_cves: Arc::new(std::sync::Mutex::new(HashMap::new())),
            tick: 0,
        };

        // Ticks 1..=9: fires at 1, 4, 7 (counter resets to 0 then increments
        // to 1 after a fire; fires again once it reaches interval=3).
        let mut fire_count = 0;
        for _ in 0..9 {
            engine.tick += 1;
            engine.run_alerts().await;
        }
        while rx.try_recv().is_ok() {
            fire_count += 1;
        }
        assert_eq!(fire_count, 3);
    }
}
