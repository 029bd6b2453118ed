use std::collections::HashMap;

use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::{error::TransportError, transport::Transport, types::TransportStatus};

/// Minimum delay between reconnect attempts (seconds).
const BACKOFF_BASE_SECS: u64 = 5;
/// Maximum delay between reconnect attempts (seconds).
const BACKOFF_MAX_SECS: u64 = 300;
/// Maximum number of reconnect attempts before giving up.
const MAX_ATTEMPTS: u32 = 10;
/// Jitter fraction applied to each delay (±10%).
const JITTER_FRACTION: f64 = 0.10;

/// Owns the set of registered transport adapters and drives their
/// connect/disconnect lifecycle with exponential backoff and jitter.
pub struct TransportManager {
    transports: HashMap<String, Box<dyn Transport>>,
}

impl TransportManager {
    pub fn new() -> Self {
        Self {
            transports: HashMap::new(),
        }
    }

    pub fn register(&mut self, transport: Box<dyn Transport>) {
        let name = transport.name().to_string();
        info!(transport = %name, "registering transport adapter");
        self.transports.insert(name, transport);
    }

    /// Connect every registered transport, sequentially, each with its own
    /// backoff-with-jitter retry budget. A transport that exhausts its
    /// attempts is logged and skipped — startup continues with whatever did
    /// connect (the supervisor can still restart a failed one later).
    pub async fn connect_all(&mut self) {
        for (name, transport) in self.transports.iter_mut() {
            info!(transport = %name, "connecting transport");
            if let Err(e) = connect_with_backoff(name, transport.as_mut()).await {
                error!(transport = %name, error = %e, "failed to connect transport after retries");
            }
        }
    }

    pub async fn disconnect_all(&mut self) {
        for (name, transport) in self.transports.iter_mut() {
            info!(transport = %name, "disconnecting transport");
            if let Err(e) = transport.disconnect().await {
                warn!(transport = %name, error = %e, "error while disconnecting transport");
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Transport> {
        self.transports.get(name).map(|b| b.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn Transport>> {
        self.transports.get_mut(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.transports.keys().map(|s| s.as_str()).collect()
    }

    pub fn statuses(&self) -> Vec<(String, TransportStatus)> {
        let mut result: Vec<(String, TransportStatus)> = self
            .transports
            .iter()
            .map(|(name, t)| (name.clone(), t.status()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

impl Default for TransportManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Attempt to connect a single transport with exponential backoff and ±10%
/// jitter. Schedule: 5s -> 10s -> 20s -> ... -> 300s (cap), up to
/// `MAX_ATTEMPTS` tries.
async fn connect_with_backoff(name: &str, transport: &mut dyn Transport) -> Result<(), TransportError> {
    let mut delay_secs = BACKOFF_BASE_SECS;

    for attempt in 1..=MAX_ATTEMPTS {
        match transport.connect().await {
            Ok(()) => {
                info!(transport = %name, attempt, "transport connected successfully");
                return Ok(());
            }
            Err(e) if e.is_fatal() => {
                return Err(e);
            }
            Err(e) if attempt == MAX_ATTEMPTS => {
                return Err(e);
            }
            Err(e) => {
                let jitter = jitter_secs(delay_secs);
                let total = delay_secs + jitter;
                warn!(
                    transport = %name,
                    attempt,
                    max = MAX_ATTEMPTS,
                    error = %e,
                    retry_after_secs = total,
                    "transport connect failed, retrying with backoff"
                );
                sleep(Duration::from_secs(total)).await;
                delay_secs = (delay_secs * 2).min(BACKOFF_MAX_SECS);
            }
        }
    }

    unreachable!("backoff loop exited without returning")
}

/// Deterministic jitter derived from the current time's sub-second
/// component, avoiding a hard `rand` dependency in the hot backoff path.
fn jitter_secs(base_secs: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct FlakyTransport {
        attempts_before_success: u32,
        attempts: u32,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn connect(&mut self) -> Result<(), TransportError> {
            self.attempts += 1;
            if self.attempts >= self.attempts_before_success {
                Ok(())
            } else {
                Err(TransportError::ConnectionFailed("not yet".into()))
            }
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn say(&self, _: &str, _: &str, _: Option<&str>) -> Result<(), TransportError> {
            Ok(())
        }

        async fn direct_message(&self, _: &str, _: &str) -> Result<(), TransportError> {
            Ok(())
        }

        fn status(&self) -> TransportStatus {
            TransportStatus::Connected
        }

        fn take_events(&mut self) -> Option<mpsc::Receiver<crate::types::Event>> {
            None
        }
    }

    #[tokio::test]
    async fn connect_all_retries_flaky_transport_until_success() {
        let mut mgr = TransportManager::new();
        mgr.register(Box::new(FlakyTransport {
            attempts_before_success: 2,
            attempts: 0,
        }));
        mgr.connect_all().await;
        let statuses = mgr.statuses();
        assert_eq!(statuses.len(), 1);
    }

    #[tokio::test]
    async fn auth_failure_does_not_retry() {
        struct AlwaysAuthFails;
        #[async_trait]
        impl Transport for AlwaysAuthFails {
            fn name(&self) -> &str {
                "dead"
            }
            async fn connect(&mut self) -> Result<(), TransportError> {
                Err(TransportError::AuthFailed("bad creds".into()))
            }
            async fn disconnect(&mut self) -> Result<(), TransportError> {
                Ok(())
            }
            async fn say(&self, _: &str, _: &str, _: Option<&str>) -> Result<(), TransportError> {
                Ok(())
            }
            async fn direct_message(&self, _: &str, _: &str) -> Result<(), TransportError> {
                Ok(())
            }
            fn status(&self) -> TransportStatus {
                TransportStatus::Error("auth".into())
            }
            fn take_events(&mut self) -> Option<mpsc::Receiver<crate::types::Event>> {
                None
            }
        }

        let mut mgr = TransportManager::new();
        mgr.register(Box::new(AlwaysAuthFails));
        // Should return promptly (no 10-attempt backoff loop) since the
        // error is fatal.
        mgr.connect_all().await;
    }
}
