use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::types::{Event, TransportStatus};

/// Hides a chat service's wire protocol behind two send operations and an
/// event stream (spec §4.1). Named `Transport` rather than `Channel` to
/// avoid colliding with `jbot_core::ChannelState`, spec's own "Channel"
/// data record — this is the adapter, not the record.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable adapter name, e.g. `"xmpp"` or `"rtm"`.
    fn name(&self) -> &str;

    /// Establish the connection. The transport need not self-reconnect on
    /// total disconnect — the lifecycle supervisor handles that (spec
    /// §4.1, §4.13).
    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Post `text` into `channel_id`, optionally anchored to a thread.
    async fn say(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Open (if needed) and post to a direct-message channel with `user_id`.
    async fn direct_message(&self, user_id: &str, text: &str) -> Result<(), TransportError>;

    fn status(&self) -> TransportStatus;

    /// Take the event receiver for this adapter. Returns `None` if already
    /// taken (each adapter's event stream is consumed exactly once, by the
    /// dispatch kernel's receive loop).
    fn take_events(&mut self) -> Option<mpsc::Receiver<Event>>;
}
