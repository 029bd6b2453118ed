//! The modern transport adapter (spec §4.1): bootstraps a websocket
//! session over the token-authenticated REST API, then drives the socket
//! from a dedicated task — outbound sends go through a command channel so
//! `say`/`direct_message` can stay `&self` on the [`Transport`] trait while
//! only one task ever touches the socket halves.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info, warn};

use jbot_transport::error::TransportError;
use jbot_transport::transport::Transport;
use jbot_transport::types::{
    AuthErrorEvent, ChannelJoinedEvent, ChannelRenameEvent, Event, MessageEvent, RateLimitEvent, TransportStatus,
    UserChangeEvent,
};

use crate::error::RtmError;
use crate::profile::ProfileCache;

const EVENT_BUFFER: usize = 256;
const OUTBOUND_BUFFER: usize = 64;

enum Outbound {
    Say { channel: String, text: String, thread_ts: Option<String> },
    Dm { user_id: String, text: String },
}

#[derive(Debug, Deserialize)]
struct RtmConnectResponse {
    ok: bool,
    error: Option<String>,
    url: Option<String>,
    #[serde(rename = "self")]
    bot_self: Option<RtmSelf>,
}

#[derive(Debug, Deserialize)]
struct RtmSelf {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ConversationsOpenResponse {
    ok: bool,
    error: Option<String>,
    channel: Option<ConversationsOpenChannel>,
}

#[derive(Debug, Deserialize)]
struct ConversationsOpenChannel {
    id: String,
}

/// Inbound frame shape — a loose superset of the fields we act on. Fields
/// we don't model (edited_by blocks, reactions, etc.) are dropped by serde.
#[derive(Debug, Deserialize)]
struct RtmFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    subtype: Option<String>,
    channel: Option<String>,
    user: Option<String>,
    text: Option<String>,
    ts: Option<String>,
    thread_ts: Option<String>,
    attachments: Option<serde_json::Value>,
    message: Option<Box<RtmFrame>>,
    name: Option<String>,
    inviter: Option<String>,
    real_name: Option<String>,
    error: Option<RtmFrameError>,
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RtmFrameError {
    msg: Option<String>,
}

pub struct RtmAdapter {
    token: String,
    base_url: String,
    status: Arc<Mutex<TransportStatus>>,
    profiles: Arc<ProfileCache>,
    dm_channels: Arc<RwLock<HashMap<String, String>>>,
    http: reqwest::Client,
    outbound_tx: Option<mpsc::Sender<Outbound>>,
    events_rx: Option<mpsc::Receiver<Event>>,
}

impl RtmAdapter {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let token = token.into();
        let base_url = base_url.into();
        let http = reqwest::Client::new();
        Self {
            profiles: Arc::new(ProfileCache::new(http.clone(), token.clone(), base_url.clone())),
            token,
            base_url,
            status: Arc::new(Mutex::new(TransportStatus::Disconnected)),
            dm_channels: Arc::new(RwLock::new(HashMap::new())),
            http,
            outbound_tx: None,
            events_rx: None,
        }
    }

    pub fn profiles(&self) -> Arc<ProfileCache> {
        Arc::clone(&self.profiles)
    }

    async fn rtm_connect(&self) -> Result<(String, String), RtmError> {
        let resp: RtmConnectResponse = self
            .http
            .post(format!("{}/rtm.connect", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| RtmError::Handshake(e.to_string()))?
            .json()
            .await
            .map_err(|e| RtmError::Handshake(e.to_string()))?;

        if !resp.ok {
            let msg = resp.error.unwrap_or_else(|| "rtm.connect failed".into());
            return if msg.contains("invalid_auth") || msg.contains("token") {
                Err(RtmError::Auth(msg))
            } else {
                Err(RtmError::Handshake(msg))
            };
        }
        let url = resp.url.ok_or_else(|| RtmError::Handshake("rtm.connect returned no url".into()))?;
        let bot_id = resp.bot_self.map(|s| s.id).unwrap_or_default();
        Ok((url, bot_id))
    }

    async fn open_dm_channel(&self, user_id: &str) -> Result<String, RtmError> {
        fetch_dm_channel(&self.http, &self.token, &self.base_url, user_id, &self.dm_channels).await
    }
}

/// Look up the cached DM channel id for `user_id`, opening one via
/// `conversations.open` on a cache miss and caching the result — the same
/// fetch-then-cache shape [`ProfileCache::lookup`] uses for profiles. Shared
/// between [`RtmAdapter::open_dm_channel`] and `run_session`'s `Outbound::Dm`
/// handling so a DM's first-ever send doesn't require a channel already
/// having been opened some other way.
async fn fetch_dm_channel(
    http: &reqwest::Client,
    token: &str,
    base_url: &str,
    user_id: &str,
    dm_channels: &RwLock<HashMap<String, String>>,
) -> Result<String, RtmError> {
    if let Some(channel) = dm_channels.read().await.get(user_id) {
        return Ok(channel.clone());
    }
    let resp: ConversationsOpenResponse = http
        .post(format!("{base_url}/conversations.open"))
        .bearer_auth(token)
        .json(&json!({ "users": user_id }))
        .send()
        .await
        .map_err(|e| RtmError::Socket(e.to_string()))?
        .json()
        .await
        .map_err(|e| RtmError::Socket(e.to_string()))?;
    if !resp.ok {
        return Err(RtmError::Socket(resp.error.unwrap_or_else(|| "conversations.open failed".into())));
    }
    let channel = resp
        .channel
        .ok_or_else(|| RtmError::Socket("conversations.open returned no channel".into()))?
        .id;
    dm_channels.write().await.insert(user_id.to_string(), channel.clone());
    Ok(channel)
}

#[async_trait]
impl Transport for RtmAdapter {
    fn name(&self) -> &str {
        "rtm"
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        *self.status.lock().await = TransportStatus::Connecting;

        let (url, bot_user_id) = self.rtm_connect().await?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RtmError::Socket(e.to_string()))?;
        let (sink, stream) = ws_stream.split();

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.events_rx = Some(events_rx);
        self.outbound_tx = Some(outbound_tx);
        *self.status.lock().await = TransportStatus::Connected;

        let status = Arc::clone(&self.status);
        let dm_channels = Arc::clone(&self.dm_channels);
        let http = self.http.clone();
        let token = self.token.clone();
        let base_url = self.base_url.clone();
        tokio::spawn(run_session(
            sink, stream, events_tx, outbound_rx, status, dm_channels, bot_user_id, http, token, base_url,
        ));

        info!("rtm: connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.outbound_tx = None;
        *self.status.lock().await = TransportStatus::Disconnected;
        Ok(())
    }

    async fn say(&self, channel_id: &str, text: &str, thread_ts: Option<&str>) -> Result<(), TransportError> {
        let tx = self
            .outbound_tx
            .as_ref()
            .ok_or_else(|| TransportError::SendFailed("rtm adapter not connected".into()))?;
        tx.send(Outbound::Say {
            channel: channel_id.to_string(),
            text: text.to_string(),
            thread_ts: thread_ts.map(str::to_string),
        })
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn direct_message(&self, user_id: &str, text: &str) -> Result<(), TransportError> {
        let tx = self
            .outbound_tx
            .as_ref()
            .ok_or_else(|| TransportError::SendFailed("rtm adapter not connected".into()))?;
        tx.send(Outbound::Dm {
            user_id: user_id.to_string(),
            text: text.to_string(),
        })
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn status(&self) -> TransportStatus {
        self.status
            .try_lock()
            .map(|g| g.clone())
            .unwrap_or(TransportStatus::Connecting)
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<Event>> {
        self.events_rx.take()
    }
}

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;
type WsSource =
    futures_util::stream::SplitStream<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>>;

async fn run_session(
    mut sink: WsSink,
    mut stream: WsSource,
    events_tx: mpsc::Sender<Event>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    status: Arc<Mutex<TransportStatus>>,
    dm_channels: Arc<RwLock<HashMap<String, String>>>,
    bot_user_id: String,
    http: reqwest::Client,
    token: String,
    base_url: String,
) {
    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(event) = translate(&text, &bot_user_id) {
                            if events_tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "rtm: socket read error");
                        *status.lock().await = TransportStatus::Error(e.to_string());
                        return;
                    }
                    None => {
                        warn!("rtm: socket closed");
                        *status.lock().await = TransportStatus::Disconnected;
                        return;
                    }
                }
            }
            cmd = outbound_rx.recv() => {
                match cmd {
                    Some(Outbound::Say { channel, text, thread_ts }) => {
                        let mut payload = json!({ "type": "message", "channel": channel, "text": text });
                        if let Some(ts) = thread_ts {
                            payload["thread_ts"] = json!(ts);
                        }
                        if sink.send(WsMessage::Text(payload.to_string())).await.is_err() {
                            error!("rtm: failed writing to socket, ending session");
                            return;
                        }
                    }
                    Some(Outbound::Dm { user_id, text }) => {
                        let channel = match fetch_dm_channel(&http, &token, &base_url, &user_id, &dm_channels).await {
                            Ok(channel) => channel,
                            Err(e) => {
                                error!(user_id, error = %e, "rtm: failed to open dm channel, drop direct message");
                                continue;
                            }
                        };
                        let payload = json!({ "type": "message", "channel": channel, "text": text });
                        if sink.send(WsMessage::Text(payload.to_string())).await.is_err() {
                            error!("rtm: failed writing direct message to socket, ending session");
                            return;
                        }
                    }
                    None => return,
                }
            }
        }
    }
}

/// One inbound RTM frame -> zero or one [`Event`]s. `message_changed`
/// frames carrying attachments are the server's own link-unfurl echo and
/// are suppressed here rather than forwarded as an edit (spec §4.1, §9).
fn translate(raw: &str, bot_user_id: &str) -> Option<Event> {
    let frame: RtmFrame = serde_json::from_str(raw).ok()?;
    match frame.kind.as_deref()? {
        "message" => {
            if frame.subtype.as_deref() == Some("message_changed") {
                let has_attachments = frame
                    .message
                    .as_ref()
                    .and_then(|m| m.attachments.as_ref())
                    .map(|a| !a.as_array().map(|arr| arr.is_empty()).unwrap_or(true))
                    .unwrap_or(false);
                if has_attachments {
                    return None;
                }
                let inner = frame.message?;
                return Some(Event::Message(MessageEvent {
                    from_user: inner.user.unwrap_or_default(),
                    channel: frame.channel.unwrap_or_default(),
                    text: inner.text.unwrap_or_default(),
                    ts: frame.ts.unwrap_or_default(),
                    thread_ts: inner.thread_ts.unwrap_or_default(),
                    subtype: Some("message_changed".to_string()),
                    has_attachments: false,
                }));
            }
            let from_user = frame.user.unwrap_or_default();
            if from_user == bot_user_id {
                return None;
            }
            Some(Event::Message(MessageEvent {
                from_user,
                channel: frame.channel.unwrap_or_default(),
                text: frame.text.unwrap_or_default(),
                ts: frame.ts.clone().unwrap_or_default(),
                thread_ts: frame.thread_ts.unwrap_or_default(),
                subtype: frame.subtype,
                has_attachments: false,
            }))
        }
        "user_change" => Some(Event::UserChange(UserChangeEvent {
            user_id: frame.user.unwrap_or_default(),
            real_name: frame.real_name,
            mention_name: None,
        })),
        "channel_rename" | "group_rename" => Some(Event::ChannelRename(ChannelRenameEvent {
            channel_id: frame.channel.unwrap_or_default(),
            new_name: frame.name.unwrap_or_default(),
        })),
        "channel_joined" | "group_joined" => Some(Event::ChannelJoined(ChannelJoinedEvent {
            channel_id: frame.channel.unwrap_or_default(),
            name: frame.name.unwrap_or_default(),
            inviter: frame.inviter,
        })),
        "goodbye" | "reconnect_url" => None,
        "error" => Some(Event::AuthError(AuthErrorEvent {
            reason: frame.error.and_then(|e| e.msg).unwrap_or_else(|| "rtm error frame".into()),
        })),
        _ if frame.retry_after.is_some() => Some(Event::RateLimit(RateLimitEvent {
            retry_after_secs: frame.retry_after.unwrap_or(1),
        })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_message_translates_to_message_event() {
        let raw = r#"{"type":"message","channel":"C1","user":"U1","text":"hi","ts":"100.1"}"#;
        let event = translate(raw, "UBOT").unwrap();
        match event {
            Event::Message(m) => {
                assert_eq!(m.from_user, "U1");
                assert_eq!(m.text, "hi");
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn own_messages_are_suppressed() {
        let raw = r#"{"type":"message","channel":"C1","user":"UBOT","text":"echo","ts":"100.1"}"#;
        assert!(translate(raw, "UBOT").is_none());
    }

    #[test]
    fn message_changed_with_attachments_is_suppressed_as_unfurl_echo() {
        let raw = r#"{
            "type":"message","subtype":"message_changed","channel":"C1","ts":"100.2",
            "message":{"user":"U1","text":"hi http://example.com","attachments":[{"title":"Example"}]}
        }"#;
        assert!(translate(raw, "UBOT").is_none());
    }

    #[test]
    fn message_changed_without_attachments_surfaces_the_edit() {
        let raw = r#"{
            "type":"message","subtype":"message_changed","channel":"C1","ts":"100.3",
            "message":{"user":"U1","text":"edited text","thread_ts":"99.0"}
        }"#;
        let event = translate(raw, "UBOT").unwrap();
        match event {
            Event::Message(m) => {
                assert_eq!(m.text, "edited text");
                assert_eq!(m.thread_ts, "99.0");
                assert_eq!(m.subtype.as_deref(), Some("message_changed"));
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn channel_rename_translates() {
        let raw = r#"{"type":"channel_rename","channel":"C1","name":"new-name"}"#;
        let event = translate(raw, "UBOT").unwrap();
        match event {
            Event::ChannelRename(e) => assert_eq!(e.new_name, "new-name"),
            other => panic!("expected ChannelRename, got {other:?}"),
        }
    }

    #[test]
    fn unmodeled_frame_types_are_dropped() {
        let raw = r#"{"type":"presence_change","user":"U1","presence":"active"}"#;
        assert!(translate(raw, "UBOT").is_none());
    }
}
