//! The legacy transport adapter (spec §4.1): wraps an `xmpp`/`tokio-xmpp`
//! client session and exposes it through [`jbot_transport::Transport`].
//!
//! The adapter spawns one task that owns the XMPP agent exclusively,
//! selecting between incoming stanzas (translated into [`Event`]s) and
//! outbound commands queued by `say`/`direct_message` — the agent itself is
//! never shared behind a lock, since `xmpp::Agent::wait_for_events` wants
//! `&mut self` and `say`/`direct_message` are `&self` on the `Transport`
//! trait.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use xmpp::parsers::message::MessageType;
use xmpp::{Agent, ClientBuilder, ClientFeature, ClientType, Event as XmppEvent};

use jbot_transport::error::TransportError;
use jbot_transport::transport::Transport;
use jbot_transport::types::{Event, MessageEvent, TransportStatus};

use crate::error::XmppError;
use crate::resolver;

const EVENT_BUFFER: usize = 256;
const OUTBOUND_BUFFER: usize = 64;

enum Outbound {
    Say {
        room: String,
        text: String,
    },
    Dm {
        jid: String,
        text: String,
    },
}

/// Connects to an XMPP multi-user-chat service under one account and
/// relays events to/from the dispatch kernel.
pub struct XmppAdapter {
    jid: String,
    password: String,
    nick: String,
    rooms: Vec<String>,
    status: Arc<Mutex<TransportStatus>>,
    outbound_tx: Option<mpsc::Sender<Outbound>>,
    events_rx: Option<mpsc::Receiver<Event>>,
}

impl XmppAdapter {
    pub fn new(jid: impl Into<String>, password: impl Into<String>, nick: impl Into<String>, rooms: Vec<String>) -> Self {
        Self {
            jid: jid.into(),
            password: password.into(),
            nick: nick.into(),
            rooms,
            status: Arc::new(Mutex::new(TransportStatus::Disconnected)),
            outbound_tx: None,
            events_rx: None,
        }
    }

    async fn build_agent(&self) -> Result<Agent, XmppError> {
        let jid = jid::BareJid::from_str(&self.jid).map_err(|e| XmppError::Auth(e.to_string()))?;
        Ok(ClientBuilder::new(jid, &self.password)
            .set_client(ClientType::Bot, "jbot")
            .enable_feature(ClientFeature::JoinRooms)
            .build())
    }
}

#[async_trait]
impl Transport for XmppAdapter {
    fn name(&self) -> &str {
        "xmpp"
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        *self.status.lock().await = TransportStatus::Connecting;

        let mut agent = self.build_agent().await?;
        for room in &self.rooms {
            agent
                .join_room(
                    jid::BareJid::from_str(room).map_err(|e| XmppError::Connection(e.to_string()))?,
                    Some(self.nick.clone()),
                    None,
                    "en",
                    "",
                )
                .await;
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.events_rx = Some(events_rx);
        self.outbound_tx = Some(outbound_tx);
        *self.status.lock().await = TransportStatus::Connected;

        let status = Arc::clone(&self.status);
        tokio::spawn(run_session(agent, events_tx, outbound_rx, status));

        info!("xmpp: connected as {}", self.jid);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.outbound_tx = None;
        *self.status.lock().await = TransportStatus::Disconnected;
        Ok(())
    }

    async fn say(&self, channel_id: &str, text: &str, _thread_ts: Option<&str>) -> Result<(), TransportError> {
        let tx = self
            .outbound_tx
            .as_ref()
            .ok_or_else(|| TransportError::SendFailed("xmpp adapter not connected".into()))?;
        tx.send(Outbound::Say {
            room: channel_id.to_string(),
            text: text.to_string(),
        })
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn direct_message(&self, user_id: &str, text: &str) -> Result<(), TransportError> {
        let tx = self
            .outbound_tx
            .as_ref()
            .ok_or_else(|| TransportError::SendFailed("xmpp adapter not connected".into()))?;
        tx.send(Outbound::Dm {
            jid: user_id.to_string(),
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

/// Owns the agent for the life of the connection: drains incoming stanzas
/// into `events_tx` and outbound commands from `outbound_rx` into stanza
/// sends. Exits (marking the adapter disconnected) when the agent's event
/// stream ends or `outbound_rx` is dropped.
async fn run_session(
    mut agent: Agent,
    events_tx: mpsc::Sender<Event>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    status: Arc<Mutex<TransportStatus>>,
) {
    loop {
        tokio::select! {
            events = agent.wait_for_events() => {
                match events {
                    Some(events) => {
                        for ev in events {
                            if let Some(mapped) = translate(ev) {
                                if events_tx.send(mapped).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    None => {
                        warn!("xmpp: session ended");
                        *status.lock().await = TransportStatus::Disconnected;
                        return;
                    }
                }
            }
            cmd = outbound_rx.recv() => {
                match cmd {
                    Some(Outbound::Say { room, text }) => {
                        if let Ok(jid) = jid::Jid::from_str(&room) {
                            agent.send_message(jid, MessageType::Groupchat, "en", &text).await;
                        } else {
                            error!(room, "xmpp: invalid room jid, dropping outbound message");
                        }
                    }
                    Some(Outbound::Dm { jid, text }) => {
                        if let Ok(jid) = jid::Jid::from_str(&jid) {
                            agent.send_message(jid, MessageType::Chat, "en", &text).await;
                        } else {
                            error!("xmpp: invalid recipient jid, dropping outbound direct message");
                        }
                    }
                    None => {
                        *status.lock().await = TransportStatus::Disconnected;
                        return;
                    }
                }
            }
        }
    }
}

/// One incoming XMPP stanza -> zero or one [`Event`]s. Presence, roster
/// pushes and anything we don't model are dropped silently.
fn translate(ev: XmppEvent) -> Option<Event> {
    match ev {
        XmppEvent::RoomJoined(room) => Some(Event::ChannelJoined(jbot_transport::types::ChannelJoinedEvent {
            channel_id: room.to_string(),
            name: room.to_string(),
            inviter: None,
        })),
        XmppEvent::RoomMessage(id, room, nick, body) => {
            let id = id.unwrap_or_default();
            let recipient = resolver::resolve(&format!("{room}/{nick}"), &id, &id);
            Some(Event::Message(MessageEvent {
                from_user: recipient.user_id,
                channel: recipient.reply_to,
                text: body.0,
                ts: id,
                thread_ts: String::new(),
                subtype: None,
                has_attachments: false,
            }))
        }
        XmppEvent::ChatMessage(id, from, body) => {
            let id = id.unwrap_or_default();
            let recipient = resolver::resolve(&from.to_string(), &id, &id);
            Some(Event::Message(MessageEvent {
                from_user: recipient.user_id,
                channel: recipient.reply_to,
                text: body.0,
                ts: id,
                thread_ts: String::new(),
                subtype: None,
                has_attachments: false,
            }))
        }
        XmppEvent::Disconnected => {
            warn!("xmpp: disconnected");
            None
        }
        _ => None,
    }
}
