use serde::{Deserialize, Serialize};

/// Runtime connection state of a transport adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStatus {
    Connected,
    Connecting,
    Disconnected,
    Error(String),
}

/// One inbound occurrence on a transport, surfaced to the message-dispatch
/// kernel. Variants as spec §4.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Message(MessageEvent),
    UserChange(UserChangeEvent),
    ChannelRename(ChannelRenameEvent),
    ChannelJoined(ChannelJoinedEvent),
    RateLimit(RateLimitEvent),
    AuthError(AuthErrorEvent),
    /// `<invite from=...>` on the legacy transport.
    Invite(InviteEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub from_user: String,
    pub channel: String,
    pub text: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: String,
    /// e.g. `"message_changed"` for the modern transport's edit/unfurl event.
    #[serde(default)]
    pub subtype: Option<String>,
    /// True when this `message_changed` event carries attachments, meaning
    /// it is the server's own link-unfurl echo rather than a user edit
    /// (spec §4.1, §9 "Edit events vs. unfurl events"). The adapter must
    /// suppress these before they reach the classifier.
    #[serde(default)]
    pub has_attachments: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserChangeEvent {
    pub user_id: String,
    pub real_name: Option<String>,
    pub mention_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRenameEvent {
    pub channel_id: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelJoinedEvent {
    pub channel_id: String,
    pub name: String,
    pub inviter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitEvent {
    pub retry_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthErrorEvent {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteEvent {
    pub from: String,
    pub channel_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_event_round_trips_through_json() {
        let ev = MessageEvent {
            from_user: "u1".into(),
            channel: "C1".into(),
            text: "hi".into(),
            ts: "1.2".into(),
            thread_ts: String::new(),
            subtype: None,
            has_attachments: false,
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: MessageEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text, "hi");
    }
}
