use serde::{Deserialize, Serialize};

/// Which transport a [`Recipient`] or [`crate::channel_state::ChannelState`] lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    /// The legacy XMPP-based group-chat transport.
    Xmpp,
    /// The modern token-authenticated WebSocket RTM transport.
    Rtm,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Xmpp => "xmpp",
            ChatType::Rtm => "rtm",
        }
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The canonical message origin/destination, normalised from whatever
/// service-specific address shape the transport handed the resolver.
///
/// `reply_to` is the channel identifier (opaque to this layer); `thread_ts`
/// is empty when the message was not part of a reply thread and must be
/// propagated back so replies land in the same thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub chat_type: ChatType,
    pub user_id: String,
    pub mention_name: String,
    pub real_name: String,
    pub reply_to: String,
    #[serde(default)]
    pub thread_ts: String,
}

impl Recipient {
    pub fn has_thread(&self) -> bool {
        !self.thread_ts.is_empty()
    }
}

/// A registered command. `handler` is `None` only for `leave`, which is
/// special-cased by name before dispatch — a `None` handler reached through
/// normal lookup is a registration bug, not a runtime condition.
#[derive(Clone)]
pub struct Command {
    pub name: &'static str,
    pub handler: Option<CommandFn>,
    pub help: &'static str,
    pub how: &'static str,
    pub usage: &'static str,
    pub aliases: &'static [&'static str],
}

/// `(Recipient, channel_name, args) -> reply text`. Pure by convention: no
/// hidden side effects besides the mutation each handler explicitly performs
/// against the `ChannelState` it's handed, so chatter can invoke command
/// handlers recursively without re-entrancy concerns (design note in spec §9).
pub type CommandFn = fn(&Recipient, &mut crate::channel_state::ChannelState, &[String]) -> String;

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("has_handler", &self.handler.is_some())
            .field("aliases", &self.aliases)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_thread_detection() {
        let mut r = Recipient {
            chat_type: ChatType::Rtm,
            user_id: "u1".into(),
            mention_name: "alice".into(),
            real_name: "Alice".into(),
            reply_to: "C1".into(),
            thread_ts: String::new(),
        };
        assert!(!r.has_thread());
        r.thread_ts = "1234.5678".into();
        assert!(r.has_thread());
    }
}
