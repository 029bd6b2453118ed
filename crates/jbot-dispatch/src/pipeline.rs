//! Ties the classifier, command dispatcher, auto-reply engine, and chatter
//! cascade together into the single per-message pipeline spec §2 names:
//! "Recipient resolver → updateSeen/counters → Message classifier →
//! {command dispatcher | auto-reply | chatter cascade} → Reply layer".
//!
//! The recipient-resolution step itself is transport-specific and lives in
//! `jbot-xmpp`/`jbot-rtm`; this module starts from an already-resolved
//! [`Recipient`] plus the raw message text.

use jbot_core::counters::Counters;
use jbot_core::store::ChannelStore;
use jbot_core::types::Recipient;
use jbot_transport::Transport;
use tracing::error;

use crate::classify::{self, Route};
use crate::commands::{self, CommandRegistry, Outcome};
use crate::error::Result;
use crate::{autoreply, chatter, reply};

pub struct DispatchKernel {
    pub registry: CommandRegistry,
    pub bot_user_id: String,
    pub mention_name: String,
    pub dm_prefix: String,
}

impl DispatchKernel {
    pub fn new(registry: CommandRegistry, bot_user_id: String, mention_name: String, dm_prefix: String) -> Self {
        Self { registry, bot_user_id, mention_name, dm_prefix }
    }

    /// Run one inbound message through the full pipeline and deliver
    /// whatever reply (if any) it produces.
    pub async fn handle_message(
        &self,
        transport: &dyn Transport,
        store: &mut ChannelStore,
        counters: &mut Counters,
        recipient: &Recipient,
        channel_id: &str,
        text: &str,
    ) -> Result<()> {
        let route = classify::classify(
            store,
            counters,
            recipient,
            channel_id,
            text,
            &self.bot_user_id,
            &self.mention_name,
            &self.dm_prefix,
        );

        let reply_text = match route {
            Route::Dropped => return Ok(()),
            Route::Command { channel_name, line, via_bang } => self.run_command(store, counters, recipient, &channel_name, &line, via_bang, text),
            Route::NonCommand { channel_name, text: body } => self.run_non_command(store, recipient, &channel_name, &body),
        };

        match reply_text {
            Some(text) if !text.is_empty() => reply::reply(transport, store, counters, recipient, &text).await,
            _ => Ok(()),
        }
    }

    fn run_command(
        &self,
        store: &mut ChannelStore,
        counters: &mut Counters,
        recipient: &Recipient,
        channel_name: &str,
        line: &str,
        via_bang: bool,
        original_text: &str,
    ) -> Option<String> {
        let Some(channel) = store.get_mut(channel_name) else {
            error!(channel_name, "command routed against a channel missing from the store");
            return None;
        };

        match commands::dispatch(&self.registry, counters, recipient, channel, line, via_bang) {
            Outcome::Replied(text) => Some(text),
            Outcome::HelpFallback(text) => Some(text),
            Outcome::FallThroughToChatter => self.run_chatter(channel, recipient, original_text, true),
            Outcome::Leave => {
                let said_please = original_text.to_lowercase().contains("please");
                Some(commands::leave(recipient, channel, !via_bang, said_please))
            }
        }
    }

    fn run_non_command(&self, store: &mut ChannelStore, recipient: &Recipient, channel_name: &str, text: &str) -> Option<String> {
        let Some(channel) = store.get_mut(channel_name) else {
            return None;
        };

        if let Some(reply) = autoreply::check_broad_mention(channel, text, channel.users.len()) {
            return Some(reply);
        }

        if let Some(reply) = autoreply::try_reply(channel, text) {
            return Some(reply);
        }

        let mentioned = !self.mention_name.is_empty() && text.contains(&self.mention_name);
        self.run_chatter(channel, recipient, text, mentioned)
    }

    fn run_chatter(&self, channel: &mut jbot_core::ChannelState, recipient: &Recipient, text: &str, mentioned: bool) -> Option<String> {
        chatter::cascade(channel, recipient, text, mentioned, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jbot_core::channel_state::ChannelState;
    use jbot_core::types::ChatType;
    use jbot_transport::{Event, TransportError, TransportStatus};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct RecordingTransport {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "test"
        }
        async fn connect(&mut self) -> std::result::Result<(), TransportError> {
            Ok(())
        }
        async fn disconnect(&mut self) -> std::result::Result<(), TransportError> {
            Ok(())
        }
        async fn say(&self, channel_id: &str, text: &str, _thread_ts: Option<&str>) -> std::result::Result<(), TransportError> {
            self.sent.lock().unwrap().push((channel_id.to_string(), text.to_string()));
            Ok(())
        }
        async fn direct_message(&self, user_id: &str, text: &str) -> std::result::Result<(), TransportError> {
            self.sent.lock().unwrap().push((user_id.to_string(), text.to_string()));
            Ok(())
        }
        fn status(&self) -> TransportStatus {
            TransportStatus::Connected
        }
        fn take_events(&mut self) -> Option<mpsc::Receiver<Event>> {
            None
        }
    }

    fn recipient() -> Recipient {
        Recipient {
            chat_type: ChatType::Rtm,
            user_id: "u1".to_string(),
            mention_name: "jbot".to_string(),
            real_name: "Alice".to_string(),
            reply_to: "C1".to_string(),
            thread_ts: String::new(),
        }
    }

    fn kernel() -> DispatchKernel {
        DispatchKernel::new(
            CommandRegistry::new(crate::builtin_commands::registry_commands()),
            "bot".to_string(),
            "jbot".to_string(),
            "D".to_string(),
        )
    }

    #[tokio::test]
    async fn bang_help_replies_with_help_text() {
        let transport = RecordingTransport { sent: Mutex::new(Vec::new()) };
        let mut store = ChannelStore::new();
        store.insert(ChannelState::new("ops", "C1", ChatType::Rtm));
        let mut counters = Counters::new();
        let kernel = kernel();

        kernel
            .handle_message(&transport, &mut store, &mut counters, &recipient(), "C1", "!help")
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("help"));
    }

    #[tokio::test]
    async fn known_command_updates_setting_and_replies() {
        let transport = RecordingTransport { sent: Mutex::new(Vec::new()) };
        let mut store = ChannelStore::new();
        store.insert(ChannelState::new("ops", "C1", ChatType::Rtm));
        let mut counters = Counters::new();
        let kernel = kernel();

        kernel
            .handle_message(&transport, &mut store, &mut counters, &recipient(), "C1", "!set font=rot13")
            .await
            .unwrap();

        assert_eq!(store.get("ops").unwrap().settings.get("font"), Some(&"rot13".to_string()));
        let sent = transport.sent.lock().unwrap();
        // `set` mutates `settings["font"]` before returning its confirmation
        // string, and `reply::reply` renders every outgoing reply through the
        // channel's now-updated font — including this one.
        assert_eq!(sent[0].1, "Frg sbag=ebg13.");
    }

    #[tokio::test]
    async fn plain_chatter_off_produces_no_reply() {
        let transport = RecordingTransport { sent: Mutex::new(Vec::new()) };
        let mut store = ChannelStore::new();
        store.insert(ChannelState::new("ops", "C1", ChatType::Rtm));
        let mut counters = Counters::new();
        let kernel = kernel();

        kernel
            .handle_message(&transport, &mut store, &mut counters, &recipient(), "C1", "just chatting here")
            .await
            .unwrap();

        assert!(transport.sent.lock().unwrap().is_empty());
    }
}
