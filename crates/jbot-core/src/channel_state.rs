use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::ChatType;

/// The six toggle names the original ships with and their initial values.
/// Missing keys in a loaded [`ChannelState`] are backfilled with these
/// without overwriting values already present (spec §3, §8 scenario F).
pub const TOGGLE_DEFAULTS: &[(&str, bool)] = &[
    ("chatter", false),
    ("python", true),
    ("trivia", true),
    ("shakespeare", true),
    ("schneier", true),
    ("corpbs", true),
];

/// Per-user activity record. Direct messages never create or mutate one of
/// these; only messages observed in a channel do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub last_seen_at: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub curse_word_counts: HashMap<String, u64>,
    #[serde(default)]
    pub yubifail_count: u64,
}

/// `!autoreply set <pattern> <reply> [throttleMinutes]`. `throttle_minutes`
/// defaults to 30 when a caller omits it (original_source/autoreply.go).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReplyEntry {
    pub reply: String,
    pub throttle_minutes: u64,
}

/// Opaque per-channel record for a subsystem explicitly out of core (spec §3).
/// Kept only so persisted fields round-trip untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhishCount {
    #[serde(flatten)]
    pub raw: serde_json::Map<String, serde_json::Value>,
}

/// A user-defined statistics tracker (spec §3, "msgStats (optional)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgStat {
    pub name: String,
    pub pattern: String,
    pub count: u64,
}

/// The central durable record — spec.md's "Channel". Renamed to avoid
/// colliding with `jbot_transport::Transport`, the adapter abstraction
/// (itself renamed from the teacher's `Channel` trait for the same reason).
/// Grounded in `original_source/jbot.go`'s own `Channel` struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelState {
    pub name: String,
    pub id: String,
    pub chat_type: ChatType,
    #[serde(default)]
    pub inviter: String,
    #[serde(default)]
    pub verified: bool,

    #[serde(default)]
    pub toggles: HashMap<String, bool>,
    #[serde(default)]
    pub throttles: HashMap<String, String>,
    #[serde(default)]
    pub settings: HashMap<String, String>,
    #[serde(default)]
    pub users: HashMap<String, UserInfo>,
    #[serde(default)]
    pub auto_replies: HashMap<String, AutoReplyEntry>,
    #[serde(default)]
    pub seen_cves: HashSet<String>,
    #[serde(default)]
    pub phish_count: PhishCount,
    #[serde(default)]
    pub msg_stats: Vec<MsgStat>,
}

impl ChannelState {
    pub fn new(name: impl Into<String>, id: impl Into<String>, chat_type: ChatType) -> Self {
        let mut ch = Self {
            name: name.into(),
            id: id.into(),
            chat_type,
            inviter: String::new(),
            verified: false,
            toggles: HashMap::new(),
            throttles: HashMap::new(),
            settings: HashMap::new(),
            users: HashMap::new(),
            auto_replies: HashMap::new(),
            seen_cves: HashSet::new(),
            phish_count: PhishCount::default(),
            msg_stats: Vec::new(),
        };
        ch.backfill_toggles();
        ch
    }

    /// Fill in any toggle keys missing from this record with their default
    /// value, without overwriting keys already present. Called on every load
    /// from persisted state (spec §4.3 step v, §8 scenario F).
    pub fn backfill_toggles(&mut self) {
        for (name, default) in TOGGLE_DEFAULTS {
            self.toggles.entry((*name).to_string()).or_insert(*default);
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.settings
            .get("ignored")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }

    pub fn set_ignored(&mut self, ignored: bool) {
        if ignored {
            self.settings.insert("ignored".to_string(), "true".to_string());
        } else {
            self.settings.remove("ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_channel_gets_all_toggle_defaults() {
        let ch = ChannelState::new("ops", "C1", ChatType::Rtm);
        assert_eq!(ch.toggles.get("chatter"), Some(&false));
        assert_eq!(ch.toggles.get("python"), Some(&true));
        assert_eq!(ch.toggles.get("trivia"), Some(&true));
        assert_eq!(ch.toggles.get("shakespeare"), Some(&true));
        assert_eq!(ch.toggles.get("schneier"), Some(&true));
        assert_eq!(ch.toggles.get("corpbs"), Some(&true));
    }

    #[test]
    fn backfill_preserves_existing_values() {
        // Scenario F: a persisted channel lacking `shakespeare` gets it
        // backfilled to true, while an explicitly-set `chatter=false` is
        // preserved (not overwritten back to its own default, which would
        // be a no-op here, but more importantly a *non-default* explicit
        // value must survive).
        let mut ch = ChannelState::new("dev", "C2", ChatType::Rtm);
        ch.toggles.insert("chatter".to_string(), true); // explicit override
        ch.toggles.remove("shakespeare"); // simulate an old persisted file
        ch.backfill_toggles();
        assert_eq!(ch.toggles.get("chatter"), Some(&true));
        assert_eq!(ch.toggles.get("shakespeare"), Some(&true));
    }

    #[test]
    fn ignored_flag_round_trips() {
        let mut ch = ChannelState::new("x", "C3", ChatType::Rtm);
        assert!(!ch.is_ignored());
        ch.set_ignored(true);
        assert!(ch.is_ignored());
        ch.set_ignored(false);
        assert!(!ch.is_ignored());
    }
}
