//! The legacy transport's half of the recipient resolver (spec §4.2),
//! grounded in `original_source/jbot.go::getRecipientFromMessage`'s
//! `hipchat` branch: `mfrom` is `user@host/nick`; the reply-to channel name
//! is the local-part with its numeric prefix (`NNNN_`) stripped.

use jbot_core::types::{ChatType, Recipient};

/// Split `jid_with_resource` (`user@host/nick`) into the bare JID and the
/// resource (nickname), matching the message sender to a channel and
/// display name.
pub fn resolve(jid_with_resource: &str, message_ts: &str, parent_ts: &str) -> Recipient {
    let mut parts = jid_with_resource.splitn(2, '/');
    let bare_jid = parts.next().unwrap_or(jid_with_resource);
    let nick = parts.next().unwrap_or("");

    let local_part = bare_jid.split('@').next().unwrap_or(bare_jid);
    let reply_to = strip_numeric_prefix(local_part);

    let thread_ts = if !parent_ts.is_empty() && parent_ts != message_ts {
        parent_ts.to_string()
    } else {
        String::new()
    };

    Recipient {
        chat_type: ChatType::Xmpp,
        user_id: bare_jid.to_string(),
        mention_name: String::new(),
        real_name: nick.to_string(),
        reply_to,
        thread_ts,
    }
}

/// `NNNN_channelname` -> `channelname`. A local-part with no underscore (no
/// numeric prefix present) is returned unchanged.
fn strip_numeric_prefix(local_part: &str) -> String {
    match local_part.split_once('_') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) => rest.to_string(),
        _ => local_part.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_numeric_prefix_from_local_part() {
        let r = resolve("12345_ops@conference.example.com/alice", "100.0", "100.0");
        assert_eq!(r.reply_to, "ops");
        assert_eq!(r.real_name, "alice");
        assert_eq!(r.user_id, "12345_ops@conference.example.com");
    }

    #[test]
    fn local_part_without_numeric_prefix_is_unchanged() {
        let r = resolve("botcontrol@conference.example.com/owner", "1", "1");
        assert_eq!(r.reply_to, "botcontrol");
    }

    #[test]
    fn differing_parent_ts_sets_thread_ts() {
        let r = resolve("1_ops@conf.example.com/alice", "200.5", "100.0");
        assert_eq!(r.thread_ts, "100.0");
    }

    #[test]
    fn equal_parent_ts_leaves_thread_ts_empty() {
        let r = resolve("1_ops@conf.example.com/alice", "100.0", "100.0");
        assert!(r.thread_ts.is_empty());
    }
}
