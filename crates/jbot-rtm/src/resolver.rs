//! The modern transport's half of the recipient resolver (spec §4.2): a
//! user profile lookup yields real name and mention name; thread-ness is
//! derived by comparing the message and parent timestamps.

use jbot_core::types::{ChatType, Recipient};

use crate::profile::UserProfile;

pub fn resolve(profile: &UserProfile, channel_id: &str, message_ts: &str, parent_ts: &str) -> Recipient {
    let thread_ts = if !parent_ts.is_empty() && parent_ts != message_ts {
        parent_ts.to_string()
    } else {
        String::new()
    };

    Recipient {
        chat_type: ChatType::Rtm,
        user_id: profile.id.clone(),
        mention_name: profile.mention_name.clone(),
        real_name: profile.real_name.clone(),
        reply_to: channel_id.to_string(),
        thread_ts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: "U1".into(),
            real_name: "Alice Example".into(),
            mention_name: "alice".into(),
        }
    }

    #[test]
    fn plain_message_has_no_thread() {
        let r = resolve(&profile(), "C1", "100.1", "100.1");
        assert!(r.thread_ts.is_empty());
        assert_eq!(r.mention_name, "alice");
    }

    #[test]
    fn threaded_reply_carries_parent_ts() {
        let r = resolve(&profile(), "C1", "200.2", "100.1");
        assert_eq!(r.thread_ts, "100.1");
    }
}
