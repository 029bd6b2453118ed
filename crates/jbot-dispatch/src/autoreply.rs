//! The auto-reply engine (spec §4.8): per-channel pattern → reply table,
//! first-match-wins, each entry independently throttled.

use chrono::Utc;
use jbot_core::channel_state::{AutoReplyEntry, ChannelState};
use jbot_core::throttle;
use regex::RegexBuilder;

use crate::error::{DispatchError, Result};

/// Validate and insert `!autoreply set <pattern> <reply> [throttleMinutes]`
/// (spec §4.8: "validates the regex at intake and rejects invalid patterns").
pub fn set(channel: &mut ChannelState, pattern: &str, reply: &str, throttle_minutes: Option<u64>) -> Result<()> {
    compile(pattern).map_err(|e| DispatchError::InvalidAutoReplyPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    channel.auto_replies.insert(
        pattern.to_string(),
        AutoReplyEntry {
            reply: reply.to_string(),
            throttle_minutes: throttle_minutes.unwrap_or(30),
        },
    );
    Ok(())
}

pub fn remove(channel: &mut ChannelState, pattern: &str) -> bool {
    channel.auto_replies.remove(pattern).is_some()
}

fn compile(pattern: &str) -> std::result::Result<regex::Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Try every registered pattern against `text` in insertion order; on the
/// first match, if its throttle is open, arm it and return the reply.
/// Returns `None` if no pattern matched or the matching pattern's throttle
/// was closed — either way the caller proceeds to the chatter cascade.
pub fn try_reply(channel: &mut ChannelState, text: &str) -> Option<String> {
    let patterns: Vec<(String, AutoReplyEntry)> = channel
        .auto_replies
        .iter()
        .map(|(p, e)| (p.clone(), e.clone()))
        .collect();

    for (pattern, entry) in patterns {
        let re = match compile(&pattern) {
            Ok(re) => re,
            Err(_) => continue, // a pattern that was valid at intake can't fail here; skip defensively
        };
        if !re.is_match(text) {
            continue;
        }
        let throttle_name = format!("autoreply: {pattern}");
        let armed = throttle::check_and_arm_for(
            channel,
            &throttle_name,
            Utc::now(),
            (entry.throttle_minutes * 60) as i64,
        );
        if armed {
            return Some(entry.reply);
        }
        return None;
    }
    None
}

/// The `@here` / `@channel` sibling routine (spec §4.8): consults
/// `settings["athere"]` / `settings["atchannel"]` and returns a reply to
/// challenge the broad mention, or `None` if the setting permits it
/// silently or the text contains no broad mention at all.
pub fn check_broad_mention(channel: &ChannelState, text: &str, member_count: usize) -> Option<String> {
    let (setting, mention) = if text.contains("@here") {
        ("athere", "@here")
    } else if text.contains("@channel") {
        ("atchannel", "@channel")
    } else {
        return None;
    };

    match channel.settings.get(setting).map(String::as_str) {
        Some("allow") => None,
        Some("shame") => Some(format!(
            "{mention}? Really? That's {member_count} people you just bothered."
        )),
        Some("insult") | None => Some(format!("Nobody likes a {mention} abuser.")),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbot_core::types::ChatType;

    fn ch() -> ChannelState {
        ChannelState::new("ops", "C1", ChatType::Rtm)
    }

    #[test]
    fn invalid_pattern_is_rejected_at_intake() {
        let mut c = ch();
        let err = set(&mut c, "(unclosed", "reply", None);
        assert!(err.is_err());
        assert!(c.auto_replies.is_empty());
    }

    #[test]
    fn first_match_replies_then_throttles() {
        let mut c = ch();
        set(&mut c, "hello", "hi", Some(5)).unwrap();

        assert_eq!(try_reply(&mut c, "hello there"), Some("hi".to_string()));
        // Second hit within the throttle window: no reply.
        assert_eq!(try_reply(&mut c, "hello again"), None);
    }

    #[test]
    fn case_insensitive_match() {
        let mut c = ch();
        set(&mut c, "hello", "hi", Some(5)).unwrap();
        assert_eq!(try_reply(&mut c, "HELLO THERE"), Some("hi".to_string()));
    }

    #[test]
    fn no_pattern_matches_returns_none() {
        let mut c = ch();
        set(&mut c, "hello", "hi", Some(5)).unwrap();
        assert_eq!(try_reply(&mut c, "goodbye"), None);
    }

    #[test]
    fn broad_mention_defaults_to_insult() {
        let c = ch();
        let reply = check_broad_mention(&c, "@here please look at this", 12);
        assert!(reply.unwrap().contains("@here"));
    }

    #[test]
    fn broad_mention_allow_setting_is_silent() {
        let mut c = ch();
        c.settings.insert("athere".to_string(), "allow".to_string());
        assert_eq!(check_broad_mention(&c, "@here hi", 12), None);
    }
}
