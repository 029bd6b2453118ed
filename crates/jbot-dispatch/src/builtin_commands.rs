//! Built-in command handlers (spec §4.7, §6) that fit the pure
//! `(Recipient, channel, args) -> text` [`CommandFn`] shape. `!top` and
//! `!cve` need state ([`jbot_core::counters::Counters`], the scheduler's CVE
//! cache) that lives above a single channel and outside this signature —
//! they're wired up as CLI-layer hooks alongside the `leave` special case,
//! not registered here.

use chrono::Utc;
use jbot_core::channel_state::ChannelState;
use jbot_core::throttle;
use jbot_core::types::{Command, Recipient};

use crate::autoreply;

pub fn version(_r: &Recipient, _c: &mut ChannelState, _args: &[String]) -> String {
    format!("jbot {}", env!("CARGO_PKG_VERSION"))
}

/// `!set name=value` or `!set name value`.
pub fn set(_r: &Recipient, channel: &mut ChannelState, args: &[String]) -> String {
    let Some(first) = args.first() else {
        return "Usage: set <name>=<value>".to_string();
    };
    let (name, value) = match first.split_once('=') {
        Some((n, v)) => (n.to_string(), v.to_string()),
        None => match args.get(1) {
            Some(v) => (first.clone(), v.clone()),
            None => return "Usage: set <name>=<value>".to_string(),
        },
    };
    channel.settings.insert(name.clone(), value.clone());
    format!("Set {name}={value}.")
}

/// `!unset name`.
pub fn unset(_r: &Recipient, channel: &mut ChannelState, args: &[String]) -> String {
    match args.first() {
        Some(name) => {
            channel.settings.remove(name);
            format!("Unset {name}.")
        }
        None => "Usage: unset <name>".to_string(),
    }
}

/// `!toggle name`.
pub fn toggle(_r: &Recipient, channel: &mut ChannelState, args: &[String]) -> String {
    let Some(name) = args.first() else {
        return "Usage: toggle <name>".to_string();
    };
    match throttle::flip(channel, name) {
        Ok(value) => format!("{name} is now {value}."),
        Err(()) => format!("Usage: {name:?} isn't a known toggle."),
    }
}

/// `!throttle name [minutes]`: explicitly arm a throttle.
pub fn throttle_cmd(_r: &Recipient, channel: &mut ChannelState, args: &[String]) -> String {
    let Some(name) = args.first() else {
        return "Usage: throttle <name> [minutes]".to_string();
    };
    let minutes: i64 = args.get(1).and_then(|m| m.parse().ok()).unwrap_or(30);
    throttle::arm_until(channel, name, Utc::now() + chrono::Duration::minutes(minutes));
    format!("Throttled {name} for {minutes} minute(s).")
}

/// `!unthrottle name`, `!unthrottle *`, `!unthrottle everything`.
pub fn unthrottle(_r: &Recipient, channel: &mut ChannelState, args: &[String]) -> String {
    match args.first().map(String::as_str) {
        Some("*") | Some("everything") => {
            throttle::clear_all(channel);
            "Cleared every throttle.".to_string()
        }
        Some(name) => {
            throttle::clear(channel, name);
            format!("Cleared throttle {name}.")
        }
        None => "Usage: unthrottle <name>|*|everything".to_string(),
    }
}

/// `!seen user`.
pub fn seen(_r: &Recipient, channel: &mut ChannelState, args: &[String]) -> String {
    let Some(user_id) = args.first() else {
        return "Usage: seen <user>".to_string();
    };
    match channel.users.get(user_id) {
        Some(info) if !info.last_seen_at.is_empty() => {
            format!("{user_id} was last seen at {} ({} messages).", info.last_seen_at, info.message_count)
        }
        _ => format!("No record of {user_id} in this channel."),
    }
}

/// `!autoreply set "<pattern>" "<reply>" [throttleMinutes]` / `!autoreply remove "<pattern>"`.
pub fn autoreply_cmd(_r: &Recipient, channel: &mut ChannelState, args: &[String]) -> String {
    match args.first().map(String::as_str) {
        Some("set") => {
            let (Some(pattern), Some(reply)) = (args.get(1), args.get(2)) else {
                return "Usage: autoreply set <pattern> <reply> [throttleMinutes]".to_string();
            };
            let minutes = args.get(3).and_then(|m| m.parse().ok());
            match autoreply::set(channel, pattern, reply, minutes) {
                Ok(()) => format!("Added auto-reply for {pattern:?}."),
                Err(e) => format!("Usage: that pattern is invalid: {e}"),
            }
        }
        Some("remove") => match args.get(1) {
            Some(pattern) => {
                if autoreply::remove(channel, pattern) {
                    format!("Removed auto-reply for {pattern:?}.")
                } else {
                    format!("No auto-reply found for {pattern:?}.")
                }
            }
            None => "Usage: autoreply remove <pattern>".to_string(),
        },
        _ => "Usage: autoreply set <pattern> <reply> [throttleMinutes] | autoreply remove <pattern>".to_string(),
    }
}

/// `!alerts set <key> <intervalTicks>`: configure a per-channel scheduler
/// alert interval (consumed by `jbot_scheduler::engine` on the next tick).
pub fn alerts_cmd(_r: &Recipient, channel: &mut ChannelState, args: &[String]) -> String {
    let (Some(key), Some(interval)) = (args.first(), args.get(1)) else {
        return "Usage: alerts set <key> <intervalTicks>".to_string();
    };
    if interval.parse::<u64>().is_err() {
        return format!("Usage: {interval:?} is not a whole number of ticks.");
    }
    channel.settings.insert(format!("{key}-interval"), interval.clone());
    format!("{key} alerts will fire every {interval} tick(s).")
}

/// The table of handlers that fit [`jbot_core::types::CommandFn`]. `help`
/// and `leave` are special-cased by the dispatcher before this table is
/// consulted (spec §4.7).
pub fn registry_commands() -> Vec<Command> {
    vec![
        Command { name: "version", handler: Some(version), help: "Print the running version.", how: "", usage: "!version", aliases: &[] },
        Command { name: "set", handler: Some(set), help: "Set a channel setting.", how: "", usage: "!set <name>=<value>", aliases: &[] },
        Command { name: "unset", handler: Some(unset), help: "Clear a channel setting.", how: "", usage: "!unset <name>", aliases: &[] },
        Command { name: "toggle", handler: Some(toggle), help: "Flip a named toggle.", how: "", usage: "!toggle <name>", aliases: &[] },
        Command { name: "throttle", handler: Some(throttle_cmd), help: "Force a throttle to close.", how: "", usage: "!throttle <name> [minutes]", aliases: &[] },
        Command { name: "unthrottle", handler: Some(unthrottle), help: "Clear a throttle.", how: "", usage: "!unthrottle <name>|*|everything", aliases: &["untie"] },
        Command { name: "seen", handler: Some(seen), help: "When was a user last seen?", how: "", usage: "!seen <user>", aliases: &[] },
        Command { name: "autoreply", handler: Some(autoreply_cmd), help: "Manage this channel's auto-replies.", how: "", usage: "!autoreply set|remove ...", aliases: &[] },
        Command { name: "alerts", handler: Some(alerts_cmd), help: "Configure this channel's alert intervals.", how: "", usage: "!alerts set <key> <intervalTicks>", aliases: &[] },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbot_core::types::ChatType;

    fn ch() -> ChannelState {
        ChannelState::new("ops", "C1", ChatType::Rtm)
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

    #[test]
    fn set_and_unset_round_trip() {
        let mut c = ch();
        let r = recipient();
        set(&r, &mut c, &["font=rot13".to_string()]);
        assert_eq!(c.settings.get("font"), Some(&"rot13".to_string()));
        unset(&r, &mut c, &["font".to_string()]);
        assert!(!c.settings.contains_key("font"));
    }

    #[test]
    fn toggle_unknown_name_is_usage_error() {
        let mut c = ch();
        let r = recipient();
        let out = toggle(&r, &mut c, &["not-a-toggle".to_string()]);
        assert!(out.starts_with("Usage:"));
    }

    #[test]
    fn seen_reports_no_record_for_unknown_user() {
        let mut c = ch();
        let r = recipient();
        let out = seen(&r, &mut c, &["ghost".to_string()]);
        assert!(out.starts_with("No record"));
    }

    #[test]
    fn autoreply_command_adds_entry() {
        let mut c = ch();
        let r = recipient();
        let out = autoreply_cmd(&r, &mut c, &["set".to_string(), "hi".to_string(), "hello".to_string()]);
        assert!(out.starts_with("Added"));
        assert!(c.auto_replies.contains_key("hi"));
    }
}
