//! The message classifier (spec §4.5): self-echo suppression, seen-tracking,
//! DM/invite/ignored-channel handling, and the final command-vs-chatter
//! split.

use std::sync::OnceLock;

use chrono::Utc;
use jbot_core::channel_state::{ChannelState, UserInfo};
use jbot_core::counters::Counters;
use jbot_core::store::ChannelStore;
use jbot_core::types::{ChatType, Recipient};
use regex::Regex;

/// `eiddcc[a-z]{38}` — a Yubikey OTP that leaked into chat (`original_source/jbot.go::updateSeen`).
fn yubifail_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"eiddcc[a-z]{38}").expect("static regex"))
}

/// `original_source/jbot.go::updateSeen`'s curse-word pattern.
fn curse_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(sh[ia]t|motherfucker|piss|f+u+c+k+|cunt|cocksucker|tits)").expect("static regex")
    })
}

/// Result of classifying one inbound message.
pub enum Route {
    /// Nothing further to do: self-echo, an unfurl echo, or a message
    /// dropped by the ignored-channel gate.
    Dropped,
    /// The command prefix matched; `line` is everything after it. `via_bang`
    /// is true when the literal `!` prefix matched (or the prefix was
    /// implicit, as on the DM path) rather than a bare mention — it decides
    /// whether an unresolved name becomes a help reply or falls through to
    /// chatter (spec §4.7).
    Command { channel_name: String, line: String, via_bang: bool },
    /// No command prefix; hand to the auto-reply engine, then chatter.
    NonCommand { channel_name: String, text: String },
}

/// Update per-user bookkeeping for a message observed in a known channel
/// (spec §4.5 step 2, §8 invariant 2). Direct messages never reach here —
/// callers only invoke this once a channel has been resolved.
pub fn update_seen(channel: &mut ChannelState, counters: &mut Counters, recipient: &Recipient, text: &str) {
    if text.is_empty() {
        return;
    }
    let now = Utc::now().to_rfc3339();
    let increments = text.matches('\n').count().max(1) as u64;

    let user = channel
        .users
        .entry(recipient.user_id.clone())
        .or_insert_with(|| UserInfo {
            id: recipient.user_id.clone(),
            ..Default::default()
        });
    user.last_seen_at = now;
    user.message_count += increments;

    for m in curse_re().find_iter(text) {
        let word = m.as_str().to_lowercase();
        *user.curse_word_counts.entry(word.clone()).or_insert(0) += 1;
        counters.increment("curses", &word);
        counters.increment("cursers", &recipient.user_id);
    }

    if yubifail_re().is_match(text) {
        user.yubifail_count += 1;
        counters.increment("yubifail", &recipient.user_id);
    }
}

/// Build the "is this message addressed to us, and if so where does the
/// command line start" regex: `^(!|@name !?|<@botid> !?)` (spec §4.5 step 6).
fn command_prefix<'a>(text: &'a str, mention_name: &str, bot_user_id: &str) -> Option<(&'a str, bool)> {
    if let Some(rest) = text.strip_prefix('!') {
        return Some((rest, true));
    }
    for addr in [mention_name, bot_user_id] {
        if addr.is_empty() {
            continue;
        }
        let at_form = format!("@{addr}");
        for prefix in [at_form.as_str(), addr] {
            if let Some(rest) = text.strip_prefix(prefix) {
                let rest = rest.trim_start();
                if let Some(after_bang) = rest.strip_prefix('!') {
                    return Some((after_bang, true));
                }
                // Addressed but no `!`: still routes as a command line per
                // spec's grammar (`@name !?`) — the bang is optional.
                if rest.len() != text.len() {
                    return Some((rest, false));
                }
            }
        }
    }
    None
}

fn mentions_bot(text: &str, mention_name: &str, bot_user_id: &str) -> bool {
    (!mention_name.is_empty() && text.contains(mention_name))
        || (!bot_user_id.is_empty() && text.contains(bot_user_id))
}

/// Classify one inbound message. `dm_prefix` is the transport-specific
/// direct-message channel-id prefix (spec §4.5 step 3); pass `""` for a
/// transport with no DM concept.
#[allow(clippy::too_many_arguments)]
pub fn classify(
    store: &mut ChannelStore,
    counters: &mut Counters,
    recipient: &Recipient,
    channel_id: &str,
    text: &str,
    bot_user_id: &str,
    mention_name: &str,
    dm_prefix: &str,
) -> Route {
    // Step 1: self-echo.
    if !bot_user_id.is_empty() && recipient.user_id == bot_user_id {
        return Route::Dropped;
    }

    let known = store.get_by_id(channel_id).map(|ch| ch.name.clone());

    if let Some(name) = &known {
        if let Some(ch) = store.get_by_id_mut(channel_id) {
            update_seen(ch, counters, recipient, text);
        }

        // Step 5: ignored-channel gate.
        let ignored = store.get_by_id(channel_id).map(|ch| ch.is_ignored()).unwrap_or(false);
        if ignored {
            if mentions_bot(text, mention_name, bot_user_id) {
                if let Some(ch) = store.get_by_id_mut(channel_id) {
                    ch.set_ignored(false);
                }
            } else {
                return Route::Dropped;
            }
        }

        return route_prefix(name.clone(), text, mention_name, bot_user_id);
    }

    // Step 3: DM path — implicit command prefix.
    if !dm_prefix.is_empty() && channel_id.starts_with(dm_prefix) {
        return Route::Command {
            channel_name: channel_id.to_string(),
            line: text.to_string(),
            via_bang: true,
        };
    }

    // Step 4: invite path — unknown channel, modern transport, bot mentioned.
    if recipient.chat_type == ChatType::Rtm && mentions_bot(text, mention_name, bot_user_id) {
        let mut ch = ChannelState::new(channel_id, channel_id, recipient.chat_type);
        ch.inviter = recipient.user_id.clone();
        let name = ch.name.clone();
        store.insert(ch);
        return route_prefix(name, text, mention_name, bot_user_id);
    }

    Route::Dropped
}

fn route_prefix(channel_name: String, text: &str, mention_name: &str, bot_user_id: &str) -> Route {
    match command_prefix(text, mention_name, bot_user_id) {
        Some((line, via_bang)) => Route::Command {
            channel_name,
            line: line.to_string(),
            via_bang,
        },
        None => Route::NonCommand {
            channel_name,
            text: text.to_string(),
        },
    }
}
