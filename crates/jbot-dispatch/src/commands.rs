//! Command registry and dispatcher (spec §4.7): name+alias lookup, synthetic
//! regex resolution (already done by `jbot_core::args::parse_command`),
//! help fallback, and the `commands` counter.

use std::collections::HashMap;

use jbot_core::args::parse_command;
use jbot_core::counters::Counters;
use jbot_core::types::{ChatType, Command, Recipient};
use jbot_core::ChannelState;
use tracing::error;

/// All registered commands, keyed by canonical name, plus the derived
/// alias→name map. Built once at startup; read-only thereafter (spec §9:
/// "COMMANDS is read-only post-init and may be shared freely").
pub struct CommandRegistry {
    by_name: HashMap<&'static str, Command>,
    alias_to_name: HashMap<&'static str, &'static str>,
}

impl CommandRegistry {
    pub fn new(commands: Vec<Command>) -> Self {
        let mut by_name = HashMap::new();
        let mut alias_to_name = HashMap::new();
        for cmd in commands {
            for alias in cmd.aliases {
                alias_to_name.insert(*alias, cmd.name);
            }
            by_name.insert(cmd.name, cmd);
        }
        Self { by_name, alias_to_name }
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.by_name
            .get(name)
            .or_else(|| self.alias_to_name.get(name).and_then(|n| self.by_name.get(n)))
    }

    /// Left inverse of alias registration (spec §8 invariant 8): resolves an
    /// alias to its owning command's canonical name.
    pub fn find_command_alias(&self, name: &str) -> Option<&'static str> {
        if self.by_name.contains_key(name) {
            return self.by_name.get(name).map(|c| c.name);
        }
        self.alias_to_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.by_name.values()
    }
}

/// Outcome of dispatching one command line.
pub enum Outcome {
    Replied(String),
    /// `leave` reached by name before dispatch, special-cased by the caller
    /// (spec §4.7: "a `nil` handler is a registration error ... this exists
    /// only for `leave`").
    Leave,
    /// No command matched and the invocation used `!`: the help text for
    /// the attempted (non-)name.
    HelpFallback(String),
    /// No command matched and the invocation used a bare mention (no `!`):
    /// fall through to chatter.
    FallThroughToChatter,
}

/// Dispatch one already-classified command line (spec §4.7). `via_bang` is
/// true when the classifier matched the literal `!` prefix rather than a
/// bare mention, which controls whether an unmatched name becomes a help
/// reply or falls through to chatter.
pub fn dispatch(
    registry: &CommandRegistry,
    counters: &mut Counters,
    recipient: &Recipient,
    channel: &mut ChannelState,
    line: &str,
    via_bang: bool,
) -> Outcome {
    let mention_name = recipient.mention_name.as_str();
    let parsed = match parse_command(line, mention_name) {
        Some(p) => p,
        None => {
            return if via_bang {
                Outcome::HelpFallback(help_text(registry, ""))
            } else {
                Outcome::FallThroughToChatter
            }
        }
    };

    if parsed.name == "leave" {
        return Outcome::Leave;
    }
    if parsed.name == "help" {
        counters.increment("commands", "help");
        let topic = parsed.args.first().map(String::as_str).unwrap_or("");
        return Outcome::Replied(help_text(registry, topic));
    }

    match registry.get(&parsed.name) {
        Some(cmd) => {
            counters.increment("commands", cmd.name);
            match cmd.handler {
                Some(handler) => Outcome::Replied(handler(recipient, channel, &parsed.args)),
                None => {
                    error!(command = cmd.name, "registered command has no handler");
                    Outcome::Replied(String::new())
                }
            }
        }
        None => {
            if via_bang {
                Outcome::HelpFallback(help_text(registry, &parsed.name))
            } else {
                Outcome::FallThroughToChatter
            }
        }
    }
}

/// `!help`, `!help all`, `!help NAME` (spec §6).
pub fn help_text(registry: &CommandRegistry, name: &str) -> String {
    if name.is_empty() {
        return "I'm a bot. Try `!help all` to list everything I know, or `!help <command>` for details.".to_string();
    }
    if name == "all" {
        let mut names: Vec<&str> = registry.iter().map(|c| c.name).collect();
        names.sort();
        return format!("I know: {}", names.join(", "));
    }
    match registry.get(name) {
        Some(cmd) => {
            let aliases = if cmd.aliases.is_empty() {
                String::new()
            } else {
                format!(" (aliases: {})", cmd.aliases.join(", "))
            };
            format!("Usage: {}\n{}{}\n{}", cmd.usage, cmd.help, aliases, cmd.how)
        }
        None => format!("Usage: I don't know a command called {name:?}. Try `!help all`."),
    }
}

/// `!leave`: polite-check when reached via chatter, transport-specific
/// behavior otherwise (spec §4.7).
pub fn leave(recipient: &Recipient, channel: &mut ChannelState, via_chatter: bool, said_please: bool) -> String {
    if via_chatter && !said_please {
        return "I'll leave when you ask nicely.".to_string();
    }
    match recipient.chat_type {
        ChatType::Rtm => {
            channel.set_ignored(true);
            "OK, I'll be quiet. Mention me by name if you need me again.".to_string()
        }
        ChatType::Xmpp => "Leaving. Goodbye!".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbot_core::types::CommandFn;

    fn noop(_r: &Recipient, _c: &mut ChannelState, _a: &[String]) -> String {
        "ok".to_string()
    }

    fn registry() -> CommandRegistry {
        let handler: CommandFn = noop;
        CommandRegistry::new(vec![Command {
            name: "ping",
            handler: Some(handler),
            help: "replies pong",
            how: "",
            usage: "!ping",
            aliases: &["p"],
        }])
    }

    fn recipient() -> Recipient {
        Recipient {
            chat_type: ChatType::Rtm,
            user_id: "u1".to_string(),
            mention_name: "bot".to_string(),
            real_name: "Bot".to_string(),
            reply_to: "C1".to_string(),
            thread_ts: String::new(),
        }
    }

    #[test]
    fn alias_resolves_to_canonical_command() {
        let reg = registry();
        assert_eq!(reg.find_command_alias("p"), Some("ping"));
        assert_eq!(reg.find_command_alias("ping"), Some("ping"));
    }

    #[test]
    fn unknown_command_via_bang_yields_help_fallback() {
        let reg = registry();
        let mut counters = Counters::new();
        let mut ch = ChannelState::new("ops", "C1", ChatType::Rtm);
        let outcome = dispatch(&reg, &mut counters, &recipient(), &mut ch, "nonsense", true);
        assert!(matches!(outcome, Outcome::HelpFallback(_)));
    }

    #[test]
    fn unknown_command_via_mention_falls_through_to_chatter() {
        let reg = registry();
        let mut counters = Counters::new();
        let mut ch = ChannelState::new("ops", "C1", ChatType::Rtm);
        let outcome = dispatch(&reg, &mut counters, &recipient(), &mut ch, "hello", false);
        assert!(matches!(outcome, Outcome::FallThroughToChatter));
    }

    #[test]
    fn known_command_increments_counter_and_replies() {
        let reg = registry();
        let mut counters = Counters::new();
        let mut ch = ChannelState::new("ops", "C1", ChatType::Rtm);
        let outcome = dispatch(&reg, &mut counters, &recipient(), &mut ch, "ping", true);
        assert!(matches!(outcome, Outcome::Replied(ref s) if s == "ok"));
        assert_eq!(counters.get("commands", "ping"), 1);
    }

    #[test]
    fn leave_is_special_cased_before_lookup() {
        let reg = registry();
        let mut counters = Counters::new();
        let mut ch = ChannelState::new("ops", "C1", ChatType::Rtm);
        let outcome = dispatch(&reg, &mut counters, &recipient(), &mut ch, "leave", true);
        assert!(matches!(outcome, Outcome::Leave));
    }
}
