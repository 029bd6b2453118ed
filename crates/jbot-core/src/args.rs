use regex::Regex;

/// Replace smart quotes and the non-breaking space with their ASCII
/// equivalents (spec §4.6). Clients routinely autocorrect straight quotes to
/// curly ones, which would otherwise break POSIX-shell-quoted parsing.
pub fn normalize_quotes(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect()
}

/// Split a command line the way spec §4.6 requires: normalize quotes, try a
/// POSIX-shell-quoted split, and fall back to a plain whitespace split if
/// the shell-quoted split fails (e.g. unbalanced quotes).
pub fn split_args(input: &str) -> Vec<String> {
    let normalized = normalize_quotes(input);
    match shell_words::split(&normalized) {
        Ok(tokens) if !tokens.is_empty() => tokens,
        _ => normalized
            .split_whitespace()
            .map(|s| s.to_string())
            .collect(),
    }
}

/// A parsed command line: the resolved command name and its remaining
/// arguments, after mention-name stripping, trailing-punctuation removal,
/// lowercasing, and synthetic-command regex mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// Parse a raw command line (everything after the `!`/mention prefix has
/// already been stripped by the classifier) into a [`ParsedCommand`].
///
/// `mention_name` is stripped if it is the leading token (so `@bot !foo` and
/// `!foo` parse identically once the classifier has stripped the prefix
/// down to `bot foo` / `foo`).
pub fn parse_command(line: &str, mention_name: &str) -> Option<ParsedCommand> {
    let mut tokens = split_args(line);
    if tokens.is_empty() {
        return None;
    }

    if !mention_name.is_empty() && tokens[0].eq_ignore_ascii_case(mention_name) {
        tokens.remove(0);
    }
    if tokens.is_empty() {
        return None;
    }

    let raw_name = tokens.remove(0);
    let name = strip_trailing_punct(&raw_name).to_lowercase();
    let name = resolve_synthetic(&name).unwrap_or_else(|| SyntheticResolution {
        name,
        prepend_args: Vec::new(),
    });

    let mut args = name.prepend_args;
    args.extend(tokens);

    Some(ParsedCommand {
        name: name.name,
        args,
    })
}

fn strip_trailing_punct(s: &str) -> &str {
    s.trim_end_matches([',', ';', ':'])
}

struct SyntheticResolution {
    name: String,
    prepend_args: Vec<String>,
}

/// Map a handful of well-known bare identifiers to their "real" command plus
/// a leading argument, per spec §4.6: `cmXXXX`/`cmrXXXX` -> `cm <N>`,
/// `incXXXX` -> `sn <N>`, `PROJ-NNN` -> `jira PROJ-NNN`.
fn resolve_synthetic(name: &str) -> Option<SyntheticResolution> {
    let cm_re = Regex::new(r"(?i)^cmr?(\d+)$").expect("static regex");
    if let Some(caps) = cm_re.captures(name) {
        return Some(SyntheticResolution {
            name: "cm".to_string(),
            prepend_args: vec![caps[1].to_string()],
        });
    }

    let inc_re = Regex::new(r"(?i)^inc(\d+)$").expect("static regex");
    if let Some(caps) = inc_re.captures(name) {
        return Some(SyntheticResolution {
            name: "sn".to_string(),
            prepend_args: vec![caps[1].to_string()],
        });
    }

    let jira_re = Regex::new(r"(?i)^([a-z]+-\d+)$").expect("static regex");
    if let Some(caps) = jira_re.captures(name) {
        return Some(SyntheticResolution {
            name: "jira".to_string(),
            prepend_args: vec![caps[1].to_string()],
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_smart_quotes_and_nbsp() {
        let input = "\u{201C}hello\u{00A0}world\u{201D}";
        assert_eq!(normalize_quotes(input), "\"hello world\"");
    }

    #[test]
    fn shell_quoted_split_handles_quoted_args() {
        let args = split_args(r#"set "a b" c"#);
        assert_eq!(args, vec!["set", "a b", "c"]);
    }

    #[test]
    fn unbalanced_quotes_fall_back_to_whitespace_split() {
        let args = split_args(r#"set "a b c"#);
        assert_eq!(args, vec!["set", "\"a", "b", "c"]);
    }

    #[test]
    fn strips_leading_mention_name_and_lowercases() {
        let parsed = parse_command("bot SET foo=bar", "bot").unwrap();
        assert_eq!(parsed.name, "set");
        assert_eq!(parsed.args, vec!["foo=bar"]);
    }

    #[test]
    fn strips_trailing_punctuation_on_command_name() {
        let parsed = parse_command("help,", "bot").unwrap();
        assert_eq!(parsed.name, "help");
    }

    #[test]
    fn synthetic_cm_number_maps_to_cm_command() {
        let parsed = parse_command("CM1234567", "bot").unwrap();
        assert_eq!(parsed.name, "cm");
        assert_eq!(parsed.args, vec!["1234567"]);
    }

    #[test]
    fn synthetic_inc_number_maps_to_sn_command() {
        let parsed = parse_command("INC0012345", "bot").unwrap();
        assert_eq!(parsed.name, "sn");
        assert_eq!(parsed.args, vec!["0012345"]);
    }

    #[test]
    fn synthetic_jira_key_maps_to_jira_command() {
        let parsed = parse_command("PROJ-42", "bot").unwrap();
        assert_eq!(parsed.name, "jira");
        assert_eq!(parsed.args, vec!["PROJ-42"]);
    }

    #[test]
    fn empty_line_has_no_parse() {
        assert!(parse_command("   ", "bot").is_none());
    }
}
