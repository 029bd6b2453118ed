//! The channel `settings["font"]` transform catalog (spec §4.11 step 5):
//! `{blocks, bubbles, cursive, double, gothic, normal, reverse, rot13,
//! upsidedown}`. An unrecognized name is identity.
//!
//! `rot13`, `reverse`, and `normal` are exact, character-accurate transforms.
//! The remaining decorative fonts are data-driven character substitutions
//! covering the ASCII letters and digits only — characters outside that
//! range pass through unchanged, same as the original's font tables (out of
//! core per spec §1: "the cute-text font transforms").

use std::collections::HashMap;
use std::sync::OnceLock;

pub fn apply(font: &str, text: &str) -> String {
    match font {
        "rot13" => rot13(text),
        "reverse" => reverse(text),
        "blocks" => substitute(text, blocks_map()),
        "bubbles" => substitute(text, bubbles_map()),
        "cursive" => substitute(text, cursive_map()),
        "double" => substitute(text, double_map()),
        "gothic" => substitute(text, gothic_map()),
        "upsidedown" => upsidedown(text),
        _ => text.to_string(),
    }
}

pub fn normal(text: &str) -> String {
    text.to_string()
}

pub fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
            other => other,
        })
        .collect()
}

pub fn reverse(text: &str) -> String {
    text.chars().rev().collect()
}

fn substitute(text: &str, map: &HashMap<char, char>) -> String {
    text.chars().map(|c| map.get(&c).copied().unwrap_or(c)).collect()
}

fn alnum_map(upper: impl Fn(u8) -> char, lower: impl Fn(u8) -> char, digit: impl Fn(u8) -> char) -> HashMap<char, char> {
    let mut m = HashMap::new();
    for i in 0..26u8 {
        m.insert((b'A' + i) as char, upper(i));
        m.insert((b'a' + i) as char, lower(i));
    }
    for i in 0..10u8 {
        m.insert((b'0' + i) as char, digit(i));
    }
    m
}

/// Mathematical double-struck letters/digits (the usual "blackboard bold"
/// glyphs), skipping the well-known reserved-codepoint exceptions (C, H, N,
/// P, Q, R, Z) by falling back to the plain letter for those — those six
/// live outside the contiguous block and aren't worth a second table for a
/// decorative transform.
fn double_map() -> &'static HashMap<char, char> {
    static MAP: OnceLock<HashMap<char, char>> = OnceLock::new();
    MAP.get_or_init(|| {
        let exceptions_upper: &[(u8, char)] =
            &[(2, 'ℂ'), (7, 'ℍ'), (13, 'ℕ'), (15, 'ℙ'), (16, 'ℚ'), (17, 'ℝ'), (25, 'ℤ')];
        alnum_map(
            |i| {
                if let Some((_, c)) = exceptions_upper.iter().find(|(idx, _)| *idx == i) {
                    *c
                } else {
                    char::from_u32(0x1D538 + i as u32).unwrap_or((b'A' + i) as char)
                }
            },
            |i| char::from_u32(0x1D552 + i as u32).unwrap_or((b'a' + i) as char),
            |i| char::from_u32(0x1D7D8 + i as u32).unwrap_or((b'0' + i) as char),
        )
    })
}

/// Circled letters/digits ("bubble text").
fn bubbles_map() -> &'static HashMap<char, char> {
    static MAP: OnceLock<HashMap<char, char>> = OnceLock::new();
    MAP.get_or_init(|| {
        alnum_map(
            |i| char::from_u32(0x24B6 + i as u32).unwrap_or((b'A' + i) as char),
            |i| char::from_u32(0x24D0 + i as u32).unwrap_or((b'a' + i) as char),
            |i| {
                if i == 0 {
                    '⓪'
                } else {
                    char::from_u32(0x2460 + (i as u32 - 1)).unwrap_or((b'0' + i) as char)
                }
            },
        )
    })
}

/// Mathematical fraktur ("gothic" / blackletter) letters; digits have no
/// fraktur forms in Unicode so they pass through unchanged.
fn gothic_map() -> &'static HashMap<char, char> {
    static MAP: OnceLock<HashMap<char, char>> = OnceLock::new();
    MAP.get_or_init(|| {
        let exceptions_upper: &[(u8, char)] = &[(2, 'ℭ'), (7, 'ℌ'), (8, 'ℑ'), (17, 'ℜ'), (25, 'ℨ')];
        alnum_map(
            |i| {
                if let Some((_, c)) = exceptions_upper.iter().find(|(idx, _)| *idx == i) {
                    *c
                } else {
                    char::from_u32(0x1D504 + i as u32).unwrap_or((b'A' + i) as char)
                }
            },
            |i| char::from_u32(0x1D51E + i as u32).unwrap_or((b'a' + i) as char),
            |i| (b'0' + i) as char,
        )
    })
}

/// Mathematical script ("cursive") letters, skipping the reserved-codepoint
/// exceptions (B, E, F, H, I, L, M, R).
fn cursive_map() -> &'static HashMap<char, char> {
    static MAP: OnceLock<HashMap<char, char>> = OnceLock::new();
    MAP.get_or_init(|| {
        let exceptions_upper: &[(u8, char)] = &[
            (1, 'ℬ'),
            (4, 'ℰ'),
            (5, 'ℱ'),
            (7, 'ℋ'),
            (8, 'ℐ'),
            (11, 'ℒ'),
            (12, 'ℳ'),
            (17, 'ℛ'),
        ];
        let exceptions_lower: &[(u8, char)] = &[(4, 'ℯ'), (7, 'ℴ')];
        alnum_map(
            |i| {
                if let Some((_, c)) = exceptions_upper.iter().find(|(idx, _)| *idx == i) {
                    *c
                } else {
                    char::from_u32(0x1D49C + i as u32).unwrap_or((b'A' + i) as char)
                }
            },
            |i| {
                if let Some((_, c)) = exceptions_lower.iter().find(|(idx, _)| *idx == i) {
                    *c
                } else {
                    char::from_u32(0x1D4B6 + i as u32).unwrap_or((b'a' + i) as char)
                }
            },
            |i| (b'0' + i) as char,
        )
    })
}

/// Mathematical sans-serif bold letters/digits, used as the "blocks" look
/// (a solid, heavy-weight rendering).
fn blocks_map() -> &'static HashMap<char, char> {
    static MAP: OnceLock<HashMap<char, char>> = OnceLock::new();
    MAP.get_or_init(|| {
        alnum_map(
            |i| char::from_u32(0x1D5D4 + i as u32).unwrap_or((b'A' + i) as char),
            |i| char::from_u32(0x1D5EE + i as u32).unwrap_or((b'a' + i) as char),
            |i| char::from_u32(0x1D7EC + i as u32).unwrap_or((b'0' + i) as char),
        )
    })
}

/// Upside-down text: per-character substitution (where a rotation-alike
/// glyph exists) plus a full reverse, matching how the original's font
/// table reads (each character replaced, then the string flipped end to
/// end).
fn upsidedown(text: &str) -> String {
    static MAP: OnceLock<HashMap<char, char>> = OnceLock::new();
    let map = MAP.get_or_init(|| {
        let pairs = [
            ('a', 'ɐ'), ('b', 'q'), ('c', 'ɔ'), ('d', 'p'), ('e', 'ǝ'), ('f', 'ɟ'),
            ('g', 'ƃ'), ('h', 'ɥ'), ('i', 'ᴉ'), ('j', 'ɾ'), ('k', 'ʞ'), ('l', 'l'),
            ('m', 'ɯ'), ('n', 'u'), ('o', 'o'), ('p', 'd'), ('q', 'b'), ('r', 'ɹ'),
            ('s', 's'), ('t', 'ʇ'), ('u', 'n'), ('v', 'ʌ'), ('w', 'ʍ'), ('x', 'x'),
            ('y', 'ʎ'), ('z', 'z'),
            ('A', '∀'), ('B', 'Ԑ'), ('C', 'Ɔ'), ('D', 'ᗡ'), ('E', 'Ǝ'), ('F', 'Ⅎ'),
            ('G', '⅁'), ('H', 'H'), ('I', 'I'), ('J', 'ſ'), ('K', 'ʞ'), ('L', '⅂'),
            ('M', 'W'), ('N', 'N'), ('O', 'O'), ('P', 'Ԁ'), ('Q', 'Ό'), ('R', 'ᴚ'),
            ('S', 'S'), ('T', '⊥'), ('U', '∩'), ('V', 'Λ'), ('W', 'M'), ('X', 'X'),
            ('Y', '⅄'), ('Z', 'Z'),
            ('0', '0'), ('1', 'Ɩ'), ('2', 'ᄅ'), ('3', 'Ɛ'), ('4', 'ㄣ'), ('5', 'ϛ'),
            ('6', '9'), ('7', 'ㄥ'), ('8', '8'), ('9', '6'),
            ('.', '˙'), (',', '\''), ('?', '¿'), ('!', '¡'), ('\'', ','),
        ];
        pairs.into_iter().collect()
    });
    text.chars().rev().map(|c| map.get(&c).copied().unwrap_or(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rot13_is_involutive() {
        let text = "Hello, World! 123";
        assert_eq!(rot13(&rot13(text)), text);
    }

    #[test]
    fn reverse_is_involutive() {
        let text = "abcdef";
        assert_eq!(reverse(&reverse(text)), text);
    }

    #[test]
    fn normal_is_identity() {
        assert_eq!(normal("anything goes"), "anything goes");
    }

    #[test]
    fn unknown_font_name_is_identity() {
        assert_eq!(apply("not-a-font", "hello"), "hello");
    }

    #[test]
    fn bubbles_substitutes_known_letters_and_passes_through_punctuation() {
        let out = apply("bubbles", "Hi!");
        assert!(out.ends_with('!'));
        assert_ne!(out, "Hi!");
    }
}
