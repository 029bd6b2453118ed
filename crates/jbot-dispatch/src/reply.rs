//! The reply layer (spec §4.11): counts, destination resolution, thread
//! anchoring, chunking at [`LIMIT`], and the channel's font transform.

use jbot_core::counters::Counters;
use jbot_core::store::ChannelStore;
use jbot_core::types::Recipient;
use jbot_transport::Transport;
use tracing::warn;

use crate::error::Result;
use crate::fonts;

/// `SLACK_MAX_LENGTH` (spec §4.11, §6).
pub const LIMIT: usize = jbot_core::config::SLACK_MAX_LENGTH;

/// Deliver `text` to `r`, applying the destination channel's font transform
/// first and chunking the result below [`LIMIT`].
pub async fn reply(
    transport: &dyn Transport,
    store: &ChannelStore,
    counters: &mut Counters,
    r: &Recipient,
    text: &str,
) -> Result<()> {
    counters.increment("replies", text);

    let font = store
        .get_by_id(&r.reply_to)
        .and_then(|ch| ch.settings.get("font"))
        .cloned()
        .unwrap_or_default();
    let rendered = fonts::apply(&font, text);

    let chunks = chunk(&rendered);
    let known_channel = store.get_by_id(&r.reply_to).is_some();
    let thread_ts = r.has_thread().then(|| r.thread_ts.as_str());

    for chunk_text in &chunks {
        if known_channel {
            transport.say(&r.reply_to, chunk_text, thread_ts).await?;
        } else {
            transport.direct_message(&r.user_id, chunk_text).await?;
        }
    }
    Ok(())
}

/// Split `text` into message-size chunks per spec §4.11 step 4: while the
/// remainder exceeds [`LIMIT`], look for the last newline in the first
/// `LIMIT - 1` bytes, else the last space, else the last comma, and emit the
/// prefix up to and including that boundary. If no boundary exists at all,
/// emit a truncation warning followed by the raw first `LIMIT - 1` bytes and
/// continue from there.
pub fn chunk(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut remaining = text;

    while remaining.len() > LIMIT {
        let window_end = floor_char_boundary(remaining, LIMIT - 1);
        let window = &remaining[..window_end];
        let boundary = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .or_else(|| window.rfind(','));

        match boundary {
            Some(pos) => {
                let split_at = pos + 1;
                out.push(remaining[..split_at].to_string());
                remaining = &remaining[split_at..];
            }
            None => {
                warn!("reply chunk has no clean split point, truncating");
                out.push("(message too long, truncating...)".to_string());
                let cut = floor_char_boundary(remaining, LIMIT - 1);
                out.push(remaining[..cut].to_string());
                remaining = &remaining[cut..];
            }
        }
    }
    if !remaining.is_empty() {
        out.push(remaining.to_string());
    }
    out
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn long_sentence_splits_on_word_boundaries_and_reassembles() {
        // Scenario D: a 10_000-char message made of space-separated words so
        // every split point is a clean boundary; concatenation must equal
        // the original and every chunk must be <= LIMIT.
        let word = "lorem ";
        let mut text = String::new();
        while text.len() < 10_000 {
            text.push_str(word);
        }
        text.truncate(10_000);

        let chunks = chunk(&text);
        let reassembled: String = chunks.concat();
        assert_eq!(reassembled, text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.len() <= LIMIT);
        }
    }

    #[test]
    fn no_boundary_emits_truncation_warning_then_raw_prefix() {
        let text = "x".repeat(LIMIT * 2);
        let chunks = chunk(&text);
        assert!(chunks[0].starts_with("(message too long"));
        assert_eq!(chunks[1].len(), LIMIT - 1);
    }
}
