//! `!top` and `!cve`: special-cased alongside `leave`/`help` in
//! `jbot_dispatch::commands`, because both need state
//! [`jbot_core::types::CommandFn`] structurally cannot reach — `top` reads
//! the process-wide [`jbot_core::Counters`] (not a single channel's
//! state), and `cve` reads the scheduler's shared CVE feed cache. Grounded
//! in `original_source/jbot.go::cmdCurses`'s no-args branch (global counter
//! top-N report) and `cmdCve` (single-CVE lookup), both of which read
//! Go package-level globals a fixed per-channel function signature can't
//! express in this codebase's typed, global-free design (see DESIGN.md).

use jbot_core::counters::{Counters, CATEGORIES};
use jbot_scheduler::CveCache;

/// `!top <category>`: the `counterName (count)` list for `category`,
/// descending by count, capped at 10 entries.
pub fn top(counters: &Counters, category: &str) -> String {
    let category = category.trim();
    if category.is_empty() {
        return format!("Usage: !top <category>, where category is one of: {}", CATEGORIES.join(", "));
    }
    if !CATEGORIES.contains(&category) {
        return format!("Unknown category {category:?}. Try one of: {}", CATEGORIES.join(", "));
    }

    let entries = counters.get_sorted_keys(category);
    if entries.is_empty() {
        return format!("No {category} recorded yet.");
    }
    entries
        .into_iter()
        .take(10)
        .map(|(name, count)| format!("{name} ({count})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `!cve <id>`: look up `id` (with or without the `CVE-` prefix) in the
/// scheduler's already-fetched feed cache and render it the way a
/// `cve-alert` firing would.
pub fn cve(cache: &CveCache, id: &str) -> String {
    let id = id.trim();
    if id.is_empty() {
        return "Usage: !cve <CVE-YYYY-NNNN>".to_string();
    }
    let normalized = if id.to_uppercase().starts_with("CVE-") {
        id.to_uppercase()
    } else {
        format!("CVE-{}", id.to_uppercase())
    };

    let guard = cache.lock().expect("cve cache mutex poisoned");
    match guard.get(&normalized) {
        Some(item) => jbot_scheduler::cve::format_cve(item),
        None => format!("No data found for {normalized}"),
    }
}
