use chrono::{DateTime, Utc};

use crate::channel_state::{ChannelState, TOGGLE_DEFAULTS};

/// Default throttle duration: 30 minutes, matching `DEFAULT_THROTTLE` in
/// `original_source/jbot.go`.
pub const DEFAULT_THROTTLE_SECS: i64 = 1800;

/// Check-and-arm a named throttle.
///
/// The throttles map stores, per name, the "next-allowed-at" instant. If the
/// name has never been armed, or `now` is past the stored instant, the
/// throttle is open: this call re-arms it to `now + DEFAULT_THROTTLE_SECS`
/// and returns `true` ("not throttled", i.e. the caller may proceed). If
/// `now` is still before the stored instant, the throttle is closed: this
/// call leaves it untouched and returns `false`.
///
/// This mirrors `original_source/jbot.go::isThrottled`'s exact semantics: a
/// side-effecting check-and-arm, not a pure predicate.
pub fn check_and_arm(ch: &mut ChannelState, name: &str, now: DateTime<Utc>) -> bool {
    check_and_arm_for(ch, name, now, DEFAULT_THROTTLE_SECS)
}

/// As [`check_and_arm`] but with an explicit re-arm duration, for callers
/// like the auto-reply engine that re-arm to a caller-supplied number of
/// minutes rather than the default 30.
pub fn check_and_arm_for(
    ch: &mut ChannelState,
    name: &str,
    now: DateTime<Utc>,
    arm_for_secs: i64,
) -> bool {
    if is_open(ch, name, now) {
        arm_until(ch, name, now + chrono::Duration::seconds(arm_for_secs));
        true
    } else {
        false
    }
}

/// Explicitly arm a throttle to expire at an arbitrary future time (used by
/// the `!throttle` command and by the auto-reply engine's per-pattern
/// throttle, which re-arms to a caller-chosen number of minutes rather than
/// the default 30).
pub fn arm_until(ch: &mut ChannelState, name: &str, until: DateTime<Utc>) {
    ch.throttles.insert(name.to_string(), until.to_rfc3339());
}

/// Is the named throttle currently open, without the side-effecting re-arm?
/// Used where a caller needs to know the state of a throttle that another
/// path will do the check-and-arm for, and in tests.
pub fn is_open(ch: &ChannelState, name: &str, now: DateTime<Utc>) -> bool {
    match ch.throttles.get(name) {
        None => true,
        Some(ts) => match DateTime::parse_from_rfc3339(ts) {
            Ok(armed_at) => now >= armed_at.with_timezone(&Utc),
            Err(_) => true,
        },
    }
}

/// Clear a single named throttle.
pub fn clear(ch: &mut ChannelState, name: &str) {
    ch.throttles.remove(name);
}

/// Clear every throttle (`!unthrottle *` / `!unthrottle everything`).
pub fn clear_all(ch: &mut ChannelState) {
    ch.throttles.clear();
}

/// Read a toggle's current value, defaulting to `false` if the channel has
/// never seen this name (should not happen for the six known names after
/// `backfill_toggles`, but custom names may be flipped too — see `flip`).
pub fn get(ch: &ChannelState, name: &str) -> bool {
    ch.toggles.get(name).copied().unwrap_or(false)
}

/// Flip a named toggle. Per spec §4.4: a request to flip a name that
/// doesn't exist yet in the channel but *does* exist in the global default
/// set creates it with value `true`; a name outside that set is rejected
/// (the command layer surfaces this as a usage error).
pub fn flip(ch: &mut ChannelState, name: &str) -> Result<bool, ()> {
    if let Some(v) = ch.toggles.get_mut(name) {
        *v = !*v;
        return Ok(*v);
    }
    if TOGGLE_DEFAULTS.iter().any(|(n, _)| *n == name) {
        ch.toggles.insert(name.to_string(), true);
        return Ok(true);
    }
    Err(())
}

pub fn set(ch: &mut ChannelState, name: &str, value: bool) {
    ch.toggles.insert(name.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatType;
    use chrono::Duration;

    fn ch() -> ChannelState {
        ChannelState::new("ops", "C1", ChatType::Rtm)
    }

    #[test]
    fn first_check_arms_and_returns_not_throttled() {
        let mut c = ch();
        let now = Utc::now();
        assert!(check_and_arm(&mut c, "cve-alert", now));
        assert!(c.throttles.contains_key("cve-alert"));
    }

    #[test]
    fn second_check_within_window_is_throttled() {
        let mut c = ch();
        let now = Utc::now();
        assert!(check_and_arm(&mut c, "t", now));
        assert!(!check_and_arm(&mut c, "t", now + Duration::seconds(10)));
    }

    #[test]
    fn check_after_window_reopens_and_rearms() {
        let mut c = ch();
        let t0 = Utc::now();
        assert!(check_and_arm(&mut c, "t", t0));
        let t1 = t0 + Duration::seconds(DEFAULT_THROTTLE_SECS + 1);
        assert!(check_and_arm(&mut c, "t", t1));
        // invariant 3: closed for at least DEFAULT_THROTTLE seconds after
        // a check-and-arm that found it open.
        let t2 = t1 + Duration::seconds(DEFAULT_THROTTLE_SECS - 1);
        assert!(!check_and_arm(&mut c, "t", t2));
    }

    #[test]
    fn flip_known_name_from_missing_creates_true() {
        let mut c = ch();
        c.toggles.remove("python");
        assert_eq!(flip(&mut c, "python"), Ok(true));
    }

    #[test]
    fn flip_unknown_name_is_rejected() {
        let mut c = ch();
        assert_eq!(flip(&mut c, "not-a-real-toggle"), Err(()));
    }

    #[test]
    fn flip_existing_toggles_value() {
        let mut c = ch();
        assert_eq!(get(&c, "chatter"), false);
        assert_eq!(flip(&mut c, "chatter"), Ok(true));
        assert_eq!(flip(&mut c, "chatter"), Ok(false));
    }

    #[test]
    fn clear_all_empties_throttles() {
        let mut c = ch();
        check_and_arm(&mut c, "a", Utc::now());
        check_and_arm(&mut c, "b", Utc::now());
        clear_all(&mut c);
        assert!(c.throttles.is_empty());
    }
}
