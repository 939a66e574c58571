//! Remaining duration budget of a playlist owner.

/// Duration that may be stored for an item, given the playlist's time limit
/// and the owner content already in it.
///
/// Exempt callers and unlimited playlists keep the candidate. Never negative.
pub fn allowed_duration(
    time_limit: i64,
    owner_duration: i64,
    candidate: i64,
    is_exempt: bool,
) -> i64 {
    let candidate = candidate.max(0);
    if time_limit <= 0 || is_exempt {
        return candidate;
    }

    let remaining = time_limit - owner_duration;
    if remaining <= 0 {
        0
    } else {
        candidate.min(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_and_exempt_keep_candidate() {
        assert_eq!(allowed_duration(0, 500, 30, false), 30);
        assert_eq!(allowed_duration(60, 500, 30, true), 30);
    }

    #[test]
    fn test_clamped_to_remaining() {
        assert_eq!(allowed_duration(60, 40, 30, false), 20);
        assert_eq!(allowed_duration(60, 40, 10, false), 10);
        assert_eq!(allowed_duration(60, 60, 10, false), 0);
        assert_eq!(allowed_duration(60, 90, 10, false), 0);
    }

    #[test]
    fn test_negative_candidate() {
        assert_eq!(allowed_duration(60, 0, -5, false), 0);
        assert_eq!(allowed_duration(0, 0, -5, true), 0);
    }

    #[test]
    fn test_monotonic_in_owner_duration() {
        for candidate in [0, 1, 15, 45, 300] {
            let mut previous = i64::MAX;
            for owner_duration in 0..=200 {
                let allowed = allowed_duration(120, owner_duration, candidate, false);
                assert!(allowed >= 0);
                assert!(allowed <= previous);
                previous = allowed;
            }
        }
    }
}
