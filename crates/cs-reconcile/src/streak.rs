// streak.rs: The streak transition rule.

/// New streak given the prior value and this cycle's verdict.
///
/// A fully completed cycle extends the streak by one; anything less resets
/// it to zero. There is no ceiling.
pub fn next_streak(prior: u64, all_complete: bool) -> u64 {
    if all_complete {
        prior.saturating_add(1)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_cycle_increments() {
        assert_eq!(next_streak(0, true), 1);
        assert_eq!(next_streak(3, true), 4);
    }

    #[test]
    fn incomplete_cycle_resets() {
        assert_eq!(next_streak(0, false), 0);
        assert_eq!(next_streak(41, false), 0);
    }

    #[test]
    fn does_not_overflow() {
        assert_eq!(next_streak(u64::MAX, true), u64::MAX);
    }
}
