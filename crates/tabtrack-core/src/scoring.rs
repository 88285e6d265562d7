//! Focus, activity and productivity scores.
//!
//! All functions here are pure; the session state machine feeds them its
//! counters and stores the results.

use tabtrack_storage::Category;

/// Sessions younger than this always get a full activity score
pub const ACTIVITY_WARMUP_MS: i64 = 60_000;
/// Session length at which the length factor stops growing (25 minutes)
pub const FULL_LENGTH_MS: i64 = 1_500_000;
/// Points deducted from the final focus score per distraction
pub const DISTRACTION_PENALTY: f64 = 5.0;

/// Inputs of the final focus computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusInputs {
    /// Live focus score at the moment the session ends
    pub focus_score: u8,
    pub time_spent_active_ms: i64,
    pub time_spent_idle_ms: i64,
    pub duration_ms: i64,
    pub distractions: u32,
}

/// Activity score from input events per minute of elapsed session time
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn activity_score(elapsed_ms: i64, input_events: u64) -> u8 {
    if elapsed_ms < ACTIVITY_WARMUP_MS {
        return 100;
    }
    let minutes = elapsed_ms as f64 / 60_000.0;
    let rate = input_events as f64 / minutes;

    if (30.0..=60.0).contains(&rate) {
        100
    } else if (15.0..=90.0).contains(&rate) {
        80
    } else if (5.0..=120.0).contains(&rate) {
        60
    } else {
        40
    }
}

/// Final focus score of an ended session, in 0..=100
///
/// The live score is weighted by the share of active time and by session
/// length (half weight at zero length, full weight from 25 minutes), then
/// reduced by a fixed penalty per distraction.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn final_focus_score(inputs: &FocusInputs) -> u8 {
    let mut score = f64::from(inputs.focus_score);

    let active = inputs.time_spent_active_ms.max(0) as f64;
    let idle = inputs.time_spent_idle_ms.max(0) as f64;
    let tracked = active + idle;
    if tracked > 0.0 {
        score *= active / tracked;
    }

    let length_factor = (inputs.duration_ms.max(0) as f64 / FULL_LENGTH_MS as f64).min(1.0);
    score *= 0.5 + 0.5 * length_factor;

    score -= f64::from(inputs.distractions) * DISTRACTION_PENALTY;

    score.round().clamp(0.0, 100.0) as u8
}

/// Category base score scaled by the final focus score
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn productivity_score(category: Category, final_focus: u8) -> u8 {
    let score = f64::from(category.base_score()) * f64::from(final_focus) / 100.0;
    score.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_session(distractions: u32) -> FocusInputs {
        FocusInputs {
            focus_score: 100,
            time_spent_active_ms: 1_500_000,
            time_spent_idle_ms: 0,
            duration_ms: 1_500_000,
            distractions,
        }
    }

    #[test]
    fn test_activity_score_warmup() {
        assert_eq!(activity_score(0, 0), 100);
        assert_eq!(activity_score(59_999, 10_000), 100);
    }

    #[test]
    fn test_activity_score_bands() {
        // 10 minutes
        let elapsed = 600_000;
        assert_eq!(activity_score(elapsed, 400), 100); // 40/min
        assert_eq!(activity_score(elapsed, 300), 100); // 30/min, inclusive
        assert_eq!(activity_score(elapsed, 200), 80); // 20/min
        assert_eq!(activity_score(elapsed, 800), 80); // 80/min
        assert_eq!(activity_score(elapsed, 100), 60); // 10/min
        assert_eq!(activity_score(elapsed, 1_100), 60); // 110/min
        assert_eq!(activity_score(elapsed, 20), 40); // 2/min
        assert_eq!(activity_score(elapsed, 2_000), 40); // 200/min
    }

    #[test]
    fn test_final_focus_full_session() {
        assert_eq!(final_focus_score(&full_session(0)), 100);
        assert_eq!(final_focus_score(&full_session(2)), 90);
    }

    #[test]
    fn test_final_focus_weights_idle_and_length() {
        let inputs = FocusInputs {
            focus_score: 80,
            time_spent_active_ms: 300_000,
            time_spent_idle_ms: 300_000,
            duration_ms: 750_000,
            distractions: 0,
        };
        // 80 * 0.5 * (0.5 + 0.5 * 0.5) = 30
        assert_eq!(final_focus_score(&inputs), 30);
    }

    #[test]
    fn test_final_focus_no_tracked_time_uses_full_ratio() {
        let inputs = FocusInputs {
            focus_score: 100,
            time_spent_active_ms: 0,
            time_spent_idle_ms: 0,
            duration_ms: 0,
            distractions: 0,
        };
        assert_eq!(final_focus_score(&inputs), 50);
    }

    #[test]
    fn test_final_focus_clamps_at_zero() {
        assert_eq!(final_focus_score(&full_session(40)), 0);
    }

    #[test]
    fn test_productivity_score() {
        assert_eq!(productivity_score(Category::Productive, 80), 64);
        assert_eq!(productivity_score(Category::HighlyProductive, 100), 100);
        assert_eq!(productivity_score(Category::Unproductive, 50), 10);
        assert_eq!(productivity_score(Category::Break, 0), 0);
    }
}
