//! Ranking values derived from a discussion's tally.
//!
//! Both values are recomputed together with the score snapshot and stored on
//! the discussion row so listings can sort by them without touching votes.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ScoreSnapshot;

/// Reference instant for the hot score time component (2005-12-08T07:46:43Z).
pub const HOT_SCORE_EPOCH: i64 = 1_134_028_003;

/// Seconds of age worth one order of magnitude of score.
pub const HOT_SCORE_DECAY_SECS: f64 = 45_000.0;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Ranking {
    pub hot_score: f64,
    pub controversy_score: f64,
}

impl Ranking {
    pub fn compute(snapshot: &ScoreSnapshot, created_at: DateTime<Utc>) -> Self {
        Self {
            hot_score: hot_score(snapshot.score, created_at),
            controversy_score: controversy_score(snapshot.upvotes, snapshot.downvotes),
        }
    }
}

/// Logarithmic score plus a linear bonus for newer posts.
pub fn hot_score(score: i64, created_at: DateTime<Utc>) -> f64 {
    let order = (score.unsigned_abs().max(1) as f64).log10();
    let sign = score.signum() as f64;
    let seconds = (created_at.timestamp() - HOT_SCORE_EPOCH) as f64;
    sign * order + seconds / HOT_SCORE_DECAY_SECS
}

/// High when many votes are split evenly; zero when either side has none.
pub fn controversy_score(upvotes: i64, downvotes: i64) -> f64 {
    if upvotes <= 0 || downvotes <= 0 {
        return 0.0;
    }

    let magnitude = (upvotes + downvotes) as f64;
    let balance = if upvotes > downvotes {
        downvotes as f64 / upvotes as f64
    } else {
        upvotes as f64 / downvotes as f64
    };

    magnitude.powf(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_hot_score_at_epoch_is_log_of_score() {
        assert_eq!(hot_score(0, at(HOT_SCORE_EPOCH)), 0.0);
        assert_eq!(hot_score(1, at(HOT_SCORE_EPOCH)), 0.0);
        assert!((hot_score(100, at(HOT_SCORE_EPOCH)) - 2.0).abs() < 1e-9);
        assert!((hot_score(-100, at(HOT_SCORE_EPOCH)) + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_hot_score_favours_newer_posts() {
        let older = hot_score(10, at(HOT_SCORE_EPOCH + 45_000));
        let newer = hot_score(10, at(HOT_SCORE_EPOCH + 90_000));
        assert!((newer - older - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_controversy_needs_both_sides() {
        assert_eq!(controversy_score(0, 5), 0.0);
        assert_eq!(controversy_score(5, 0), 0.0);
    }

    #[test]
    fn test_controversy_peaks_on_even_split() {
        assert_eq!(controversy_score(5, 5), 10.0);
        assert!(controversy_score(9, 1) < controversy_score(5, 5));
        assert_eq!(controversy_score(2, 8), controversy_score(8, 2));
    }
}
