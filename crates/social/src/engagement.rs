//! Time-decayed engagement scoring used for trending order.

use chrono::{DateTime, Utc};

const DECAY_RATE: f64 = 0.1;
const DECAY_FLOOR: f64 = 0.1;

/// Raw interaction counters of a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub likes: i64,
    pub loves: i64,
    pub motivates: i64,
    pub comments: i64,
    pub shares: i64,
    pub views: i64,
}

impl Counters {
    fn weighted(&self) -> f64 {
        self.likes as f64
            + self.loves as f64 * 2.0
            + self.motivates as f64 * 3.0
            + self.comments as f64 * 5.0
            + self.shares as f64 * 10.0
            + self.views as f64 * 0.1
    }
}

/// Decay multiplier for a post of the given age. Never drops below 0.1.
pub fn decay(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - created_at).num_seconds().max(0) as f64 / 3600.0;
    (1.0 / (1.0 + hours * DECAY_RATE)).max(DECAY_FLOOR)
}

pub fn engagement_score(counters: &Counters, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    counters.weighted() * decay(created_at, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn counters() -> Counters {
        Counters {
            likes: 4,
            loves: 2,
            motivates: 1,
            comments: 2,
            shares: 1,
            views: 30,
        }
    }

    #[test]
    fn fresh_post_is_not_decayed() {
        let now = Utc::now();
        // 4 + 4 + 3 + 10 + 10 + 3
        let score = engagement_score(&counters(), now, now);
        assert!((score - 34.0).abs() < 1e-9);
    }

    #[test]
    fn score_halves_after_ten_hours() {
        let now = Utc::now();
        let score = engagement_score(&counters(), now - Duration::hours(10), now);
        assert!((score - 17.0).abs() < 1e-9);
    }

    #[test]
    fn decay_is_floored() {
        let now = Utc::now();
        assert!((decay(now - Duration::days(365), now) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn future_timestamps_do_not_boost() {
        let now = Utc::now();
        assert!((decay(now + Duration::hours(3), now) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_post_scores_zero() {
        let now = Utc::now();
        assert_eq!(engagement_score(&Counters::default(), now, now), 0.0);
    }
}
