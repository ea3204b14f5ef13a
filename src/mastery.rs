use chrono::{DateTime, Duration, Utc};

use crate::models::{round_to, TopicMastery};

// Keeps review dates representable
pub const MAX_INTERVAL_DAYS: i64 = 36_500;

/// Recall quality (0..=5) derived from correctness and response time.
pub fn quality_from_answer(is_correct: bool, time_seconds: u32) -> u8 {
    if !is_correct {
        return 1;
    }
    match time_seconds {
        0..=29 => 5,
        30..=59 => 4,
        _ => 3,
    }
}

pub fn next_ease_factor(ease_factor: f64, quality: u8) -> f64 {
    let q = 5.0 - quality.min(5) as f64;
    (ease_factor + 0.1 - q * (0.08 + q * 0.02)).max(TopicMastery::MIN_EASE)
}

/// Returns the new interval in days and whether the topic needs review.
pub fn next_interval(interval_days: i64, ease_factor: f64, quality: u8) -> (i64, bool) {
    if quality < 3 {
        return (1, true);
    }
    let interval = if interval_days <= 1 {
        6
    } else {
        (interval_days as f64 * ease_factor).floor() as i64
    };
    (interval.clamp(1, MAX_INTERVAL_DAYS), false)
}

/// Applies one practice result to a mastery record.
pub fn record_practice(
    mastery: &mut TopicMastery,
    is_correct: bool,
    quality: u8,
    now: DateTime<Utc>,
) {
    let quality = quality.min(5);

    mastery.times_practiced += 1;
    mastery.last_practiced_at = Some(now);
    if is_correct {
        mastery.times_correct += 1;
    } else {
        mastery.times_incorrect += 1;
    }

    let answered = mastery.times_correct + mastery.times_incorrect;
    mastery.mastery_score = if answered == 0 {
        0.0
    } else {
        round_to(mastery.times_correct as f64 * 100.0 / answered as f64, 2).clamp(0.0, 100.0)
    };

    // interval uses the ease factor from before this review
    let (interval, needs_review) = next_interval(mastery.interval_days, mastery.ease_factor, quality);
    mastery.interval_days = interval;
    mastery.needs_review = needs_review;
    mastery.ease_factor = next_ease_factor(mastery.ease_factor, quality);
    mastery.next_review_date = Some(now.date_naive() + Duration::days(interval));

    if mastery.is_mastered() && mastery.mastered_at.is_none() {
        mastery.mastered_at = Some(now);
    }
}
