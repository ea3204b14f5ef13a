use crate::models::{round_to, Difficulty, Level, Question};

pub const FIRST_ATTEMPT_BONUS: i64 = 25;
pub const HINT_PENALTY: i64 = 5;
pub const STREAK_BONUS_PER_DAY: f64 = 0.10;
pub const MAX_STREAK_BONUS: f64 = 0.50;
pub const SESSION_XP_PER_POINT: f64 = 5.0;

pub fn base_xp(difficulty: Difficulty) -> i64 {
    match difficulty {
        Difficulty::Easy => 5,
        Difficulty::Medium => 10,
        Difficulty::Hard => 15,
        Difficulty::Expert => 20,
    }
}

pub fn question_xp(
    difficulty: Difficulty,
    is_correct: bool,
    is_first_attempt: bool,
    hints_used: u32,
    streak_days: u32,
) -> i64 {
    let mut xp = base_xp(difficulty);

    if is_correct {
        xp = (xp as f64 * 1.5) as i64;
    }

    if is_first_attempt {
        xp += FIRST_ATTEMPT_BONUS;
    }

    xp = (xp - HINT_PENALTY * hints_used as i64).max(1);

    let streak_bonus = (streak_days as f64 * STREAK_BONUS_PER_DAY).min(MAX_STREAK_BONUS);
    (xp as f64 * (1.0 + streak_bonus)) as i64
}

/// Percentage of correct answers; 0 for an empty session.
pub fn final_score(correct_answers: usize, total_questions: usize) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    correct_answers as f64 * 100.0 / total_questions as f64
}

pub fn level_for_score(score: f64) -> Level {
    if score >= 90.0 {
        Level::Expert
    } else if score >= 75.0 {
        Level::Advanced
    } else if score >= 50.0 {
        Level::Intermediate
    } else {
        Level::Beginner
    }
}

pub fn session_xp(score: f64) -> i64 {
    (score * SESSION_XP_PER_POINT).floor() as i64
}

pub fn recommendation(score: f64) -> &'static str {
    if score < 50.0 {
        "Review the fundamentals before moving on"
    } else if score < 75.0 {
        "Keep practicing your weak topics"
    } else {
        "Excellent! Move on to the next level"
    }
}

/// Applies one answer to the question's lifetime usage counters.
pub fn record_question_attempt(question: &mut Question, is_correct: bool, time_seconds: u32) {
    question.times_shown += 1;
    if is_correct {
        question.times_correct += 1;
    }

    let n = question.times_shown as f64;
    let avg = match question.avg_time_seconds {
        None => time_seconds as f64,
        Some(old) => (old * (n - 1.0) + time_seconds as f64) / n,
    };
    question.avg_time_seconds = Some(round_to(avg, 2));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionKind;

    fn blank_question() -> Question {
        Question {
            id: 1,
            kind: QuestionKind::TrueFalse,
            difficulty: Difficulty::Easy,
            prompt: "Rust has a garbage collector".to_string(),
            code_snippet: None,
            code_language: None,
            options: None,
            correct_answer: "false".to_string(),
            explanation: None,
            hints: vec![],
            times_shown: 0,
            times_correct: 0,
            avg_time_seconds: None,
            is_active: true,
        }
    }

    mod question_xp_tests {
        use super::*;

        #[test]
        fn medium_correct_first_attempt_with_streak() {
            // floor(10 * 1.5) + 25 = 40, then * 1.30
            assert_eq!(question_xp(Difficulty::Medium, true, true, 0, 3), 52);
        }

        #[test]
        fn base_values_when_wrong_without_bonus() {
            assert_eq!(question_xp(Difficulty::Easy, false, false, 0, 0), 5);
            assert_eq!(question_xp(Difficulty::Medium, false, false, 0, 0), 10);
            assert_eq!(question_xp(Difficulty::Hard, false, false, 0, 0), 15);
            assert_eq!(question_xp(Difficulty::Expert, false, false, 0, 0), 20);
        }

        #[test]
        fn correct_multiplier_truncates() {
            // 5 * 1.5 = 7.5
            assert_eq!(question_xp(Difficulty::Easy, true, false, 0, 0), 7);
            assert_eq!(question_xp(Difficulty::Hard, true, false, 0, 0), 22);
        }

        #[test]
        fn hints_reduce_but_never_below_one() {
            assert_eq!(question_xp(Difficulty::Expert, false, false, 2, 0), 10);
            assert_eq!(question_xp(Difficulty::Easy, false, false, 10, 0), 1);
        }

        #[test]
        fn streak_bonus_is_capped() {
            assert_eq!(question_xp(Difficulty::Expert, false, false, 0, 5), 30);
            assert_eq!(question_xp(Difficulty::Expert, false, false, 0, 40), 30);
        }

        #[test]
        fn minimum_after_hints_still_gets_streak_bonus() {
            // max(1, 5 - 50) = 1, * 1.5 = 1.5 -> 1
            assert_eq!(question_xp(Difficulty::Easy, false, false, 10, 5), 1);
        }
    }

    mod score_tests {
        use super::*;

        #[test]
        fn final_score_is_percentage() {
            assert_eq!(final_score(12, 15), 80.0);
            assert_eq!(final_score(0, 10), 0.0);
            assert_eq!(final_score(10, 10), 100.0);
        }

        #[test]
        fn final_score_empty_session_is_zero() {
            assert_eq!(final_score(0, 0), 0.0);
        }

        #[test]
        fn level_thresholds() {
            assert_eq!(level_for_score(100.0), Level::Expert);
            assert_eq!(level_for_score(90.0), Level::Expert);
            assert_eq!(level_for_score(89.9), Level::Advanced);
            assert_eq!(level_for_score(75.0), Level::Advanced);
            assert_eq!(level_for_score(74.9), Level::Intermediate);
            assert_eq!(level_for_score(50.0), Level::Intermediate);
            assert_eq!(level_for_score(49.9), Level::Beginner);
            assert_eq!(level_for_score(0.0), Level::Beginner);
        }

        #[test]
        fn session_xp_floors() {
            assert_eq!(session_xp(100.0), 500);
            assert_eq!(session_xp(66.666), 333);
            assert_eq!(session_xp(0.0), 0);
        }

        #[test]
        fn recommendations_follow_score_bands() {
            assert!(recommendation(30.0).contains("fundamentals"));
            assert!(recommendation(60.0).contains("weak topics"));
            assert!(recommendation(75.0).contains("Excellent"));
        }
    }

    mod usage_stats_tests {
        use super::*;

        #[test]
        fn first_attempt_sets_average() {
            let mut q = blank_question();
            record_question_attempt(&mut q, true, 40);
            assert_eq!(q.times_shown, 1);
            assert_eq!(q.times_correct, 1);
            assert_eq!(q.avg_time_seconds, Some(40.0));
        }

        #[test]
        fn incremental_mean() {
            let mut q = blank_question();
            record_question_attempt(&mut q, true, 40);
            record_question_attempt(&mut q, false, 20);
            record_question_attempt(&mut q, false, 30);
            assert_eq!(q.times_shown, 3);
            assert_eq!(q.times_correct, 1);
            assert_eq!(q.avg_time_seconds, Some(30.0));
        }

        #[test]
        fn average_rounded_to_cents() {
            let mut q = blank_question();
            record_question_attempt(&mut q, false, 10);
            record_question_attempt(&mut q, false, 10);
            record_question_attempt(&mut q, false, 11);
            assert_eq!(q.avg_time_seconds, Some(10.33));
        }
    }
}
