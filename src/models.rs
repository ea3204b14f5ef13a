// Some fields are only read through serde when printing JSON
#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
}

// Question difficulty tiers, ordered from easiest to hardest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" | "e" => Some(Difficulty::Easy),
            "medium" | "m" => Some(Difficulty::Medium),
            "hard" | "h" => Some(Difficulty::Hard),
            "expert" | "x" => Some(Difficulty::Expert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    CodeCompletion,
    CodeReview,
    OpenEnded,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::TrueFalse => "true_false",
            QuestionKind::CodeCompletion => "code_completion",
            QuestionKind::CodeReview => "code_review",
            QuestionKind::OpenEnded => "open_ended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "multiple_choice" | "mcq" => Some(QuestionKind::MultipleChoice),
            "true_false" | "tf" => Some(QuestionKind::TrueFalse),
            "code_completion" => Some(QuestionKind::CodeCompletion),
            "code_review" => Some(QuestionKind::CodeReview),
            "open_ended" | "open" => Some(QuestionKind::OpenEnded),
            _ => None,
        }
    }
}

// Learner level within a skill. Ordering matters: levels only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Beginner = 0,
    Intermediate = 1,
    Advanced = 2,
    Expert = 3,
}

impl Level {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => Level::Intermediate,
            2 => Level::Advanced,
            3 => Level::Expert,
            _ => Level::Beginner,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
            Level::Expert => "expert",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
            Level::Expert => "Expert",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "beginner" | "0" => Some(Level::Beginner),
            "intermediate" | "1" => Some(Level::Intermediate),
            "advanced" | "2" => Some(Level::Advanced),
            "expert" | "3" => Some(Level::Expert),
            _ => None,
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Level::Beginner => Some(Level::Intermediate),
            Level::Intermediate => Some(Level::Advanced),
            Level::Advanced => Some(Level::Expert),
            Level::Expert => None,
        }
    }

    pub fn xp_threshold(&self) -> i64 {
        match self {
            Level::Beginner => 0,
            Level::Intermediate => 500,
            Level::Advanced => 1500,
            Level::Expert => 3500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
            SessionStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            "abandoned" => Some(SessionStatus::Abandoned),
            "expired" => Some(SessionStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub kind: QuestionKind,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub code_snippet: Option<String>,
    pub code_language: Option<String>,
    pub options: Option<Vec<AnswerOption>>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub hints: Vec<String>,
    pub times_shown: i64,
    pub times_correct: i64,
    pub avg_time_seconds: Option<f64>,
    pub is_active: bool,
}

impl Question {
    pub fn hint(&self, index: usize) -> Option<&str> {
        self.hints.get(index).map(String::as_str)
    }

    pub fn is_correct(&self, submitted: &str) -> bool {
        submitted.trim().to_lowercase() == self.correct_answer.trim().to_lowercase()
    }

    // Learner-facing projection: never carries the answer or explanation
    pub fn view(&self, time_limit_seconds: u32) -> QuestionView {
        QuestionView {
            id: self.id,
            kind: self.kind,
            difficulty: self.difficulty,
            prompt: self.prompt.clone(),
            code_snippet: self.code_snippet.clone(),
            code_language: self.code_language.clone(),
            options: self.options.clone(),
            has_hints: !self.hints.is_empty(),
            hints_count: self.hints.len(),
            time_limit_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: i64,
    pub kind: QuestionKind,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub code_snippet: Option<String>,
    pub code_language: Option<String>,
    pub options: Option<Vec<AnswerOption>>,
    pub has_hints: bool,
    pub hints_count: usize,
    pub time_limit_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentSession {
    pub id: i64,
    pub learner_id: i64,
    pub skill_id: i64,
    pub status: SessionStatus,
    pub question_ids: Vec<i64>,
    pub current_index: usize,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub score: Option<f64>,
    pub determined_level: Option<Level>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_limit_minutes: u32,
    pub credits_consumed: i64,
}

impl AssessmentSession {
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.started_at).num_seconds().max(0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.status != SessionStatus::InProgress {
            return false;
        }
        now.signed_duration_since(self.started_at)
            > Duration::minutes(self.time_limit_minutes as i64)
    }

    pub fn time_remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        if self.status != SessionStatus::InProgress {
            return 0;
        }
        let limit = self.time_limit_minutes as i64 * 60;
        (limit - self.elapsed_seconds(now)).max(0)
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        round_to(self.current_index as f64 / self.total_questions as f64 * 100.0, 1)
    }

    pub fn current_score_percentage(&self) -> f64 {
        if self.current_index == 0 {
            return 0.0;
        }
        round_to(self.correct_answers as f64 / self.current_index as f64 * 100.0, 1)
    }

    pub fn current_question_id(&self) -> Option<i64> {
        self.question_ids.get(self.current_index).copied()
    }

    pub fn all_answered(&self) -> bool {
        self.current_index >= self.total_questions
    }
}

// Consecutive-day activity tracking shared by learner profiles and skill levels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
    pub last_activity: Option<NaiveDate>,
}

impl Streak {
    pub fn record(&mut self, today: NaiveDate) {
        match self.last_activity {
            None => {
                self.current = 1;
                self.longest = self.longest.max(1);
            }
            Some(last) if last == today => return,
            Some(last) if last.succ_opt() == Some(today) => {
                self.current += 1;
                self.longest = self.longest.max(self.current);
            }
            Some(_) => self.current = 1,
        }
        self.last_activity = Some(today);
    }

    // Zero once a full day has been missed
    pub fn days_as_of(&self, today: NaiveDate) -> u32 {
        match self.last_activity {
            Some(last) if last.succ_opt().map_or(false, |next| next >= today) => self.current,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMastery {
    pub id: Option<i64>,
    pub learner_id: i64,
    pub topic_id: i64,
    pub skill_id: i64,
    pub mastery_score: f64,
    pub times_practiced: i64,
    pub times_correct: i64,
    pub times_incorrect: i64,
    pub ease_factor: f64,
    pub interval_days: i64,
    pub next_review_date: Option<NaiveDate>,
    pub needs_review: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_practiced_at: Option<DateTime<Utc>>,
    pub mastered_at: Option<DateTime<Utc>>,
}

impl TopicMastery {
    pub const MASTERY_THRESHOLD: f64 = 80.0;
    pub const DEFAULT_EASE: f64 = 2.5;
    pub const MIN_EASE: f64 = 1.3;

    pub fn new(learner_id: i64, topic_id: i64, skill_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            learner_id,
            topic_id,
            skill_id,
            mastery_score: 0.0,
            times_practiced: 0,
            times_correct: 0,
            times_incorrect: 0,
            ease_factor: Self::DEFAULT_EASE,
            interval_days: 1,
            next_review_date: None,
            needs_review: false,
            first_seen_at: now,
            last_practiced_at: None,
            mastered_at: None,
        }
    }

    pub fn is_mastered(&self) -> bool {
        self.mastery_score >= Self::MASTERY_THRESHOLD
    }

    pub fn status(&self) -> &'static str {
        match self.mastery_score {
            s if s >= 90.0 => "excellent",
            s if s >= 80.0 => "mastered",
            s if s >= 65.0 => "learning",
            s if s >= 50.0 => "needs_practice",
            _ => "weak",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillLevel {
    pub id: Option<i64>,
    pub learner_id: i64,
    pub skill_id: i64,
    pub current_level: Level,
    pub xp_points: i64,
    pub confidence_score: f64,
    pub streak: Streak,
    pub last_assessment_score: Option<f64>,
    pub last_assessment_at: Option<DateTime<Utc>>,
}

impl SkillLevel {
    pub fn new(learner_id: i64, skill_id: i64) -> Self {
        Self {
            id: None,
            learner_id,
            skill_id,
            current_level: Level::Beginner,
            xp_points: 0,
            confidence_score: 0.0,
            streak: Streak::default(),
            last_assessment_score: None,
            last_assessment_at: None,
        }
    }

    pub fn xp_for_next_level(&self) -> Option<i64> {
        self.current_level.next().map(|l| l.xp_threshold())
    }

    pub fn xp_progress_percentage(&self) -> f64 {
        let Some(next_xp) = self.xp_for_next_level() else {
            return 100.0;
        };
        let current_xp = self.current_level.xp_threshold();
        let progress = (self.xp_points - current_xp) as f64 / (next_xp - current_xp) as f64;
        (progress * 100.0).clamp(0.0, 100.0)
    }

    // Returns true when the level changed
    pub fn add_xp(&mut self, amount: i64) -> bool {
        self.xp_points += amount;
        let start = self.current_level;
        while let Some(next) = self.current_level.next() {
            if self.xp_points < next.xp_threshold() {
                break;
            }
            self.current_level = next;
        }
        self.current_level != start
    }

    pub fn record_assessment(&mut self, score: f64, at: DateTime<Utc>) {
        let weighted = match self.last_assessment_score {
            None => score,
            Some(_) => self.confidence_score * 0.7 + score * 0.3,
        };
        self.confidence_score = round_to(weighted, 2).clamp(0.0, 100.0);
        self.last_assessment_score = Some(score);
        self.last_assessment_at = Some(at);
    }
}

// Append-only answer log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: Option<i64>,
    pub learner_id: i64,
    pub question_id: i64,
    pub session_id: i64,
    pub answer: String,
    pub is_correct: bool,
    pub time_taken_seconds: u32,
    pub hints_used: u32,
    pub xp_earned: i64,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub id: i64,
    pub name: String,
    pub total_xp: i64,
    pub streak: Streak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicWithMastery {
    pub topic: Topic,
    pub mastery: TopicMastery,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: &'static str) -> Self {
        self.kind = Some(kind);
        self
    }
}
