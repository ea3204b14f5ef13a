use std::collections::HashSet;

use chrono::NaiveDate;

use crate::error::StoreResult;
use crate::models::{
    AnswerRecord, AssessmentSession, Difficulty, Question, Skill, SkillLevel, TopicMastery,
};

pub trait QuestionRepository {
    fn get_skill(&self, skill_id: i64) -> StoreResult<Option<Skill>>;

    fn get_question(&self, question_id: i64) -> StoreResult<Option<Question>>;

    /// Topic ids attached to a skill, optionally restricted to core topics.
    fn skill_topic_ids(&self, skill_id: i64, core_only: bool) -> StoreResult<Vec<i64>>;

    fn question_topic_ids(&self, question_id: i64) -> StoreResult<Vec<i64>>;

    /// Active questions tagged with any of `topic_ids`, each returned once,
    /// in ascending id order.
    fn query_active(
        &self,
        topic_ids: &[i64],
        difficulty: Option<Difficulty>,
        exclude_ids: &HashSet<i64>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Question>>;

    fn record_question_usage(&self, question: &Question) -> StoreResult<()>;
}

pub trait MasteryStore {
    fn get_mastery(
        &self,
        learner_id: i64,
        topic_id: i64,
        skill_id: i64,
    ) -> StoreResult<Option<TopicMastery>>;

    fn upsert_mastery(&self, mastery: &TopicMastery) -> StoreResult<()>;
}

pub trait SkillLevelStore {
    fn get_skill_level(&self, learner_id: i64, skill_id: i64) -> StoreResult<Option<SkillLevel>>;

    fn update_skill_level(&self, level: &SkillLevel) -> StoreResult<()>;
}

pub trait HistoryStore {
    fn answer_exists(&self, learner_id: i64, question_id: i64, session_id: i64)
        -> StoreResult<bool>;

    /// Whether the learner has ever answered the question, in any session.
    fn has_attempted(&self, learner_id: i64, question_id: i64) -> StoreResult<bool>;

    /// Fails with `StoreError::Duplicate` if (session, question) is already logged.
    fn append_answer(&self, record: &AnswerRecord) -> StoreResult<i64>;

    /// Most recently answered question ids, newest first.
    fn recent_question_ids(&self, learner_id: i64, limit: usize) -> StoreResult<Vec<i64>>;
}

pub trait SessionStore {
    fn create_session(&self, session: &AssessmentSession) -> StoreResult<i64>;

    fn get_session(&self, session_id: i64) -> StoreResult<Option<AssessmentSession>>;

    fn find_in_progress(
        &self,
        learner_id: i64,
        skill_id: i64,
    ) -> StoreResult<Option<AssessmentSession>>;

    fn update_session(&self, session: &AssessmentSession) -> StoreResult<()>;
}

pub trait EnrollmentCheck {
    fn is_enrolled(&self, learner_id: i64, skill_id: i64) -> StoreResult<bool>;
}

pub trait ProfileSink {
    fn add_xp(&self, learner_id: i64, amount: i64) -> StoreResult<()>;

    fn update_streak(&self, learner_id: i64, today: NaiveDate) -> StoreResult<()>;

    /// Streak length as of `today`, zero if it has lapsed.
    fn streak_days(&self, learner_id: i64, today: NaiveDate) -> StoreResult<u32>;
}

/// Runs a unit of work all-or-nothing.
pub trait Transactional {
    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<crate::error::StoreError>;
}

/// Credential issuance, invoked after a qualifying completion. Callers do not
/// wait on or propagate its failures.
pub trait CertificationIssuer {
    fn issue(&self, learner_id: i64, skill_id: i64, score: f64) -> Result<(), String>;
}

pub trait AssessmentBackend:
    QuestionRepository
    + MasteryStore
    + SkillLevelStore
    + HistoryStore
    + SessionStore
    + EnrollmentCheck
    + ProfileSink
    + Transactional
{
}

impl<T> AssessmentBackend for T where
    T: QuestionRepository
        + MasteryStore
        + SkillLevelStore
        + HistoryStore
        + SessionStore
        + EnrollmentCheck
        + ProfileSink
        + Transactional
{
}
