use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{AssessmentError, StoreError};
use crate::mastery::{quality_from_answer, record_practice};
use crate::models::{
    round_to, AnswerRecord, AssessmentSession, Level, QuestionView, SessionStatus, SkillLevel,
    TopicMastery,
};
use crate::scoring::{
    final_score, level_for_score, question_xp, recommendation, record_question_attempt, session_xp,
};
use crate::selector::select_questions;
use crate::store::{AssessmentBackend, CertificationIssuer};

type Result<T> = std::result::Result<T, AssessmentError>;

#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    pub question_id: i64,
    pub answer: String,
    pub time_taken_seconds: u32,
    pub hints_used: u32,
}

/// What the learner should do next.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NextStep {
    Question { question: QuestionView },
    CompletionRequired,
}

impl NextStep {
    pub fn question(&self) -> Option<&QuestionView> {
        match self {
            NextStep::Question { question } => Some(question),
            NextStep::CompletionRequired => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCursor {
    pub session_id: i64,
    pub status: SessionStatus,
    pub current_index: usize,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub progress_percentage: f64,
    pub current_score_percentage: f64,
    pub time_remaining_seconds: i64,
    pub next: NextStep,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub resumed: bool,
    pub cursor: SessionCursor,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub question_id: i64,
    pub is_correct: bool,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub xp_earned: i64,
    pub answered: usize,
    pub correct_so_far: usize,
    pub score_percentage: f64,
    pub next: NextStep,
}

#[derive(Debug, Clone, Serialize)]
pub struct HintView {
    pub question_id: i64,
    pub hint: String,
    pub hint_number: usize,
    pub hints_remaining: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    pub session_id: i64,
    pub skill_id: i64,
    pub total_questions: usize,
    pub answered: usize,
    pub correct_answers: usize,
    pub final_score: f64,
    pub determined_level: Level,
    pub previous_level: Level,
    pub current_level: Level,
    pub level_changed: bool,
    pub xp_earned: i64,
    pub total_skill_xp: i64,
    pub total_time_seconds: i64,
    pub average_time_per_question: f64,
    pub certification_eligible: bool,
    pub recommendations: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

pub struct AssessmentManager<'a, B: AssessmentBackend, C: Clock> {
    store: &'a B,
    issuer: &'a dyn CertificationIssuer,
    clock: C,
    config: EngineConfig,
    rng: StdRng,
}

impl<'a, B: AssessmentBackend, C: Clock> AssessmentManager<'a, B, C> {
    pub fn new(
        store: &'a B,
        issuer: &'a dyn CertificationIssuer,
        clock: C,
        config: EngineConfig,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store,
            issuer,
            clock,
            config,
            rng,
        }
    }

    pub fn start(
        &mut self,
        learner_id: i64,
        skill_id: i64,
        question_count: Option<usize>,
    ) -> Result<StartOutcome> {
        if self.store.get_skill(skill_id)?.is_none() {
            return Err(AssessmentError::NotFound(format!("skill {}", skill_id)));
        }

        let now = self.clock.now();
        if let Some(mut existing) = self.store.find_in_progress(learner_id, skill_id)? {
            if !self.expire_if_stale(&mut existing, now)? {
                info!(learner_id, session_id = existing.id, "resuming in-progress assessment");
                return Ok(StartOutcome {
                    resumed: true,
                    cursor: self.cursor(&existing, now)?,
                });
            }
        }

        if !self.store.is_enrolled(learner_id, skill_id)? {
            return Err(AssessmentError::Forbidden {
                learner_id,
                skill_id,
            });
        }

        let count = question_count.unwrap_or(self.config.default_question_count);
        if count < self.config.min_question_count || count > self.config.max_question_count {
            return Err(AssessmentError::InvalidInput(format!(
                "question count must be between {} and {}, got {}",
                self.config.min_question_count, self.config.max_question_count, count
            )));
        }

        let question_ids = select_questions(
            self.store,
            &mut self.rng,
            learner_id,
            skill_id,
            count,
            self.config.recent_history_window,
        )?;
        if question_ids.len() < count {
            return Err(AssessmentError::InsufficientData {
                available: question_ids.len(),
                requested: count,
            });
        }

        let mut session = AssessmentSession {
            id: 0,
            learner_id,
            skill_id,
            status: SessionStatus::InProgress,
            total_questions: question_ids.len(),
            question_ids,
            current_index: 0,
            correct_answers: 0,
            score: None,
            determined_level: None,
            started_at: now,
            completed_at: None,
            time_limit_minutes: self.config.time_limit_minutes,
            credits_consumed: 0,
        };
        session.id = self.store.create_session(&session)?;

        info!(
            learner_id,
            skill_id,
            session_id = session.id,
            questions = session.total_questions,
            "assessment started"
        );

        Ok(StartOutcome {
            resumed: false,
            cursor: self.cursor(&session, now)?,
        })
    }

    pub fn resume(&self, learner_id: i64, session_id: i64) -> Result<SessionCursor> {
        let now = self.clock.now();
        let mut session = self.load_owned(learner_id, session_id)?;
        self.ensure_active(&mut session, now)?;
        debug!(learner_id, session_id, index = session.current_index, "assessment resumed");
        self.cursor(&session, now)
    }

    pub fn answer(
        &self,
        learner_id: i64,
        session_id: i64,
        submission: &AnswerSubmission,
    ) -> Result<AnswerOutcome> {
        if submission.time_taken_seconds > self.config.max_answer_seconds {
            return Err(AssessmentError::InvalidInput(format!(
                "time taken must be at most {} seconds",
                self.config.max_answer_seconds
            )));
        }

        let now = self.clock.now();
        let mut session = self.load_owned(learner_id, session_id)?;
        self.ensure_active(&mut session, now)?;

        let question_id = submission.question_id;
        if self.store.answer_exists(learner_id, question_id, session_id)? {
            return Err(AssessmentError::Conflict(format!(
                "question {} already answered in assessment {}",
                question_id, session_id
            )));
        }
        if session.all_answered() {
            return Err(AssessmentError::InvalidState(
                "all questions have been answered".to_string(),
            ));
        }
        if session.current_question_id() != Some(question_id) {
            return Err(AssessmentError::InvalidState(format!(
                "question {} is not the current question",
                question_id
            )));
        }

        let mut question = self
            .store
            .get_question(question_id)?
            .ok_or_else(|| AssessmentError::NotFound(format!("question {}", question_id)))?;
        let is_correct = question.is_correct(&submission.answer);
        let skill_id = session.skill_id;

        let store = self.store;
        let xp_earned = store.atomically(|| -> Result<i64> {
            let first_attempt = !store.has_attempted(learner_id, question_id)?;
            let streak_days = store.streak_days(learner_id, now.date_naive())?;
            let xp = question_xp(
                question.difficulty,
                is_correct,
                first_attempt,
                submission.hints_used,
                streak_days,
            );

            store
                .append_answer(&AnswerRecord {
                    id: None,
                    learner_id,
                    question_id,
                    session_id,
                    answer: submission.answer.clone(),
                    is_correct,
                    time_taken_seconds: submission.time_taken_seconds,
                    hints_used: submission.hints_used,
                    xp_earned: xp,
                    answered_at: now,
                })
                .map_err(|err| match err {
                    StoreError::Duplicate(what) => AssessmentError::Conflict(what),
                    other => AssessmentError::Storage(other),
                })?;

            record_question_attempt(&mut question, is_correct, submission.time_taken_seconds);
            store.record_question_usage(&question)?;

            let quality = quality_from_answer(is_correct, submission.time_taken_seconds);
            for topic_id in store.question_topic_ids(question_id)? {
                let mut mastery = store
                    .get_mastery(learner_id, topic_id, skill_id)?
                    .unwrap_or_else(|| TopicMastery::new(learner_id, topic_id, skill_id, now));
                record_practice(&mut mastery, is_correct, quality, now);
                store.upsert_mastery(&mastery)?;
            }

            let mut level = store
                .get_skill_level(learner_id, skill_id)?
                .unwrap_or_else(|| SkillLevel::new(learner_id, skill_id));
            if level.add_xp(xp) {
                info!(learner_id, skill_id, new_level = level.current_level.as_str(), "level up");
            }
            store.update_skill_level(&level)?;
            store.add_xp(learner_id, xp)?;

            session.current_index += 1;
            if is_correct {
                session.correct_answers += 1;
            }
            store.update_session(&session)?;

            Ok(xp)
        })?;

        debug!(
            learner_id,
            session_id,
            question_id,
            is_correct,
            xp_earned,
            "answer recorded"
        );

        Ok(AnswerOutcome {
            question_id,
            is_correct,
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
            xp_earned,
            answered: session.current_index,
            correct_so_far: session.correct_answers,
            score_percentage: session.current_score_percentage(),
            next: self.next_step(&session)?,
        })
    }

    /// Reveals hint `hint_index` (0-based) of the current question.
    pub fn hint(&self, learner_id: i64, session_id: i64, hint_index: usize) -> Result<HintView> {
        let now = self.clock.now();
        let mut session = self.load_owned(learner_id, session_id)?;
        self.ensure_active(&mut session, now)?;

        let question_id = match session.current_question_id() {
            Some(id) if !session.all_answered() => id,
            _ => {
                return Err(AssessmentError::InvalidState(
                    "no current question".to_string(),
                ))
            }
        };
        let question = self
            .store
            .get_question(question_id)?
            .ok_or_else(|| AssessmentError::NotFound(format!("question {}", question_id)))?;

        let hint = question.hint(hint_index).ok_or_else(|| {
            AssessmentError::NotFound(format!("hint {} for question {}", hint_index, question_id))
        })?;

        Ok(HintView {
            question_id,
            hint: hint.to_string(),
            hint_number: hint_index + 1,
            hints_remaining: question.hints.len() - hint_index - 1,
        })
    }

    pub fn complete(&self, learner_id: i64, session_id: i64) -> Result<CompletionReport> {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut session = self.load_owned(learner_id, session_id)?;
        self.ensure_active(&mut session, now)?;

        let score = final_score(session.correct_answers, session.total_questions);
        let determined_level = level_for_score(score);
        let certification_eligible = score >= self.config.certification_threshold;
        let skill_id = session.skill_id;

        let store = self.store;
        let report = store.atomically(|| -> Result<CompletionReport> {
            let mut level = store
                .get_skill_level(learner_id, skill_id)?
                .unwrap_or_else(|| SkillLevel::new(learner_id, skill_id));
            let previous_level = level.current_level;

            if determined_level > level.current_level {
                level.current_level = determined_level;
            }
            level.record_assessment(score, now);

            let xp_earned = session_xp(score);
            level.add_xp(xp_earned);
            level.streak.record(today);
            store.update_skill_level(&level)?;

            store.add_xp(learner_id, xp_earned)?;
            store.update_streak(learner_id, today)?;

            session.status = SessionStatus::Completed;
            session.completed_at = Some(now);
            session.score = Some(score);
            session.determined_level = Some(determined_level);
            store.update_session(&session)?;

            let total_time_seconds = session.elapsed_seconds(now);
            let average_time_per_question = if session.total_questions == 0 {
                0.0
            } else {
                round_to(total_time_seconds as f64 / session.total_questions as f64, 1)
            };

            Ok(CompletionReport {
                session_id,
                skill_id,
                total_questions: session.total_questions,
                answered: session.current_index,
                correct_answers: session.correct_answers,
                final_score: round_to(score, 1),
                determined_level,
                previous_level,
                current_level: level.current_level,
                level_changed: level.current_level != previous_level,
                xp_earned,
                total_skill_xp: level.xp_points,
                total_time_seconds,
                average_time_per_question,
                certification_eligible,
                recommendations: vec![recommendation(score).to_string()],
                completed_at: now,
            })
        })?;

        info!(
            learner_id,
            session_id,
            score = report.final_score,
            new_level = report.current_level.as_str(),
            "assessment completed"
        );

        if certification_eligible {
            match self.issuer.issue(learner_id, skill_id, score) {
                Ok(()) => info!(learner_id, skill_id, "certification requested"),
                Err(e) => warn!(learner_id, skill_id, error = %e, "certification issuance failed"),
            }
        }

        Ok(report)
    }

    pub fn abandon(&self, learner_id: i64, session_id: i64) -> Result<AssessmentSession> {
        let now = self.clock.now();
        let mut session = self.load_owned(learner_id, session_id)?;
        self.ensure_active(&mut session, now)?;

        session.status = SessionStatus::Abandoned;
        session.completed_at = Some(now);
        self.store.update_session(&session)?;

        info!(learner_id, session_id, answered = session.current_index, "assessment abandoned");
        Ok(session)
    }

    fn load_owned(&self, learner_id: i64, session_id: i64) -> Result<AssessmentSession> {
        match self.store.get_session(session_id)? {
            Some(session) if session.learner_id == learner_id => Ok(session),
            _ => Err(AssessmentError::NotFound(format!("assessment {}", session_id))),
        }
    }

    // Persists the expired transition on its own; returns whether it happened
    fn expire_if_stale(&self, session: &mut AssessmentSession, now: DateTime<Utc>) -> Result<bool> {
        if !session.is_expired(now) {
            return Ok(false);
        }
        session.status = SessionStatus::Expired;
        session.completed_at = Some(now);
        self.store.update_session(session)?;
        info!(
            learner_id = session.learner_id,
            session_id = session.id,
            "assessment expired"
        );
        Ok(true)
    }

    fn ensure_active(&self, session: &mut AssessmentSession, now: DateTime<Utc>) -> Result<()> {
        if self.expire_if_stale(session, now)? || session.status == SessionStatus::Expired {
            return Err(AssessmentError::Expired(session.id));
        }
        if session.status.is_terminal() {
            return Err(AssessmentError::InvalidState(format!(
                "assessment is {}",
                session.status.as_str()
            )));
        }
        Ok(())
    }

    fn next_step(&self, session: &AssessmentSession) -> Result<NextStep> {
        let question_id = match session.current_question_id() {
            Some(id) if !session.all_answered() => id,
            _ => return Ok(NextStep::CompletionRequired),
        };
        let question = self
            .store
            .get_question(question_id)?
            .ok_or_else(|| AssessmentError::NotFound(format!("question {}", question_id)))?;
        Ok(NextStep::Question {
            question: question.view(self.config.question_time_limit_seconds),
        })
    }

    fn cursor(&self, session: &AssessmentSession, now: DateTime<Utc>) -> Result<SessionCursor> {
        Ok(SessionCursor {
            session_id: session.id,
            status: session.status,
            current_index: session.current_index,
            total_questions: session.total_questions,
            correct_answers: session.correct_answers,
            progress_percentage: session.progress_percentage(),
            current_score_percentage: session.current_score_percentage(),
            time_remaining_seconds: session.time_remaining_seconds(now),
            next: self.next_step(session)?,
        })
    }
}
