use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    AnswerRecord, AssessmentSession, Difficulty, LearnerProfile, Level, Question, QuestionKind,
    SessionStatus, Skill, SkillLevel, Streak, Topic, TopicMastery, TopicWithMastery,
};
use crate::store::{
    EnrollmentCheck, HistoryStore, MasteryStore, ProfileSink, QuestionRepository, SessionStore,
    SkillLevelStore, Transactional,
};

const QUESTION_COLUMNS: &str = "q.id, q.kind, q.difficulty, q.prompt, q.code_snippet, \
     q.code_language, q.options, q.correct_answer, q.explanation, q.hints, q.times_shown, \
     q.times_correct, q.avg_time_seconds, q.is_active";

const MASTERY_COLUMNS: &str = "m.id, m.learner_id, m.topic_id, m.skill_id, m.mastery_score, \
     m.times_practiced, m.times_correct, m.times_incorrect, m.ease_factor, m.interval_days, \
     m.next_review_date, m.needs_review, m.first_seen_at, m.last_practiced_at, m.mastered_at";

const SESSION_COLUMNS: &str = "id, learner_id, skill_id, status, question_ids, current_index, \
     total_questions, correct_answers, score, determined_level, started_at, completed_at, \
     time_limit_minutes, credits_consumed";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS learners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                total_xp INTEGER NOT NULL DEFAULT 0,
                current_streak INTEGER NOT NULL DEFAULT 0,
                longest_streak INTEGER NOT NULL DEFAULT 0,
                last_activity_date TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS skills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                description TEXT
            );

            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                description TEXT
            );

            CREATE TABLE IF NOT EXISTS skill_topics (
                skill_id INTEGER NOT NULL,
                topic_id INTEGER NOT NULL,
                is_core INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (skill_id, topic_id),
                FOREIGN KEY (skill_id) REFERENCES skills(id) ON DELETE CASCADE,
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL CHECK(kind IN ('multiple_choice', 'true_false', 'code_completion', 'code_review', 'open_ended')),
                difficulty TEXT NOT NULL CHECK(difficulty IN ('easy', 'medium', 'hard', 'expert')),
                prompt TEXT NOT NULL,
                code_snippet TEXT,
                code_language TEXT,
                options TEXT,
                correct_answer TEXT NOT NULL,
                explanation TEXT,
                hints TEXT NOT NULL DEFAULT '[]',
                times_shown INTEGER NOT NULL DEFAULT 0,
                times_correct INTEGER NOT NULL DEFAULT 0,
                avg_time_seconds REAL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS question_topics (
                question_id INTEGER NOT NULL,
                topic_id INTEGER NOT NULL,
                PRIMARY KEY (question_id, topic_id),
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
            );

            -- Enrollment is the existence of a row here
            CREATE TABLE IF NOT EXISTS skill_levels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                skill_id INTEGER NOT NULL,
                current_level INTEGER NOT NULL DEFAULT 0,
                xp_points INTEGER NOT NULL DEFAULT 0,
                confidence_score REAL NOT NULL DEFAULT 0,
                current_streak INTEGER NOT NULL DEFAULT 0,
                longest_streak INTEGER NOT NULL DEFAULT 0,
                last_activity_date TEXT,
                last_assessment_score REAL,
                last_assessment_at TEXT,
                UNIQUE (learner_id, skill_id),
                FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
                FOREIGN KEY (skill_id) REFERENCES skills(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS topic_mastery (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                topic_id INTEGER NOT NULL,
                skill_id INTEGER NOT NULL,
                mastery_score REAL NOT NULL DEFAULT 0,
                times_practiced INTEGER NOT NULL DEFAULT 0,
                times_correct INTEGER NOT NULL DEFAULT 0,
                times_incorrect INTEGER NOT NULL DEFAULT 0,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                interval_days INTEGER NOT NULL DEFAULT 1,
                next_review_date TEXT,
                needs_review INTEGER NOT NULL DEFAULT 0,
                first_seen_at TEXT NOT NULL,
                last_practiced_at TEXT,
                mastered_at TEXT,
                UNIQUE (learner_id, topic_id, skill_id)
            );

            CREATE TABLE IF NOT EXISTS assessment_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                skill_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'in_progress' CHECK(status IN ('in_progress', 'completed', 'abandoned', 'expired')),
                question_ids TEXT NOT NULL,
                current_index INTEGER NOT NULL DEFAULT 0,
                total_questions INTEGER NOT NULL,
                correct_answers INTEGER NOT NULL DEFAULT 0,
                score REAL,
                determined_level INTEGER,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                time_limit_minutes INTEGER NOT NULL DEFAULT 30,
                credits_consumed INTEGER NOT NULL DEFAULT 0,
                CHECK (current_index <= total_questions)
            );

            CREATE TABLE IF NOT EXISTS question_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                question_id INTEGER NOT NULL,
                session_id INTEGER NOT NULL,
                answer TEXT NOT NULL,
                is_correct INTEGER NOT NULL,
                time_taken_seconds INTEGER NOT NULL,
                hints_used INTEGER NOT NULL DEFAULT 0,
                xp_earned INTEGER NOT NULL DEFAULT 0,
                answered_at TEXT NOT NULL,
                UNIQUE (session_id, question_id)
            );

            CREATE INDEX IF NOT EXISTS idx_skill_topics_topic ON skill_topics(topic_id);
            CREATE INDEX IF NOT EXISTS idx_question_topics_topic ON question_topics(topic_id);
            CREATE INDEX IF NOT EXISTS idx_questions_difficulty ON questions(difficulty, is_active);
            CREATE INDEX IF NOT EXISTS idx_mastery_review ON topic_mastery(needs_review, next_review_date);
            CREATE INDEX IF NOT EXISTS idx_sessions_learner_skill ON assessment_sessions(learner_id, skill_id, status);
            CREATE INDEX IF NOT EXISTS idx_history_learner ON question_history(learner_id, answered_at);
            "#,
        )?;

        Ok(())
    }

    // Learner operations
    pub fn add_learner(&self, name: &str) -> Result<i64> {
        self.conn
            .execute("INSERT INTO learners (name) VALUES (?1)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_profile(&self, learner_id: i64) -> Result<Option<LearnerProfile>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, total_xp, current_streak, longest_streak, last_activity_date
                FROM learners WHERE id = ?1
                "#,
                params![learner_id],
                |row| {
                    Ok(LearnerProfile {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        total_xp: row.get(2)?,
                        streak: Streak {
                            current: row.get(3)?,
                            longest: row.get(4)?,
                            last_activity: row.get(5)?,
                        },
                    })
                },
            )
            .optional()
    }

    // Catalog operations
    pub fn add_skill(&self, slug: &str, name: &str, description: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO skills (slug, name, description) VALUES (?1, ?2, ?3)",
            params![slug, name, description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_skill_by_slug(&self, slug: &str) -> Result<Option<Skill>> {
        self.conn
            .query_row(
                "SELECT id, slug, name, description FROM skills WHERE slug = ?1",
                params![slug],
                skill_from_row,
            )
            .optional()
    }

    pub fn list_skills(&self) -> Result<Vec<Skill>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, slug, name, description FROM skills ORDER BY name")?;
        let rows = stmt.query_map([], skill_from_row)?;
        rows.collect()
    }

    pub fn add_topic(&self, slug: &str, name: &str, description: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO topics (slug, name, description) VALUES (?1, ?2, ?3)",
            params![slug, name, description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>> {
        self.conn
            .query_row(
                "SELECT id, slug, name, description FROM topics WHERE slug = ?1",
                params![slug],
                topic_from_row,
            )
            .optional()
    }

    pub fn link_topic(&self, skill_id: i64, topic_id: i64, is_core: bool) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO skill_topics (skill_id, topic_id, is_core) VALUES (?1, ?2, ?3)
            ON CONFLICT(skill_id, topic_id) DO UPDATE SET is_core = excluded.is_core
            "#,
            params![skill_id, topic_id, is_core],
        )?;
        Ok(())
    }

    pub fn add_question(&self, question: &Question, topic_ids: &[i64]) -> StoreResult<i64> {
        let options = question
            .options
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let hints = serde_json::to_string(&question.hints)?;

        self.conn.execute(
            r#"
            INSERT INTO questions (kind, difficulty, prompt, code_snippet, code_language,
                                   options, correct_answer, explanation, hints, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                question.kind.as_str(),
                question.difficulty.as_str(),
                question.prompt,
                question.code_snippet,
                question.code_language,
                options,
                question.correct_answer,
                question.explanation,
                hints,
                question.is_active
            ],
        )?;
        let question_id = self.conn.last_insert_rowid();

        for topic_id in topic_ids {
            self.conn.execute(
                "INSERT OR IGNORE INTO question_topics (question_id, topic_id) VALUES (?1, ?2)",
                params![question_id, topic_id],
            )?;
        }

        Ok(question_id)
    }

    pub fn set_question_active(&self, question_id: i64, active: bool) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE questions SET is_active = ?1 WHERE id = ?2",
            params![active, question_id],
        )?;
        Ok(rows > 0)
    }

    // false if already enrolled
    pub fn enroll(&self, learner_id: i64, skill_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO skill_levels (learner_id, skill_id) VALUES (?1, ?2)",
            params![learner_id, skill_id],
        )?;
        Ok(rows > 0)
    }

    // Progress views
    pub fn list_masteries(
        &self,
        learner_id: i64,
        skill_id: Option<i64>,
    ) -> Result<Vec<TopicWithMastery>> {
        let query = format!(
            r#"
            SELECT {MASTERY_COLUMNS}, t.id, t.slug, t.name, t.description
            FROM topic_mastery m
            JOIN topics t ON t.id = m.topic_id
            WHERE m.learner_id = ?1 AND (?2 IS NULL OR m.skill_id = ?2)
            ORDER BY m.mastery_score ASC, t.name
            "#
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![learner_id, skill_id], topic_with_mastery_from_row)?;
        rows.collect()
    }

    pub fn due_reviews(&self, learner_id: i64, today: NaiveDate) -> Result<Vec<TopicWithMastery>> {
        let query = format!(
            r#"
            SELECT {MASTERY_COLUMNS}, t.id, t.slug, t.name, t.description
            FROM topic_mastery m
            JOIN topics t ON t.id = m.topic_id
            WHERE m.learner_id = ?1
              AND (m.needs_review = 1 OR m.next_review_date <= ?2)
            ORDER BY m.next_review_date ASC, m.mastery_score ASC
            "#
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![learner_id, today], topic_with_mastery_from_row)?;
        rows.collect()
    }

    pub fn list_sessions(&self, learner_id: i64) -> StoreResult<Vec<AssessmentSession>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM assessment_sessions WHERE learner_id = ?1 ORDER BY id DESC"
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![learner_id], session_from_row)?;
        Ok(rows.collect::<Result<Vec<_>>>()?)
    }

    pub fn get_stats(&self, learner_id: i64, today: NaiveDate) -> Result<Stats> {
        let sessions_completed: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM assessment_sessions WHERE learner_id = ?1 AND status = 'completed'",
            params![learner_id],
            |row| row.get(0),
        )?;

        let (questions_answered, correct_answers): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_correct), 0) FROM question_history WHERE learner_id = ?1",
            params![learner_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let topics_practiced: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM topic_mastery WHERE learner_id = ?1",
            params![learner_id],
            |row| row.get(0),
        )?;

        let topics_mastered: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM topic_mastery WHERE learner_id = ?1 AND mastered_at IS NOT NULL",
            params![learner_id],
            |row| row.get(0),
        )?;

        let due_now: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM topic_mastery
            WHERE learner_id = ?1 AND (needs_review = 1 OR next_review_date <= ?2)
            "#,
            params![learner_id, today],
            |row| row.get(0),
        )?;

        let total_xp: i64 = self
            .conn
            .query_row(
                "SELECT total_xp FROM learners WHERE id = ?1",
                params![learner_id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        let accuracy = if questions_answered == 0 {
            0.0
        } else {
            correct_answers as f64 / questions_answered as f64 * 100.0
        };

        Ok(Stats {
            sessions_completed,
            questions_answered,
            accuracy,
            topics_practiced,
            topics_mastered,
            due_now,
            total_xp,
        })
    }
}

impl QuestionRepository for Database {
    fn get_skill(&self, skill_id: i64) -> StoreResult<Option<Skill>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, slug, name, description FROM skills WHERE id = ?1",
                params![skill_id],
                skill_from_row,
            )
            .optional()?)
    }

    fn get_question(&self, question_id: i64) -> StoreResult<Option<Question>> {
        let query = format!("SELECT {QUESTION_COLUMNS} FROM questions q WHERE q.id = ?1");
        Ok(self
            .conn
            .query_row(&query, params![question_id], question_from_row)
            .optional()?)
    }

    fn skill_topic_ids(&self, skill_id: i64, core_only: bool) -> StoreResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT topic_id FROM skill_topics
            WHERE skill_id = ?1 AND (?2 = 0 OR is_core = 1)
            ORDER BY topic_id
            "#,
        )?;
        let rows = stmt.query_map(params![skill_id, core_only], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<i64>>>()?)
    }

    fn question_topic_ids(&self, question_id: i64) -> StoreResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT topic_id FROM question_topics WHERE question_id = ?1 ORDER BY topic_id",
        )?;
        let rows = stmt.query_map(params![question_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<i64>>>()?)
    }

    fn query_active(
        &self,
        topic_ids: &[i64],
        difficulty: Option<Difficulty>,
        exclude_ids: &HashSet<i64>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Question>> {
        if topic_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let topic_marks = placeholders(topic_ids.len());
        params_vec.extend(topic_ids.iter().map(|id| Box::new(*id) as Box<dyn rusqlite::ToSql>));

        let mut query = format!(
            r#"
            SELECT {QUESTION_COLUMNS}
            FROM questions q
            WHERE q.is_active = 1
              AND q.id IN (SELECT question_id FROM question_topics WHERE topic_id IN ({topic_marks}))
            "#
        );

        if let Some(d) = difficulty {
            query.push_str(" AND q.difficulty = ?");
            params_vec.push(Box::new(d.as_str()));
        }

        if !exclude_ids.is_empty() {
            let mut excluded: Vec<i64> = exclude_ids.iter().copied().collect();
            excluded.sort_unstable();
            query.push_str(&format!(" AND q.id NOT IN ({})", placeholders(excluded.len())));
            params_vec.extend(excluded.into_iter().map(|id| Box::new(id) as Box<dyn rusqlite::ToSql>));
        }

        query.push_str(" ORDER BY q.id");
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), question_from_row)?;
        Ok(rows.collect::<Result<Vec<_>>>()?)
    }

    fn record_question_usage(&self, question: &Question) -> StoreResult<()> {
        self.conn.execute(
            r#"
            UPDATE questions
            SET times_shown = ?1, times_correct = ?2, avg_time_seconds = ?3
            WHERE id = ?4
            "#,
            params![
                question.times_shown,
                question.times_correct,
                question.avg_time_seconds,
                question.id
            ],
        )?;
        Ok(())
    }
}

impl MasteryStore for Database {
    fn get_mastery(
        &self,
        learner_id: i64,
        topic_id: i64,
        skill_id: i64,
    ) -> StoreResult<Option<TopicMastery>> {
        let query = format!(
            r#"
            SELECT {MASTERY_COLUMNS} FROM topic_mastery m
            WHERE m.learner_id = ?1 AND m.topic_id = ?2 AND m.skill_id = ?3
            "#
        );
        Ok(self
            .conn
            .query_row(&query, params![learner_id, topic_id, skill_id], |row| {
                mastery_from_row(row, 0)
            })
            .optional()?)
    }

    fn upsert_mastery(&self, m: &TopicMastery) -> StoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO topic_mastery (
                learner_id, topic_id, skill_id, mastery_score, times_practiced, times_correct,
                times_incorrect, ease_factor, interval_days, next_review_date, needs_review,
                first_seen_at, last_practiced_at, mastered_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(learner_id, topic_id, skill_id) DO UPDATE SET
                mastery_score = excluded.mastery_score,
                times_practiced = excluded.times_practiced,
                times_correct = excluded.times_correct,
                times_incorrect = excluded.times_incorrect,
                ease_factor = excluded.ease_factor,
                interval_days = excluded.interval_days,
                next_review_date = excluded.next_review_date,
                needs_review = excluded.needs_review,
                last_practiced_at = excluded.last_practiced_at,
                mastered_at = excluded.mastered_at
            "#,
            params![
                m.learner_id,
                m.topic_id,
                m.skill_id,
                m.mastery_score,
                m.times_practiced,
                m.times_correct,
                m.times_incorrect,
                m.ease_factor,
                m.interval_days,
                m.next_review_date,
                m.needs_review,
                m.first_seen_at,
                m.last_practiced_at,
                m.mastered_at
            ],
        )?;
        Ok(())
    }
}

impl SkillLevelStore for Database {
    fn get_skill_level(&self, learner_id: i64, skill_id: i64) -> StoreResult<Option<SkillLevel>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, learner_id, skill_id, current_level, xp_points, confidence_score,
                       current_streak, longest_streak, last_activity_date,
                       last_assessment_score, last_assessment_at
                FROM skill_levels
                WHERE learner_id = ?1 AND skill_id = ?2
                "#,
                params![learner_id, skill_id],
                |row| {
                    Ok(SkillLevel {
                        id: row.get(0)?,
                        learner_id: row.get(1)?,
                        skill_id: row.get(2)?,
                        current_level: Level::from_i32(row.get(3)?),
                        xp_points: row.get(4)?,
                        confidence_score: row.get(5)?,
                        streak: Streak {
                            current: row.get(6)?,
                            longest: row.get(7)?,
                            last_activity: row.get(8)?,
                        },
                        last_assessment_score: row.get(9)?,
                        last_assessment_at: row.get(10)?,
                    })
                },
            )
            .optional()?)
    }

    fn update_skill_level(&self, level: &SkillLevel) -> StoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO skill_levels (
                learner_id, skill_id, current_level, xp_points, confidence_score,
                current_streak, longest_streak, last_activity_date,
                last_assessment_score, last_assessment_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(learner_id, skill_id) DO UPDATE SET
                current_level = excluded.current_level,
                xp_points = excluded.xp_points,
                confidence_score = excluded.confidence_score,
                current_streak = excluded.current_streak,
                longest_streak = excluded.longest_streak,
                last_activity_date = excluded.last_activity_date,
                last_assessment_score = excluded.last_assessment_score,
                last_assessment_at = excluded.last_assessment_at
            "#,
            params![
                level.learner_id,
                level.skill_id,
                level.current_level.as_i32(),
                level.xp_points,
                level.confidence_score,
                level.streak.current,
                level.streak.longest,
                level.streak.last_activity,
                level.last_assessment_score,
                level.last_assessment_at
            ],
        )?;
        Ok(())
    }
}

impl HistoryStore for Database {
    fn answer_exists(
        &self,
        learner_id: i64,
        question_id: i64,
        session_id: i64,
    ) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM question_history
            WHERE learner_id = ?1 AND question_id = ?2 AND session_id = ?3
            "#,
            params![learner_id, question_id, session_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn has_attempted(&self, learner_id: i64, question_id: i64) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM question_history WHERE learner_id = ?1 AND question_id = ?2",
            params![learner_id, question_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn append_answer(&self, r: &AnswerRecord) -> StoreResult<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO question_history (
                    learner_id, question_id, session_id, answer, is_correct,
                    time_taken_seconds, hints_used, xp_earned, answered_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    r.learner_id,
                    r.question_id,
                    r.session_id,
                    r.answer,
                    r.is_correct,
                    r.time_taken_seconds,
                    r.hints_used,
                    r.xp_earned,
                    r.answered_at
                ],
            )
            .map_err(|e| {
                StoreError::from_insert(
                    e,
                    &format!("answer for question {} in session {}", r.question_id, r.session_id),
                )
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    fn recent_question_ids(&self, learner_id: i64, limit: usize) -> StoreResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT question_id FROM question_history
            WHERE learner_id = ?1
            ORDER BY answered_at DESC, id DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![learner_id, limit as i64], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<i64>>>()?)
    }
}

impl SessionStore for Database {
    fn create_session(&self, s: &AssessmentSession) -> StoreResult<i64> {
        let question_ids = serde_json::to_string(&s.question_ids)?;
        self.conn.execute(
            r#"
            INSERT INTO assessment_sessions (
                learner_id, skill_id, status, question_ids, current_index, total_questions,
                correct_answers, started_at, time_limit_minutes, credits_consumed
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                s.learner_id,
                s.skill_id,
                s.status.as_str(),
                question_ids,
                s.current_index as i64,
                s.total_questions as i64,
                s.correct_answers as i64,
                s.started_at,
                s.time_limit_minutes,
                s.credits_consumed
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(session_id = id, "session row created");
        Ok(id)
    }

    fn get_session(&self, session_id: i64) -> StoreResult<Option<AssessmentSession>> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM assessment_sessions WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&query, params![session_id], session_from_row)
            .optional()?)
    }

    fn find_in_progress(
        &self,
        learner_id: i64,
        skill_id: i64,
    ) -> StoreResult<Option<AssessmentSession>> {
        let query = format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM assessment_sessions
            WHERE learner_id = ?1 AND skill_id = ?2 AND status = 'in_progress'
            ORDER BY id DESC LIMIT 1
            "#
        );
        Ok(self
            .conn
            .query_row(&query, params![learner_id, skill_id], session_from_row)
            .optional()?)
    }

    fn update_session(&self, s: &AssessmentSession) -> StoreResult<()> {
        self.conn.execute(
            r#"
            UPDATE assessment_sessions
            SET status = ?1,
                current_index = ?2,
                correct_answers = ?3,
                score = ?4,
                determined_level = ?5,
                completed_at = ?6,
                credits_consumed = ?7
            WHERE id = ?8
            "#,
            params![
                s.status.as_str(),
                s.current_index as i64,
                s.correct_answers as i64,
                s.score,
                s.determined_level.map(|l| l.as_i32()),
                s.completed_at,
                s.credits_consumed,
                s.id
            ],
        )?;
        Ok(())
    }
}

impl EnrollmentCheck for Database {
    fn is_enrolled(&self, learner_id: i64, skill_id: i64) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM skill_levels WHERE learner_id = ?1 AND skill_id = ?2",
            params![learner_id, skill_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl ProfileSink for Database {
    fn add_xp(&self, learner_id: i64, amount: i64) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE learners SET total_xp = total_xp + ?1 WHERE id = ?2",
            params![amount, learner_id],
        )?;
        Ok(())
    }

    fn update_streak(&self, learner_id: i64, today: NaiveDate) -> StoreResult<()> {
        let Some(mut profile) = self.get_profile(learner_id)? else {
            return Ok(());
        };
        profile.streak.record(today);
        self.conn.execute(
            r#"
            UPDATE learners
            SET current_streak = ?1, longest_streak = ?2, last_activity_date = ?3
            WHERE id = ?4
            "#,
            params![
                profile.streak.current,
                profile.streak.longest,
                profile.streak.last_activity,
                learner_id
            ],
        )?;
        Ok(())
    }

    fn streak_days(&self, learner_id: i64, today: NaiveDate) -> StoreResult<u32> {
        Ok(self
            .get_profile(learner_id)?
            .map_or(0, |profile| profile.streak.days_as_of(today)))
    }
}

impl Transactional for Database {
    fn atomically<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| E::from(StoreError::from(e)))?;
        // dropping tx without commit rolls back
        let value = f()?;
        tx.commit().map_err(|e| E::from(StoreError::from(e)))?;
        Ok(value)
    }
}

#[derive(Debug, Clone)]
pub struct Stats {
    pub sessions_completed: i64,
    pub questions_answered: i64,
    pub accuracy: f64,
    pub topics_practiced: i64,
    pub topics_mastered: i64,
    pub due_now: i64,
    pub total_xp: i64,
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn enum_column<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        conversion_error(
            idx,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown value '{}'", raw),
            ),
        )
    })
}

fn skill_from_row(row: &Row<'_>) -> Result<Skill> {
    Ok(Skill {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
    })
}

fn topic_from_row(row: &Row<'_>) -> Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
    })
}

fn question_from_row(row: &Row<'_>) -> Result<Question> {
    let options: Option<String> = row.get(6)?;
    let options = options
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| conversion_error(6, e))?;

    Ok(Question {
        id: row.get(0)?,
        kind: enum_column(row, 1, QuestionKind::from_str)?,
        difficulty: enum_column(row, 2, Difficulty::from_str)?,
        prompt: row.get(3)?,
        code_snippet: row.get(4)?,
        code_language: row.get(5)?,
        options,
        correct_answer: row.get(7)?,
        explanation: row.get(8)?,
        hints: json_column(row, 9)?,
        times_shown: row.get(10)?,
        times_correct: row.get(11)?,
        avg_time_seconds: row.get(12)?,
        is_active: row.get(13)?,
    })
}

// Mastery columns start at `offset` so joined queries can reuse this
fn mastery_from_row(row: &Row<'_>, offset: usize) -> Result<TopicMastery> {
    let first_seen_at: DateTime<Utc> = row.get(offset + 12)?;
    Ok(TopicMastery {
        id: row.get(offset)?,
        learner_id: row.get(offset + 1)?,
        topic_id: row.get(offset + 2)?,
        skill_id: row.get(offset + 3)?,
        mastery_score: row.get(offset + 4)?,
        times_practiced: row.get(offset + 5)?,
        times_correct: row.get(offset + 6)?,
        times_incorrect: row.get(offset + 7)?,
        ease_factor: row.get(offset + 8)?,
        interval_days: row.get(offset + 9)?,
        next_review_date: row.get(offset + 10)?,
        needs_review: row.get(offset + 11)?,
        first_seen_at,
        last_practiced_at: row.get(offset + 13)?,
        mastered_at: row.get(offset + 14)?,
    })
}

fn topic_with_mastery_from_row(row: &Row<'_>) -> Result<TopicWithMastery> {
    Ok(TopicWithMastery {
        mastery: mastery_from_row(row, 0)?,
        topic: Topic {
            id: row.get(15)?,
            slug: row.get(16)?,
            name: row.get(17)?,
            description: row.get(18)?,
        },
    })
}

fn session_from_row(row: &Row<'_>) -> Result<AssessmentSession> {
    let current_index: i64 = row.get(5)?;
    let total_questions: i64 = row.get(6)?;
    let correct_answers: i64 = row.get(7)?;
    let determined_level: Option<i32> = row.get(9)?;

    Ok(AssessmentSession {
        id: row.get(0)?,
        learner_id: row.get(1)?,
        skill_id: row.get(2)?,
        status: enum_column(row, 3, SessionStatus::from_str)?,
        question_ids: json_column(row, 4)?,
        current_index: current_index as usize,
        total_questions: total_questions as usize,
        correct_answers: correct_answers as usize,
        score: row.get(8)?,
        determined_level: determined_level.map(Level::from_i32),
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
        time_limit_minutes: row.get(12)?,
        credits_consumed: row.get(13)?,
    })
}
