use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::StoreError;
use crate::models::{AnswerOption, Difficulty, Question, QuestionKind};
use crate::store::Transactional;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{context} references unknown topic '{slug}'")]
    UnknownTopic { context: String, slug: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Store(StoreError::Database(err))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogFile {
    pub topics: Vec<TopicEntry>,
    pub skills: Vec<SkillEntry>,
    pub questions: Vec<QuestionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TopicEntry {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SkillEntry {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub topics: Vec<SkillTopicEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SkillTopicEntry {
    pub slug: String,
    #[serde(default = "default_core")]
    pub core: bool,
}

fn default_core() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct QuestionEntry {
    pub kind: QuestionKind,
    pub difficulty: Difficulty,
    pub prompt: String,
    #[serde(default)]
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub code_language: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<AnswerOption>>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub hints: Vec<String>,
    pub topics: Vec<String>,
}

impl QuestionEntry {
    fn to_question(&self) -> Question {
        Question {
            id: 0,
            kind: self.kind,
            difficulty: self.difficulty,
            prompt: self.prompt.clone(),
            code_snippet: self.code_snippet.clone(),
            code_language: self.code_language.clone(),
            options: self.options.clone(),
            correct_answer: self.correct_answer.clone(),
            explanation: self.explanation.clone(),
            hints: self.hints.clone(),
            times_shown: 0,
            times_correct: 0,
            avg_time_seconds: None,
            is_active: true,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub topics_created: usize,
    pub skills_created: usize,
    pub links: usize,
    pub questions_created: usize,
}

pub fn parse(raw: &str) -> Result<CatalogFile, CatalogError> {
    Ok(serde_json::from_str(raw)?)
}

impl Database {
    /// Imports a catalog in one transaction. Existing skills and topics are
    /// matched by slug and reused; questions are always added.
    pub fn import_catalog(&self, catalog: &CatalogFile) -> Result<ImportSummary, CatalogError> {
        self.atomically(|| -> Result<ImportSummary, CatalogError> {
            let mut summary = ImportSummary::default();

            for entry in &catalog.topics {
                if self.get_topic_by_slug(&entry.slug)?.is_none() {
                    self.add_topic(&entry.slug, &entry.name, entry.description.as_deref())?;
                    summary.topics_created += 1;
                }
            }

            for entry in &catalog.skills {
                let skill_id = match self.get_skill_by_slug(&entry.slug)? {
                    Some(skill) => skill.id,
                    None => {
                        summary.skills_created += 1;
                        self.add_skill(&entry.slug, &entry.name, entry.description.as_deref())?
                    }
                };
                for link in &entry.topics {
                    let topic_id = self.topic_id(&link.slug, &format!("skill '{}'", entry.slug))?;
                    self.link_topic(skill_id, topic_id, link.core)?;
                    summary.links += 1;
                }
            }

            for (index, entry) in catalog.questions.iter().enumerate() {
                let topic_ids = entry
                    .topics
                    .iter()
                    .map(|slug| self.topic_id(slug, &format!("question {}", index)))
                    .collect::<Result<Vec<_>, _>>()?;
                let id = self.add_question(&entry.to_question(), &topic_ids)?;
                debug!(question_id = id, "imported question");
                summary.questions_created += 1;
            }

            info!(
                topics = summary.topics_created,
                skills = summary.skills_created,
                questions = summary.questions_created,
                "catalog imported"
            );
            Ok(summary)
        })
    }

    fn topic_id(&self, slug: &str, context: &str) -> Result<i64, CatalogError> {
        self.get_topic_by_slug(slug)?
            .map(|t| t.id)
            .ok_or_else(|| CatalogError::UnknownTopic {
                context: context.to_string(),
                slug: slug.to_string(),
            })
    }
}
