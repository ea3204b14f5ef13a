mod assessment;
mod catalog;
mod clock;
mod config;
mod db;
mod error;
mod issuer;
mod mastery;
mod models;
mod scoring;
mod selector;
mod store;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use assessment::{AnswerSubmission, AssessmentManager, NextStep, SessionCursor};
use clock::{Clock, SystemClock};
use config::EngineConfig;
use db::Database;
use error::AssessmentError;
use issuer::LoggingIssuer;
use models::{AnswerOption, Difficulty, JsonOutput, Question, QuestionKind, QuestionView, Skill};
use store::{ProfileSink, SkillLevelStore};

const DEFAULT_DB_NAME: &str = "skillcheck.db";

#[derive(Parser)]
#[command(name = "skillcheck")]
#[command(about = "Adaptive skill assessments with spaced-repetition mastery tracking")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log engine activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage learners
    #[command(subcommand)]
    Learner(LearnerCommands),

    /// Manage skills and enrollment
    #[command(subcommand)]
    Skill(SkillCommands),

    /// Manage topics
    #[command(subcommand)]
    Topic(TopicCommands),

    /// Manage the question catalog
    #[command(subcommand)]
    Question(QuestionCommands),

    /// Take assessments
    #[command(subcommand)]
    Assess(AssessCommands),

    /// Show topic mastery for a learner
    Mastery {
        /// Learner ID
        #[arg(long, short)]
        learner: i64,

        /// Restrict to one skill (slug)
        #[arg(long, short)]
        skill: Option<String>,

        /// Only topics due for review
        #[arg(long)]
        due: bool,
    },

    /// Show learner statistics
    Stats {
        /// Learner ID
        #[arg(long, short)]
        learner: i64,
    },
}

#[derive(Subcommand)]
enum LearnerCommands {
    /// Add a new learner
    Add {
        /// Learner name
        name: String,
    },
}

#[derive(Subcommand)]
enum SkillCommands {
    /// Add a new skill
    Add {
        /// Short identifier, e.g. "rust"
        slug: String,

        /// Display name
        name: String,

        /// Skill description
        #[arg(long, short)]
        description: Option<String>,
    },

    /// List all skills
    List,

    /// Enroll a learner in a skill
    Enroll {
        /// Skill slug
        skill: String,

        /// Learner ID
        #[arg(long, short)]
        learner: i64,
    },

    /// Show a learner's level in a skill
    Level {
        /// Skill slug
        skill: String,

        /// Learner ID
        #[arg(long, short)]
        learner: i64,
    },
}

#[derive(Subcommand)]
enum TopicCommands {
    /// Add a new topic
    Add {
        /// Short identifier, e.g. "ownership"
        slug: String,

        /// Display name
        name: String,

        /// Topic description
        #[arg(long, short)]
        description: Option<String>,

        /// Attach the topic to this skill (slug)
        #[arg(long, short)]
        skill: Option<String>,

        /// Attach as a non-core topic
        #[arg(long)]
        extra: bool,
    },
}

#[derive(Subcommand)]
enum QuestionCommands {
    /// Add a single question
    Add {
        /// Question prompt
        prompt: String,

        /// Comma-separated topic slugs
        #[arg(long, short)]
        topics: String,

        /// Canonical answer
        #[arg(long, short)]
        answer: String,

        /// multiple_choice/true_false/code_completion/code_review/open_ended
        #[arg(long, short, default_value = "multiple_choice")]
        kind: String,

        /// easy/medium/hard/expert
        #[arg(long, short, default_value = "medium")]
        difficulty: String,

        /// Answer option as id=text (repeatable)
        #[arg(long = "option", short)]
        options: Vec<String>,

        /// Hint text (repeatable, in order)
        #[arg(long = "hint")]
        hints: Vec<String>,

        /// Explanation shown after answering
        #[arg(long, short)]
        explanation: Option<String>,
    },

    /// Import topics, skills and questions from a JSON file
    Import {
        /// Path to the catalog file
        file: PathBuf,
    },

    /// Stop selecting a question for new assessments
    Disable {
        /// Question ID
        id: i64,
    },

    /// Make a disabled question selectable again
    Enable {
        /// Question ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum AssessCommands {
    /// Start an assessment (or pick up the one in progress)
    Start {
        /// Skill slug
        skill: String,

        /// Learner ID
        #[arg(long, short)]
        learner: i64,

        /// Number of questions
        #[arg(long, short)]
        count: Option<usize>,
    },

    /// Show the current question of an assessment
    Resume {
        /// Assessment ID
        session: i64,

        /// Learner ID
        #[arg(long, short)]
        learner: i64,
    },

    /// Answer the current question
    Answer {
        /// Assessment ID
        session: i64,

        /// Learner ID
        #[arg(long, short)]
        learner: i64,

        /// Question ID being answered
        #[arg(long, short)]
        question: i64,

        /// Submitted answer
        #[arg(long, short)]
        answer: String,

        /// Seconds spent on the question
        #[arg(long, short, default_value_t = 0)]
        time: u32,

        /// Number of hints used
        #[arg(long, default_value_t = 0)]
        hints: u32,
    },

    /// Reveal a hint for the current question
    Hint {
        /// Assessment ID
        session: i64,

        /// Learner ID
        #[arg(long, short)]
        learner: i64,

        /// Hint number, starting at 1
        #[arg(long, short, default_value_t = 1)]
        number: usize,
    },

    /// Finish an assessment and record the result
    Complete {
        /// Assessment ID
        session: i64,

        /// Learner ID
        #[arg(long, short)]
        learner: i64,
    },

    /// Abandon an assessment without scoring
    Abandon {
        /// Assessment ID
        session: i64,

        /// Learner ID
        #[arg(long, short)]
        learner: i64,
    },

    /// List a learner's assessments
    List {
        /// Learner ID
        #[arg(long, short)]
        learner: i64,
    },
}

fn get_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("SKILLCHECK_DB") {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skillcheck");

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}

fn init_tracing(verbose: bool) {
    // stdout is reserved for command output
    let default = if verbose { "skillcheck=debug" } else { "skillcheck=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = get_db_path();
    let db = Database::open(&db_path)?;
    let json = cli.json;

    match cli.command {
        Commands::Init => {
            db.init()?;
            if json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Learner(LearnerCommands::Add { name }) => {
            let id = db.add_learner(&name)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "id": id,
                        "name": name
                    })))?
                );
            } else {
                println!("Added learner '{}' with ID: {}", name, id);
            }
        }

        Commands::Skill(skill_cmd) => match skill_cmd {
            SkillCommands::Add {
                slug,
                name,
                description,
            } => {
                let id = db.add_skill(&slug, &name, description.as_deref())?;
                if json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id,
                            "slug": slug
                        })))?
                    );
                } else {
                    println!("Added skill '{}' with ID: {}", slug, id);
                }
            }

            SkillCommands::List => {
                let skills = db.list_skills()?;
                if json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&skills))?);
                } else if skills.is_empty() {
                    println!("No skills found.");
                } else {
                    println!("{:<5} {:<20} NAME", "ID", "SLUG");
                    println!("{}", "-".repeat(60));
                    for skill in skills {
                        println!("{:<5} {:<20} {}", skill.id, truncate(&skill.slug, 18), skill.name);
                    }
                }
            }

            SkillCommands::Enroll { skill, learner } => {
                let skill = find_skill(&db, &skill)?;
                let created = db.enroll(learner, skill.id)?;
                if json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "skill_id": skill.id,
                            "learner_id": learner,
                            "newly_enrolled": created
                        })))?
                    );
                } else if created {
                    println!("Learner {} enrolled in {}.", learner, skill.name);
                } else {
                    println!("Learner {} is already enrolled in {}.", learner, skill.name);
                }
            }

            SkillCommands::Level { skill, learner } => {
                let skill = find_skill(&db, &skill)?;
                match db.get_skill_level(learner, skill.id)? {
                    Some(level) if json => {
                        println!("{}", serde_json::to_string(&JsonOutput::ok(&level))?);
                    }
                    Some(level) => {
                        println!("Skill: {}", skill.name);
                        println!("Level: {}", level.current_level.label());
                        match level.xp_for_next_level() {
                            Some(next) => println!(
                                "XP: {} / {} ({:.0}%)",
                                level.xp_points,
                                next,
                                level.xp_progress_percentage()
                            ),
                            None => println!("XP: {} (max level)", level.xp_points),
                        }
                        println!("Confidence: {:.1}", level.confidence_score);
                        println!(
                            "Streak: {} day(s), best {}",
                            level.streak.current, level.streak.longest
                        );
                        if let Some(score) = level.last_assessment_score {
                            println!("Last assessment: {:.1}%", score);
                        }
                    }
                    None if json => {
                        println!(
                            "{}",
                            serde_json::to_string(&JsonOutput::<()>::err("Learner is not enrolled"))?
                        );
                    }
                    None => println!("Learner {} is not enrolled in {}.", learner, skill.name),
                }
            }
        },

        Commands::Topic(TopicCommands::Add {
            slug,
            name,
            description,
            skill,
            extra,
        }) => {
            let id = db.add_topic(&slug, &name, description.as_deref())?;
            if let Some(skill) = skill {
                let skill = find_skill(&db, &skill)?;
                db.link_topic(skill.id, id, !extra)?;
            }
            if json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "id": id,
                        "slug": slug
                    })))?
                );
            } else {
                println!("Added topic '{}' with ID: {}", slug, id);
            }
        }

        Commands::Question(question_cmd) => match question_cmd {
            QuestionCommands::Add {
                prompt,
                topics,
                answer,
                kind,
                difficulty,
                options,
                hints,
                explanation,
            } => {
                let kind = QuestionKind::from_str(&kind).ok_or_else(|| {
                    format!(
                        "Invalid kind '{}'. Use: multiple_choice, true_false, code_completion, code_review or open_ended",
                        kind
                    )
                })?;
                let difficulty = Difficulty::from_str(&difficulty).ok_or_else(|| {
                    format!(
                        "Invalid difficulty '{}'. Use: easy, medium, hard or expert",
                        difficulty
                    )
                })?;
                let options = parse_options(&options)?;

                let mut topic_ids = Vec::new();
                for slug in split_list(&topics) {
                    let topic = db
                        .get_topic_by_slug(&slug)?
                        .ok_or_else(|| format!("Topic '{}' not found", slug))?;
                    topic_ids.push(topic.id);
                }

                let question = Question {
                    id: 0,
                    kind,
                    difficulty,
                    prompt,
                    code_snippet: None,
                    code_language: None,
                    options: if options.is_empty() { None } else { Some(options) },
                    correct_answer: answer,
                    explanation,
                    hints,
                    times_shown: 0,
                    times_correct: 0,
                    avg_time_seconds: None,
                    is_active: true,
                };
                let id = db.add_question(&question, &topic_ids)?;

                if json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({ "id": id })))?
                    );
                } else {
                    println!("Added question with ID: {}", id);
                }
            }

            QuestionCommands::Import { file } => {
                let raw = std::fs::read_to_string(&file)?;
                let summary = db.import_catalog(&catalog::parse(&raw)?)?;
                if json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&summary))?);
                } else {
                    println!(
                        "Imported {} topic(s), {} skill(s), {} question(s).",
                        summary.topics_created, summary.skills_created, summary.questions_created
                    );
                }
            }

            QuestionCommands::Disable { id } => set_active(&db, json, id, false)?,
            QuestionCommands::Enable { id } => set_active(&db, json, id, true)?,
        },

        Commands::Assess(assess_cmd) => {
            let config = EngineConfig::load(&config::default_config_path())?;
            let issuer = LoggingIssuer;
            let mut manager = AssessmentManager::new(&db, &issuer, SystemClock, config);

            match assess_cmd {
                AssessCommands::Start {
                    skill,
                    learner,
                    count,
                } => {
                    let skill = find_skill(&db, &skill)?;
                    let result = manager.start(learner, skill.id, count);
                    emit(json, result, |outcome| {
                        if outcome.resumed {
                            println!("Resuming assessment {}.", outcome.cursor.session_id);
                        } else {
                            println!(
                                "Started assessment {} ({} questions, {} minutes).",
                                outcome.cursor.session_id,
                                outcome.cursor.total_questions,
                                outcome.cursor.time_remaining_seconds / 60
                            );
                        }
                        print_cursor(&outcome.cursor);
                    })?;
                }

                AssessCommands::Resume { session, learner } => {
                    emit(json, manager.resume(learner, session), print_cursor)?;
                }

                AssessCommands::Answer {
                    session,
                    learner,
                    question,
                    answer,
                    time,
                    hints,
                } => {
                    let submission = AnswerSubmission {
                        question_id: question,
                        answer,
                        time_taken_seconds: time,
                        hints_used: hints,
                    };
                    emit(json, manager.answer(learner, session, &submission), |outcome| {
                        if outcome.is_correct {
                            println!("Correct! +{} XP", outcome.xp_earned);
                        } else {
                            println!(
                                "Incorrect. The answer was: {} (+{} XP)",
                                outcome.correct_answer, outcome.xp_earned
                            );
                        }
                        if let Some(explanation) = &outcome.explanation {
                            println!("{}", explanation);
                        }
                        println!(
                            "Progress: {} answered, {} correct ({:.1}%)",
                            outcome.answered, outcome.correct_so_far, outcome.score_percentage
                        );
                        println!();
                        print_next(&outcome.next);
                    })?;
                }

                AssessCommands::Hint {
                    session,
                    learner,
                    number,
                } => {
                    if number == 0 {
                        return Err("Hint numbers start at 1".into());
                    }
                    emit(json, manager.hint(learner, session, number - 1), |hint| {
                        println!("Hint {}: {}", hint.hint_number, hint.hint);
                        println!("({} more available)", hint.hints_remaining);
                    })?;
                }

                AssessCommands::Complete { session, learner } => {
                    emit(json, manager.complete(learner, session), |report| {
                        println!("=== Assessment Complete ===");
                        println!(
                            "Score: {:.1}% ({} / {} correct)",
                            report.final_score, report.correct_answers, report.total_questions
                        );
                        println!("Assessed level: {}", report.determined_level.label());
                        if report.level_changed {
                            println!(
                                "Level: {} -> {}",
                                report.previous_level.label(),
                                report.current_level.label()
                            );
                        } else {
                            println!("Level: {}", report.current_level.label());
                        }
                        println!("XP earned: {} (total {})", report.xp_earned, report.total_skill_xp);
                        println!(
                            "Time: {}s ({:.1}s per question)",
                            report.total_time_seconds, report.average_time_per_question
                        );
                        if report.certification_eligible {
                            println!("Eligible for certification.");
                        }
                        for rec in &report.recommendations {
                            println!("- {}", rec);
                        }
                    })?;
                }

                AssessCommands::Abandon { session, learner } => {
                    emit(json, manager.abandon(learner, session), |s| {
                        println!(
                            "Assessment {} abandoned after {} of {} questions.",
                            s.id, s.current_index, s.total_questions
                        );
                    })?;
                }

                AssessCommands::List { learner } => {
                    let sessions = db.list_sessions(learner)?;
                    if json {
                        println!("{}", serde_json::to_string(&JsonOutput::ok(&sessions))?);
                    } else if sessions.is_empty() {
                        println!("No assessments found.");
                    } else {
                        println!("{:<5} {:<6} {:<12} {:<10} SCORE", "ID", "SKILL", "STATUS", "PROGRESS");
                        println!("{}", "-".repeat(50));
                        for s in sessions {
                            let score = s
                                .score
                                .map(|v| format!("{:.1}%", v))
                                .unwrap_or_else(|| "-".to_string());
                            println!(
                                "{:<5} {:<6} {:<12} {:<10} {}",
                                s.id,
                                s.skill_id,
                                s.status.as_str(),
                                format!("{}/{}", s.current_index, s.total_questions),
                                score
                            );
                        }
                    }
                }
            }
        }

        Commands::Mastery {
            learner,
            skill,
            due,
        } => {
            let topics = if due {
                db.due_reviews(learner, SystemClock.today())?
            } else {
                let skill_id = match skill {
                    Some(slug) => Some(find_skill(&db, &slug)?.id),
                    None => None,
                };
                db.list_masteries(learner, skill_id)?
            };

            if json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&topics))?);
            } else if topics.is_empty() {
                println!("No topics practiced yet.");
            } else {
                println!("{:<30} {:<15} {:>7} {:>8}  NEXT REVIEW", "TOPIC", "STATUS", "SCORE", "PRACTICE");
                println!("{}", "-".repeat(80));
                for t in topics {
                    let next = t
                        .mastery
                        .next_review_date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<30} {:<15} {:>6.1}% {:>8}  {}{}",
                        truncate(&t.topic.name, 28),
                        t.mastery.status(),
                        t.mastery.mastery_score,
                        t.mastery.times_practiced,
                        next,
                        if t.mastery.needs_review { " (review)" } else { "" }
                    );
                }
            }
        }

        Commands::Stats { learner } => {
            let stats = db.get_stats(learner, SystemClock.today())?;
            let streak = db.streak_days(learner, SystemClock.today())?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "sessions_completed": stats.sessions_completed,
                        "questions_answered": stats.questions_answered,
                        "accuracy": stats.accuracy,
                        "topics_practiced": stats.topics_practiced,
                        "topics_mastered": stats.topics_mastered,
                        "due_now": stats.due_now,
                        "total_xp": stats.total_xp,
                        "streak_days": streak
                    })))?
                );
            } else {
                println!("=== Learner Statistics ===");
                println!("Assessments completed: {}", stats.sessions_completed);
                println!("Questions answered: {}", stats.questions_answered);
                println!("Accuracy: {:.1}%", stats.accuracy);
                println!("Topics practiced: {}", stats.topics_practiced);
                println!("Topics mastered: {}", stats.topics_mastered);
                println!("Due for review: {}", stats.due_now);
                println!("Total XP: {}", stats.total_xp);
                println!("Streak: {} day(s)", streak);
            }
        }
    }

    Ok(())
}

/// Prints an assessment result. Domain errors become a JSON error envelope
/// in `--json` mode and a plain error otherwise.
fn emit<T: Serialize>(
    json: bool,
    result: Result<T, AssessmentError>,
    human: impl FnOnce(&T),
) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(value) if json => {
            println!("{}", serde_json::to_string(&JsonOutput::ok(&value))?);
        }
        Ok(value) => human(&value),
        Err(e) if json => {
            println!(
                "{}",
                serde_json::to_string(&JsonOutput::<()>::err(e.to_string()).with_kind(e.kind()))?
            );
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn print_cursor(cursor: &SessionCursor) {
    println!(
        "Question {}/{} | {} correct | {}:{:02} left",
        (cursor.current_index + 1).min(cursor.total_questions),
        cursor.total_questions,
        cursor.correct_answers,
        cursor.time_remaining_seconds / 60,
        cursor.time_remaining_seconds % 60
    );
    println!();
    print_next(&cursor.next);
}

fn print_next(next: &NextStep) {
    match next {
        NextStep::Question { question } => print_question(question),
        NextStep::CompletionRequired => {
            println!("All questions answered. Finish with:");
            println!("  skillcheck assess complete <ID> --learner <LEARNER>");
        }
    }
}

fn print_question(q: &QuestionView) {
    println!(
        "[{}] ({}, {}) {}",
        q.id,
        q.difficulty.as_str(),
        q.kind.as_str(),
        q.prompt
    );
    if let Some(code) = &q.code_snippet {
        println!();
        println!("```{}", q.code_language.as_deref().unwrap_or(""));
        println!("{}", code);
        println!("```");
    }
    if let Some(options) = &q.options {
        for opt in options {
            println!("  {}) {}", opt.id, opt.text);
        }
    }
    if q.has_hints {
        println!("({} hint(s) available)", q.hints_count);
    }
}

fn set_active(
    db: &Database,
    json: bool,
    id: i64,
    active: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !db.set_question_active(id, active)? {
        return Err(format!("Question {} not found", id).into());
    }
    if json {
        println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
    } else if active {
        println!("Question {} enabled.", id);
    } else {
        println!("Question {} disabled.", id);
    }
    Ok(())
}

fn find_skill(db: &Database, slug: &str) -> Result<Skill, Box<dyn std::error::Error>> {
    Ok(db
        .get_skill_by_slug(slug)?
        .ok_or_else(|| format!("Skill '{}' not found", slug))?)
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_options(raw: &[String]) -> Result<Vec<AnswerOption>, String> {
    raw.iter()
        .map(|entry| {
            let (id, text) = entry
                .split_once('=')
                .ok_or_else(|| format!("Invalid option '{}'. Use: id=text", entry))?;
            Ok(AnswerOption {
                id: id.trim().to_string(),
                text: text.trim().to_string(),
            })
        })
        .collect()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    mod truncate_tests {
        use super::*;

        #[test]
        fn truncate_short_string() {
            assert_eq!(truncate("hello", 10), "hello");
        }

        #[test]
        fn truncate_long_string() {
            assert_eq!(truncate("ownership rules", 8), "owner...");
        }

        #[test]
        fn truncate_multibyte_is_safe() {
            assert_eq!(truncate("héllo wörld", 6), "hél...");
        }
    }

    mod helper_tests {
        use super::*;

        #[test]
        fn split_list_trims_and_drops_empty() {
            assert_eq!(split_list(" a, b ,,c"), vec!["a", "b", "c"]);
        }

        #[test]
        fn parse_options_splits_on_first_equals() {
            let opts = parse_options(&["a=x = y".to_string(), "b = no".to_string()]).unwrap();
            assert_eq!(opts[0].id, "a");
            assert_eq!(opts[0].text, "x = y");
            assert_eq!(opts[1].id, "b");
            assert_eq!(opts[1].text, "no");
        }

        #[test]
        fn parse_options_rejects_missing_equals() {
            assert!(parse_options(&["nope".to_string()]).is_err());
        }

        #[test]
        fn emit_json_error_does_not_fail() {
            let result: Result<(), AssessmentError> = Err(AssessmentError::Expired(3));
            assert!(emit(true, result, |_| {}).is_ok());
        }

        #[test]
        fn emit_plain_error_propagates() {
            let result: Result<(), AssessmentError> =
                Err(AssessmentError::Conflict("twice".to_string()));
            let err = emit(false, result, |_| {}).unwrap_err();
            assert!(err.to_string().contains("twice"));
        }
    }

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn parse_init_command() {
            let cli = Cli::try_parse_from(["skillcheck", "init"]).unwrap();
            assert!(!cli.json);
            assert!(!cli.verbose);
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_global_flags_anywhere() {
            let cli = Cli::try_parse_from(["skillcheck", "--json", "-v", "init"]).unwrap();
            assert!(cli.json);
            assert!(cli.verbose);

            let cli = Cli::try_parse_from(["skillcheck", "stats", "--learner", "1", "--json"])
                .unwrap();
            assert!(cli.json);
        }

        #[test]
        fn parse_skill_add() {
            let cli =
                Cli::try_parse_from(["skillcheck", "skill", "add", "rust", "Rust", "-d", "Systems"])
                    .unwrap();
            match cli.command {
                Commands::Skill(SkillCommands::Add {
                    slug,
                    name,
                    description,
                }) => {
                    assert_eq!(slug, "rust");
                    assert_eq!(name, "Rust");
                    assert_eq!(description, Some("Systems".to_string()));
                }
                _ => panic!("Expected Skill Add command"),
            }
        }

        #[test]
        fn parse_topic_add_with_skill() {
            let cli = Cli::try_parse_from([
                "skillcheck",
                "topic",
                "add",
                "macros",
                "Macros",
                "--skill",
                "rust",
                "--extra",
            ])
            .unwrap();
            match cli.command {
                Commands::Topic(TopicCommands::Add { skill, extra, .. }) => {
                    assert_eq!(skill, Some("rust".to_string()));
                    assert!(extra);
                }
                _ => panic!("Expected Topic Add command"),
            }
        }

        #[test]
        fn parse_question_add_repeated_flags() {
            let cli = Cli::try_parse_from([
                "skillcheck",
                "question",
                "add",
                "What moves?",
                "--topics",
                "ownership",
                "--answer",
                "a",
                "-o",
                "a=String",
                "-o",
                "b=i32",
                "--hint",
                "heap",
                "--difficulty",
                "easy",
            ])
            .unwrap();
            match cli.command {
                Commands::Question(QuestionCommands::Add {
                    options,
                    hints,
                    kind,
                    difficulty,
                    ..
                }) => {
                    assert_eq!(options, vec!["a=String", "b=i32"]);
                    assert_eq!(hints, vec!["heap"]);
                    assert_eq!(kind, "multiple_choice");
                    assert_eq!(difficulty, "easy");
                }
                _ => panic!("Expected Question Add command"),
            }
        }

        #[test]
        fn parse_assess_start() {
            let cli = Cli::try_parse_from([
                "skillcheck",
                "assess",
                "start",
                "rust",
                "--learner",
                "2",
                "--count",
                "10",
            ])
            .unwrap();
            match cli.command {
                Commands::Assess(AssessCommands::Start {
                    skill,
                    learner,
                    count,
                }) => {
                    assert_eq!(skill, "rust");
                    assert_eq!(learner, 2);
                    assert_eq!(count, Some(10));
                }
                _ => panic!("Expected Assess Start command"),
            }
        }

        #[test]
        fn parse_assess_answer_defaults() {
            let cli = Cli::try_parse_from([
                "skillcheck", "assess", "answer", "4", "-l", "1", "-q", "9", "-a", "b",
            ])
            .unwrap();
            match cli.command {
                Commands::Assess(AssessCommands::Answer {
                    session,
                    learner,
                    question,
                    answer,
                    time,
                    hints,
                }) => {
                    assert_eq!(session, 4);
                    assert_eq!(learner, 1);
                    assert_eq!(question, 9);
                    assert_eq!(answer, "b");
                    assert_eq!(time, 0);
                    assert_eq!(hints, 0);
                }
                _ => panic!("Expected Assess Answer command"),
            }
        }

        #[test]
        fn parse_assess_hint_default_number() {
            let cli =
                Cli::try_parse_from(["skillcheck", "assess", "hint", "4", "--learner", "1"]).unwrap();
            match cli.command {
                Commands::Assess(AssessCommands::Hint { number, .. }) => assert_eq!(number, 1),
                _ => panic!("Expected Assess Hint command"),
            }
        }

        #[test]
        fn parse_mastery_due() {
            let cli = Cli::try_parse_from(["skillcheck", "mastery", "--learner", "1", "--due"])
                .unwrap();
            match cli.command {
                Commands::Mastery { learner, skill, due } => {
                    assert_eq!(learner, 1);
                    assert!(skill.is_none());
                    assert!(due);
                }
                _ => panic!("Expected Mastery command"),
            }
        }

        #[test]
        fn parse_negative_hints_fails() {
            let result = Cli::try_parse_from([
                "skillcheck", "assess", "answer", "4", "-l", "1", "-q", "9", "-a", "b", "--hints",
                "-1",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn parse_missing_required_arg_fails() {
            assert!(Cli::try_parse_from(["skillcheck", "assess", "start", "rust"]).is_err());
            assert!(Cli::try_parse_from(["skillcheck", "learner", "add"]).is_err());
            assert!(Cli::try_parse_from(["skillcheck", "invalid"]).is_err());
        }
    }

    mod db_path_tests {
        use super::*;
        use std::env;

        #[test]
        fn get_db_path_uses_env_var() {
            let test_path = "/tmp/test_skillcheck.db";
            env::set_var("SKILLCHECK_DB", test_path);

            let path = get_db_path();
            assert_eq!(path.to_str().unwrap(), test_path);

            env::remove_var("SKILLCHECK_DB");
        }
    }
}
