use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::StoreResult;
use crate::models::Difficulty;
use crate::store::{HistoryStore, QuestionRepository};

pub fn difficulty_share(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 0.25,
        Difficulty::Medium => 0.40,
        Difficulty::Hard => 0.25,
        Difficulty::Expert => 0.10,
    }
}

pub fn bucket_sizes(count: usize) -> Vec<(Difficulty, usize)> {
    Difficulty::ALL
        .iter()
        .map(|&d| (d, ((count as f64 * difficulty_share(d)).floor() as usize).max(1)))
        .collect()
}

// Returns fewer than `count` ids only when the topic pool is too small
pub fn select_questions<S, R>(
    store: &S,
    rng: &mut R,
    learner_id: i64,
    skill_id: i64,
    count: usize,
    recent_window: usize,
) -> StoreResult<Vec<i64>>
where
    S: QuestionRepository + HistoryStore + ?Sized,
    R: Rng + ?Sized,
{
    let mut topic_ids = store.skill_topic_ids(skill_id, true)?;
    if topic_ids.is_empty() {
        topic_ids = store.skill_topic_ids(skill_id, false)?;
    }
    if topic_ids.is_empty() || count == 0 {
        return Ok(Vec::new());
    }

    let recently_seen: HashSet<i64> = store
        .recent_question_ids(learner_id, recent_window)?
        .into_iter()
        .collect();

    let mut selected: Vec<i64> = Vec::with_capacity(count);
    for (difficulty, size) in bucket_sizes(count) {
        let pool = store.query_active(&topic_ids, Some(difficulty), &recently_seen, None)?;
        let picked: Vec<i64> = pool.choose_multiple(rng, size).map(|q| q.id).collect();
        debug!(
            difficulty = difficulty.as_str(),
            wanted = size,
            picked = picked.len(),
            "sampled difficulty bucket"
        );
        selected.extend(picked);
    }

    if selected.len() < count {
        let already: HashSet<i64> = selected.iter().copied().collect();
        let needed = count - selected.len();
        let pool = store.query_active(&topic_ids, None, &already, None)?;
        let top_up: Vec<i64> = pool.choose_multiple(rng, needed).map(|q| q.id).collect();
        debug!(needed, found = top_up.len(), "topped up selection");
        selected.extend(top_up);
    }

    selected.shuffle(rng);
    selected.truncate(count);
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{seed_catalog, setup_db, CatalogShape};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    mod bucket_tests {
        use super::*;

        fn sizes(count: usize) -> Vec<usize> {
            bucket_sizes(count).into_iter().map(|(_, n)| n).collect()
        }

        #[test]
        fn fifteen_questions() {
            assert_eq!(sizes(15), vec![3, 6, 3, 1]);
            assert_eq!(sizes(15).iter().sum::<usize>(), 13);
        }

        #[test]
        fn small_counts_floor_to_one() {
            assert_eq!(sizes(5), vec![1, 2, 1, 1]);
        }

        #[test]
        fn thirty_questions() {
            assert_eq!(sizes(30), vec![7, 12, 7, 3]);
        }

        #[test]
        fn buckets_never_exceed_supported_counts() {
            for n in 5..=30 {
                assert!(sizes(n).iter().sum::<usize>() <= n, "count {}", n);
            }
        }

        #[test]
        fn bucket_order_is_easy_to_expert() {
            let order: Vec<Difficulty> = bucket_sizes(10).into_iter().map(|(d, _)| d).collect();
            assert_eq!(order, Difficulty::ALL.to_vec());
        }
    }

    mod selection_tests {
        use super::*;

        fn unique(ids: &[i64]) -> bool {
            let set: HashSet<i64> = ids.iter().copied().collect();
            set.len() == ids.len()
        }

        #[test]
        fn returns_exact_count_of_unique_ids() {
            let db = setup_db();
            let catalog = seed_catalog(&db, &CatalogShape::per_difficulty(10));
            for count in 5..=30 {
                let mut rng = StdRng::seed_from_u64(count as u64);
                let ids =
                    select_questions(&db, &mut rng, catalog.learner_id, catalog.skill_id, count, 100)
                        .unwrap();
                assert_eq!(ids.len(), count, "count {}", count);
                assert!(unique(&ids));
            }
        }

        #[test]
        fn tops_up_when_buckets_fall_short() {
            let db = setup_db();
            // 13 slots from buckets for 15, pool has plenty of medium questions
            let catalog = seed_catalog(
                &db,
                &CatalogShape {
                    easy: 3,
                    medium: 10,
                    hard: 3,
                    expert: 1,
                },
            );
            let mut rng = StdRng::seed_from_u64(7);
            let ids = select_questions(&db, &mut rng, catalog.learner_id, catalog.skill_id, 15, 100)
                .unwrap();
            assert_eq!(ids.len(), 15);
            assert!(unique(&ids));
        }

        #[test]
        fn small_pool_returns_what_exists() {
            let db = setup_db();
            let catalog = seed_catalog(&db, &CatalogShape::per_difficulty(1));
            let mut rng = StdRng::seed_from_u64(1);
            let ids = select_questions(&db, &mut rng, catalog.learner_id, catalog.skill_id, 15, 100)
                .unwrap();
            assert_eq!(ids.len(), 4);
            assert!(unique(&ids));
        }

        #[test]
        fn same_seed_same_selection() {
            let db = setup_db();
            let catalog = seed_catalog(&db, &CatalogShape::per_difficulty(10));
            let run = |seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                select_questions(&db, &mut rng, catalog.learner_id, catalog.skill_id, 15, 100)
                    .unwrap()
            };
            assert_eq!(run(99), run(99));
        }

        #[test]
        fn skill_without_topics_selects_nothing() {
            let db = setup_db();
            let learner = db.add_learner("ada").unwrap();
            let skill = db.add_skill("empty", "Empty", None).unwrap();
            let mut rng = StdRng::seed_from_u64(3);
            let ids = select_questions(&db, &mut rng, learner, skill, 5, 100).unwrap();
            assert!(ids.is_empty());
        }

        #[test]
        fn inactive_questions_are_never_selected() {
            let db = setup_db();
            let catalog = seed_catalog(&db, &CatalogShape::per_difficulty(3));
            let inactive = catalog.question_ids[0];
            db.set_question_active(inactive, false).unwrap();
            for seed in 0..20 {
                let mut rng = StdRng::seed_from_u64(seed);
                let ids =
                    select_questions(&db, &mut rng, catalog.learner_id, catalog.skill_id, 11, 100)
                        .unwrap();
                assert!(!ids.contains(&inactive));
            }
        }

        #[test]
        fn core_topics_take_precedence() {
            let db = setup_db();
            let catalog = seed_catalog(&db, &CatalogShape::per_difficulty(5));
            let side = db.add_topic("side", "Side topic", None).unwrap();
            db.link_topic(catalog.skill_id, side, false).unwrap();
            let side_question = db
                .add_question(&crate::db::tests::question_fixture(Difficulty::Easy), &[side])
                .unwrap();
            for seed in 0..20 {
                let mut rng = StdRng::seed_from_u64(seed);
                let ids =
                    select_questions(&db, &mut rng, catalog.learner_id, catalog.skill_id, 20, 100)
                        .unwrap();
                assert!(!ids.contains(&side_question));
            }
        }

        #[test]
        fn falls_back_to_all_topics_when_none_core() {
            let db = setup_db();
            let learner = db.add_learner("ada").unwrap();
            let skill = db.add_skill("rust", "Rust", None).unwrap();
            let topic = db.add_topic("traits", "Traits", None).unwrap();
            db.link_topic(skill, topic, false).unwrap();
            for d in Difficulty::ALL {
                for _ in 0..2 {
                    db.add_question(&crate::db::tests::question_fixture(d), &[topic])
                        .unwrap();
                }
            }
            let mut rng = StdRng::seed_from_u64(5);
            let ids = select_questions(&db, &mut rng, learner, skill, 5, 100).unwrap();
            assert_eq!(ids.len(), 5);
        }

        #[test]
        fn recently_seen_questions_fill_only_the_top_up() {
            let db = setup_db();
            let catalog = seed_catalog(&db, &CatalogShape::per_difficulty(2));
            // exactly 8 questions in the pool; mark one as recently answered
            let seen = catalog.question_ids[0];
            crate::db::tests::log_answer(&db, catalog.learner_id, seen, 999);

            let mut rng = StdRng::seed_from_u64(11);
            let ids = select_questions(&db, &mut rng, catalog.learner_id, catalog.skill_id, 8, 100)
                .unwrap();
            assert_eq!(ids.len(), 8);
            assert!(ids.contains(&seen));
        }
    }
}
