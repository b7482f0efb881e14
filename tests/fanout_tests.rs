//! Fan-out behaviour against an instrumented repository

mod support;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use dictionary_service::model::{EntityKind, Word};
use dictionary_service::{DictionaryError, FanOutFetcher, SharedRepository};
use support::{InstrumentedRepository, seed_examples, seed_translation, seed_word, sorted_ids};

/// Alive runtime tasks once completed ones have been released
async fn settled_task_count(expected: usize) -> usize {
    let metrics = tokio::runtime::Handle::current().metrics();
    for _ in 0..100 {
        if metrics.num_alive_tasks() == expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    metrics.num_alive_tasks()
}

fn fetcher(repo: &Arc<InstrumentedRepository>, limit: Option<usize>) -> FanOutFetcher {
    let repo: SharedRepository = repo.clone();
    FanOutFetcher::new(repo).with_limit(limit)
}

#[tokio::test]
async fn word_without_examples_yields_empty_collection() {
    let repo = InstrumentedRepository::new();
    seed_word(repo.as_ref(), "kot", "pl").await;

    let examples = fetcher(&repo, None).examples_for_word("kot").await.unwrap();
    assert!(examples.is_empty());
    assert_eq!(repo.child_queries(), 1);
    assert_eq!(repo.peak(), 0, "no child lookups for an empty id set");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_children_are_returned_as_a_set() {
    let repo = InstrumentedRepository::new();
    let word = seed_word(repo.as_ref(), "dom", "pl").await;
    let seeded = seed_examples(repo.as_ref(), &word, 12).await;

    let fetched = fetcher(&repo, None).examples_for_word("dom").await.unwrap();

    assert_eq!(
        sorted_ids(&fetched, |e| e.id),
        sorted_ids(&seeded, |e| e.id)
    );
    assert!(fetched.iter().all(|e| e.word_id == word.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_failed_lookup_fails_the_whole_fetch() {
    let repo = InstrumentedRepository::new();
    let word = seed_word(repo.as_ref(), "dom", "pl").await;
    let seeded = seed_examples(repo.as_ref(), &word, 8).await;
    repo.fail_lookup(EntityKind::Example, seeded[3].id);

    let result = fetcher(&repo, None).examples_for_word("dom").await;

    assert_matches!(
        result,
        Err(DictionaryError::AggregateFetch {
            entity: EntityKind::Example
        })
    );
    // Every sibling was joined before the error came back
    assert_eq!(repo.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failure_is_reported_only_after_slow_siblings_finish() {
    let repo = InstrumentedRepository::new();
    let word = seed_word(repo.as_ref(), "dom", "pl").await;
    let seeded = seed_examples(repo.as_ref(), &word, 6).await;
    repo.fail_lookup(EntityKind::Example, seeded[0].id);
    repo.set_delay(Duration::from_millis(30));

    let result = fetcher(&repo, None).examples_for_word("dom").await;

    assert!(result.is_err());
    assert_eq!(repo.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_task_outlives_a_completed_call() {
    let repo = InstrumentedRepository::new();
    let word = seed_word(repo.as_ref(), "dom", "pl").await;
    let seeded = seed_examples(repo.as_ref(), &word, 10).await;
    let fetcher = fetcher(&repo, None);
    let baseline = Arc::strong_count(&repo);
    let tasks_before = tokio::runtime::Handle::current().metrics().num_alive_tasks();

    fetcher.examples_for_word("dom").await.unwrap();
    assert_eq!(Arc::strong_count(&repo), baseline);
    assert_eq!(settled_task_count(tasks_before).await, tasks_before);

    repo.fail_lookup(EntityKind::Example, seeded[9].id);
    fetcher.examples_for_word("dom").await.unwrap_err();
    assert_eq!(Arc::strong_count(&repo), baseline);
    assert_eq!(repo.in_flight(), 0);
    assert_eq!(settled_task_count(tasks_before).await, tasks_before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dropping_the_call_aborts_outstanding_lookups() {
    let repo = InstrumentedRepository::new();
    let word = seed_word(repo.as_ref(), "dom", "pl").await;
    seed_examples(repo.as_ref(), &word, 8).await;
    repo.set_delay(Duration::from_secs(5));
    let fetcher = fetcher(&repo, None);
    let baseline = Arc::strong_count(&repo);

    let timed_out = tokio::time::timeout(
        Duration::from_millis(50),
        fetcher.examples_for_word("dom"),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(repo.peak() > 0);

    repo.settle().await;
    assert_eq!(repo.in_flight(), 0);
    assert_eq!(Arc::strong_count(&repo), baseline);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lookups_run_concurrently_when_unbounded() {
    let repo = InstrumentedRepository::new();
    let word = seed_word(repo.as_ref(), "dom", "pl").await;
    seed_examples(repo.as_ref(), &word, 8).await;
    repo.set_delay(Duration::from_millis(50));

    let fetched = fetcher(&repo, None).examples_for_word("dom").await.unwrap();

    assert_eq!(fetched.len(), 8);
    assert!(repo.peak() > 1, "peak concurrency was {}", repo.peak());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn limit_caps_concurrent_lookups() {
    let repo = InstrumentedRepository::new();
    let word = seed_word(repo.as_ref(), "dom", "pl").await;
    seed_examples(repo.as_ref(), &word, 8).await;
    repo.set_delay(Duration::from_millis(20));

    let fetched = fetcher(&repo, Some(2))
        .examples_for_word("dom")
        .await
        .unwrap();

    assert_eq!(fetched.len(), 8);
    assert!(repo.peak() <= 2, "peak concurrency was {}", repo.peak());
}

#[tokio::test]
async fn unsupported_language_fails_before_any_child_query() {
    let repo = InstrumentedRepository::new();
    let word = Word {
        id: 42,
        text: "Haus".to_string(),
        language: "de".to_string(),
    };

    let result = fetcher(&repo, None).translations_of(&word).await;

    assert_matches!(result, Err(DictionaryError::UnsupportedDomain { value }) if value == "de");
    assert_eq!(repo.child_queries(), 0);
    assert_eq!(repo.peak(), 0);
}

#[tokio::test]
async fn translations_resolve_from_either_side() {
    let repo = InstrumentedRepository::new();
    let kot = seed_word(repo.as_ref(), "kot", "pl").await;
    let cat = seed_word(repo.as_ref(), "cat", "en").await;
    let kitty = seed_word(repo.as_ref(), "kitty", "en").await;
    seed_translation(repo.as_ref(), &kot, &cat).await;
    seed_translation(repo.as_ref(), &kot, &kitty).await;

    let fetcher = fetcher(&repo, None);

    let from_pl = fetcher.translations_for_word("kot").await.unwrap();
    assert_eq!(sorted_ids(&from_pl, |w| w.id), vec![cat.id, kitty.id]);
    assert!(from_pl.iter().all(|w| w.language == "en"));

    let from_en = fetcher.translations_for_word("cat").await.unwrap();
    assert_eq!(from_en, vec![kot]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_failed_counterpart_fails_the_translation_fetch() {
    let repo = InstrumentedRepository::new();
    let kot = seed_word(repo.as_ref(), "kot", "pl").await;
    let cat = seed_word(repo.as_ref(), "cat", "en").await;
    let kitty = seed_word(repo.as_ref(), "kitty", "en").await;
    seed_translation(repo.as_ref(), &kot, &cat).await;
    seed_translation(repo.as_ref(), &kot, &kitty).await;
    repo.fail_lookup(EntityKind::Word, cat.id);

    let result = fetcher(&repo, None).translations_for_word("kot").await;

    assert_matches!(
        result,
        Err(DictionaryError::AggregateFetch {
            entity: EntityKind::Word
        })
    );
    assert_eq!(repo.in_flight(), 0);
}

#[tokio::test]
async fn missing_parent_is_not_found() {
    let repo = InstrumentedRepository::new();
    let result = fetcher(&repo, None).translations_for_word("nic").await;
    assert_matches!(
        result,
        Err(DictionaryError::NotFound {
            entity: EntityKind::Word,
            ..
        })
    );
    assert_eq!(repo.child_queries(), 0);
}
