//! Concurrent resolution of a word's children
//!
//! A fan-out call looks the parent up, asks the store for the child ids in
//! one query, then spawns one task per id on a [`JoinSet`]. The call only
//! returns after every task has been joined:
//!
//! - all lookups succeed: the children, in completion order (callers must
//!   treat the result as a set)
//! - any lookup fails or its task panics: a single
//!   [`DictionaryError::AggregateFetch`], with the partial results dropped
//!
//! The accumulator lives on the joining task only; sibling tasks hand their
//! result back through the join handle. If the caller drops the future
//! mid-join, the `JoinSet` aborts whatever is still running, so no lookup
//! outlives the call either way.

use crate::error::{DictionaryError, Result};
use crate::logging::fanout_span;
use crate::metrics::METRICS;
use crate::model::{ChildKind, EntityKind, Example, Id, Record, Word};
use crate::store::SharedRepository;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, debug_span, warn};

pub struct FanOutFetcher {
    repo: SharedRepository,
    /// Bounds in-flight child lookups across all calls on this fetcher
    limit: Option<Arc<Semaphore>>,
}

impl FanOutFetcher {
    pub fn new(repo: SharedRepository) -> Self {
        Self { repo, limit: None }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit.map(|permits| Arc::new(Semaphore::new(permits.max(1))));
        self
    }

    /// Examples attached to the word spelled `text`
    pub async fn examples_for_word(&self, text: &str) -> Result<Vec<Example>> {
        let word = self.repo.find_word_by_text(text).await?;
        self.fan_out(word.id, ChildKind::Examples, Record::into_example)
            .await
    }

    /// Counterpart words of the word spelled `text`
    pub async fn translations_for_word(&self, text: &str) -> Result<Vec<Word>> {
        let word = self.repo.find_word_by_text(text).await?;
        self.translations_of(&word).await
    }

    /// Counterpart words of an already resolved word. An unknown language
    /// tag is rejected before the store sees a single child query.
    pub async fn translations_of(&self, word: &Word) -> Result<Vec<Word>> {
        let language = word.language()?;
        self.fan_out(word.id, ChildKind::Translations(language), Record::into_word)
            .await
    }

    async fn fan_out<T>(
        &self,
        parent_id: Id,
        kind: ChildKind,
        extract: fn(Record) -> Result<T>,
    ) -> Result<Vec<T>>
    where
        T: Send + 'static,
    {
        let entity = kind.entity();
        let span = fanout_span(entity, parent_id);

        let ids = self
            .repo
            .list_child_ids(parent_id, kind)
            .instrument(span.clone())
            .await?;
        if ids.is_empty() {
            debug!(parent: &span, "no children");
            return Ok(Vec::new());
        }
        METRICS.record_fanout(&entity.to_string(), ids.len());

        let mut tasks = JoinSet::new();
        for id in ids {
            let repo = Arc::clone(&self.repo);
            let limit = self.limit.clone();
            let child_span = debug_span!(parent: &span, "child_lookup", child.id = id);
            tasks.spawn(
                async move {
                    let _permit = match limit {
                        Some(semaphore) => Some(
                            semaphore
                                .acquire_owned()
                                .await
                                .map_err(|_| DictionaryError::storage("fan-out limiter closed"))?,
                        ),
                        None => None,
                    };
                    repo.get_by_id(entity, id).await.and_then(extract)
                }
                .instrument(child_span),
            );
        }

        collect_all(&mut tasks, entity)
            .instrument(span)
            .await
    }
}

/// Drain every task, then decide. Never returns while a task is pending.
async fn collect_all<T>(tasks: &mut JoinSet<Result<T>>, entity: EntityKind) -> Result<Vec<T>>
where
    T: Send + 'static,
{
    let mut children = Vec::with_capacity(tasks.len());
    let mut failures = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(child)) => children.push(child),
            Ok(Err(error)) => {
                failures += 1;
                debug!(%error, "child lookup failed");
            }
            Err(join_error) => {
                failures += 1;
                warn!(%join_error, "child lookup task did not complete");
            }
        }
    }

    if failures > 0 {
        debug!(failures, succeeded = children.len(), "discarding partial fan-out");
        return Err(DictionaryError::AggregateFetch { entity });
    }
    debug!(count = children.len(), "fan-out complete");
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewRecord;
    use crate::store::{MemoryStore, Repository};
    use assert_matches::assert_matches;

    async fn store_with_examples(texts: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let word = store
            .create(NewRecord::Word {
                text: "kot".into(),
                language: "pl".into(),
            })
            .await
            .unwrap();
        for text in texts {
            store
                .create(NewRecord::Example {
                    word_id: word.id(),
                    text: text.to_string(),
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_limit_of_one_still_collects_everything() {
        let store = store_with_examples(&["a", "b", "c", "d"]).await;
        let fetcher = FanOutFetcher::new(store).with_limit(Some(1));

        let mut texts: Vec<_> = fetcher
            .examples_for_word("kot")
            .await
            .unwrap()
            .into_iter()
            .map(|example| example.text)
            .collect();
        texts.sort();
        assert_eq!(texts, ["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_zero_limit_is_clamped() {
        let store = store_with_examples(&["a"]).await;
        let fetcher = FanOutFetcher::new(store).with_limit(Some(0));
        assert_eq!(fetcher.examples_for_word("kot").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_parent_is_not_found() {
        let store = store_with_examples(&[]).await;
        let fetcher = FanOutFetcher::new(store);
        assert_matches!(
            fetcher.examples_for_word("pies").await,
            Err(DictionaryError::NotFound {
                entity: EntityKind::Word,
                ..
            })
        );
    }

    #[tokio::test]
    async fn test_panicking_task_counts_as_failure() {
        let mut tasks: JoinSet<Result<u32>> = JoinSet::new();
        tasks.spawn(async { Ok(1) });
        tasks.spawn(async {
            let exploded = true;
            if exploded {
                panic!("lookup exploded");
            }
            Ok(2)
        });

        let result = collect_all(&mut tasks, EntityKind::Example).await;
        assert_matches!(result, Err(DictionaryError::AggregateFetch { .. }));
        assert!(tasks.is_empty());
    }
}
