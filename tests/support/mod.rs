#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dictionary_service::error::{DictionaryError, Result};
use dictionary_service::model::{ChildKind, EntityKind, Example, Filter, Id, NewRecord, Record, Word};
use dictionary_service::{MemoryStore, Repository};
use parking_lot::Mutex;

/// Wraps a [`MemoryStore`] and lets a test fail, slow down and observe
/// individual point lookups.
#[derive(Default)]
pub struct InstrumentedRepository {
    inner: MemoryStore,
    failing: Mutex<HashSet<(EntityKind, Id)>>,
    delay: Mutex<Option<Duration>>,
    delete_before_write: Mutex<Option<Id>>,
    child_queries: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl InstrumentedRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_lookup(&self, kind: EntityKind, id: Id) {
        self.failing.lock().insert((kind, id));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Delete word `id` just before the next create or update reaches the
    /// store, as a concurrent `delete_word` would
    pub fn delete_word_before_next_write(&self, id: Id) {
        *self.delete_before_write.lock() = Some(id);
    }

    async fn run_pending_delete(&self) {
        let pending = self.delete_before_write.lock().take();
        if let Some(id) = pending {
            self.inner
                .delete(EntityKind::Word, id)
                .await
                .expect("delete word before write");
        }
    }

    pub fn child_queries(&self) -> usize {
        self.child_queries.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Poll until no lookup is running, giving aborted tasks time to unwind
    pub async fn settle(&self) {
        for _ in 0..100 {
            if self.in_flight() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Decrements on drop, so an aborted lookup still leaves the gauge
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Repository for InstrumentedRepository {
    async fn get_by_id(&self, kind: EntityKind, id: Id) -> Result<Record> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(&(kind, id)) {
            return Err(DictionaryError::storage(format!("injected failure for {kind} {id}")));
        }
        self.inner.get_by_id(kind, id).await
    }

    async fn find_one(&self, filter: &Filter) -> Result<Record> {
        self.inner.find_one(filter).await
    }

    async fn find_many(&self, filter: &Filter) -> Result<Vec<Record>> {
        self.inner.find_many(filter).await
    }

    async fn list_child_ids(&self, parent_id: Id, kind: ChildKind) -> Result<Vec<Id>> {
        self.child_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.list_child_ids(parent_id, kind).await
    }

    async fn create(&self, record: NewRecord) -> Result<Record> {
        self.run_pending_delete().await;
        self.inner.create(record).await
    }

    async fn update(&self, record: Record) -> Result<Record> {
        self.run_pending_delete().await;
        self.inner.update(record).await
    }

    async fn delete(&self, kind: EntityKind, id: Id) -> Result<()> {
        self.inner.delete(kind, id).await
    }
}

pub async fn seed_word(repo: &dyn Repository, text: &str, language: &str) -> Word {
    repo.create(NewRecord::Word {
        text: text.to_string(),
        language: language.to_string(),
    })
    .await
    .and_then(Record::into_word)
    .expect("seed word")
}

pub async fn seed_examples(repo: &dyn Repository, word: &Word, count: usize) -> Vec<Example> {
    let mut examples = Vec::with_capacity(count);
    for n in 0..count {
        let example = repo
            .create(NewRecord::Example {
                word_id: word.id,
                text: format!("{} #{n}", word.text),
            })
            .await
            .and_then(Record::into_example)
            .expect("seed example");
        examples.push(example);
    }
    examples
}

pub async fn seed_translation(repo: &dyn Repository, pl: &Word, en: &Word) {
    repo.create(NewRecord::Translation {
        word_id_pl: pl.id,
        word_id_en: en.id,
    })
    .await
    .expect("seed translation");
}

pub fn sorted_ids<T>(items: &[T], id: impl Fn(&T) -> Id) -> Vec<Id> {
    let mut ids: Vec<Id> = items.iter().map(id).collect();
    ids.sort_unstable();
    ids
}
