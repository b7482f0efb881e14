use crate::config::ServerConfig;
use crate::error::Result;
use crate::fanout::FanOutFetcher;
use crate::logging::operation_span;
use crate::metrics::METRICS;
use crate::model::{Example, Id, Translation, Word};
use crate::mutation::MutationCoordinator;
use crate::store::{MemoryStore, SharedRepository, StoreCounts};
use std::future::Future;
use std::sync::Arc;
use tracing::{Instrument, info};

/// Every dictionary operation over one shared repository handle
///
/// Each call runs inside an operation span and is counted in the metrics
/// registry under its name.
pub struct Dictionary {
    fetcher: FanOutFetcher,
    coordinator: MutationCoordinator,
}

impl Dictionary {
    pub fn new(repo: SharedRepository, fanout_limit: Option<usize>) -> Self {
        Self {
            fetcher: FanOutFetcher::new(Arc::clone(&repo)).with_limit(fanout_limit),
            coordinator: MutationCoordinator::new(repo),
        }
    }

    pub async fn list_words(&self) -> Result<Vec<Word>> {
        observe("list_words", self.coordinator.list_words()).await
    }

    pub async fn examples_for_word(&self, text: &str) -> Result<Vec<Example>> {
        observe("examples_for_word", self.fetcher.examples_for_word(text)).await
    }

    pub async fn translations_for_word(&self, text: &str) -> Result<Vec<Word>> {
        observe(
            "translations_for_word",
            self.fetcher.translations_for_word(text),
        )
        .await
    }

    pub async fn translations_of(&self, word: &Word) -> Result<Vec<Word>> {
        observe("translations_of", self.fetcher.translations_of(word)).await
    }

    pub async fn add_word(&self, text: &str, language: &str) -> Result<Word> {
        observe("add_word", self.coordinator.add_word(text, language)).await
    }

    pub async fn update_word(&self, old_text: &str, language: &str, new_text: &str) -> Result<Word> {
        observe(
            "update_word",
            self.coordinator.update_word(old_text, language, new_text),
        )
        .await
    }

    pub async fn delete_word(&self, text: &str, language: &str) -> Result<bool> {
        observe("delete_word", self.coordinator.delete_word(text, language)).await
    }

    pub async fn add_example(&self, word_text: &str, language: &str, text: &str) -> Result<Example> {
        observe(
            "add_example",
            self.coordinator.add_example(word_text, language, text),
        )
        .await
    }

    pub async fn update_example(&self, id: Id, text: &str) -> Result<Example> {
        observe("update_example", self.coordinator.update_example(id, text)).await
    }

    pub async fn delete_example(&self, id: Id) -> Result<bool> {
        observe("delete_example", self.coordinator.delete_example(id)).await
    }

    pub async fn add_translation(&self, pl_text: &str, en_text: &str) -> Result<Translation> {
        observe(
            "add_translation",
            self.coordinator.add_translation(pl_text, en_text),
        )
        .await
    }

    pub async fn update_translation(
        &self,
        old_pl_text: &str,
        old_en_text: &str,
        new_pl_text: &str,
        new_en_text: &str,
    ) -> Result<Translation> {
        observe(
            "update_translation",
            self.coordinator
                .update_translation(old_pl_text, old_en_text, new_pl_text, new_en_text),
        )
        .await
    }

    pub async fn delete_translation(&self, pl_text: &str, en_text: &str) -> Result<bool> {
        observe(
            "delete_translation",
            self.coordinator.delete_translation(pl_text, en_text),
        )
        .await
    }
}

async fn observe<T, F>(name: &'static str, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = operation.instrument(operation_span(name)).await;
    METRICS.record_operation(name, &result);
    result
}

/// Process-wide state: configuration, the store handle and the dictionary
pub struct AppState {
    config: Arc<ServerConfig>,
    store: Arc<MemoryStore>,
    dictionary: Dictionary,
}

impl AppState {
    /// Open the store (from the configured snapshot when present)
    pub fn open(config: Arc<ServerConfig>) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryStore::open(config.data_file.as_deref())?);
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Arc<ServerConfig>, store: Arc<MemoryStore>) -> Self {
        let repo: SharedRepository = store.clone();
        let dictionary = Dictionary::new(repo, config.fanout_limit);
        Self {
            config,
            store,
            dictionary,
        }
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn counts(&self) -> StoreCounts {
        self.store.counts()
    }

    /// Write the snapshot if one is configured
    pub fn flush(&self) -> anyhow::Result<()> {
        if let Some(path) = self.config.data_file.as_deref() {
            self.store.save(path)?;
            info!(path = %path.display(), "dictionary snapshot flushed");
        }
        Ok(())
    }
}
