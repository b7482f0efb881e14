//! Add, update and delete operations
//!
//! Every add is find-or-return: look the natural key up, create when absent,
//! and when the create loses a race on the uniqueness rule, read the winner
//! back and return it. N concurrent identical adds therefore store one row
//! and every caller gets a valid record.
//!
//! A parent word deleted between the lookup and the write surfaces as the
//! word being `NotFound`, the same as if the lookup had missed it.
//!
//! Updates and deletes are look-up-then-mutate with no version check, so the
//! last committed write wins. An update racing a delete either fails with
//! `NotFound` or lands before the delete; it never brings the row back.

use crate::error::{DictionaryError, Result};
use crate::metrics::METRICS;
use crate::model::{EntityKind, Example, Filter, Id, Language, NewRecord, Record, Translation, Word};
use crate::store::SharedRepository;
use std::fmt;
use tracing::{debug, info, warn};

/// Lookup/create rounds before a persistent uniqueness conflict is reported
const CREATE_ATTEMPTS: usize = 3;

pub struct MutationCoordinator {
    repo: SharedRepository,
}

impl MutationCoordinator {
    pub fn new(repo: SharedRepository) -> Self {
        Self { repo }
    }

    pub async fn list_words(&self) -> Result<Vec<Word>> {
        self.repo
            .find_many(&Filter::AllWords)
            .await?
            .into_iter()
            .map(Record::into_word)
            .collect()
    }

    // -------------------------------------------------------------------------
    // words
    // -------------------------------------------------------------------------

    pub async fn add_word(&self, text: &str, language: &str) -> Result<Word> {
        let word = self
            .find_or_create(
                Filter::WordByTextAndLanguage {
                    text: text.to_string(),
                    language: language.to_string(),
                },
                NewRecord::Word {
                    text: text.to_string(),
                    language: language.to_string(),
                },
            )
            .await?
            .into_word()?;
        info!(word.id = word.id, word.text = %word.text, word.language = %word.language, "word added");
        Ok(word)
    }

    pub async fn update_word(&self, old_text: &str, language: &str, new_text: &str) -> Result<Word> {
        let mut word = self
            .repo
            .find_word_by_text_and_language(old_text, language)
            .await?;
        word.text = new_text.to_string();
        let word = self.repo.update(Record::Word(word)).await?.into_word()?;
        info!(word.id = word.id, from = old_text, to = new_text, "word updated");
        Ok(word)
    }

    pub async fn delete_word(&self, text: &str, language: &str) -> Result<bool> {
        let word = self
            .repo
            .find_word_by_text_and_language(text, language)
            .await?;
        self.repo.delete(EntityKind::Word, word.id).await?;
        info!(word.id = word.id, word.text = text, "word deleted");
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // examples
    // -------------------------------------------------------------------------

    pub async fn add_example(&self, word_text: &str, language: &str, text: &str) -> Result<Example> {
        let word = self
            .repo
            .find_word_by_text_and_language(word_text, language)
            .await?;
        let example = self
            .find_or_create(
                Filter::ExampleByText {
                    word_id: word.id,
                    text: text.to_string(),
                },
                NewRecord::Example {
                    word_id: word.id,
                    text: text.to_string(),
                },
            )
            .await?
            .into_example()?;
        info!(example.id = example.id, word.id = word.id, "example added");
        Ok(example)
    }

    pub async fn update_example(&self, id: Id, text: &str) -> Result<Example> {
        let mut example = self
            .repo
            .get_by_id(EntityKind::Example, id)
            .await?
            .into_example()?;
        example.text = text.to_string();
        let example = self
            .repo
            .update(Record::Example(example))
            .await?
            .into_example()?;
        info!(example.id = id, "example updated");
        Ok(example)
    }

    pub async fn delete_example(&self, id: Id) -> Result<bool> {
        self.repo.delete(EntityKind::Example, id).await?;
        info!(example.id = id, "example deleted");
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // translations
    // -------------------------------------------------------------------------

    pub async fn add_translation(&self, pl_text: &str, en_text: &str) -> Result<Translation> {
        let (pl, en) = self.resolve_pair(pl_text, en_text).await?;
        let edge = self
            .find_or_create(
                Filter::TranslationPair {
                    word_id_pl: pl.id,
                    word_id_en: en.id,
                },
                NewRecord::Translation {
                    word_id_pl: pl.id,
                    word_id_en: en.id,
                },
            )
            .await?
            .into_translation()?;
        info!(translation.id = edge.id, pl = pl_text, en = en_text, "translation added");
        Ok(edge)
    }

    pub async fn update_translation(
        &self,
        old_pl_text: &str,
        old_en_text: &str,
        new_pl_text: &str,
        new_en_text: &str,
    ) -> Result<Translation> {
        let mut edge = self.find_translation(old_pl_text, old_en_text).await?;
        let (pl, en) = self.resolve_pair(new_pl_text, new_en_text).await?;
        edge.word_id_pl = pl.id;
        edge.word_id_en = en.id;
        let edge = self
            .repo
            .update(Record::Translation(edge))
            .await
            .map_err(|error| parent_deleted(error, format!("{new_pl_text}/{new_en_text}")))?
            .into_translation()?;
        info!(
            translation.id = edge.id,
            pl = new_pl_text,
            en = new_en_text,
            "translation updated"
        );
        Ok(edge)
    }

    pub async fn delete_translation(&self, pl_text: &str, en_text: &str) -> Result<bool> {
        let edge = self.find_translation(pl_text, en_text).await?;
        self.repo.delete(EntityKind::Translation, edge.id).await?;
        info!(translation.id = edge.id, "translation deleted");
        Ok(true)
    }

    async fn find_translation(&self, pl_text: &str, en_text: &str) -> Result<Translation> {
        let (pl, en) = self.resolve_pair(pl_text, en_text).await?;
        self.repo
            .find_one(&Filter::TranslationPair {
                word_id_pl: pl.id,
                word_id_en: en.id,
            })
            .await?
            .into_translation()
    }

    /// Both ends of an edge, looked up concurrently
    async fn resolve_pair(&self, pl_text: &str, en_text: &str) -> Result<(Word, Word)> {
        tokio::try_join!(
            self.repo
                .find_word_by_text_and_language(pl_text, Language::Polish.as_str()),
            self.repo
                .find_word_by_text_and_language(en_text, Language::English.as_str()),
        )
    }

    async fn find_or_create(&self, filter: Filter, record: NewRecord) -> Result<Record> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.repo.find_one(&filter).await {
                Ok(existing) => {
                    debug!(key = %filter.describe(), id = existing.id(), "returning existing row");
                    return Ok(existing);
                }
                Err(error) if error.is_not_found() => {}
                Err(error) => return Err(error),
            }

            match self.repo.create(record.clone()).await {
                Ok(created) => return Ok(created),
                Err(error) if error.is_unique_violation() && attempt < CREATE_ATTEMPTS => {
                    METRICS.record_create_conflict();
                    warn!(attempt, %error, "lost create race, re-reading");
                }
                Err(error) => return Err(parent_deleted(error, filter.describe())),
            }
        }
    }
}

fn parent_deleted(error: DictionaryError, key: impl fmt::Display) -> DictionaryError {
    if error.is_foreign_key_violation() {
        debug!(%error, "parent word deleted mid-write");
        DictionaryError::not_found(EntityKind::Word, key)
    } else {
        error
    }
}
