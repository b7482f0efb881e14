use super::Repository;
use crate::error::{DictionaryError, Result};
use crate::model::{
    ChildKind, EntityKind, Example, Filter, Id, Language, NewRecord, Record, Translation, Word,
};
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub words: usize,
    pub translations: usize,
    pub examples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sequences {
    word: Id,
    translation: Id,
    example: Id,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            word: 1,
            translation: 1,
            example: 1,
        }
    }
}

impl Sequences {
    fn next(&mut self, kind: EntityKind) -> Id {
        let slot = match kind {
            EntityKind::Word => &mut self.word,
            EntityKind::Translation => &mut self.translation,
            EntityKind::Example => &mut self.example,
        };
        let id = *slot;
        *slot += 1;
        id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    sequences: Sequences,
    words: BTreeMap<Id, Word>,
    translations: BTreeMap<Id, Translation>,
    examples: BTreeMap<Id, Example>,
}

/// In-process relational store
///
/// All three tables live behind one `RwLock`, so every repository call is a
/// single atomic statement. Uniqueness, check and foreign-key rules are
/// enforced inside the write lock, and deleting a word cascades to its
/// examples and translation edges.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON snapshot written by [`MemoryStore::save`]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open snapshot {:?}", path))?;
        let tables: Tables = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse snapshot {:?}", path))?;
        let store = Self {
            tables: RwLock::new(tables),
        };
        let counts = store.counts();
        info!(
            path = %path.display(),
            words = counts.words,
            translations = counts.translations,
            examples = counts.examples,
            "loaded dictionary snapshot"
        );
        Ok(store)
    }

    /// Open the snapshot at `path` if it exists, otherwise start empty
    pub fn open(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                info!(path = %path.display(), "no snapshot found, starting empty");
                Ok(Self::new())
            }
            None => Ok(Self::new()),
        }
    }

    /// Atomically write the current tables as JSON
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let parent_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent_dir)
            .with_context(|| format!("failed to create snapshot directory {:?}", parent_dir))?;

        let tables = self.tables.read().clone();
        let temp_file = NamedTempFile::new_in(parent_dir)?;
        {
            let mut writer = BufWriter::new(&temp_file);
            serde_json::to_writer(&mut writer, &tables)?;
            writer.flush()?;
        }
        temp_file
            .persist(path)
            .with_context(|| format!("failed to persist snapshot {:?}", path))?;
        debug!(path = %path.display(), "snapshot written");
        Ok(())
    }

    pub fn counts(&self) -> StoreCounts {
        let tables = self.tables.read();
        StoreCounts {
            words: tables.words.len(),
            translations: tables.translations.len(),
            examples: tables.examples.len(),
        }
    }
}

impl Tables {
    fn get(&self, kind: EntityKind, id: Id) -> Option<Record> {
        match kind {
            EntityKind::Word => self.words.get(&id).cloned().map(Record::Word),
            EntityKind::Translation => self.translations.get(&id).copied().map(Record::Translation),
            EntityKind::Example => self.examples.get(&id).cloned().map(Record::Example),
        }
    }

    fn scan<'a>(&'a self, filter: &'a Filter) -> Box<dyn Iterator<Item = Record> + 'a> {
        let rows: Box<dyn Iterator<Item = Record> + 'a> = match filter.kind() {
            EntityKind::Word => Box::new(self.words.values().cloned().map(Record::Word)),
            EntityKind::Translation => Box::new(
                self.translations
                    .values()
                    .copied()
                    .map(Record::Translation),
            ),
            EntityKind::Example => Box::new(self.examples.values().cloned().map(Record::Example)),
        };
        Box::new(rows.filter(move |record| filter.matches(record)))
    }

    fn check_word(&self, text: &str, language: &str, own_id: Option<Id>) -> Result<()> {
        if language.parse::<Language>().is_err() {
            return Err(DictionaryError::check(format!(
                "language '{language}' is not one of pl, en"
            )));
        }
        let taken = self
            .words
            .values()
            .any(|word| Some(word.id) != own_id && word.text == text && word.language == language);
        if taken {
            return Err(DictionaryError::unique(format!(
                "word '{text}' already exists for language {language}"
            )));
        }
        Ok(())
    }

    fn check_translation(&self, word_id_pl: Id, word_id_en: Id, own_id: Option<Id>) -> Result<()> {
        for (side, word_id) in [
            (Language::Polish, word_id_pl),
            (Language::English, word_id_en),
        ] {
            match self.words.get(&word_id) {
                Some(word) if word.language == side.as_str() => {}
                Some(word) => {
                    return Err(DictionaryError::foreign_key(format!(
                        "word {word_id} is '{}', expected {side}",
                        word.language
                    )));
                }
                None => {
                    return Err(DictionaryError::foreign_key(format!(
                        "{side} word {word_id} does not exist"
                    )));
                }
            }
        }
        let taken = self.translations.values().any(|edge| {
            Some(edge.id) != own_id && edge.word_id_pl == word_id_pl && edge.word_id_en == word_id_en
        });
        if taken {
            return Err(DictionaryError::unique(format!(
                "translation pl={word_id_pl} en={word_id_en} already exists"
            )));
        }
        Ok(())
    }

    fn check_example(&self, word_id: Id, text: &str, own_id: Option<Id>) -> Result<()> {
        if !self.words.contains_key(&word_id) {
            return Err(DictionaryError::foreign_key(format!(
                "word {word_id} does not exist"
            )));
        }
        let taken = self
            .examples
            .values()
            .any(|example| Some(example.id) != own_id && example.word_id == word_id && example.text == text);
        if taken {
            return Err(DictionaryError::unique(format!(
                "example '{text}' already attached to word {word_id}"
            )));
        }
        Ok(())
    }

    fn check(&self, record: &Record) -> Result<()> {
        let own_id = Some(record.id());
        match record {
            Record::Word(word) => self.check_word(&word.text, &word.language, own_id),
            Record::Translation(edge) => {
                self.check_translation(edge.word_id_pl, edge.word_id_en, own_id)
            }
            Record::Example(example) => self.check_example(example.word_id, &example.text, own_id),
        }
    }

    fn put(&mut self, record: Record) {
        match record {
            Record::Word(word) => {
                self.words.insert(word.id, word);
            }
            Record::Translation(edge) => {
                self.translations.insert(edge.id, edge);
            }
            Record::Example(example) => {
                self.examples.insert(example.id, example);
            }
        }
    }

    fn remove(&mut self, kind: EntityKind, id: Id) -> bool {
        match kind {
            EntityKind::Word => {
                if self.words.remove(&id).is_none() {
                    return false;
                }
                self.translations
                    .retain(|_, edge| edge.word_id_pl != id && edge.word_id_en != id);
                self.examples.retain(|_, example| example.word_id != id);
                true
            }
            EntityKind::Translation => self.translations.remove(&id).is_some(),
            EntityKind::Example => self.examples.remove(&id).is_some(),
        }
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn get_by_id(&self, kind: EntityKind, id: Id) -> Result<Record> {
        self.tables
            .read()
            .get(kind, id)
            .ok_or_else(|| DictionaryError::not_found(kind, id))
    }

    async fn find_one(&self, filter: &Filter) -> Result<Record> {
        let tables = self.tables.read();
        let found = tables.scan(filter).next();
        found.ok_or_else(|| DictionaryError::not_found(filter.kind(), filter.describe()))
    }

    async fn find_many(&self, filter: &Filter) -> Result<Vec<Record>> {
        Ok(self.tables.read().scan(filter).collect())
    }

    async fn list_child_ids(&self, parent_id: Id, kind: ChildKind) -> Result<Vec<Id>> {
        let tables = self.tables.read();
        let ids = match kind {
            ChildKind::Examples => tables
                .scan(&Filter::ExamplesOfWord { word_id: parent_id })
                .map(|record| record.id())
                .collect(),
            ChildKind::Translations(side) => tables
                .scan(&Filter::TranslationsOfWord {
                    word_id: parent_id,
                    side,
                })
                .filter_map(|record| match record {
                    Record::Translation(edge) => Some(edge.word_id(side.counterpart())),
                    _ => None,
                })
                .collect(),
        };
        Ok(ids)
    }

    async fn create(&self, record: NewRecord) -> Result<Record> {
        let mut tables = self.tables.write();
        match &record {
            NewRecord::Word { text, language } => tables.check_word(text, language, None)?,
            NewRecord::Translation {
                word_id_pl,
                word_id_en,
            } => tables.check_translation(*word_id_pl, *word_id_en, None)?,
            NewRecord::Example { word_id, text } => tables.check_example(*word_id, text, None)?,
        }
        let id = tables.sequences.next(record.kind());
        let stored = record.with_id(id);
        tables.put(stored.clone());
        Ok(stored)
    }

    async fn update(&self, record: Record) -> Result<Record> {
        let mut tables = self.tables.write();
        if tables.get(record.kind(), record.id()).is_none() {
            return Err(DictionaryError::not_found(record.kind(), record.id()));
        }
        tables.check(&record)?;
        tables.put(record.clone());
        Ok(record)
    }

    async fn delete(&self, kind: EntityKind, id: Id) -> Result<()> {
        if self.tables.write().remove(kind, id) {
            Ok(())
        } else {
            Err(DictionaryError::not_found(kind, id))
        }
    }
}
