use crate::error::{DictionaryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Row identifier assigned by the store
pub type Id = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Word,
    Translation,
    Example,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Word => write!(f, "word"),
            EntityKind::Translation => write!(f, "translation"),
            EntityKind::Example => write!(f, "example"),
        }
    }
}

// =============================================================================
// LANGUAGE
// =============================================================================

/// The closed set of supported language tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "pl")]
    Polish,
    #[serde(rename = "en")]
    English,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Polish => "pl",
            Language::English => "en",
        }
    }

    /// The language on the other side of a translation edge
    pub fn counterpart(&self) -> Language {
        match self {
            Language::Polish => Language::English,
            Language::English => Language::Polish,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = DictionaryError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "pl" => Ok(Language::Polish),
            "en" => Ok(Language::English),
            other => Err(DictionaryError::UnsupportedDomain {
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A spelling in one language. The tag is kept raw so rows written by other
/// tools with an unknown tag can still be read and rejected explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Word {
    pub id: Id,
    pub text: String,
    pub language: String,
}

impl Word {
    pub fn language(&self) -> Result<Language> {
        self.language.parse()
    }
}

/// Edge between one Polish and one English word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Translation {
    pub id: Id,
    pub word_id_pl: Id,
    pub word_id_en: Id,
}

impl Translation {
    /// Id of the word on the given side of the edge
    pub fn word_id(&self, side: Language) -> Id {
        match side {
            Language::Polish => self.word_id_pl,
            Language::English => self.word_id_en,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Example {
    pub id: Id,
    pub word_id: Id,
    pub text: String,
}

// =============================================================================
// REPOSITORY VOCABULARY
// =============================================================================

/// A stored row of any kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Word(Word),
    Translation(Translation),
    Example(Example),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Word(_) => EntityKind::Word,
            Record::Translation(_) => EntityKind::Translation,
            Record::Example(_) => EntityKind::Example,
        }
    }

    pub fn id(&self) -> Id {
        match self {
            Record::Word(word) => word.id,
            Record::Translation(translation) => translation.id,
            Record::Example(example) => example.id,
        }
    }

    pub fn into_word(self) -> Result<Word> {
        match self {
            Record::Word(word) => Ok(word),
            other => Err(mismatch(EntityKind::Word, other.kind())),
        }
    }

    pub fn into_translation(self) -> Result<Translation> {
        match self {
            Record::Translation(translation) => Ok(translation),
            other => Err(mismatch(EntityKind::Translation, other.kind())),
        }
    }

    pub fn into_example(self) -> Result<Example> {
        match self {
            Record::Example(example) => Ok(example),
            other => Err(mismatch(EntityKind::Example, other.kind())),
        }
    }
}

fn mismatch(expected: EntityKind, actual: EntityKind) -> DictionaryError {
    DictionaryError::storage(format!("expected {expected} record, got {actual}"))
}

/// Row content for `create`; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewRecord {
    Word { text: String, language: String },
    Translation { word_id_pl: Id, word_id_en: Id },
    Example { word_id: Id, text: String },
}

impl NewRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            NewRecord::Word { .. } => EntityKind::Word,
            NewRecord::Translation { .. } => EntityKind::Translation,
            NewRecord::Example { .. } => EntityKind::Example,
        }
    }

    pub(crate) fn with_id(self, id: Id) -> Record {
        match self {
            NewRecord::Word { text, language } => Record::Word(Word { id, text, language }),
            NewRecord::Translation {
                word_id_pl,
                word_id_en,
            } => Record::Translation(Translation {
                id,
                word_id_pl,
                word_id_en,
            }),
            NewRecord::Example { word_id, text } => Record::Example(Example { id, word_id, text }),
        }
    }
}

/// Predicates understood by `find_one` and `find_many`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    AllWords,
    WordByText { text: String },
    WordByTextAndLanguage { text: String, language: String },
    ExamplesOfWord { word_id: Id },
    ExampleByText { word_id: Id, text: String },
    TranslationPair { word_id_pl: Id, word_id_en: Id },
    /// Edges where `word_id` sits on the `side` column
    TranslationsOfWord { word_id: Id, side: Language },
}

impl Filter {
    pub fn kind(&self) -> EntityKind {
        match self {
            Filter::AllWords | Filter::WordByText { .. } | Filter::WordByTextAndLanguage { .. } => {
                EntityKind::Word
            }
            Filter::ExamplesOfWord { .. } | Filter::ExampleByText { .. } => EntityKind::Example,
            Filter::TranslationPair { .. } | Filter::TranslationsOfWord { .. } => {
                EntityKind::Translation
            }
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match (self, record) {
            (Filter::AllWords, Record::Word(_)) => true,
            (Filter::WordByText { text }, Record::Word(word)) => &word.text == text,
            (Filter::WordByTextAndLanguage { text, language }, Record::Word(word)) => {
                &word.text == text && &word.language == language
            }
            (Filter::ExamplesOfWord { word_id }, Record::Example(example)) => {
                example.word_id == *word_id
            }
            (Filter::ExampleByText { word_id, text }, Record::Example(example)) => {
                example.word_id == *word_id && &example.text == text
            }
            (
                Filter::TranslationPair {
                    word_id_pl,
                    word_id_en,
                },
                Record::Translation(translation),
            ) => translation.word_id_pl == *word_id_pl && translation.word_id_en == *word_id_en,
            (Filter::TranslationsOfWord { word_id, side }, Record::Translation(translation)) => {
                translation.word_id(*side) == *word_id
            }
            _ => false,
        }
    }

    /// Human-readable key for `NotFound` messages
    pub fn describe(&self) -> String {
        match self {
            Filter::AllWords => "*".to_string(),
            Filter::WordByText { text } => text.clone(),
            Filter::WordByTextAndLanguage { text, language } => format!("{text}/{language}"),
            Filter::ExamplesOfWord { word_id } => format!("word_id={word_id}"),
            Filter::ExampleByText { word_id, text } => format!("word_id={word_id} '{text}'"),
            Filter::TranslationPair {
                word_id_pl,
                word_id_en,
            } => format!("pl={word_id_pl} en={word_id_en}"),
            Filter::TranslationsOfWord { word_id, side } => format!("{side}={word_id}"),
        }
    }
}

/// Which children of a word to fan out over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// Example rows owned by the word
    Examples,
    /// Counterpart words reached through edges where the parent sits on the
    /// given language's side
    Translations(Language),
}

impl ChildKind {
    /// Kind of row each child id points at
    pub fn entity(&self) -> EntityKind {
        match self {
            ChildKind::Examples => EntityKind::Example,
            ChildKind::Translations(_) => EntityKind::Word,
        }
    }
}
