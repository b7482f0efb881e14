//! Data-access seam between the dictionary core and its backing store
//!
//! The core only ever talks to a [`Repository`] trait object. Each call is
//! atomic on its own and safe to issue from many tasks at once; coordinating
//! several calls is the caller's job.

pub mod memory;

pub use memory::{MemoryStore, StoreCounts};

use crate::error::Result;
use crate::model::{ChildKind, EntityKind, Filter, Id, NewRecord, Record, Word};
use async_trait::async_trait;
use std::sync::Arc;

/// Shared handle to the store, injected wherever data access is needed
pub type SharedRepository = Arc<dyn Repository>;

#[async_trait]
pub trait Repository: Send + Sync {
    /// Point lookup by primary key
    async fn get_by_id(&self, kind: EntityKind, id: Id) -> Result<Record>;

    /// First match ordered by id, or `NotFound`
    async fn find_one(&self, filter: &Filter) -> Result<Record>;

    /// All matches ordered by id
    async fn find_many(&self, filter: &Filter) -> Result<Vec<Record>>;

    /// Identifiers to fan out over for one parent word
    async fn list_child_ids(&self, parent_id: Id, kind: ChildKind) -> Result<Vec<Id>>;

    async fn create(&self, record: NewRecord) -> Result<Record>;

    /// Replaces the stored row with the same id. Never inserts.
    async fn update(&self, record: Record) -> Result<Record>;

    async fn delete(&self, kind: EntityKind, id: Id) -> Result<()>;

    async fn find_word_by_text(&self, text: &str) -> Result<Word> {
        self.find_one(&Filter::WordByText {
            text: text.to_string(),
        })
        .await?
        .into_word()
    }

    async fn find_word_by_text_and_language(&self, text: &str, language: &str) -> Result<Word> {
        self.find_one(&Filter::WordByTextAndLanguage {
            text: text.to_string(),
            language: language.to_string(),
        })
        .await?
        .into_word()
    }
}
