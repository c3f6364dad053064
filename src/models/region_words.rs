//! `ClusterStore.regionWords` (§4.4): the word list `RegionTagger` snapshots
//! on its refresh ticker.

pub use super::_entities::region_words::{ActiveModel, Column, Entity, Model};
use sea_orm::entity::prelude::*;
use std::collections::HashSet;

pub type RegionWords = Entity;

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// `regionWords() -> set<string>`: a consistent snapshot, lowercased.
    ///
    /// # Errors
    /// Returns `DbErr` if there is an error executing the database query.
    pub async fn region_words<C>(db: &C) -> Result<HashSet<String>, DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = Entity::find().all(db).await?;
        Ok(rows.into_iter().map(|r| r.word.to_lowercase()).collect())
    }
}
