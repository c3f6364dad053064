//! The upstream-owned `feed` table (§3 `FeedRow`, §4.4 `unprocessedFeed`,
//! §9.7 batched `markMemberProcessed`). This core only ever flips `parsed`;
//! it never writes title/description/full_text/link, which belong to the
//! upstream parser.

pub use super::_entities::feed::{ActiveModel, Column, Entity, Model};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::Set;
use sea_orm::{QueryOrder, QuerySelect};

pub type Feed = Entity;

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Falls back to `title` when `description` is empty (§9.7).
    #[must_use]
    pub fn description_or_title(&self) -> &str {
        if self.description.trim().is_empty() {
            &self.title
        } else {
            &self.description
        }
    }
}

impl ActiveModel {
    /// `markMemberProcessed(memberItemID)`: flips the upstream `parsed` flag
    /// so the item is not re-enqueued.
    ///
    /// # Errors
    /// Propagates any database error.
    pub async fn mark_member_processed<C>(db: &C, member_item_id: i64) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let id = i32::try_from(member_item_id).map_err(|e| DbErr::Custom(e.to_string()))?;
        let Some(row) = Entity::find_by_id(id).one(db).await? else {
            return Err(DbErr::RecordNotFound(format!("feed row {member_item_id}")));
        };
        let mut active: Self = row.into();
        active.parsed = Set(true);
        active.update(db).await?;
        Ok(())
    }

    /// Batched variant of `mark_member_processed`, restored from the Go
    /// poller's group-of-20 `UpdateParsed` calls (§9.7). Not used by the
    /// per-item online dispatcher; kept for a future poll-based ingestion
    /// path.
    ///
    /// # Errors
    /// Propagates any database error; partial progress from earlier chunks
    /// is not rolled back on a later chunk's failure.
    pub async fn mark_member_processed_batch<C>(
        db: &C,
        member_item_ids: &[i64],
    ) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        const CHUNK_SIZE: usize = 20;
        for chunk in member_item_ids.chunks(CHUNK_SIZE) {
            let ids: Result<Vec<i32>, _> = chunk.iter().copied().map(i32::try_from).collect();
            let ids = ids.map_err(|e| DbErr::Custom(e.to_string()))?;
            Entity::update_many()
                .col_expr(Column::Parsed, Expr::value(true))
                .filter(Column::Id.is_in(ids))
                .exec(db)
                .await?;
        }
        Ok(())
    }
}

impl Entity {
    /// `unprocessedFeed() -> [FeedRow]`, oldest backlog first.
    ///
    /// # Errors
    /// Returns `DbErr` if there is an error executing the database query.
    pub async fn unprocessed<C>(db: &C, limit: u64) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::Parsed.eq(false))
            .order_by_asc(Column::Id)
            .limit(limit)
            .all(db)
            .await
    }
}
