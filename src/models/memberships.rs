//! `ClusterStore.recordMembership` (§4.4): idempotent, at-most-one-cluster-
//! per-member insertion, backed by the `memberships.member_id` unique
//! constraint.

pub use super::_entities::memberships::{ActiveModel, Column, Entity, Model};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::ActiveValue::Set;

pub type Memberships = Entity;

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// Inserts `(cluster_id, member_id)` if the member has no existing
    /// membership; a no-op otherwise (re-delivery of the same item, or a
    /// losing duplicate-seed race that got assigned to the winning cluster).
    ///
    /// This does not touch `clusters.member_count` — that column is owned
    /// entirely by [`crate::models::clusters::ActiveModel::create_cluster`]
    /// and [`crate::models::clusters::ActiveModel::absorb_member`], which
    /// advance it under the same row lock as the centroid update they do
    /// together. Splitting the increment across this insert and that lock
    /// is exactly the race the caller's transaction is built to avoid, so
    /// callers MUST call this only after `absorb_member`/`create_cluster`
    /// has already accounted for the member.
    ///
    /// # Errors
    /// Propagates any database error.
    pub async fn record_membership<C>(
        db: &C,
        cluster_id: i64,
        member_item_id: i64,
    ) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let model = Self {
            cluster_id: Set(cluster_id),
            member_id: Set(member_item_id),
            ..Default::default()
        };

        let result = Entity::insert(model)
            .on_conflict(OnConflict::column(Column::MemberId).do_nothing().to_owned())
            .exec_with_returning(db)
            .await;

        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Entity {
    /// # Errors
    /// Returns `DbErr` if there is an error executing the database query.
    pub async fn cluster_for_member<C>(
        db: &C,
        member_item_id: i64,
    ) -> Result<Option<i64>, DbErr>
    where
        C: ConnectionTrait,
    {
        let membership = Entity::find()
            .filter(Column::MemberId.eq(member_item_id))
            .one(db)
            .await?;
        Ok(membership.map(|m| m.cluster_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn sample_membership(id: i32, cluster_id: i64, member_id: i64) -> Model {
        Model {
            id,
            cluster_id,
            member_id,
        }
    }

    #[tokio::test]
    async fn record_membership_inserts_without_touching_clusters() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_membership(1, 10, 500)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 10,
                rows_affected: 1,
            }])
            .into_connection();

        ActiveModel::record_membership(&db, 10, 500).await.unwrap();

        // Only the insert ran — no separate round trip to `clusters`.
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn cluster_for_member_returns_cluster_id() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_membership(1, 10, 500)]])
            .into_connection();

        let result = Entity::cluster_for_member(&db, 500).await.unwrap();
        assert_eq!(result, Some(10));
    }

    #[tokio::test]
    async fn cluster_for_member_returns_none_when_absent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(Vec::<Vec<Model>>::from([Vec::new()]))
            .into_connection();

        let result = Entity::cluster_for_member(&db, 999).await.unwrap();
        assert_eq!(result, None);
    }
}
