//! `ClusterStore` operations on the `clusters` table (§4.4 of SPEC_FULL.md):
//! dedup-on-seed creation, centroid/activity maintenance, regional-flag
//! monotonicity. Grounded on the teacher's `images.rs`/`face_boxes.rs`
//! `impl ActiveModel` / `impl Entity` split.

pub use super::_entities::clusters::{ActiveModel, Column, Entity, Model};
use crate::vector::Vector;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::ActiveValue::Set;
use sea_orm::{QueryOrder, QuerySelect};

pub type Clusters = Entity;

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {}

impl Model {
    #[must_use]
    pub fn centroid(&self) -> Vector {
        Vector::from(self.embedding.clone())
    }
}

impl ActiveModel {
    /// `createCluster(publishDate, originatingItemID, regional, v) -> clusterID`.
    ///
    /// `ON CONFLICT(feed_id) DO NOTHING`; returns `Ok(0)` when the insert was
    /// a no-op (duplicate seed), `Ok(id)` when the row was created. Callers
    /// MUST treat `0` as an abort signal (§4.5 step 4). `v` becomes the seed
    /// member's centroid, so `member_count` starts at 1, not 0 — the caller
    /// still records a membership row for the seed item, but this store no
    /// longer relies on that insert to bring the count up to 1 (see
    /// [`Self::absorb_member`]'s doc comment for why membership inserts and
    /// count maintenance are kept separate).
    ///
    /// # Errors
    /// Propagates any database error other than the conflict itself.
    pub async fn create_cluster<C>(
        db: &C,
        publish_date: DateTime<Utc>,
        originating_item_id: i64,
        regional: bool,
        v: &Vector,
    ) -> Result<i64, DbErr>
    where
        C: ConnectionTrait,
    {
        let model = Self {
            last_activity: Set(publish_date.into()),
            feed_id: Set(originating_item_id),
            is_rt: Set(regional),
            member_count: Set(1),
            embedding: Set(Vec::<f32>::from(v.clone())),
            ..Default::default()
        };

        let result = Entity::insert(model)
            .on_conflict(
                OnConflict::column(Column::FeedId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_with_returning(db)
            .await;

        match result {
            Ok(inserted) => Ok(i64::from(inserted.id)),
            Err(DbErr::RecordNotInserted) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Overwrites the centroid. Callers MUST have recomputed the mean
    /// themselves; this never reads existing members.
    ///
    /// Kept as the standalone §4.4 primitive for callers that already hold
    /// the lock on `cluster_id` some other way (e.g. a correction tool
    /// run offline). [`Self::absorb_member`] is what `Clusterer` calls for
    /// the concurrent per-item assignment path, since it takes the lock
    /// itself and folds this write into the same statement as the count
    /// bump.
    pub async fn update_centroid<C>(db: &C, cluster_id: i64, v: &Vector) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let cluster = Entity::find_by_id(
            i32::try_from(cluster_id).map_err(|e| DbErr::Custom(e.to_string()))?,
        )
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("cluster {cluster_id}")))?;

        let mut active: Self = cluster.into();
        active.embedding = Set(Vec::<f32>::from(v.clone()));
        active.update(db).await?;
        Ok(())
    }

    /// Bumps freshness. `latest_member_id` is accepted for parity with the
    /// §4.4 signature; this store keys freshness by cluster, not by member,
    /// so it is not otherwise persisted. Standalone primitive, same caveat
    /// as [`Self::update_centroid`] — `Clusterer` uses [`Self::absorb_member`].
    pub async fn update_last_activity<C>(
        db: &C,
        cluster_id: i64,
        timestamp: DateTime<Utc>,
        _latest_member_id: i64,
    ) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let cluster = Entity::find_by_id(
            i32::try_from(cluster_id).map_err(|e| DbErr::Custom(e.to_string()))?,
        )
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("cluster {cluster_id}")))?;

        let mut active: Self = cluster.into();
        active.last_activity = Set(timestamp.into());
        active.update(db).await?;
        Ok(())
    }

    /// Absorbs a new member into an existing cluster: locks the row, recomputes
    /// the running-mean centroid, and advances `member_count`/`last_activity`/
    /// `is_rt` in a single `UPDATE` — all under the row lock taken by the
    /// preceding `SELECT ... FOR UPDATE`. Returns the cluster's `is_rt` after
    /// the update.
    ///
    /// This is §9 DESIGN NOTES' "Centroid maintenance under concurrency" fix:
    /// two tasks racing on the same cluster would otherwise both read the
    /// same pre-update `member_count`/centroid and overwrite each other's
    /// absorption. This crate picks **serializing per-cluster updates** (a
    /// `SELECT ... FOR UPDATE` read followed by one atomic `UPDATE` in the
    /// same transaction) over the alternative of making centroid writes
    /// commutative — the running-mean update already depends on reading the
    /// current centroid, so a lock was unavoidable either way, and folding
    /// `member_count`'s increment into that same locked `UPDATE` (rather
    /// than the separate round trip the previous revision made from
    /// `recordMembership`) closes the race in one place.
    ///
    /// Callers MUST invoke this against a [`sea_orm::DatabaseTransaction`]
    /// (see [`crate::clusterer::Clusterer::assign_to_existing`]) — the row
    /// lock only serializes concurrent callers when it is held across both
    /// statements of the same transaction.
    ///
    /// # Errors
    /// Propagates any database error, including `RecordNotFound` if the
    /// cluster vanished between the caller's earlier lookup and this call.
    pub async fn absorb_member<C>(
        txn: &C,
        cluster_id: i64,
        v: &Vector,
        timestamp: DateTime<Utc>,
        regional: bool,
    ) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        let id = i32::try_from(cluster_id).map_err(|e| DbErr::Custom(e.to_string()))?;
        let cluster = Entity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("cluster {cluster_id}")))?;

        let mut centroid = cluster.centroid();
        let post_insert_count = u64::try_from(cluster.member_count).unwrap_or(0) + 1;
        centroid.absorb_into_mean(v, post_insert_count);
        let is_rt = cluster.is_rt || regional;

        Entity::update_many()
            .col_expr(Column::MemberCount, Expr::col(Column::MemberCount).add(1))
            .col_expr(
                Column::Embedding,
                Expr::value(Vec::<f32>::from(centroid)),
            )
            .col_expr(
                Column::LastActivity,
                Expr::value(DateTimeWithTimeZone::from(timestamp)),
            )
            .col_expr(Column::IsRt, Expr::value(is_rt))
            .filter(Column::Id.eq(id))
            .exec(txn)
            .await?;

        Ok(is_rt)
    }

    /// Monotone: no-op if already `true`.
    pub async fn upgrade_regional<C>(db: &C, cluster_id: i64) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let cluster = Entity::find_by_id(
            i32::try_from(cluster_id).map_err(|e| DbErr::Custom(e.to_string()))?,
        )
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("cluster {cluster_id}")))?;

        if cluster.is_rt {
            return Ok(());
        }
        let mut active: Self = cluster.into();
        active.is_rt = Set(true);
        active.update(db).await?;
        Ok(())
    }
}

impl Entity {
    /// # Errors
    /// Returns `DbErr` if there is an error executing the database query.
    pub async fn find_cluster<C>(db: &C, cluster_id: i64) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        let id = i32::try_from(cluster_id).map_err(|e| DbErr::Custom(e.to_string()))?;
        Entity::find_by_id(id).one(db).await
    }

    /// Most-recently-active clusters first. Used to seed the in-memory
    /// generation's candidate set on startup.
    ///
    /// # Errors
    /// Returns `DbErr` if there is an error executing the database query.
    pub async fn most_recently_active<C>(db: &C, limit: u64) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .order_by_desc(Column::LastActivity)
            .limit(limit)
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn sample_model(id: i32, is_rt: bool, member_count: i32) -> Model {
        Model {
            id,
            created_at: Utc::now().into(),
            last_activity: Utc::now().into(),
            feed_id: 100,
            is_rt,
            member_count,
            embedding: vec![1.0, 0.0],
        }
    }

    #[tokio::test]
    async fn upgrade_regional_is_a_no_op_when_already_true() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_model(1, true, 2)]])
            .into_connection();

        ActiveModel::upgrade_regional(&db, 1).await.unwrap();

        // Only the lookup SELECT ran; no UPDATE was issued because the
        // cluster was already regional.
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn upgrade_regional_updates_when_currently_false() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_model(1, false, 2)]])
            .append_exec_results([sea_orm::MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .into_connection();

        ActiveModel::upgrade_regional(&db, 1).await.unwrap();

        // The lookup SELECT plus the UPDATE both ran.
        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn absorb_member_locks_then_issues_one_atomic_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_model(1, false, 4)]])
            .append_exec_results([sea_orm::MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .into_connection();

        let is_rt = ActiveModel::absorb_member(&db, 1, &Vector::new(vec![1.0, 0.0]), Utc::now(), false)
            .await
            .unwrap();

        assert!(!is_rt);
        // The locked SELECT plus the single UPDATE both ran, nothing else.
        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn absorb_member_upgrades_regional_flag() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_model(1, false, 4)]])
            .append_exec_results([sea_orm::MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .into_connection();

        let is_rt = ActiveModel::absorb_member(&db, 1, &Vector::new(vec![1.0, 0.0]), Utc::now(), true)
            .await
            .unwrap();

        assert!(is_rt);
    }
}
