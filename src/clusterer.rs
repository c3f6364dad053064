//! The core decision (§4.5 of SPEC_FULL.md): nearest-centroid lookup,
//! dynamic threshold, assign-or-create. Grounded on the Go
//! `newgroupmaker.Group.MakeNewGroup`/`SaveNews` pair and
//! `CalculateDynamicThresholdLogarithmicish`, translated onto the index-
//! backed `VectorIndexClient` this crate carries.

use crate::clients::VectorIndexClient;
use crate::error::ClusterError;
use crate::models::{clusters, feed, memberships};
use crate::news::NewsItem;
use crate::vector::Vector;
use sea_orm::{DatabaseConnection, TransactionError, TransactionTrait};
use tracing::{error, info, warn};

const MIN_THRESHOLD: f64 = 0.80;
const DECAY_RATE: f64 = 0.10;
const CANDIDATE_COUNT: usize = 15;

/// The outcome of a successful decision: which cluster the item landed in.
#[derive(Debug, Clone, PartialEq)]
pub struct DecideOutcome {
    pub cluster_id: i64,
    pub is_rt: bool,
}

pub struct Clusterer {
    db: DatabaseConnection,
    vector_index: VectorIndexClient,
    /// `initialThreshold` in §4.5's formula — the `DIFF` env var (default
    /// 0.85), so τ(1) tracks the configured value rather than a hardcoded
    /// constant.
    initial_threshold: f64,
}

impl Clusterer {
    #[must_use]
    pub fn new(db: DatabaseConnection, vector_index: VectorIndexClient, initial_threshold: f64) -> Self {
        Self {
            db,
            vector_index,
            initial_threshold,
        }
    }

    /// `τ(n) = minThreshold + (initialThreshold − minThreshold) · exp(−decayRate · (n − 1))`.
    /// Non-increasing in `n`; τ(1) = `initial_threshold`, τ(∞) → `MIN_THRESHOLD`.
    #[must_use]
    pub fn dynamic_threshold(&self, news_count: i64) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n = news_count as f64;
        MIN_THRESHOLD + (self.initial_threshold - MIN_THRESHOLD) * (-DECAY_RATE * (n - 1.0)).exp()
    }

    /// Runs the full §4.5 algorithm: lookup, threshold, assign-or-create,
    /// record membership, mark processed. Does not emit downstream — the
    /// dispatcher does that once this returns `Ok`.
    ///
    /// # Errors
    /// - [`ClusterError::DuplicateSeed`] when this item lost a creation race.
    /// - [`ClusterError::TransientRemote`] on any index/DB I/O failure.
    /// - [`ClusterError::InvariantViolation`] if `v` is a sentinel vector.
    pub async fn decide(
        &self,
        item: &NewsItem,
        v: &Vector,
        regional: bool,
    ) -> Result<DecideOutcome, ClusterError> {
        if v.is_sentinel() {
            return Err(ClusterError::InvariantViolation(
                "sentinel vector reached Clusterer::decide".to_string(),
            ));
        }

        let candidates = self.vector_index.closest(v, CANDIDATE_COUNT).await?;

        let matched = candidates.into_iter().find(|c| {
            let tau = self.dynamic_threshold(c.news_count);
            c.distance >= tau
        });

        let outcome = if let Some(candidate) = matched {
            self.assign_to_existing(item, v, candidate.cluster_id, regional)
                .await?
        } else {
            self.assign_to_new(item, v, regional).await?
        };

        memberships::ActiveModel::record_membership(&self.db, outcome.cluster_id, item.id).await?;
        feed::ActiveModel::mark_member_processed(&self.db, item.id).await?;

        info!(
            item_id = item.id,
            cluster_id = outcome.cluster_id,
            is_rt = outcome.is_rt,
            "item assigned"
        );
        Ok(outcome)
    }

    /// Absorbs `v` into `cluster_id` under a single row-locked transaction
    /// (see [`clusters::ActiveModel::absorb_member`]) so that two items
    /// landing on the same cluster from concurrent `Dispatcher` tasks
    /// serialize instead of racing each other's centroid/count update.
    async fn assign_to_existing(
        &self,
        item: &NewsItem,
        v: &Vector,
        cluster_id: i64,
        regional: bool,
    ) -> Result<DecideOutcome, ClusterError> {
        let v = v.clone();
        let pub_date = item.pub_date;

        let is_rt = self
            .db
            .transaction::<_, bool, sea_orm::DbErr>(move |txn| {
                Box::pin(async move {
                    clusters::ActiveModel::absorb_member(txn, cluster_id, &v, pub_date, regional).await
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) | TransactionError::Transaction(db_err) => {
                    db_err
                }
            })?;

        Ok(DecideOutcome { cluster_id, is_rt })
    }

    async fn assign_to_new(
        &self,
        item: &NewsItem,
        v: &Vector,
        regional: bool,
    ) -> Result<DecideOutcome, ClusterError> {
        let cluster_id =
            clusters::ActiveModel::create_cluster(&self.db, item.pub_date, item.id, regional, v)
                .await?;

        if cluster_id == 0 {
            warn!(item_id = item.id, "duplicate seed, aborting item");
            return Err(ClusterError::DuplicateSeed(item.id));
        }

        if let Err(e) = self
            .vector_index
            .register(
                cluster_id,
                item.pub_date,
                v,
                &item.title,
                &item.full_text,
                item.description_or_title(),
            )
            .await
        {
            error!(
                item_id = item.id,
                cluster_id, "vector index register failed, cluster orphaned but consistent: {e}"
            );
            return Err(e.into());
        }

        Ok(DecideOutcome {
            cluster_id,
            is_rt: regional,
        })
    }
}

/// Convenience: publish-date-free threshold check used by tests and by the
/// in-memory generation's shared curve shape (§4.5's dynamic threshold is
/// the same formula in both generations, only the candidate source differs).
#[must_use]
pub fn static_dynamic_threshold(news_count: i64, initial_threshold: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let n = news_count as f64;
    MIN_THRESHOLD + (initial_threshold - MIN_THRESHOLD) * (-DECAY_RATE * (n - 1.0)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_non_increasing_in_count() {
        let t1 = static_dynamic_threshold(1, 0.85);
        let t2 = static_dynamic_threshold(5, 0.85);
        let t100 = static_dynamic_threshold(100, 0.85);
        assert!(t1 >= t2);
        assert!(t2 >= t100);
    }

    #[test]
    fn threshold_at_one_is_initial_threshold() {
        assert!((static_dynamic_threshold(1, 0.85) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn threshold_converges_to_min_threshold() {
        let t = static_dynamic_threshold(10_000, 0.85);
        assert!((t - MIN_THRESHOLD).abs() < 1e-6);
    }
}
