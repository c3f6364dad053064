//! The alternative in-memory generation (§4.5 "Alternative in-memory
//! generation" of SPEC_FULL.md): clusters held in-process, no `VectorIndex`
//! round-trip, TTL eviction. Grounded on the Go `service/group.Group` /
//! `internal/service/groupmaker.GroupMaker` pair.
//!
//! This generation is not the forward path (see DESIGN.md) — it exists for
//! deployments that accept a single-process, restart-loses-state clustering
//! core in exchange for skipping the vector-index round-trip.

use crate::news::NewsItem;
use crate::vector::Vector;
use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// An in-process cluster. Unlike the durable `clusters` row, this has no
/// `VectorIndex` counterpart and is rebuilt from `ClusterStore` on startup.
#[derive(Debug, Clone)]
pub struct InMemoryCluster {
    pub id: i64,
    pub seed_item_id: i64,
    pub centroid: Vector,
    pub member_count: usize,
    pub last_activity: DateTime<Utc>,
    pub is_rt: bool,
}

impl InMemoryCluster {
    #[must_use]
    pub fn new(id: i64, seed_item_id: i64, centroid: Vector, created_at: DateTime<Utc>, is_rt: bool) -> Self {
        Self {
            id,
            seed_item_id,
            centroid,
            member_count: 1,
            last_activity: created_at,
            is_rt,
        }
    }

    /// `τ_small(size) = max(minDiff + 0.02·(3−size), 0.75)` when `size<3`,
    /// else `max(minDiff + 0.03·log10(size), 0.95)`.
    #[must_use]
    pub fn small_threshold(size: usize, min_diff: f64) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let size_f = size as f64;
        if size < 3 {
            (min_diff + 0.02 * (3.0 - size_f)).max(0.75)
        } else {
            (min_diff + 0.03 * size_f.log10()).max(0.95)
        }
    }

    #[must_use]
    pub fn matches(&self, v: &Vector, min_diff: f64) -> bool {
        let tau = Self::small_threshold(self.member_count, min_diff);
        self.centroid.cosine_similarity(v) >= tau
    }

    /// Absorbs `v` into the running-mean centroid. Only called for the
    /// second and later members — the seed member's vector becomes the
    /// initial centroid directly in [`Self::new`].
    fn absorb(&mut self, v: &Vector, activity: DateTime<Utc>, regional: bool) {
        self.centroid
            .absorb_into_mean(v, u64::try_from(self.member_count + 1).unwrap_or(u64::MAX));
        self.member_count += 1;
        if activity > self.last_activity {
            self.last_activity = activity;
        }
        if regional {
            self.is_rt = true;
        }
    }
}

/// In-process cluster set with TTL eviction (§4.5, §9.7). All mutation goes
/// through a single `RwLock` — the lock is held for the duration of a
/// lookup-then-mutate pass since, unlike `RegionTagger`'s read-mostly
/// snapshot, this generation mutates on nearly every call.
pub struct InMemoryClusterer {
    clusters: RwLock<Vec<InMemoryCluster>>,
    min_diff: f64,
}

impl InMemoryClusterer {
    #[must_use]
    pub fn new(initial: Vec<InMemoryCluster>, min_diff: f64) -> Self {
        Self {
            clusters: RwLock::new(initial),
            min_diff,
        }
    }

    /// Linear scan in insertion order, first match wins — mirrors the Go
    /// `insertVector` loop over `g.groups`.
    ///
    /// Returns `Some(cluster_id)` on a match (after absorbing `v` into that
    /// cluster's centroid), or `None` when the caller must create a new
    /// cluster.
    pub fn decide(&self, item: &NewsItem, v: &Vector, regional: bool) -> Option<i64> {
        let mut guard = self.clusters.write().expect("in-memory cluster lock poisoned");
        for cluster in guard.iter_mut() {
            if cluster.matches(v, self.min_diff) {
                cluster.absorb(v, item.pub_date, regional);
                return Some(cluster.id);
            }
        }
        None
    }

    pub fn insert_new(&self, cluster: InMemoryCluster) {
        self.clusters
            .write()
            .expect("in-memory cluster lock poisoned")
            .push(cluster);
    }

    /// Drops clusters whose `last_activity` is older than `time_life`.
    /// Durable rows are untouched — this only shrinks the in-process set.
    pub fn evict_expired(&self, now: DateTime<Utc>, time_life: chrono::Duration) {
        let mut guard = self.clusters.write().expect("in-memory cluster lock poisoned");
        guard.retain(|c| now.signed_duration_since(c.last_activity) <= time_life);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.read().expect("in-memory cluster lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, pub_date: DateTime<Utc>) -> NewsItem {
        NewsItem {
            id,
            title: "T".to_string(),
            pub_date,
            description: "D".to_string(),
            full_text: "F".to_string(),
            name: "src".to_string(),
            link: "http://example.com".to_string(),
            md5: format!("md5-{id}"),
            enclosure: String::new(),
            category: String::new(),
            changed: false,
        }
    }

    #[test]
    fn small_threshold_below_three_uses_linear_adjustment() {
        let t = InMemoryCluster::small_threshold(1, 0.85);
        assert!((t - 0.89).abs() < 1e-9);
    }

    #[test]
    fn small_threshold_has_floor_below_three() {
        let t = InMemoryCluster::small_threshold(3, 0.0);
        assert!((t - 0.95).abs() < 1e-9);
    }

    #[test]
    fn decide_matches_near_identical_vector() {
        let now = Utc::now();
        let seed = Vector::new(vec![1.0, 0.0, 0.0]);
        let clusterer = InMemoryClusterer::new(
            vec![InMemoryCluster::new(1, 10, seed, now, false)],
            0.85,
        );
        let near = Vector::new(vec![0.999, 0.001, 0.0]);
        let outcome = clusterer.decide(&item(11, now), &near, false);
        assert_eq!(outcome, Some(1));
    }

    #[test]
    fn decide_returns_none_for_orthogonal_vector() {
        let now = Utc::now();
        let seed = Vector::new(vec![1.0, 0.0, 0.0]);
        let clusterer = InMemoryClusterer::new(
            vec![InMemoryCluster::new(1, 10, seed, now, false)],
            0.85,
        );
        let orthogonal = Vector::new(vec![0.0, 1.0, 0.0]);
        let outcome = clusterer.decide(&item(12, now), &orthogonal, false);
        assert_eq!(outcome, None);
    }

    #[test]
    fn eviction_drops_only_stale_clusters() {
        let now = Utc::now();
        let stale = now - chrono::Duration::hours(2);
        let fresh = now;
        let clusterer = InMemoryClusterer::new(
            vec![
                InMemoryCluster::new(1, 10, Vector::new(vec![1.0]), stale, false),
                InMemoryCluster::new(2, 11, Vector::new(vec![1.0]), fresh, false),
            ],
            0.85,
        );
        clusterer.evict_expired(now, chrono::Duration::hours(1));
        assert_eq!(clusterer.len(), 1);
    }

    #[test]
    fn regional_flag_is_monotone_across_absorb() {
        let now = Utc::now();
        let clusterer = InMemoryClusterer::new(
            vec![InMemoryCluster::new(1, 10, Vector::new(vec![1.0, 0.0]), now, false)],
            0.5,
        );
        let near = Vector::new(vec![0.99, 0.01]);
        clusterer.decide(&item(13, now), &near, true);
        let snapshot = clusterer.clusters.read().unwrap();
        assert!(snapshot[0].is_rt);
    }
}
