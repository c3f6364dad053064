use loco_rs::app::AppContext;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

/// `config/<env>.yaml`'s `settings:` block, as deserialized by
/// `loco_rs`. Everything here comes straight from YAML; the knobs that have
/// an environment-variable override contract (§6 of SPEC_FULL.md) are layered
/// on top in [`Settings::from_context`], the same two-stage pattern the
/// original agregator service used (process env wins, falls back to a
/// compiled-in default on any parse failure or out-of-range value).
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
struct RawSettings {
    cluster_time_life_secs: Option<u64>,
    region_words_refresh_secs: Option<u64>,
    embedding_timeout_secs: Option<u64>,
    worker_concurrency: Option<usize>,
    vector_index_url: String,
    embedding_url: String,
    embedding_model_uri: String,
    embedding_token: String,
    embedding_folder_id: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// `minThreshold`/`minDiff` — `DIFF` env var, percent, default 85.
    pub min_diff: f64,
    /// `ALPHA` env var, percent, default 20. Carried from the original
    /// in-memory generation; unused by the index-backed decision path but
    /// threaded through for parity with `ACCEPT_OLD_GROUPS`-style tuning.
    pub alpha: f64,
    /// `DISTANCE` env var, percent, default 20.
    pub max_distance: f64,
    /// `MAX_REQUESTS` env var — embedding rate-limit permits and, absent a
    /// more specific pool setting, the DB connection pool size. Default 10.
    pub max_requests: usize,
    /// Dispatcher worker-semaphore capacity W, default 30.
    pub worker_concurrency: usize,
    /// Only consulted by the in-memory generation.
    pub accept_old_groups: bool,
    /// Only consulted by the in-memory generation.
    pub no_delete_old_groups: bool,
    pub cluster_time_life: Duration,
    pub region_words_refresh: Duration,
    pub embedding_timeout: Duration,
    pub vector_index_url: String,
    pub embedding_url: String,
    /// `modelUri` in the embedding request body (§6). Deployment-specific,
    /// e.g. the Yandex Foundation Models `emb://...` URI.
    pub embedding_model_uri: String,
    pub embedding_token: String,
    pub embedding_folder_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_diff: 0.85,
            alpha: 0.20,
            max_distance: 0.20,
            max_requests: 10,
            worker_concurrency: 30,
            accept_old_groups: false,
            no_delete_old_groups: false,
            cluster_time_life: Duration::from_secs(3600),
            region_words_refresh: Duration::from_secs(600),
            embedding_timeout: Duration::from_secs(60),
            vector_index_url: String::new(),
            embedding_url: String::new(),
            embedding_model_uri: String::new(),
            embedding_token: String::new(),
            embedding_folder_id: String::new(),
        }
    }
}

/// Parses an integer env var in `0..=100` into a `0.0..=1.0` fraction,
/// falling back to `default_percent/100.0` (logged once) when the variable is
/// absent, unparsable, or out of range — exactly the `cmd/groupmaker/main.go`
/// fallback behavior.
fn percent_env(name: &str, default_percent: i64) -> f64 {
    let value = env::var(name).ok().and_then(|s| s.parse::<i64>().ok());
    let percent = match value {
        Some(v) if (0..=100).contains(&v) => v,
        Some(v) => {
            warn!(
                "{name}={v} is out of range 0..100, using default {default_percent}"
            );
            default_percent
        }
        None => default_percent,
    };
    #[allow(clippy::cast_precision_loss)]
    let fraction = percent as f64 / 100.0;
    fraction
}

fn usize_env(name: &str, default: usize) -> usize {
    match env::var(name).ok().and_then(|s| s.parse::<usize>().ok()) {
        Some(v) => v,
        None => {
            warn!("{name} missing or invalid, using default {default}");
            default
        }
    }
}

fn bool_env(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|s| s.to_lowercase() == "true")
        .unwrap_or(default)
}

impl Settings {
    /// Get a settings object from app context
    ///
    /// # Panics
    ///
    /// When the settings field can't be found in config, or when it can't be
    /// deserialized to the expected format.
    #[allow(clippy::must_use_candidate)]
    pub fn from_context(ctx: &AppContext) -> Self {
        let settings_value = ctx
            .config
            .settings
            .clone()
            .expect("No settings found in config.");
        let raw: RawSettings =
            serde_json::from_value(settings_value).expect("Error deserializing settings.");
        Self::merge(raw)
    }

    fn merge(raw: RawSettings) -> Self {
        let defaults = Self::default();
        Self {
            min_diff: percent_env("DIFF", 85),
            alpha: percent_env("ALPHA", 20),
            max_distance: percent_env("DISTANCE", 20),
            max_requests: usize_env("MAX_REQUESTS", defaults.max_requests),
            worker_concurrency: raw.worker_concurrency.unwrap_or(defaults.worker_concurrency),
            accept_old_groups: bool_env("ACCEPT_OLD_GROUPS", defaults.accept_old_groups),
            no_delete_old_groups: bool_env("NO_DELETE_OLD_GROUPS", defaults.no_delete_old_groups),
            cluster_time_life: raw
                .cluster_time_life_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.cluster_time_life),
            region_words_refresh: raw
                .region_words_refresh_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.region_words_refresh),
            embedding_timeout: raw
                .embedding_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.embedding_timeout),
            vector_index_url: raw.vector_index_url,
            embedding_url: raw.embedding_url,
            embedding_model_uri: raw.embedding_model_uri,
            embedding_token: raw.embedding_token,
            embedding_folder_id: raw.embedding_folder_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn percent_env_falls_back_on_out_of_range() {
        env::set_var("DIFF", "150");
        assert_eq!(percent_env("DIFF", 85), 0.85);
        env::remove_var("DIFF");
    }

    #[test]
    #[serial]
    fn percent_env_falls_back_on_missing() {
        env::remove_var("DIFF");
        assert_eq!(percent_env("DIFF", 85), 0.85);
    }

    #[test]
    #[serial]
    fn percent_env_parses_in_range_value() {
        env::set_var("ALPHA", "20");
        assert_eq!(percent_env("ALPHA", 99), 0.20);
        env::remove_var("ALPHA");
    }
}
