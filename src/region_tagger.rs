//! `RegionTagger` (§4.6 of SPEC_FULL.md): "does this item's text belong to a
//! marked region?" Word set refreshed on a ticker from `ClusterStore`,
//! snapshot readers take a pointer copy rather than holding the lock across
//! the check.

use crate::news::NewsItem;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_RATIO: f64 = 0.2;

/// Immutable snapshot of the region word set; cheap to clone (`Arc`).
pub type RegionWordSet = Arc<HashSet<String>>;

pub struct RegionTagger {
    words: RwLock<RegionWordSet>,
    ratio: f64,
}

impl RegionTagger {
    #[must_use]
    pub fn new(initial: HashSet<String>) -> Self {
        Self::with_ratio(initial, DEFAULT_RATIO)
    }

    #[must_use]
    pub fn with_ratio(initial: HashSet<String>, ratio: f64) -> Self {
        let ratio = if (0.0..=1.0).contains(&ratio) {
            ratio
        } else {
            warn!("region tagger ratio {ratio} out of [0,1], using default {DEFAULT_RATIO}");
            DEFAULT_RATIO
        };
        Self {
            words: RwLock::new(Arc::new(initial)),
            ratio,
        }
    }

    /// Swaps in a freshly-fetched word set. The lock is held only for the
    /// pointer swap (§4.6, §5).
    pub fn refresh(&self, fresh: HashSet<String>) {
        let mut guard = self.words.write().expect("region word lock poisoned");
        *guard = Arc::new(fresh);
    }

    fn snapshot(&self) -> RegionWordSet {
        Arc::clone(&self.words.read().expect("region word lock poisoned"))
    }

    /// Builds the check text: `title ⊕ " " ⊕ description ⊕ " " ⊕` the first
    /// `ceil(ratio * len(fullText))` runes of `fullText` (at least one rune
    /// when `fullText` is non-empty), lowercased.
    #[must_use]
    pub fn check_text(&self, item: &NewsItem) -> String {
        let full_text_runes: Vec<char> = item.full_text.chars().collect();
        #[allow(clippy::cast_precision_loss)]
        let wanted = (self.ratio * full_text_runes.len() as f64).ceil() as usize;
        let wanted = if full_text_runes.is_empty() {
            0
        } else {
            wanted.max(1).min(full_text_runes.len())
        };
        let prefix: String = full_text_runes[..wanted].iter().collect();

        format!(
            "{} {} {}",
            item.title,
            item.description_or_title(),
            prefix
        )
        .to_lowercase()
    }

    /// `true` iff any word in the current snapshot matches `item`'s check
    /// text under the §4.6 boundary rules.
    #[must_use]
    pub fn matches(&self, item: &NewsItem) -> bool {
        let words = self.snapshot();
        if words.is_empty() {
            return false;
        }
        let text = self.check_text(item);
        let matched = words.iter().any(|w| word_matches(&text, w));
        if matched {
            debug!(item_id = item.id, "region word matched");
        }
        matched
    }

    /// Spawns the ticker task that periodically pulls a fresh word set via
    /// `fetch` and calls [`Self::refresh`]. Returns the `JoinHandle` so
    /// callers can abort it on shutdown.
    pub fn spawn_refresh_loop<F, Fut>(
        self: &Arc<Self>,
        interval: Duration,
        fetch: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<HashSet<String>, crate::error::ClusterStoreError>>
            + Send,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match fetch().await {
                    Ok(words) => this.refresh(words),
                    Err(e) => warn!("region word refresh failed: {e}"),
                }
            }
        })
    }
}

fn word_matches(text: &str, word: &str) -> bool {
    text.starts_with(word)
        || text.ends_with(word)
        || text.ends_with(&format!("{word}."))
        || text.contains(&format!(" {word}"))
        || text.contains(&format!(">{word}"))
        || text.contains(&format!("&nbsp;{word}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(title: &str, description: &str, full_text: &str) -> NewsItem {
        NewsItem {
            id: 1,
            title: title.to_string(),
            pub_date: Utc::now(),
            description: description.to_string(),
            full_text: full_text.to_string(),
            name: "src".to_string(),
            link: "http://example.com".to_string(),
            md5: "abc".to_string(),
            enclosure: String::new(),
            category: String::new(),
            changed: false,
        }
    }

    fn tagger(words: &[&str]) -> RegionTagger {
        RegionTagger::new(words.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn matches_on_prefix() {
        let t = tagger(&["kazan"]);
        let i = item("Kazan hosts summit", "", "");
        assert!(t.matches(&i));
    }

    #[test]
    fn matches_on_suffix_with_period() {
        let t = tagger(&["kazan"]);
        let i = item("The summit is in kazan.", "", "");
        assert!(t.matches(&i));
    }

    #[test]
    fn matches_on_space_boundary() {
        let t = tagger(&["kazan"]);
        let i = item("A summit in kazan today", "", "");
        assert!(t.matches(&i));
    }

    #[test]
    fn no_match_on_substring_without_boundary() {
        let t = tagger(&["azan"]);
        let i = item("Kazan summit", "", "");
        assert!(!t.matches(&i));
    }

    #[test]
    fn empty_wordset_never_matches() {
        let t = tagger(&[]);
        let i = item("Kazan summit", "", "");
        assert!(!t.matches(&i));
    }

    #[test]
    fn refresh_swaps_snapshot() {
        let t = tagger(&["kazan"]);
        let i = item("moscow report", "", "");
        assert!(!t.matches(&i));
        t.refresh(["moscow".to_string()].into_iter().collect());
        assert!(t.matches(&i));
    }

    #[test]
    fn check_text_includes_ratio_prefix_of_full_text() {
        let t = RegionTagger::with_ratio(HashSet::new(), 0.5);
        let i = item("T", "D", "abcdefgh");
        let text = t.check_text(&i);
        assert!(text.ends_with("abcd"));
    }

    #[test]
    fn check_text_includes_at_least_one_rune_when_full_text_nonempty() {
        let t = RegionTagger::with_ratio(HashSet::new(), 0.0);
        let i = item("T", "D", "x");
        let text = t.check_text(&i);
        assert!(text.ends_with('x'));
    }

    #[test]
    fn out_of_range_ratio_falls_back_to_default() {
        let t = RegionTagger::with_ratio(HashSet::new(), 1.5);
        assert!((t.ratio - DEFAULT_RATIO).abs() < f64::EPSILON);
    }
}
