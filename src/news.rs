//! Input/output wire envelopes (§6 of SPEC_FULL.md).

use crate::vector::Vector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// The message-queue input envelope. `changed = true` items are dropped by
/// the dispatcher before any clustering work happens.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewsItem {
    pub id: i64,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    #[serde(rename = "pubDate")]
    pub pub_date: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "fullText")]
    #[validate(length(min = 1, message = "fullText must not be empty"))]
    pub full_text: String,
    pub name: String,
    pub link: String,
    pub md5: String,
    #[serde(default)]
    pub enclosure: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub changed: bool,
}

impl NewsItem {
    /// Mirrors the Go `groupmaker.insertVector` fallback: an empty
    /// description borrows the title so region-tagging and embedding input
    /// shaping never operate on an empty string by accident.
    #[must_use]
    pub fn description_or_title(&self) -> &str {
        if self.description.is_empty() {
            &self.title
        } else {
            &self.description
        }
    }
}

/// The enriched output envelope (`EnrichedNews` in §3). `cluster_id` and
/// `embedding` only exist once the Clusterer has made its decision.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedNews {
    pub id: i64,
    pub cluster_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub full_text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub enclosure: String,
    pub embedding: Vec<f64>,
    pub publish_date: DateTime<Utc>,
    pub is_rt: bool,
    pub source_name: String,
    pub url: String,
}

impl EnrichedNews {
    #[must_use]
    pub fn new(item: &NewsItem, cluster_id: i64, embedding: &Vector, is_rt: bool) -> Self {
        Self {
            id: item.id,
            cluster_id,
            title: item.title.clone(),
            description: item.description.clone(),
            full_text: item.full_text.clone(),
            enclosure: item.enclosure.clone(),
            embedding: embedding.as_slice().to_vec(),
            publish_date: item.pub_date,
            is_rt,
            source_name: item.name.clone(),
            url: item.link.clone(),
        }
    }

    /// The message key downstream consumers deduplicate on (§8 property 7).
    #[must_use]
    pub fn message_key<'a>(&self, item: &'a NewsItem) -> &'a str {
        &item.md5
    }
}

/// Strips newlines and HTML tags and collapses whitespace runs, the way the
/// Go `groupmaker.cleanString` step did before handing text to the embedder
/// and the region tagger (§9.7 of SPEC_FULL.md).
#[must_use]
pub fn clean_text(s: &str) -> String {
    let no_tags = strip_html_tags(&s.replace('\n', " "));
    no_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_html_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::clean_text;

    #[test]
    fn clean_text_strips_tags_and_collapses_whitespace() {
        let input = "Hello\n<b>world</b>   foo\n\nbar";
        assert_eq!(clean_text(input), "Hello world foo bar");
    }

    #[test]
    fn clean_text_handles_unterminated_tag() {
        assert_eq!(clean_text("a <div>b"), "a b");
    }
}
