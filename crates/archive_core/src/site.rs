use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One document flattened for the client-side search corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub id: String,
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub plain_text_content: String,
    pub image: String,
    pub created_timestamp: Option<i64>,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Site-wide outputs gathered while documents are processed one by one.
///
/// Each document call takes the accumulator by value and hands it back, so
/// there is no shared builder outliving a publish pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteAccumulator {
    sitemap: Vec<String>,
    sitemap_seen: HashSet<String>,
    search: Vec<SearchEntry>,
}

impl SiteAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, page_url: impl Into<String>, entry: SearchEntry) -> Self {
        let page_url = page_url.into();
        if self.sitemap_seen.insert(page_url.clone()) {
            self.sitemap.push(page_url);
        }
        self.search.push(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.search.len()
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_empty()
    }

    pub fn sitemap(&self) -> &[String] {
        &self.sitemap
    }

    pub fn search_entries(&self) -> &[SearchEntry] {
        &self.search
    }

    /// Plain-text sitemap: one URL per line.
    pub fn render_sitemap(&self) -> String {
        let mut out = String::new();
        for url in &self.sitemap {
            out.push_str(url);
            out.push('\n');
        }
        out
    }
}
