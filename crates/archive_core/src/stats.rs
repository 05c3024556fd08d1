use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;

use crate::document::first_timestamp;
use crate::path::ContentType;

/// Plain-text characters and item count for one year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearTotal {
    pub characters: u64,
    pub items: u64,
}

/// Per-year totals for one content type, ordered by year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearlyTotals {
    by_year: BTreeMap<i32, YearTotal>,
}

impl YearlyTotals {
    pub fn add(&mut self, year: i32, characters: u64) {
        let total = self.by_year.entry(year).or_default();
        total.characters += characters;
        total.items += 1;
    }

    pub fn get(&self, year: i32) -> Option<YearTotal> {
        self.by_year.get(&year).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, YearTotal)> + '_ {
        self.by_year.iter().map(|(year, total)| (*year, *total))
    }

    pub fn total(&self) -> YearTotal {
        self.by_year.values().fold(YearTotal::default(), |acc, year| YearTotal {
            characters: acc.characters + year.characters,
            items: acc.items + year.items,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.by_year.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub answers: YearlyTotals,
    pub articles: YearlyTotals,
}

impl ArchiveStats {
    pub fn totals(&self, content_type: ContentType) -> &YearlyTotals {
        match content_type {
            ContentType::Answer => &self.answers,
            ContentType::Article => &self.articles,
        }
    }

    pub fn totals_mut(&mut self, content_type: ContentType) -> &mut YearlyTotals {
        match content_type {
            ContentType::Answer => &mut self.answers,
            ContentType::Article => &mut self.articles,
        }
    }
}

/// Fields consulted, in order, for the year an item belongs to.
pub fn year_fields(content_type: ContentType) -> &'static [&'static str] {
    match content_type {
        ContentType::Answer => &["created_time", "created", "updated_time", "updated"],
        ContentType::Article => &["created", "updated"],
    }
}

/// UTC year of the first usable timestamp field.
pub fn record_year(content_type: ContentType, payload: &Value) -> Option<i32> {
    let secs = first_timestamp(payload, year_fields(content_type))?;
    DateTime::<Utc>::from_timestamp(secs, 0).map(|at| at.year())
}

/// Characters of `text` that are not whitespace.
pub fn count_characters(text: &str) -> u64 {
    text.chars().filter(|c| !c.is_whitespace()).count() as u64
}

fn label(content_type: ContentType) -> (&'static str, &'static str) {
    match content_type {
        ContentType::Answer => ("回答", "条"),
        ContentType::Article => ("文章", "篇"),
    }
}

/// Text report with one line per year and a closing total for each type.
pub fn render_report(stats: &ArchiveStats, content_types: &[ContentType]) -> String {
    let mut out = String::new();
    for &content_type in content_types {
        let (name, unit) = label(content_type);
        let totals = stats.totals(content_type);
        if totals.is_empty() {
            let _ = writeln!(out, "{name}: 无数据");
            continue;
        }
        let _ = writeln!(out, "{name}:");
        for (year, total) in totals.iter() {
            let _ = writeln!(
                out,
                "  {year}: {} 字 / {} {unit}",
                group_thousands(total.characters),
                total.items
            );
        }
        let sum = totals.total();
        let _ = writeln!(
            out,
            "  合计: {} 字 / {} {unit}",
            group_thousands(sum.characters),
            sum.items
        );
    }
    out
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
