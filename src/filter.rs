//! Time-range and keyword filtering
//!
//! A record survives when its timestamp lies in the inclusive time range and
//! its layer name contains none of the exclude keywords (case-insensitive).
//! No category is excluded implicitly: HWK and SWIPE records are dropped only
//! when a keyword matches their name or they fall outside the range.

use crate::types::{EventRecord, EventTable, TimeRange};
use serde::{Deserialize, Serialize};

/// Active filter state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Inclusive time window
    pub time_range: TimeRange,
    /// Lowercased, trimmed, non-empty keywords
    exclude_keywords: Vec<String>,
}

impl FilterSpec {
    pub fn new<I, S>(time_range: TimeRange, exclude_keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keywords: Vec<String> = Vec::new();
        for keyword in exclude_keywords {
            let keyword = keyword.as_ref().trim().to_ascii_lowercase();
            if !keyword.is_empty() && !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        Self {
            time_range,
            exclude_keywords: keywords,
        }
    }

    /// Build from the comma-separated text of a filter box, e.g. `"hwk, btn"`
    pub fn from_keyword_text(time_range: TimeRange, text: &str) -> Self {
        Self::new(time_range, parse_keywords(text))
    }

    /// Filter that keeps everything
    pub fn pass_all() -> Self {
        Self::default()
    }

    pub fn exclude_keywords(&self) -> &[String] {
        &self.exclude_keywords
    }

    /// True if the record survives this filter
    pub fn matches(&self, record: &EventRecord) -> bool {
        if !self.time_range.contains(record.time_ms) {
            return false;
        }
        if self.exclude_keywords.is_empty() {
            return true;
        }
        let lowered = record.name.to_ascii_lowercase();
        !self.exclude_keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// True if every record this filter keeps is also kept by `wider`
    pub fn is_narrower_than(&self, wider: &FilterSpec) -> bool {
        wider.time_range.encloses(&self.time_range)
            && wider
                .exclude_keywords
                .iter()
                .all(|k| self.exclude_keywords.contains(k))
    }
}

/// Split comma-separated keyword text into trimmed, non-empty keywords
pub fn parse_keywords(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply `spec` to `table`, returning a derived table with the surviving
/// records in their original order and identities
pub fn apply(table: &EventTable, spec: &FilterSpec) -> EventTable {
    let kept = table
        .iter()
        .filter(|r| spec.matches(r))
        .cloned()
        .collect();
    table.derive(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;
    use pretty_assertions::assert_eq;

    fn sample() -> EventTable {
        EventTable::from_rows(vec![
            (100, 10.0, 10.0, "btn_a"),
            (150, 20.0, 20.0, "swipe_up"),
            (200, 0.0, 0.0, "HWK_boost"),
            (250, 30.0, 30.0, "area_map"),
            (300, 40.0, 40.0, "BTN_b"),
        ])
    }

    fn names(table: &EventTable) -> Vec<&str> {
        table.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse_keywords(" hwk, btn ,,swipe "), vec!["hwk", "btn", "swipe"]);
        assert!(parse_keywords("").is_empty());
        assert!(parse_keywords(" , ,").is_empty());
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let spec = FilterSpec::new(TimeRange::new(150, 250), Vec::<String>::new());
        let filtered = apply(&sample(), &spec);
        assert_eq!(names(&filtered), vec!["swipe_up", "HWK_boost", "area_map"]);
    }

    #[test]
    fn test_keyword_exclusion_case_insensitive() {
        let spec = FilterSpec::from_keyword_text(TimeRange::unbounded(), "btn");
        let filtered = apply(&sample(), &spec);
        assert_eq!(names(&filtered), vec!["swipe_up", "HWK_boost", "area_map"]);
    }

    #[test]
    fn test_hwk_keyword_removes_hwk_records() {
        let table = EventTable::from_rows(vec![(1, 0.0, 0.0, "HWK_boost"), (2, 0.0, 0.0, "btn_a")]);
        let spec = FilterSpec::from_keyword_text(TimeRange::unbounded(), "hwk");
        let filtered = apply(&table, &spec);
        assert_eq!(names(&filtered), vec!["btn_a"]);
    }

    #[test]
    fn test_hwk_and_swipe_kept_without_keyword() {
        let spec = FilterSpec::from_keyword_text(TimeRange::unbounded(), "area");
        let filtered = apply(&sample(), &spec);
        assert!(names(&filtered).contains(&"HWK_boost"));
        assert!(names(&filtered).contains(&"swipe_up"));
    }

    #[test]
    fn test_empty_keywords_is_noop() {
        let table = sample();
        let filtered = apply(&table, &FilterSpec::pass_all());
        assert_eq!(filtered, table);
        assert_eq!(filtered.origin_id(), table.table_id());
    }

    #[test]
    fn test_identities_preserved() {
        let spec = FilterSpec::from_keyword_text(TimeRange::unbounded(), "swipe");
        let filtered = apply(&sample(), &spec);
        let ids: Vec<RecordId> = filtered.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId(0), RecordId(2), RecordId(3), RecordId(4)]);
    }

    #[test]
    fn test_idempotent() {
        let table = sample();
        let spec = FilterSpec::from_keyword_text(TimeRange::new(120, 280), "hwk, map");
        let once = apply(&table, &spec);
        let twice = apply(&once, &spec);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_monotonic() {
        let table = sample();
        let wide = FilterSpec::from_keyword_text(TimeRange::new(0, 1000), "");
        let narrower_range = FilterSpec::from_keyword_text(TimeRange::new(120, 280), "");
        let more_keywords = FilterSpec::from_keyword_text(TimeRange::new(0, 1000), "btn, hwk");

        let base = apply(&table, &wide).len();
        assert!(apply(&table, &narrower_range).len() <= base);
        assert!(apply(&table, &more_keywords).len() <= base);
        assert!(narrower_range.is_narrower_than(&wide));
        assert!(more_keywords.is_narrower_than(&wide));
        assert!(!wide.is_narrower_than(&more_keywords));
    }

    #[test]
    fn test_duplicate_keywords_collapse() {
        let spec = FilterSpec::from_keyword_text(TimeRange::unbounded(), "HWK, hwk , Hwk");
        assert_eq!(spec.exclude_keywords(), &["hwk".to_string()]);
    }

    #[test]
    fn test_inverted_range_matches_nothing() {
        let spec = FilterSpec::new(TimeRange::new(300, 100), Vec::<String>::new());
        assert!(apply(&sample(), &spec).is_empty());
    }
}
