//! Pipeline orchestration
//!
//! This module provides the public API for the touch analyzer.
//! It wires the stages together: load → reconstruct flicks on the reference
//! table → filter → aggregate.
//!
//! Two entry points are offered. The stateless functions ([`analyze`],
//! [`analyze_files`]) run the whole pipeline once. [`AnalysisSession`] keeps
//! the reference table between filter edits and re-runs flick reconstruction
//! only when the reference table itself changes.

use crate::aggregator::{Aggregator, Stats};
use crate::cache::{CacheStats, LruCache, ResultCache};
use crate::classifier;
use crate::config::Config;
use crate::error::AnalyzerError;
use crate::filter::{self, FilterSpec};
use crate::flick::FlickIndex;
use crate::spatial::{self, FlowPath, HeatmapGrid, TimelineMarker};
use crate::store::{layout, Loader, LoadReport, SkippedFile};
use crate::types::{Classification, EventTable, FlickUnit, RecordId};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cache of combined tables keyed by the sorted file selection
pub type TableCache = Box<dyn ResultCache<Vec<PathBuf>, Arc<EventTable>>>;

/// Category, subtype and display group of a layer name
pub fn classify(name: &str) -> Classification {
    classifier::classify_full(name)
}

/// Reconstruct the flick units of an unfiltered reference table
pub fn reconstruct_flicks(reference: &EventTable) -> FlickIndex {
    FlickIndex::reconstruct(reference)
}

/// Apply a time range and exclude keywords to a table
pub fn filter(table: &EventTable, spec: &FilterSpec) -> EventTable {
    filter::apply(table, spec)
}

/// Aggregate a filtered table with the flick index of its reference table
pub fn aggregate(filtered: &EventTable, flicks: &FlickIndex) -> Stats {
    Aggregator::aggregate(filtered, flicks)
}

/// A filtered table together with its flick metadata and statistics
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisView {
    #[serde(skip)]
    reference: Arc<EventTable>,
    #[serde(skip)]
    filtered: EventTable,
    #[serde(skip)]
    flicks: Arc<FlickIndex>,
    pub spec: FilterSpec,
    pub stats: Stats,
    /// Filter generation this view was computed for
    pub generation: u64,
}

impl AnalysisView {
    fn build(reference: Arc<EventTable>, flicks: Arc<FlickIndex>, spec: FilterSpec, generation: u64) -> Self {
        let filtered = filter::apply(&reference, &spec);
        let stats = Aggregator::aggregate(&filtered, &flicks);
        Self {
            reference,
            filtered,
            flicks,
            spec,
            stats,
            generation,
        }
    }

    pub fn reference(&self) -> &EventTable {
        &self.reference
    }

    pub fn filtered(&self) -> &EventTable {
        &self.filtered
    }

    pub fn flicks(&self) -> &FlickIndex {
        &self.flicks
    }

    /// Flick units whose swipe terminal survived the filter
    pub fn flick_units(&self) -> Vec<&FlickUnit> {
        self.flicks.valid_units(&self.filtered).collect()
    }

    /// Identities that must not be counted as standalone touches
    pub fn excluded_start_identities(&self) -> &HashSet<RecordId> {
        self.flicks.start_identities()
    }

    pub fn heatmap(&self, config: &Config) -> HeatmapGrid {
        spatial::heatmap(&self.filtered, &self.flicks, config)
    }

    pub fn flow_path(&self) -> FlowPath {
        spatial::flow_path(&self.filtered, &self.flicks)
    }

    /// HWK and SWIPE markers of the unfiltered reference table
    pub fn timeline_markers(&self) -> Vec<TimelineMarker> {
        spatial::timeline_markers(&self.reference)
    }
}

/// Result of running the pipeline on a selection
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// Files were selected but none could be read
    Unreadable {
        reason: String,
        skipped: Vec<SkippedFile>,
    },
    /// The selection holds no rows
    NoData,
    /// The reference table has rows but the filter kept none
    NoMatches { reference_rows: usize },
    Ready(Box<AnalysisView>),
}

impl AnalysisOutcome {
    pub fn view(&self) -> Option<&AnalysisView> {
        match self {
            AnalysisOutcome::Ready(view) => Some(view),
            _ => None,
        }
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.view().map(|v| &v.stats)
    }

    /// Short machine-readable state name
    pub fn state(&self) -> &'static str {
        match self {
            AnalysisOutcome::Unreadable { .. } => "unreadable",
            AnalysisOutcome::NoData => "no_data",
            AnalysisOutcome::NoMatches { .. } => "no_matches",
            AnalysisOutcome::Ready(_) => "ready",
        }
    }
}

/// Run the pipeline once on an in-memory reference table
pub fn analyze(reference: EventTable, spec: &FilterSpec) -> AnalysisOutcome {
    if reference.is_empty() {
        return AnalysisOutcome::NoData;
    }
    let reference = Arc::new(reference);
    let flicks = Arc::new(FlickIndex::reconstruct(&reference));
    outcome_for(reference, flicks, spec.clone(), 0)
}

/// Load `paths` and run the pipeline once
pub fn analyze_files<P: AsRef<Path>>(paths: &[P], spec: &FilterSpec, config: &Config) -> AnalysisOutcome {
    let mut session = AnalysisSession::new(config.clone());
    session.load_files(paths);
    session.apply(spec)
}

fn outcome_for(
    reference: Arc<EventTable>,
    flicks: Arc<FlickIndex>,
    spec: FilterSpec,
    generation: u64,
) -> AnalysisOutcome {
    let reference_rows = reference.len();
    let view = AnalysisView::build(reference, flicks, spec, generation);
    if view.filtered.is_empty() {
        debug!("Filter matched none of {} rows", reference_rows);
        AnalysisOutcome::NoMatches { reference_rows }
    } else {
        AnalysisOutcome::Ready(Box::new(view))
    }
}

/// What the session currently holds
#[derive(Debug, Clone)]
enum Selection {
    Empty,
    Unreadable {
        reason: String,
        skipped: Vec<SkippedFile>,
    },
    Loaded(Arc<EventTable>),
}

/// Summary of the last load
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub files: Vec<LoadReport>,
    pub skipped: Vec<SkippedFile>,
    pub duplicates_removed: usize,
    pub rows: usize,
    pub from_cache: bool,
}

/// Stateful analysis over one reference table at a time.
///
/// Flick reconstruction is memoized by the reference table's identity, so
/// repeated filter edits only re-run filtering and aggregation.
pub struct AnalysisSession {
    config: Config,
    loader: Loader,
    selection: Selection,
    flicks: Option<Arc<FlickIndex>>,
    reconstructions: usize,
    generation: u64,
    last_load: LoadSummary,
    cache: Option<TableCache>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl AnalysisSession {
    pub fn new(config: Config) -> Self {
        Self {
            loader: Loader::from_config(&config),
            config,
            selection: Selection::Empty,
            flicks: None,
            reconstructions: 0,
            generation: 0,
            last_load: LoadSummary::default(),
            cache: None,
        }
    }

    /// Cache combined tables in `cache`
    pub fn with_cache(mut self, cache: TableCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Cache combined tables in an LRU sized by the session config
    pub fn with_default_cache(self) -> Self {
        let cache = LruCache::from_config(&self.config.cache);
        self.with_cache(Box::new(cache))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current reference table, if one is loaded
    pub fn reference(&self) -> Option<&Arc<EventTable>> {
        match &self.selection {
            Selection::Loaded(table) => Some(table),
            _ => None,
        }
    }

    pub fn last_load(&self) -> &LoadSummary {
        &self.last_load
    }

    /// How many times flick reconstruction has run
    pub fn reconstruction_count(&self) -> usize {
        self.reconstructions
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    /// Replace the reference table
    pub fn set_table(&mut self, table: EventTable) {
        self.set_reference(Arc::new(table));
    }

    fn set_reference(&mut self, table: Arc<EventTable>) {
        let same = self
            .reference()
            .map(|current| current.table_id() == table.table_id())
            .unwrap_or(false);
        if !same {
            self.flicks = None;
        }
        self.last_load.rows = table.len();
        self.selection = if table.is_empty() {
            Selection::Empty
        } else {
            Selection::Loaded(table)
        };
    }

    /// Drop the current selection
    pub fn clear(&mut self) {
        self.selection = Selection::Empty;
        self.flicks = None;
        self.last_load = LoadSummary::default();
    }

    /// Load and combine `paths` as the new reference table
    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> &LoadSummary {
        let key = cache_key(paths);
        if key.is_empty() {
            self.clear();
            return &self.last_load;
        }

        if let Some(table) = self.cache.as_mut().and_then(|c| c.get(&key)) {
            debug!("Using cached table for {} file(s)", key.len());
            self.last_load = LoadSummary {
                rows: table.len(),
                from_cache: true,
                ..LoadSummary::default()
            };
            self.set_reference(table);
            return &self.last_load;
        }

        let combined = self.loader.load_and_combine_detailed(paths);
        self.last_load = LoadSummary {
            files: combined.loaded,
            skipped: combined.skipped,
            duplicates_removed: combined.duplicates_removed,
            rows: 0,
            from_cache: false,
        };

        match combined.table {
            Some(table) => {
                let table = Arc::new(table);
                if let Some(cache) = self.cache.as_mut() {
                    cache.put(key, Arc::clone(&table), None);
                }
                self.set_reference(table);
            }
            None => {
                self.flicks = None;
                let skipped = self.last_load.skipped.clone();
                let all_empty = skipped.iter().all(|s| s.code == "EMPTY_FILE");
                self.selection = if all_empty {
                    Selection::Empty
                } else {
                    warn!("None of the {} selected file(s) could be read", key.len());
                    Selection::Unreadable {
                        reason: unreadable_reason(&skipped),
                        skipped,
                    }
                };
            }
        }
        &self.last_load
    }

    /// Load the `task`-th file (1-based) of each user under the configured data directory
    pub fn load_task<S: AsRef<str>>(&mut self, task: usize, users: &[S]) -> Result<&LoadSummary, AnalyzerError> {
        let paths = layout::task_files_for_users(&self.config.data_dir, task, users)?;
        info!("Task {} selects {} file(s)", task, paths.len());
        Ok(self.load_files(&paths))
    }

    /// Flick index of the current reference table, reconstructing it only
    /// when the table changed
    pub fn flick_index(&mut self) -> Option<Arc<FlickIndex>> {
        let reference = match &self.selection {
            Selection::Loaded(table) => Arc::clone(table),
            _ => return None,
        };
        if let Some(flicks) = &self.flicks {
            if flicks.applies_to(&reference) {
                return Some(Arc::clone(flicks));
            }
        }
        let flicks = Arc::new(FlickIndex::reconstruct(&reference));
        self.reconstructions += 1;
        self.flicks = Some(Arc::clone(&flicks));
        Some(flicks)
    }

    /// Apply a filter to the current selection
    pub fn apply(&mut self, spec: &FilterSpec) -> AnalysisOutcome {
        self.generation += 1;
        let generation = self.generation;

        let reference = match &self.selection {
            Selection::Empty => return AnalysisOutcome::NoData,
            Selection::Unreadable { reason, skipped } => {
                return AnalysisOutcome::Unreadable {
                    reason: reason.clone(),
                    skipped: skipped.clone(),
                }
            }
            Selection::Loaded(table) => Arc::clone(table),
        };

        match self.flick_index() {
            Some(flicks) => outcome_for(reference, flicks, spec.clone(), generation),
            None => AnalysisOutcome::NoData,
        }
    }

    /// Generation number the next [`AnalysisSession::apply`] will use
    pub fn next_generation(&self) -> u64 {
        self.generation + 1
    }

    /// True if `view` comes from the latest `apply`; older views are stale
    pub fn is_current(&self, view: &AnalysisView) -> bool {
        view.generation == self.generation
    }
}

fn cache_key<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    let mut key: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    key.sort();
    key
}

fn unreadable_reason(skipped: &[SkippedFile]) -> String {
    match skipped {
        [] => "no files could be read".to_string(),
        [only] => only.message.clone(),
        [first, rest @ ..] => format!("{} (and {} more)", first.message, rest.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeRange;
    use pretty_assertions::assert_eq;

    fn sample() -> EventTable {
        EventTable::from_rows(vec![
            (100, 10.0, 10.0, "btn_a"),
            (150, 90.0, 10.0, "swipe_up"),
            (200, 20.0, 20.0, "HWK_boost"),
            (300, 30.0, 30.0, "area_map"),
        ])
    }

    #[test]
    fn test_analyze_ready() {
        let outcome = analyze(sample(), &FilterSpec::pass_all());
        let stats = outcome.stats().expect("ready");
        assert_eq!(stats.touch_count, 1);
        assert_eq!(stats.flick_count, 1);
        assert_eq!(stats.hwk_count, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(outcome.state(), "ready");
    }

    #[test]
    fn test_analyze_states_are_distinct() {
        let empty = EventTable::from_rows(Vec::<(i64, f64, f64, String)>::new());
        assert!(matches!(analyze(empty, &FilterSpec::pass_all()), AnalysisOutcome::NoData));

        let spec = FilterSpec::new(TimeRange::new(1000, 2000), Vec::<String>::new());
        match analyze(sample(), &spec) {
            AnalysisOutcome::NoMatches { reference_rows } => assert_eq!(reference_rows, 4),
            other => panic!("expected NoMatches, got {}", other.state()),
        }
    }

    #[test]
    fn test_session_memoizes_reconstruction() {
        let mut session = AnalysisSession::default();
        session.set_table(sample());

        for keywords in ["", "h", "hw", "hwk", "hwk, ar"] {
            let spec = FilterSpec::from_keyword_text(TimeRange::unbounded(), keywords);
            let outcome = session.apply(&spec);
            assert!(outcome.view().is_some());
        }
        assert_eq!(session.reconstruction_count(), 1);

        session.set_table(sample());
        session.apply(&FilterSpec::pass_all());
        assert_eq!(session.reconstruction_count(), 2);
    }

    #[test]
    fn test_session_without_selection_has_no_data() {
        let mut session = AnalysisSession::default();
        assert!(matches!(session.apply(&FilterSpec::pass_all()), AnalysisOutcome::NoData));
        assert!(session.flick_index().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let mut session = AnalysisSession::default();
        session.set_table(sample());

        let first = session.apply(&FilterSpec::pass_all());
        let second = session.apply(&FilterSpec::from_keyword_text(TimeRange::unbounded(), "btn"));

        let first = first.view().expect("first view");
        let second = second.view().expect("second view");
        assert!(!session.is_current(first));
        assert!(session.is_current(second));
        assert_eq!(session.next_generation(), second.generation + 1);
    }

    #[test]
    fn test_view_exposes_flick_metadata() {
        let outcome = analyze(sample(), &FilterSpec::pass_all());
        let view = outcome.view().expect("ready");

        assert_eq!(view.flick_units().len(), 1);
        assert!(view.excluded_start_identities().contains(&RecordId(0)));
        assert_eq!(view.timeline_markers().len(), 2);
        assert_eq!(view.flow_path().arrows.len(), 1);
        assert_eq!(view.heatmap(&Config::default()).binned, 1);
    }

    #[test]
    fn test_outcome_serializes_with_state_tag() {
        let json = serde_json::to_value(AnalysisOutcome::NoMatches { reference_rows: 3 }).unwrap();
        assert_eq!(json["state"], "no_matches");
        assert_eq!(json["reference_rows"], 3);

        let ready = analyze(sample(), &FilterSpec::pass_all());
        let json = serde_json::to_value(&ready).unwrap();
        assert_eq!(json["state"], "ready");
        assert_eq!(json["stats"]["total"], 3);
    }

    #[test]
    fn test_unreadable_reason() {
        let skipped = vec![
            SkippedFile {
                path: PathBuf::from("a.csv"),
                code: "IO_ERROR".to_string(),
                message: "gone".to_string(),
            },
            SkippedFile {
                path: PathBuf::from("b.csv"),
                code: "CSV_ERROR".to_string(),
                message: "bad".to_string(),
            },
        ];
        assert_eq!(unreadable_reason(&skipped), "gone (and 1 more)");
        assert_eq!(unreadable_reason(&skipped[1..]), "bad");
    }
}
