//! Aggregation of a filtered table into counts and distributions
//!
//! Every view (frequency chart, time distribution, statistics report) is built
//! from the same de-duplicated event set: plain touches that do not start a
//! flick, plus every HWK and SWIPE record that survived filtering. The headline
//! total counts one per gesture:
//!
//! `total = touch_count + flick_count + hwk_count`
//!
//! which is never larger than the number of filtered rows.

use crate::classifier;
use crate::flick::FlickIndex;
use crate::types::{
    Category, DisplayGroup, EventRecord, EventTable, HwkKind, SwipeDirection,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Share of the headline total per category (percent, 0 when total is 0)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryShares {
    pub touch_pct: f64,
    pub flick_pct: f64,
    pub hwk_pct: f64,
}

/// Events per second over the filtered time span
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Densities {
    pub touch_per_sec: f64,
    pub flick_per_sec: f64,
    pub hwk_per_sec: f64,
}

/// Time statistics over the de-duplicated event set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStats {
    pub first_ms: i64,
    pub last_ms: i64,
    pub duration_sec: f64,
    /// Mean gap between consecutive events (0 for a single event)
    pub mean_interval_ms: f64,
}

/// min / max / mean of one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Coordinate statistics over de-duplicated touches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateStats {
    pub x: AxisStats,
    pub y: AxisStats,
}

/// Event count for one layer name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerFrequency {
    pub name: String,
    pub display_group: DisplayGroup,
    pub count: usize,
    pub pct: f64,
}

/// Box-plot inputs for one layer name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerTimeDistribution {
    pub name: String,
    pub display_group: DisplayGroup,
    pub count: usize,
    pub min_ms: i64,
    pub q1_ms: f64,
    pub median_ms: f64,
    pub q3_ms: f64,
    pub max_ms: i64,
}

/// Count of one subtype (HWK kind or swipe direction)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtypeShare {
    pub label: String,
    pub count: usize,
    pub pct: f64,
}

/// Aggregated statistics of a filtered view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    /// Plain touches, flick starts excluded
    pub touch_count: usize,
    /// Flick units whose swipe terminal survived filtering
    pub flick_count: usize,
    /// HWK records
    pub hwk_count: usize,
    /// `touch_count + flick_count + hwk_count`
    pub total: usize,
    /// Swipe terminal rows in the filtered table
    pub swipe_rows: usize,
    /// Rows in the filtered table
    pub filtered_rows: usize,
    /// Units reconstructed on the reference table, valid or not
    pub reconstructed_flicks: usize,
    /// Distinct layer names in the de-duplicated event set
    pub unique_layers: usize,
    pub shares: CategoryShares,
    pub densities: Densities,
    /// `flick / (touch + flick)` in percent
    pub flick_ratio_pct: f64,
    pub time: Option<TimeStats>,
    pub coordinates: Option<CoordinateStats>,
    /// Layer counts in first-appearance order
    pub layer_frequencies: Vec<LayerFrequency>,
    /// Per-layer time distributions, same order as `layer_frequencies`
    pub layer_time_distributions: Vec<LayerTimeDistribution>,
    /// Touch layers by descending count
    pub touch_layers: Vec<LayerFrequency>,
    /// Swipe layers by descending count
    pub swipe_layers: Vec<LayerFrequency>,
    pub hwk_kinds: Vec<SubtypeShare>,
    pub swipe_directions: Vec<SubtypeShare>,
    pub computed_at: DateTime<Utc>,
}

impl Stats {
    /// True when the filtered table held no rows
    pub fn is_empty(&self) -> bool {
        self.filtered_rows == 0
    }
}

/// Aggregator for filtered tables
pub struct Aggregator;

impl Aggregator {
    /// Aggregate `filtered` using flick units reconstructed on its reference table
    pub fn aggregate(filtered: &EventTable, flicks: &FlickIndex) -> Stats {
        if !flicks.applies_to(filtered) {
            warn!(
                "Flick index {} was built for another table than {}",
                flicks.source_table_id(),
                filtered.origin_id()
            );
            debug_assert!(false, "flick index does not belong to the filtered table");
        }

        let events = deduplicated_events(filtered, flicks);

        let touch_count = events.iter().filter(|(_, c)| *c == Category::Touch).count();
        let hwk_count = events.iter().filter(|(_, c)| *c == Category::Hwk).count();
        let swipe_rows = events.iter().filter(|(_, c)| *c == Category::Swipe).count();
        let flick_count = flicks.count_valid(filtered);
        let total = touch_count + flick_count + hwk_count;

        let touches: Vec<&EventRecord> = events
            .iter()
            .filter(|(_, c)| *c == Category::Touch)
            .map(|(r, _)| *r)
            .collect();
        let swipes: Vec<&EventRecord> = events
            .iter()
            .filter(|(_, c)| *c == Category::Swipe)
            .map(|(r, _)| *r)
            .collect();
        let hwks: Vec<&EventRecord> = events
            .iter()
            .filter(|(_, c)| *c == Category::Hwk)
            .map(|(r, _)| *r)
            .collect();

        let all: Vec<&EventRecord> = events.iter().map(|(r, _)| *r).collect();
        let time = time_stats(&all);
        let duration_sec = time.as_ref().map(|t| t.duration_sec).unwrap_or(0.0);
        let (layer_frequencies, layer_time_distributions) = layer_breakdown(&all);

        debug!(
            "Aggregated {} rows: touch={} flick={} hwk={} total={}",
            filtered.len(),
            touch_count,
            flick_count,
            hwk_count,
            total
        );

        Stats {
            touch_count,
            flick_count,
            hwk_count,
            total,
            swipe_rows,
            filtered_rows: filtered.len(),
            reconstructed_flicks: flicks.len(),
            unique_layers: layer_frequencies.len(),
            shares: CategoryShares {
                touch_pct: percent(touch_count, total),
                flick_pct: percent(flick_count, total),
                hwk_pct: percent(hwk_count, total),
            },
            densities: Densities {
                touch_per_sec: per_second(touch_count, duration_sec),
                flick_per_sec: per_second(flick_count, duration_sec),
                hwk_per_sec: per_second(hwk_count, duration_sec),
            },
            flick_ratio_pct: percent(flick_count, touch_count + flick_count),
            time,
            coordinates: coordinate_stats(&touches),
            layer_frequencies,
            layer_time_distributions,
            touch_layers: ranked_layers(&touches),
            swipe_layers: ranked_layers(&swipes),
            hwk_kinds: subtype_shares(
                hwks.iter().map(|r| classifier::hwk_kind(&r.name)),
                HwkKind::label,
            ),
            swipe_directions: subtype_shares(
                swipes.iter().map(|r| classifier::swipe_direction(&r.name)),
                SwipeDirection::label,
            ),
            computed_at: Utc::now(),
        }
    }
}

/// Plain touches that do not start a flick, plus every HWK and SWIPE record,
/// in table order
pub fn deduplicated_events<'a>(
    filtered: &'a EventTable,
    flicks: &FlickIndex,
) -> Vec<(&'a EventRecord, Category)> {
    filtered
        .iter()
        .map(|r| (r, classifier::classify(&r.name)))
        .filter(|(r, c)| *c != Category::Touch || !flicks.is_start(r.id))
        .collect()
}

/// Plain touches that do not start a flick, in table order
pub fn standalone_touches<'a>(filtered: &'a EventTable, flicks: &FlickIndex) -> Vec<&'a EventRecord> {
    deduplicated_events(filtered, flicks)
        .into_iter()
        .filter(|(_, c)| *c == Category::Touch)
        .map(|(r, _)| r)
        .collect()
}

/// Percentage guarded against a zero denominator
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn per_second(count: usize, duration_sec: f64) -> f64 {
    if duration_sec > 0.0 {
        count as f64 / duration_sec
    } else {
        0.0
    }
}

fn time_stats(events: &[&EventRecord]) -> Option<TimeStats> {
    let first_ms = events.iter().map(|r| r.time_ms).min()?;
    let last_ms = events.iter().map(|r| r.time_ms).max()?;
    let duration_ms = (last_ms - first_ms) as f64;
    let mean_interval_ms = if events.len() > 1 {
        duration_ms / (events.len() - 1) as f64
    } else {
        0.0
    };
    Some(TimeStats {
        first_ms,
        last_ms,
        duration_sec: duration_ms / 1000.0,
        mean_interval_ms,
    })
}

fn axis_stats(values: impl Iterator<Item = f64>) -> Option<AxisStats> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    if count == 0 {
        return None;
    }
    Some(AxisStats {
        min,
        max,
        mean: sum / count as f64,
    })
}

fn coordinate_stats(touches: &[&EventRecord]) -> Option<CoordinateStats> {
    Some(CoordinateStats {
        x: axis_stats(touches.iter().map(|r| r.x))?,
        y: axis_stats(touches.iter().map(|r| r.y))?,
    })
}

/// Linear-interpolated percentile of an ascending slice, `p` in [0, 1]
fn percentile(sorted: &[i64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0] as f64,
        n => {
            let rank = p * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] as f64 + (sorted[upper] - sorted[lower]) as f64 * weight
        }
    }
}

fn layer_breakdown(events: &[&EventRecord]) -> (Vec<LayerFrequency>, Vec<LayerTimeDistribution>) {
    let mut order: Vec<&str> = Vec::new();
    let mut times: HashMap<&str, Vec<i64>> = HashMap::new();
    for record in events {
        let entry = times.entry(record.name.as_str()).or_insert_with(|| {
            order.push(record.name.as_str());
            Vec::new()
        });
        entry.push(record.time_ms);
    }

    let total = events.len();
    let mut frequencies = Vec::with_capacity(order.len());
    let mut distributions = Vec::with_capacity(order.len());

    for name in order {
        let mut samples = times.remove(name).unwrap_or_default();
        samples.sort_unstable();
        let display_group = classifier::classify_display(name);

        frequencies.push(LayerFrequency {
            name: name.to_string(),
            display_group,
            count: samples.len(),
            pct: percent(samples.len(), total),
        });

        if let (Some(&min_ms), Some(&max_ms)) = (samples.first(), samples.last()) {
            distributions.push(LayerTimeDistribution {
                name: name.to_string(),
                display_group,
                count: samples.len(),
                min_ms,
                q1_ms: percentile(&samples, 0.25),
                median_ms: percentile(&samples, 0.5),
                q3_ms: percentile(&samples, 0.75),
                max_ms,
            });
        }
    }

    (frequencies, distributions)
}

fn ranked_layers(records: &[&EventRecord]) -> Vec<LayerFrequency> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.name.as_str()).or_insert(0) += 1;
    }
    let mut ranked: Vec<LayerFrequency> = counts
        .into_iter()
        .map(|(name, count)| LayerFrequency {
            name: name.to_string(),
            display_group: classifier::classify_display(name),
            count,
            pct: percent(count, records.len()),
        })
        .collect();
    // BTreeMap order makes the name tie-break stable
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

fn subtype_shares<T, I>(kinds: I, label: fn(&T) -> &'static str) -> Vec<SubtypeShare>
where
    T: Ord,
    I: Iterator<Item = T>,
{
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    let mut total = 0;
    for kind in kinds {
        *counts.entry(kind).or_insert(0) += 1;
        total += 1;
    }
    counts
        .into_iter()
        .map(|(kind, count)| SubtypeShare {
            label: label(&kind).to_string(),
            count,
            pct: percent(count, total),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{self, FilterSpec};
    use crate::types::TimeRange;
    use pretty_assertions::assert_eq;

    fn table(rows: &[(i64, &str)]) -> EventTable {
        EventTable::from_rows(rows.iter().map(|(t, n)| (*t, *t as f64, 1.0, *n)))
    }

    fn run(reference: &EventTable, spec: &FilterSpec) -> Stats {
        let flicks = FlickIndex::reconstruct(reference);
        let filtered = filter::apply(reference, spec);
        Aggregator::aggregate(&filtered, &flicks)
    }

    #[test]
    fn test_single_flick_counts_once() {
        let t = table(&[(100, "btn_a"), (150, "swipe_up")]);
        let stats = run(&t, &FilterSpec::pass_all());

        assert_eq!(stats.touch_count, 0);
        assert_eq!(stats.flick_count, 1);
        assert_eq!(stats.hwk_count, 0);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.filtered_rows, 2);
    }

    #[test]
    fn test_orphan_swipe_contributes_nothing() {
        let t = table(&[(50, "swipe_up")]);
        let stats = run(&t, &FilterSpec::pass_all());

        assert_eq!(stats.touch_count, 0);
        assert_eq!(stats.flick_count, 0);
        assert_eq!(stats.swipe_rows, 1);
        assert_eq!(stats.reconstructed_flicks, 0);
    }

    #[test]
    fn test_hwk_keyword_filter() {
        let t = table(&[(10, "HWK_boost"), (20, "btn_a")]);
        let spec = FilterSpec::from_keyword_text(TimeRange::unbounded(), "hwk");
        let stats = run(&t, &spec);

        assert_eq!(stats.hwk_count, 0);
        assert_eq!(stats.touch_count, 1);
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn test_shared_start_counts_two_flicks() {
        let t = table(&[(100, "btn_a"), (200, "swipe_up"), (210, "swipe_down")]);
        let stats = run(&t, &FilterSpec::pass_all());

        assert_eq!(stats.touch_count, 0);
        assert_eq!(stats.flick_count, 2);
        assert_eq!(stats.total, 2);
        assert!(stats.total < stats.filtered_rows);
    }

    #[test]
    fn test_start_excluded_even_when_terminal_filtered_out() {
        let t = table(&[(100, "btn_a"), (150, "swipe_up"), (300, "btn_b")]);
        let spec = FilterSpec::from_keyword_text(TimeRange::unbounded(), "swipe");
        let stats = run(&t, &spec);

        // btn_a still started a gesture on the reference table
        assert_eq!(stats.touch_count, 1);
        assert_eq!(stats.flick_count, 0);
        assert_eq!(stats.reconstructed_flicks, 1);
    }

    #[test]
    fn test_flick_valid_when_start_outside_range() {
        let t = table(&[(100, "btn_a"), (150, "swipe_up"), (300, "btn_b")]);
        let spec = FilterSpec::new(TimeRange::new(120, 400), Vec::<String>::new());
        let stats = run(&t, &spec);

        assert_eq!(stats.flick_count, 1);
        assert_eq!(stats.touch_count, 1);
        assert_eq!(stats.total, stats.filtered_rows);
    }

    #[test]
    fn test_dedup_invariant_over_sub_ranges() {
        let t = table(&[
            (0, "btn_a"),
            (40, "swipe_left"),
            (80, "HWK_magma"),
            (120, "area_1"),
            (130, "swipe_up"),
            (135, "swipe_up"),
            (200, "btn_b"),
            (260, "HWK_drive"),
            (270, "swipe_right"),
        ]);
        let flicks = FlickIndex::reconstruct(&t);

        for start in (0..=280).step_by(20) {
            for end in (start..=280).step_by(30) {
                for keywords in ["", "hwk", "btn", "swipe_up", "area, hwk"] {
                    let spec = FilterSpec::from_keyword_text(TimeRange::new(start, end), keywords);
                    let filtered = filter::apply(&t, &spec);
                    let stats = Aggregator::aggregate(&filtered, &flicks);

                    assert_eq!(stats.total, stats.touch_count + stats.flick_count + stats.hwk_count);
                    assert!(stats.total <= filtered.len());
                    let starts_present = filtered.iter().any(|r| {
                        flicks.is_start(r.id) && classifier::classify(&r.name) == Category::Touch
                    });
                    if stats.flick_count > 0 && starts_present {
                        assert!(stats.total < filtered.len());
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_table_is_all_zero() {
        let t = table(&[(100, "btn_a")]);
        let spec = FilterSpec::new(TimeRange::new(500, 600), Vec::<String>::new());
        let stats = run(&t, &spec);

        assert!(stats.is_empty());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.shares, CategoryShares::default());
        assert_eq!(stats.densities, Densities::default());
        assert_eq!(stats.flick_ratio_pct, 0.0);
        assert!(stats.time.is_none());
        assert!(stats.coordinates.is_none());
        assert!(stats.layer_frequencies.is_empty());
    }

    #[test]
    fn test_time_stats_skip_flick_start() {
        let t = table(&[(0, "btn_a"), (100, "swipe_up"), (400, "btn_b")]);
        let stats = run(&t, &FilterSpec::pass_all());

        let time = stats.time.expect("time stats");
        assert_eq!((time.first_ms, time.last_ms), (100, 400));
        assert!((time.duration_sec - 0.3).abs() < 1e-9);
        assert!((time.mean_interval_ms - 300.0).abs() < 1e-9);
        assert_eq!(stats.filtered_rows, 3);
    }

    #[test]
    fn test_lone_flick_start_has_no_time_stats() {
        let t = table(&[(100, "btn_a"), (150, "swipe_up")]);
        let spec = FilterSpec::new(TimeRange::new(0, 120), Vec::<String>::new());
        let stats = run(&t, &spec);

        assert_eq!(stats.filtered_rows, 1);
        assert!(stats.time.is_none());
        assert_eq!(stats.densities, Densities::default());
    }

    #[test]
    fn test_zero_duration_guards_density() {
        let t = table(&[(100, "btn_a"), (100, "btn_b")]);
        let stats = run(&t, &FilterSpec::pass_all());
        assert_eq!(stats.densities.touch_per_sec, 0.0);
        assert_eq!(stats.time.as_ref().map(|t| t.duration_sec), Some(0.0));
    }

    #[test]
    fn test_layer_breakdown_uses_deduplicated_set() {
        let t = table(&[
            (100, "btn_a"),
            (150, "swipe_up"),
            (200, "btn_a"),
            (300, "btn_a"),
            (400, "HWK_boost"),
        ]);
        let stats = run(&t, &FilterSpec::pass_all());

        let freq: Vec<(&str, usize)> = stats
            .layer_frequencies
            .iter()
            .map(|f| (f.name.as_str(), f.count))
            .collect();
        // First btn_a started the flick and is not counted
        assert_eq!(freq, vec![("swipe_up", 1), ("btn_a", 2), ("HWK_boost", 1)]);

        let btn = &stats.layer_time_distributions[1];
        assert_eq!(btn.name, "btn_a");
        assert_eq!(btn.min_ms, 200);
        assert_eq!(btn.max_ms, 300);
        assert_eq!(btn.median_ms, 250.0);
        assert_eq!(btn.q1_ms, 225.0);
        assert_eq!(btn.q3_ms, 275.0);
        assert_eq!(stats.unique_layers, 3);
    }

    #[test]
    fn test_coordinates_over_standalone_touches() {
        let t = table(&[(100, "btn_a"), (150, "swipe_up"), (200, "btn_b"), (400, "btn_c")]);
        let stats = run(&t, &FilterSpec::pass_all());

        let coords = stats.coordinates.expect("touch coordinates");
        assert_eq!(coords.x.min, 200.0);
        assert_eq!(coords.x.max, 400.0);
        assert_eq!(coords.x.mean, 300.0);
        assert_eq!(coords.y.mean, 1.0);
    }

    #[test]
    fn test_subtype_distributions() {
        let t = table(&[
            (10, "HWK_boost"),
            (20, "HWK_boost"),
            (30, "HWK_drive"),
            (40, "btn"),
            (50, "swipe_left"),
            (60, "swipe_left"),
        ]);
        let stats = run(&t, &FilterSpec::pass_all());

        let kinds: Vec<(&str, usize)> =
            stats.hwk_kinds.iter().map(|s| (s.label.as_str(), s.count)).collect();
        assert_eq!(kinds, vec![("HWK_boost", 2), ("HWK_drive", 1)]);

        let directions: Vec<(&str, usize)> = stats
            .swipe_directions
            .iter()
            .map(|s| (s.label.as_str(), s.count))
            .collect();
        assert_eq!(directions, vec![("SWIPE_LEFT", 2)]);
        assert_eq!(stats.swipe_layers[0].count, 2);
    }

    #[test]
    fn test_shares_and_ratio() {
        let t = table(&[
            (0, "btn_a"),
            (1000, "btn_b"),
            (1500, "swipe_up"),
            (2000, "HWK_boost"),
        ]);
        let stats = run(&t, &FilterSpec::pass_all());

        assert_eq!(stats.total, 3);
        assert!((stats.shares.touch_pct - 33.333).abs() < 0.01);
        assert!((stats.flick_ratio_pct - 50.0).abs() < 1e-9);
        assert!((stats.densities.touch_per_sec - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_ranked_touch_layers() {
        let t = table(&[(10, "b"), (20, "a"), (30, "b"), (40, "c"), (50, "a"), (60, "b")]);
        let stats = run(&t, &FilterSpec::pass_all());
        let ranked: Vec<&str> = stats.touch_layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(ranked, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_percentile_interpolation() {
        assert_eq!(percentile(&[], 0.5), 0.0);
        assert_eq!(percentile(&[7], 0.25), 7.0);
        assert_eq!(percentile(&[0, 10, 20, 30], 0.5), 15.0);
        assert_eq!(percentile(&[0, 10, 20, 30], 0.25), 7.5);
    }
}
