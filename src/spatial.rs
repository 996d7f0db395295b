//! Screen-space and timeline views of a filtered table
//!
//! All views use the same de-duplicated touch set as the aggregator, so a
//! flick start never shows up as a standalone touch point.

use crate::aggregator::standalone_touches;
use crate::classifier;
use crate::config::Config;
use crate::flick::FlickIndex;
use crate::types::{Category, DisplayGroup, EventTable, RecordId, Subtype, SwipeDirection};
use serde::Serialize;

/// 2-D touch histogram over `[0, width] x [0, height]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapGrid {
    pub bins_x: usize,
    pub bins_y: usize,
    pub width: f64,
    pub height: f64,
    /// Row-major by y bin: `counts[y * bins_x + x]`
    counts: Vec<u32>,
    /// Points that fell inside the screen
    pub binned: usize,
    /// Points outside the screen
    pub ignored: usize,
}

impl HeatmapGrid {
    fn empty(bins_x: usize, bins_y: usize, width: f64, height: f64) -> Self {
        Self {
            bins_x,
            bins_y,
            width,
            height,
            counts: vec![0; bins_x * bins_y],
            binned: 0,
            ignored: 0,
        }
    }

    /// Bin index along one axis; the upper edge belongs to the last bin
    fn bin(value: f64, extent: f64, bins: usize) -> Option<usize> {
        if !(0.0..=extent).contains(&value) {
            return None;
        }
        let idx = (value / extent * bins as f64) as usize;
        Some(idx.min(bins - 1))
    }

    fn add(&mut self, x: f64, y: f64) {
        match (
            Self::bin(x, self.width, self.bins_x),
            Self::bin(y, self.height, self.bins_y),
        ) {
            (Some(bx), Some(by)) => {
                self.counts[by * self.bins_x + bx] += 1;
                self.binned += 1;
            }
            _ => self.ignored += 1,
        }
    }

    pub fn count(&self, x_bin: usize, y_bin: usize) -> u32 {
        if x_bin >= self.bins_x || y_bin >= self.bins_y {
            return 0;
        }
        self.counts[y_bin * self.bins_x + x_bin]
    }

    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Non-empty cells as `(x_bin, y_bin, count)`
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(move |(idx, c)| (idx % self.bins_x, idx / self.bins_x, *c))
    }
}

/// Heatmap of standalone touches with bin counts chosen from the point count
pub fn heatmap(filtered: &EventTable, flicks: &FlickIndex, config: &Config) -> HeatmapGrid {
    let touches = standalone_touches(filtered, flicks);
    let (bins_x, bins_y) = config.adaptive_bins(touches.len());
    let mut grid = HeatmapGrid::empty(bins_x, bins_y, config.screen_width, config.screen_height);
    for touch in touches {
        grid.add(touch.x, touch.y);
    }
    grid
}

/// A numbered touch on the flow path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowPoint {
    /// 1-based position in time order
    pub seq: usize,
    pub id: RecordId,
    pub time_ms: i64,
    pub x: f64,
    pub y: f64,
    pub name: String,
}

/// A flick drawn from its start point to its swipe terminal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowArrow {
    pub start_id: RecordId,
    pub end_id: RecordId,
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub direction: SwipeDirection,
}

/// Touch order and flick arrows of a filtered view
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowPath {
    pub points: Vec<FlowPoint>,
    pub arrows: Vec<FlowArrow>,
}

impl FlowPath {
    /// Consecutive point pairs, the segments of the path
    pub fn segments(&self) -> impl Iterator<Item = (&FlowPoint, &FlowPoint)> {
        self.points.iter().zip(self.points.iter().skip(1))
    }
}

/// Standalone touches in time order plus one arrow per valid flick
pub fn flow_path(filtered: &EventTable, flicks: &FlickIndex) -> FlowPath {
    let mut touches = standalone_touches(filtered, flicks);
    touches.sort_by_key(|r| (r.time_ms, r.id));

    let points = touches
        .into_iter()
        .enumerate()
        .map(|(idx, r)| FlowPoint {
            seq: idx + 1,
            id: r.id,
            time_ms: r.time_ms,
            x: r.x,
            y: r.y,
            name: r.name.clone(),
        })
        .collect();

    let arrows = flicks
        .valid_units(filtered)
        .map(|u| FlowArrow {
            start_id: u.start_id,
            end_id: u.end_id,
            from: (u.start_x, u.start_y),
            to: (u.end_x, u.end_y),
            direction: u.direction,
        })
        .collect();

    FlowPath { points, arrows }
}

/// An HWK or SWIPE event on the time axis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineMarker {
    pub id: RecordId,
    pub time_sec: f64,
    pub category: Category,
    /// `HWK_boost`, `SWIPE_UP`, ...
    pub label: String,
    pub initial: char,
    pub color: &'static str,
}

/// HWK and SWIPE markers of `table` in time order
pub fn timeline_markers(table: &EventTable) -> Vec<TimelineMarker> {
    let mut markers: Vec<TimelineMarker> = table
        .iter()
        .filter_map(|r| {
            let class = classifier::classify_full(&r.name);
            let (label, initial, group) = match class.subtype {
                Subtype::Hwk(kind) => (kind.label(), kind.initial(), DisplayGroup::Hwk),
                Subtype::Swipe(dir) => (dir.label(), dir.initial(), DisplayGroup::Swipe),
                Subtype::Plain => return None,
            };
            Some(TimelineMarker {
                id: r.id,
                time_sec: r.time_ms as f64 / 1000.0,
                category: class.category,
                label: label.to_string(),
                initial,
                color: group.color(),
            })
        })
        .collect();
    markers.sort_by(|a, b| a.time_sec.total_cmp(&b.time_sec).then(a.id.cmp(&b.id)));
    markers
}
