//! Core data types
//!
//! This module defines the event records, tables and derived structures that
//! flow through the analysis pipeline: loader → classifier / flick
//! reconstruction → filter → aggregator.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Stable row identity: the ingestion-order index of a record in its
/// reference table. Filtering never renumbers records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub usize);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single touch / press record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Row identity
    pub id: RecordId,
    /// Event timestamp in milliseconds
    pub time_ms: i64,
    /// Touch X coordinate (screen space)
    pub x: f64,
    /// Touch Y coordinate (screen space)
    pub y: f64,
    /// Raw layer name
    pub name: String,
}

/// Top-level event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Touch,
    Hwk,
    Swipe,
}

/// Hardware-key subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HwkKind {
    Boost,
    Magma,
    Drive,
    Unknown,
}

impl HwkKind {
    /// Display label, e.g. `HWK_boost`
    pub fn label(&self) -> &'static str {
        match self {
            HwkKind::Boost => "HWK_boost",
            HwkKind::Magma => "HWK_magma",
            HwkKind::Drive => "HWK_drive",
            HwkKind::Unknown => "HWK_unknown",
        }
    }

    /// Single-letter marker used on timelines
    pub fn initial(&self) -> char {
        match self {
            HwkKind::Boost => 'b',
            HwkKind::Magma => 'm',
            HwkKind::Drive => 'd',
            HwkKind::Unknown => '?',
        }
    }
}

/// Swipe direction subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
    Unknown,
}

impl SwipeDirection {
    /// Display label, e.g. `SWIPE_UP`
    pub fn label(&self) -> &'static str {
        match self {
            SwipeDirection::Up => "SWIPE_UP",
            SwipeDirection::Down => "SWIPE_DOWN",
            SwipeDirection::Left => "SWIPE_LEFT",
            SwipeDirection::Right => "SWIPE_RIGHT",
            SwipeDirection::Unknown => "SWIPE_UNKNOWN",
        }
    }

    /// Single-character marker used on timelines
    pub fn initial(&self) -> char {
        match self {
            SwipeDirection::Up => '↑',
            SwipeDirection::Down => '↓',
            SwipeDirection::Left => '←',
            SwipeDirection::Right => '→',
            SwipeDirection::Unknown => '↔',
        }
    }
}

/// Category subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subtype {
    /// Plain touch records carry no subtype
    Plain,
    Hwk(HwkKind),
    Swipe(SwipeDirection),
}

/// Presentation grouping (colour legend in charts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayGroup {
    Hwk,
    Swipe,
    Area,
    Btn,
    Other,
}

impl DisplayGroup {
    /// Chart colour for the group
    pub fn color(&self) -> &'static str {
        match self {
            DisplayGroup::Hwk => "#a855f7",
            DisplayGroup::Swipe => "#06b6d4",
            DisplayGroup::Area => "#f59e0b",
            DisplayGroup::Btn => "#10b981",
            DisplayGroup::Other => "#22c55e",
        }
    }
}

/// Full classification of a layer name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub subtype: Subtype,
    pub display_group: DisplayGroup,
}

/// Inclusive time range in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub min_ms: i64,
    pub max_ms: i64,
}

impl TimeRange {
    pub fn new(min_ms: i64, max_ms: i64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Range that admits every record
    pub fn unbounded() -> Self {
        Self {
            min_ms: i64::MIN,
            max_ms: i64::MAX,
        }
    }

    /// Inclusive membership test. An inverted range contains nothing.
    pub fn contains(&self, time_ms: i64) -> bool {
        self.min_ms <= time_ms && time_ms <= self.max_ms
    }

    /// True when `other` lies entirely within this range
    pub fn encloses(&self, other: &TimeRange) -> bool {
        other.min_ms > other.max_ms || (self.min_ms <= other.min_ms && other.max_ms <= self.max_ms)
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// A reconstructed flick gesture: nearest preceding non-swipe record → swipe terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlickUnit {
    pub start_id: RecordId,
    pub end_id: RecordId,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub start_name: String,
    pub end_name: String,
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    pub direction: SwipeDirection,
}

impl FlickUnit {
    /// Gesture duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.end_time_ms - self.start_time_ms
    }
}

/// An ordered, immutable table of event records.
///
/// Records are kept in ascending `RecordId` order. Every table carries a fresh
/// `table_id`; derived tables (filter output) also remember the `origin_id` of
/// the reference table they were cut from. Equality compares rows only.
#[derive(Debug, Clone)]
pub struct EventTable {
    table_id: Uuid,
    origin_id: Uuid,
    records: Vec<EventRecord>,
}

impl EventTable {
    /// Build a reference table from records with pre-assigned identities
    pub fn new(mut records: Vec<EventRecord>) -> Self {
        if !records.windows(2).all(|w| w[0].id < w[1].id) {
            records.sort_by_key(|r| r.id);
            records.dedup_by_key(|r| r.id);
        }
        let table_id = Uuid::new_v4();
        Self {
            table_id,
            origin_id: table_id,
            records,
        }
    }

    /// Build a reference table from `(time_ms, x, y, name)` rows, numbering
    /// identities in the given order
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (i64, f64, f64, S)>,
        S: Into<String>,
    {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(idx, (time_ms, x, y, name))| EventRecord {
                id: RecordId(idx),
                time_ms,
                x,
                y,
                name: name.into(),
            })
            .collect();
        Self::new(records)
    }

    /// Cut a derived table that shares this table's origin
    pub(crate) fn derive(&self, records: Vec<EventRecord>) -> Self {
        Self {
            table_id: Uuid::new_v4(),
            origin_id: self.origin_id,
            records,
        }
    }

    /// Identity of this table instance
    pub fn table_id(&self) -> Uuid {
        self.table_id
    }

    /// Identity of the reference table this table derives from
    pub fn origin_id(&self) -> Uuid {
        self.origin_id
    }

    /// True if this is an unfiltered reference table
    pub fn is_reference(&self) -> bool {
        self.table_id == self.origin_id
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by identity
    pub fn get(&self, id: RecordId) -> Option<&EventRecord> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.get(id).is_some()
    }

    /// Set of identities present in the table
    pub fn id_set(&self) -> HashSet<RecordId> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// Smallest range covering every record, or `None` for an empty table
    pub fn time_span(&self) -> Option<TimeRange> {
        let min = self.records.iter().map(|r| r.time_ms).min()?;
        let max = self.records.iter().map(|r| r.time_ms).max()?;
        Some(TimeRange::new(min, max))
    }
}

impl PartialEq for EventTable {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl<'a> IntoIterator for &'a EventTable {
    type Item = &'a EventRecord;
    type IntoIter = std::slice::Iter<'a, EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
