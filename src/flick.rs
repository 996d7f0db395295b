//! Flick reconstruction
//!
//! A swipe is logged as a single terminal record. The gesture itself starts at
//! the nearest preceding non-swipe record, so each swipe terminal is paired with
//! that predecessor to form a [`FlickUnit`]. Reconstruction always runs on the
//! unfiltered reference table; validity under a filter is decided later by
//! whether the swipe terminal itself survived.

use crate::classifier;
use crate::types::{Category, EventRecord, EventTable, FlickUnit, RecordId};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

/// Reconstructed flick units of one reference table
#[derive(Debug, Clone, Serialize)]
pub struct FlickIndex {
    source_table_id: Uuid,
    units: Vec<FlickUnit>,
    #[serde(skip)]
    start_ids: HashSet<RecordId>,
    orphan_swipes: usize,
}

impl FlickIndex {
    /// Pair every swipe terminal in `reference` with its nearest preceding
    /// non-swipe record.
    ///
    /// Predecessors are indexed once by `(time_ms, id)` and each terminal
    /// binary-searches the last strictly earlier timestamp, giving
    /// O(N log N + S log N). Among predecessors sharing that timestamp the
    /// lowest identity wins.
    pub fn reconstruct(reference: &EventTable) -> Self {
        let mut predecessors: Vec<&EventRecord> = Vec::with_capacity(reference.len());
        let mut terminals: Vec<&EventRecord> = Vec::new();

        for record in reference {
            if classifier::classify(&record.name) == Category::Swipe {
                terminals.push(record);
            } else {
                predecessors.push(record);
            }
        }

        predecessors.sort_by_key(|r| (r.time_ms, r.id));
        terminals.sort_by_key(|r| (r.time_ms, r.id));

        let mut units = Vec::with_capacity(terminals.len());
        let mut start_ids = HashSet::new();
        let mut orphan_swipes = 0;

        for terminal in terminals {
            match nearest_predecessor(&predecessors, terminal.time_ms) {
                Some(start) => {
                    start_ids.insert(start.id);
                    units.push(make_unit(start, terminal));
                }
                None => {
                    debug!(
                        "Orphan swipe {} '{}' at {}ms has no earlier touch",
                        terminal.id, terminal.name, terminal.time_ms
                    );
                    orphan_swipes += 1;
                }
            }
        }

        debug!(
            "Reconstructed {} flick units from {} rows ({} orphan swipes)",
            units.len(),
            reference.len(),
            orphan_swipes
        );

        Self {
            source_table_id: reference.origin_id(),
            units,
            start_ids,
            orphan_swipes,
        }
    }

    /// Rebuild an index from previously computed units, dropping any unit
    /// whose records are absent from `reference` or disagree with it.
    ///
    /// A dropped unit is a programming defect: debug builds panic, release
    /// builds log and continue without it.
    pub fn from_units(reference: &EventTable, units: Vec<FlickUnit>) -> Self {
        let total = units.len();
        let units: Vec<FlickUnit> = units
            .into_iter()
            .filter(|unit| match check_unit(reference, unit) {
                Ok(()) => true,
                Err(reason) => {
                    warn!(
                        "Dropping flick unit {} -> {}: {}",
                        unit.start_id, unit.end_id, reason
                    );
                    false
                }
            })
            .collect();

        debug_assert_eq!(
            units.len(),
            total,
            "flick units referenced records missing from the reference table"
        );

        let start_ids = units.iter().map(|u| u.start_id).collect();
        let swipe_rows = reference
            .iter()
            .filter(|r| classifier::is_swipe(&r.name))
            .count();

        Self {
            source_table_id: reference.origin_id(),
            orphan_swipes: swipe_rows.saturating_sub(units.len()),
            units,
            start_ids,
        }
    }

    /// Identities of records that start a flick and must not count as touches
    pub fn start_identities(&self) -> &HashSet<RecordId> {
        &self.start_ids
    }

    /// All reconstructed units in terminal time order
    pub fn units(&self) -> &[FlickUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Swipe terminals that found no earlier non-swipe record
    pub fn orphan_swipes(&self) -> usize {
        self.orphan_swipes
    }

    /// Reference table the index was built from
    pub fn source_table_id(&self) -> Uuid {
        self.source_table_id
    }

    /// True if `table` is the reference table or was derived from it
    pub fn applies_to(&self, table: &EventTable) -> bool {
        table.origin_id() == self.source_table_id
    }

    pub fn is_start(&self, id: RecordId) -> bool {
        self.start_ids.contains(&id)
    }

    /// Number of units whose swipe terminal is present in `filtered`.
    ///
    /// This is the user-facing flick count: one per gesture.
    pub fn count_valid(&self, filtered: &EventTable) -> usize {
        self.valid_units(filtered).count()
    }

    /// Units whose swipe terminal is present in `filtered`
    pub fn valid_units<'a>(
        &'a self,
        filtered: &'a EventTable,
    ) -> impl Iterator<Item = &'a FlickUnit> + 'a {
        self.units
            .iter()
            .filter(move |unit| filtered.contains(unit.end_id))
    }
}

/// Last predecessor strictly before `time_ms`, lowest identity on ties
fn nearest_predecessor<'a>(sorted: &[&'a EventRecord], time_ms: i64) -> Option<&'a EventRecord> {
    let end = sorted.partition_point(|r| r.time_ms < time_ms);
    if end == 0 {
        return None;
    }
    let best_time = sorted[end - 1].time_ms;
    let first_at_best = sorted[..end].partition_point(|r| r.time_ms < best_time);
    Some(sorted[first_at_best])
}

fn make_unit(start: &EventRecord, end: &EventRecord) -> FlickUnit {
    FlickUnit {
        start_id: start.id,
        end_id: end.id,
        start_time_ms: start.time_ms,
        end_time_ms: end.time_ms,
        start_name: start.name.clone(),
        end_name: end.name.clone(),
        start_x: start.x,
        start_y: start.y,
        end_x: end.x,
        end_y: end.y,
        direction: classifier::swipe_direction(&end.name),
    }
}

fn check_unit(reference: &EventTable, unit: &FlickUnit) -> Result<(), String> {
    let start = reference
        .get(unit.start_id)
        .ok_or_else(|| format!("start {} not in reference", unit.start_id))?;
    let end = reference
        .get(unit.end_id)
        .ok_or_else(|| format!("end {} not in reference", unit.end_id))?;

    if start.time_ms != unit.start_time_ms || start.name != unit.start_name {
        return Err(format!("start {} does not match its record", unit.start_id));
    }
    if end.time_ms != unit.end_time_ms || end.name != unit.end_name {
        return Err(format!("end {} does not match its record", unit.end_id));
    }
    if !classifier::is_swipe(&end.name) {
        return Err(format!("end {} is not a swipe record", unit.end_id));
    }
    if start.time_ms >= end.time_ms {
        return Err("start is not strictly before end".to_string());
    }
    Ok(())
}
