use std::collections::HashMap;

use serde::Serialize;

use crate::models::pipeline::{self, StepDirection};
use crate::models::trip::{RawRecord, Trip};

/// The in-memory trip collection. All mutation runs behind one write lock,
/// so merges and moves never interleave.
#[derive(Debug, Default)]
pub struct Board {
    trips: Vec<Trip>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub stage: String,
    pub trips: usize,
    pub items: i64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardTotals {
    pub trips: usize,
    pub approved_trips: usize,
    pub pending_trips: usize,
    pub ambassador_trips: usize,
    pub items: i64,
    pub weight: f64,
    pub special_destination_trips: usize,
    pub ready_to_process_items: i64,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn find(&self, trip_id: &str) -> Option<&Trip> {
        self.trips.iter().find(|trip| trip.trip_id == trip_id)
    }

    /// Full replacement by an inbound snapshot: entries are defensively
    /// normalized, blank ids dropped, duplicate ids collapsed onto the first
    /// occurrence's position with the last occurrence's values.
    pub fn replace(&mut self, trips: Vec<Trip>) {
        let mut next: Vec<Trip> = Vec::with_capacity(trips.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        for trip in trips {
            let trip = trip.normalized();
            if trip.trip_id.is_empty() {
                continue;
            }
            upsert(&mut next, &mut positions, trip);
        }
        self.trips = next;
    }

    /// Replaces the collection with the rows of a fresh import while
    /// carrying forward the progress users have entered on the board.
    /// Known ids keep their `board_status` and `assigned_to`; new ids start
    /// on the stage their verification status maps to, unassigned. A row
    /// with blank notes never wipes notes already on the board. Trips
    /// absent from the import are dropped. Output follows import order;
    /// rows without an id are skipped and counted.
    pub fn reconcile(&mut self, rows: &[RawRecord]) -> ImportSummary {
        let prior: HashMap<String, Trip> = self
            .trips
            .drain(..)
            .map(Trip::normalized)
            .map(|trip| (trip.trip_id.clone(), trip))
            .collect();

        let mut next: Vec<Trip> = Vec::with_capacity(rows.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut skipped = 0;
        for raw in rows {
            let mut trip = Trip::from_raw(raw);
            if trip.trip_id.is_empty() {
                skipped += 1;
                continue;
            }
            if let Some(existing) = prior.get(&trip.trip_id) {
                trip.board_status = existing.board_status.clone();
                trip.assigned_to = existing.assigned_to.clone();
                if !trip.has_notes() && existing.has_notes() {
                    trip.notes = existing.notes.clone();
                }
            }
            upsert(&mut next, &mut positions, trip);
        }
        self.trips = next;
        ImportSummary {
            imported: self.trips.len(),
            skipped,
        }
    }

    /// Direct drop onto a column. Unknown target names land the trip on the
    /// first stage rather than failing the drop.
    pub fn move_trip(&mut self, trip_id: &str, target_stage: &str) -> Option<&Trip> {
        let index = self.position(trip_id)?;
        self.trips[index].board_status = pipeline::canonical_stage(target_stage).to_string();
        Some(&self.trips[index])
    }

    /// One step along the pipeline, clamped: stepping off either end leaves
    /// the trip where it is.
    pub fn step_trip(&mut self, trip_id: &str, direction: StepDirection) -> Option<&Trip> {
        let index = self.position(trip_id)?;
        let stage = pipeline::stepped_stage(&self.trips[index].board_status, direction);
        self.trips[index].board_status = stage.to_string();
        Some(&self.trips[index])
    }

    pub fn assign_trip(&mut self, trip_id: &str, assignee: &str) -> Option<&Trip> {
        let index = self.position(trip_id)?;
        self.trips[index].assigned_to = assignee.to_string();
        Some(&self.trips[index])
    }

    fn position(&self, trip_id: &str) -> Option<usize> {
        self.trips.iter().position(|trip| trip.trip_id == trip_id)
    }
}

fn upsert(list: &mut Vec<Trip>, positions: &mut HashMap<String, usize>, trip: Trip) {
    match positions.get(&trip.trip_id) {
        Some(&index) => list[index] = trip,
        None => {
            positions.insert(trip.trip_id.clone(), list.len());
            list.push(trip);
        }
    }
}

/// Per-stage rollup over a (usually filtered) trip list. Every stage gets a
/// row, zeroed when empty; trips on unrecognized statuses count into the
/// first stage, same place the board renders them.
pub fn stage_summaries(trips: &[Trip]) -> Vec<StageSummary> {
    let mut rows: Vec<StageSummary> = pipeline::STAGES
        .iter()
        .map(|stage| StageSummary {
            stage: stage.to_string(),
            trips: 0,
            items: 0,
            weight: 0.0,
        })
        .collect();
    for trip in trips {
        let row = &mut rows[trip.stage_index()];
        row.trips += 1;
        row.items += trip.items().unwrap_or(0);
        row.weight += trip.weight_value().unwrap_or(0.0);
    }
    rows
}

/// Whole-board rollup behind the KPI strip. Everything off the approved
/// stage counts as pending, matching the top cards on the board.
pub fn totals(trips: &[Trip]) -> BoardTotals {
    let mut totals = BoardTotals {
        trips: trips.len(),
        ..Default::default()
    };
    for trip in trips {
        if trip.is_approved() {
            totals.approved_trips += 1;
        } else {
            totals.pending_trips += 1;
        }
        if trip.is_ambassador() {
            totals.ambassador_trips += 1;
        }
        let items = trip.items().unwrap_or(0);
        totals.items += items;
        totals.weight += trip.weight_value().unwrap_or(0.0);
        if trip.is_special_destination() {
            totals.special_destination_trips += 1;
        }
        if trip.has_pending_status() {
            totals.ready_to_process_items += items;
        }
    }
    totals
}
