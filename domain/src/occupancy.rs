//! Occupancy derivation from reservation intervals.
//!
//! A resource is occupied at a moment when some approved, well-formed
//! reservation for it on the same local date satisfies
//! `start_time <= now.time < end_time`. When the storage layer lets two
//! approved reservations overlap, the one with the smallest
//! `(start_time, end_time)` is reported as the occupying window.

use crate::clock::Moment;
use crate::reservation::{ReservationInterval, ResourceId};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyState {
    Available,
    Occupied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl From<&ReservationInterval> for TimeWindow {
    fn from(reservation: &ReservationInterval) -> Self {
        Self {
            start_time: reservation.start_time,
            end_time: reservation.end_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyVerdict {
    pub state: OccupancyState,
    pub occupied_window: Option<TimeWindow>,
}

impl OccupancyVerdict {
    pub fn available() -> Self {
        Self {
            state: OccupancyState::Available,
            occupied_window: None,
        }
    }

    pub fn occupied(window: TimeWindow) -> Self {
        Self {
            state: OccupancyState::Occupied,
            occupied_window: Some(window),
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.state == OccupancyState::Occupied
    }
}

fn occupies(reservation: &ReservationInterval, now: Moment) -> bool {
    reservation.approved && reservation.is_well_formed() && reservation.covers(now.date, now.time)
}

/// Computes the occupancy of `resource_id` at `now`.
///
/// Reservations belonging to other resources are skipped, so callers may pass
/// either a pre-filtered slice or the whole table. The result depends only on
/// the arguments.
pub fn compute_occupancy<'a, I>(
    resource_id: &ResourceId,
    now: Moment,
    reservations: I,
) -> OccupancyVerdict
where
    I: IntoIterator<Item = &'a ReservationInterval>,
{
    reservations
        .into_iter()
        .filter(|reservation| &reservation.resource_id == resource_id)
        .filter(|reservation| occupies(reservation, now))
        .map(TimeWindow::from)
        .min()
        .map(OccupancyVerdict::occupied)
        .unwrap_or_else(OccupancyVerdict::available)
}

/// Computes verdicts for every resource in `resource_ids` with a single pass
/// over `reservations`. Resources with no matching reservation are reported
/// as available; reservations for resources not listed are ignored.
pub fn occupancy_by_resource<'a, R, I>(
    resource_ids: R,
    now: Moment,
    reservations: I,
) -> BTreeMap<ResourceId, OccupancyVerdict>
where
    R: IntoIterator<Item = &'a ResourceId>,
    I: IntoIterator<Item = &'a ReservationInterval>,
{
    let mut windows: BTreeMap<ResourceId, Option<TimeWindow>> = resource_ids
        .into_iter()
        .map(|id| (id.clone(), None))
        .collect();

    for reservation in reservations {
        if !occupies(reservation, now) {
            continue;
        }
        if let Some(current) = windows.get_mut(&reservation.resource_id) {
            let window = TimeWindow::from(reservation);
            if current.map_or(true, |existing| window < existing) {
                *current = Some(window);
            }
        }
    }

    windows
        .into_iter()
        .map(|(id, window)| {
            let verdict = window
                .map(OccupancyVerdict::occupied)
                .unwrap_or_else(OccupancyVerdict::available);
            (id, verdict)
        })
        .collect()
}
