use crate::clock::{IntervalClock, Moment};
use crate::occupancy::{compute_occupancy, occupancy_by_resource, OccupancyVerdict};
use crate::reservation::{ReservationInterval, ResourceId};
use log::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Answers "what is the state of this resource right now" for the query layer.
///
/// The clock is read exactly once per call so that every verdict in a single
/// answer is computed against the same moment.
#[derive(Clone)]
pub struct AvailabilityService {
    clock: Arc<dyn IntervalClock>,
}

impl AvailabilityService {
    pub fn new(clock: Arc<dyn IntervalClock>) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> Moment {
        self.clock.now()
    }

    pub fn current_occupancy(
        &self,
        resource_id: &ResourceId,
        reservations: &[ReservationInterval],
    ) -> OccupancyVerdict {
        let now = self.clock.now();
        let verdict = compute_occupancy(resource_id, now, reservations);
        trace!("Occupancy of {resource_id} at {now}: {:?}", verdict.state);
        verdict
    }

    pub fn current_occupancy_by_resource(
        &self,
        resource_ids: &[ResourceId],
        reservations: &[ReservationInterval],
    ) -> BTreeMap<ResourceId, OccupancyVerdict> {
        let now = self.clock.now();
        debug!(
            "Computing occupancy for {} resource(s) against {} reservation(s) at {now}",
            resource_ids.len(),
            reservations.len()
        );
        occupancy_by_resource(resource_ids, now, reservations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::occupancy::OccupancyState;
    use chrono::{NaiveDate, NaiveTime};

    fn service_at(hour: u32, minute: u32) -> AvailabilityService {
        let moment = Moment::new(
            NaiveDate::from_ymd_opt(2024, 11, 4).unwrap(),
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        );
        AvailabilityService::new(Arc::new(FixedClock(moment)))
    }

    fn morning_booking(resource: &str) -> ReservationInterval {
        ReservationInterval {
            resource_id: resource.into(),
            date: NaiveDate::from_ymd_opt(2024, 11, 4).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            approved: true,
        }
    }

    #[test]
    fn test_current_occupancy_uses_injected_clock() {
        let reservations = vec![morning_booking("room-1")];
        let room = ResourceId::from("room-1");

        assert_eq!(
            service_at(10, 0).current_occupancy(&room, &reservations).state,
            OccupancyState::Occupied
        );
        assert_eq!(
            service_at(11, 0).current_occupancy(&room, &reservations).state,
            OccupancyState::Available
        );
    }

    #[test]
    fn test_current_occupancy_by_resource_covers_all_requested() {
        let reservations = vec![morning_booking("room-1"), morning_booking("projector-3")];
        let resources = vec![ResourceId::from("room-1"), ResourceId::from("room-2")];

        let verdicts = service_at(9, 45).current_occupancy_by_resource(&resources, &reservations);

        assert_eq!(verdicts.len(), 2);
        assert!(verdicts[&resources[0]].is_occupied());
        assert!(!verdicts[&resources[1]].is_occupied());
    }
}
