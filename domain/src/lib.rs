//! Availability domain for bookable resources (rooms and projectors).
//!
//! Everything in this crate is a read-only projection over reservation data
//! supplied by the storage layer. Dates and times are local and naive: "today"
//! and "now" come from the local wall clock and are compared component-wise,
//! never normalized to UTC, so occupancy near midnight matches what a person
//! standing in the building would expect.

pub mod availability;
pub mod clock;
pub mod occupancy;
pub mod reservation;

pub use availability::AvailabilityService;
pub use clock::{FixedClock, IntervalClock, LocalClock, Moment};
pub use occupancy::{
    compute_occupancy, occupancy_by_resource, OccupancyState, OccupancyVerdict, TimeWindow,
};
pub use reservation::{ReservationInterval, ResourceId};
