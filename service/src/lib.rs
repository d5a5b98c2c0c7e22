use config::Config;
use domain::{AvailabilityService, IntervalClock, LocalClock};
use events::EventPublisher;
use log::info;
use sse::domain_event_handler::SseDomainEventHandler;
use sse::Manager;
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state shared by every request handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sse_manager: Arc<Manager>,
    pub event_publisher: EventPublisher,
    pub availability: AvailabilityService,
}

impl AppState {
    /// Builds the broker from `app_config` and wires it up as the handler for
    /// domain events. Availability is computed against the local wall clock.
    pub fn new(app_config: Config) -> Self {
        Self::with_clock(app_config, Arc::new(LocalClock))
    }

    pub fn with_clock(app_config: Config, clock: Arc<dyn IntervalClock>) -> Self {
        let sse_manager = Arc::new(Manager::new(app_config.broker_config()));
        let event_publisher = EventPublisher::new().with_handler(Arc::new(
            SseDomainEventHandler::new(Arc::clone(&sse_manager)),
        ));
        info!("Application state initialized ({} environment)", app_config.runtime_env());

        Self {
            config: app_config,
            sse_manager,
            event_publisher,
            availability: AvailabilityService::new(clock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use clap::Parser;
    use domain::{FixedClock, Moment, OccupancyState, ReservationInterval, ResourceId};
    use events::{Action, DomainEvent};
    use sse::{Admission, SseTransport};

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn app_state_at(hour: u32, minute: u32) -> AppState {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let clock = FixedClock(Moment::new(date, time(hour, minute)));
        AppState::with_clock(Config::parse_from(["live_availability_rs"]), Arc::new(clock))
    }

    fn reservation(start: NaiveTime, end: NaiveTime) -> ReservationInterval {
        ReservationInterval {
            resource_id: ResourceId::new("room-1"),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            start_time: start,
            end_time: end,
            approved: true,
        }
    }

    #[test]
    fn test_availability_uses_the_injected_clock() {
        let reservations = [reservation(time(9, 0), time(10, 30))];
        let room = ResourceId::new("room-1");

        let during = app_state_at(10, 0)
            .availability
            .current_occupancy(&room, &reservations);
        let at_end = app_state_at(10, 30)
            .availability
            .current_occupancy(&room, &reservations);

        assert_eq!(during.state, OccupancyState::Occupied);
        assert_eq!(at_end.state, OccupancyState::Available);
    }

    #[tokio::test]
    async fn test_domain_events_reach_broker_subscribers() {
        let app_state = app_state_at(10, 0);
        let (transport, mut rx) = SseTransport::channel(4);
        let admission = app_state.sse_manager.try_register(Arc::new(transport));
        assert!(matches!(admission, Admission::Accepted(_)));

        app_state
            .event_publisher
            .publish(DomainEvent::RoomChanged {
                room_id: "room-1".to_string(),
                action: Action::Status,
            })
            .await;

        assert!(rx.recv().await.is_some());
    }
}
