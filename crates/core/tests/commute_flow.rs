use std::fs;

use approx::assert_relative_eq;
use chrono::NaiveDate;

use commute_core::ledger::profile::Preferences;
use commute_core::transit::{
    ArrivalEstimator, Coordinate, FixedClock, Frequency, Line, LineIdentifier, LineNumber, PlannerConfig,
    RoutePlanner, ServiceWindow, StaticCatalog, Stop,
};
use commute_core::{FileStore, StorageKey, TripLedger};

fn clock() -> FixedClock {
    FixedClock(
        NaiveDate::from_ymd_opt(2025, 3, 12)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap(),
    )
}

fn catalog() -> StaticCatalog {
    StaticCatalog::from_lines(vec![Line {
        id: LineIdentifier::new("13"),
        display_number: LineNumber::new("13"),
        name: "Centro - Ospedale".into(),
        color: "#E53935".into(),
        frequency: Frequency::new(10, 10),
        service_window: ServiceWindow::new(330, 1410),
        stops: vec![
            Stop::new("Piazza Maggiore", Coordinate { lat: 44.4938, lng: 11.3430 }),
            Stop::new("Ospedale", Coordinate { lat: 44.5038, lng: 11.3430 }),
        ],
    }])
    .unwrap()
}

#[test]
fn test_plan_then_record() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog();

    let ledger = TripLedger::with_clock(FileStore::new(dir.path()), clock());
    let preferences = ledger.preferences().unwrap();
    assert_eq!(preferences, Preferences::default());

    let planner = RoutePlanner::new(PlannerConfig {
        max_walk_meters: preferences.max_walk_meters,
        ..PlannerConfig::default()
    })
    .unwrap();
    let mut estimator = ArrivalEstimator::seeded(3, clock());

    let routes = planner
        .plan_route(
            &catalog,
            Coordinate { lat: 44.4939, lng: 11.3431 },
            Coordinate { lat: 44.5037, lng: 11.3429 },
            &mut estimator,
        )
        .unwrap();
    assert_eq!(routes.len(), 1);
    let route = &routes[0];
    assert_eq!(route.wait_time_minutes, 10);
    assert_relative_eq!(route.bus_distance_meters, 1111.95, epsilon = 0.1);

    let outcome = ledger
        .record_trip(route.total_distance_meters / 1000.0, route.total_time_minutes)
        .unwrap();
    assert_eq!(outcome.new_badges.len(), 1);
    assert_eq!(outcome.new_badges[0].id, "first_trip");
    assert_eq!(outcome.total_points, 55);

    ledger.save_route("Piazza Maggiore", "Ospedale").unwrap();

    // A fresh ledger over the same directory sees everything
    let reopened = TripLedger::with_clock(FileStore::new(dir.path()), clock());
    assert_eq!(reopened.statistics().unwrap().total_trips, 1);
    assert_eq!(reopened.points().unwrap(), 55);
    assert_eq!(reopened.badges().unwrap().len(), 1);
    assert_eq!(reopened.saved_routes().unwrap()[0].use_count, 1);
    assert!(reopened.recovered_keys().is_empty());
}

#[test]
fn test_corrupt_file_recovers() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("statistics.json"), "{ truncated").unwrap();

    let ledger = TripLedger::with_clock(FileStore::new(dir.path()), clock());
    assert_eq!(ledger.statistics().unwrap().total_trips, 0);
    assert_eq!(ledger.recovered_keys(), vec![StorageKey::Statistics]);

    // Other documents are unaffected
    assert_eq!(ledger.points().unwrap(), 0);

    ledger.record_trip(1.0, 5.0).unwrap();
    assert!(ledger.recovered_keys().is_empty());
    let blob = fs::read_to_string(dir.path().join("statistics.json")).unwrap();
    assert!(blob.contains("\"total_trips\":1"));
}
