//! Trip ledger: statistics, points, badges, favorites and saved routes.
//!
//! Every operation loads the documents it needs from the store, mutates
//! them, and writes them back whole. Nothing is cached between calls, so
//! two ledgers over one store see each other's writes. Concurrent writers
//! are not coordinated.
//!
//! A document that fails to parse is replaced by its default, logged, and
//! listed in [`TripLedger::recovered_keys`]. The unreadable blob is left as
//! is until the next write of that document replaces it, which also takes
//! the key off the list.

pub mod badges;
pub mod favorites;
pub mod profile;
pub mod stats;

use std::collections::BTreeSet;
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

use commute_transit::{Clock, LineIdentifier, Stop, SystemClock};

use crate::error::{CoreError, Result};
use crate::storage::{Decoded, KeyValueStore, StorageKey, decode, encode};

use badges::{BADGE_RULES, Badge, BadgeRule, RuleContext, TRIP_COMPLETED_POINTS, newly_qualified};
use favorites::{Favorites, SavedRoute, sort_by_use, touch_route};
use profile::{Preferences, Profile};
use stats::TripStatistics;

/// What a recorded trip changed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TripOutcome {
    pub statistics: TripStatistics,
    pub points_earned: u64,
    pub new_badges: Vec<Badge>,
    pub total_points: u64,
}

pub struct TripLedger<S, C = SystemClock> {
    store: S,
    clock: C,
    rules: &'static [BadgeRule],
    recovered: Mutex<BTreeSet<StorageKey>>,
}

impl<S: KeyValueStore> TripLedger<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> TripLedger<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            rules: BADGE_RULES,
            recovered: Mutex::new(BTreeSet::new()),
        }
    }

    /// Replace the badge table.
    pub fn with_rules(mut self, rules: &'static [BadgeRule]) -> Self {
        self.rules = rules;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Documents that were unreadable when last read and have not been
    /// written since.
    pub fn recovered_keys(&self) -> Vec<StorageKey> {
        self.recovered_set().iter().copied().collect()
    }

    fn recovered_set(&self) -> std::sync::MutexGuard<'_, BTreeSet<StorageKey>> {
        self.recovered.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load<T: DeserializeOwned + Default>(&self, key: StorageKey) -> Result<T> {
        match decode(self.store.load(key)?) {
            Decoded::Missing => Ok(T::default()),
            Decoded::Found(value) => Ok(value),
            Decoded::Corrupt(reason) => {
                tracing::warn!(%key, %reason, "stored document is unreadable, using defaults");
                self.recovered_set().insert(key);
                Ok(T::default())
            }
        }
    }

    fn persist<T: Serialize>(&self, key: StorageKey, value: &T) -> Result<()> {
        let blob = encode(key, value)?;
        self.store.save(key, &blob)?;
        self.recovered_set().remove(&key);
        Ok(())
    }

    // ---- Statistics ----

    pub fn statistics(&self) -> Result<TripStatistics> {
        self.load(StorageKey::Statistics)
    }

    /// Record a completed trip, award the trip points and any badges it
    /// unlocks.
    pub fn record_trip(&self, distance_km: f64, duration_minutes: f64) -> Result<TripOutcome> {
        for (name, value) in [("distance", distance_km), ("duration", duration_minutes)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CoreError::InvalidInput(format!(
                    "trip {name} must be a non-negative number, got {value}"
                )));
            }
        }

        let now = self.clock.now();

        let mut statistics = self.statistics()?;
        statistics.record(distance_km, duration_minutes, now);
        self.persist(StorageKey::Statistics, &statistics)?;

        tracing::info!(
            distance_km,
            duration_minutes,
            total_trips = statistics.total_trips,
            "recorded trip"
        );

        let mut profile: Profile = self.load(StorageKey::Profile)?;
        let before = profile.points;
        profile.points = profile.points.saturating_add(TRIP_COMPLETED_POINTS);
        let new_badges = self.award_badges(&mut profile, &statistics);
        self.persist(StorageKey::Profile, &profile)?;

        Ok(TripOutcome {
            statistics,
            points_earned: profile.points - before,
            new_badges,
            total_points: profile.points,
        })
    }

    /// Forget all statistics. Points and badges are kept.
    pub fn clear_statistics(&self) -> Result<()> {
        self.store.remove(StorageKey::Statistics)?;
        self.recovered_set().remove(&StorageKey::Statistics);
        Ok(())
    }

    // ---- Points and badges ----

    pub fn points(&self) -> Result<u64> {
        Ok(self.load::<Profile>(StorageKey::Profile)?.points)
    }

    pub fn badges(&self) -> Result<Vec<Badge>> {
        Ok(self.load::<Profile>(StorageKey::Profile)?.badges)
    }

    /// Add points unconditionally, then re-check badges. Returns badges
    /// this unlocked.
    pub fn add_points(&self, amount: u64) -> Result<Vec<Badge>> {
        let statistics = self.statistics()?;
        let mut profile: Profile = self.load(StorageKey::Profile)?;

        profile.points = profile.points.saturating_add(amount);
        let new_badges = self.award_badges(&mut profile, &statistics);
        self.persist(StorageKey::Profile, &profile)?;

        Ok(new_badges)
    }

    /// Award every badge the profile now qualifies for, with its points.
    ///
    /// Badge points can themselves unlock points-based badges, so the table
    /// is re-checked until nothing new qualifies.
    fn award_badges(&self, profile: &mut Profile, statistics: &TripStatistics) -> Vec<Badge> {
        let now = self.clock.now();
        let mut awarded = Vec::new();

        loop {
            let context = RuleContext {
                statistics,
                points: profile.points,
            };
            let qualified = newly_qualified(self.rules, &profile.badges, &context);
            if qualified.is_empty() {
                break;
            }

            for rule in qualified {
                let badge = rule.award(now);
                tracing::info!(badge = rule.id, points = rule.points, "badge earned");

                profile.points = profile.points.saturating_add(rule.points);
                profile.badges.push(badge.clone());
                awarded.push(badge);
            }
        }

        awarded
    }

    // ---- Preferences ----

    pub fn preferences(&self) -> Result<Preferences> {
        Ok(self.load::<Profile>(StorageKey::Profile)?.preferences)
    }

    pub fn set_preferences(&self, preferences: Preferences) -> Result<()> {
        preferences.validate()?;

        let mut profile: Profile = self.load(StorageKey::Profile)?;
        profile.preferences = preferences;
        self.persist(StorageKey::Profile, &profile)
    }

    // ---- Favorites ----

    pub fn favorites(&self) -> Result<Favorites> {
        self.load(StorageKey::Favorites)
    }

    /// Returns whether the stop is a favorite afterwards.
    pub fn toggle_favorite_stop(&self, stop: Stop) -> Result<bool> {
        let mut favorites = self.favorites()?;
        let now_favorite = favorites.toggle_stop(stop);
        self.persist(StorageKey::Favorites, &favorites)?;
        Ok(now_favorite)
    }

    /// Returns whether the line is a favorite afterwards.
    pub fn toggle_favorite_line(&self, line: LineIdentifier) -> Result<bool> {
        let mut favorites = self.favorites()?;
        let now_favorite = favorites.toggle_line(line);
        self.persist(StorageKey::Favorites, &favorites)?;
        Ok(now_favorite)
    }

    // ---- Saved routes ----

    /// Most used first.
    pub fn saved_routes(&self) -> Result<Vec<SavedRoute>> {
        let mut routes: Vec<SavedRoute> = self.load(StorageKey::SavedRoutes)?;
        sort_by_use(&mut routes);
        Ok(routes)
    }

    pub fn save_route(&self, from: &str, to: &str) -> Result<SavedRoute> {
        let mut routes: Vec<SavedRoute> = self.load(StorageKey::SavedRoutes)?;
        let route = touch_route(&mut routes, from, to, self.clock.now());
        self.persist(StorageKey::SavedRoutes, &routes)?;
        Ok(route)
    }

    /// Returns whether a route was removed.
    pub fn remove_saved_route(&self, from: &str, to: &str) -> Result<bool> {
        let mut routes: Vec<SavedRoute> = self.load(StorageKey::SavedRoutes)?;
        let before = routes.len();
        routes.retain(|r| !(r.from == from && r.to == to));

        if routes.len() == before {
            return Ok(false);
        }
        self.persist(StorageKey::SavedRoutes, &routes)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use approx::assert_relative_eq;
    use badges::Requirement;
    use chrono::{NaiveDate, NaiveDateTime};
    use commute_transit::{Coordinate, FixedClock};

    fn clock() -> FixedClock {
        FixedClock(at(8))
    }

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 7)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn ledger() -> TripLedger<MemoryStore, FixedClock> {
        TripLedger::with_clock(MemoryStore::new(), clock())
    }

    fn badge_ids(badges: &[Badge]) -> Vec<&str> {
        badges.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_record_trip_is_additive() {
        let ledger = ledger();
        ledger.record_trip(10.0, 20.0).unwrap();
        let outcome = ledger.record_trip(5.0, 10.0).unwrap();

        let stats = ledger.statistics().unwrap();
        assert_eq!(stats, outcome.statistics);
        assert_eq!(stats.total_trips, 2);
        assert_relative_eq!(stats.total_distance_km, 15.0);
        assert_relative_eq!(stats.total_time_minutes, 30.0);
        assert_relative_eq!(stats.co2_saved_kg, 1.2, epsilon = 1e-9);
        assert_eq!(stats.monthly["2024-10"].trips, 2);
        assert_eq!(stats.last_updated, Some(at(8)));
    }

    #[test]
    fn test_first_trip_badge_once() {
        let ledger = ledger();
        assert!(ledger.badges().unwrap().is_empty());

        let first = ledger.record_trip(2.0, 8.0).unwrap();
        assert_eq!(badge_ids(&first.new_badges), vec!["first_trip"]);
        assert_eq!(first.points_earned, 5 + 50);
        assert_eq!(first.total_points, 55);

        let second = ledger.record_trip(2.0, 8.0).unwrap();
        assert!(second.new_badges.is_empty());
        assert_eq!(second.points_earned, 5);

        // Re-evaluating through add_points does not re-award
        assert!(ledger.add_points(0).unwrap().is_empty());
        assert_eq!(badge_ids(&ledger.badges().unwrap()), vec!["first_trip"]);
        assert_eq!(ledger.points().unwrap(), 60);
    }

    #[test]
    fn test_distance_badges() {
        let ledger = ledger();
        let outcome = ledger.record_trip(130.0, 240.0).unwrap();

        assert_eq!(
            badge_ids(&outcome.new_badges),
            vec!["first_trip", "eco_warrior", "explorer"]
        );
        assert_eq!(outcome.total_points, 5 + 50 + 100 + 200);
    }

    #[test]
    fn test_rejects_bad_trip_values() {
        let ledger = ledger();
        assert!(matches!(ledger.record_trip(-1.0, 5.0), Err(CoreError::InvalidInput(_))));
        assert!(ledger.record_trip(1.0, f64::NAN).is_err());
        assert_eq!(ledger.statistics().unwrap().total_trips, 0);
        assert_eq!(ledger.points().unwrap(), 0);
    }

    #[test]
    fn test_points_based_badges() {
        static RULES: &[BadgeRule] = &[
            BadgeRule {
                id: "saver",
                name: "Saver",
                icon: "💰",
                points: 100,
                requirement: Requirement::Points(100),
            },
            BadgeRule {
                id: "hoarder",
                name: "Hoarder",
                icon: "🏦",
                points: 0,
                requirement: Requirement::Points(200),
            },
        ];

        let ledger = ledger().with_rules(RULES);
        assert!(ledger.add_points(99).unwrap().is_empty());

        // Saver's own points push the total past the hoarder threshold
        let unlocked = ledger.add_points(1).unwrap();
        assert_eq!(badge_ids(&unlocked), vec!["saver", "hoarder"]);
        assert_eq!(ledger.points().unwrap(), 200);
    }

    #[test]
    fn test_corrupt_statistics_fail_closed() {
        let store = MemoryStore::new().with(StorageKey::Statistics, "{not json");
        let ledger = TripLedger::with_clock(store, clock());

        assert_eq!(ledger.statistics().unwrap(), TripStatistics::default());
        assert_eq!(ledger.recovered_keys(), vec![StorageKey::Statistics]);

        // Reading never writes the blob back
        assert_eq!(
            ledger.store().load(StorageKey::Statistics).unwrap().as_deref(),
            Some("{not json")
        );

        // Profile was never stored, so only statistics is listed
        ledger.add_points(1).unwrap();
        assert_eq!(ledger.recovered_keys(), vec![StorageKey::Statistics]);

        let outcome = ledger.record_trip(3.0, 12.0).unwrap();
        assert_eq!(outcome.statistics.total_trips, 1);

        // The good document replaced the bad one
        assert!(ledger.recovered_keys().is_empty());
        assert_eq!(ledger.statistics().unwrap().total_trips, 1);
    }

    #[test]
    fn test_clear_statistics_keeps_badges() {
        let ledger = ledger();
        ledger.record_trip(4.0, 15.0).unwrap();
        ledger.clear_statistics().unwrap();

        assert_eq!(ledger.statistics().unwrap(), TripStatistics::default());
        assert_eq!(badge_ids(&ledger.badges().unwrap()), vec!["first_trip"]);

        // first_trip is not awarded again after the reset
        assert!(ledger.record_trip(1.0, 5.0).unwrap().new_badges.is_empty());
    }

    #[test]
    fn test_preferences() {
        let ledger = ledger();
        assert_eq!(ledger.preferences().unwrap(), Preferences::default());

        let prefs = Preferences {
            search_radius_meters: 800.0,
            ..Preferences::default()
        };
        ledger.set_preferences(prefs.clone()).unwrap();
        assert_eq!(ledger.preferences().unwrap(), prefs);

        let invalid = Preferences {
            max_walk_meters: -3.0,
            ..Preferences::default()
        };
        assert!(ledger.set_preferences(invalid).is_err());
        assert_eq!(ledger.preferences().unwrap(), prefs);
    }

    #[test]
    fn test_favorites_persist() {
        let ledger = ledger();
        let stop = Stop::new("Lingotto", Coordinate { lat: 45.03, lng: 7.66 });

        assert!(ledger.toggle_favorite_stop(stop.clone()).unwrap());
        assert!(ledger.toggle_favorite_line(LineIdentifier::new("18")).unwrap());

        let favorites = ledger.favorites().unwrap();
        assert_eq!(favorites.stops, vec![stop.clone()]);
        assert_eq!(favorites.lines, vec![LineIdentifier::new("18")]);

        assert!(!ledger.toggle_favorite_stop(stop).unwrap());
        assert!(ledger.favorites().unwrap().stops.is_empty());
    }

    #[test]
    fn test_saved_routes() {
        let ledger = ledger();
        ledger.save_route("Home", "Office").unwrap();
        ledger.save_route("Home", "Stadium").unwrap();
        let repeated = ledger.save_route("Home", "Office").unwrap();
        assert_eq!(repeated.use_count, 2);

        let routes = ledger.saved_routes().unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].to, "Office");

        assert!(ledger.remove_saved_route("Home", "Stadium").unwrap());
        assert!(!ledger.remove_saved_route("Home", "Stadium").unwrap());
        assert_eq!(ledger.saved_routes().unwrap().len(), 1);
    }
}
