//! Badge rules.
//!
//! Rules are a fixed table of thresholds checked against a snapshot of the
//! ledger after every change. A badge that has been earned is never looked
//! at again.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::ledger::stats::TripStatistics;

/// Points for every completed trip.
pub const TRIP_COMPLETED_POINTS: u64 = 5;

/// The state a rule is evaluated against.
#[derive(Clone, Copy, Debug)]
pub struct RuleContext<'a> {
    pub statistics: &'a TripStatistics,
    pub points: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Requirement {
    TotalTrips(u32),
    TotalDistanceKm(f64),
    Co2SavedKg(f64),
    Points(u64),
}

impl Requirement {
    pub fn is_met(&self, context: &RuleContext<'_>) -> bool {
        let stats = context.statistics;
        match *self {
            Requirement::TotalTrips(n) => stats.total_trips >= n,
            Requirement::TotalDistanceKm(km) => stats.total_distance_km >= km,
            Requirement::Co2SavedKg(kg) => stats.co2_saved_kg >= kg,
            Requirement::Points(points) => context.points >= points,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BadgeRule {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub points: u64,
    pub requirement: Requirement,
}

impl BadgeRule {
    pub fn award(&self, at: NaiveDateTime) -> Badge {
        Badge {
            id: self.id.to_owned(),
            name: self.name.to_owned(),
            icon: self.icon.to_owned(),
            points_awarded: self.points,
            earned_at: at,
        }
    }
}

pub const BADGE_RULES: &[BadgeRule] = &[
    BadgeRule {
        id: "first_trip",
        name: "First Trip",
        icon: "🚌",
        points: 50,
        requirement: Requirement::TotalTrips(1),
    },
    BadgeRule {
        id: "eco_warrior",
        name: "Eco Warrior",
        icon: "🌱",
        points: 100,
        requirement: Requirement::Co2SavedKg(10.0),
    },
    BadgeRule {
        id: "regular",
        name: "Regular",
        icon: "⭐",
        points: 150,
        requirement: Requirement::TotalTrips(10),
    },
    BadgeRule {
        id: "explorer",
        name: "Explorer",
        icon: "🗺️",
        points: 200,
        requirement: Requirement::TotalDistanceKm(50.0),
    },
    BadgeRule {
        id: "veteran",
        name: "Veteran",
        icon: "🏆",
        points: 500,
        requirement: Requirement::TotalTrips(50),
    },
    BadgeRule {
        id: "planet_saver",
        name: "Planet Saver",
        icon: "🌍",
        points: 1000,
        requirement: Requirement::Co2SavedKg(100.0),
    },
];

/// An earned achievement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub points_awarded: u64,
    pub earned_at: NaiveDateTime,
}

/// Rules from `rules` that now qualify and are not in `earned`, in table
/// order.
pub fn newly_qualified<'r>(
    rules: &'r [BadgeRule],
    earned: &[Badge],
    context: &RuleContext<'_>,
) -> Vec<&'r BadgeRule> {
    rules
        .iter()
        .filter(|rule| !earned.iter().any(|badge| badge.id == rule.id))
        .filter(|rule| rule.requirement.is_met(context))
        .collect()
}
