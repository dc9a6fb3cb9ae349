//! Favorite stops and lines, and frequently used routes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use commute_transit::{LineIdentifier, Stop};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Favorites {
    pub stops: Vec<Stop>,
    pub lines: Vec<LineIdentifier>,
}

impl Favorites {
    /// Add the stop, or remove it if it is already a favorite. Stops are
    /// matched by coordinate. Returns whether the stop is now a favorite.
    pub fn toggle_stop(&mut self, stop: Stop) -> bool {
        let key = stop.key();
        match self.stops.iter().position(|s| s.key() == key) {
            Some(index) => {
                self.stops.remove(index);
                false
            }
            None => {
                self.stops.push(stop);
                true
            }
        }
    }

    /// Same as [`toggle_stop`](Self::toggle_stop), for lines.
    pub fn toggle_line(&mut self, line: LineIdentifier) -> bool {
        match self.lines.iter().position(|l| *l == line) {
            Some(index) => {
                self.lines.remove(index);
                false
            }
            None => {
                self.lines.push(line);
                true
            }
        }
    }
}

/// A route the rider searched for, keyed by the exact `(from, to)` pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedRoute {
    pub from: String,
    pub to: String,
    pub use_count: u32,
    pub created_at: NaiveDateTime,
    pub last_used: NaiveDateTime,
}

/// Record a use of `from` → `to`. A repeat bumps the counter and the
/// last-used time instead of adding a second entry.
pub fn touch_route(routes: &mut Vec<SavedRoute>, from: &str, to: &str, now: NaiveDateTime) -> SavedRoute {
    if let Some(route) = routes.iter_mut().find(|r| r.from == from && r.to == to) {
        route.use_count += 1;
        route.last_used = now;
        return route.clone();
    }

    let route = SavedRoute {
        from: from.to_owned(),
        to: to.to_owned(),
        use_count: 1,
        created_at: now,
        last_used: now,
    };
    routes.push(route.clone());
    route
}

/// Most used first, then most recent.
pub fn sort_by_use(routes: &mut [SavedRoute]) {
    routes.sort_by(|a, b| {
        b.use_count
            .cmp(&a.use_count)
            .then_with(|| b.last_used.cmp(&a.last_used))
    });
}
