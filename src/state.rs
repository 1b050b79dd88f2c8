//! Dashboard state: tracked cities, recent searches, per-city forecasts and the
//! currently displayed search result.
//!
//! Every transition takes the old value and returns the new one, so the owner can swap
//! the whole state at once and readers never observe a half-applied change.

use std::collections::HashMap;

use crate::data::{DetailedReport, ForecastPoint, WeatherSnapshot};

/// Maximum number of entries kept in [`SearchHistory`].
pub const MAX_HISTORY: usize = 5;

/// Cities pinned to the dashboard, in the order they were added.
///
/// No two entries have names that compare equal case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedCities(Vec<WeatherSnapshot>);

impl TrackedCities {
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|s| s.same_city(name))
    }

    /// Append `snapshot` unless a city with the same name (ignoring case) is already present.
    pub fn adding(mut self, snapshot: WeatherSnapshot) -> Self {
        if !self.contains(&snapshot.name) {
            self.0.push(snapshot);
        }
        self
    }

    /// Drop the entry whose name matches exactly. Absent names are ignored.
    pub fn removing(mut self, name: &str) -> Self {
        self.0.retain(|s| s.name != name);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeatherSnapshot> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Recently searched city names, most recent first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHistory(Vec<String>);

impl SearchHistory {
    /// Put `city` at the front, removing an exact earlier occurrence and keeping at most
    /// [`MAX_HISTORY`] entries.
    pub fn recording(self, city: &str) -> Self {
        let entries = std::iter::once(city.to_string())
            .chain(self.0.into_iter().filter(|h| h != city))
            .take(MAX_HISTORY)
            .collect();
        SearchHistory(entries)
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// Entry by position, 0 being the most recent search.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Latest forecast per city name. A new fetch replaces the entry outright.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastCache(HashMap<String, Vec<ForecastPoint>>);

impl ForecastCache {
    pub fn storing(mut self, city: &str, points: Vec<ForecastPoint>) -> Self {
        self.0.insert(city.to_string(), points);
        self
    }

    pub fn evicting(mut self, city: &str) -> Self {
        self.0.remove(city);
        self
    }

    pub fn get(&self, city: &str) -> Option<&[ForecastPoint]> {
        self.0.get(city).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub tracked: TrackedCities,
    pub history: SearchHistory,
    pub forecasts: ForecastCache,
    /// Result of the last successful search, cleared when a fetch fails.
    pub view: Option<DetailedReport>,
}

impl DashboardState {
    pub fn tracking(self, snapshot: WeatherSnapshot) -> Self {
        DashboardState {
            tracked: self.tracked.adding(snapshot),
            ..self
        }
    }

    /// Drop the tracked city with exactly this name, along with its cached forecast.
    pub fn untracking(self, name: &str) -> Self {
        if !self.tracked.iter().any(|s| s.name == name) {
            return self;
        }
        DashboardState {
            tracked: self.tracked.removing(name),
            forecasts: self.forecasts.evicting(name),
            ..self
        }
    }

    /// Cache a refreshed forecast for a tracked city. Ignored if the city is no longer
    /// tracked, e.g. it was removed while the refresh was in flight.
    pub fn with_forecast(self, city: &str, points: Vec<ForecastPoint>) -> Self {
        if !self.tracked.contains(city) {
            return self;
        }
        DashboardState {
            forecasts: self.forecasts.storing(city, points),
            ..self
        }
    }

    /// Record a successful search for `city`: history, forecast cache and displayed view.
    pub fn with_search(self, city: &str, report: DetailedReport) -> Self {
        DashboardState {
            history: self.history.recording(city),
            forecasts: self.forecasts.storing(city, report.forecast.clone()),
            view: Some(report),
            ..self
        }
    }

    /// Forget the displayed search result so it isn't shown next to an error.
    pub fn without_view(self) -> Self {
        DashboardState { view: None, ..self }
    }
}
