use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::city::CityName;
use crate::config::Config;
use crate::data::{DetailedReport, WeatherSnapshot, MAX_FORECAST_POINTS, MAX_HOURLY_POINTS};
use crate::error::WeatherError;
use crate::fetch::OpenWeather;
use crate::state::DashboardState;

/// Merges the provider's endpoints into view models and owns the dashboard state.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct WeatherAggregator {
    provider: OpenWeather,
    state: Arc<Mutex<DashboardState>>,
}

impl WeatherAggregator {
    pub fn new(config: Config) -> Self {
        WeatherAggregator {
            provider: OpenWeather::new(config),
            state: Arc::new(Mutex::new(DashboardState::default())),
        }
    }

    /// A copy of the current dashboard state.
    pub fn state(&self) -> DashboardState {
        self.state.lock().clone()
    }

    /// Replace the state with `f(old)` in one step. Never held across an await.
    fn transition(&self, f: impl FnOnce(DashboardState) -> DashboardState) {
        let mut guard = self.state.lock();
        let old = std::mem::take(&mut *guard);
        *guard = f(old);
    }

    /// Handle a fetch failure: anything past validation invalidates the displayed result.
    fn fail(&self, err: WeatherError) -> WeatherError {
        if !err.is_validation() {
            warn!(error = %err, "weather fetch failed");
            self.transition(DashboardState::without_view);
        }
        err
    }

    /// Current conditions for `city`.
    ///
    /// Input is validated before any request is made.
    #[instrument(skip(self))]
    pub async fn fetch_current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        let city = CityName::parse(city).map_err(WeatherError::from)?;
        self.provider
            .current_by_name(&city)
            .await
            .map_err(|e| self.fail(e))
    }

    /// Full search: current conditions, then forecast, air quality and detailed conditions
    /// fetched concurrently.
    ///
    /// All three follow-up requests are awaited even if one fails early; any failure fails
    /// the whole search and nothing partial is kept. On success the report becomes the
    /// displayed view, the forecast is cached and the city goes to the front of the history.
    #[instrument(skip(self))]
    pub async fn fetch_detailed(&self, city: &str) -> Result<DetailedReport, WeatherError> {
        let city = CityName::parse(city).map_err(WeatherError::from)?;
        match self.fetch_report(&city).await {
            Ok(report) => {
                info!(city = %city, "search complete");
                self.transition(|s| s.with_search(city.as_str(), report.clone()));
                Ok(report)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn fetch_report(&self, city: &CityName) -> Result<DetailedReport, WeatherError> {
        let snapshot = self.provider.current_by_name(city).await?;
        let coord = snapshot.coord;

        let (forecast, air_quality, detailed) = tokio::join!(
            self.provider.forecast_by_name(city.as_str()),
            self.provider.air_quality(coord),
            self.provider.detailed_conditions(coord),
        );
        let mut forecast = forecast?;
        let air_quality = air_quality?;
        let detailed = detailed?;

        forecast.truncate(MAX_FORECAST_POINTS);
        let mut hourly = detailed.hourly;
        hourly.truncate(MAX_HOURLY_POINTS);

        Ok(DetailedReport {
            snapshot,
            forecast,
            hourly,
            air_quality,
            uv_index: detailed.uv_index,
            alerts: detailed.alerts,
        })
    }

    /// Pin a city to the dashboard.
    ///
    /// Does nothing if a city with the same name (ignoring case) is already tracked.
    /// Otherwise the city is added and its forecast is refreshed by a detached task; the
    /// handle is returned but need not be awaited. A failed refresh is logged and dropped,
    /// leaving no cache entry for the city.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_tracked(&self, snapshot: WeatherSnapshot) -> Option<JoinHandle<()>> {
        let name = snapshot.name.clone();
        let mut added = false;
        self.transition(|s| {
            added = !s.tracked.contains(&name);
            s.tracking(snapshot)
        });
        if !added {
            debug!(city = %name, "already tracked");
            return None;
        }
        info!(city = %name, "tracking city");

        let this = self.clone();
        Some(tokio::spawn(async move {
            this.refresh_forecast(&name).await;
        }))
    }

    async fn refresh_forecast(&self, city: &str) {
        match self.provider.forecast_by_name(city).await {
            Ok(mut points) => {
                points.truncate(MAX_FORECAST_POINTS);
                self.transition(|s| s.with_forecast(city, points));
                debug!(city, "forecast refreshed");
            }
            Err(e) => debug!(city, error = %e, "background forecast refresh failed"),
        }
    }

    /// Unpin a city by exact name. Unknown names are ignored.
    pub fn remove_tracked(&self, city: &str) {
        info!(city, "untracking city");
        self.transition(|s| s.untracking(city));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::snapshot;

    fn aggregator() -> WeatherAggregator {
        // No credential: any request that gets past validation fails without I/O.
        WeatherAggregator::new(Config::new(None))
    }

    #[tokio::test]
    async fn validation_error_leaves_view_intact() {
        let agg = aggregator();
        let report = DetailedReport {
            snapshot: snapshot("Oslo"),
            forecast: vec![],
            hourly: vec![],
            air_quality: None,
            uv_index: None,
            alerts: vec![],
        };
        agg.transition(|s| s.with_search("Oslo", report));

        let err = agg.fetch_detailed("L0ndon!").await.unwrap_err();
        assert!(err.is_validation());
        let state = agg.state();
        assert!(state.view.is_some());
        assert_eq!(state.history.entries(), ["Oslo"]);
    }

    #[tokio::test]
    async fn configuration_error_clears_view() {
        let agg = aggregator();
        let report = DetailedReport {
            snapshot: snapshot("Oslo"),
            forecast: vec![],
            hourly: vec![],
            air_quality: None,
            uv_index: None,
            alerts: vec![],
        };
        agg.transition(|s| s.with_search("Oslo", report));

        let err = agg.fetch_current("London").await.unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));
        assert!(agg.state().view.is_none());
    }

    #[tokio::test]
    async fn add_tracked_twice_spawns_once() {
        let agg = aggregator();
        let first = agg.add_tracked(snapshot("Paris"));
        let second = agg.add_tracked(snapshot("paris"));
        assert!(first.is_some());
        assert!(second.is_none());

        // The refresh fails for lack of a credential; that must not surface.
        first.unwrap().await.unwrap();
        let state = agg.state();
        assert_eq!(state.tracked.len(), 1);
        assert!(state.forecasts.get("Paris").is_none());
    }

    #[tokio::test]
    async fn remove_absent_is_noop() {
        let agg = aggregator();
        agg.remove_tracked("Nowhere");
        assert!(agg.state().tracked.is_empty());
    }
}
