use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::city::CityName;
use crate::config::Config;
use crate::data::{
    AirQualitySample, AlertNotice, Condition, Coord, ForecastPoint, HourlyPoint, Pollutants,
    WeatherSnapshot,
};
use crate::error::{ProviderError, WeatherError};

/// Extra conditions available by coordinate: UV index, alerts and an hourly outlook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailedConditions {
    pub uv_index: Option<f64>,
    pub alerts: Vec<AlertNotice>,
    pub hourly: Vec<HourlyPoint>,
}

/// Client for the OpenWeatherMap REST API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct OpenWeather {
    client: reqwest::Client,
    config: Config,
}

#[derive(Serialize)]
struct ByName<'a> {
    q: &'a str,
    units: &'a str,
}

#[derive(Serialize)]
struct ByCoord<'a> {
    lat: f64,
    lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    units: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclude: Option<&'a str>,
}

impl OpenWeather {
    pub fn new(config: Config) -> Self {
        OpenWeather {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Issue a GET request and decode the JSON body, mapping failures to structured causes.
    ///
    /// The credential is checked before anything goes over the wire.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &impl Serialize,
    ) -> Result<T, WeatherError> {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
        }

        let appid = self.config.credential()?;
        let url = format!("{}{}", self.config.base_url(), path);
        debug!(%url, "sending request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("appid", appid)])
            .send()
            .await
            .map_err(ProviderError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(ProviderError::from)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| status.to_string());
            debug!(status = status.as_u16(), %message, "provider returned error");
            let err = match status.as_u16() {
                404 => ProviderError::CityNotFound,
                401 => ProviderError::CredentialInactive,
                code => ProviderError::Status {
                    status: code,
                    message,
                },
            };
            return Err(err.into());
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(e.to_string()).into())
    }

    /// Current conditions for a city, looked up by name.
    #[instrument(skip(self), level = "debug")]
    pub async fn current_by_name(&self, city: &CityName) -> Result<WeatherSnapshot, WeatherError> {
        #[derive(Debug, Deserialize)]
        struct Response {
            name: String,
            coord: Coord,
            weather: Vec<Condition>,
            main: Main,
            #[serde(default)]
            visibility: u32,
            #[serde(default)]
            wind: Wind,
            sys: Sys,
        }

        #[derive(Debug, Deserialize)]
        struct Main {
            temp: f64,
            feels_like: f64,
            temp_min: f64,
            temp_max: f64,
            pressure: u32,
            humidity: u8,
        }

        #[derive(Debug, Default, Deserialize)]
        struct Wind {
            #[serde(default)]
            speed: f64,
            #[serde(default)]
            deg: f64,
        }

        #[derive(Debug, Deserialize)]
        struct Sys {
            #[serde(default)]
            country: String,
            #[serde(default)]
            sunrise: i64,
            #[serde(default)]
            sunset: i64,
        }

        let data: Response = self
            .get(
                "/data/2.5/weather",
                &ByName {
                    q: city.as_str(),
                    units: "metric",
                },
            )
            .await?;

        let condition = data
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("response has no weather condition".into()))?;

        Ok(WeatherSnapshot {
            name: data.name,
            country: data.sys.country,
            coord: data.coord,
            temp: data.main.temp,
            feels_like: data.main.feels_like,
            temp_min: data.main.temp_min,
            temp_max: data.main.temp_max,
            humidity: data.main.humidity,
            pressure: data.main.pressure,
            visibility: data.visibility,
            wind_speed: data.wind.speed,
            wind_deg: data.wind.deg,
            sunrise: data.sys.sunrise,
            sunset: data.sys.sunset,
            condition,
        })
    }

    /// 3-hourly forecast for a city, looked up by name. Returns every slice the provider
    /// sends; callers truncate.
    #[instrument(skip(self), level = "debug")]
    pub async fn forecast_by_name(&self, city: &str) -> Result<Vec<ForecastPoint>, WeatherError> {
        #[derive(Debug, Deserialize)]
        struct Response {
            list: Vec<Slice>,
        }

        #[derive(Debug, Deserialize)]
        struct Slice {
            dt: i64,
            main: Main,
            #[serde(default)]
            weather: Vec<Condition>,
        }

        #[derive(Debug, Deserialize)]
        struct Main {
            temp: f64,
        }

        let data: Response = self
            .get(
                "/data/2.5/forecast",
                &ByName {
                    q: city,
                    units: "metric",
                },
            )
            .await?;

        Ok(data
            .list
            .into_iter()
            .map(|s| ForecastPoint {
                dt: s.dt,
                temp: s.main.temp,
                condition: s.weather.into_iter().next(),
            })
            .collect())
    }

    /// Current air quality at a coordinate. `None` if the provider has no sample.
    #[instrument(skip(self), level = "debug")]
    pub async fn air_quality(
        &self,
        coord: Coord,
    ) -> Result<Option<AirQualitySample>, WeatherError> {
        #[derive(Debug, Deserialize)]
        struct Response {
            #[serde(default)]
            list: Vec<Sample>,
        }

        #[derive(Debug, Deserialize)]
        struct Sample {
            main: Index,
            #[serde(default)]
            components: Pollutants,
        }

        #[derive(Debug, Deserialize)]
        struct Index {
            aqi: u8,
        }

        let data: Response = self
            .get(
                "/data/2.5/air_pollution",
                &ByCoord {
                    lat: coord.lat,
                    lon: coord.lon,
                    units: None,
                    exclude: None,
                },
            )
            .await?;

        Ok(data.list.into_iter().next().map(|s| AirQualitySample {
            aqi: s.main.aqi,
            components: s.components,
        }))
    }

    /// UV index, active alerts and hourly outlook at a coordinate.
    #[instrument(skip(self), level = "debug")]
    pub async fn detailed_conditions(
        &self,
        coord: Coord,
    ) -> Result<DetailedConditions, WeatherError> {
        #[derive(Debug, Deserialize)]
        struct Response {
            current: Option<Current>,
            #[serde(default)]
            hourly: Vec<Hour>,
            #[serde(default)]
            alerts: Vec<Alert>,
        }

        #[derive(Debug, Deserialize)]
        struct Current {
            uvi: Option<f64>,
        }

        #[derive(Debug, Deserialize)]
        struct Hour {
            dt: i64,
            temp: f64,
            #[serde(default)]
            pop: f64,
            #[serde(default)]
            weather: Vec<Condition>,
        }

        #[derive(Debug, Deserialize)]
        struct Alert {
            #[serde(default)]
            sender_name: String,
            event: String,
            #[serde(default)]
            description: String,
            start: i64,
            end: i64,
        }

        let data: Response = self
            .get(
                "/data/3.0/onecall",
                &ByCoord {
                    lat: coord.lat,
                    lon: coord.lon,
                    units: Some("metric"),
                    exclude: Some("minutely"),
                },
            )
            .await?;

        Ok(DetailedConditions {
            uv_index: data.current.and_then(|c| c.uvi),
            alerts: data
                .alerts
                .into_iter()
                .map(|a| AlertNotice {
                    sender: a.sender_name,
                    event: a.event,
                    description: a.description,
                    start: a.start,
                    end: a.end,
                })
                .collect(),
            hourly: data
                .hourly
                .into_iter()
                .map(|h| HourlyPoint {
                    dt: h.dt,
                    temp: h.temp,
                    pop: h.pop,
                    condition: h.weather.into_iter().next(),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, ErrorCause};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenWeather {
        OpenWeather::new(Config::new(Some("testkey".into())).with_base_url(server.uri()))
    }

    #[tokio::test]
    async fn current_decodes_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .and(query_param("appid", "testkey"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "coord": {"lon": -0.1257, "lat": 51.5085},
                "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}],
                "main": {"temp": 11.2, "feels_like": 10.1, "temp_min": 9.8, "temp_max": 12.4,
                         "pressure": 1012, "humidity": 81},
                "visibility": 10000,
                "wind": {"speed": 4.6, "deg": 250},
                "sys": {"country": "GB", "sunrise": 1736928000, "sunset": 1736958000},
                "name": "London",
                "cod": 200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let city = CityName::parse("London").unwrap();
        let snapshot = client(&server).current_by_name(&city).await.unwrap();
        assert_eq!(snapshot.name, "London");
        assert_eq!(snapshot.country, "GB");
        assert_eq!(snapshot.humidity, 81);
        assert_eq!(snapshot.pressure, 1012);
        assert_eq!(snapshot.condition.id, 803);
        assert_eq!(snapshot.coord.lat, 51.5085);
        assert_eq!(snapshot.wind_deg, 250.);
    }

    #[tokio::test]
    async fn not_found_maps_to_city_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404", "message": "city not found"
            })))
            .mount(&server)
            .await;

        let city = CityName::parse("Atlantis").unwrap();
        let err = client(&server).current_by_name(&city).await.unwrap_err();
        assert_eq!(err.cause(), ErrorCause::CityNotFound);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_inactive_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "cod": 401, "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."
            })))
            .mount(&server)
            .await;

        let err = client(&server).forecast_by_name("Paris").await.unwrap_err();
        assert_eq!(err.cause(), ErrorCause::CredentialInactive);
    }

    #[tokio::test]
    async fn other_status_keeps_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "cod": 429, "message": "too many requests"
            })))
            .mount(&server)
            .await;

        let coord = Coord { lat: 1., lon: 2. };
        let err = client(&server).air_quality(coord).await.unwrap_err();
        match err {
            WeatherError::Provider(ProviderError::Status { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "too many requests");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).forecast_by_name("Paris").await.unwrap_err();
        assert!(matches!(
            err,
            WeatherError::Provider(ProviderError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn missing_credential_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let weather = OpenWeather::new(Config::new(None).with_base_url(server.uri()));
        let err = weather.forecast_by_name("Paris").await.unwrap_err();
        assert!(matches!(
            err,
            WeatherError::Configuration(ConfigError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn detailed_conditions_without_alerts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall"))
            .and(query_param("exclude", "minutely"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current": {"uvi": 3.4},
                "hourly": [
                    {"dt": 100, "temp": 5.0, "pop": 0.2,
                     "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10n"}]},
                    {"dt": 3700, "temp": 4.5}
                ]
            })))
            .mount(&server)
            .await;

        let coord = Coord { lat: 1., lon: 2. };
        let detailed = client(&server).detailed_conditions(coord).await.unwrap();
        assert_eq!(detailed.uv_index, Some(3.4));
        assert!(detailed.alerts.is_empty());
        assert_eq!(detailed.hourly.len(), 2);
        assert_eq!(detailed.hourly[0].pop, 0.2);
        assert!(detailed.hourly[1].condition.is_none());
    }

    #[tokio::test]
    async fn air_quality_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/air_pollution"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "coord": {"lon": 2.0, "lat": 1.0}, "list": []
            })))
            .mount(&server)
            .await;

        let coord = Coord { lat: 1., lon: 2. };
        assert_eq!(client(&server).air_quality(coord).await.unwrap(), None);
    }
}
