use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

/// Number of 3-hourly forecast slices kept per city (the next 24 hours).
pub const MAX_FORECAST_POINTS: usize = 8;

/// Number of hourly points kept from the detailed conditions.
pub const MAX_HOURLY_POINTS: usize = 24;

/// Weather condition as reported by the provider.
///
/// `id` is the OpenWeatherMap condition code (2xx thunderstorm, 3xx drizzle, 5xx rain,
/// 6xx snow, 7xx atmosphere, 800 clear, 80x clouds). `icon` is the provider icon code,
/// whose `d`/`n` suffix tells day from night.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: u16,
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl Condition {
    pub fn is_night(&self) -> bool {
        self.icon.ends_with('n')
    }

    /// Return weather emoji for this condition.
    pub fn raw_symbol(&self) -> &'static str {
        let is_night = self.is_night();
        match self.id {
            200..=232 => "\u{26C8}",                  // THUNDER CLOUD AND RAIN
            300..=321 => "\u{1F327}",                 // CLOUD WITH RAIN - Drizzle
            500..=504 if is_night => "\u{1F327}",     // CLOUD WITH RAIN - Rain (night)
            500..=504 => "\u{1F326}",                 // WHITE SUN BEHIND CLOUD WITH RAIN
            511 => "\u{1F328}",                       // CLOUD WITH SNOW - Freezing rain
            520..=531 => "\u{1F327}",                 // CLOUD WITH RAIN - Showers
            600..=622 => "\u{2744}",                  // SNOWFLAKE
            701..=781 => "\u{1F32B}",                 // FOG
            800 if is_night => "\u{1F319}",           // CRESCENT MOON
            800 => "\u{1F31E}",                       // BLACK SUN WITH RAYS
            801 if is_night => "\u{1F319}",           // CRESCENT MOON - Few clouds (night)
            801 => "\u{1F324}",                       // WHITE SUN WITH SMALL CLOUD
            802 if is_night => "\u{2601}",            // CLOUD - Scattered clouds (night)
            802 => "\u{26C5}",                        // SUN BEHIND CLOUD
            803 | 804 => "\u{2601}",                  // CLOUD
            _ => "?",
        }
    }

    /// Return weather emoji for display in a table column.
    ///
    /// Weather emoji have inconsistent grapheme widths (1 or 2). To align columns, we add a space
    /// after narrow (width 1) emoji, normalizing all symbols to width 2. This must happen here
    /// rather than in generic padding because the space must immediately follow the emoji.
    pub fn symbol(&self) -> String {
        let sym = self.raw_symbol();
        if sym.width() == 1 {
            format!("{} ", sym)
        } else {
            sym.to_string()
        }
    }

    pub fn icon_url(&self) -> String {
        format!("https://openweathermap.org/img/wn/{}@2x.png", self.icon)
    }
}

/// Format an optional condition as a weather symbol.
pub fn format_symbol(condition: Option<&Condition>) -> String {
    match condition {
        None => "-".to_string(),
        Some(c) => c.symbol(),
    }
}

/// Format a temperature in degrees Celsius.
pub fn format_temp(temp: f64) -> String {
    // as i32 so -0.1 doesn't show up as -0
    format!("{}°C", temp.round() as i32)
}

/// Format a probability of precipitation (0-1) as a whole percentage.
pub fn format_pop(pop: f64) -> String {
    format!("{}%", (pop * 100.).round() as i32)
}

/// Format visibility, given in meters, as kilometers.
pub fn format_visibility(meters: u32) -> String {
    format!("{:.1} km", meters as f64 / 1000.)
}

/// Eight-point compass direction for a wind bearing in degrees.
pub fn wind_direction(deg: f64) -> &'static str {
    const DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let idx = (deg / 45.).round().rem_euclid(8.) as usize;
    DIRECTIONS[idx]
}

/// Render an epoch-seconds timestamp in the given display timezone.
///
/// Timestamps stay as epoch seconds in the model; this is the only place they become
/// wall-clock time.
pub fn format_timestamp<Tz: TimeZone>(epoch: i64, tz: &Tz, fmt: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::<Utc>::from_timestamp(epoch, 0) {
        Some(dt) => dt.with_timezone(tz).format(fmt).to_string(),
        None => "-".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn link(&self) -> String {
        format!(
            "https://www.google.com/maps/place/{},{}",
            self.lat, self.lon
        )
    }
}

/// A single point-in-time weather reading for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub name: String,
    pub country: String,
    pub coord: Coord,
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    /// hPa
    pub pressure: u32,
    /// Meters.
    pub visibility: u32,
    /// m/s
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub sunrise: i64,
    pub sunset: i64,
    pub condition: Condition,
}

impl WeatherSnapshot {
    /// Case-insensitive name comparison used for tracked-city uniqueness.
    pub fn same_city(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub dt: i64,
    pub temp: f64,
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub dt: i64,
    pub temp: f64,
    /// Probability of precipitation, 0 to 1.
    pub pop: f64,
    pub condition: Option<Condition>,
}

/// Pollutant concentrations in µg/m³.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pollutants {
    #[serde(default)]
    pub co: f64,
    #[serde(default)]
    pub no: f64,
    #[serde(default)]
    pub no2: f64,
    #[serde(default)]
    pub o3: f64,
    #[serde(default)]
    pub so2: f64,
    #[serde(default)]
    pub pm2_5: f64,
    #[serde(default)]
    pub pm10: f64,
    #[serde(default)]
    pub nh3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualitySample {
    /// Categorical index, 1 (good) to 5 (very poor).
    pub aqi: u8,
    pub components: Pollutants,
}

impl AirQualitySample {
    pub fn description(&self) -> &'static str {
        match self.aqi {
            1 => "Good",
            2 => "Fair",
            3 => "Moderate",
            4 => "Poor",
            5 => "Very Poor",
            _ => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotice {
    pub sender: String,
    pub event: String,
    pub description: String,
    pub start: i64,
    pub end: i64,
}

/// UV index band with its protection advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UvBand {
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl UvBand {
    pub fn from_index(uvi: f64) -> Self {
        if uvi <= 2. {
            Self::Low
        } else if uvi <= 5. {
            Self::Moderate
        } else if uvi <= 7. {
            Self::High
        } else if uvi <= 10. {
            Self::VeryHigh
        } else {
            Self::Extreme
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::VeryHigh => "Very High",
            Self::Extreme => "Extreme",
        }
    }

    pub fn advice(self) -> &'static str {
        match self {
            Self::Low => "No protection required",
            Self::Moderate => "Protection required",
            _ => "Extra protection required",
        }
    }
}

/// The merged result of a detailed fetch: everything the search view shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedReport {
    pub snapshot: WeatherSnapshot,
    pub forecast: Vec<ForecastPoint>,
    pub hourly: Vec<HourlyPoint>,
    pub air_quality: Option<AirQualitySample>,
    pub uv_index: Option<f64>,
    pub alerts: Vec<AlertNotice>,
}
