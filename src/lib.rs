//! City weather lookups and an in-memory dashboard of tracked cities, backed by the
//! OpenWeatherMap API.

pub mod aggregator;
pub mod city;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod state;
pub mod table;

pub use aggregator::WeatherAggregator;
pub use city::CityName;
pub use config::Config;
pub use error::{ConfigError, ErrorCause, ProviderError, ValidationError, WeatherError};
