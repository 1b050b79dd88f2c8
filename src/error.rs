//! Error types for the weather aggregator.

use thiserror::Error;

/// Input rejected before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("city name is empty")]
    Empty,

    #[error("invalid city name: {0:?}")]
    InvalidCharacters(String),
}

/// Credential problems, detected on first use rather than at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("weather API key is not configured")]
    MissingCredential,

    #[error("weather API key is malformed")]
    InvalidCredential,
}

/// Failure talking to the weather provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("city not found")]
    CityNotFound,

    #[error("API key not active")]
    CredentialInactive,

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Structured reason behind a failure, used to pick the message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCause {
    EmptyInput,
    InvalidInput,
    CredentialMissing,
    CredentialInactive,
    CityNotFound,
    Other,
}

impl WeatherError {
    pub fn cause(&self) -> ErrorCause {
        match self {
            Self::Validation(ValidationError::Empty) => ErrorCause::EmptyInput,
            Self::Validation(ValidationError::InvalidCharacters(_)) => ErrorCause::InvalidInput,
            Self::Configuration(_) => ErrorCause::CredentialMissing,
            Self::Provider(ProviderError::CredentialInactive) => ErrorCause::CredentialInactive,
            Self::Provider(ProviderError::CityNotFound) => ErrorCause::CityNotFound,
            Self::Provider(_) => ErrorCause::Other,
        }
    }

    /// User-friendly error message for display.
    pub fn user_message(&self) -> &'static str {
        match self.cause() {
            ErrorCause::EmptyInput => "Please enter a city name.",
            ErrorCause::InvalidInput => {
                "Please enter a valid city name using letters, spaces, and common punctuation."
            }
            ErrorCause::CredentialMissing => {
                "Weather service is not properly configured. Please check API key."
            }
            ErrorCause::CredentialInactive => {
                "The weather service API key is not active yet. New API keys typically take \
                 2-4 hours to activate. Please try again later or use a different API key."
            }
            ErrorCause::CityNotFound => {
                "City not found. Please check the spelling and try again."
            }
            ErrorCause::Other => "An error occurred while fetching weather data.",
        }
    }

    /// Whether this error was raised by input validation, before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn causes() {
        assert_eq!(
            WeatherError::from(ValidationError::Empty).cause(),
            ErrorCause::EmptyInput
        );
        assert_eq!(
            WeatherError::from(ValidationError::InvalidCharacters("x1".into())).cause(),
            ErrorCause::InvalidInput
        );
        assert_eq!(
            WeatherError::from(ConfigError::InvalidCredential).cause(),
            ErrorCause::CredentialMissing
        );
        assert_eq!(
            WeatherError::from(ProviderError::CredentialInactive).cause(),
            ErrorCause::CredentialInactive
        );
        assert_eq!(
            WeatherError::from(ProviderError::CityNotFound).cause(),
            ErrorCause::CityNotFound
        );
        let status = ProviderError::Status {
            status: 500,
            message: "city not found".into(),
        };
        // The message text plays no part in classification.
        assert_eq!(WeatherError::from(status).cause(), ErrorCause::Other);
    }

    #[test]
    fn user_messages() {
        let err = WeatherError::from(ProviderError::CityNotFound);
        assert!(err.user_message().contains("City not found"));

        let err = WeatherError::from(ProviderError::CredentialInactive);
        assert!(err.user_message().contains("not active"));

        let err = WeatherError::from(ConfigError::MissingCredential);
        assert!(err.user_message().contains("API key"));

        let err = WeatherError::from(ValidationError::Empty);
        assert_eq!(err.user_message(), "Please enter a city name.");

        let err = WeatherError::from(ProviderError::Decode("bad".into()));
        assert!(err.user_message().contains("An error occurred"));
    }

    #[test]
    fn validation_flag() {
        assert!(WeatherError::from(ValidationError::Empty).is_validation());
        assert!(!WeatherError::from(ProviderError::CityNotFound).is_validation());
    }
}
