use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

/// A city name that passed input validation and is safe to send to the provider.
///
/// Holds the trimmed user input. Only ASCII letters, spaces, commas, periods and hyphens
/// are accepted, which covers forms like "London", "St. Louis" or "Paris, FR".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CityName(String);

impl CityName {
    /// Validate free-text input as a city name.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        static CITY_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                r#"(?x)
                ^
                [A-Za-z\ ,.\-]+     # letters, spaces and common punctuation
                $
            "#,
            )
            .unwrap()
        });

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }
        if !CITY_RE.is_match(trimmed) {
            return Err(ValidationError::InvalidCharacters(trimmed.to_string()));
        }
        Ok(CityName(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_name() {
        let city = CityName::parse("London").unwrap();
        assert_eq!(city.as_str(), "London");
    }

    #[test]
    fn parse_trims_whitespace() {
        let city = CityName::parse("  New York  ").unwrap();
        assert_eq!(city.as_str(), "New York");
    }

    #[test]
    fn parse_accepts_punctuation() {
        assert!(CityName::parse("St. Louis").is_ok());
        assert!(CityName::parse("Paris, FR").is_ok());
        assert!(CityName::parse("Stratford-upon-Avon").is_ok());
    }

    #[test]
    fn parse_empty() {
        assert_eq!(CityName::parse(""), Err(ValidationError::Empty));
        assert_eq!(CityName::parse("   "), Err(ValidationError::Empty));
    }

    #[test]
    fn parse_rejects_digits_and_symbols() {
        assert_eq!(
            CityName::parse("L0ndon!"),
            Err(ValidationError::InvalidCharacters("L0ndon!".to_string()))
        );
        assert!(CityName::parse("Paris;").is_err());
        assert!(CityName::parse("a/b").is_err());
        assert!(CityName::parse("45.8,15.9").is_err());
    }

    #[test]
    fn parse_rejects_non_ascii_letters() {
        assert!(CityName::parse("Zürich").is_err());
        assert!(CityName::parse("São Paulo").is_err());
    }

    #[test]
    fn parse_rejects_inner_tabs_and_newlines() {
        assert!(CityName::parse("New\tYork").is_err());
        assert!(CityName::parse("New\nYork").is_err());
    }
}
