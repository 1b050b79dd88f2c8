use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Settings read once at startup.
///
/// The credential is stored as given; it is only checked when a request needs it, so a
/// missing key disables the weather features without stopping the process.
#[derive(Debug, Clone)]
pub struct Config {
    api_key: Option<String>,
    base_url: String,
}

impl Config {
    pub fn new(api_key: Option<String>) -> Self {
        Config {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point requests at a different host, e.g. a proxy or a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Return the API key, or the reason it can't be used.
    pub fn credential(&self) -> Result<&str, ConfigError> {
        let key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential)?;
        if !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidCredential);
        }
        Ok(key)
    }
}
