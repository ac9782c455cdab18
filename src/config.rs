use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Optional webhook for notification delivery; unset logs instead.
    pub notify_webhook_url: Option<String>,
    /// Optional invoice rendering service; unset skips document generation.
    pub renderer_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let notify_webhook_url = env_map
            .get("NOTIFY_WEBHOOK_URL")
            .cloned()
            .filter(|s| !s.is_empty());

        let renderer_url = env_map
            .get("RENDERER_URL")
            .cloned()
            .filter(|s| !s.is_empty());

        Ok(Config {
            port,
            database_path,
            notify_webhook_url,
            renderer_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_missing_database_path() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.notify_webhook_url, None);
        assert_eq!(config.renderer_url, None);
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_optional_urls() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "NOTIFY_WEBHOOK_URL".to_string(),
            "https://hooks.example/notify".to_string(),
        );
        env_map.insert("RENDERER_URL".to_string(), "".to_string());

        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(
            config.notify_webhook_url.as_deref(),
            Some("https://hooks.example/notify")
        );
        // Empty string reads as unset.
        assert_eq!(config.renderer_url, None);
    }
}
