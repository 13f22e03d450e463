use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub detector: DetectorConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Endpoint of the external face detection service. Detection is
    /// skipped when unset.
    pub url: Option<String>,
    pub timeout_secs: u64,
    /// Minimum similarity for a detector suggestion to be applied.
    pub match_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub api_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            database: DatabaseConfig {
                url: "sqlite://smartgallery.db".to_string(),
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from("uploads"),
                max_upload_bytes: 20 * 1024 * 1024,
            },
            detector: DetectorConfig {
                url: None,
                timeout_secs: 30,
                match_threshold: 0.7,
            },
            auth: AuthConfig { api_token: None },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("SERVER_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("SERVER_PORT") {
            config.server.port = port.parse()?;
        }

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database.url = db_url;
        }

        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            config.storage.upload_dir = PathBuf::from(dir);
        }

        if let Ok(max) = std::env::var("MAX_UPLOAD_BYTES") {
            config.storage.max_upload_bytes = max.parse()?;
        }

        if let Ok(url) = std::env::var("DETECTOR_URL") {
            if !url.trim().is_empty() {
                config.detector.url = Some(url.trim().to_string());
            }
        }

        if let Ok(timeout) = std::env::var("DETECTOR_TIMEOUT_SECS") {
            config.detector.timeout_secs = timeout.parse()?;
        }

        if let Ok(threshold) = std::env::var("MATCH_THRESHOLD") {
            let threshold: f32 = threshold.parse()?;
            anyhow::ensure!(
                (0.0..=1.0).contains(&threshold),
                "MATCH_THRESHOLD must be within [0, 1], got {}",
                threshold
            );
            config.detector.match_threshold = threshold;
        }

        if let Ok(token) = std::env::var("API_TOKEN") {
            if !token.is_empty() {
                config.auth.api_token = Some(token);
            }
        }

        Ok(config)
    }
}

/// Where the gallery client finds the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("GALLERY_API_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(timeout) = std::env::var("GALLERY_TIMEOUT_SECS") {
            config.timeout_secs = timeout.parse()?;
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Credentials of the signed-in user, loaded once at session start and
/// handed to every backend call. Logging out invalidates it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<String>,
    active: bool,
}

impl Session {
    pub fn open(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            active: true,
        }
    }

    /// A session without credentials, for servers running without an API token.
    pub fn anonymous() -> Self {
        Self::open(None)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn invalidate(&mut self) {
        self.token = None;
        self.active = false;
    }

    pub fn ensure_active(&self) -> crate::error::Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(crate::error::GalleryError::transport("session has been closed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut session = Session::open(Some("secret".to_string()));
        assert!(session.is_active());
        assert_eq!(session.token(), Some("secret"));

        session.invalidate();
        assert!(!session.is_active());
        assert!(session.token().is_none());
        assert!(session.ensure_active().is_err());

        assert!(!Session::default().is_active());
        assert!(Session::open(Some(String::new())).token().is_none());
    }
}
