//! Server configuration: TOML file plus CLI/environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    8080
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data")
}

fn default_database_name() -> String {
    "grove".to_owned()
}

fn default_workers() -> usize {
    grove_queue::DEFAULT_WORKERS
}

fn default_queue_capacity() -> usize {
    grove_queue::DEFAULT_CAPACITY
}

fn default_max_attachment_size() -> usize {
    grove_types::MAX_ATTACHMENT_SIZE
}

/// The bootstrap administrator created on first start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Login name.
    pub username: String,
    /// Cleartext password, hashed before it ever reaches the forest.
    pub password: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Organization label.
    #[serde(default)]
    pub organization: String,
    /// Phone number.
    #[serde(default)]
    pub phone: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_owned(),
            password: "admin".to_owned(),
            email: String::new(),
            organization: String::new(),
            phone: String::new(),
        }
    }
}

/// Everything `groved` needs to run one database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP port the API listens on.
    #[serde(default = "default_port")]
    pub server_port: u16,
    /// Directory holding the snapshot file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Snapshot file stem; the file is `<database_name>.dat`.
    #[serde(default = "default_database_name")]
    pub database_name: String,
    /// Ops log file served by `/logs`, if any.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Organization shown in settings.
    #[serde(default)]
    pub organization: String,
    /// Contact phone shown in settings.
    #[serde(default)]
    pub phone: String,
    /// Dashboard URL shown in settings.
    #[serde(default)]
    pub dashboard_url: String,
    /// HMAC secret for session and refresh tokens.
    #[serde(default)]
    pub jwt_secret: String,
    /// Worker tasks serving the mutation queue.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Mutation queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Attachment size cap in bytes.
    #[serde(default = "default_max_attachment_size")]
    pub max_attachment_size: usize,
    /// Bootstrap administrator.
    #[serde(default)]
    pub admin: Option<AdminConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: default_port(),
            database_path: default_database_path(),
            database_name: default_database_name(),
            log_file: None,
            organization: String::new(),
            phone: String::new(),
            dashboard_url: String::new(),
            jwt_secret: String::new(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_attachment_size: default_max_attachment_size(),
            admin: None,
        }
    }
}

impl ServerConfig {
    /// Load a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Write the configuration back as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write config file {}", path.display()))
    }

    /// Full path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.database_path.join(format!("{}.dat", self.database_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: ServerConfig = toml::from_str("organization = \"acme\"").unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.database_name, "grove");
        assert_eq!(config.organization, "acme");
        assert_eq!(config.workers, grove_queue::DEFAULT_WORKERS);
    }

    #[test]
    fn snapshot_path_joins_dir_and_name() {
        let config = ServerConfig {
            database_path: PathBuf::from("/var/lib/grove"),
            database_name: "prod".to_owned(),
            ..Default::default()
        };
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/var/lib/grove/prod.dat")
        );
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grove.toml");
        let mut config = ServerConfig::default();
        config.organization = "acme".to_owned();
        config.admin = Some(AdminConfig::default());

        config.save(&path).unwrap();
        let back = ServerConfig::from_file(&path).unwrap();
        assert_eq!(back.organization, "acme");
        assert_eq!(back.admin.unwrap().username, "admin");
    }
}
