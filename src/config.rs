use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Environment, File, FileFormat, Map};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assets;

/// Prefix for environment overrides, e.g. `SIMPLE_SERVER__STORAGE__MAX_UPLOAD_SIZE`.
pub const ENV_PREFIX: &str = "SIMPLE_SERVER";

/// Searched in order when no config path is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &["config.toml", "config/config.toml"];

/// Fileserver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout applied to reading the request.
    pub read_timeout_secs: u64,
    /// Timeout applied to producing the response.
    pub write_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the browsable tree
    pub upload_dir: PathBuf,
    /// Destination for uploads, never browsable
    pub incoming_dir: PathBuf,
    /// Served only through `/private-files`
    pub private_dir: PathBuf,
    /// Static assets served under `/public`
    pub public_dir: PathBuf,
    /// Maximum file size for uploads (in bytes)
    pub max_upload_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./files"),
            incoming_dir: PathBuf::from("./files/incoming"),
            private_dir: PathBuf::from("./files/private-files"),
            public_dir: PathBuf::from("./public"),
            max_upload_size: 1000 * 1024 * 1024, // 1000 MB
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Upload extensions, with leading dot. Empty allows everything.
    pub allowed_extensions: Vec<String>,
    /// Relative path prefixes hidden from listing, search and serving
    pub blocked_paths: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: [".jpg", ".png", ".pdf", ".md", ".txt", ".html", ".css", ".js"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            blocked_paths: vec!["incoming".to_string(), "private-files".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
    pub format: LogFormat,
    /// Write to `<log_dir>/server.log` instead of stderr
    pub to_file: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            to_file: false,
            log_dir: PathBuf::from("./logs"),
        }
    }
}

impl Config {
    /// Load configuration from defaults, a TOML file and the process
    /// environment, in increasing precedence.
    ///
    /// An explicit `path` that does not exist yet is created with the
    /// defaults. Without a path the first of `config.toml` and
    /// `config/config.toml` is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    /// Like [`Config::load`], reading environment overrides from `env`
    /// instead of the process environment when given.
    pub fn load_from(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                if !path.exists() {
                    write_default_config(path)?;
                }
                Some(path.to_path_buf())
            }
            None => DEFAULT_CONFIG_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|p| p.is_file()),
        };

        let mut builder = ::config::Config::builder();
        if let Some(file) = &file {
            builder = builder.add_source(
                File::from(file.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        let built = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("security.allowed_extensions")
                    .with_list_parse_key("security.blocked_paths")
                    .source(env.clone()),
            )
            .build()
            .context("building configuration")?;

        let mut config: Config = built
            .try_deserialize()
            .context("parsing configuration")?;

        config.apply_env_overrides(|key| match &env {
            Some(map) => map.get(key).cloned(),
            None => std::env::var(key).ok(),
        })?;

        Ok(config)
    }

    /// `HOST` and `PORT` take precedence over everything else.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("HOST").filter(|h| !h.is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
            self.server.port = port
                .parse()
                .with_context(|| format!("invalid PORT value {port:?}"))?;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.server.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.server.write_timeout_secs)
    }

    pub fn print_summary(&self) {
        info!("=== Current configuration ===");
        info!("Server address: {}", self.listen_addr());
        info!("Upload directory: {}", self.storage.upload_dir.display());
        info!("Incoming directory: {}", self.storage.incoming_dir.display());
        info!("Max upload size: {} MB", self.storage.max_upload_size / (1024 * 1024));
        info!("Log level: {}", self.logging.level);
        info!("Log format: {:?}", self.logging.format);
        if self.logging.to_file {
            info!("Log directory: {}", self.logging.log_dir.display());
        }
        info!("Allowed extensions: {:?}", self.security.allowed_extensions);
        info!("Blocked paths: {:?}", self.security.blocked_paths);
    }
}

impl StorageConfig {
    /// Create the storage directories and seed the non-browsable ones with
    /// a "not found" index page.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.upload_dir, &self.incoming_dir, &self.private_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }

        for dir in [&self.incoming_dir, &self.private_dir] {
            let index = dir.join("index.html");
            if index.exists() {
                continue;
            }
            if let Err(e) = fs::write(&index, assets::NOT_FOUND_PAGE) {
                warn!("Failed to write {}: {}", index.display(), e);
            }
        }

        Ok(())
    }
}

fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let toml = toml::to_string_pretty(&Config::default())
        .context("serializing default config to TOML")?;
    let body = format!(
        "# Configuration for simple-fileserver\n# File: {}\n\n{}",
        path.display(),
        toml
    );
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))?;
    info!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:8000");
        assert_eq!(config.storage.max_upload_size, 1000 * 1024 * 1024);
        assert_eq!(config.security.blocked_paths, vec!["incoming", "private-files"]);
        assert!(config.logging.enabled);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[server]\nport = 9000\n\n[security]\nallowed_extensions = []\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&path), env(&[])).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.security.allowed_extensions.is_empty());
        assert_eq!(config.security.blocked_paths.len(), 2);
    }

    #[test]
    fn test_missing_explicit_file_is_created() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");

        let config = Config::load_from(Some(&path), env(&[])).unwrap();
        assert!(path.exists());
        assert_eq!(config.server.port, 8000);

        let reread: Config = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reread.storage.upload_dir, PathBuf::from("./files"));
    }

    #[test]
    fn test_prefixed_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[storage]\nmax_upload_size = 10\n").unwrap();

        let config = Config::load_from(
            Some(&path),
            env(&[
                ("SIMPLE_SERVER__STORAGE__MAX_UPLOAD_SIZE", "2048"),
                ("SIMPLE_SERVER__SECURITY__BLOCKED_PATHS", "secret,tmp"),
                ("SIMPLE_SERVER__LOGGING__FORMAT", "text"),
            ]),
        )
        .unwrap();

        assert_eq!(config.storage.max_upload_size, 2048);
        assert_eq!(config.security.blocked_paths, vec!["secret", "tmp"]);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_host_and_port_have_highest_precedence() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[server]\nhost = \"127.0.0.1\"\nport = 9000\n").unwrap();

        let config = Config::load_from(
            Some(&path),
            env(&[
                ("SIMPLE_SERVER__SERVER__PORT", "9100"),
                ("HOST", "10.0.0.5"),
                ("PORT", "9200"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listen_addr(), "10.0.0.5:9200");
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|key| (key == "PORT").then(|| "http".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_ensure_directories_seeds_index_pages() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig {
            upload_dir: temp.path().join("files"),
            incoming_dir: temp.path().join("files/incoming"),
            private_dir: temp.path().join("files/private-files"),
            public_dir: temp.path().join("public"),
            max_upload_size: 10,
        };

        storage.ensure_directories().unwrap();

        assert!(storage.upload_dir.is_dir());
        assert!(storage.incoming_dir.join("index.html").is_file());
        assert!(storage.private_dir.join("index.html").is_file());
        assert!(!storage.upload_dir.join("index.html").exists());

        // Existing pages are left alone.
        fs::write(storage.private_dir.join("index.html"), "custom").unwrap();
        storage.ensure_directories().unwrap();
        assert_eq!(
            fs::read_to_string(storage.private_dir.join("index.html")).unwrap(),
            "custom"
        );
    }
}
