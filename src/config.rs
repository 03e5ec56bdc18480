use anyhow::{Context, Result, bail};
use clap::ArgAction::Append;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::downloader::DownloaderConfig;

/// Server configuration, loaded from CLI arguments and an optional TOML file.
///
/// Example configuration file content
/// # Video Fetch Server Configuration
///
/// bind_address = "0.0.0.0"
/// listen_on_port = 8001
/// static_dir = "./public"
///
/// # Downloader (runs `uv run yt-dlp -f <format> -o <path> <url>`)
/// downloader = "uv"
/// downloader_arg = ["run", "yt-dlp"]
/// format = "best[ext=mp4]"
/// timeout_secs = 600
/// permits = 4
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Interface to bind
    #[arg(short, long, default_value = "0.0.0.0")]
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8001)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Directory static files are served from
    #[arg(short, long, default_value = ".")]
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Parent directory for per-request temp directories (system temp dir if unset)
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<String>,

    /// Downloader program
    #[arg(short, long, default_value = "yt-dlp")]
    #[serde(default = "default_downloader")]
    pub downloader: String,

    /// Extra leading argument for the downloader, may be repeated
    #[arg(long, action = Append, allow_hyphen_values = true)]
    #[serde(default)]
    pub downloader_arg: Vec<String>,

    /// Format selector passed with `-f`
    #[arg(short, long, default_value = "best[ext=mp4]")]
    #[serde(default = "default_format")]
    pub format: String,

    /// Seconds a single download may run before it is killed
    #[arg(long, default_value_t = 600)]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of concurrent downloads
    #[arg(short, long, default_value_t = 4)]
    #[serde(default = "default_permits")]
    pub permits: usize,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            listen_on_port: default_port(),
            static_dir: default_static_dir(),
            temp_dir: None,
            downloader: default_downloader(),
            downloader_arg: Vec::new(),
            format: default_format(),
            timeout_secs: default_timeout_secs(),
            permits: default_permits(),
            config: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // If CLI value is default, use file value
        if self.bind_address == default_bind_address() {
            self.bind_address = file_config.bind_address;
        }
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.static_dir == default_static_dir() {
            self.static_dir = file_config.static_dir;
        }
        if self.downloader == default_downloader() {
            self.downloader = file_config.downloader;
        }
        if self.format == default_format() {
            self.format = file_config.format;
        }
        if self.timeout_secs == default_timeout_secs() {
            self.timeout_secs = file_config.timeout_secs;
        }
        if self.permits == default_permits() {
            self.permits = file_config.permits;
        }

        if self.temp_dir.is_none() {
            self.temp_dir = file_config.temp_dir;
        }
        if self.downloader_arg.is_empty() {
            self.downloader_arg = file_config.downloader_arg;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.permits == 0 {
            bail!("permits must be at least 1");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be at least 1");
        }
        if self.downloader.trim().is_empty() {
            bail!("downloader program cannot be empty");
        }
        if self.format.trim().is_empty() {
            bail!("format selector cannot be empty");
        }
        if !Path::new(&self.static_dir).is_dir() {
            bail!("static_dir {} is not a directory", self.static_dir);
        }
        if let Some(temp_dir) = &self.temp_dir
            && !Path::new(temp_dir).is_dir()
        {
            bail!("temp_dir {temp_dir} is not a directory");
        }

        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.listen_on_port)
            .parse()
            .with_context(|| format!("Invalid bind address {}", self.bind_address))
    }

    pub fn static_dir(&self) -> PathBuf {
        PathBuf::from(&self.static_dir)
    }

    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn to_downloader_config(&self) -> DownloaderConfig {
        DownloaderConfig {
            program: self.downloader.clone(),
            leading_args: self.downloader_arg.clone(),
            format: self.format.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_static_dir() -> String {
    ".".to_string()
}

fn default_downloader() -> String {
    "yt-dlp".to_string()
}

fn default_format() -> String {
    "best[ext=mp4]".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_permits() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli() {
        let cli = Config::parse_from(["video-fetch-server"]);
        let default = Config::default();

        assert_eq!(cli.bind_address, default.bind_address);
        assert_eq!(cli.listen_on_port, 8001);
        assert_eq!(cli.format, "best[ext=mp4]");
        assert_eq!(cli.downloader, "yt-dlp");
        assert_eq!(cli.timeout_secs, default.timeout_secs);
        assert_eq!(cli.permits, default.permits);
        assert!(cli.downloader_arg.is_empty());
    }

    #[test]
    fn test_repeated_downloader_args() {
        let cli = Config::parse_from([
            "video-fetch-server",
            "--downloader",
            "uv",
            "--downloader-arg",
            "run",
            "--downloader-arg",
            "yt-dlp",
        ]);
        assert_eq!(cli.downloader, "uv");
        assert_eq!(cli.downloader_arg, vec!["run", "yt-dlp"]);
    }

    #[test]
    fn test_file_values_fill_cli_defaults() {
        let file: Config = toml::from_str(
            r#"
            listen_on_port = 9000
            downloader = "uv"
            downloader_arg = ["run", "yt-dlp"]
            timeout_secs = 30
            "#,
        )
        .unwrap();

        let cli = Config::parse_from(["video-fetch-server", "--permits", "2"]);
        let merged = cli.merge_with_file(file);

        assert_eq!(merged.listen_on_port, 9000);
        assert_eq!(merged.downloader, "uv");
        assert_eq!(merged.downloader_arg, vec!["run", "yt-dlp"]);
        assert_eq!(merged.timeout_secs, 30);
        // explicit CLI value wins
        assert_eq!(merged.permits, 2);
        // untouched on both sides
        assert_eq!(merged.format, "best[ext=mp4]");
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            permits: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            downloader: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            static_dir: "/definitely/not/here".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            bind_address: "not an address".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_downloader_config() {
        let config = Config {
            timeout_secs: 5,
            ..Default::default()
        };
        let downloader = config.to_downloader_config();
        assert_eq!(downloader.program, "yt-dlp");
        assert_eq!(downloader.timeout, Duration::from_secs(5));
    }
}
