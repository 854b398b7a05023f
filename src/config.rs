//! Tooltip configuration, layered as defaults <- TOML file <- environment <-
//! command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::placement::Size;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bad config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("bad base_url {url:?}: {source}")]
    BaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("window_size must be at least 1")]
    ZeroWindow,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TooltipConfig {
    /// Root of the test manager; the changelog endpoint lives under it.
    pub base_url: String,
    /// How long the pointer has to rest on a revision before we show history.
    pub show_delay_ms: u64,
    /// How long the pointer has to be gone before we hide it again.
    pub hide_delay_ms: u64,
    /// Revisions per fetched window.
    pub window_size: u64,
    pub request_timeout_ms: u64,
    /// Size we position an overlay with before its content is known.
    pub initial_width: i32,
    pub initial_height: i32,
}

impl Default for TooltipConfig {
    fn default() -> Self {
        TooltipConfig {
            base_url: "http://localhost/testmanager/".to_string(),
            show_delay_ms: 500,
            hide_delay_ms: 500,
            window_size: 16,
            request_timeout_ms: 10_000,
            initial_width: 480,
            initial_height: 320,
        }
    }
}

impl TooltipConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s)
    }

    pub fn show_delay(&self) -> Duration {
        Duration::from_millis(self.show_delay_ms)
    }

    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.hide_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn initial_size(&self) -> Size {
        Size::new(self.initial_width, self.initial_height)
    }

    /// The parsed base URL, with a trailing slash so relative joins land
    /// underneath it rather than replacing its last segment.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let mut raw = self.base_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|source| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        self.base_url()?;
        Ok(())
    }

    /// Apply `VCS_TOOLTIP_*` overrides.  `lookup` is `std::env::var` in real
    /// use; unparseable numbers are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("VCS_TOOLTIP_BASE_URL") {
            self.base_url = url;
        }
        let numbers: [(&str, &mut u64); 4] = [
            ("VCS_TOOLTIP_SHOW_DELAY_MS", &mut self.show_delay_ms),
            ("VCS_TOOLTIP_HIDE_DELAY_MS", &mut self.hide_delay_ms),
            ("VCS_TOOLTIP_WINDOW_SIZE", &mut self.window_size),
            ("VCS_TOOLTIP_REQUEST_TIMEOUT_MS", &mut self.request_timeout_ms),
        ];
        for (name, field) in numbers {
            if let Some(raw) = lookup(name) {
                match raw.trim().parse::<u64>() {
                    Ok(v) => *field = v,
                    Err(e) => tracing::warn!("ignoring {}={:?}: {}", name, raw, e),
                }
            }
        }
    }
}

/// Command line overrides; `None` leaves the lower layers alone.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub show_delay_ms: Option<u64>,
    pub hide_delay_ms: Option<u64>,
    pub window_size: Option<u64>,
}

/// Load the effective configuration from all layers.  A config path that
/// doesn't exist is skipped with a warning.
pub fn load_config(opts: ConfigOverrides) -> Result<TooltipConfig, ConfigError> {
    load_config_with_env(opts, |name| std::env::var(name).ok())
}

pub fn load_config_with_env<F>(opts: ConfigOverrides, lookup: F) -> Result<TooltipConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match opts.config_path.as_ref() {
        Some(path) if path.exists() => TooltipConfig::from_file(path)?,
        Some(path) => {
            tracing::warn!("config file {} not found, using defaults", path.display());
            TooltipConfig::default()
        }
        None => TooltipConfig::default(),
    };

    config.apply_env(lookup);

    if let Some(url) = opts.base_url {
        config.base_url = url;
    }
    if let Some(v) = opts.show_delay_ms {
        config.show_delay_ms = v;
    }
    if let Some(v) = opts.hide_delay_ms {
        config.hide_delay_ms = v;
    }
    if let Some(v) = opts.window_size {
        config.window_size = v;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = TooltipConfig::from_toml_str("window_size = 12\nshow_delay_ms = 250\n").unwrap();
        assert_eq!(config.window_size, 12);
        assert_eq!(config.show_delay(), Duration::from_millis(250));
        assert_eq!(config.hide_delay_ms, 500);
        assert_eq!(config.initial_size(), Size::new(480, 320));
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let config = TooltipConfig {
            base_url: "https://tm.example.org/testmanager".to_string(),
            ..TooltipConfig::default()
        };
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://tm.example.org/testmanager/"
        );
    }

    #[test]
    fn validation_rejects_zero_window_and_bad_url() {
        let config = TooltipConfig {
            window_size: 0,
            ..TooltipConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroWindow)));

        let config = TooltipConfig {
            base_url: "not a url".to_string(),
            ..TooltipConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::BaseUrl { .. })));
    }

    #[test]
    fn file_env_cli_precedence() {
        let mut tmp = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            tmp,
            "base_url = \"http://file/\"\nwindow_size = 8\nshow_delay_ms = 100\nhide_delay_ms = 100"
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            ("VCS_TOOLTIP_WINDOW_SIZE", "24"),
            ("VCS_TOOLTIP_SHOW_DELAY_MS", "200"),
            ("VCS_TOOLTIP_HIDE_DELAY_MS", "soon"),
        ]
        .iter()
        .cloned()
        .collect();

        let config = load_config_with_env(
            ConfigOverrides {
                config_path: Some(tmp.path().to_path_buf()),
                window_size: Some(32),
                ..ConfigOverrides::default()
            },
            |name| env.get(name).map(|v| v.to_string()),
        )
        .unwrap();

        assert_eq!(config.base_url, "http://file/");
        // CLI beats env beats file.
        assert_eq!(config.window_size, 32);
        assert_eq!(config.show_delay_ms, 200);
        // Unparseable env values leave the file's value in place.
        assert_eq!(config.hide_delay_ms, 100);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = load_config_with_env(
            ConfigOverrides {
                config_path: Some(PathBuf::from("/nonexistent/vcs-tooltip.toml")),
                ..ConfigOverrides::default()
            },
            no_env,
        )
        .unwrap();
        assert_eq!(config, TooltipConfig::default());
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let mut tmp = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(tmp, "window_size = \"lots\"").unwrap();
        let err = load_config_with_env(
            ConfigOverrides {
                config_path: Some(tmp.path().to_path_buf()),
                ..ConfigOverrides::default()
            },
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
