//! Runtime configuration.
//!
//! Every setting has a default; `Config::from_env` overlays values taken from
//! `SURFACEPDF_*` environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::assembler::DEFAULT_DPI;

/// Folder created below the public downloads directory.
pub const DEFAULT_FOLDER_NAME: &str = "My-Resume";

/// Authority used in content URIs handed to viewers and share targets.
pub const DEFAULT_AUTHORITY: &str = "surfacepdf.fileprovider";

/// First platform version that uses the scoped storage strategy.
pub const SCOPED_STORAGE_MIN_VERSION: u32 = 29;

/// Errors raised while building or validating a [`Config`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid folder name: {0:?}")]
    InvalidFolderName(String),

    #[error("Invalid display size {0:?}, expected WIDTHxHEIGHT")]
    InvalidDisplay(String),

    #[error("Invalid DPI: {0}")]
    InvalidDpi(f32),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Pixel size of the host display, used when a request gives no explicit
/// page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMetrics {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        DisplayMetrics {
            width_px: 1080,
            height_px: 1920,
        }
    }
}

impl fmt::Display for DisplayMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width_px, self.height_px)
    }
}

impl FromStr for DisplayMetrics {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidDisplay(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width_px: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height_px: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width_px == 0 || height_px == 0 {
            return Err(invalid());
        }
        Ok(DisplayMetrics {
            width_px,
            height_px,
        })
    }
}

/// Settings shared by every PDF creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Scratch area where the document is first serialized.
    pub cache_dir: PathBuf,
    /// Root of the user-visible storage area.
    pub public_dir: PathBuf,
    /// Folder below `Download/` that receives saved documents.
    pub folder_name: String,
    /// Host platform version; selects the storage strategy.
    pub platform_version: u32,
    pub authority: String,
    /// Program (plus arguments) that receives files to share.
    pub share_command: Option<String>,
    pub display: DisplayMetrics,
    pub dpi: f32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_dir: env::temp_dir().join("surfacepdf"),
            public_dir: default_public_dir(),
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            platform_version: SCOPED_STORAGE_MIN_VERSION,
            authority: DEFAULT_AUTHORITY.to_string(),
            share_command: None,
            display: DisplayMetrics::default(),
            dpi: DEFAULT_DPI,
        }
    }
}

fn default_public_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Builds a configuration from defaults and `SURFACEPDF_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from defaults and an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(dir) = lookup("SURFACEPDF_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("SURFACEPDF_PUBLIC_DIR") {
            config.public_dir = PathBuf::from(dir);
        }
        if let Some(folder) = lookup("SURFACEPDF_FOLDER") {
            config.folder_name = folder;
        }
        if let Some(version) = lookup("SURFACEPDF_PLATFORM_VERSION") {
            config.platform_version =
                version
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "SURFACEPDF_PLATFORM_VERSION".to_string(),
                        value: version.clone(),
                    })?;
        }
        if let Some(authority) = lookup("SURFACEPDF_AUTHORITY") {
            config.authority = authority;
        }
        if let Some(command) = lookup("SURFACEPDF_SHARE_COMMAND") {
            config.share_command = Some(command).filter(|c| !c.trim().is_empty());
        }
        if let Some(display) = lookup("SURFACEPDF_DISPLAY") {
            config.display = display.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Relative path of the save folder below the public root.
    pub fn relative_path(&self) -> String {
        format!("Download/{}", self.folder_name)
    }

    /// Checks the configuration for values that can never work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let folder = self.folder_name.trim();
        if folder.is_empty() || folder == "." || folder == ".." || folder.contains(['/', '\\']) {
            return Err(ConfigError::InvalidFolderName(self.folder_name.clone()));
        }

        if self.display.width_px == 0 || self.display.height_px == 0 {
            return Err(ConfigError::InvalidDisplay(self.display.to_string()));
        }

        if !(self.dpi.is_finite() && self.dpi > 0.0) {
            return Err(ConfigError::InvalidDpi(self.dpi));
        }

        if self.authority.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "authority".to_string(),
                value: self.authority.clone(),
            });
        }

        Ok(())
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = dir.into();
        self
    }

    pub fn with_platform_version(mut self, version: u32) -> Self {
        self.platform_version = version;
        self
    }

    pub fn with_folder_name(mut self, folder: impl Into<String>) -> Self {
        self.folder_name = folder.into();
        self
    }

    pub fn with_display(mut self, width_px: u32, height_px: u32) -> Self {
        self.display = DisplayMetrics {
            width_px,
            height_px,
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.folder_name, "My-Resume");
        assert_eq!(config.relative_path(), "Download/My-Resume");
        assert_eq!(config.display, DisplayMetrics::default());
    }

    #[test]
    fn test_display_metrics_parse() {
        let display: DisplayMetrics = "800x600".parse().unwrap();
        assert_eq!(display.width_px, 800);
        assert_eq!(display.height_px, 600);
        assert_eq!(display.to_string(), "800x600");

        assert!("800".parse::<DisplayMetrics>().is_err());
        assert!("0x600".parse::<DisplayMetrics>().is_err());
        assert!("axb".parse::<DisplayMetrics>().is_err());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SURFACEPDF_CACHE_DIR", "/tmp/cache"),
            ("SURFACEPDF_FOLDER", "Reports"),
            ("SURFACEPDF_PLATFORM_VERSION", "28"),
            ("SURFACEPDF_DISPLAY", "320x480"),
            ("SURFACEPDF_SHARE_COMMAND", "mail-it"),
        ]))
        .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.folder_name, "Reports");
        assert_eq!(config.platform_version, 28);
        assert_eq!(config.display.to_string(), "320x480");
        assert_eq!(config.share_command.as_deref(), Some("mail-it"));
    }

    #[test]
    fn test_from_lookup_rejects_bad_version() {
        let result = Config::from_lookup(lookup(&[("SURFACEPDF_PLATFORM_VERSION", "ten")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_folder_name() {
        for bad in ["", "..", "a/b", "a\\b"] {
            let config = Config::default().with_folder_name(bad);
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidFolderName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_dpi() {
        let mut config = Config::default();
        config.dpi = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidDpi(0.0)));
    }
}
