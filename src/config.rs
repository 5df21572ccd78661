//! Tester Configuration
//!
//! Handles parsing of libasm-tester.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file searched for.
pub const CONFIG_FILE: &str = "libasm-tester.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching libasm-tester.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TesterConfig {
    /// Libraries to wrap
    #[serde(default)]
    pub library: LibraryConfig,

    /// How the library under test is built
    #[serde(default)]
    pub build: BuildConfig,
}

impl TesterConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: TesterConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                log::debug!("using {}", config_path.display());
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Shared object the tests bind: the one the build step links
    pub fn subject_path(&self) -> PathBuf {
        self.build.shared_lib_path()
    }
}

/// Library settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryConfig {
    /// System library providing the reference functions
    #[serde(default = "default_reference")]
    pub reference: String,

    /// Prefix of the functions under test
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_reference() -> String {
    crate::harness::libasm::REFERENCE_LIBRARY.to_string()
}

fn default_prefix() -> String {
    crate::harness::DEFAULT_PREFIX.to_string()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            reference: default_reference(),
            prefix: default_prefix(),
        }
    }
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    /// Directory holding the project Makefile
    #[serde(default = "default_repo")]
    pub repo: PathBuf,

    /// Archive produced by make
    #[serde(default = "default_static_lib")]
    pub static_lib: String,

    /// Shared object linked from the archive
    #[serde(default = "default_shared_lib")]
    pub shared_lib: String,

    /// C compiler driver used for linking
    #[serde(default = "default_cc")]
    pub cc: String,

    #[serde(default = "default_make")]
    pub make: String,

    /// Extra arguments passed to make
    #[serde(default)]
    pub make_args: Vec<String>,
}

fn default_repo() -> PathBuf {
    PathBuf::from(".")
}

fn default_static_lib() -> String {
    "libasm.a".to_string()
}

fn default_shared_lib() -> String {
    "libasm.so".to_string()
}

fn default_cc() -> String {
    "gcc".to_string()
}

fn default_make() -> String {
    "make".to_string()
}

impl BuildConfig {
    /// Archive produced by make, inside the repository
    pub fn static_lib_path(&self) -> PathBuf {
        self.repo.join(&self.static_lib)
    }

    /// Shared object linked from the archive, inside the repository
    pub fn shared_lib_path(&self) -> PathBuf {
        self.repo.join(&self.shared_lib)
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            static_lib: default_static_lib(),
            shared_lib: default_shared_lib(),
            cc: default_cc(),
            make: default_make(),
            make_args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TesterConfig::default();
        assert_eq!(config.library.reference, "libc.so.6");
        assert_eq!(config.library.prefix, "ft_");
        assert_eq!(config.build.static_lib, "libasm.a");
        assert_eq!(config.build.cc, "gcc");
        assert!(config.build.make_args.is_empty());
        assert_eq!(config.subject_path(), PathBuf::from("./libasm.so"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[library]
prefix = "my_"

[build]
repo = "/src/libasm"
make_args = ["bonus"]
"#;
        let config: TesterConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.library.prefix, "my_");
        assert_eq!(config.library.reference, "libc.so.6");
        assert_eq!(config.build.make_args, vec!["bonus"]);
        assert_eq!(config.build.make, "make");
        assert_eq!(
            config.subject_path(),
            PathBuf::from("/src/libasm/libasm.so")
        );
    }

    #[test]
    fn test_subject_is_the_linked_library() {
        let config: TesterConfig = toml::from_str(
            r#"
[build]
repo = "/src/libasm"
shared_lib = "libft.so"
"#,
        )
        .unwrap();
        assert_eq!(config.subject_path(), PathBuf::from("/src/libasm/libft.so"));
        assert_eq!(config.subject_path(), config.build.shared_lib_path());
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: TesterConfig = toml::from_str("").unwrap();
        assert_eq!(config, TesterConfig::default());
    }

    #[test]
    fn test_find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let mut config = TesterConfig::default();
        config.build.cc = "clang".to_string();
        config.save(&dir.path().join(CONFIG_FILE)).unwrap();

        let found = TesterConfig::find_and_load(&nested).unwrap();
        assert_eq!(found.build.cc, "clang");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TesterConfig::load(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
