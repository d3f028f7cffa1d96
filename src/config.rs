use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_DB_PATH: &str = "data/exams.sqlite";
pub const CONFIG_FILE: &str = "exams.toml";

/// Runtime settings. Lowest to highest priority: defaults, `exams.toml`,
/// `EXAMS_*` environment variables. CLI flags are applied by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    /// Term code used when `--term` is omitted.
    pub term: Option<String>,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Settings {
    pub fn load() -> Result<Settings, ConfigError> {
        Settings::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(file: &Path) -> Result<Settings, ConfigError> {
        Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("log_filter", "info")?
            .add_source(File::from(file).required(false))
            .add_source(Environment::with_prefix("EXAMS"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let settings = Settings::load_from(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(settings.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("exams-{}.toml", std::process::id()));
        std::fs::write(&path, "db_path = \"/tmp/fall.sqlite\"\nlog_filter = \"debug\"\n").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.db_path, PathBuf::from("/tmp/fall.sqlite"));
        assert_eq!(settings.log_filter, "debug");
    }

    #[test]
    fn environment_sets_term() {
        std::env::set_var("EXAMS_TERM", "202508");
        let settings = Settings::load_from(Path::new("does-not-exist.toml")).unwrap();
        std::env::remove_var("EXAMS_TERM");
        assert_eq!(settings.term.as_deref(), Some("202508"));
    }
}
