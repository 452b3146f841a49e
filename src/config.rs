use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util;

quick_error! {
    #[derive(Debug)]
    pub enum ConfigError {
        IOError(err: std::io::Error) {
            from()
            display("could not read config: {}", err)
        }
        Json(err: serde_json::Error) {
            from()
            display("could not parse config: {}", err)
        }
        Invalid(message: String) {
            display("invalid config: {}", message)
        }
    }
}

/// Election settings, read from a json file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ElectionConfig {
    pub about: String,
    pub candidates: Vec<String>,
    /// Length of the voting window in seconds.
    pub duration: f64,
    /// Unix time at which voting opens; defaults to board creation time.
    pub start_time: Option<f64>,
    /// Number of tokens issued when the board is first created.
    pub tokens: usize,
    pub key_bits: u32,
    pub key_path: PathBuf,
    pub board_path: PathBuf,
    pub tokens_path: PathBuf,
}

impl Default for ElectionConfig {
    fn default() -> ElectionConfig {
        ElectionConfig {
            about: String::new(),
            candidates: vec![],
            duration: 3600.0,
            start_time: None,
            tokens: 100,
            key_bits: 2048,
            key_path: PathBuf::from("election_key.json"),
            board_path: PathBuf::from("board.json"),
            tokens_path: PathBuf::from("tokens.txt"),
        }
    }
}

impl ElectionConfig {
    pub fn load(path: &Path) -> Result<ElectionConfig, ConfigError> {
        let bytes = util::read_file_bytes(path)?;
        let config: ElectionConfig = serde_json::from_slice(&bytes)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidates.is_empty() {
            return Err(ConfigError::Invalid("no candidates".to_string()));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "duration must be positive, found {}",
                self.duration
            )));
        }
        if let Some(start) = self.start_time {
            if !start.is_finite() {
                return Err(ConfigError::Invalid("start_time is not finite".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::tempdir;

    use crate::config::*;

    #[test]
    fn test_load_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("election.json");
        fs::write(
            &path,
            r#"{ "about": "Class representative", "candidates": ["Ana", "Bruno"], "tokens": 30 }"#,
        )
        .unwrap();

        let config = ElectionConfig::load(&path).unwrap();
        assert_eq!(config.candidates.len(), 2);
        assert_eq!(config.tokens, 30);
        assert_eq!(config.duration, 3600.0);
        assert_eq!(config.key_bits, 2048);
        assert_eq!(config.board_path, PathBuf::from("board.json"));
        assert!(config.start_time.is_none());
    }

    #[test]
    fn test_invalid() {
        let mut config = ElectionConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.candidates = vec!["A".to_string()];
        assert!(config.validate().is_ok());
        config.duration = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unreadable() {
        let result = ElectionConfig::load(&PathBuf::from("/nonexistent/election.json"));
        assert!(matches!(result, Err(ConfigError::IOError(_))));
    }
}
