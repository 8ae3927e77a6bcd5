use super::error::ConfigError;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// What conflict detection returns when its data source cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Surface `ConflictError::DataUnavailable` to the caller.
    #[default]
    Propagate,
    /// Report no conflict.
    FailOpen,
    /// Report an `Unverified` conflict, which blocks submission.
    FailClosed,
}

impl FromStr for FallbackPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(FallbackPolicy::Propagate),
            "fail_open" => Ok(FallbackPolicy::FailOpen),
            "fail_closed" => Ok(FallbackPolicy::FailClosed),
            _ => Err(ConfigError::InvalidValue {
                key: "LEAVE_CONFLICT_FALLBACK",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub conflict_fallback: FallbackPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("leave_approval.db"),
            conflict_fallback: FallbackPolicy::default(),
        }
    }
}

impl Config {
    /// Reads `LEAVE_DATABASE_PATH` and `LEAVE_CONFLICT_FALLBACK`, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            database_path: lookup("LEAVE_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            conflict_fallback: match lookup("LEAVE_CONFLICT_FALLBACK") {
                Some(value) => value.parse()?,
                None => defaults.conflict_fallback,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_values_use_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reads_fallback_policy() {
        let vars = HashMap::from([
            ("LEAVE_DATABASE_PATH", "/tmp/leave.db"),
            ("LEAVE_CONFLICT_FALLBACK", "Fail_Closed"),
        ]);
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/leave.db"));
        assert_eq!(config.conflict_fallback, FallbackPolicy::FailClosed);
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = Config::from_lookup(|k| (k == "LEAVE_CONFLICT_FALLBACK").then(|| "maybe".into()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "LEAVE_CONFLICT_FALLBACK",
                value: "maybe".into()
            }
        );
    }
}
