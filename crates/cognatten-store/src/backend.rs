//! Database backend selection.
//!
//! `COGNATTEN_DB_TYPE` picks the backend by name. Only SQLite is compiled
//! in; naming `mysql` or `postgres` is accepted at parse time and produces
//! a structured driver-unavailable error when the store is opened, so a
//! misconfigured deployment fails with a clear message instead of a silent
//! fallback.

use crate::StoreError;
use std::str::FromStr;

pub const DB_TYPE_ENV: &str = "COGNATTEN_DB_TYPE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
    Sqlite,
    Mysql,
    Postgres,
}

impl DbBackend {
    /// Read the backend from the environment, defaulting to SQLite.
    pub fn from_env() -> Result<Self, StoreError> {
        match std::env::var(DB_TYPE_ENV) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Self::Sqlite),
        }
    }

    /// Error unless the selected backend has a driver in this binary.
    pub fn ensure_available(self) -> Result<(), StoreError> {
        match self {
            Self::Sqlite => Ok(()),
            Self::Mysql => Err(StoreError::DriverUnavailable { backend: "mysql" }),
            Self::Postgres => Err(StoreError::DriverUnavailable { backend: "postgres" }),
        }
    }
}

impl FromStr for DbBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::Mysql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(StoreError::UnknownBackend(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_backends() {
        assert_eq!("sqlite".parse::<DbBackend>().unwrap(), DbBackend::Sqlite);
        assert_eq!("MySQL".parse::<DbBackend>().unwrap(), DbBackend::Mysql);
        assert_eq!(
            "postgresql".parse::<DbBackend>().unwrap(),
            DbBackend::Postgres
        );
    }

    #[test]
    fn test_parse_unknown_backend() {
        let err = "oracle".parse::<DbBackend>().unwrap_err();
        assert!(matches!(err, StoreError::UnknownBackend(name) if name == "oracle"));
    }

    #[test]
    fn test_only_sqlite_is_available() {
        assert!(DbBackend::Sqlite.ensure_available().is_ok());
        assert!(matches!(
            DbBackend::Mysql.ensure_available(),
            Err(StoreError::DriverUnavailable { backend: "mysql" })
        ));
        assert!(matches!(
            DbBackend::Postgres.ensure_available(),
            Err(StoreError::DriverUnavailable { backend: "postgres" })
        ));
    }
}
