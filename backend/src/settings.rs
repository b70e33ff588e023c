//! Relay configuration loaded via OrthoConfig.
//!
//! Values layer defaults, a configuration file, `VILLAGELINK_*` environment
//! variables, and command-line flags, in increasing precedence.

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{TableName, TableNameError, TrackedTables};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_POOL_MAX_SIZE: u32 = 10;

/// Settings values that parse but do not make sense.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid bind address {value:?}: {source}")]
    BindAddr {
        value: String,
        #[source]
        source: AddrParseError,
    },
    #[error("invalid tracked table list: {0}")]
    TrackedTables(#[from] TableNameError),
    #[error("tracked table list must name at least one table")]
    NoTrackedTables,
}

/// Runtime configuration of the relay process.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "VILLAGELINK")]
pub struct RelaySettings {
    /// Socket address the HTTP and WebSocket listener binds to.
    #[ortho_config(default = DEFAULT_BIND_ADDR.to_owned())]
    pub bind_addr: String,
    /// PostgreSQL URL. Without it the relay serves empty fixture data.
    pub database_url: Option<String>,
    /// Milliseconds between poll ticks.
    #[ortho_config(default = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
    /// Upper bound in milliseconds on one change-source call.
    #[ortho_config(default = DEFAULT_STORE_TIMEOUT_MS)]
    pub store_timeout_ms: u64,
    /// Maximum pooled database connections.
    #[ortho_config(default = DEFAULT_POOL_MAX_SIZE)]
    pub pool_max_size: u32,
    /// Subset of tables to poll, e.g. `VILLAGELINK_TRACKED_TABLES="faqs,comreqs"`.
    pub tracked_tables: Option<Vec<String>>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            database_url: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            tracked_tables: None,
        }
    }
}

impl RelaySettings {
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let value = self.bind_addr.trim();
        value.parse().map_err(|source| SettingsError::BindAddr {
            value: value.to_owned(),
            source,
        })
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn pool_max_size(&self) -> u32 {
        self.pool_max_size
    }

    /// Tracked tables, defaulting to the full VillageLink set.
    ///
    /// Entries are trimmed and blank entries dropped, so both
    /// `"faqs, comreqs"` and `["faqs", "comreqs"]` name the same two tables.
    pub fn tracked_tables(&self) -> Result<TrackedTables, SettingsError> {
        let Some(names) = self.tracked_tables.as_deref() else {
            return Ok(TrackedTables::default());
        };
        let tables = names
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(TableName::new)
            .collect::<Result<Vec<_>, _>>()
            .map(TrackedTables::new)?;
        if tables.is_empty() {
            return Err(SettingsError::NoTrackedTables);
        }
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for relay configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 6] = [
        "VILLAGELINK_BIND_ADDR",
        "VILLAGELINK_DATABASE_URL",
        "VILLAGELINK_POLL_INTERVAL_MS",
        "VILLAGELINK_STORE_TIMEOUT_MS",
        "VILLAGELINK_POOL_MAX_SIZE",
        "VILLAGELINK_TRACKED_TABLES",
    ];

    fn load_from_empty_args() -> RelaySettings {
        RelaySettings::load_from_iter([OsString::from("villagelink")])
            .expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(
            settings.bind_addr().expect("bind addr"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("addr")
        );
        assert_eq!(settings.database_url(), None);
        assert_eq!(settings.poll_interval(), Duration::from_millis(3000));
        assert_eq!(settings.store_timeout(), Duration::from_secs(5));
        assert_eq!(settings.pool_max_size(), 10);
        assert_eq!(settings.tracked_tables().expect("tables").len(), 8);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("VILLAGELINK_BIND_ADDR", Some("127.0.0.1:9090".to_owned())),
            (
                "VILLAGELINK_DATABASE_URL",
                Some("postgres://relay@db/villagelink".to_owned()),
            ),
            ("VILLAGELINK_POLL_INTERVAL_MS", Some("500".to_owned())),
            ("VILLAGELINK_STORE_TIMEOUT_MS", Some("750".to_owned())),
            ("VILLAGELINK_POOL_MAX_SIZE", Some("3".to_owned())),
            (
                "VILLAGELINK_TRACKED_TABLES",
                Some("faqs, comreqs".to_owned()),
            ),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.bind_addr().expect("bind addr"),
            "127.0.0.1:9090".parse::<SocketAddr>().expect("addr")
        );
        assert_eq!(settings.database_url(), Some("postgres://relay@db/villagelink"));
        assert_eq!(settings.poll_interval(), Duration::from_millis(500));
        assert_eq!(settings.store_timeout(), Duration::from_millis(750));
        assert_eq!(settings.pool_max_size(), 3);
        let tables: Vec<String> = settings
            .tracked_tables()
            .expect("tables")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(tables, vec!["faqs", "comreqs"]);
    }

    #[rstest]
    fn comma_separated_entries_are_split_and_trimmed() {
        let settings = RelaySettings {
            tracked_tables: Some(vec!["faqs, comreqs".to_owned(), " users ".to_owned()]),
            ..RelaySettings::default()
        };
        let tables: Vec<String> = settings
            .tracked_tables()
            .expect("tables")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(tables, vec!["faqs", "comreqs", "users"]);
    }

    #[test]
    fn bind_addr_without_port_is_rejected() {
        let settings = RelaySettings {
            bind_addr: "localhost".to_owned(),
            ..RelaySettings::default()
        };
        assert!(matches!(
            settings.bind_addr(),
            Err(SettingsError::BindAddr { .. })
        ));
    }

    #[rstest]
    #[case(&["users; drop table users"])]
    #[case(&["faqs", "Users"])]
    #[case(&["faqs,Users"])]
    fn invalid_table_names_are_rejected(#[case] raw: &[&str]) {
        let settings = RelaySettings {
            tracked_tables: Some(raw.iter().map(|name| (*name).to_owned()).collect()),
            ..RelaySettings::default()
        };
        assert!(matches!(
            settings.tracked_tables(),
            Err(SettingsError::TrackedTables(_))
        ));
    }

    #[test]
    fn blank_table_list_is_rejected() {
        let settings = RelaySettings {
            tracked_tables: Some(vec![" , ".to_owned(), String::new()]),
            ..RelaySettings::default()
        };
        assert!(matches!(
            settings.tracked_tables(),
            Err(SettingsError::NoTrackedTables)
        ));
    }
}
