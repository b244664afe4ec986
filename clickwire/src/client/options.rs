use std::time::Duration;

use crate::constants::{TCP_CONNECT_TIMEOUT, TCP_READ_TIMEOUT};
use crate::prelude::Secret;

/// Options set for a connection to `ClickHouse`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Username credential
    pub username:         String,
    /// Password credential. [`Secret`] is used to minimize likelihood of exposure through logs
    pub password:         Secret,
    /// Scope this client to a specific database, otherwise 'default' is used
    pub default_database: String,
    /// Whether any non-ipv4 socket addrs should be filtered out.
    pub ipv4_only:        bool,
    /// Cap on establishing the TCP connection.
    pub connect_timeout:  Duration,
    /// Cap on each wait for server bytes. Long queries stay alive through
    /// progress packets, so this bounds silence rather than total runtime.
    pub read_timeout:     Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            username:         "default".to_string(),
            password:         Secret::new(""),
            default_database: String::new(),
            ipv4_only:        false,
            connect_timeout:  Duration::from_secs(TCP_CONNECT_TIMEOUT),
            read_timeout:     Duration::from_secs(TCP_READ_TIMEOUT),
        }
    }
}

/// Helpful methods for [`ClientOptions`].
impl ClientOptions {
    /// Set the username credential.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the password credential.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<Secret>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the database every query and insert runs against.
    #[must_use]
    pub fn with_default_database(mut self, database: impl Into<String>) -> Self {
        self.default_database = database.into();
        self
    }

    /// Set whether non-ipv4 socket addrs are filtered out during resolution.
    #[must_use]
    pub fn with_ipv4_only(mut self, value: bool) -> Self {
        self.ipv4_only = value;
        self
    }

    /// Set the connection establishment timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.username, "default");
        assert_eq!(options.password.get(), "");
        assert_eq!(options.default_database, "");
        assert!(!options.ipv4_only);
        assert_eq!(options.connect_timeout, Duration::from_secs(30));
        assert_eq!(options.read_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builder_methods_chain() {
        let options = ClientOptions::default()
            .with_username("reader")
            .with_password("hunter2")
            .with_default_database("metrics")
            .with_ipv4_only(true)
            .with_read_timeout(Duration::from_secs(5));
        assert_eq!(options.username, "reader");
        assert_eq!(options.password.get(), "hunter2");
        assert_eq!(options.default_database, "metrics");
        assert!(options.ipv4_only);
        assert_eq!(options.read_timeout, Duration::from_secs(5));
        assert!(format!("{options:?}").contains("Password(*****)"));
    }
}
