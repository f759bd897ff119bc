//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a default so a client can start from an empty file.

use serde::{Deserialize, Serialize};

use super::nickname::generate_nickname;
use crate::flood::FloodConfig;

/// Root configuration for one client connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registration: RegistrationInfo,
    #[serde(default)]
    pub flood: FloodConfig,
    #[serde(default)]
    pub tracking: UserTracking,
    #[serde(default)]
    pub dialect: DialectKind,
    /// Channels the demo binary joins once registered.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            registration: RegistrationInfo::default(),
            flood: FloodConfig::default(),
            tracking: UserTracking::default(),
            dialect: DialectKind::default(),
            channels: vec!["#crabirc".into()],
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Cap on buffered input without a line terminator.
    #[serde(default = "default_max_line")]
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_line_length: default_max_line(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Credentials sent during registration. Fixed once registration begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistrationInfo {
    User(UserRegistration),
    Service(ServiceRegistration),
}

impl Default for RegistrationInfo {
    fn default() -> Self {
        RegistrationInfo::User(UserRegistration::default())
    }
}

impl RegistrationInfo {
    pub fn nickname(&self) -> &str {
        match self {
            RegistrationInfo::User(u) => &u.nickname,
            RegistrationInfo::Service(s) => &s.nickname,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, RegistrationInfo::Service(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistration {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "generate_nickname")]
    pub nickname: String,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default = "default_real_name")]
    pub real_name: String,
    /// Initial user modes; only `i` and `w` can be requested at registration.
    #[serde(default)]
    pub user_modes: Vec<char>,
}

impl Default for UserRegistration {
    fn default() -> Self {
        Self {
            password: None,
            nickname: generate_nickname(),
            user_name: default_user_name(),
            real_name: default_real_name(),
            user_modes: vec!['i'],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    #[serde(default)]
    pub password: Option<String>,
    pub nickname: String,
    #[serde(default = "default_distribution")]
    pub distribution: String,
    #[serde(default)]
    pub description: String,
}

/// What happens to a user who is no longer on any known channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTracking {
    /// Keep the entry until the user quits.
    #[default]
    RetainUntilQuit,
    /// Drop the entry once the last channel that made it visible is gone.
    CollectUnseen,
}

/// Which client variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    #[default]
    Standard,
    /// Servers that never send RPL_WELCOME; registered at end of MOTD.
    MotdRegistration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_true")]
    pub log_received: bool,
    #[serde(default = "default_true")]
    pub log_sent: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            log_received: true,
            log_sent: true,
        }
    }
}

fn default_host() -> String {
    "irc.libera.chat".into()
}

fn default_port() -> u16 {
    6667
}

fn default_max_line() -> usize {
    crate::irc::framer::DEFAULT_MAX_LINE
}

fn default_user_name() -> String {
    "crabirc".into()
}

fn default_real_name() -> String {
    "crabirc client".into()
}

fn default_distribution() -> String {
    "*".into()
}

fn default_log_dir() -> String {
    "~/.local/share/crabirc/logs".into()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flood::FloodPolicy;

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 6667);
        assert_eq!(cfg.tracking, UserTracking::RetainUntilQuit);
        assert_eq!(cfg.dialect, DialectKind::Standard);
        assert!(!cfg.registration.is_service());
        assert!(!cfg.registration.nickname().is_empty());
    }

    #[test]
    fn test_user_registration_from_toml() {
        let cfg: ClientConfig = toml::from_str(
            r##"
            channels = ["#rust"]
            tracking = "collect_unseen"
            dialect = "motd_registration"

            [server]
            host = "irc.example.net"
            port = 6697

            [registration]
            kind = "user"
            nickname = "ferris"
            user_modes = ["i", "w"]

            [flood]
            policy = "fixed"
            interval_ms = 750
            "##,
        )
        .unwrap();
        assert_eq!(cfg.server.address(), "irc.example.net:6697");
        assert_eq!(cfg.registration.nickname(), "ferris");
        assert_eq!(cfg.tracking, UserTracking::CollectUnseen);
        assert_eq!(cfg.dialect, DialectKind::MotdRegistration);
        assert_eq!(cfg.flood.policy, FloodPolicy::Fixed);
        assert_eq!(cfg.flood.interval_ms, 750);
        assert_eq!(cfg.flood.max_burst, 4);
        match cfg.registration {
            RegistrationInfo::User(u) => {
                assert_eq!(u.user_name, "crabirc");
                assert_eq!(u.user_modes, vec!['i', 'w']);
            }
            RegistrationInfo::Service(_) => panic!("expected user registration"),
        }
    }

    #[test]
    fn test_service_registration_from_toml() {
        let cfg: ClientConfig = toml::from_str(
            r#"
            [registration]
            kind = "service"
            nickname = "stats"
            description = "Network statistics"
            "#,
        )
        .unwrap();
        assert!(cfg.registration.is_service());
        assert_eq!(cfg.registration.nickname(), "stats");
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let cfg = ClientConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.registration, cfg.registration);
        assert_eq!(back.channels, cfg.channels);
    }
}
