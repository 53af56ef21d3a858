//! TOML-based configuration for ES4C, with secrets taken from the environment.

use crate::error::{Es4cError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level ES4C configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Es4cConfig {
    pub es4c: Es4cSection,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Core instance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Es4cSection {
    pub instance_name: String,
    /// Public host name used to build links in outgoing email.
    #[serde(default)]
    pub host_fqdn: String,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/var/lib/es4c/es4c.db".into()
}

/// Web front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_session_hours")]
    pub session_hours: i64,
    /// Email domains allowed to register (e.g. `["example.edu"]`).
    #[serde(default)]
    pub allowed_email_domains: Vec<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            session_hours: default_session_hours(),
            allowed_email_domains: Vec::new(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_session_hours() -> i64 {
    24
}

/// Outgoing mail (SMTP with STARTTLS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default, skip_serializing)]
    pub smtp_password: String,
    #[serde(default)]
    pub sender: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            sender: String::new(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

/// Message broker (Redis streams) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Namespace prefixed to every stream and result key.
    #[serde(default)]
    pub vhost: String,
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(default)]
    pub ca_cert: Option<String>,
    #[serde(default)]
    pub client_cert: Option<String>,
    #[serde(default)]
    pub client_key: Option<String>,
    /// Number of job streams. Jobs for one username always land on the same one.
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    #[serde(default = "default_result_ttl")]
    pub result_ttl_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_broker_port(),
            user: String::new(),
            password: String::new(),
            vhost: String::new(),
            tls: true,
            ca_cert: None,
            client_cert: None,
            client_key: None,
            partitions: default_partitions(),
            result_ttl_secs: default_result_ttl(),
        }
    }
}

fn default_broker_port() -> u16 {
    6379
}

fn default_partitions() -> u32 {
    4
}

fn default_result_ttl() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

/// Directory (Samba AD DC) connection and provisioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_directory_server")]
    pub server: String,
    #[serde(default)]
    pub base_dn: String,
    #[serde(default)]
    pub bind_dn: String,
    #[serde(default, skip_serializing)]
    pub admin_password: String,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
    /// Container new users are created in, relative to `base_dn`.
    #[serde(default = "default_users_container")]
    pub users_container: String,
    #[serde(default = "default_login_shell")]
    pub login_shell: String,
    #[serde(default = "default_home_prefix")]
    pub home_prefix: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            server: default_directory_server(),
            base_dn: String::new(),
            bind_dn: String::new(),
            admin_password: String::new(),
            tls_verify: true,
            users_container: default_users_container(),
            login_shell: default_login_shell(),
            home_prefix: default_home_prefix(),
        }
    }
}

fn default_directory_server() -> String {
    "ldaps://localhost:636".into()
}

fn default_users_container() -> String {
    "CN=Users".into()
}

fn default_login_shell() -> String {
    "/bin/bash".into()
}

fn default_home_prefix() -> String {
    "/home".into()
}

/// Directory worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Consumer identity in the broker group. Every worker process needs its
    /// own, since pending jobs are handed back to the consumer that read them.
    /// Defaults to `worker-<hostname>`.
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,
    /// Partitions this worker consumes. Empty means all of them.
    #[serde(default)]
    pub partitions: Vec<u32>,
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            consumer_name: default_consumer_name(),
            partitions: Vec::new(),
            block_ms: default_block_ms(),
        }
    }
}

fn default_consumer_name() -> String {
    format!("worker-{}", hostname())
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_block_ms() -> u64 {
    5000
}

/// Environment variables that override secret or deployment-specific values.
pub const ENV_BROKER_HOST: &str = "ES4C_BROKER_HOST";
pub const ENV_BROKER_PORT: &str = "ES4C_BROKER_PORT";
pub const ENV_BROKER_USER: &str = "ES4C_BROKER_USER";
pub const ENV_BROKER_PASSWORD: &str = "ES4C_BROKER_PASSWORD";
pub const ENV_BROKER_VHOST: &str = "ES4C_BROKER_VHOST";
pub const ENV_BROKER_CA_CERT: &str = "ES4C_BROKER_CA_CERT";
pub const ENV_BROKER_CLIENT_CERT: &str = "ES4C_BROKER_CLIENT_CERT";
pub const ENV_BROKER_CLIENT_KEY: &str = "ES4C_BROKER_CLIENT_KEY";
pub const ENV_DIRECTORY_ADMIN_PASSWORD: &str = "ES4C_DIRECTORY_ADMIN_PASSWORD";
pub const ENV_SMTP_PASSWORD: &str = "ES4C_SMTP_PASSWORD";

impl Es4cConfig {
    /// Load configuration from a TOML file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| Es4cError::Config(format!("failed to parse config: {e}")))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_BROKER_HOST) {
            self.broker.host = v;
        }
        if let Some(v) = lookup(ENV_BROKER_PORT) {
            self.broker.port = v.parse().map_err(|_| {
                Es4cError::Config(format!("{ENV_BROKER_PORT} is not a valid port: {v}"))
            })?;
        }
        if let Some(v) = lookup(ENV_BROKER_USER) {
            self.broker.user = v;
        }
        if let Some(v) = lookup(ENV_BROKER_PASSWORD) {
            self.broker.password = v;
        }
        if let Some(v) = lookup(ENV_BROKER_VHOST) {
            self.broker.vhost = v;
        }
        if let Some(v) = lookup(ENV_BROKER_CA_CERT) {
            self.broker.ca_cert = Some(v);
        }
        if let Some(v) = lookup(ENV_BROKER_CLIENT_CERT) {
            self.broker.client_cert = Some(v);
        }
        if let Some(v) = lookup(ENV_BROKER_CLIENT_KEY) {
            self.broker.client_key = Some(v);
        }
        if let Some(v) = lookup(ENV_DIRECTORY_ADMIN_PASSWORD) {
            self.directory.admin_password = v;
        }
        if let Some(v) = lookup(ENV_SMTP_PASSWORD) {
            self.mail.smtp_password = v;
        }
        Ok(())
    }

    /// Validate settings shared by every command.
    pub fn validate(&self) -> Result<()> {
        if self.es4c.instance_name.is_empty() {
            return Err(Es4cError::Config(
                "es4c.instance_name must not be empty".into(),
            ));
        }
        if self.es4c.database.path.is_empty() {
            return Err(Es4cError::Config(
                "es4c.database.path must not be empty".into(),
            ));
        }
        if self.broker.partitions == 0 {
            return Err(Es4cError::Config(
                "broker.partitions must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Validate the broker settings. Missing connection values are fatal.
    pub fn validate_broker(&self) -> Result<()> {
        let required = [
            (&self.broker.host, ENV_BROKER_HOST),
            (&self.broker.user, ENV_BROKER_USER),
            (&self.broker.password, ENV_BROKER_PASSWORD),
            (&self.broker.vhost, ENV_BROKER_VHOST),
        ];
        for (value, env) in required {
            if value.is_empty() {
                return Err(Es4cError::Config(format!(
                    "{env} must be set (broker connection is required)"
                )));
            }
        }
        if self.broker.client_cert.is_some() != self.broker.client_key.is_some() {
            return Err(Es4cError::Config(
                "broker.client_cert and broker.client_key must be set together".into(),
            ));
        }
        for path in [
            &self.broker.ca_cert,
            &self.broker.client_cert,
            &self.broker.client_key,
        ]
        .into_iter()
        .flatten()
        {
            if !Path::new(path).exists() {
                return Err(Es4cError::Config(format!(
                    "broker certificate file does not exist: {path}"
                )));
            }
        }
        if self.worker.partitions.iter().any(|p| *p >= self.broker.partitions) {
            return Err(Es4cError::Config(format!(
                "worker.partitions must be below broker.partitions ({})",
                self.broker.partitions
            )));
        }
        Ok(())
    }

    /// Validate the directory settings the worker needs.
    pub fn validate_directory(&self) -> Result<()> {
        if self.directory.server.is_empty() {
            return Err(Es4cError::Config("directory.server must be set".into()));
        }
        if self.directory.base_dn.is_empty() {
            return Err(Es4cError::Config("directory.base_dn must be set".into()));
        }
        if self.directory.bind_dn.is_empty() {
            return Err(Es4cError::Config("directory.bind_dn must be set".into()));
        }
        if self.directory.admin_password.is_empty() {
            return Err(Es4cError::Config(format!(
                "{ENV_DIRECTORY_ADMIN_PASSWORD} must be set"
            )));
        }
        Ok(())
    }

    /// Validate the settings the web front end needs.
    pub fn validate_web(&self) -> Result<()> {
        if self.es4c.host_fqdn.is_empty() {
            return Err(Es4cError::Config("es4c.host_fqdn must be set".into()));
        }
        if self.web.allowed_email_domains.is_empty() {
            return Err(Es4cError::Config(
                "web.allowed_email_domains must list at least one domain".into(),
            ));
        }
        if self.web.session_hours <= 0 {
            return Err(Es4cError::Config(
                "web.session_hours must be positive".into(),
            ));
        }
        if self.mail.enabled {
            if self.mail.smtp_server.is_empty() {
                return Err(Es4cError::Config(
                    "mail.smtp_server is required when mail is enabled".into(),
                ));
            }
            if self.mail.sender.is_empty() {
                return Err(Es4cError::Config(
                    "mail.sender is required when mail is enabled".into(),
                ));
            }
        }
        Ok(())
    }

    /// Generate a sensible default configuration.
    pub fn generate_default() -> Self {
        Self {
            es4c: Es4cSection {
                instance_name: "ES4C".into(),
                host_fqdn: "accounts.example.edu".into(),
                database: DatabaseConfig::default(),
            },
            web: WebConfig {
                allowed_email_domains: vec!["example.edu".into()],
                ..WebConfig::default()
            },
            mail: MailConfig::default(),
            broker: BrokerConfig::default(),
            directory: DirectoryConfig {
                base_dn: "DC=example,DC=edu".into(),
                bind_dn: "CN=Administrator,CN=Users,DC=example,DC=edu".into(),
                ..DirectoryConfig::default()
            },
            worker: WorkerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[es4c]
instance_name = "Campus Accounts"
host_fqdn = "accounts.campus.edu"

[es4c.database]
path = "/tmp/es4c.db"

[web]
port = 9000
allowed_email_domains = ["campus.edu", "alumni.campus.edu"]

[mail]
enabled = true
smtp_server = "smtp.campus.edu"
smtp_username = "mailer"
sender = "no-reply@campus.edu"

[broker]
host = "broker.campus.edu"
user = "es4c"
vhost = "accounts"
partitions = 8

[directory]
server = "ldaps://dc01.campus.edu:636"
base_dn = "DC=campus,DC=edu"
bind_dn = "CN=Administrator,CN=Users,DC=campus,DC=edu"

[worker]
consumer_name = "dc01"
partitions = [0, 1, 2, 3]
"#;

    fn parse_sample() -> Es4cConfig {
        toml::from_str(SAMPLE).expect("sample config parses")
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_full_config() {
        let config = parse_sample();
        assert_eq!(config.es4c.instance_name, "Campus Accounts");
        assert_eq!(config.es4c.database.path, "/tmp/es4c.db");
        assert_eq!(config.web.port, 9000);
        assert_eq!(config.web.session_hours, 24);
        assert_eq!(config.web.allowed_email_domains.len(), 2);
        assert_eq!(config.mail.smtp_port, 587);
        assert_eq!(config.broker.port, 6379);
        assert_eq!(config.broker.partitions, 8);
        assert_eq!(config.broker.result_ttl_secs, 3600);
        assert!(config.broker.tls);
        assert_eq!(config.directory.login_shell, "/bin/bash");
        assert_eq!(config.directory.users_container, "CN=Users");
        assert_eq!(config.worker.partitions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn minimal_config_parses() {
        let config: Es4cConfig = toml::from_str(
            r#"
[es4c]
instance_name = "Minimal"
"#,
        )
        .unwrap();
        assert_eq!(config.es4c.database.path, "/var/lib/es4c/es4c.db");
        assert_eq!(config.worker.block_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut config = parse_sample();
        config.broker.password = "broker-secret".into();
        config.directory.admin_password = "dc-secret".into();
        let out = toml::to_string(&config).unwrap();
        assert!(!out.contains("broker-secret"));
        assert!(!out.contains("dc-secret"));
    }

    #[test]
    fn overrides_fill_secrets() {
        let mut config = parse_sample();
        let vars = env(&[
            (ENV_BROKER_PASSWORD, "pw"),
            (ENV_BROKER_PORT, "6380"),
            (ENV_DIRECTORY_ADMIN_PASSWORD, "admin-pw"),
            (ENV_BROKER_VHOST, "prod"),
        ]);
        config.apply_overrides(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.broker.password, "pw");
        assert_eq!(config.broker.port, 6380);
        assert_eq!(config.broker.vhost, "prod");
        assert_eq!(config.directory.admin_password, "admin-pw");
        // untouched values stay
        assert_eq!(config.broker.host, "broker.campus.edu");
    }

    #[test]
    fn invalid_port_override_is_config_error() {
        let mut config = parse_sample();
        let vars = env(&[(ENV_BROKER_PORT, "not-a-port")]);
        let err = config.apply_overrides(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Es4cError::Config(_)));
    }

    #[test]
    fn validate_requires_instance_name() {
        let mut config = Es4cConfig::generate_default();
        config.es4c.instance_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_partitions() {
        let mut config = Es4cConfig::generate_default();
        config.broker.partitions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn broker_password_missing_is_fatal() {
        let config = parse_sample();
        let err = config.validate_broker().unwrap_err();
        assert!(err.to_string().contains(ENV_BROKER_PASSWORD));
    }

    #[test]
    fn broker_complete_passes() {
        let mut config = parse_sample();
        config.broker.password = "pw".into();
        assert!(config.validate_broker().is_ok());
    }

    #[test]
    fn broker_cert_and_key_go_together() {
        let mut config = parse_sample();
        config.broker.password = "pw".into();
        config.broker.client_cert = Some("/nonexistent/cert.pem".into());
        let err = config.validate_broker().unwrap_err();
        assert!(err.to_string().contains("together"));
    }

    #[test]
    fn broker_cert_files_must_exist() {
        let mut config = parse_sample();
        config.broker.password = "pw".into();
        config.broker.ca_cert = Some("/nonexistent/ca.pem".into());
        let err = config.validate_broker().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn worker_partition_out_of_range() {
        let mut config = parse_sample();
        config.broker.password = "pw".into();
        config.worker.partitions = vec![8];
        assert!(config.validate_broker().is_err());
    }

    #[test]
    fn directory_password_missing_is_fatal() {
        let config = parse_sample();
        let err = config.validate_directory().unwrap_err();
        assert!(err.to_string().contains(ENV_DIRECTORY_ADMIN_PASSWORD));
    }

    #[test]
    fn directory_complete_passes() {
        let mut config = parse_sample();
        config.directory.admin_password = "pw".into();
        assert!(config.validate_directory().is_ok());
    }

    #[test]
    fn web_requires_allowed_domains() {
        let mut config = parse_sample();
        config.web.allowed_email_domains.clear();
        assert!(config.validate_web().is_err());
    }

    #[test]
    fn web_mail_requires_sender() {
        let mut config = parse_sample();
        config.mail.sender = String::new();
        assert!(config.validate_web().is_err());
    }

    #[test]
    fn generate_default_is_valid() {
        let config = Es4cConfig::generate_default();
        assert!(config.validate().is_ok());
        assert!(config.validate_web().is_ok());
    }

    #[test]
    fn consumer_name_defaults_to_host() {
        let name = WorkerConfig::default().consumer_name;
        assert!(name.starts_with("worker-"));
        assert!(name.len() > "worker-".len());
        assert_eq!(parse_sample().worker.consumer_name, "dc01");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("es4c.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = Es4cConfig::load(&path).unwrap();
        assert_eq!(config.es4c.instance_name, "Campus Accounts");
    }

    #[test]
    fn load_nonexistent_file_returns_io_error() {
        let result = Es4cConfig::load(Path::new("/nonexistent/es4c.toml"));
        assert!(matches!(result, Err(Es4cError::Io(_))));
    }

    #[test]
    fn load_invalid_toml_returns_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();
        let result = Es4cConfig::load(&path);
        assert!(matches!(result, Err(Es4cError::Config(_))));
    }
}
