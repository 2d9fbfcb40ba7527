//! Configuration of the consumer.
//!
//! [`BrokerConfig`] collects every option the consumer recognizes. It can be deserialized from a
//! JSON document, adjusted with [`BrokerConfig::set`], and is finally turned into the
//! librdkafka [`ClientConfig`] used to create the consumer.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use serde::Deserialize;

use crate::error::{ConsumerError, ConsumerResult};

/// Brokers used when no bootstrap servers are configured.
pub const DEFAULT_BOOTSTRAP_SERVERS: &str =
    "rpk0.bitquery.io:9093,rpk1.bitquery.io:9093,rpk2.bitquery.io:9093";

/// Consumer group used when neither a group nor a SASL username is configured.
pub const DEFAULT_GROUP_ID: &str = "json-consumer-group";

/// Protocol used to communicate with the brokers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum SecurityProtocol {
    /// Unauthenticated, unencrypted.
    #[serde(rename = "PLAINTEXT", alias = "plaintext")]
    Plaintext,
    /// TLS without SASL authentication.
    #[serde(rename = "SSL", alias = "ssl")]
    Ssl,
    /// SASL authentication without TLS.
    #[serde(rename = "SASL_PLAINTEXT", alias = "sasl_plaintext")]
    SaslPlaintext,
    /// SASL authentication over TLS.
    #[serde(rename = "SASL_SSL", alias = "sasl_ssl")]
    SaslSsl,
}

impl SecurityProtocol {
    /// Returns the name librdkafka uses for the protocol.
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "PLAINTEXT",
            SecurityProtocol::Ssl => "SSL",
            SecurityProtocol::SaslPlaintext => "SASL_PLAINTEXT",
            SecurityProtocol::SaslSsl => "SASL_SSL",
        }
    }

    /// Reports whether connections are encrypted.
    pub fn uses_tls(self) -> bool {
        matches!(self, SecurityProtocol::Ssl | SecurityProtocol::SaslSsl)
    }

    /// Reports whether connections are authenticated with SASL.
    pub fn uses_sasl(self) -> bool {
        matches!(
            self,
            SecurityProtocol::SaslPlaintext | SecurityProtocol::SaslSsl
        )
    }
}

impl FromStr for SecurityProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<SecurityProtocol, String> {
        match s.to_ascii_uppercase().as_str() {
            "PLAINTEXT" => Ok(SecurityProtocol::Plaintext),
            "SSL" => Ok(SecurityProtocol::Ssl),
            "SASL_PLAINTEXT" => Ok(SecurityProtocol::SaslPlaintext),
            "SASL_SSL" => Ok(SecurityProtocol::SaslSsl),
            _ => Err(format!("unknown security protocol: {}", s)),
        }
    }
}

/// Where to start consuming when the group has no committed offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    /// Start from the oldest available message.
    Earliest,
    /// Only consume messages produced after the assignment.
    Latest,
}

impl OffsetReset {
    /// Returns the value of `auto.offset.reset` for this policy.
    pub fn as_str(self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

impl FromStr for OffsetReset {
    type Err = String;

    fn from_str(s: &str) -> Result<OffsetReset, String> {
        match s.to_ascii_lowercase().as_str() {
            "earliest" | "smallest" | "beginning" => Ok(OffsetReset::Earliest),
            "latest" | "largest" | "end" => Ok(OffsetReset::Latest),
            _ => Err(format!("unknown offset reset policy: {}", s)),
        }
    }
}

/// A password that is never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    pub fn new<T: Into<String>>(value: T) -> Secret {
        Secret(value.into())
    }

    /// Returns the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Broker configuration.
///
/// Every field has a default, so a JSON document only needs to name the options it changes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Comma separated list of `host:port` pairs.
    pub bootstrap_servers: String,
    /// Consumer group. Derived from the SASL username when absent.
    pub group_id: Option<String>,
    /// Group session timeout, in milliseconds.
    pub session_timeout_ms: u32,
    /// Protocol used to communicate with the brokers.
    pub security_protocol: SecurityProtocol,
    /// CA certificate used to verify the brokers.
    pub ssl_ca_location: Option<PathBuf>,
    /// Client private key.
    pub ssl_key_location: Option<PathBuf>,
    /// Client certificate.
    pub ssl_certificate_location: Option<PathBuf>,
    /// Broker hostname verification, `none` to disable it.
    pub ssl_endpoint_identification_algorithm: Option<String>,
    /// SASL mechanism, e.g. `SCRAM-SHA-512`.
    pub sasl_mechanism: String,
    /// SASL username.
    pub sasl_username: Option<String>,
    /// SASL password.
    pub sasl_password: Option<Secret>,
    /// Where to start when the group has no committed offset.
    pub auto_offset_reset: OffsetReset,
    /// Whether librdkafka commits offsets in the background.
    pub enable_auto_commit: bool,
    /// Timeout of the metadata requests used to check connectivity and topic existence, in
    /// milliseconds. Zero disables the checks.
    pub metadata_timeout_ms: u64,
    /// Raw librdkafka properties, applied after every other option.
    pub properties: BTreeMap<String, String>,
}

impl Default for BrokerConfig {
    fn default() -> BrokerConfig {
        BrokerConfig {
            bootstrap_servers: DEFAULT_BOOTSTRAP_SERVERS.to_owned(),
            group_id: None,
            session_timeout_ms: 30_000,
            security_protocol: SecurityProtocol::SaslSsl,
            ssl_ca_location: Some(PathBuf::from("server.cer.pem")),
            ssl_key_location: Some(PathBuf::from("client.key.pem")),
            ssl_certificate_location: Some(PathBuf::from("client.cer.pem")),
            ssl_endpoint_identification_algorithm: Some("none".to_owned()),
            sasl_mechanism: "SCRAM-SHA-512".to_owned(),
            sasl_username: None,
            sasl_password: None,
            auto_offset_reset: OffsetReset::Latest,
            enable_auto_commit: false,
            metadata_timeout_ms: 10_000,
            properties: BTreeMap::new(),
        }
    }
}

impl BrokerConfig {
    /// Creates a configuration with all the defaults.
    pub fn new() -> BrokerConfig {
        BrokerConfig::default()
    }

    /// Loads a configuration from a JSON file. Missing options keep their default.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConsumerResult<BrokerConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConsumerError::ConfigFile(path.to_owned(), e.to_string()))?;
        serde_json::from_str(&content)
            .map_err(|e| ConsumerError::ConfigFile(path.to_owned(), e.to_string()))
    }

    /// Sets a raw librdkafka property, overriding any value derived from the other options.
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut BrokerConfig {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the consumer group, deriving it from the SASL username if needed.
    pub fn group_id(&self) -> String {
        match (&self.group_id, &self.sasl_username) {
            (Some(group_id), _) => group_id.clone(),
            (None, Some(username)) => format!("{}-mygroup", username),
            (None, None) => DEFAULT_GROUP_ID.to_owned(),
        }
    }

    /// Returns the timeout of the startup metadata checks, or `None` if they are disabled.
    pub fn metadata_timeout(&self) -> Option<Duration> {
        match self.metadata_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Checks the options that librdkafka would otherwise only reject at connection time.
    pub fn validate(&self) -> ConsumerResult<()> {
        if self.bootstrap_servers.split(',').all(|s| s.trim().is_empty()) {
            return Err(ConsumerError::Config("no bootstrap servers".to_owned()));
        }
        if self.session_timeout_ms == 0 {
            return Err(ConsumerError::Config(
                "session timeout must be positive".to_owned(),
            ));
        }
        if self.group_id.as_deref().is_some_and(str::is_empty) {
            return Err(ConsumerError::Config("empty consumer group".to_owned()));
        }
        if self.security_protocol.uses_sasl() {
            if self.sasl_username.as_deref().map_or(true, str::is_empty) {
                return Err(ConsumerError::Config(format!(
                    "{} requires a SASL username",
                    self.security_protocol.as_str()
                )));
            }
            if self.sasl_password.as_ref().map_or(true, |p| p.expose().is_empty()) {
                return Err(ConsumerError::Config(format!(
                    "{} requires a SASL password",
                    self.security_protocol.as_str()
                )));
            }
        }
        if self.properties.keys().any(|k| k.trim().is_empty()) {
            return Err(ConsumerError::Config("empty property name".to_owned()));
        }
        Ok(())
    }

    /// Validates the configuration and converts it to a librdkafka client configuration.
    pub fn client_config(&self) -> ConsumerResult<ClientConfig> {
        self.validate()?;

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.bootstrap_servers.as_str())
            .set("group.id", self.group_id())
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set("security.protocol", self.security_protocol.as_str())
            .set("auto.offset.reset", self.auto_offset_reset.as_str())
            .set("enable.auto.commit", self.enable_auto_commit.to_string());

        if self.security_protocol.uses_tls() {
            let files = [
                ("ssl.ca.location", &self.ssl_ca_location),
                ("ssl.key.location", &self.ssl_key_location),
                ("ssl.certificate.location", &self.ssl_certificate_location),
            ];
            for (key, path) in files {
                if let Some(path) = path {
                    config.set(key, path.to_string_lossy().into_owned());
                }
            }
            if let Some(algorithm) = &self.ssl_endpoint_identification_algorithm {
                config.set("ssl.endpoint.identification.algorithm", algorithm.as_str());
            }
        }

        if self.security_protocol.uses_sasl() {
            config.set("sasl.mechanisms", self.sasl_mechanism.as_str());
            if let Some(username) = &self.sasl_username {
                config.set("sasl.username", username.as_str());
            }
            if let Some(password) = &self.sasl_password {
                config.set("sasl.password", password.expose());
            }
        }

        for (key, value) in &self.properties {
            config.set(key.as_str(), value.as_str());
        }

        Ok(config)
    }
}
