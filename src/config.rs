use crate::dynamic_update::tsig::{TsigError, TsigKey};
use crate::error::ConfigError;
use crate::record::OwnerScope;
use crate::transport::Protocol;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Nameserver receiving queries and updates, `host` or `host:port`
    pub nameserver: String,

    /// TSIG algorithm name (empty = hmac-sha256)
    pub tsig_algorithm: String,

    /// TSIG key name; signing is enabled when both key name and secret are set
    pub tsig_keyname: String,

    /// Base64 encoded TSIG shared secret
    pub tsig_secret: String,

    /// Timeout for one request/reply exchange, in seconds
    pub timeout_secs: u64,

    /// Transport protocol
    pub protocol: Protocol,

    /// Owner name written on outgoing records
    pub owner_scope: OwnerScope,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            nameserver: "127.0.0.1:53".to_string(),
            tsig_algorithm: String::new(),
            tsig_keyname: String::new(),
            tsig_secret: String::new(),
            timeout_secs: 5,
            protocol: Protocol::Udp,
            owner_scope: OwnerScope::ZoneApex,
        }
    }
}

impl ProviderConfig {
    /// Create a ProviderConfig from environment variables
    /// Returns Err if critical configuration is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from `RFC2136_*` variables supplied by `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(nameserver) = lookup("RFC2136_NAMESERVER") {
            config.nameserver = nameserver.trim().to_string();
        }

        if let Some(algorithm) = lookup("RFC2136_TSIG_ALGORITHM") {
            config.tsig_algorithm = algorithm.trim().to_string();
        }

        if let Some(keyname) = lookup("RFC2136_TSIG_KEYNAME") {
            config.tsig_keyname = keyname.trim().to_string();
        }

        if let Some(secret) = lookup("RFC2136_TSIG_SECRET") {
            config.tsig_secret = secret.trim().to_string();
        }

        if let Some(timeout_str) = lookup("RFC2136_TIMEOUT") {
            config.timeout_secs = timeout_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(timeout_str.clone()))?;
        }

        if let Some(protocol) = lookup("RFC2136_PROTOCOL") {
            config.protocol = protocol
                .parse()
                .map_err(|_| ConfigError::InvalidProtocol(protocol.clone()))?;
        }

        if let Some(scope) = lookup("RFC2136_OWNER_SCOPE") {
            config.owner_scope = scope
                .parse()
                .map_err(|_| ConfigError::InvalidOwnerScope(scope.clone()))?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::ParseError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nameserver.trim().is_empty() {
            return Err(ConfigError::InvalidNameserver(
                "Nameserver must not be empty".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if self.timeout_secs > 300 {
            return Err(ConfigError::InvalidTimeout(
                "Timeout too large (max 300 seconds)".to_string(),
            ));
        }

        self.tsig_key()?;

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The TSIG key described by the settings, if signing is enabled
    pub fn tsig_key(&self) -> Result<Option<TsigKey>, ConfigError> {
        TsigKey::from_settings(&self.tsig_keyname, &self.tsig_algorithm, &self.tsig_secret)
            .map_err(|e| match e {
                TsigError::UnknownAlgorithm(name) => ConfigError::InvalidTsigAlgorithm(name),
                other => ConfigError::InvalidTsigSecret(other.to_string()),
            })
    }
}
