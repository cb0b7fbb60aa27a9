use std::{fmt, path::PathBuf, time::Duration};

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, ChannelResult};

/// Default ceiling applied to both sent and received messages (512 MiB).
pub const GRPC_MAX_MESSAGE_LENGTH: usize = 512 * 1024 * 1024;

/// Environment variables with this prefix override values from the
/// configuration file, e.g. `GRPC_CHANNEL_TOKEN`.
pub const ENV_PREFIX: &str = "GRPC_CHANNEL_";

fn default_max_message_length() -> usize {
    GRPC_MAX_MESSAGE_LENGTH
}

/// Everything needed to open an authenticated channel.
///
/// Root certificates select the transport: when present the channel is
/// secured with TLS, otherwise it is plaintext.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Target of the channel, `host:port` or a full `http(s)://` URI.
    pub server_address: String,
    /// Sent as `authorization: Bearer <token>` on every call.
    #[serde(default)]
    pub token: String,
    /// PEM file holding the trust anchors. Read into `root_certificates`
    /// when the configuration is loaded from a file.
    #[serde(default)]
    pub root_certificates_path: Option<PathBuf>,
    /// PEM-encoded trust anchors.
    #[serde(skip)]
    pub root_certificates: Option<Vec<u8>>,
    /// Applied to both the send and the receive direction.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Server name used for TLS verification. Defaults to the host of
    /// `server_address`.
    #[serde(default)]
    pub domain_name: Option<String>,
    /// Upper bound on establishing the connection. Written as
    /// `connect_timeout_ms` in files and the environment.
    #[serde(default, rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Option<Duration>,
}

/// `Option<Duration>` as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .map(|timeout| timeout.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

impl ChannelConfig {
    pub fn new(server_address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            token: token.into(),
            root_certificates_path: None,
            root_certificates: None,
            max_message_length: GRPC_MAX_MESSAGE_LENGTH,
            domain_name: None,
            connect_timeout: None,
        }
    }

    pub fn with_root_certificates(mut self, root_certificates: impl Into<Vec<u8>>) -> Self {
        self.root_certificates = Some(root_certificates.into());
        self
    }

    pub fn with_max_message_length(mut self, max_message_length: usize) -> Self {
        self.max_message_length = max_message_length;
        self
    }

    pub fn with_domain_name(mut self, domain_name: impl Into<String>) -> Self {
        self.domain_name = Some(domain_name.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn from_path(path: &str) -> ChannelResult<ChannelConfig> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> ChannelResult<ChannelConfig> {
        let mut config: ChannelConfig = Figment::new()
            .merge(Yaml::string(config_str))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;

        if config.root_certificates.is_none() {
            if let Some(path) = &config.root_certificates_path {
                config.root_certificates = Some(std::fs::read(path)?);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ChannelResult<()> {
        if self.server_address.trim().is_empty() {
            return Err(ChannelError::invalid_config("server_address must not be empty"));
        }
        if self.max_message_length == 0 {
            return Err(ChannelError::invalid_config(
                "max_message_length must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("server_address", &self.server_address)
            .field("token", &"<redacted>")
            .field("root_certificates_path", &self.root_certificates_path)
            .field(
                "root_certificates",
                &self.root_certificates.as_ref().map(|certs| certs.len()),
            )
            .field("max_message_length", &self.max_message_length)
            .field("domain_name", &self.domain_name)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
