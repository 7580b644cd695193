//! Application configuration.
//!
//! Read from `~/.config/otalink/config.json` unless `--config` names another
//! file. Every field is optional; command-line flags override file values.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use otalink_data_channel::{DEFAULT_HEADER_ALLOWANCE, LinkConfig, LinkStrategy};
use otalink_transfer::TransferConfig;
use serde::Deserialize;

const DEFAULT_PORT: u16 = 7878;
const DEFAULT_MAX_PACKET_SIZE: u16 = 247;
const DEFAULT_PERIPHERAL_ID: &str = "otalink-device";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Device address used by `push`.
    pub addr: SocketAddr,
    /// Listen address used by `receive`.
    pub bind: SocketAddr,
    /// Maximum packet size of the link, headers included.
    pub max_packet_size: u16,
    /// Learn the packet size from the device.
    pub negotiate: bool,
    pub header_allowance: usize,
    pub connect_timeout_secs: u64,
    /// Identifier reported in progress events.
    pub peripheral_id: String,
    pub transfer: TransferConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            negotiate: false,
            header_allowance: DEFAULT_HEADER_ALLOWANCE,
            connect_timeout_secs: 30,
            peripheral_id: DEFAULT_PERIPHERAL_ID.into(),
            transfer: TransferConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the configuration from `path`, or from the default location.
    ///
    /// A missing file yields the defaults. So does an unparsable one, with
    /// a warning.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "configuration loaded");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Builds the link settings for `push`, applying command-line overrides.
    pub fn link_config(
        &self,
        addr: Option<SocketAddr>,
        packet_size: Option<u16>,
        negotiate: bool,
    ) -> LinkConfig {
        let strategy = if negotiate || (self.negotiate && packet_size.is_none()) {
            LinkStrategy::Negotiated
        } else {
            LinkStrategy::Fixed {
                max_packet_size: packet_size.unwrap_or(self.max_packet_size),
            }
        };
        let mut link = LinkConfig::new(addr.unwrap_or(self.addr), strategy);
        link.header_allowance = self.header_allowance;
        link.connect_timeout = self.connect_timeout();
        link
    }
}

fn config_path() -> anyhow::Result<PathBuf> {
    let config_dir = config_base_dir()?;
    Ok(config_dir.join("otalink").join("config.json"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home).join(".config"))
    }
}
