//! Startup configuration: a TOML file merged with environment overrides,
//! using the `config` crate's standard file-then-environment layering.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "janus.gateway.toml";

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub general: General,
    pub webserver: WebServer,
    #[serde(default)]
    pub certificates: Option<Certificates>,
    pub nat: Nat,
    pub media: Media,
}

impl Config {
    /// Reads `<config_dir>/janus.gateway.toml`, then overlays `APP__`-prefixed
    /// environment variables.
    pub fn from_dir(config_dir: &Path) -> Result<Self> {
        let mut path = config_dir.to_path_buf();
        path.push(CONFIG_FILE_NAME);

        let path_str = path.to_string_lossy();
        log::info!("Reading config located at {}", path_str);

        let mut parser = config::Config::default();
        parser
            .merge(config::File::new(&path_str, config::FileFormat::Toml))
            .with_context(|| format!("Failed to read config file {}", path_str))?;
        parser
            .merge(config::Environment::with_prefix("APP").separator("__"))
            .context("Failed to merge environment overrides")?;

        let config: Config = parser.try_into().context("Failed to deserialize config")?;
        config.webserver.check()?;

        if let Some(certificates) = &config.certificates {
            certificates.check()?;
        }

        Ok(config)
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct General {
    /// Wall-clock interval between session garbage-collection sweeps:
    /// sessions untouched since this window closes are reaped.
    pub session_timeout_secs: u64,
}

#[derive(Clone, Deserialize, Debug)]
pub struct WebServer {
    pub interface: String,
    pub http_port: Option<u16>,
    pub https_port: Option<u16>,
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

fn default_base_path() -> String {
    "/janus".to_owned()
}

impl WebServer {
    fn check(&self) -> Result<()> {
        if self.http_port.is_none() && self.https_port.is_none() {
            anyhow::bail!("webserver: at least one of http_port or https_port must be set");
        }

        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct Certificates {
    pub cert_pem_path: PathBuf,
    pub cert_key_path: PathBuf,
}

impl Certificates {
    fn check(&self) -> Result<()> {
        if !self.cert_pem_path.exists() {
            anyhow::bail!("certificates: cert_pem_path {} does not exist", self.cert_pem_path.display());
        }

        if !self.cert_key_path.exists() {
            anyhow::bail!("certificates: cert_key_path {} does not exist", self.cert_key_path.display());
        }

        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct Nat {
    pub stun_server: Option<String>,
    pub stun_port: Option<u16>,
    pub public_ip: Option<String>,
}

#[derive(Clone, Deserialize, Debug)]
pub struct Media {
    pub rtp_port_range_min: u16,
    pub rtp_port_range_max: u16,
}
