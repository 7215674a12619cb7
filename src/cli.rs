//! Command-line flags, layered on top of the config file: each flag is
//! optional and overrides the matching config key when present.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[clap(name = "janusd", about = "Signaling and media-relay gateway")]
pub struct Args {
    /// Network interface to bind the HTTP/HTTPS listeners to.
    #[clap(long)]
    pub interface: Option<String>,

    /// Directory holding `janus.gateway.toml` and per-plugin config files.
    #[clap(long, default_value = "/etc/janus")]
    pub configs_folder: PathBuf,

    /// Directory scanned at startup for plugin modules.
    #[clap(long, default_value = "/usr/lib/janus/plugins")]
    pub plugins_folder: PathBuf,

    /// Disables the plain-HTTP listener entirely.
    #[clap(long)]
    pub disable_http: bool,

    #[clap(long)]
    pub http_port: Option<u16>,

    #[clap(long)]
    pub https_port: Option<u16>,

    #[clap(long)]
    pub base_path: Option<String>,

    #[clap(long)]
    pub cert_pem: Option<PathBuf>,

    #[clap(long)]
    pub cert_key: Option<PathBuf>,

    #[clap(long)]
    pub stun_server: Option<String>,

    #[clap(long)]
    pub public_ip: Option<String>,

    /// `min-max`, e.g. `10000-20000`.
    #[clap(long)]
    pub rtp_port_range: Option<String>,
}

impl Args {
    pub fn parsed_rtp_port_range(&self) -> Option<(u16, u16)> {
        let range = self.rtp_port_range.as_ref()?;
        let (min, max) = range.split_once('-')?;
        Some((min.parse().ok()?, max.parse().ok()?))
    }
}
