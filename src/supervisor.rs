//! Startup and shutdown orchestration: parses config and CLI flags, loads
//! plugins, opens the HTTP/HTTPS listeners, and runs them until an orderly
//! shutdown signal arrives. The `GatewayCore`/`PluginRegistry` pair is
//! passed into the router explicitly rather than held as a global.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cli::Args;
use crate::config::Config;
use crate::core::{GatewayCore, NegotiationFactory};
use crate::http::build_router;
use crate::plugin::echotest::EchoTestPlugin;
use crate::plugin::PluginRegistry;
use crate::session::SessionId;

pub struct Supervisor {
    core: Arc<GatewayCore>,
    registry: Arc<PluginRegistry>,
    config: Config,
}

impl Supervisor {
    pub fn bootstrap(args: &Args) -> Result<Self> {
        let config = Config::from_dir(&args.configs_folder)
            .with_context(|| format!("Failed to load config from {}", args.configs_folder.display()))?;

        let negotiation = NegotiationFactory::stub();

        let (rtp_min, rtp_max) = args
            .parsed_rtp_port_range()
            .unwrap_or((config.media.rtp_port_range_min, config.media.rtp_port_range_max));

        let stun_server = args.stun_server.clone().or_else(|| config.nat.stun_server.clone());
        if let Some(stun_server) = stun_server {
            let (stun_host, stun_port) = parse_stun_server(&stun_server, config.nat.stun_port.unwrap_or(3478))?;
            negotiation
                .init_ice(&stun_host, stun_port, rtp_min, rtp_max)
                .context("Failed to initialize the ICE agent against the configured STUN server")?;
        }

        // The same certificate pair secures DTLS-SRTP for media, independent
        // of whether the HTTPS listener is enabled.
        let certificates = args
            .cert_pem
            .clone()
            .zip(args.cert_key.clone())
            .or_else(|| {
                config
                    .certificates
                    .as_ref()
                    .map(|certs| (certs.cert_pem_path.clone(), certs.cert_key_path.clone()))
            });
        if let Some((cert_pem, cert_key)) = certificates {
            negotiation
                .init_dtls(&cert_pem.to_string_lossy(), &cert_key.to_string_lossy())
                .context("Failed to initialize DTLS from the configured certificate pair")?;
        }

        let core = GatewayCore::new(negotiation);
        let mut registry = PluginRegistry::new();

        registry
            .register(Arc::new(EchoTestPlugin::default()), &args.configs_folder, &core)
            .context("Failed to register the built-in echo test plugin")?;

        registry
            .load_directory(&args.plugins_folder, &args.configs_folder, &core)
            .with_context(|| format!("Failed to load plugins from {}", args.plugins_folder.display()))?;

        log::info!("Loaded {} plugin(s)", registry.len());

        Ok(Self {
            core,
            registry: Arc::new(registry),
            config,
        })
    }

    /// Runs both configured listeners concurrently until `shutdown` fires.
    /// The two listeners are optional and independent: either, both, or
    /// neither may be enabled by config/CLI.
    pub async fn run(self, args: &Args, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let base_path = args.base_path.clone().unwrap_or_else(|| self.config.webserver.base_path.clone());
        let interface = args.interface.clone().unwrap_or_else(|| self.config.webserver.interface.clone());

        let router = build_router(self.core.clone(), self.registry.clone(), &base_path, shutdown_rx.clone());

        let http_port = if args.disable_http {
            None
        } else {
            args.http_port.or(self.config.webserver.http_port)
        };

        let https_port = args.https_port.or(self.config.webserver.https_port);

        if http_port.is_none() && https_port.is_none() {
            anyhow::bail!("no listener configured: HTTP is disabled and no HTTPS port was set");
        }

        let reaper = spawn_session_reaper(self.core.clone(), self.config.general.session_timeout_secs, shutdown_rx.clone());

        let http_future: std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>> = match http_port {
            Some(port) => {
                let addr = resolve_addr(&interface, port)?;
                log::info!("Listening for HTTP on {}", addr);
                let router = router.clone();
                let mut shutdown_rx = shutdown_rx.clone();

                Box::pin(async move {
                    axum::Server::bind(&addr)
                        .serve(router.into_make_service())
                        .with_graceful_shutdown(async move {
                            let _ = shutdown_rx.changed().await;
                        })
                        .await
                        .context("HTTP server error")
                })
            }
            None => Box::pin(std::future::ready(Ok(()))),
        };

        let https_future: std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>> = match https_port {
            Some(port) => {
                let addr = resolve_addr(&interface, port)?;
                let certificates = self
                    .config
                    .certificates
                    .as_ref()
                    .context("HTTPS port is set but no [certificates] section is configured")?;

                let cert_pem = args.cert_pem.clone().unwrap_or_else(|| certificates.cert_pem_path.clone());
                let cert_key = args.cert_key.clone().unwrap_or_else(|| certificates.cert_key_path.clone());
                let acceptor = crate::tls::build_acceptor(&cert_pem, &cert_key).context("Failed to initialize HTTPS listener")?;

                Box::pin(crate::tls::serve(addr, acceptor, router, shutdown_rx.clone()))
            }
            None => Box::pin(std::future::ready(Ok(()))),
        };

        let (http_result, https_result) = tokio::join!(http_future, https_future);
        reaper.abort();
        http_result?;
        https_result?;
        Ok(())
    }

    pub fn core(&self) -> &Arc<GatewayCore> {
        &self.core
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }
}

/// Installs a `Ctrl-C` handler that flips the shared shutdown flag,
/// returning the receiver half for the HTTP server and every long poll to
/// observe.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub async fn wait_for_ctrl_c(tx: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        crate::err!("Failed to install Ctrl-C handler: {}", err);
        return;
    }

    log::info!("Shutdown signal received");
    let _ = tx.send(true);
}

/// Parses the `host[:port]` CLI/config form, defaulting to `default_port`
/// (3478) when no port is given.
fn parse_stun_server(spec: &str, default_port: u16) -> Result<(String, u16)> {
    match spec.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .with_context(|| format!("Invalid STUN server port in {}", spec))?;
            Ok((host.to_owned(), port))
        }
        None => Ok((spec.to_owned(), default_port)),
    }
}

fn resolve_addr(interface: &str, port: u16) -> Result<SocketAddr> {
    format!("{}:{}", interface, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", interface, port))
}

/// Sweeps sessions idle for longer than `timeout_secs`, synchronously
/// detaching every handle exactly as the `destroy` request does. Runs until
/// `shutdown` fires and returns the `JoinHandle` so callers can abort it on
/// the way out.
pub fn spawn_session_reaper(core: Arc<GatewayCore>, timeout_secs: u64, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let sweep_interval = Duration::from_secs(timeout_secs.max(1).min(30));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(sweep_interval) => {}
                _ = shutdown.changed() => return,
            }

            let idle: Vec<SessionId> = core
                .sessions
                .snapshot()
                .into_iter()
                .filter(|session| session.idle_for_secs() >= timeout_secs)
                .map(|session| session.id())
                .collect();

            for id in idle {
                let Ok(session) = core.sessions.get(id) else { continue };
                log::info!("Reaping idle session {}", id);
                session.mark_destroying();

                for handle in session.handles().drain() {
                    if let Err(err) = handle.plugin().vtable().destroy_session(handle.plugin_token()) {
                        crate::err!("Plugin destroy_session failed while reaping handle {}: {}", handle.id(), err);
                    }
                    core.tokens.remove_token(handle.plugin_token());
                }

                core.sessions.remove(id);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_without_port() {
        let (host, port) = parse_stun_server("stun.example.org", 3478).unwrap();
        assert_eq!(host, "stun.example.org");
        assert_eq!(port, 3478);
    }

    #[test]
    fn parses_host_with_explicit_port() {
        let (host, port) = parse_stun_server("stun.example.org:19302", 3478).unwrap();
        assert_eq!(host, "stun.example.org");
        assert_eq!(port, 19302);
    }

    #[test]
    fn rejects_a_non_numeric_port() {
        assert!(parse_stun_server("stun.example.org:notaport", 3478).is_err());
    }
}
