//! HTTPS listener support: loads a PEM certificate/key pair into memory at
//! startup and serves the same `axum::Router` over TLS. The same
//! certificate pair is also handed to the DTLS-SRTP stack; this module only
//! owns the HTTP(S)-facing `rustls::ServerConfig`.
//!
//! Certificate files are read fully to EOF via `std::io::Read::read_to_end`
//! rather than relying on a pre-computed file size, which avoids text-mode
//! read quirks on non-POSIX platforms.

use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use hyper::server::conn::Http;
use rustls::{Certificate, NoClientAuth, PrivateKey, ServerConfig};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;

fn read_to_end(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(buf)
}

fn load_certs(path: &Path) -> Result<Vec<Certificate>> {
    let bytes = read_to_end(path)?;
    let certs = rustls_pemfile::certs(&mut bytes.as_slice())
        .with_context(|| format!("Failed to parse certificate PEM {}", path.display()))?;

    if certs.is_empty() {
        anyhow::bail!("no certificates found in {}", path.display());
    }

    Ok(certs.into_iter().map(Certificate).collect())
}

/// Tries PKCS#8 first, then falls back to PKCS#1 (RSA) — the same two
/// formats `openssl` commonly emits for a cert key.
fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let bytes = read_to_end(path)?;

    let mut pkcs8 = rustls_pemfile::pkcs8_private_keys(&mut bytes.as_slice())
        .with_context(|| format!("Failed to parse private key {}", path.display()))?;

    if let Some(key) = pkcs8.pop() {
        return Ok(PrivateKey(key));
    }

    let mut rsa = rustls_pemfile::rsa_private_keys(&mut bytes.as_slice())
        .with_context(|| format!("Failed to parse private key {}", path.display()))?;

    rsa.pop()
        .map(PrivateKey)
        .with_context(|| format!("no private key found in {}", path.display()))
}

/// Builds the `TlsAcceptor` used to terminate the HTTPS listener. Failure
/// here (a missing or unparseable certificate/key pair) is fatal at
/// startup.
pub fn build_acceptor(cert_pem_path: &Path, cert_key_path: &Path) -> Result<TlsAcceptor> {
    let certs = load_certs(cert_pem_path)?;
    let key = load_private_key(cert_key_path)?;

    let mut config = ServerConfig::new(NoClientAuth::new());
    config
        .set_single_cert(certs, key)
        .context("Failed to install the certificate/key pair into the TLS config")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Serves `router` over TLS on `addr` until `shutdown` fires, one spawned
/// `tokio` task per accepted connection rather than an OS thread per
/// connection.
pub async fn serve(addr: SocketAddr, acceptor: TlsAcceptor, router: Router, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTPS listener on {}", addr))?;

    log::info!("Listening for HTTPS on {}", addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted.context("Failed to accept TCP connection")?;
                let acceptor = acceptor.clone();
                let router = router.clone();

                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(stream) => stream,
                        Err(err) => {
                            crate::err!("TLS handshake with {} failed: {}", peer, err);
                            return;
                        }
                    };

                    if let Err(err) = Http::new().serve_connection(tls_stream, router).await {
                        crate::err!("HTTPS connection with {} ended with an error: {}", peer, err);
                    }
                });
            }
            _ = shutdown.changed() => {
                log::info!("HTTPS listener shutting down");
                return Ok(());
            }
        }
    }
}
