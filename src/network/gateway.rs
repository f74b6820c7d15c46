//! Chat gateway - accepts incoming TCP (optionally TLS) connections and
//! spawns a session task per client. The accept loop survives any
//! per-session fault.

use crate::config::{self, Config};
use crate::error::ServerError;
use crate::network::session::run_session;
use crate::state::Hub;
use std::io::Cursor;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::{debug, error, info};

pub struct Gateway {
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    hub: Arc<Hub>,
    cfg: Arc<Config>,
}

impl Gateway {
    /// Bind the chat listener and, when both TLS flags are set, build the
    /// TLS acceptor. Bind failures are fatal.
    pub async fn bind(cfg: Arc<Config>, hub: Arc<Hub>) -> Result<Self, ServerError> {
        let addr = config::parse_listen_addr(&cfg.chat_addr)?;
        let listener = TcpListener::bind(addr).await.map_err(|e| ServerError::Bind {
            addr: cfg.chat_addr.clone(),
            source: e,
        })?;
        let tls = build_tls_acceptor(&cfg).await?;
        info!(%addr, tls = tls.is_some(), "chat gateway listening");
        Ok(Self {
            listener,
            tls,
            hub,
            cfg,
        })
    }

    /// Accept connections until the shutdown signal fires.
    pub async fn run(self, shutdown: broadcast::Sender<()>) {
        let mut stop = shutdown.subscribe();
        loop {
            let accepted = tokio::select! {
                _ = stop.recv() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, addr)) => {
                    let ip = addr.ip().to_string();
                    let hub = Arc::clone(&self.hub);
                    let cfg = Arc::clone(&self.cfg);
                    let session_shutdown = shutdown.subscribe();
                    match self.tls.clone() {
                        None => {
                            tokio::spawn(run_session(stream, ip, hub, cfg, session_shutdown));
                        }
                        Some(acceptor) => {
                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        run_session(tls_stream, ip, hub, cfg, session_shutdown)
                                            .await;
                                    }
                                    Err(e) => {
                                        debug!(%ip, error = %e, "TLS handshake failed");
                                    }
                                }
                            });
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
        info!("chat gateway stopped");
    }
}

/// Build the TLS acceptor from the configured PEM files. Both flags must be
/// present; a lone one logs a warning and leaves the listener plaintext.
async fn build_tls_acceptor(cfg: &Config) -> Result<Option<TlsAcceptor>, ServerError> {
    let (cert_path, key_path) = match (&cfg.tls_cert, &cfg.tls_key) {
        (Some(cert), Some(key)) => (cert, key),
        (None, None) => return Ok(None),
        _ => {
            tracing::warn!("TLS requires both --tls-cert and --tls-key; TLS disabled");
            return Ok(None);
        }
    };

    let materials = |path: &std::path::Path, reason: String| ServerError::TlsMaterials {
        path: path.display().to_string(),
        reason,
    };

    let cert_data = tokio::fs::read(cert_path)
        .await
        .map_err(|e| materials(cert_path, e.to_string()))?;
    let cert_chain: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut Cursor::new(&cert_data))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| materials(cert_path, e.to_string()))?;
    if cert_chain.is_empty() {
        return Err(materials(cert_path, "no certificates found".to_string()));
    }

    let key_data = tokio::fs::read(key_path)
        .await
        .map_err(|e| materials(key_path, e.to_string()))?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut Cursor::new(&key_data))
        .map_err(|e| materials(key_path, e.to_string()))?
        .ok_or_else(|| materials(key_path, "no private key found".to_string()))?;

    let _ = tokio_rustls::rustls::crypto::aws_lc_rs::default_provider().install_default();
    let tls_config = tokio_rustls::rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| materials(cert_path, e.to_string()))?;

    info!("TLS enabled on the chat listener");
    Ok(Some(TlsAcceptor::from(Arc::new(tls_config))))
}
