//! The forwarding daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use rust_ndnfw_common::ndn::Name;
use rust_ndnfw_core::{Forwarder, ForwarderConfig, DEFAULT_FACE_TX_QUEUE};
use rust_ndnfw_quic::{connect_face, ClientOptions, QuicListener, ServerOptions};
use serde::Deserialize;

/// Daemon settings, layered from defaults, an optional file, and
/// NDNFW_* environment variables.
#[derive(Debug, Deserialize)]
pub struct DaemonConfig {
    /// Address the QUIC listener binds to.
    pub listen: String,

    /// Capacity of each face's outbound queue.
    #[serde(default)]
    pub face_tx_queue: Option<usize>,

    /// Static routes installed at startup, each over a dialed face.
    #[serde(default)]
    pub routes: Vec<StaticRoute>,
}

#[derive(Debug, Deserialize)]
pub struct StaticRoute {
    /// Name prefix (NDN URI format).
    pub prefix: String,

    /// Remote forwarder or producer to dial for this prefix.
    pub remote: String,

    /// Route cost carried as metadata.
    #[serde(default)]
    pub cost: u32,
}

fn load_config(path: Option<&PathBuf>) -> Result<DaemonConfig> {
    let mut builder = config::Config::builder()
        .set_default("listen", format!("0.0.0.0:{}", rust_ndnfw_quic::NDN_QUIC_PORT))?;
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(config::Environment::with_prefix("NDNFW"));
    builder
        .build()
        .context("failed to load configuration")?
        .try_deserialize()
        .context("invalid daemon configuration")
}

pub async fn run(config_path: Option<PathBuf>, listen_override: Option<String>) -> Result<()> {
    let mut cfg = load_config(config_path.as_ref())?;
    if let Some(listen) = listen_override {
        cfg.listen = listen;
    }

    let fw = Forwarder::new(ForwarderConfig {
        face_tx_queue: cfg.face_tx_queue.unwrap_or(DEFAULT_FACE_TX_QUEUE),
    });

    // dialed peers run self-signed certificates in dev topologies
    let client_options = ClientOptions {
        verify_certificate: false,
        ..Default::default()
    };
    for route in &cfg.routes {
        let addr = tokio::net::lookup_host(&route.remote)
            .await
            .with_context(|| format!("cannot resolve {}", route.remote))?
            .next()
            .with_context(|| format!("no address for {}", route.remote))?;
        let face = connect_face(&fw, &client_options, addr, "localhost")
            .await
            .with_context(|| format!("cannot dial {}", route.remote))?;
        let prefix = Name::from_uri(&route.prefix);
        fw.add_route(face.id(), prefix.clone(), route.cost).await?;
        info!("route {} -> {} ({})", prefix, route.remote, face.id());
    }

    let listener = QuicListener::bind(&ServerOptions {
        listen_addr: cfg.listen.clone(),
        ..Default::default()
    })?;
    info!("ndnfw listening on {}", listener.local_addr()?);

    tokio::select! {
        result = listener.run(Arc::clone(&fw)) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            listener.close();
            fw.shutdown().await;
            Ok(())
        }
    }
}
