//! QUIC transport binding for the ndnfw forwarder.
//!
//! Provides the server listener that attaches accepted connections as
//! faces, the client dial that attaches an upstream face, and the thin
//! consumer/producer helpers the CLI edges are built on. TLS setup
//! (PEM loading, self-signed generation, optional verification skip)
//! lives in [`config`].

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use quinn::{Connection, Endpoint};
use rust_ndnfw_common::ndn::{Data, Interest, Nack, NackReason, MAX_PACKET_SIZE};
use rust_ndnfw_core::{Face, Forwarder};

mod config;
mod transport;

pub use config::{configure_client, configure_server, ClientOptions, ServerOptions};
pub use transport::{split_connection, QuicRx, QuicTx, WirePacket};

/// Default QUIC port for ndnfw
pub const NDN_QUIC_PORT: u16 = 6367;

/// ALPN protocol string for NDN over QUIC
pub const NDN_QUIC_ALPN: &[u8] = b"ndnfw/1";

/// A bound server endpoint feeding a forwarder with faces.
pub struct QuicListener {
    endpoint: Endpoint,
}

impl QuicListener {
    /// Bind a server endpoint with the given options.
    pub fn bind(options: &ServerOptions) -> Result<Self> {
        let server_config = config::configure_server(options)?;
        let addr: SocketAddr = options
            .listen_addr
            .parse()
            .context("invalid listen address")?;
        let endpoint = Endpoint::server(server_config, addr)?;
        Ok(Self { endpoint })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.endpoint.local_addr()?)
    }

    /// Accept connections forever, attaching each as a face of `fw`.
    pub async fn run(&self, fw: Arc<Forwarder>) -> Result<()> {
        info!("accepting QUIC connections on {}", self.local_addr()?);
        while let Some(connecting) = self.endpoint.accept().await {
            let fw = Arc::clone(&fw);
            tokio::spawn(async move {
                match connecting.await {
                    Ok(connection) => {
                        let remote = connection.remote_address();
                        let (rx, tx) = transport::split_connection(&connection);
                        let face = fw.add_face(rx, tx).await;
                        info!("{} connected from {remote}", face.id());
                    }
                    Err(err) => warn!("handshake failed: {err}"),
                }
            });
        }
        Ok(())
    }

    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"shutdown");
    }
}

/// Dial a remote forwarder and attach the connection as a face of `fw`.
pub async fn connect_face(
    fw: &Arc<Forwarder>,
    options: &ClientOptions,
    addr: SocketAddr,
    server_name: &str,
) -> Result<Arc<Face>> {
    let connection = connect(options, addr, server_name).await?;
    let (rx, tx) = transport::split_connection(&connection);
    Ok(fw.add_face(rx, tx).await)
}

async fn connect(
    options: &ClientOptions,
    addr: SocketAddr,
    server_name: &str,
) -> Result<Connection> {
    let client_config = config::configure_client(options)?;
    let mut endpoint = Endpoint::client("0.0.0.0:0".parse()?)?;
    endpoint.set_default_client_config(client_config);
    let connection = endpoint
        .connect(addr, server_name)
        .context("connect")?
        .await
        .context("handshake")?;
    debug!("connected to {addr}");
    Ok(connection)
}

/// Outcome of a one-shot request against a forwarder.
#[derive(Debug)]
pub enum FetchOutcome {
    Data(Data),
    Nack(Nack),
}

/// Express one Interest against the forwarder at `addr` and wait for the
/// matching Data or Nack. Unrelated and malformed packets are skipped.
pub async fn fetch(
    options: &ClientOptions,
    addr: SocketAddr,
    server_name: &str,
    interest: Interest,
) -> Result<FetchOutcome> {
    let connection = connect(options, addr, server_name).await?;
    let mut stream = connection.open_uni().await?;
    stream.write_all(&interest.to_bytes()).await?;
    stream.finish().await?;

    loop {
        let mut recv = connection
            .accept_uni()
            .await
            .context("connection ended before a response")?;
        let bytes = recv.read_to_end(MAX_PACKET_SIZE).await.context("read response")?;
        match WirePacket::from_bytes(&bytes) {
            Ok(WirePacket::Data(data)) if satisfies(&interest, &data) => {
                return Ok(FetchOutcome::Data(data));
            }
            Ok(WirePacket::Nack(nack)) if nack.interest.name == interest.name => {
                return Ok(FetchOutcome::Nack(nack));
            }
            Ok(_) => debug!("ignoring unrelated packet"),
            Err(err) => debug!("ignoring malformed packet: {err}"),
        }
    }
}

fn satisfies(interest: &Interest, data: &Data) -> bool {
    if interest.can_be_prefix {
        interest.name.is_prefix_of(&data.name)
    } else {
        interest.name == data.name
    }
}

/// Serve a producer endpoint: answer each inbound Interest with the
/// handler's Data, or a no-route Nack when the handler declines.
pub async fn serve<F>(options: &ServerOptions, handler: F) -> Result<()>
where
    F: Fn(&Interest) -> Option<Data> + Send + Sync + 'static,
{
    let listener = QuicListener::bind(options)?;
    info!("producer listening on {}", listener.local_addr()?);
    let handler = Arc::new(handler);

    while let Some(connecting) = listener.endpoint.accept().await {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let connection = match connecting.await {
                Ok(connection) => connection,
                Err(err) => {
                    warn!("handshake failed: {err}");
                    return;
                }
            };
            loop {
                let mut recv = match connection.accept_uni().await {
                    Ok(stream) => stream,
                    Err(_) => break,
                };
                let bytes = match recv.read_to_end(MAX_PACKET_SIZE).await {
                    Ok(bytes) => bytes,
                    Err(_) => continue,
                };
                let interest = match WirePacket::from_bytes(&bytes) {
                    Ok(WirePacket::Interest(interest)) => interest,
                    _ => continue,
                };
                debug!("answering Interest {}", interest.name);
                let reply = match handler(&interest) {
                    Some(data) => WirePacket::Data(data),
                    None => WirePacket::Nack(Nack::new(interest, NackReason::NoRoute)),
                };
                if let Err(err) = send_packet(&connection, &reply).await {
                    debug!("reply failed: {err}");
                    break;
                }
            }
        });
    }
    Ok(())
}

async fn send_packet(connection: &Connection, packet: &WirePacket) -> Result<()> {
    let mut stream = connection.open_uni().await?;
    stream.write_all(&packet.to_bytes()).await?;
    stream.finish().await?;
    Ok(())
}
