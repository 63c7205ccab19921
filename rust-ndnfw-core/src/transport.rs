//! The capability interface between a face and its transport.
//!
//! A transport is anything that produces inbound items and accepts
//! outbound items: a QUIC connection, a pipe, or an in-process channel.
//! Push- and pull-style endpoints are adapted to this interface outside
//! the core; [`channel_transport`] covers the in-process case and is what
//! the test suite drives faces with.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_ndnfw_common::ndn::{Data, Interest, Nack};
use tokio::sync::mpsc;

/// Correlates a specific pending request across a face boundary.
pub type InterestToken = u64;

/// An item received on a face.
#[derive(Debug, Clone)]
pub enum RxPacket {
    /// A request. The token identifies this request in later Data, Nack
    /// or cancel items sent back on the same face.
    Interest {
        interest: Interest,
        token: InterestToken,
    },
    /// A response.
    Data(Data),
    /// The downstream consumer withdraws a specific pending request.
    Cancel {
        interest: Interest,
        token: InterestToken,
    },
    /// An upstream refusal for a previously forwarded request.
    Nack(Nack),
}

/// An item transmitted on a face.
#[derive(Debug, Clone)]
pub enum TxPacket {
    Interest {
        interest: Interest,
        token: InterestToken,
    },
    Data {
        data: Data,
        token: InterestToken,
    },
    Nack {
        nack: Nack,
        token: InterestToken,
    },
    Cancel {
        interest: Interest,
        token: InterestToken,
    },
}

/// The inbound half of a transport.
#[async_trait]
pub trait TransportRx: Send + 'static {
    /// Receive the next inbound item. `None` means the transport is
    /// exhausted; the face closes.
    async fn recv(&mut self) -> Option<RxPacket>;
}

/// The outbound half of a transport.
#[async_trait]
pub trait TransportTx: Send + 'static {
    /// Deliver one outbound item. An error is unrecoverable and closes
    /// the face.
    async fn send(&mut self, packet: TxPacket) -> Result<()>;
}

/// Inbound half of an in-process channel transport.
pub struct ChannelRx(mpsc::Receiver<RxPacket>);

/// Outbound half of an in-process channel transport.
pub struct ChannelTx(mpsc::Sender<TxPacket>);

#[async_trait]
impl TransportRx for ChannelRx {
    async fn recv(&mut self) -> Option<RxPacket> {
        self.0.recv().await
    }
}

#[async_trait]
impl TransportTx for ChannelTx {
    async fn send(&mut self, packet: TxPacket) -> Result<()> {
        self.0
            .send(packet)
            .await
            .map_err(|_| anyhow!("channel peer dropped"))
    }
}

/// The application side of a channel transport: feed items into the face
/// and read what the forwarder transmits on it.
pub struct ChannelPeer {
    to_face: mpsc::Sender<RxPacket>,
    from_face: mpsc::Receiver<TxPacket>,
}

impl ChannelPeer {
    /// Inject an inbound item, as if it arrived from the network.
    pub async fn send(&self, packet: RxPacket) -> Result<()> {
        self.to_face
            .send(packet)
            .await
            .map_err(|_| anyhow!("face closed"))
    }

    /// Await the next item the face transmits.
    pub async fn recv(&mut self) -> Option<TxPacket> {
        self.from_face.recv().await
    }

    /// Non-blocking receive; `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<TxPacket> {
        self.from_face.try_recv().ok()
    }

    /// Ends the inbound side, as a closing network peer would.
    pub fn finish(self) {}
}

/// Creates an in-process transport with the given buffer capacity per
/// direction, returning the face-side halves and the application peer.
pub fn channel_transport(capacity: usize) -> (ChannelRx, ChannelTx, ChannelPeer) {
    let (to_face, face_rx) = mpsc::channel(capacity);
    let (face_tx, from_face) = mpsc::channel(capacity);
    (
        ChannelRx(face_rx),
        ChannelTx(face_tx),
        ChannelPeer { to_face, from_face },
    )
}
