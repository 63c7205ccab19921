//! QUIC transport halves consumed by ndnfw faces.
//!
//! Each packet travels as one unidirectional stream: the sender writes
//! the TLV bytes and finishes the stream, the receiver reads to end
//! bounded by the maximum packet size. Tokens are a face-local notion;
//! the receiving half mints one per inbound Interest.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, trace};
use quinn::Connection;
use rust_ndnfw_common::ndn::{Data, Interest, Nack, MAX_PACKET_SIZE};
use rust_ndnfw_common::tlv;
use rust_ndnfw_core::{RxPacket, TransportRx, TransportTx, TxPacket};

/// A packet as it appears on a QUIC stream.
#[derive(Debug, Clone)]
pub enum WirePacket {
    Interest(Interest),
    Data(Data),
    Nack(Nack),
}

impl WirePacket {
    /// Parse from raw bytes; the first byte is the outer TLV type.
    pub fn from_bytes(bytes: &[u8]) -> rust_ndnfw_common::Result<Self> {
        match bytes.first() {
            Some(&tlv::TLV_INTEREST) => Ok(Self::Interest(Interest::decode(bytes)?)),
            Some(&tlv::TLV_DATA) => Ok(Self::Data(Data::decode(bytes)?)),
            Some(&tlv::TLV_NACK) => Ok(Self::Nack(Nack::decode(bytes)?)),
            Some(&other) => Err(rust_ndnfw_common::Error::Packet(format!(
                "unknown packet type {other}"
            ))),
            None => Err(rust_ndnfw_common::Error::Packet("empty packet".into())),
        }
    }

    /// Encode to the stream form.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Interest(interest) => interest.to_bytes(),
            Self::Data(data) => data.to_bytes(),
            Self::Nack(nack) => nack.to_bytes(),
        }
    }
}

/// Inbound half: accepts streams and decodes one packet per stream.
pub struct QuicRx {
    connection: Connection,
    next_token: AtomicU64,
}

#[async_trait]
impl TransportRx for QuicRx {
    async fn recv(&mut self) -> Option<RxPacket> {
        loop {
            let mut stream = match self.connection.accept_uni().await {
                Ok(stream) => stream,
                Err(err) => {
                    debug!("connection ended: {err}");
                    return None;
                }
            };
            let bytes = match stream.read_to_end(MAX_PACKET_SIZE).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    debug!("stream read failed: {err}");
                    continue;
                }
            };
            match WirePacket::from_bytes(&bytes) {
                Ok(WirePacket::Interest(interest)) => {
                    let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                    return Some(RxPacket::Interest { interest, token });
                }
                Ok(WirePacket::Data(data)) => return Some(RxPacket::Data(data)),
                Ok(WirePacket::Nack(nack)) => return Some(RxPacket::Nack(nack)),
                // malformed packets are dropped, never surfaced as errors
                Err(err) => trace!("dropping malformed packet: {err}"),
            }
        }
    }
}

/// Outbound half: encodes each packet onto a fresh stream.
pub struct QuicTx {
    connection: Connection,
}

#[async_trait]
impl TransportTx for QuicTx {
    async fn send(&mut self, packet: TxPacket) -> Result<()> {
        let bytes = match packet {
            TxPacket::Interest { interest, .. } => interest.to_bytes(),
            TxPacket::Data { data, .. } => data.to_bytes(),
            TxPacket::Nack { nack, .. } => nack.to_bytes(),
            TxPacket::Cancel { interest, .. } => {
                // cancellation is an in-process signal with no wire form
                trace!("dropping cancel for {} at the QUIC boundary", interest.name);
                return Ok(());
            }
        };
        let mut stream = self.connection.open_uni().await.context("open stream")?;
        stream.write_all(&bytes).await.context("write packet")?;
        stream.finish().await.context("finish stream")?;
        Ok(())
    }
}

/// Split a connection into the transport halves a face consumes.
pub fn split_connection(connection: &Connection) -> (QuicRx, QuicTx) {
    (
        QuicRx {
            connection: connection.clone(),
            next_token: AtomicU64::new(1),
        },
        QuicTx {
            connection: connection.clone(),
        },
    )
}
