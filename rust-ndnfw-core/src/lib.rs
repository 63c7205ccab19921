//! The ndnfw forwarding plane.
//!
//! This crate implements the switching engine of an NDN forwarder: the
//! [`Face`] abstraction (per-connection I/O pipeline with backpressure),
//! the [`Fib`] (longest-prefix-match routing table), the [`Pit`]
//! (outstanding-request tracking with aggregation, loop detection and
//! expiry), and the [`Forwarder`] that ties them together on every
//! inbound packet.
//!
//! The crate is a library engine: it consumes already-decoded packets
//! through the [`TransportRx`]/[`TransportTx`] capability traits and has
//! no wire format, socket, or CLI surface of its own.

pub mod face;
pub mod fib;
pub mod forwarder;
pub mod pit;
pub mod transport;

pub use face::{Advertise, Face, FaceId};
pub use fib::{Fib, NextHop};
pub use forwarder::{Forwarder, ForwarderConfig};
pub use pit::{Pit, PitKey};
pub use transport::{
    channel_transport, ChannelPeer, ChannelRx, ChannelTx, InterestToken, RxPacket, TransportRx,
    TransportTx, TxPacket,
};

/// Default capacity of a face's outbound queue.
pub const DEFAULT_FACE_TX_QUEUE: usize = 16;
