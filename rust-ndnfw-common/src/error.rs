//! Error types for the ndnfw forwarding engine.

use thiserror::Error;

/// All possible errors that can occur within the ndnfw implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to NDN packet processing.
    #[error("packet error: {0}")]
    Packet(String),

    /// The face has been closed and can no longer carry packets.
    #[error("face closed")]
    FaceClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
