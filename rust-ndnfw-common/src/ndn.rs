//! NDN packet types and structures.
//!
//! This module provides the core data structures that represent NDN
//! packets in ndnfw: hierarchical names, Interests, Data, and Nacks,
//! together with their TLV wire codec.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum size of an encoded packet.
pub const MAX_PACKET_SIZE: usize = 8800;

/// Default Interest lifetime in milliseconds.
pub const DEFAULT_INTEREST_LIFETIME_MS: u32 = 4000;

/// Represents a single name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    /// Creates a new name component from a byte slice.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the component as bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Encodes this name component as a TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_COMPONENT, self.0.clone())
    }

    /// Decodes a name component from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_COMPONENT {
            return Err(Error::Packet(format!(
                "expected name component TLV type {}, got {}",
                tlv::TLV_COMPONENT,
                element.tlv_type
            )));
        }
        Ok(Self(element.value.clone()))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Print printable ASCII characters directly, otherwise use hex
        let printable = self.0.iter().all(|&b| b.is_ascii_graphic() || b == b' ');
        if printable {
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "0x")?;
            for &b in self.0.iter() {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

/// A hierarchical name: an ordered sequence of opaque components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    /// Creates a new empty name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a name from a URI-like string with '/' as component separator.
    pub fn from_uri(uri: &str) -> Self {
        let components = uri
            .split('/')
            .filter(|comp| !comp.is_empty())
            .map(|comp| NameComponent::new(comp.as_bytes().to_vec()))
            .collect();

        Self { components }
    }

    /// Appends a component to the name.
    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Returns the number of components in the name.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the name has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns the name components.
    pub fn components(&self) -> &[NameComponent] {
        &self.components
    }

    /// Gets a component at the specified index.
    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// Returns a prefix of this name with the specified length.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    /// Checks whether this name is a prefix of (or equal to) another name.
    /// Matching is over whole components only.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.components
            .iter()
            .zip(other.components.iter())
            .all(|(a, b)| a == b)
    }

    /// Encodes this name as a TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_NAME, buf.freeze())
    }

    /// Decodes a name from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::Packet(format!(
                "expected name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut buf = element.value.clone();
        while buf.has_remaining() {
            let inner = TlvElement::decode(&mut buf)?;
            components.push(NameComponent::from_tlv(&inner)?);
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

/// An Interest packet: a request for the Data with a matching name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interest {
    /// The name requested in the Interest.
    pub name: Name,

    /// A nonce value used to detect forwarding loops.
    pub nonce: u32,

    /// Interest lifetime in milliseconds.
    pub lifetime_ms: u32,

    /// Hop limit (similar to IP TTL).
    pub hop_limit: Option<u8>,

    /// Whether Data whose name has this Interest's name as a prefix may
    /// satisfy it.
    pub can_be_prefix: bool,

    /// Whether only fresh Data may satisfy it.
    pub must_be_fresh: bool,
}

impl Interest {
    /// Creates a new Interest packet with a time-derived nonce.
    pub fn new(name: Name) -> Self {
        use std::time::{Duration, SystemTime, UNIX_EPOCH};
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0));
        let nonce = (now.as_nanos() % u32::MAX as u128) as u32;

        Self {
            name,
            nonce,
            lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            hop_limit: None,
            can_be_prefix: false,
            must_be_fresh: false,
        }
    }

    /// Sets the Interest lifetime.
    pub fn with_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }

    /// Sets the nonce value.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the can_be_prefix flag.
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    /// Sets the must_be_fresh flag.
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// Sets the hop limit.
    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = Some(hop_limit);
        self
    }

    /// Encodes this Interest into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut inner = BytesMut::new();
        self.name.to_tlv().encode(&mut inner);
        if self.can_be_prefix {
            TlvElement::flag(tlv::TLV_CAN_BE_PREFIX).encode(&mut inner);
        }
        if self.must_be_fresh {
            TlvElement::flag(tlv::TLV_MUST_BE_FRESH).encode(&mut inner);
        }
        let nonce = Bytes::copy_from_slice(&self.nonce.to_be_bytes());
        TlvElement::new(tlv::TLV_NONCE, nonce).encode(&mut inner);
        TlvElement::new(tlv::TLV_INTEREST_LIFETIME, tlv::encode_uint(self.lifetime_ms as u64))
            .encode(&mut inner);
        if let Some(hop_limit) = self.hop_limit {
            TlvElement::new(tlv::TLV_HOP_LIMIT, vec![hop_limit]).encode(&mut inner);
        }
        TlvElement::new(tlv::TLV_INTEREST, inner.freeze()).encode(buf);
    }

    /// Returns the encoded wire form.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decodes an Interest from its wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = &bytes[..];
        let outer = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&outer)
    }

    /// Decodes an Interest from an already-parsed outer element.
    pub fn from_tlv(outer: &TlvElement) -> Result<Self, Error> {
        if outer.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::Packet(format!(
                "expected Interest TLV type {}, got {}",
                tlv::TLV_INTEREST,
                outer.tlv_type
            )));
        }

        let mut name = None;
        let mut nonce = 0u32;
        let mut lifetime_ms = DEFAULT_INTEREST_LIFETIME_MS;
        let mut hop_limit = None;
        let mut can_be_prefix = false;
        let mut must_be_fresh = false;

        let mut inner = outer.value.clone();
        while inner.has_remaining() {
            let element = TlvElement::decode(&mut inner)?;
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_CAN_BE_PREFIX => can_be_prefix = true,
                tlv::TLV_MUST_BE_FRESH => must_be_fresh = true,
                tlv::TLV_NONCE => nonce = element.as_uint()? as u32,
                tlv::TLV_INTEREST_LIFETIME => lifetime_ms = element.as_uint()? as u32,
                tlv::TLV_HOP_LIMIT => hop_limit = Some(element.as_uint()? as u8),
                // unrecognized fields are tolerated
                _ => {}
            }
        }

        let name = name.ok_or_else(|| Error::Packet("Interest without a name".into()))?;
        Ok(Self {
            name,
            nonce,
            lifetime_ms,
            hop_limit,
            can_be_prefix,
            must_be_fresh,
        })
    }
}

/// A Data packet: a named response satisfying an Interest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    /// The name of the Data packet.
    pub name: Name,

    /// The content carried by the Data packet.
    pub content: Bytes,

    /// Freshness period in milliseconds.
    pub freshness_ms: u32,
}

impl Data {
    /// Creates a new Data packet.
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            content: content.into(),
            freshness_ms: 0,
        }
    }

    /// Sets the freshness period.
    pub fn with_freshness(mut self, freshness_ms: u32) -> Self {
        self.freshness_ms = freshness_ms;
        self
    }

    /// Encodes this Data into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut inner = BytesMut::new();
        self.name.to_tlv().encode(&mut inner);
        if self.freshness_ms > 0 {
            TlvElement::new(tlv::TLV_FRESHNESS_PERIOD, tlv::encode_uint(self.freshness_ms as u64))
                .encode(&mut inner);
        }
        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut inner);
        TlvElement::new(tlv::TLV_DATA, inner.freeze()).encode(buf);
    }

    /// Returns the encoded wire form.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decodes a Data packet from its wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = &bytes[..];
        let outer = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&outer)
    }

    /// Decodes a Data packet from an already-parsed outer element.
    pub fn from_tlv(outer: &TlvElement) -> Result<Self, Error> {
        if outer.tlv_type != tlv::TLV_DATA {
            return Err(Error::Packet(format!(
                "expected Data TLV type {}, got {}",
                tlv::TLV_DATA,
                outer.tlv_type
            )));
        }

        let mut name = None;
        let mut content = Bytes::new();
        let mut freshness_ms = 0u32;

        let mut inner = outer.value.clone();
        while inner.has_remaining() {
            let element = TlvElement::decode(&mut inner)?;
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_FRESHNESS_PERIOD => freshness_ms = element.as_uint()? as u32,
                tlv::TLV_CONTENT => content = element.value.clone(),
                _ => {}
            }
        }

        let name = name.ok_or_else(|| Error::Packet("Data without a name".into()))?;
        Ok(Self {
            name,
            content,
            freshness_ms,
        })
    }
}

/// The reason carried by a Nack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NackReason {
    /// A link along the path is congested.
    Congestion,
    /// The Interest was recognized as a forwarding loop.
    Duplicate,
    /// No route toward the requested name exists.
    NoRoute,
}

impl NackReason {
    pub fn code(self) -> u8 {
        match self {
            NackReason::Congestion => 50,
            NackReason::Duplicate => 100,
            NackReason::NoRoute => 150,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            50 => Some(NackReason::Congestion),
            100 => Some(NackReason::Duplicate),
            150 => Some(NackReason::NoRoute),
            _ => None,
        }
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NackReason::Congestion => write!(f, "congestion"),
            NackReason::Duplicate => write!(f, "duplicate"),
            NackReason::NoRoute => write!(f, "no route"),
        }
    }
}

/// A negative acknowledgment: the enclosed Interest cannot be satisfied
/// via the path it was received from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nack {
    /// The Interest being rejected.
    pub interest: Interest,

    /// Why the Interest was rejected.
    pub reason: NackReason,
}

impl Nack {
    /// Creates a new Nack for the given Interest.
    pub fn new(interest: Interest, reason: NackReason) -> Self {
        Self { interest, reason }
    }

    /// Encodes this Nack into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut inner = BytesMut::new();
        TlvElement::new(tlv::TLV_NACK_REASON, vec![self.reason.code()]).encode(&mut inner);
        self.interest.encode(&mut inner);
        TlvElement::new(tlv::TLV_NACK, inner.freeze()).encode(buf);
    }

    /// Returns the encoded wire form.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decodes a Nack from its wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = &bytes[..];
        let outer = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&outer)
    }

    /// Decodes a Nack from an already-parsed outer element.
    pub fn from_tlv(outer: &TlvElement) -> Result<Self, Error> {
        if outer.tlv_type != tlv::TLV_NACK {
            return Err(Error::Packet(format!(
                "expected Nack TLV type {}, got {}",
                tlv::TLV_NACK,
                outer.tlv_type
            )));
        }

        let mut reason = None;
        let mut interest = None;

        let mut inner = outer.value.clone();
        while inner.has_remaining() {
            let element = TlvElement::decode(&mut inner)?;
            match element.tlv_type {
                tlv::TLV_NACK_REASON => {
                    let code = element.as_uint()? as u8;
                    reason = Some(NackReason::from_code(code).ok_or_else(|| {
                        Error::Packet(format!("unknown Nack reason code {code}"))
                    })?);
                }
                tlv::TLV_INTEREST => interest = Some(Interest::from_tlv(&element)?),
                _ => {}
            }
        }

        let interest = interest.ok_or_else(|| Error::Packet("Nack without an Interest".into()))?;
        let reason = reason.ok_or_else(|| Error::Packet("Nack without a reason".into()))?;
        Ok(Self { interest, reason })
    }
}

#[cfg(test)]
mod tests;
