//! Pending Interest Table: outstanding-request tracking.
//!
//! Each entry keys on the canonical request (name plus the selector
//! flags that affect matching) and records the downstream faces still
//! awaiting a response and the upstream faces the request was forwarded
//! to. The table itself is passive: the forwarder drives it under the
//! dispatch lock and arms the expiry timers.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use rust_ndnfw_common::ndn::{Interest, Name};
use tokio::time::Instant;

use crate::face::FaceId;
use crate::transport::InterestToken;

/// Canonical request key: requests with equal keys are aggregatable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PitKey {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
}

impl PitKey {
    pub fn of(interest: &Interest) -> Self {
        Self {
            name: interest.name.clone(),
            can_be_prefix: interest.can_be_prefix,
            must_be_fresh: interest.must_be_fresh,
        }
    }
}

/// One downstream consumer awaiting a response.
#[derive(Debug, Clone)]
pub struct Downstream {
    pub face: FaceId,
    /// The token the consumer attached to this specific request.
    pub token: InterestToken,
    pub nonce: u32,
    pub since: Instant,
}

/// One upstream forwarding attempt.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub face: FaceId,
    /// Nonce last forwarded out this face, for loop detection.
    pub nonce: u32,
    pub since: Instant,
}

/// A pending request. Never observable with zero downstream records:
/// the entry is deleted in the same step that removes the last one.
#[derive(Debug)]
pub struct PitEntry {
    key: PitKey,
    downstreams: Vec<Downstream>,
    upstreams: Vec<Upstream>,
    tried: HashSet<FaceId>,
    expiry: Instant,
    created: Instant,
}

impl PitEntry {
    pub fn key(&self) -> &PitKey {
        &self.key
    }

    /// Downstream records in insertion order; Data fan-out follows it.
    pub fn downstreams(&self) -> &[Downstream] {
        &self.downstreams
    }

    pub fn upstreams(&self) -> &[Upstream] {
        &self.upstreams
    }

    /// Faces this request was ever forwarded to, including nacked ones.
    pub fn tried(&self) -> &HashSet<FaceId> {
        &self.tried
    }

    pub fn expiry(&self) -> Instant {
        self.expiry
    }

    pub fn created(&self) -> Instant {
        self.created
    }
}

/// What the forwarder should do with an inbound Interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestDisposition {
    /// First request for this key; forward upstream.
    Forward { expiry: Instant },
    /// Merged into an existing entry; nothing goes upstream. `extended`
    /// is set when this request pushed the expiry deadline out.
    Aggregated { expiry: Instant, extended: bool },
    /// The same nonce was already forwarded out the arrival face: a
    /// network loop. Reject with a Nack, do not aggregate.
    Loop,
}

/// Result of withdrawing one downstream record.
#[derive(Debug)]
pub enum CancelOutcome {
    /// No record matched (face, token).
    NotFound,
    /// Removed; other consumers still wait, the entry stays.
    Remaining,
    /// Removed the last record; the entry is gone. Propagate the
    /// cancellation to every upstream face listed.
    Propagate { upstreams: Vec<Upstream> },
}

/// Result of recording an upstream refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    /// No entry, or the face was not an outstanding upstream.
    NotFound,
    /// Other upstream attempts are still outstanding.
    Pending,
    /// That was the last outstanding upstream. The caller decides
    /// between retrying untried routes and rejecting downstream.
    Exhausted,
}

/// The PIT. Exclusively owned and mutated by the forwarder.
#[derive(Debug, Default)]
pub struct Pit {
    entries: HashMap<PitKey, PitEntry>,
}

impl Pit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, key: &PitKey) -> Option<&PitEntry> {
        self.entries.get(key)
    }

    /// Registers an inbound Interest: creates the entry, aggregates into
    /// an existing one (extending its lifetime, never shortening it), or
    /// detects a loop.
    pub fn on_interest(
        &mut self,
        face: FaceId,
        token: InterestToken,
        interest: &Interest,
        now: Instant,
    ) -> InterestDisposition {
        let key = PitKey::of(interest);
        let lifetime = Duration::from_millis(interest.lifetime_ms as u64);
        let downstream = Downstream {
            face,
            token,
            nonce: interest.nonce,
            since: now,
        };

        match self.entries.get_mut(&key) {
            Some(entry) => {
                if entry
                    .upstreams
                    .iter()
                    .any(|up| up.face == face && up.nonce == interest.nonce)
                {
                    return InterestDisposition::Loop;
                }
                entry.downstreams.push(downstream);
                let deadline = now + lifetime;
                let extended = deadline > entry.expiry;
                if extended {
                    entry.expiry = deadline;
                }
                InterestDisposition::Aggregated {
                    expiry: entry.expiry,
                    extended,
                }
            }
            None => {
                let expiry = now + lifetime;
                self.entries.insert(
                    key.clone(),
                    PitEntry {
                        key,
                        downstreams: vec![downstream],
                        upstreams: Vec::new(),
                        tried: HashSet::new(),
                        expiry,
                        created: now,
                    },
                );
                InterestDisposition::Forward { expiry }
            }
        }
    }

    /// Records that the request was forwarded out `face` with `nonce`.
    pub fn on_outgoing(&mut self, key: &PitKey, face: FaceId, nonce: u32, now: Instant) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        entry.tried.insert(face);
        match entry.upstreams.iter_mut().find(|up| up.face == face) {
            Some(up) => {
                up.nonce = nonce;
                up.since = now;
            }
            None => entry.upstreams.push(Upstream { face, nonce, since: now }),
        }
    }

    /// Matches inbound Data against the most specific pending entry and
    /// removes it: exact-name entries always match; an entry whose
    /// request permitted prefix matching matches any Data it prefixes.
    /// Exact entries win over prefix entries of equal name length.
    pub fn on_data(&mut self, name: &Name) -> Option<PitEntry> {
        let key = self
            .entries
            .values()
            .filter(|entry| {
                entry.key.name == *name
                    || (entry.key.can_be_prefix && entry.key.name.is_prefix_of(name))
            })
            .max_by_key(|entry| (entry.key.name.len(), !entry.key.can_be_prefix))
            .map(|entry| entry.key.clone())?;
        self.entries.remove(&key)
    }

    /// Withdraws exactly the downstream record matching (face, token).
    pub fn on_cancel(&mut self, key: &PitKey, face: FaceId, token: InterestToken) -> CancelOutcome {
        let Some(entry) = self.entries.get_mut(key) else {
            return CancelOutcome::NotFound;
        };
        let before = entry.downstreams.len();
        entry
            .downstreams
            .retain(|down| !(down.face == face && down.token == token));
        if entry.downstreams.len() == before {
            return CancelOutcome::NotFound;
        }
        if !entry.downstreams.is_empty() {
            return CancelOutcome::Remaining;
        }
        match self.entries.remove(key) {
            Some(entry) => CancelOutcome::Propagate {
                upstreams: entry.upstreams,
            },
            None => CancelOutcome::NotFound,
        }
    }

    /// Records an upstream refusal from `face`.
    pub fn on_nack(&mut self, key: &PitKey, face: FaceId) -> NackOutcome {
        let Some(entry) = self.entries.get_mut(key) else {
            return NackOutcome::NotFound;
        };
        let before = entry.upstreams.len();
        entry.upstreams.retain(|up| up.face != face);
        if entry.upstreams.len() == before {
            return NackOutcome::NotFound;
        }
        if entry.upstreams.is_empty() {
            NackOutcome::Exhausted
        } else {
            NackOutcome::Pending
        }
    }

    /// Removes and returns an entry, if present.
    pub fn remove(&mut self, key: &PitKey) -> Option<PitEntry> {
        self.entries.remove(key)
    }

    /// Bookkeeping cleanup when a face closes: the face disappears from
    /// every record set; entries left without a downstream are dropped
    /// silently (the face is already gone, nothing to signal).
    pub fn close_face(&mut self, face: FaceId) {
        self.entries.retain(|_, entry| {
            entry.downstreams.retain(|down| down.face != face);
            entry.upstreams.retain(|up| up.face != face);
            entry.tried.remove(&face);
            !entry.downstreams.is_empty()
        });
    }

    /// Removes an entry whose deadline has passed. A timer armed before
    /// an aggregation extended the deadline finds the entry still live
    /// and leaves it for the later timer.
    pub fn expire(&mut self, key: &PitKey, now: Instant) -> Option<PitEntry> {
        match self.entries.get(key) {
            Some(entry) if entry.expiry <= now => self.entries.remove(key),
            _ => None,
        }
    }
}
