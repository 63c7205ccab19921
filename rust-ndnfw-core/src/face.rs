//! Faces: per-connection endpoints of the forwarding plane.
//!
//! A face wraps one transport and runs two pipelines: an inbound loop
//! that submits received items to the forwarder's dispatch entry point,
//! and an outbound loop that drains a bounded queue into the transport.
//! The bounded queue is the backpressure mechanism: `send` suspends the
//! caller while the queue is full and never drops an item.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::{debug, trace};
use rust_ndnfw_common::ndn::Name;
use rust_ndnfw_common::Error;
use tokio::sync::{mpsc, watch};

use crate::forwarder::Forwarder;
use crate::transport::{RxPacket, TransportRx, TransportTx, TxPacket};

/// Stable opaque handle for a face, unique within one forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub u64);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "face{}", self.0)
    }
}

/// Collaborator through which a face announces locally reachable
/// prefixes to its remote peer. Route computation is not the core's
/// concern; the forwarder only reports prefix arrivals and departures.
pub trait Advertise: Send + Sync {
    /// A prefix became reachable through this forwarder.
    fn announce(&self, prefix: &Name);

    /// A previously announced prefix is no longer reachable.
    fn withdraw(&self, prefix: &Name);
}

/// A connection endpoint attached to a [`Forwarder`].
pub struct Face {
    id: FaceId,
    fw: Weak<Forwarder>,
    tx_queue: mpsc::Sender<TxPacket>,
    tx_queue_len: AtomicUsize,
    running: AtomicBool,
    closed: watch::Sender<bool>,
    routes: Mutex<HashSet<Name>>,
    advertise: Mutex<Option<Arc<dyn Advertise>>>,
}

impl Face {
    pub(crate) fn new(
        id: FaceId,
        fw: Weak<Forwarder>,
        tx_queue: mpsc::Sender<TxPacket>,
    ) -> Arc<Self> {
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            id,
            fw,
            tx_queue,
            tx_queue_len: AtomicUsize::new(0),
            running: AtomicBool::new(true),
            closed,
            routes: Mutex::new(HashSet::new()),
            advertise: Mutex::new(None),
        })
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    /// False once the face has begun closing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of items currently waiting in the outbound queue.
    pub fn tx_queue_len(&self) -> usize {
        self.tx_queue_len.load(Ordering::Relaxed)
    }

    /// Subscription that observes the transition to closed exactly once;
    /// subscribers arriving after the fact still see it.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Installs the advertise collaborator for this face.
    pub fn set_advertise(&self, advertise: Arc<dyn Advertise>) {
        if let Ok(mut slot) = self.advertise.lock() {
            *slot = Some(advertise);
        }
    }

    pub(crate) fn advertise_handle(&self) -> Option<Arc<dyn Advertise>> {
        self.advertise.lock().ok().and_then(|slot| slot.clone())
    }

    /// Prefixes currently routed toward this face.
    pub fn routes(&self) -> Vec<Name> {
        self.routes
            .lock()
            .map(|routes| routes.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn note_route(&self, prefix: &Name) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(prefix.clone());
        }
    }

    pub(crate) fn forget_route(&self, prefix: &Name) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.remove(prefix);
        }
    }

    /// Enqueues an outbound item. Suspends while the queue is at
    /// capacity; never drops. Fails only once the face is closed.
    pub async fn send(&self, packet: TxPacket) -> rust_ndnfw_common::Result<()> {
        if !self.is_running() {
            return Err(Error::FaceClosed);
        }
        self.tx_queue_len.fetch_add(1, Ordering::Relaxed);
        if self.tx_queue.send(packet).await.is_err() {
            self.tx_queue_len.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::FaceClosed);
        }
        Ok(())
    }

    /// Adds a route toward this face.
    pub async fn add_route(&self, prefix: &Name) -> rust_ndnfw_common::Result<()> {
        let fw = self.fw.upgrade().ok_or(Error::FaceClosed)?;
        fw.add_route(self.id, prefix.clone(), 0).await
    }

    /// Removes a route toward this face.
    pub async fn remove_route(&self, prefix: &Name) {
        if let Some(fw) = self.fw.upgrade() {
            fw.remove_route(self.id, prefix.clone()).await;
        }
    }

    /// Shuts the face down: detaches it from the forwarder (face set,
    /// FIB entries, PIT records) in one serialized step, stops both
    /// pipelines, and fires the close notification. Idempotent; racing
    /// closes are safe.
    pub async fn close(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!("{} closing", self.id);
        if let Some(fw) = self.fw.upgrade() {
            fw.detach_face(self.id).await;
        }
        self.closed.send_replace(true);
    }
}

impl fmt::Debug for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Face")
            .field("id", &self.id)
            .field("running", &self.is_running())
            .field("tx_queue_len", &self.tx_queue_len())
            .finish()
    }
}

/// Inbound pipeline: reads the transport until exhaustion or close and
/// dispatches each item into the forwarder. Items arriving after the
/// face has begun closing are discarded.
pub(crate) async fn rx_loop<R: TransportRx>(face: Arc<Face>, mut transport: R) {
    let mut closed = face.closed();
    loop {
        tokio::select! {
            _ = closed.changed() => break,
            item = transport.recv() => {
                let Some(packet) = item else { break };
                if !face.is_running() {
                    trace!("{} discarding item received while closing", face.id);
                    continue;
                }
                let Some(fw) = face.fw.upgrade() else { break };
                match packet {
                    RxPacket::Interest { interest, token } => {
                        fw.process_interest(&face, token, interest).await;
                    }
                    RxPacket::Data(data) => fw.process_data(&face, data).await,
                    RxPacket::Cancel { interest, token } => {
                        fw.process_cancel(&face, token, interest).await;
                    }
                    RxPacket::Nack(nack) => fw.process_nack(&face, nack).await,
                }
            }
        }
    }
    face.close().await;
}

/// Outbound pipeline: drains the bounded queue into the transport.
/// A transport error or a closed-and-drained queue closes the face.
pub(crate) async fn tx_loop<T: TransportTx>(
    face: Arc<Face>,
    mut queue: mpsc::Receiver<TxPacket>,
    mut transport: T,
) {
    let mut closed = face.closed();
    loop {
        tokio::select! {
            _ = closed.changed() => break,
            item = queue.recv() => {
                let Some(packet) = item else { break };
                face.tx_queue_len.fetch_sub(1, Ordering::Relaxed);
                if let Err(err) = transport.send(packet).await {
                    debug!("{} transport write failed: {err}", face.id);
                    break;
                }
            }
        }
    }
    face.close().await;
}
