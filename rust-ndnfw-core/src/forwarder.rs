//! The forwarder: central dispatch over the face set, FIB and PIT.
//!
//! All shared state sits behind one mutex; every dispatch step locks,
//! mutates, unlocks, and only then enqueues outbound packets. A full
//! queue therefore suspends only the pipeline that triggered the send,
//! never another face's inbound processing, and every PIT/FIB
//! read-modify-write is atomic with respect to concurrent dispatches.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, trace};
use rust_ndnfw_common::metrics::ForwarderMetrics;
use rust_ndnfw_common::ndn::{Data, Interest, Nack, NackReason, Name};
use rust_ndnfw_common::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep_until, Instant};

use crate::face::{self, Face, FaceId};
use crate::fib::Fib;
use crate::pit::{CancelOutcome, InterestDisposition, NackOutcome, Pit, PitKey};
use crate::transport::{InterestToken, TransportRx, TransportTx, TxPacket};
use crate::DEFAULT_FACE_TX_QUEUE;

/// Tuning knobs for a forwarder instance.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Capacity of each face's outbound queue. A full queue applies
    /// backpressure to dispatch; items are never dropped.
    pub face_tx_queue: usize,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            face_tx_queue: DEFAULT_FACE_TX_QUEUE,
        }
    }
}

struct State {
    faces: HashMap<FaceId, Arc<Face>>,
    fib: Fib,
    pit: Pit,
}

/// A forwarding instance. Construct with [`Forwarder::new`] and pass the
/// `Arc` handle around explicitly; there is no process-wide instance.
pub struct Forwarder {
    config: ForwarderConfig,
    metrics: Arc<ForwarderMetrics>,
    next_face: AtomicU64,
    next_token: AtomicU64,
    state: Mutex<State>,
}

impl Forwarder {
    pub fn new(config: ForwarderConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            metrics: Arc::new(ForwarderMetrics::new()),
            next_face: AtomicU64::new(1),
            next_token: AtomicU64::new(1),
            state: Mutex::new(State {
                faces: HashMap::new(),
                fib: Fib::new(),
                pit: Pit::new(),
            }),
        })
    }

    pub fn metrics(&self) -> Arc<ForwarderMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Attaches a transport as a new face and starts its pipelines.
    pub async fn add_face<R, T>(self: &Arc<Self>, transport_rx: R, transport_tx: T) -> Arc<Face>
    where
        R: TransportRx,
        T: TransportTx,
    {
        let id = FaceId(self.next_face.fetch_add(1, Ordering::Relaxed));
        let (queue_tx, queue_rx) = mpsc::channel(self.config.face_tx_queue);
        let face = Face::new(id, Arc::downgrade(self), queue_tx);

        self.state.lock().await.faces.insert(id, Arc::clone(&face));
        tokio::spawn(face::rx_loop(Arc::clone(&face), transport_rx));
        tokio::spawn(face::tx_loop(Arc::clone(&face), queue_rx, transport_tx));

        debug!("{id} attached");
        face
    }

    pub async fn face(&self, id: FaceId) -> Option<Arc<Face>> {
        self.state.lock().await.faces.get(&id).cloned()
    }

    pub async fn faces(&self) -> Vec<Arc<Face>> {
        self.state.lock().await.faces.values().cloned().collect()
    }

    /// Closes every face. Meant for orderly shutdown of the instance.
    pub async fn shutdown(&self) {
        for face in self.faces().await {
            face.close().await;
        }
    }

    /// Installs a route: Interests under `prefix` become forwardable
    /// toward `face`. Synchronous FIB mutation; the PIT is untouched.
    pub async fn add_route(
        &self,
        face: FaceId,
        prefix: Name,
        cost: u32,
    ) -> rust_ndnfw_common::Result<()> {
        let peers;
        {
            let mut state = self.state.lock().await;
            let Some(owner) = state.faces.get(&face).cloned() else {
                return Err(Error::FaceClosed);
            };
            if state.fib.insert(&prefix, face, cost) {
                self.metrics.fib_size.set(state.fib.len() as u64);
            }
            owner.note_route(&prefix);
            peers = other_faces(&state, face);
        }
        debug!("route {prefix} -> {face} added");
        for peer in peers {
            if let Some(advertise) = peer.advertise_handle() {
                advertise.announce(&prefix);
            }
        }
        Ok(())
    }

    /// Removes a route. The PIT is untouched; in-flight requests that
    /// already chose this next hop run their course.
    pub async fn remove_route(&self, face: FaceId, prefix: Name) {
        let peers;
        {
            let mut state = self.state.lock().await;
            if !state.fib.delete(&prefix, face) {
                return;
            }
            self.metrics.fib_size.set(state.fib.len() as u64);
            if let Some(owner) = state.faces.get(&face) {
                owner.forget_route(&prefix);
            }
            // withdraw only once the prefix has no next hop left at all
            peers = if state.fib.contains_prefix(&prefix) {
                Vec::new()
            } else {
                other_faces(&state, face)
            };
        }
        debug!("route {prefix} -> {face} removed");
        for peer in peers {
            if let Some(advertise) = peer.advertise_handle() {
                advertise.withdraw(&prefix);
            }
        }
    }

    /// Removes every face/FIB/PIT reference to `id` in one serialized
    /// step, so no later dispatch can still choose the face.
    pub(crate) async fn detach_face(&self, id: FaceId) {
        let mut state = self.state.lock().await;
        state.faces.remove(&id);
        state.fib.close_face(id);
        state.pit.close_face(id);
        self.metrics.fib_size.set(state.fib.len() as u64);
        self.metrics.pit_size.set(state.pit.len() as u64);
        debug!("{id} detached");
    }

    fn fresh_token(&self) -> InterestToken {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    /// Dispatch of an inbound Interest from `from`.
    pub(crate) async fn process_interest(
        self: &Arc<Self>,
        from: &Arc<Face>,
        token: InterestToken,
        interest: Interest,
    ) {
        self.metrics.interests_received.increment();
        if interest.name.is_empty() {
            trace!("{} dropped Interest with empty name", from.id());
            return;
        }

        let now = Instant::now();
        let key = PitKey::of(&interest);
        let reject;
        let upstream_sends: Vec<(Arc<Face>, InterestToken)>;
        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            match state.pit.on_interest(from.id(), token, &interest, now) {
                InterestDisposition::Loop => {
                    self.metrics.interests_looped.increment();
                    reject = Some(NackReason::Duplicate);
                    upstream_sends = Vec::new();
                }
                InterestDisposition::Aggregated { expiry, extended } => {
                    self.metrics.interests_aggregated.increment();
                    if extended {
                        self.arm_expiry(key, expiry);
                    }
                    trace!("{} aggregated Interest {}", from.id(), interest.name);
                    return;
                }
                InterestDisposition::Forward { expiry } => {
                    self.metrics.pit_inserts.increment();
                    self.metrics.pit_size.set(state.pit.len() as u64);
                    let hops: Vec<FaceId> = state
                        .fib
                        .lookup(&interest.name)
                        .iter()
                        .map(|hop| hop.face)
                        .filter(|hop| *hop != from.id())
                        .collect();
                    let mut sends = Vec::with_capacity(hops.len());
                    for hop in hops {
                        if let Some(next) = state.faces.get(&hop) {
                            state.pit.on_outgoing(&key, hop, interest.nonce, now);
                            sends.push((Arc::clone(next), self.fresh_token()));
                        }
                    }
                    if sends.is_empty() {
                        // immediate rejection: the fresh entry dies with it
                        state.pit.remove(&key);
                        self.metrics.pit_size.set(state.pit.len() as u64);
                        self.metrics.interests_no_route.increment();
                        reject = Some(NackReason::NoRoute);
                        upstream_sends = Vec::new();
                    } else {
                        self.arm_expiry(key, expiry);
                        reject = None;
                        upstream_sends = sends;
                    }
                }
            }
        }

        if let Some(reason) = reject {
            self.send_nack(from, &interest, reason, token).await;
            return;
        }
        for (next, fresh) in upstream_sends {
            self.metrics.interests_forwarded.increment();
            trace!("{} -> {} Interest {}", from.id(), next.id(), interest.name);
            if next
                .send(TxPacket::Interest {
                    interest: interest.clone(),
                    token: fresh,
                })
                .await
                .is_err()
            {
                trace!("{} closed before Interest could be queued", next.id());
            }
        }
    }

    /// Dispatch of inbound Data from `from`. Unsolicited Data is not an
    /// error; it is ignored.
    pub(crate) async fn process_data(&self, from: &Arc<Face>, data: Data) {
        self.metrics.data_received.increment();
        if data.name.is_empty() {
            trace!("{} dropped Data with empty name", from.id());
            return;
        }

        let deliveries: Vec<(Arc<Face>, InterestToken)>;
        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let Some(entry) = state.pit.on_data(&data.name) else {
                self.metrics.data_unsolicited.increment();
                trace!("{} unsolicited Data {}", from.id(), data.name);
                return;
            };
            self.metrics
                .satisfy_latency_us
                .observe(entry.created().elapsed().as_micros() as u64);
            self.metrics.pit_size.set(state.pit.len() as u64);
            deliveries = entry
                .downstreams()
                .iter()
                .filter_map(|down| {
                    state
                        .faces
                        .get(&down.face)
                        .map(|face| (Arc::clone(face), down.token))
                })
                .collect();
        }

        // fan out to every aggregated consumer, in insertion order
        for (consumer, token) in deliveries {
            self.metrics.data_sent.increment();
            trace!("{} <- Data {}", consumer.id(), data.name);
            if consumer
                .send(TxPacket::Data {
                    data: data.clone(),
                    token,
                })
                .await
                .is_err()
            {
                trace!("{} closed before Data could be queued", consumer.id());
            }
        }
    }

    /// Dispatch of a cancel request: the consumer on `from` withdraws
    /// the pending request it tagged with `token`.
    pub(crate) async fn process_cancel(
        &self,
        from: &Arc<Face>,
        token: InterestToken,
        interest: Interest,
    ) {
        self.metrics.cancels_received.increment();
        let key = PitKey::of(&interest);
        let upstream_sends: Vec<(Arc<Face>, InterestToken)>;
        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            match state.pit.on_cancel(&key, from.id(), token) {
                CancelOutcome::NotFound => {
                    trace!("{} cancel for unknown request {}", from.id(), interest.name);
                    return;
                }
                CancelOutcome::Remaining => return,
                CancelOutcome::Propagate { upstreams } => {
                    self.metrics.pit_size.set(state.pit.len() as u64);
                    upstream_sends = upstreams
                        .iter()
                        .filter_map(|up| {
                            state
                                .faces
                                .get(&up.face)
                                .map(|face| (Arc::clone(face), self.fresh_token()))
                        })
                        .collect();
                }
            }
        }

        debug!("last consumer canceled {}, withdrawing upstream", interest.name);
        for (upstream, fresh) in upstream_sends {
            if upstream
                .send(TxPacket::Cancel {
                    interest: interest.clone(),
                    token: fresh,
                })
                .await
                .is_err()
            {
                trace!("{} closed before cancel could be queued", upstream.id());
            }
        }
    }

    /// Dispatch of an upstream Nack from `from` for a previously
    /// forwarded Interest.
    pub(crate) async fn process_nack(self: &Arc<Self>, from: &Arc<Face>, nack: Nack) {
        self.metrics.nacks_received.increment();
        let key = PitKey::of(&nack.interest);
        let now = Instant::now();

        enum Outcome {
            Drop,
            Retry(Vec<(Arc<Face>, InterestToken)>),
            GiveUp(Vec<(Arc<Face>, InterestToken)>),
        }

        let outcome;
        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            match state.pit.on_nack(&key, from.id()) {
                NackOutcome::NotFound | NackOutcome::Pending => {
                    outcome = Outcome::Drop;
                }
                NackOutcome::Exhausted => {
                    let (tried, consumers): (HashSet<FaceId>, HashSet<FaceId>) =
                        match state.pit.entry(&key) {
                            Some(entry) => (
                                entry.tried().clone(),
                                entry.downstreams().iter().map(|down| down.face).collect(),
                            ),
                            None => (HashSet::new(), HashSet::new()),
                        };
                    let retry_hops: Vec<FaceId> = state
                        .fib
                        .lookup(&key.name)
                        .iter()
                        .map(|hop| hop.face)
                        .filter(|hop| !tried.contains(hop) && !consumers.contains(hop))
                        .collect();

                    let mut sends = Vec::with_capacity(retry_hops.len());
                    for hop in retry_hops {
                        if let Some(next) = state.faces.get(&hop) {
                            state.pit.on_outgoing(&key, hop, nack.interest.nonce, now);
                            sends.push((Arc::clone(next), self.fresh_token()));
                        }
                    }
                    if !sends.is_empty() {
                        outcome = Outcome::Retry(sends);
                    } else {
                        match state.pit.remove(&key) {
                            Some(entry) => {
                                self.metrics.pit_size.set(state.pit.len() as u64);
                                let rejects = entry
                                    .downstreams()
                                    .iter()
                                    .filter_map(|down| {
                                        state
                                            .faces
                                            .get(&down.face)
                                            .map(|face| (Arc::clone(face), down.token))
                                    })
                                    .collect();
                                outcome = Outcome::GiveUp(rejects);
                            }
                            None => outcome = Outcome::Drop,
                        }
                    }
                }
            }
        }

        match outcome {
            Outcome::Drop => {}
            Outcome::Retry(sends) => {
                for (next, fresh) in sends {
                    self.metrics.interests_forwarded.increment();
                    debug!(
                        "{} nacked {}, retrying via {}",
                        from.id(),
                        nack.interest.name,
                        next.id()
                    );
                    if next
                        .send(TxPacket::Interest {
                            interest: nack.interest.clone(),
                            token: fresh,
                        })
                        .await
                        .is_err()
                    {
                        trace!("{} closed before retry could be queued", next.id());
                    }
                }
            }
            Outcome::GiveUp(rejects) => {
                debug!(
                    "all upstreams rejected {}, propagating {}",
                    nack.interest.name, nack.reason
                );
                for (consumer, token) in rejects {
                    self.send_nack(&consumer, &nack.interest, nack.reason, token).await;
                }
            }
        }
    }

    async fn send_nack(
        &self,
        face: &Arc<Face>,
        interest: &Interest,
        reason: NackReason,
        token: InterestToken,
    ) {
        self.metrics.nacks_sent.increment();
        let nack = Nack::new(interest.clone(), reason);
        if face.send(TxPacket::Nack { nack, token }).await.is_err() {
            trace!("{} closed before Nack could be queued", face.id());
        }
    }

    /// Arms a one-shot timer for the entry's deadline. Timers race
    /// satisfaction and aggregation safely: firing re-checks the entry
    /// and its deadline under the dispatch lock, and an extension simply
    /// arms a fresh, later timer.
    fn arm_expiry(self: &Arc<Self>, key: PitKey, deadline: Instant) {
        let fw: Weak<Forwarder> = Arc::downgrade(self);
        tokio::spawn(async move {
            sleep_until(deadline).await;
            if let Some(fw) = fw.upgrade() {
                fw.expire_entry(key).await;
            }
        });
    }

    async fn expire_entry(&self, key: PitKey) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.pit.expire(&key, Instant::now()) {
            self.metrics.pit_expirations.increment();
            self.metrics.pit_size.set(state.pit.len() as u64);
            // no packet goes downstream; consumers run their own timeout
            debug!(
                "pending Interest {} expired with {} consumer(s) waiting",
                entry.key().name,
                entry.downstreams().len()
            );
        }
    }
}

fn other_faces(state: &State, except: FaceId) -> Vec<Arc<Face>> {
    state
        .faces
        .values()
        .filter(|face| face.id() != except)
        .cloned()
        .collect()
}
