//! End-to-end forwarding behavior over in-process channel faces.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_ndnfw_common::ndn::{Data, Interest, Nack, NackReason, Name};
use rust_ndnfw_core::{
    channel_transport, Advertise, ChannelPeer, Face, Forwarder, ForwarderConfig, RxPacket,
    TxPacket,
};
use tokio::time::timeout;

async fn attach(fw: &Arc<Forwarder>) -> (Arc<Face>, ChannelPeer) {
    let (rx, tx, peer) = channel_transport(16);
    (fw.add_face(rx, tx).await, peer)
}

/// Let the spawned pipelines and dispatch steps run to completion.
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

async fn recv(peer: &mut ChannelPeer) -> TxPacket {
    timeout(Duration::from_secs(1), peer.recv())
        .await
        .expect("no packet within 1s")
        .expect("face closed")
}

fn interest(uri: &str, nonce: u32) -> Interest {
    Interest::new(Name::from_uri(uri)).with_nonce(nonce)
}

#[tokio::test]
async fn aggregation_forwards_once_and_fans_out_to_all_consumers() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (_a, mut consumer_a) = attach(&fw).await;
    let (_b, mut consumer_b) = attach(&fw).await;
    let (producer_face, mut producer) = attach(&fw).await;
    producer_face.add_route(&Name::from_uri("/video")).await.unwrap();

    consumer_a
        .send(RxPacket::Interest {
            interest: interest("/video/1", 1),
            token: 10,
        })
        .await
        .unwrap();
    consumer_b
        .send(RxPacket::Interest {
            interest: interest("/video/1", 2),
            token: 20,
        })
        .await
        .unwrap();
    settle().await;

    // exactly one upstream forward for the aggregated pair
    let TxPacket::Interest { interest: seen, .. } = recv(&mut producer).await else {
        panic!("expected Interest at producer");
    };
    assert_eq!(seen.name, Name::from_uri("/video/1"));
    assert!(producer.try_recv().is_none());
    assert_eq!(fw.metrics().interests_aggregated.value(), 1);

    producer
        .send(RxPacket::Data(Data::new(Name::from_uri("/video/1"), &b"payload"[..])))
        .await
        .unwrap();
    settle().await;

    // one delivery per original token, in downstream insertion order
    let TxPacket::Data { token: first, .. } = recv(&mut consumer_a).await else {
        panic!("expected Data at consumer A");
    };
    let TxPacket::Data { token: second, .. } = recv(&mut consumer_b).await else {
        panic!("expected Data at consumer B");
    };
    assert_eq!(first, 10);
    assert_eq!(second, 20);
    assert_eq!(fw.metrics().data_sent.value(), 2);
    assert_eq!(fw.metrics().pit_size.value(), 0);

    // a second identical Data finds no entry and is dropped
    producer
        .send(RxPacket::Data(Data::new(Name::from_uri("/video/1"), &b"payload"[..])))
        .await
        .unwrap();
    settle().await;
    assert!(consumer_a.try_recv().is_none());
    assert!(consumer_b.try_recv().is_none());
    assert_eq!(fw.metrics().data_unsolicited.value(), 1);
}

#[tokio::test]
async fn looping_interest_is_nacked_and_not_reforwarded() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (_a, consumer) = attach(&fw).await;
    let (peer_face, mut peer) = attach(&fw).await;
    peer_face.add_route(&Name::from_uri("/l")).await.unwrap();

    consumer
        .send(RxPacket::Interest {
            interest: interest("/l/x", 7),
            token: 1,
        })
        .await
        .unwrap();
    settle().await;
    let TxPacket::Interest { .. } = recv(&mut peer).await else {
        panic!("expected forwarded Interest");
    };

    // the same name and nonce comes back in on the face it went out of
    peer.send(RxPacket::Interest {
        interest: interest("/l/x", 7),
        token: 2,
    })
    .await
    .unwrap();
    settle().await;

    let TxPacket::Nack { nack, token } = recv(&mut peer).await else {
        panic!("expected Nack for the looped Interest");
    };
    assert_eq!(nack.reason, NackReason::Duplicate);
    assert_eq!(token, 2);
    assert!(peer.try_recv().is_none());
    assert_eq!(fw.metrics().interests_looped.value(), 1);
}

#[tokio::test]
async fn longest_prefix_route_wins() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (_c, consumer) = attach(&fw).await;
    let (short_face, mut short_peer) = attach(&fw).await;
    let (long_face, mut long_peer) = attach(&fw).await;
    short_face.add_route(&Name::from_uri("/a")).await.unwrap();
    long_face.add_route(&Name::from_uri("/a/b")).await.unwrap();

    consumer
        .send(RxPacket::Interest {
            interest: interest("/a/b/c", 1),
            token: 1,
        })
        .await
        .unwrap();
    settle().await;

    let TxPacket::Interest { interest: seen, .. } = recv(&mut long_peer).await else {
        panic!("expected Interest on the /a/b face");
    };
    assert_eq!(seen.name, Name::from_uri("/a/b/c"));
    assert!(short_peer.try_recv().is_none());
}

#[tokio::test]
async fn no_route_yields_nack_and_no_pit_entry() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (_c, mut consumer) = attach(&fw).await;

    consumer
        .send(RxPacket::Interest {
            interest: interest("/nowhere", 1),
            token: 5,
        })
        .await
        .unwrap();
    settle().await;

    let TxPacket::Nack { nack, token } = recv(&mut consumer).await else {
        panic!("expected no-route Nack");
    };
    assert_eq!(nack.reason, NackReason::NoRoute);
    assert_eq!(token, 5);
    assert_eq!(fw.metrics().pit_size.value(), 0);
    assert_eq!(fw.metrics().interests_no_route.value(), 1);
}

#[tokio::test]
async fn cancel_propagates_upstream_only_when_last_consumer_leaves() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (_a, consumer_a) = attach(&fw).await;
    let (_b, consumer_b) = attach(&fw).await;
    let (producer_face, mut producer) = attach(&fw).await;
    producer_face.add_route(&Name::from_uri("/c")).await.unwrap();

    consumer_a
        .send(RxPacket::Interest {
            interest: interest("/c/1", 1),
            token: 10,
        })
        .await
        .unwrap();
    consumer_b
        .send(RxPacket::Interest {
            interest: interest("/c/1", 2),
            token: 20,
        })
        .await
        .unwrap();
    settle().await;
    let TxPacket::Interest { .. } = recv(&mut producer).await else {
        panic!("expected forwarded Interest");
    };

    // first cancellation: the entry and the upstream forward stay
    consumer_a
        .send(RxPacket::Cancel {
            interest: interest("/c/1", 1),
            token: 10,
        })
        .await
        .unwrap();
    settle().await;
    assert!(producer.try_recv().is_none());
    assert_eq!(fw.metrics().pit_size.value(), 1);

    // second cancellation: entry dies, upstream learns
    consumer_b
        .send(RxPacket::Cancel {
            interest: interest("/c/1", 2),
            token: 20,
        })
        .await
        .unwrap();
    settle().await;

    let TxPacket::Cancel { interest: canceled, .. } = recv(&mut producer).await else {
        panic!("expected upstream cancel");
    };
    assert_eq!(canceled.name, Name::from_uri("/c/1"));
    assert_eq!(fw.metrics().pit_size.value(), 0);
}

#[tokio::test]
async fn closing_a_face_purges_its_routes_and_records() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (_a, mut consumer) = attach(&fw).await;
    let (producer_face, mut producer) = attach(&fw).await;
    producer_face.add_route(&Name::from_uri("/gone")).await.unwrap();

    consumer
        .send(RxPacket::Interest {
            interest: interest("/gone/1", 1),
            token: 1,
        })
        .await
        .unwrap();
    settle().await;
    let TxPacket::Interest { .. } = recv(&mut producer).await else {
        panic!("expected forwarded Interest");
    };
    assert_eq!(fw.metrics().fib_size.value(), 1);

    producer_face.close().await;
    producer_face.close().await; // double close is a safe no-op
    settle().await;

    assert!(!producer_face.is_running());
    assert!(*producer_face.closed().borrow()); // late subscriber still observes
    assert_eq!(fw.metrics().fib_size.value(), 0);
    assert!(fw.face(producer_face.id()).await.is_none());

    // the route died with the face: same request now has nowhere to go
    consumer
        .send(RxPacket::Interest {
            interest: interest("/gone/2", 2),
            token: 2,
        })
        .await
        .unwrap();
    settle().await;
    let TxPacket::Nack { nack, .. } = recv(&mut consumer).await else {
        panic!("expected no-route Nack after face close");
    };
    assert_eq!(nack.reason, NackReason::NoRoute);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_is_deleted_and_late_data_goes_nowhere() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (_a, mut consumer) = attach(&fw).await;
    let (producer_face, mut producer) = attach(&fw).await;
    producer_face.add_route(&Name::from_uri("/t")).await.unwrap();

    consumer
        .send(RxPacket::Interest {
            interest: interest("/t/1", 1).with_lifetime(100),
            token: 1,
        })
        .await
        .unwrap();
    settle().await;
    let TxPacket::Interest { .. } = recv(&mut producer).await else {
        panic!("expected forwarded Interest");
    };
    assert_eq!(fw.metrics().pit_size.value(), 1);

    tokio::time::advance(Duration::from_millis(150)).await;
    settle().await;

    // expiry deleted the entry without sending anything downstream
    assert_eq!(fw.metrics().pit_expirations.value(), 1);
    assert_eq!(fw.metrics().pit_size.value(), 0);
    assert!(consumer.try_recv().is_none());

    // Data arriving after expiry is unsolicited
    producer
        .send(RxPacket::Data(Data::new(Name::from_uri("/t/1"), &b"late"[..])))
        .await
        .unwrap();
    settle().await;
    assert!(consumer.try_recv().is_none());
    assert_eq!(fw.metrics().data_unsolicited.value(), 1);
}

#[tokio::test]
async fn queue_backpressure_suspends_sender_and_drops_nothing() {
    let fw = Forwarder::new(ForwarderConfig { face_tx_queue: 1 });
    let (rx, tx, mut peer) = channel_transport(1);
    let face = fw.add_face(rx, tx).await;

    let sent = Arc::new(AtomicUsize::new(0));
    let sender = {
        let face = Arc::clone(&face);
        let sent = Arc::clone(&sent);
        tokio::spawn(async move {
            for i in 0..8u64 {
                face.send(TxPacket::Data {
                    data: Data::new(Name::from_uri("/q"), &b"x"[..]),
                    token: i,
                })
                .await
                .unwrap();
                sent.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    settle().await;
    // the slow consumer has not drained; the sender is suspended, not dropping
    assert!(sent.load(Ordering::SeqCst) < 8);

    let mut tokens = Vec::new();
    while tokens.len() < 8 {
        let TxPacket::Data { token, .. } = recv(&mut peer).await else {
            panic!("expected Data");
        };
        tokens.push(token);
    }
    sender.await.unwrap();

    assert_eq!(sent.load(Ordering::SeqCst), 8);
    assert_eq!(tokens, (0..8).collect::<Vec<u64>>()); // FIFO, complete
}

#[tokio::test]
async fn nack_from_all_upstreams_rejects_downstream() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (_a, mut consumer) = attach(&fw).await;
    let (up1_face, mut up1) = attach(&fw).await;
    let (up2_face, mut up2) = attach(&fw).await;
    up1_face.add_route(&Name::from_uri("/n")).await.unwrap();
    up2_face.add_route(&Name::from_uri("/n")).await.unwrap();

    consumer
        .send(RxPacket::Interest {
            interest: interest("/n/1", 1),
            token: 10,
        })
        .await
        .unwrap();
    settle().await;

    // default policy: all eligible next hops get the Interest
    let TxPacket::Interest { .. } = recv(&mut up1).await else {
        panic!("expected Interest on up1");
    };
    let TxPacket::Interest { .. } = recv(&mut up2).await else {
        panic!("expected Interest on up2");
    };

    up1.send(RxPacket::Nack(Nack::new(interest("/n/1", 1), NackReason::NoRoute)))
        .await
        .unwrap();
    settle().await;
    // one upstream still outstanding: the consumer hears nothing yet
    assert!(consumer.try_recv().is_none());
    assert_eq!(fw.metrics().pit_size.value(), 1);

    up2.send(RxPacket::Nack(Nack::new(interest("/n/1", 1), NackReason::NoRoute)))
        .await
        .unwrap();
    settle().await;

    let TxPacket::Nack { nack, token } = recv(&mut consumer).await else {
        panic!("expected propagated Nack");
    };
    assert_eq!(nack.reason, NackReason::NoRoute);
    assert_eq!(token, 10);
    assert_eq!(fw.metrics().pit_size.value(), 0);
}

#[tokio::test]
async fn nack_retries_route_added_after_first_forward() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (_a, mut consumer) = attach(&fw).await;
    let (first_face, mut first) = attach(&fw).await;
    let (second_face, mut second) = attach(&fw).await;
    first_face.add_route(&Name::from_uri("/r")).await.unwrap();

    consumer
        .send(RxPacket::Interest {
            interest: interest("/r/1", 1),
            token: 1,
        })
        .await
        .unwrap();
    settle().await;
    let TxPacket::Interest { .. } = recv(&mut first).await else {
        panic!("expected Interest on the original route");
    };
    assert!(second.try_recv().is_none());

    // a second route appears while the request is pending
    second_face.add_route(&Name::from_uri("/r")).await.unwrap();

    first
        .send(RxPacket::Nack(Nack::new(interest("/r/1", 1), NackReason::NoRoute)))
        .await
        .unwrap();
    settle().await;

    // the untried hop gets a retry instead of the consumer a rejection
    let TxPacket::Interest { interest: seen, .. } = recv(&mut second).await else {
        panic!("expected retried Interest");
    };
    assert_eq!(seen.name, Name::from_uri("/r/1"));
    assert!(consumer.try_recv().is_none());

    // and the retry can still be satisfied
    second
        .send(RxPacket::Data(Data::new(Name::from_uri("/r/1"), &b"ok"[..])))
        .await
        .unwrap();
    settle().await;
    let TxPacket::Data { token, .. } = recv(&mut consumer).await else {
        panic!("expected Data after retry");
    };
    assert_eq!(token, 1);
}

#[tokio::test]
async fn malformed_interest_is_dropped_silently() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (_a, mut consumer) = attach(&fw).await;

    consumer
        .send(RxPacket::Interest {
            interest: Interest::new(Name::new()).with_nonce(1),
            token: 1,
        })
        .await
        .unwrap();
    settle().await;

    assert!(consumer.try_recv().is_none());
    assert_eq!(fw.metrics().interests_received.value(), 1);
    assert_eq!(fw.metrics().pit_size.value(), 0);
}

#[tokio::test]
async fn transport_exhaustion_closes_the_face() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (face, peer) = attach(&fw).await;

    peer.finish();
    settle().await;

    assert!(!face.is_running());
    assert!(fw.face(face.id()).await.is_none());
    assert!(face
        .send(TxPacket::Data {
            data: Data::new(Name::from_uri("/x"), &b"x"[..]),
            token: 1,
        })
        .await
        .is_err());
}

#[derive(Default)]
struct RecordingAdvertise {
    announced: Mutex<Vec<Name>>,
    withdrawn: Mutex<Vec<Name>>,
}

impl Advertise for RecordingAdvertise {
    fn announce(&self, prefix: &Name) {
        self.announced.lock().unwrap().push(prefix.clone());
    }

    fn withdraw(&self, prefix: &Name) {
        self.withdrawn.lock().unwrap().push(prefix.clone());
    }
}

#[tokio::test]
async fn route_changes_drive_advertise_on_other_faces() {
    let fw = Forwarder::new(ForwarderConfig::default());
    let (upstream_face, _upstream_peer) = attach(&fw).await;
    let (local_face, _local_peer) = attach(&fw).await;

    let advertise = Arc::new(RecordingAdvertise::default());
    upstream_face.set_advertise(Arc::clone(&advertise) as Arc<dyn Advertise>);

    let prefix = Name::from_uri("/pub");
    local_face.add_route(&prefix).await.unwrap();
    assert_eq!(*advertise.announced.lock().unwrap(), vec![prefix.clone()]);

    local_face.remove_route(&prefix).await;
    assert_eq!(*advertise.withdrawn.lock().unwrap(), vec![prefix.clone()]);
    assert_eq!(local_face.routes(), Vec::<Name>::new());
}
