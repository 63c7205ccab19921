//! Minimal producer: answer Interests under a prefix with fixed content.

use anyhow::Result;
use log::info;
use rust_ndnfw_common::ndn::{Data, Name};
use rust_ndnfw_quic::ServerOptions;

pub async fn serve(prefix: String, content: String, listen: String, freshness: u32) -> Result<()> {
    let prefix = Name::from_uri(&prefix);
    info!("serving {} on {}", prefix, listen);

    let options = ServerOptions {
        listen_addr: listen,
        ..Default::default()
    };
    rust_ndnfw_quic::serve(&options, move |interest| {
        if prefix.is_prefix_of(&interest.name) {
            Some(Data::new(interest.name.clone(), content.clone()).with_freshness(freshness))
        } else {
            None
        }
    })
    .await
}
