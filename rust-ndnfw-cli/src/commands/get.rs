//! One-shot consumer: express an Interest, print the response.

use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use rust_ndnfw_common::ndn::{Interest, Name};
use rust_ndnfw_quic::{fetch, ClientOptions, FetchOutcome};
use tokio::time::timeout;

pub async fn get(
    name: String,
    forwarder: String,
    timeout_ms: u64,
    can_be_prefix: bool,
    must_be_fresh: bool,
) -> Result<()> {
    let interest = Interest::new(Name::from_uri(&name))
        .with_lifetime(timeout_ms as u32)
        .with_can_be_prefix(can_be_prefix)
        .with_must_be_fresh(must_be_fresh);
    info!("requesting {} from {}", interest.name, forwarder);

    let addr = tokio::net::lookup_host(&forwarder)
        .await
        .with_context(|| format!("cannot resolve {forwarder}"))?
        .next()
        .with_context(|| format!("no address for {forwarder}"))?;

    let options = ClientOptions {
        verify_certificate: false, // dev topologies run self-signed
        ..Default::default()
    };

    match timeout(
        Duration::from_millis(timeout_ms),
        fetch(&options, addr, "localhost", interest),
    )
    .await
    {
        Ok(Ok(FetchOutcome::Data(data))) => {
            println!("Data: {}", data.name);
            if data.freshness_ms > 0 {
                println!("  freshness: {} ms", data.freshness_ms);
            }
            let content = &data.content;
            match std::str::from_utf8(content) {
                Ok(text) if content.len() <= 1024 => println!("  content: {text}"),
                _ => println!("  content: {} bytes", content.len()),
            }
        }
        Ok(Ok(FetchOutcome::Nack(nack))) => {
            println!("Nack: {} ({})", nack.interest.name, nack.reason);
        }
        Ok(Err(err)) => return Err(err),
        Err(_) => println!("timeout after {timeout_ms} ms"),
    }

    Ok(())
}
