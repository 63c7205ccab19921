//! TLS and transport configuration for QUIC endpoints.
//!
//! Certificates come from PEM files when configured; otherwise a
//! self-signed certificate is generated, which is what development
//! topologies run with (clients then disable verification).

use anyhow::{anyhow, Context, Result};
use quinn::{ClientConfig, ServerConfig, VarInt};
use rustls::{Certificate, PrivateKey};
use std::{
    fs::File,
    io::{BufReader, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::NDN_QUIC_ALPN;

/// Server endpoint options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Address to listen on
    pub listen_addr: String,

    /// Path to the certificate file; self-signed when absent
    pub cert_path: Option<PathBuf>,

    /// Path to the private key file; self-signed when absent
    pub key_path: Option<PathBuf>,

    /// Maximum idle timeout (in milliseconds)
    pub idle_timeout_ms: Option<u64>,

    /// Keep alive interval (in milliseconds)
    pub keep_alive_interval_ms: Option<u64>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", crate::NDN_QUIC_PORT),
            cert_path: None,
            key_path: None,
            idle_timeout_ms: Some(30_000),
            keep_alive_interval_ms: Some(5_000),
        }
    }
}

/// Client endpoint options
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Path to a CA certificate file to trust (optional)
    pub ca_cert_path: Option<PathBuf>,

    /// Maximum idle timeout (in milliseconds)
    pub idle_timeout_ms: Option<u64>,

    /// Keep alive interval (in milliseconds)
    pub keep_alive_interval_ms: Option<u64>,

    /// Whether to verify the server certificate
    pub verify_certificate: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            ca_cert_path: None,
            idle_timeout_ms: Some(30_000),
            keep_alive_interval_ms: Some(5_000),
            verify_certificate: true,
        }
    }
}

/// Configure a QUIC server endpoint
pub fn configure_server(options: &ServerOptions) -> Result<ServerConfig> {
    let (cert_chain, key) = match (&options.cert_path, &options.key_path) {
        (Some(cert_path), Some(key_path)) => {
            (read_certificates(cert_path)?, read_private_key(key_path)?)
        }
        _ => self_signed()?,
    };

    let mut crypto = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .context("failed to create server crypto config")?;
    crypto.alpn_protocols = vec![NDN_QUIC_ALPN.to_vec()];

    let mut server_config = ServerConfig::with_crypto(Arc::new(crypto));
    let transport_config = Arc::get_mut(&mut server_config.transport)
        .context("failed to get mutable transport config")?;

    if let Some(idle_timeout_ms) = options.idle_timeout_ms {
        transport_config.max_idle_timeout(Some(VarInt::from_u32(idle_timeout_ms as u32).into()));
    }
    if let Some(keep_alive_ms) = options.keep_alive_interval_ms {
        transport_config.keep_alive_interval(Some(Duration::from_millis(keep_alive_ms)));
    }

    Ok(server_config)
}

/// Configure a QUIC client endpoint
pub fn configure_client(options: &ClientOptions) -> Result<ClientConfig> {
    let mut crypto = if !options.verify_certificate {
        // accept any certificate; development topologies only
        rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
            .with_no_client_auth()
    } else if let Some(ca_path) = &options.ca_cert_path {
        let mut roots = rustls::RootCertStore::empty();
        for cert in read_certificates(ca_path)? {
            roots.add(&cert)?;
        }
        rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(roots)
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
            rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));
        rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };

    crypto.enable_early_data = true;
    crypto.alpn_protocols = vec![NDN_QUIC_ALPN.to_vec()];

    let mut client_config = ClientConfig::new(Arc::new(crypto));
    let mut transport_config = quinn::TransportConfig::default();

    if let Some(idle_timeout_ms) = options.idle_timeout_ms {
        transport_config.max_idle_timeout(Some(VarInt::from_u32(idle_timeout_ms as u32).into()));
    }
    if let Some(keep_alive_ms) = options.keep_alive_interval_ms {
        transport_config.keep_alive_interval(Some(Duration::from_millis(keep_alive_ms)));
    }
    client_config.transport_config(Arc::new(transport_config));

    Ok(client_config)
}

/// Generate a self-signed certificate for development endpoints
fn self_signed() -> Result<(Vec<Certificate>, PrivateKey)> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()])
        .context("failed to generate self-signed certificate")?;
    let key = PrivateKey(cert.serialize_private_key_der());
    let cert = Certificate(cert.serialize_der()?);
    Ok((vec![cert], key))
}

/// Read a certificate chain from a PEM file
fn read_certificates<P: AsRef<Path>>(path: P) -> Result<Vec<Certificate>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("failed to open certificate file: {}", path.as_ref().display()))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .map_err(|_| anyhow!("failed to parse certificate"))?;

    if certs.is_empty() {
        return Err(anyhow!("no certificate found"));
    }

    Ok(certs.into_iter().map(Certificate).collect())
}

/// Read a private key from a PEM file
fn read_private_key<P: AsRef<Path>>(path: P) -> Result<PrivateKey> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("failed to open key file: {}", path.as_ref().display()))?;
    let mut reader = BufReader::new(file);

    // Try PKCS8 format first
    if let Ok(keys) = rustls_pemfile::pkcs8_private_keys(&mut reader) {
        if !keys.is_empty() {
            return Ok(PrivateKey(keys[0].clone()));
        }
    }

    // Rewind the reader
    reader.seek(SeekFrom::Start(0))?;

    // Try RSA format
    if let Ok(keys) = rustls_pemfile::rsa_private_keys(&mut reader) {
        if !keys.is_empty() {
            return Ok(PrivateKey(keys[0].clone()));
        }
    }

    Err(anyhow!("no private key found"))
}

/// A certificate verifier that accepts any server certificate
struct SkipServerVerification;

impl rustls::client::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}
