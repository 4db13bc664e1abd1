//! QUIC endpoints: the host's listening socket and a client's outbound
//! socket, both pinned to the game's ALPN.
//!
//! TLS uses a throwaway self-signed identity generated at bind time, and
//! clients accept whatever certificate the host presents. Good enough for
//! LAN matches; anyone deploying across the open internet supplies real
//! certificates instead.

use anyhow::{Context, Result};
use quinn::{Endpoint, TransportConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Application protocol both sides must offer during the TLS handshake.
const ALPN: &[u8] = b"skirmish";
/// Ping cadence keeping quiet connections alive through NATs.
const KEEP_ALIVE: Duration = Duration::from_secs(5);
/// A peer silent this long is gone; reader tasks observe the close.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Keep-alive and idle tuning shared by both endpoint kinds.
fn transport_tuning() -> Result<Arc<TransportConfig>> {
    let mut tuning = TransportConfig::default();
    tuning.keep_alive_interval(Some(KEEP_ALIVE));
    tuning.max_idle_timeout(Some(
        IDLE_TIMEOUT
            .try_into()
            .context("Idle timeout out of range")?,
    ));
    Ok(Arc::new(tuning))
}

/// Fresh self-signed identity, valid for the lifetime of the process.
fn dev_identity() -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let issued = rcgen::generate_simple_self_signed(vec!["localhost".into()])
        .context("Certificate generation failed")?;
    let key = PrivateKeyDer::Pkcs8(issued.key_pair.serialize_der().into());
    Ok((vec![CertificateDer::from(issued.cert)], key))
}

/// The host's listening endpoint.
pub struct ServerEndpoint {
    endpoint: Endpoint,
    addr: SocketAddr,
}

impl ServerEndpoint {
    /// Bind `addr` with a fresh self-signed identity.
    ///
    /// Pass port 0 to let the OS pick; [`ServerEndpoint::local_addr`]
    /// reports the result.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let (chain, key) = dev_identity()?;
        let mut tls = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(chain, key)
            .context("TLS rejected the self-signed identity")?;
        tls.alpn_protocols = vec![ALPN.to_vec()];

        let mut server_config = quinn::ServerConfig::with_crypto(Arc::new(
            quinn::crypto::rustls::QuicServerConfig::try_from(tls)
                .context("TLS config unusable for QUIC")?,
        ));
        server_config.transport_config(transport_tuning()?);

        let endpoint = Endpoint::server(server_config, addr)
            .with_context(|| format!("Binding {addr} failed"))?;
        let addr = endpoint.local_addr()?;
        info!(%addr, "Listening");
        Ok(Self { endpoint, addr })
    }

    /// Address the socket actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Next incoming connection attempt; `None` once the endpoint closed.
    pub async fn accept(&self) -> Option<quinn::Incoming> {
        self.endpoint.accept().await
    }

    /// Stop accepting and tear down every connection.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"Host shutting down");
    }
}

/// A client's outbound endpoint, bound to an ephemeral local port.
pub struct ClientEndpoint {
    endpoint: Endpoint,
}

impl ClientEndpoint {
    /// Create the endpoint. Certificate checks are disabled, see the
    /// module docs.
    pub fn new() -> Result<Self> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let mut tls = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(TrustAnyCert))
            .with_no_client_auth();
        tls.alpn_protocols = vec![ALPN.to_vec()];

        let mut client_config = quinn::ClientConfig::new(Arc::new(
            quinn::crypto::rustls::QuicClientConfig::try_from(tls)
                .context("TLS config unusable for QUIC")?,
        ));
        client_config.transport_config(transport_tuning()?);

        let mut endpoint = Endpoint::client("0.0.0.0:0".parse()?)?;
        endpoint.set_default_client_config(client_config);
        debug!(addr = %endpoint.local_addr()?, "Client endpoint ready");
        Ok(Self { endpoint })
    }

    /// Open a connection to the host at `server_addr`.
    pub async fn connect(&self, server_addr: SocketAddr) -> Result<quinn::Connection> {
        let connection = self
            .endpoint
            .connect(server_addr, "localhost")
            .context("Connection setup failed")?
            .await
            .with_context(|| format!("Connecting to {server_addr} failed"))?;
        info!(%server_addr, "Connected");
        Ok(connection)
    }

    /// Tear down every connection on this endpoint.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"Client shutting down");
    }
}

/// Verifier that trusts any certificate the host presents. Pairs with the
/// self-signed identity on the host side; never use outside development.
#[derive(Debug)]
struct TrustAnyCert;

impl rustls::client::danger::ServerCertVerifier for TrustAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ED25519,
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_to_port_zero_reports_the_real_port() {
        let host = ServerEndpoint::bind("127.0.0.1:0".parse().unwrap()).expect("bind");
        assert_ne!(host.local_addr().port(), 0);
        host.close();
    }

    #[tokio::test]
    async fn client_endpoint_comes_up() {
        let client = ClientEndpoint::new().expect("client endpoint");
        client.close();
    }

    #[tokio::test]
    async fn self_signed_handshake_completes() {
        let host = ServerEndpoint::bind("127.0.0.1:0".parse().unwrap()).expect("bind");
        let host_addr = host.local_addr();

        let accept = tokio::spawn(async move {
            let incoming = host.accept().await.expect("endpoint open");
            incoming.await.expect("handshake")
        });

        let client = ClientEndpoint::new().expect("client endpoint");
        let outbound = client.connect(host_addr).await.expect("connect");
        let inbound = accept.await.expect("accept task");

        assert_eq!(outbound.remote_address(), host_addr);
        assert_ne!(inbound.remote_address().port(), 0);

        outbound.close(0u32.into(), b"done");
        inbound.close(0u32.into(), b"done");
    }
}
