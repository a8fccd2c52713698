//! Capability traits the caller supplies to the orchestrator.
//!
//! Per the design notes, "signer" and "trusted roots" are not internal
//! polymorphic class hierarchies — they are small capability contracts
//! constructed by the caller. Network transport is injected the same way:
//! the core never opens a socket.

use crate::error::Result;
use crate::types::{HashAlgorithm, X509Certificate};
use async_trait::async_trait;

/// An externally-controlled signer (HSM, KMS, smart card, or an in-process
/// private key wrapper). The core only ever asks it to sign a digest.
#[async_trait]
pub trait ExternalSigner: Send + Sync {
    /// The digest algorithm this signer expects to receive.
    fn declared_hash(&self) -> HashAlgorithm;

    /// Sign `bytes` (the DER encoding of the signed-attributes SET, or a
    /// raw document digest for non-CAdES use) and return the raw signature
    /// value bytes (no ASN.1 wrapping).
    async fn sign(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Supplies the set of DER-encoded trust anchors used as roots when
/// building and verifying certificate chains.
#[async_trait]
pub trait TrustedRootsProvider: Send + Sync {
    async fn get_der(&self) -> Result<Vec<Vec<u8>>>;
}

/// A single network round-trip: URL in, bytes out. Used for CRL, OCSP, TSA,
/// and AIA fetches. The core depends only on this trait; the optional
/// `network` feature provides a `reqwest`-backed implementation as a
/// convenience, never called directly by core logic.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
        timeout: std::time::Duration,
    ) -> Result<Vec<u8>>;

    async fn get(&self, url: &str, timeout: std::time::Duration) -> Result<Vec<u8>>;
}

/// Supplies previously-fetched revocation/certificate material so repeated
/// validations of the same chain do not re-fetch over the network. Caches
/// are optional; implementations must be internally synchronized since the
/// orchestrator may call them from concurrent batch validations.
pub trait ValidationCache: Send + Sync {
    fn get_crl(&self, issuer_subject_der: &[u8]) -> Option<Vec<u8>>;
    fn put_crl(&self, issuer_subject_der: &[u8], crl_der: Vec<u8>);
    fn get_ocsp(&self, cert_serial: &[u8]) -> Option<Vec<u8>>;
    fn put_ocsp(&self, cert_serial: &[u8], ocsp_der: Vec<u8>);
}

/// Platform-specific trust store / hardware crypto integration. Optional;
/// the core works purely off caller-supplied certificates without it.
pub trait PlatformAbstraction: Send + Sync {
    fn get_system_certificates(&self) -> Result<Vec<X509Certificate>>;
    fn use_platform_crypto(&self) -> bool;
    fn platform_info(&self) -> PlatformInfo;
}

#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
    pub has_hardware_crypto: bool,
}

/// Cancellation token passed into network-bound validation steps. Plain
/// struct backed by an `AtomicBool` rather than a runtime-specific type, so
/// it composes with whatever async runtime the caller uses around `tokio`.
#[derive(Clone, Default)]
pub struct CancellationToken(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
