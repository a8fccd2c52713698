//! Tunable options for scanning and signing.
//!
//! Plain, caller-constructed structs — no global or static configuration
//! state. Each option here corresponds to a tunable named in the design
//! notes: which PDF scanning strategy to prefer, how much placeholder room
//! to reserve for `/Contents`, whether network-backed validation steps
//! (revocation, timestamp) run at all, and which algorithms to use when
//! signing.

use crate::types::{HashAlgorithm, SignatureAlgorithm};
use std::time::Duration;

/// Options controlling how a PDF is scanned for its signable byte range
/// and signature dictionary.
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    /// Prefer the internal byte-level `/ByteRange` parser over a full
    /// object-graph walk when locating the signable range. Faster on large
    /// files; falls back to the full parse automatically if the byte scan
    /// is ambiguous (more than one plausible `/ByteRange` match).
    pub use_internal_byte_range_parser: bool,

    /// Use a fast linear scan for `/Contents` hex string boundaries instead
    /// of tokenizing the whole signature dictionary.
    pub use_fast_contents_parser: bool,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            use_internal_byte_range_parser: true,
            use_fast_contents_parser: true,
        }
    }
}

/// Options controlling signing and validation behavior.
#[derive(Debug, Clone)]
pub struct SignatureOptions {
    /// Bytes reserved for the `/Contents` hex placeholder before the CMS
    /// SignedData is known. Must be large enough for the final signature,
    /// certificate chain, and any embedded timestamp token.
    pub contents_reserve_bytes: usize,

    /// Whether network-backed steps (CRL/OCSP fetch, TSA requests, AIA
    /// chasing) are permitted at all. When `false`, the orchestrator only
    /// uses material already embedded in the document or passed in by the
    /// caller, and revocation status is reported as unknown rather than
    /// attempted.
    pub fetch_network: bool,

    /// Treat an unknown or unreachable revocation status as a hard
    /// validation failure rather than a warning.
    pub strict_revocation: bool,

    /// Treat a missing or mismatched signature policy digest as a hard
    /// validation failure rather than a warning.
    pub strict_policy_digest: bool,

    /// Allowable clock skew when comparing timestamps (signing time,
    /// certificate validity, TSA token time) against wall-clock time.
    pub clock_skew: Duration,

    /// Hash algorithm used for the document digest and signed attributes.
    pub hash_algorithm: HashAlgorithm,

    /// Signature algorithm used to sign the digest.
    pub signature_algorithm: SignatureAlgorithm,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            contents_reserve_bytes: 8 * 1024,
            fetch_network: true,
            strict_revocation: false,
            strict_policy_digest: false,
            clock_skew: Duration::from_secs(5 * 60),
            hash_algorithm: HashAlgorithm::Sha256,
            signature_algorithm: SignatureAlgorithm::RsaPkcs1Sha256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = SignatureOptions::default();
        assert_eq!(opts.contents_reserve_bytes, 8192);
        assert_eq!(opts.clock_skew, Duration::from_secs(300));
        assert!(matches!(opts.hash_algorithm, HashAlgorithm::Sha256));
    }

    #[test]
    fn scanner_defaults_prefer_fast_paths() {
        let opts = ScannerOptions::default();
        assert!(opts.use_internal_byte_range_parser);
        assert!(opts.use_fast_contents_parser);
    }
}
