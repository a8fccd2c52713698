//! Revocation engine (C8): OCSP-first, CRL-fallback checking of a
//! certificate chain at a given validation time.

pub mod crl;
pub mod ocsp;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::traits::HttpTransport;
use crate::types::X509Certificate;

/// Outcome of checking a single certificate.
#[derive(Debug, Clone, PartialEq)]
pub enum RevocationStatus {
    Good { source: &'static str },
    Revoked { reason: Option<String>, revoked_at: Option<DateTime<Utc>>, source: &'static str },
    Unknown { reason: String },
}

#[derive(Debug, Clone)]
pub struct ChainRevocationReport {
    pub per_certificate: Vec<(String, RevocationStatus)>,
}

impl ChainRevocationReport {
    pub fn is_revoked(&self) -> bool {
        self.per_certificate.iter().any(|(_, s)| matches!(s, RevocationStatus::Revoked { .. }))
    }

    /// Per §4.4.4: in strict mode, a `good` overall verdict requires
    /// positive evidence (a validated OCSP `good` or a validated
    /// non-revoking CRL) for every non-self-signed, non-anchor certificate.
    pub fn missing_evidence(&self) -> Vec<&str> {
        self.per_certificate
            .iter()
            .filter(|(_, s)| matches!(s, RevocationStatus::Unknown { .. }))
            .map(|(subject, _)| subject.as_str())
            .collect()
    }
}

/// Check every non-self-signed, non-anchor certificate in `chain` (leaf
/// first, root last) against OCSP then CRL, per the chain's parent's
/// public key and the AIA/CRLDP URLs carried on each certificate.
pub async fn check_chain_revocation(
    chain: &[X509Certificate],
    trust_anchors: &[X509Certificate],
    at_time: DateTime<Utc>,
    clock_skew: Duration,
    transport: &dyn HttpTransport,
    strict: bool,
    timeout: Duration,
) -> ChainRevocationReport {
    let mut per_certificate = Vec::new();

    for pair in chain.windows(2) {
        let (cert, issuer) = (&pair[0], &pair[1]);
        if cert.is_self_signed_by_name() || trust_anchors.iter().any(|a| a.der_data == cert.der_data) {
            continue;
        }

        let status = check_one(cert, issuer, at_time, clock_skew, transport, strict, timeout).await;
        per_certificate.push((cert.subject.clone(), status));
    }

    ChainRevocationReport { per_certificate }
}

async fn check_one(
    cert: &X509Certificate,
    issuer: &X509Certificate,
    at_time: DateTime<Utc>,
    clock_skew: Duration,
    transport: &dyn HttpTransport,
    strict: bool,
    timeout: Duration,
) -> RevocationStatus {
    if let Some(url) = cert.ocsp_responder_urls.first() {
        match ocsp::check(cert, issuer, url, at_time, clock_skew, transport, strict, timeout).await {
            Ok(Some(status)) => return status,
            Ok(None) => {}
            Err(e) => log::warn!("OCSP check for '{}' failed: {e}", cert.subject),
        }
    }

    for url in &cert.crl_distribution_points {
        match crl::check(cert, issuer, url, at_time, clock_skew, transport, timeout).await {
            Ok(Some(status)) => return status,
            Ok(None) => {}
            Err(e) => log::warn!("CRL check for '{}' via {url} failed: {e}", cert.subject),
        }
    }

    RevocationStatus::Unknown {
        reason: format!("no validated OCSP or CRL evidence available for '{}'", cert.subject),
    }
}
