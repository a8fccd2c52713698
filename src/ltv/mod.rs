//! Long-Term Validation material (C10): assembling and embedding a
//! `/DSS` (Document Security Store) incremental update so a signature
//! remains verifiable after the signing certificate or TSA certificate
//! expires.
//!
//! Per PAdES (ETSI EN 319 142), a `/VRI` entry is keyed by the
//! uppercase-hex SHA-1 digest of the signature's own CMS `/Contents`
//! bytes; this ties the embedded certs/CRLs/OCSPs to the specific
//! signature they validate.

use crate::crypto::hash;
use crate::error::Result;
use crate::pdf::writer::{self, DssMaterial, VriEntry};
use crate::types::{HashAlgorithm, X509Certificate};

/// Material gathered for a single signature's LTV entry, before it is
/// merged into a document-wide [`DssMaterial`].
#[derive(Debug, Clone, Default)]
pub struct SignatureLtvMaterial {
    pub chain_certs: Vec<X509Certificate>,
    pub crls: Vec<Vec<u8>>,
    pub ocsps: Vec<Vec<u8>>,
    /// Raw CMS `/Contents` bytes of the signature this material validates.
    pub cms_der: Vec<u8>,
}

pub fn vri_key(cms_der: &[u8]) -> String {
    hex::encode_upper(hash(cms_der, HashAlgorithm::Sha1))
}

/// Merge LTV material for any number of signatures into one `/DSS`,
/// de-duplicating certificates/CRLs/OCSP responses that already appear
/// (e.g. a shared intermediate CA across two signatures) by exact byte
/// equality, and embed it as a new incremental update.
pub fn embed_ltv(pdf: &[u8], signatures: &[SignatureLtvMaterial]) -> Result<Vec<u8>> {
    let mut certs: Vec<Vec<u8>> = Vec::new();
    let mut crls: Vec<Vec<u8>> = Vec::new();
    let mut ocsps: Vec<Vec<u8>> = Vec::new();
    let mut vri = Vec::new();

    for sig in signatures {
        let mut entry = VriEntry::default();

        for cert in &sig.chain_certs {
            let idx = dedup_index(&mut certs, &cert.der_data);
            entry.cert_indices.push(idx);
        }
        for crl in &sig.crls {
            let idx = dedup_index(&mut crls, crl);
            entry.crl_indices.push(idx);
        }
        for ocsp in &sig.ocsps {
            let idx = dedup_index(&mut ocsps, ocsp);
            entry.ocsp_indices.push(idx);
        }
        entry.validation_time = Some(chrono::Utc::now());

        vri.push((vri_key(&sig.cms_der), entry));
    }

    writer::embed_dss(pdf, &DssMaterial { certs, crls, ocsps, vri })
}

fn dedup_index(pool: &mut Vec<Vec<u8>>, candidate: &[u8]) -> usize {
    if let Some(i) = pool.iter().position(|existing| existing.as_slice() == candidate) {
        return i;
    }
    pool.push(candidate.to_vec());
    pool.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vri_key_is_uppercase_hex_sha1() {
        let key = vri_key(b"some cms bytes");
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn dedup_index_reuses_identical_entries() {
        let mut pool = Vec::new();
        let a = dedup_index(&mut pool, b"x");
        let b = dedup_index(&mut pool, b"y");
        let c = dedup_index(&mut pool, b"x");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }
}
