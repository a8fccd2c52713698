//! Top-level public façade (C12): composes [`super::signer`] and
//! [`super::validator`] into the operations a caller actually reaches for,
//! plus a network-free `inspect_signatures` for quickly listing who signed
//! a document without running the full validation pipeline.

use chrono::{DateTime, Utc};

use crate::cms;
use crate::error::Result;
use crate::pdf;
use crate::types::{ByteRange, IcpBrasilSubjectInfo};
use crate::x509;

/// A lightweight summary of one signature, built without any network
/// access: no revocation check, no timestamp verification, no policy
/// lookup. Useful for listing a document's signatures before deciding
/// whether to run [`super::validator::validate_all_signatures`] at all.
#[derive(Debug, Clone)]
pub struct SignatureInspection {
    pub field_name: String,
    pub byte_range: ByteRange,
    pub signer_subject: Option<String>,
    pub signer_icp_brasil: Option<IcpBrasilSubjectInfo>,
    pub signing_time: Option<DateTime<Utc>>,
    pub certificate_count: usize,
    pub has_timestamp: bool,
}

/// List every signature field's signer identity and signing time, earliest
/// revision first, without verifying anything.
pub fn inspect_signatures(pdf: &[u8]) -> Result<Vec<SignatureInspection>> {
    let entries = pdf::extract_all_signatures(pdf)?;
    let mut out = Vec::with_capacity(entries.len());

    for entry in &entries {
        let parsed = match cms::parse_signed_data(&entry.contents_der) {
            Ok(p) => p,
            Err(_) => {
                out.push(SignatureInspection {
                    field_name: entry.field_name.clone(),
                    byte_range: entry.byte_range,
                    signer_subject: None,
                    signer_icp_brasil: None,
                    signing_time: None,
                    certificate_count: 0,
                    has_timestamp: false,
                });
                continue;
            }
        };

        let candidates: Vec<_> = parsed.certificates.iter().filter_map(|der| x509::parse_certificate(der).ok()).collect();
        let signer = cms::select_signer_certificate(&candidates, &parsed.signer_info).ok();
        let signing_time = parsed
            .signer_info
            .find_signed_attr(cms::OID_SIGNING_TIME)
            .and_then(|a| a.single_value())
            .and_then(|v| crate::asn1::read_tlv(v, 0).ok().map(|t| (t, v)))
            .and_then(|(t, v)| crate::asn1::time::decode_time(t.tag, t.value(v)).ok());

        out.push(SignatureInspection {
            field_name: entry.field_name.clone(),
            byte_range: entry.byte_range,
            signer_subject: signer.as_ref().map(|c| c.subject.clone()),
            signer_icp_brasil: signer.as_ref().and_then(|c| c.icp_brasil_san.clone()),
            signing_time,
            certificate_count: candidates.len(),
            has_timestamp: parsed.signer_info.find_unsigned_attr(cms::OID_SIGNATURE_TIMESTAMP_TOKEN).is_some(),
        });
    }

    Ok(out)
}
