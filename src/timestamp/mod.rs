//! RFC 3161 timestamp engine (C9): request construction, token parsing, and
//! `messageImprint` / TSA-chain verification.
//!
//! A timestamp token is itself a detached-content CMS `SignedData` whose
//! `eContent` carries the DER of a `TSTInfo`; parsing reuses
//! [`crate::cms::parse_signed_data`] rather than a bespoke walker.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::asn1::{self, TAG_GENERALIZED_TIME, TAG_INTEGER, TAG_OID, TAG_SEQUENCE};
use crate::cms::{self, ParsedCms};
use crate::crypto::{hash, verify_with_declared_algorithm};
use crate::error::{PdfSignError, Result};
use crate::traits::HttpTransport;
use crate::types::{HashAlgorithm, X509Certificate};
use crate::x509;
use crate::x509::chain::{build_chain, verify_chain};

/// Build the `TimeStampReq` DER for a digest over the CMS `SignerInfo`'s
/// raw `signatureValue` (not `signedAttrs`, not the PDF bytes).
pub fn build_request(imprint: &[u8], hash_algorithm: HashAlgorithm, policy_oid: Option<&str>, nonce: Option<&[u8]>) -> Result<Vec<u8>> {
    let hash_alg_id = cms::encode_algorithm_identifier(cms::hash_algorithm_oid(hash_algorithm))?;
    let message_imprint = asn1::encode_sequence(&[hash_alg_id, asn1::encode_octet_string(imprint)]);

    let mut members = vec![asn1::encode_small_integer(1), message_imprint];
    if let Some(oid) = policy_oid {
        members.push(asn1::oid::encode_tlv(oid)?);
    }
    if let Some(nonce) = nonce {
        members.push(asn1::encode_integer(nonce));
    }
    // certReq BOOLEAN DEFAULT FALSE: always encoded explicitly as TRUE so
    // the TSA includes its signing certificate in the token.
    members.push(asn1::encode_tlv(asn1::TAG_BOOLEAN, &[0xFF]));

    Ok(asn1::encode_sequence(&members))
}

#[derive(Debug, Clone)]
pub struct TstInfo {
    pub policy_oid: String,
    pub message_imprint_algorithm: HashAlgorithm,
    pub message_imprint_hash: Vec<u8>,
    pub serial_number: Vec<u8>,
    pub gen_time: DateTime<Utc>,
    pub nonce: Option<Vec<u8>>,
}

fn parse_tst_info(der: &[u8]) -> Result<TstInfo> {
    let outer = asn1::expect_tlv(der, 0, TAG_SEQUENCE)
        .map_err(|e| PdfSignError::timestamp_invalid(format!("malformed TSTInfo: {e}")))?;
    let mut pos = outer.value_start;
    let end = outer.value_start + outer.length;

    let version_tlv = asn1::expect_tlv(der, pos, TAG_INTEGER)?;
    pos += version_tlv.total_len();

    let policy_tlv = asn1::expect_tlv(der, pos, TAG_OID)?;
    let policy_oid = asn1::oid::decode(policy_tlv.value(der))?;
    pos += policy_tlv.total_len();

    let imprint_tlv = asn1::expect_tlv(der, pos, TAG_SEQUENCE)?;
    let imprint_alg_tlv = asn1::read_tlv(der, imprint_tlv.value_start)?;
    let imprint_oid_tlv = asn1::read_tlv(der, imprint_alg_tlv.value_start)?;
    let message_imprint_algorithm = cms::hash_algorithm_from_oid(&asn1::oid::decode(imprint_oid_tlv.value(der))?)?;
    let hash_pos = imprint_alg_tlv.value_start + imprint_alg_tlv.length;
    let hash_tlv = asn1::read_tlv(der, hash_pos)?;
    let message_imprint_hash = hash_tlv.value(der).to_vec();
    pos += imprint_tlv.total_len();

    let serial_tlv = asn1::expect_tlv(der, pos, TAG_INTEGER)?;
    let serial_number = serial_tlv.value(der).to_vec();
    pos += serial_tlv.total_len();

    let gen_time_tlv = asn1::expect_tlv(der, pos, TAG_GENERALIZED_TIME)?;
    let gen_time = asn1::time::decode_time(gen_time_tlv.tag, gen_time_tlv.value(der))?;
    pos += gen_time_tlv.total_len();

    // accuracy Accuracy OPTIONAL, ordering BOOLEAN DEFAULT FALSE: both
    // skipped over, neither is consumed downstream.
    let mut nonce = None;
    while pos < end {
        let peek = asn1::read_tlv(der, pos)?;
        if peek.tag == TAG_INTEGER {
            nonce = Some(peek.value(der).to_vec());
            pos += peek.total_len();
            break;
        }
        pos += peek.total_len();
    }

    Ok(TstInfo {
        policy_oid,
        message_imprint_algorithm,
        message_imprint_hash,
        serial_number,
        gen_time,
        nonce,
    })
}

#[derive(Debug, Clone)]
pub struct TimestampToken {
    /// The full `ContentInfo` DER as received from the TSA; this is what
    /// gets embedded verbatim as the `signatureTimeStampToken` unsigned
    /// attribute.
    pub der: Vec<u8>,
    pub tst_info: TstInfo,
    pub tsa_certificates: Vec<X509Certificate>,
}

/// `TimeStampResp ::= SEQUENCE { status PKIStatusInfo, timeStampToken ContentInfo OPTIONAL }`.
/// `PKIStatus` 0 (granted) and 1 (grantedWithMods) both yield a usable token.
fn parse_response(der: &[u8]) -> Result<Vec<u8>> {
    let outer = asn1::expect_tlv(der, 0, TAG_SEQUENCE)
        .map_err(|e| PdfSignError::timestamp_invalid(format!("malformed TimeStampResp: {e}")))?;
    let status_info = asn1::expect_tlv(der, outer.value_start, TAG_SEQUENCE)?;
    let status_tlv = asn1::expect_tlv(der, status_info.value_start, TAG_INTEGER)?;
    let status = asn1::decode_integer_as_u64(status_tlv.value(der))?;
    if status > 1 {
        return Err(PdfSignError::timestamp_request_failed(format!(
            "TSA rejected the request, PKIStatus {status}"
        )));
    }

    let token_pos = status_info.value_start + status_info.length;
    if token_pos >= outer.value_start + outer.length {
        return Err(PdfSignError::timestamp_request_failed(
            "TSA granted the request but returned no timeStampToken",
        ));
    }
    let token_tlv = asn1::expect_tlv(der, token_pos, TAG_SEQUENCE)?;
    Ok(token_tlv.whole(der, token_pos).to_vec())
}

/// Request, parse, and verify a timestamp over `imprint` (the raw bytes a
/// TSA is asked to attest, normally the SignerInfo `signatureValue`).
/// `trust_anchors` are the roots the TSA's own certificate chain must
/// terminate at.
#[allow(clippy::too_many_arguments)]
pub async fn request_and_verify(
    imprint: &[u8],
    hash_algorithm: HashAlgorithm,
    policy_oid: Option<&str>,
    nonce: Option<&[u8]>,
    url: &str,
    trust_anchors: &[X509Certificate],
    at_time: DateTime<Utc>,
    clock_skew: Duration,
    transport: &dyn HttpTransport,
    timeout: Duration,
) -> Result<TimestampToken> {
    let request_der = build_request(imprint, hash_algorithm, policy_oid, nonce)?;
    let response_der = transport.post(url, request_der, "application/timestamp-query", timeout).await?;
    let token_der = parse_response(&response_der)?;
    verify_token(&token_der, imprint, hash_algorithm, nonce, trust_anchors, at_time, clock_skew)
}

/// Peek the `messageImprint` hash algorithm a token declares, without
/// verifying anything. Callers validating a token embedded in a document
/// they did not themselves sign don't know in advance which algorithm the
/// TSA used for the imprint and need this to pick the right
/// `expected_hash_algorithm` for [`verify_token`].
pub fn declared_hash_algorithm(token_der: &[u8]) -> Result<HashAlgorithm> {
    let parsed = cms::parse_signed_data(token_der)?;
    let econtent = parsed
        .econtent
        .as_ref()
        .ok_or_else(|| PdfSignError::timestamp_invalid("timestamp token has no eContent"))?;
    Ok(parse_tst_info(econtent)?.message_imprint_algorithm)
}

/// Verify an already-obtained token DER (e.g. one previously embedded in a
/// signature, being re-checked during validation) against the expected
/// imprint.
pub fn verify_token(
    token_der: &[u8],
    expected_imprint: &[u8],
    expected_hash_algorithm: HashAlgorithm,
    expected_nonce: Option<&[u8]>,
    trust_anchors: &[X509Certificate],
    at_time: DateTime<Utc>,
    clock_skew: Duration,
) -> Result<TimestampToken> {
    let parsed = cms::parse_signed_data(token_der)?;
    if parsed.econtent_type != cms::OID_ID_CT_TSTINFO {
        return Err(PdfSignError::timestamp_invalid(format!(
            "timestamp token eContentType is {}, expected {}",
            parsed.econtent_type,
            cms::OID_ID_CT_TSTINFO
        )));
    }
    let econtent = parsed
        .econtent
        .as_ref()
        .ok_or_else(|| PdfSignError::timestamp_invalid("timestamp token has no eContent"))?;
    let tst_info = parse_tst_info(econtent)?;

    if tst_info.message_imprint_algorithm != expected_hash_algorithm {
        return Err(PdfSignError::timestamp_invalid(format!(
            "messageImprint hash algorithm is {:?}, expected {:?}",
            tst_info.message_imprint_algorithm, expected_hash_algorithm
        )));
    }
    let computed = hash(expected_imprint, expected_hash_algorithm);
    if computed != tst_info.message_imprint_hash {
        return Err(PdfSignError::timestamp_invalid(
            "messageImprint does not match the signature value that was supposedly timestamped",
        ));
    }
    if let (Some(expected), Some(actual)) = (expected_nonce, &tst_info.nonce) {
        if expected != actual.as_slice() {
            return Err(PdfSignError::timestamp_invalid("nonce in the response does not match the request"));
        }
    }

    let tsa_certificates = parsed
        .certificates
        .iter()
        .filter_map(|der| x509::parse_certificate(der).ok())
        .collect::<Vec<_>>();

    verify_token_signature(&parsed, &tsa_certificates)?;

    if !trust_anchors.is_empty() {
        let signer = cms::select_signer_certificate(&tsa_certificates, &parsed.signer_info)?;
        let chain = build_chain(&signer, &tsa_certificates, trust_anchors)?;
        let verification = verify_chain(&chain, trust_anchors, tst_info.gen_time, clock_skew);
        if !verification.trusted {
            return Err(PdfSignError::timestamp_invalid(format!(
                "TSA certificate chain is not trusted at the token's genTime: {}",
                verification.errors.join("; ")
            )));
        }
    }

    let _ = at_time;
    Ok(TimestampToken { der: token_der.to_vec(), tst_info, tsa_certificates })
}

fn verify_token_signature(parsed: &ParsedCms, tsa_certificates: &[X509Certificate]) -> Result<()> {
    let signer_cert = cms::select_signer_certificate(tsa_certificates, &parsed.signer_info)?;
    let verified = parsed
        .signer_info
        .signed_attrs_verify_candidates
        .iter()
        .any(|buf| {
            verify_with_declared_algorithm(
                buf,
                &parsed.signer_info.signature,
                &signer_cert.public_key,
                parsed.signer_info.signature_algorithm.digest_algorithm(),
            )
            .unwrap_or(false)
        });
    if !verified {
        return Err(PdfSignError::timestamp_invalid("timestamp token signature does not verify"));
    }
    let digest_attr = parsed
        .signer_info
        .find_signed_attr(cms::OID_MESSAGE_DIGEST)
        .and_then(|a| a.single_value());
    if let (Some(digest), Some(econtent)) = (digest_attr, &parsed.econtent) {
        let computed = hash(econtent, parsed.signer_info.digest_algorithm);
        if computed.as_slice() != digest {
            return Err(PdfSignError::timestamp_invalid(
                "timestamp token messageDigest does not match its own TSTInfo content",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_request_with_certreq_true() {
        let req = build_request(&[0x11; 32], HashAlgorithm::Sha256, None, None).unwrap();
        let tlv = asn1::read_tlv(&req, 0).unwrap();
        assert_eq!(tlv.tag, TAG_SEQUENCE);
        assert_eq!(req[req.len() - 1], 0xFF);
    }

    #[test]
    fn builds_request_with_policy_and_nonce() {
        let req = build_request(&[0x22; 32], HashAlgorithm::Sha256, Some("1.2.3.4"), Some(&[0x01, 0x02])).unwrap();
        let tlv = asn1::read_tlv(&req, 0).unwrap();
        assert_eq!(tlv.total_len(), req.len());
    }

    #[test]
    fn rejects_rejected_pki_status() {
        let status_info = asn1::encode_sequence(&[asn1::encode_small_integer(2)]);
        let resp = asn1::encode_sequence(&[status_info]);
        let err = parse_response(&resp).unwrap_err();
        assert_eq!(err.error_code(), crate::error::ErrorCode::TimestampRequestFailed);
    }
}
