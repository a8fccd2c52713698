//! RFC 6960 OCSP: request construction and `BasicOCSPResponse` parsing.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::asn1::{self, CONSTRUCTED, CONTEXT, TAG_BIT_STRING, TAG_OCTET_STRING, TAG_SEQUENCE};
use crate::cms;
use crate::crypto::{hash, verify_with_declared_algorithm};
use crate::error::Result;
use crate::traits::HttpTransport;
use crate::types::{HashAlgorithm, X509Certificate};
use crate::x509;

use super::RevocationStatus;

const TAG_GOOD: u8 = CONTEXT;
const TAG_REVOKED: u8 = CONTEXT | CONSTRUCTED | 1;
const TAG_UNKNOWN: u8 = CONTEXT | 2;
const OID_ID_KP_OCSP_SIGNING: &str = "1.3.6.1.5.5.7.3.9";

fn build_cert_id(cert: &X509Certificate, issuer: &X509Certificate) -> Result<Vec<u8>> {
    let issuer_name_der = x509::subject_name_der(&issuer.der_data)?;
    let issuer_name_hash = hash(&issuer_name_der, HashAlgorithm::Sha1);
    let issuer_key_hash = hash(&issuer.public_key.der_data, HashAlgorithm::Sha1);
    let hash_alg_id = cms::encode_algorithm_identifier(cms::OID_SHA1)?;
    Ok(asn1::encode_sequence(&[
        hash_alg_id,
        asn1::encode_octet_string(&issuer_name_hash),
        asn1::encode_octet_string(&issuer_key_hash),
        asn1::encode_integer(&cert.serial_number),
    ]))
}

fn build_request(cert_id: &[u8]) -> Vec<u8> {
    let request = asn1::encode_sequence(&[cert_id.to_vec()]);
    let request_list = asn1::encode_sequence(&[request]);
    let tbs_request = asn1::encode_sequence(&[request_list]);
    asn1::encode_sequence(&[tbs_request])
}

struct SingleResponse {
    serial: Vec<u8>,
    status: CertStatus,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
}

enum CertStatus {
    Good,
    Revoked { time: Option<DateTime<Utc>> },
    Unknown,
}

pub async fn check(
    cert: &X509Certificate,
    issuer: &X509Certificate,
    url: &str,
    at_time: DateTime<Utc>,
    clock_skew: Duration,
    transport: &dyn HttpTransport,
    strict: bool,
    timeout: Duration,
) -> Result<Option<RevocationStatus>> {
    let cert_id = build_cert_id(cert, issuer)?;
    let request_der = build_request(&cert_id);
    let response_der = transport
        .post(url, request_der, "application/ocsp-request", timeout)
        .await?;

    let Some((responses, signer_certs, tbs_bytes, sig_alg, signature)) = parse_basic_response(&response_der)? else {
        return Ok(None);
    };

    let matching = responses.iter().find(|r| r.serial == cert.serial_number);
    let Some(response) = matching else {
        return Ok(None);
    };

    let skew = chrono::Duration::from_std(clock_skew).unwrap_or_default();
    if at_time + skew < response.this_update {
        return Ok(Some(RevocationStatus::Unknown {
            reason: "OCSP thisUpdate is in the future relative to validation time".to_string(),
        }));
    }
    if let Some(next_update) = response.next_update {
        if at_time - skew > next_update {
            return Ok(Some(RevocationStatus::Unknown {
                reason: "OCSP response has expired (past nextUpdate)".to_string(),
            }));
        }
    }

    if strict {
        let signer = signer_certs.first().unwrap_or(issuer);
        let authorized = signer.der_data == issuer.der_data
            || signer.extended_key_usage.iter().any(|eku| eku == OID_ID_KP_OCSP_SIGNING);
        if !authorized {
            return Ok(Some(RevocationStatus::Unknown {
                reason: "OCSP responder is not authorized for this issuer".to_string(),
            }));
        }
        match verify_with_declared_algorithm(&tbs_bytes, &signature, &signer.public_key, sig_alg.digest_algorithm()) {
            Ok(true) => {}
            _ => {
                return Ok(Some(RevocationStatus::Unknown {
                    reason: "OCSP response signature did not verify".to_string(),
                }))
            }
        }
    }

    Ok(Some(match response.status {
        CertStatus::Good => RevocationStatus::Good { source: "ocsp" },
        CertStatus::Revoked { time } => {
            RevocationStatus::Revoked { reason: None, revoked_at: time, source: "ocsp" }
        }
        CertStatus::Unknown => RevocationStatus::Unknown { reason: "OCSP responder returned 'unknown'".to_string() },
    }))
}

#[allow(clippy::type_complexity)]
fn parse_basic_response(
    buf: &[u8],
) -> Result<Option<(Vec<SingleResponse>, Vec<X509Certificate>, Vec<u8>, crate::types::SignatureAlgorithm, Vec<u8>)>> {
    let outer = asn1::expect_tlv(buf, 0, TAG_SEQUENCE)?;
    let mut pos = outer.value_start;

    let status_tlv = asn1::read_tlv(buf, pos)?;
    let status = status_tlv.value(buf).first().copied().unwrap_or(1);
    pos += status_tlv.total_len();
    if status != 0 {
        return Ok(None);
    }
    if pos >= outer.value_start + outer.length {
        return Ok(None);
    }

    let response_bytes_tlv = asn1::expect_tlv(buf, pos, CONTEXT | CONSTRUCTED)?;
    let rb_seq = asn1::expect_tlv(buf, response_bytes_tlv.value_start, TAG_SEQUENCE)?;
    let response_type_tlv = asn1::read_tlv(buf, rb_seq.value_start)?;
    let octet_pos = response_type_tlv.value_start + response_type_tlv.length;
    let octet_tlv = asn1::expect_tlv(buf, octet_pos, TAG_OCTET_STRING)?;
    let basic = octet_tlv.value(buf);

    let basic_seq = asn1::expect_tlv(basic, 0, TAG_SEQUENCE)?;
    let mut bpos = basic_seq.value_start;

    let tbs_tlv = asn1::expect_tlv(basic, bpos, TAG_SEQUENCE)?;
    let tbs_bytes = tbs_tlv.whole(basic, bpos).to_vec();
    bpos += tbs_tlv.total_len();

    let sig_alg_tlv = asn1::expect_tlv(basic, bpos, TAG_SEQUENCE)?;
    let sig_oid_tlv = asn1::read_tlv(basic, sig_alg_tlv.value_start)?;
    let sig_alg = cms::signature_algorithm_from_oid(&asn1::oid::decode(sig_oid_tlv.value(basic))?)?;
    bpos += sig_alg_tlv.total_len();

    let sig_bits_tlv = asn1::expect_tlv(basic, bpos, TAG_BIT_STRING)?;
    let sig_bytes = sig_bits_tlv.value(basic);
    let signature = sig_bytes.get(1..).unwrap_or(&[]).to_vec();
    bpos += sig_bits_tlv.total_len();

    let mut signer_certs = Vec::new();
    if bpos < basic_seq.value_start + basic_seq.length {
        let peek = asn1::read_tlv(basic, bpos)?;
        if peek.tag == (CONTEXT | CONSTRUCTED | 0) {
            let certs_seq = asn1::expect_tlv(basic, peek.value_start, TAG_SEQUENCE)?;
            for (offset, member) in asn1::iter_tlvs(basic, certs_seq.value_start, certs_seq.value_start + certs_seq.length)? {
                if let Ok(parsed) = x509::parse_certificate(member.whole(basic, offset)) {
                    signer_certs.push(parsed);
                }
            }
        }
    }

    let responses = parse_responses(basic, &tbs_tlv, tbs_bytes.as_slice())?;
    Ok(Some((responses, signer_certs, tbs_bytes, sig_alg, signature)))
}

fn parse_responses(basic: &[u8], tbs_tlv: &asn1::Tlv, _tbs_bytes: &[u8]) -> Result<Vec<SingleResponse>> {
    let mut pos = tbs_tlv.value_start;
    let end = tbs_tlv.value_start + tbs_tlv.length;

    let peek = asn1::read_tlv(basic, pos)?;
    if peek.tag == (CONTEXT | CONSTRUCTED | 0) {
        pos += peek.total_len();
    }
    let responder_id = asn1::read_tlv(basic, pos)?;
    pos += responder_id.total_len();
    let produced_at = asn1::read_tlv(basic, pos)?;
    pos += produced_at.total_len();

    let responses_tlv = asn1::expect_tlv(basic, pos, TAG_SEQUENCE)?;
    let mut out = Vec::new();
    for (offset, member) in asn1::iter_tlvs(basic, responses_tlv.value_start, responses_tlv.value_start + responses_tlv.length)? {
        out.push(parse_single_response(basic, offset, member)?);
    }
    let _ = end;
    Ok(out)
}

fn parse_single_response(basic: &[u8], _offset: usize, tlv: asn1::Tlv) -> Result<SingleResponse> {
    let mut pos = tlv.value_start;
    let end = tlv.value_start + tlv.length;

    let cert_id_tlv = asn1::expect_tlv(basic, pos, TAG_SEQUENCE)?;
    let hash_alg_tlv = asn1::read_tlv(basic, cert_id_tlv.value_start)?;
    let name_hash_pos = hash_alg_tlv.value_start + hash_alg_tlv.length;
    let name_hash_tlv = asn1::read_tlv(basic, name_hash_pos)?;
    let key_hash_pos = name_hash_tlv.value_start + name_hash_tlv.length;
    let key_hash_tlv = asn1::read_tlv(basic, key_hash_pos)?;
    let serial_pos = key_hash_tlv.value_start + key_hash_tlv.length;
    let serial_tlv = asn1::read_tlv(basic, serial_pos)?;
    let serial = serial_tlv.value(basic).to_vec();
    pos += cert_id_tlv.total_len();

    let status_tlv = asn1::read_tlv(basic, pos)?;
    let status = if status_tlv.tag == TAG_GOOD {
        CertStatus::Good
    } else if status_tlv.tag == TAG_REVOKED {
        let revocation_time = asn1::read_tlv(basic, status_tlv.value_start).ok();
        let time = revocation_time.and_then(|t| crate::asn1::time::decode_time(t.tag, t.value(basic)).ok());
        CertStatus::Revoked { time }
    } else if status_tlv.tag == TAG_UNKNOWN {
        CertStatus::Unknown
    } else {
        CertStatus::Unknown
    };
    pos += status_tlv.total_len();

    let this_update_tlv = asn1::read_tlv(basic, pos)?;
    let this_update = crate::asn1::time::decode_time(this_update_tlv.tag, this_update_tlv.value(basic))?;
    pos += this_update_tlv.total_len();

    let mut next_update = None;
    if pos < end {
        let peek = asn1::read_tlv(basic, pos)?;
        if peek.tag == (CONTEXT | CONSTRUCTED | 0) {
            if let Ok(inner) = asn1::read_tlv(basic, peek.value_start) {
                next_update = crate::asn1::time::decode_time(inner.tag, inner.value(basic)).ok();
            }
        }
    }

    Ok(SingleResponse { serial, status, this_update, next_update })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wraps_cert_id_in_tbs_request() {
        let fake_cert_id = asn1::encode_sequence(&[vec![0x02, 0x01, 0x01]]);
        let request = build_request(&fake_cert_id);
        let tlv = asn1::read_tlv(&request, 0).unwrap();
        assert_eq!(tlv.tag, TAG_SEQUENCE);
        assert_eq!(tlv.total_len(), request.len());
    }
}
