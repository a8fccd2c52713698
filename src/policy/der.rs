//! Parses the DER-encoded form of the LPA (`LPA_CAdES.der`), a
//! `SignaturePolicyList` whose ASN.1 shape mirrors the XML artefact's
//! fields rather than a standardised ETSI structure (ITI publishes both
//! forms from the same underlying catalog):
//!
//! ```text
//! SignaturePolicyList ::= SEQUENCE {
//!   nextUpdate      GeneralizedTime,
//!   policies        SEQUENCE OF SignaturePolicyInfo
//! }
//! SignaturePolicyInfo ::= SEQUENCE {
//!   policyOid           OBJECT IDENTIFIER,
//!   policyUri           IA5String OPTIONAL,
//!   notBefore           GeneralizedTime,
//!   notAfter            GeneralizedTime,
//!   policyDigest        SEQUENCE { algorithm OID, value OCTET STRING } OPTIONAL,
//!   algorithmConstraints SEQUENCE OF SEQUENCE {
//!     algorithm       IA5String,
//!     minKeyLength    INTEGER
//!   } OPTIONAL
//! }
//! ```
//!
//! This layout is an implementer's choice (spec.md Sec 9 flags the exact
//! wire format as an open question); see `DESIGN.md` for the resulting
//! decision. It reuses the same TLV primitives as the CMS/X.509 codec
//! rather than a bespoke reader.

use crate::asn1::{self, Tlv, TAG_GENERALIZED_TIME, TAG_INTEGER, TAG_OCTET_STRING, TAG_OID, TAG_SEQUENCE};
use crate::cms::hash_algorithm_from_oid;
use crate::error::{PdfSignError, Result};

use super::{AlgorithmConstraint, Lpa, PolicyDigest, PolicyInfo};

const TAG_IA5_STRING: u8 = 0x16;

fn read_ia5(der: &[u8], pos: usize) -> Result<(String, usize)> {
    let tlv = asn1::expect_tlv(der, pos, TAG_IA5_STRING)?;
    let s = String::from_utf8(tlv.value(der).to_vec())
        .map_err(|e| PdfSignError::asn1_parse(format!("malformed IA5String: {e}")))?;
    Ok((s, pos + tlv.total_len()))
}

fn read_time(der: &[u8], pos: usize) -> Result<(chrono::DateTime<chrono::Utc>, usize)> {
    let tlv = asn1::expect_tlv(der, pos, TAG_GENERALIZED_TIME)?;
    let t = asn1::time::decode_time(tlv.tag, tlv.value(der))?;
    Ok((t, pos + tlv.total_len()))
}

pub fn parse(der: &[u8]) -> Result<Lpa> {
    let outer = asn1::expect_tlv(der, 0, TAG_SEQUENCE)
        .map_err(|e| PdfSignError::pdf_parse(format!("malformed SignaturePolicyList: {e}")))?;
    let (next_update, pos) = read_time(der, outer.value_start)?;

    let policies_tlv = asn1::expect_tlv(der, pos, TAG_SEQUENCE)?;
    let mut policy_infos = Vec::new();
    let end = policies_tlv.value_start + policies_tlv.length;
    let mut cursor = policies_tlv.value_start;
    while cursor < end {
        let entry = asn1::expect_tlv(der, cursor, TAG_SEQUENCE)?;
        policy_infos.push(parse_policy_info(der, &entry)?);
        cursor += entry.total_len();
    }

    Ok(Lpa { next_update, policy_infos })
}

fn parse_policy_info(der: &[u8], entry: &Tlv) -> Result<PolicyInfo> {
    let entry_end = entry.value_start + entry.length;
    let mut pos = entry.value_start;

    let oid_tlv = asn1::expect_tlv(der, pos, TAG_OID)?;
    let policy_oid = asn1::oid::decode(oid_tlv.value(der))?;
    pos += oid_tlv.total_len();

    let mut uri = None;
    if pos < entry_end {
        let peek = asn1::read_tlv(der, pos)?;
        if peek.tag == TAG_IA5_STRING {
            let (u, next) = read_ia5(der, pos)?;
            uri = Some(u);
            pos = next;
        }
    }

    let (not_before, next) = read_time(der, pos)?;
    pos = next;
    let (not_after, next) = read_time(der, pos)?;
    pos = next;

    let mut digest = None;
    let mut algorithm_constraints = Vec::new();
    while pos < entry_end {
        let peek = asn1::read_tlv(der, pos)?;
        match peek.tag {
            TAG_SEQUENCE => {
                // Disambiguate policyDigest (alg OID + OCTET STRING) from
                // algorithmConstraints (SEQUENCE OF SEQUENCE) by peeking
                // the first member's tag.
                let first = asn1::read_tlv(der, peek.value_start)?;
                if first.tag == TAG_OID {
                    digest = Some(parse_digest(der, &peek)?);
                } else {
                    algorithm_constraints = parse_algorithm_constraints(der, &peek)?;
                }
                pos += peek.total_len();
            }
            _ => {
                return Err(PdfSignError::pdf_parse(format!(
                    "unexpected tag 0x{:02x} in SignaturePolicyInfo for {policy_oid}",
                    peek.tag
                )))
            }
        }
    }

    Ok(PolicyInfo { policy_oid, uri, signing_period: (not_before, not_after), digest, algorithm_constraints })
}

fn parse_digest(der: &[u8], seq: &Tlv) -> Result<PolicyDigest> {
    let alg_tlv = asn1::expect_tlv(der, seq.value_start, TAG_OID)?;
    let algorithm = hash_algorithm_from_oid(&asn1::oid::decode(alg_tlv.value(der))?)?;
    let value_pos = seq.value_start + alg_tlv.total_len();
    let value_tlv = asn1::expect_tlv(der, value_pos, TAG_OCTET_STRING)?;
    Ok(PolicyDigest { algorithm, value: value_tlv.value(der).to_vec() })
}

fn parse_algorithm_constraints(der: &[u8], seq: &Tlv) -> Result<Vec<AlgorithmConstraint>> {
    let end = seq.value_start + seq.length;
    let mut pos = seq.value_start;
    let mut out = Vec::new();
    while pos < end {
        let inner = asn1::expect_tlv(der, pos, TAG_SEQUENCE)?;
        let (algorithm, next) = read_ia5(der, inner.value_start)?;
        let len_tlv = asn1::expect_tlv(der, next, TAG_INTEGER)?;
        let min_key_length = asn1::decode_integer_as_u64(len_tlv.value(der))? as u32;
        out.push(AlgorithmConstraint { algorithm, min_key_length });
        pos += inner.total_len();
    }
    Ok(out)
}

/// Inverse of [`parse`], used by tests and by callers that maintain a
/// locally cached LPA snapshot.
pub fn encode(lpa: &Lpa) -> Vec<u8> {
    let mut policy_entries = Vec::new();
    for info in &lpa.policy_infos {
        let mut members = vec![asn1::oid::encode_tlv(&info.policy_oid).expect("valid OID")];
        if let Some(uri) = &info.uri {
            members.push(asn1::encode_tlv(TAG_IA5_STRING, uri.as_bytes()));
        }
        members.push(asn1::time::encode_time_tlv(info.signing_period.0));
        members.push(asn1::time::encode_time_tlv(info.signing_period.1));
        if let Some(digest) = &info.digest {
            let alg_oid = crate::cms::hash_algorithm_oid(digest.algorithm);
            members.push(asn1::encode_sequence(&[
                asn1::oid::encode_tlv(alg_oid).expect("valid OID"),
                asn1::encode_octet_string(&digest.value),
            ]));
        }
        if !info.algorithm_constraints.is_empty() {
            let constraints = info
                .algorithm_constraints
                .iter()
                .map(|c| {
                    asn1::encode_sequence(&[
                        asn1::encode_tlv(TAG_IA5_STRING, c.algorithm.as_bytes()),
                        asn1::encode_small_integer(c.min_key_length as u64),
                    ])
                })
                .collect::<Vec<_>>();
            members.push(asn1::encode_sequence(&constraints));
        }
        policy_entries.push(asn1::encode_sequence(&members));
    }
    let policies = asn1::encode_sequence(&policy_entries);
    asn1::encode_sequence(&[asn1::time::encode_time_tlv(lpa.next_update), policies])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HashAlgorithm;
    use chrono::TimeZone;

    fn sample() -> Lpa {
        Lpa {
            next_update: chrono::Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            policy_infos: vec![PolicyInfo {
                policy_oid: "2.16.76.1.7.1.1.2.3".to_string(),
                uri: Some("http://iti.gov.br/AD-RB.der".to_string()),
                signing_period: (
                    chrono::Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                    chrono::Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
                ),
                digest: Some(PolicyDigest { algorithm: HashAlgorithm::Sha256, value: vec![0xAB; 32] }),
                algorithm_constraints: vec![AlgorithmConstraint {
                    algorithm: "rsa-sha256".to_string(),
                    min_key_length: 2048,
                }],
            }],
        }
    }

    #[test]
    fn round_trips_through_der() {
        let lpa = sample();
        let der = encode(&lpa);
        let parsed = parse(&der).unwrap();
        assert_eq!(parsed.policy_infos.len(), 1);
        assert_eq!(parsed.policy_infos[0].policy_oid, "2.16.76.1.7.1.1.2.3");
        assert_eq!(parsed.policy_infos[0].algorithm_constraints[0].min_key_length, 2048);
        assert_eq!(parsed.next_update, lpa.next_update);
    }

    #[test]
    fn round_trips_without_optional_fields() {
        let mut lpa = sample();
        lpa.policy_infos[0].uri = None;
        lpa.policy_infos[0].digest = None;
        lpa.policy_infos[0].algorithm_constraints.clear();
        let der = encode(&lpa);
        let parsed = parse(&der).unwrap();
        assert!(parsed.policy_infos[0].digest.is_none());
        assert!(parsed.policy_infos[0].uri.is_none());
    }
}
