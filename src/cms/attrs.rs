//! Signed-attribute set construction.
//!
//! `build_signed_attributes` produces the exact `SET OF Attribute` (tag
//! `0x31`) DER that is both the thing an external signer hashes-and-signs
//! and, with its tag swapped to `[0]`, the thing embedded in the final
//! `SignerInfo`.

use chrono::{DateTime, Utc};

use crate::asn1;
use crate::error::Result;
use crate::types::HashAlgorithm;

use super::{
    OID_CONTENT_TYPE, OID_ID_DATA, OID_MESSAGE_DIGEST, OID_SIGNATURE_POLICY_ID,
    OID_SIGNING_CERTIFICATE_V2, OID_SIGNING_TIME,
};

#[derive(Debug, Clone)]
pub struct SignaturePolicyIdInput {
    pub oid: String,
    /// `(hashAlgorithm, hashValue)`; absent to match producers that omit
    /// `sigPolicyHash` (tolerated by the parser even though ETSI CAdES
    /// declares it mandatory).
    pub hash: Option<(HashAlgorithm, Vec<u8>)>,
}

#[derive(Debug, Clone)]
pub struct SignedAttributesRequest {
    pub content_digest: Vec<u8>,
    pub hash_algorithm: HashAlgorithm,
    pub signing_time: DateTime<Utc>,
    /// `Hash(signerCertificate.der)` under `hash_algorithm`, for `ESSCertIDv2.certHash`.
    pub signer_certificate_digest: Vec<u8>,
    pub signature_policy: Option<SignaturePolicyIdInput>,
}

/// Result of building signed attributes: the SET-tagged DER to hand to a
/// signer, plus the individual `Attribute` TLVs in encounter order (not the
/// canonical sorted order of `der_to_sign`) for callers that want to log or
/// inspect them.
#[derive(Debug, Clone)]
pub struct SignatureInput {
    pub der_to_sign: Vec<u8>,
    pub attributes: Vec<Vec<u8>>,
}

/// `Attribute ::= SEQUENCE { type OID, values SET OF AttributeValue }`.
/// Exposed crate-wide so the unsigned-attribute path (timestamp token
/// embedding) can reuse the same encoding as the signed-attribute set.
pub(crate) fn encode_attribute(oid: &str, value_tlv: Vec<u8>) -> Result<Vec<u8>> {
    let oid_tlv = asn1::oid::encode_tlv(oid)?;
    let values = asn1::encode_set_unsorted(&[value_tlv]);
    Ok(asn1::encode_sequence(&[oid_tlv, values]))
}

pub fn build_signed_attributes(req: &SignedAttributesRequest) -> Result<SignatureInput> {
    let mut attributes = Vec::new();

    let content_type_value = asn1::oid::encode_tlv(OID_ID_DATA)?;
    attributes.push(encode_attribute(OID_CONTENT_TYPE, content_type_value)?);

    let message_digest_value = asn1::encode_octet_string(&req.content_digest);
    attributes.push(encode_attribute(OID_MESSAGE_DIGEST, message_digest_value)?);

    let signing_time_value = asn1::time::encode_time_tlv(req.signing_time);
    attributes.push(encode_attribute(OID_SIGNING_TIME, signing_time_value)?);

    let hash_alg_id = super::encode_algorithm_identifier(super::hash_algorithm_oid(req.hash_algorithm))?;
    let cert_hash = asn1::encode_octet_string(&req.signer_certificate_digest);
    let ess_cert_id_v2 = asn1::encode_sequence(&[hash_alg_id, cert_hash]);
    let certs = asn1::encode_sequence(&[ess_cert_id_v2]);
    let signing_certificate_v2 = asn1::encode_sequence(&[certs]);
    attributes.push(encode_attribute(OID_SIGNING_CERTIFICATE_V2, signing_certificate_v2)?);

    if let Some(policy) = &req.signature_policy {
        let policy_oid = asn1::oid::encode_tlv(&policy.oid)?;
        let mut members = vec![policy_oid];
        if let Some((hash_alg, hash_value)) = &policy.hash {
            let hash_alg_id = super::encode_algorithm_identifier(super::hash_algorithm_oid(*hash_alg))?;
            let hash_value_tlv = asn1::encode_octet_string(hash_value);
            members.push(asn1::encode_sequence(&[hash_alg_id, hash_value_tlv]));
        }
        let signature_policy_id = asn1::encode_sequence(&members);
        attributes.push(encode_attribute(OID_SIGNATURE_POLICY_ID, signature_policy_id)?);
    }

    let mut for_set = attributes.clone();
    let der_to_sign = asn1::encode_set(&mut for_set);

    Ok(SignatureInput { der_to_sign, attributes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn builds_signed_attrs_as_canonical_set() {
        let req = SignedAttributesRequest {
            content_digest: vec![0xAA; 32],
            hash_algorithm: HashAlgorithm::Sha256,
            signing_time: Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap(),
            signer_certificate_digest: vec![0xBB; 32],
            signature_policy: None,
        };
        let input = build_signed_attributes(&req).unwrap();
        assert_eq!(input.der_to_sign[0], asn1::TAG_SET);
        assert_eq!(input.attributes.len(), 4);
        let tlv = asn1::read_tlv(&input.der_to_sign, 0).unwrap();
        assert_eq!(tlv.total_len(), input.der_to_sign.len());
    }

    #[test]
    fn includes_signature_policy_when_requested() {
        let req = SignedAttributesRequest {
            content_digest: vec![0x01; 32],
            hash_algorithm: HashAlgorithm::Sha256,
            signing_time: Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap(),
            signer_certificate_digest: vec![0x02; 32],
            signature_policy: Some(SignaturePolicyIdInput {
                oid: "2.16.76.1.7.1.1.2.3".to_string(),
                hash: None,
            }),
        };
        let input = build_signed_attributes(&req).unwrap();
        assert_eq!(input.attributes.len(), 5);
    }
}
