//! Strict TLV walk of a detached CMS `ContentInfo`/`SignedData`, with
//! byte-exact recovery of the signed attributes actually used to verify a
//! signature.

use crate::asn1::{self, Tlv, CONSTRUCTED, CONTEXT, TAG_INTEGER, TAG_OCTET_STRING, TAG_SEQUENCE, TAG_SET};
use crate::crypto::verify_with_declared_algorithm;
use crate::error::{PdfSignError, Result};
use crate::types::{HashAlgorithm, SignatureAlgorithm, X509Certificate};

use super::{
    hash_algorithm_from_oid, signature_algorithm_from_oid, SignerIdentifier, OID_CONTENT_TYPE,
    OID_ID_SIGNED_DATA, OID_MESSAGE_DIGEST,
};

const TAG_CERTS: u8 = CONTEXT | CONSTRUCTED | 0;
const TAG_CRLS: u8 = CONTEXT | CONSTRUCTED | 1;
const TAG_SIGNED_ATTRS: u8 = CONTEXT | CONSTRUCTED | 0;
const TAG_UNSIGNED_ATTRS: u8 = CONTEXT | CONSTRUCTED | 1;
const TAG_SKI_SID: u8 = CONTEXT;

#[derive(Debug, Clone)]
pub struct ParsedAttribute {
    pub oid: String,
    pub values: Vec<Vec<u8>>,
}

impl ParsedAttribute {
    pub fn single_value(&self) -> Option<&[u8]> {
        self.values.first().map(Vec::as_slice)
    }
}

#[derive(Debug, Clone)]
pub struct ParsedSignerInfo {
    pub version: u64,
    pub sid: SignerIdentifier,
    pub digest_algorithm: HashAlgorithm,
    /// The original `[0] IMPLICIT ...` tagged region, byte for byte.
    pub signed_attrs_tagged: Vec<u8>,
    /// Candidate `SET OF Attribute` (tag `0x31`) buffers to try verifying
    /// the signature against, in the order they should be tried.
    pub signed_attrs_verify_candidates: Vec<Vec<u8>>,
    pub signed_attrs: Vec<ParsedAttribute>,
    pub signature_algorithm: SignatureAlgorithm,
    pub signature: Vec<u8>,
    pub unsigned_attrs: Vec<ParsedAttribute>,
}

impl ParsedSignerInfo {
    pub fn find_signed_attr(&self, oid: &str) -> Option<&ParsedAttribute> {
        self.signed_attrs.iter().find(|a| a.oid == oid)
    }

    pub fn find_unsigned_attr(&self, oid: &str) -> Option<&ParsedAttribute> {
        self.unsigned_attrs.iter().find(|a| a.oid == oid)
    }
}

#[derive(Debug, Clone)]
pub struct ParsedCms {
    pub version: u64,
    pub digest_algorithms: Vec<String>,
    pub econtent_type: String,
    /// Present for attached content (e.g. a timestamp token's `TSTInfo`);
    /// absent for the detached signatures this crate produces.
    pub econtent: Option<Vec<u8>>,
    /// Raw DER of each embedded certificate, original byte order preserved.
    pub certificates: Vec<Vec<u8>>,
    pub signer_info: ParsedSignerInfo,
}

pub fn parse_signed_data(der: &[u8]) -> Result<ParsedCms> {
    let content_info = asn1::expect_tlv(der, 0, TAG_SEQUENCE)
        .map_err(|e| PdfSignError::asn1_parse(format!("NotSignedData: malformed ContentInfo: {e}")))?;

    let content_type_tlv = asn1::read_tlv(der, content_info.value_start)?;
    let content_type = asn1::oid::decode(content_type_tlv.value(der))?;
    if content_type != OID_ID_SIGNED_DATA {
        return Err(PdfSignError::asn1_parse(format!(
            "NotSignedData: ContentInfo.contentType is {content_type}, expected {OID_ID_SIGNED_DATA}"
        )));
    }

    let content_pos = content_type_tlv.value_start + content_type_tlv.length;
    let content_explicit = asn1::expect_tlv(der, content_pos, CONTEXT | CONSTRUCTED)
        .map_err(|e| PdfSignError::asn1_parse(format!("NotSignedData: missing [0] EXPLICIT content: {e}")))?;
    let signed_data = asn1::expect_tlv(der, content_explicit.value_start, TAG_SEQUENCE)?;

    let mut pos = signed_data.value_start;
    let end = signed_data.value_start + signed_data.length;

    let version_tlv = asn1::expect_tlv(der, pos, TAG_INTEGER)?;
    let version = asn1::decode_integer_as_u64(version_tlv.value(der))?;
    pos += version_tlv.total_len();

    let digest_algorithms_tlv = asn1::expect_tlv(der, pos, TAG_SET)?;
    let mut digest_algorithms = Vec::new();
    for (_offset, member) in asn1::iter_tlvs(der, digest_algorithms_tlv.value_start, digest_algorithms_tlv.value_start + digest_algorithms_tlv.length)? {
        let oid_tlv = asn1::read_tlv(der, member.value_start)?;
        digest_algorithms.push(asn1::oid::decode(oid_tlv.value(der))?);
    }
    pos += digest_algorithms_tlv.total_len();

    let encap_content_info_tlv = asn1::expect_tlv(der, pos, TAG_SEQUENCE)?;
    let econtent_type_tlv = asn1::read_tlv(der, encap_content_info_tlv.value_start)?;
    let econtent_type = asn1::oid::decode(econtent_type_tlv.value(der))?;
    let encap_end = encap_content_info_tlv.value_start + encap_content_info_tlv.length;
    let after_type = econtent_type_tlv.value_start + econtent_type_tlv.length;
    let mut econtent = None;
    if after_type < encap_end {
        let econtent_tagged = asn1::expect_tlv(der, after_type, CONTEXT | CONSTRUCTED | 0)?;
        let octet_tlv = asn1::expect_tlv(der, econtent_tagged.value_start, TAG_OCTET_STRING)?;
        econtent = Some(octet_tlv.value(der).to_vec());
    }
    pos += encap_content_info_tlv.total_len();

    let mut certificates = Vec::new();
    if pos < end {
        let peek = asn1::read_tlv(der, pos)?;
        if peek.tag == TAG_CERTS {
            for (offset, member) in asn1::iter_tlvs(der, peek.value_start, peek.value_start + peek.length)? {
                certificates.push(member.whole(der, offset).to_vec());
            }
            pos += peek.total_len();
        }
    }

    if pos < end {
        let peek = asn1::read_tlv(der, pos)?;
        if peek.tag == TAG_CRLS {
            pos += peek.total_len();
        }
    }

    let signer_infos_tlv = asn1::expect_tlv(der, pos, TAG_SET)
        .map_err(|e| PdfSignError::asn1_parse(format!("MalformedSignerInfo: missing signerInfos SET: {e}")))?;
    let signer_info_members = asn1::iter_tlvs(der, signer_infos_tlv.value_start, signer_infos_tlv.value_start + signer_infos_tlv.length)?;
    let (si_offset, si_tlv) = signer_info_members
        .first()
        .copied()
        .ok_or_else(|| PdfSignError::asn1_parse("MalformedSignerInfo: signerInfos SET is empty"))?;

    let signer_info = parse_signer_info(der, si_offset, si_tlv)?;

    Ok(ParsedCms {
        version,
        digest_algorithms,
        econtent_type,
        econtent,
        certificates,
        signer_info,
    })
}

fn parse_signer_info(der: &[u8], si_offset: usize, si_tlv: Tlv) -> Result<ParsedSignerInfo> {
    let mut pos = si_tlv.value_start;
    let end = si_tlv.value_start + si_tlv.length;
    let _ = si_offset;

    let version_tlv = asn1::expect_tlv(der, pos, TAG_INTEGER)
        .map_err(|e| PdfSignError::asn1_parse(format!("MalformedSignerInfo: {e}")))?;
    let version = asn1::decode_integer_as_u64(version_tlv.value(der))?;
    pos += version_tlv.total_len();

    let sid_tlv = asn1::read_tlv(der, pos)?;
    let sid = if sid_tlv.tag == TAG_SEQUENCE {
        let issuer_tlv = asn1::read_tlv(der, sid_tlv.value_start)?;
        let issuer_der = issuer_tlv.whole(der, sid_tlv.value_start).to_vec();
        let serial_pos = sid_tlv.value_start + issuer_tlv.total_len();
        let serial_tlv = asn1::expect_tlv(der, serial_pos, TAG_INTEGER)?;
        SignerIdentifier::IssuerAndSerialNumber { issuer_der, serial: serial_tlv.value(der).to_vec() }
    } else if sid_tlv.tag == TAG_SKI_SID {
        SignerIdentifier::SubjectKeyIdentifier(sid_tlv.value(der).to_vec())
    } else {
        return Err(PdfSignError::asn1_parse(format!(
            "MalformedSignerInfo: unrecognised SignerIdentifier tag 0x{:02X}",
            sid_tlv.tag
        )));
    };
    pos += sid_tlv.total_len();

    let digest_alg_tlv = asn1::expect_tlv(der, pos, TAG_SEQUENCE)?;
    let digest_oid_tlv = asn1::read_tlv(der, digest_alg_tlv.value_start)?;
    let digest_algorithm = hash_algorithm_from_oid(&asn1::oid::decode(digest_oid_tlv.value(der))?)?;
    pos += digest_alg_tlv.total_len();

    if pos >= end {
        return Err(PdfSignError::asn1_parse("SignedAttrsMissingRequired: signedAttrs absent"));
    }
    let peek = asn1::read_tlv(der, pos)?;
    if peek.tag != TAG_SIGNED_ATTRS {
        return Err(PdfSignError::asn1_parse("SignedAttrsMissingRequired: signedAttrs absent"));
    }
    let signed_attrs_tagged = peek.whole(der, pos).to_vec();
    let inner = peek.value(der);

    let (attrs_start, attrs_end, verify_candidates) = if !inner.is_empty() && inner[0] == TAG_SET {
        // Producer encoded EXPLICIT [0] { SET OF Attribute }.
        let inner_set = asn1::read_tlv(inner, 0)?;
        let abs_start = peek.value_start + inner_set.value_start;
        let abs_end = abs_start + inner_set.length;
        let explicit_set_bytes = inner_set.whole(inner, 0).to_vec();
        let mut implicit_swap = signed_attrs_tagged.clone();
        implicit_swap[0] = TAG_SET;
        (abs_start, abs_end, vec![explicit_set_bytes, implicit_swap])
    } else {
        let mut implicit_swap = signed_attrs_tagged.clone();
        implicit_swap[0] = TAG_SET;
        (peek.value_start, peek.value_start + peek.length, vec![implicit_swap])
    };

    let mut signed_attrs = Vec::new();
    for (offset, member) in asn1::iter_tlvs(der, attrs_start, attrs_end)? {
        signed_attrs.push(parse_attribute(der, offset, member)?);
    }
    if signed_attrs.iter().all(|a| a.oid != OID_CONTENT_TYPE) || signed_attrs.iter().all(|a| a.oid != OID_MESSAGE_DIGEST) {
        return Err(PdfSignError::asn1_parse(
            "SignedAttrsMissingRequired: contentType or messageDigest missing from signedAttrs",
        ));
    }
    pos += peek.total_len();

    let sig_alg_tlv = asn1::expect_tlv(der, pos, TAG_SEQUENCE)?;
    let sig_oid_tlv = asn1::read_tlv(der, sig_alg_tlv.value_start)?;
    let sig_oid = asn1::oid::decode(sig_oid_tlv.value(der))?;
    let signature_algorithm = signature_algorithm_from_oid(&sig_oid)
        .map_err(|_| PdfSignError::unsupported_algorithm(format!("UnsupportedSignatureAlgorithm: {sig_oid}")))?;
    pos += sig_alg_tlv.total_len();

    let signature_tlv = asn1::expect_tlv(der, pos, TAG_OCTET_STRING)?;
    let signature = signature_tlv.value(der).to_vec();
    pos += signature_tlv.total_len();

    let mut unsigned_attrs = Vec::new();
    if pos < end {
        let peek = asn1::read_tlv(der, pos)?;
        if peek.tag == TAG_UNSIGNED_ATTRS {
            for (offset, member) in asn1::iter_tlvs(der, peek.value_start, peek.value_start + peek.length)? {
                unsigned_attrs.push(parse_attribute(der, offset, member)?);
            }
        }
    }

    Ok(ParsedSignerInfo {
        version,
        sid,
        digest_algorithm,
        signed_attrs_tagged,
        signed_attrs_verify_candidates: verify_candidates,
        signed_attrs,
        signature_algorithm,
        signature,
        unsigned_attrs,
    })
}

fn parse_attribute(buf: &[u8], offset: usize, tlv: Tlv) -> Result<ParsedAttribute> {
    let _ = offset;
    let oid_tlv = asn1::expect_tlv(buf, tlv.value_start, asn1::TAG_OID)
        .map_err(|e| PdfSignError::asn1_parse(format!("MalformedSignerInfo: attribute without OID: {e}")))?;
    let oid = asn1::oid::decode(oid_tlv.value(buf))?;
    let values_pos = oid_tlv.value_start + oid_tlv.length;
    let values_tlv = asn1::expect_tlv(buf, values_pos, TAG_SET)?;
    let mut values = Vec::new();
    for (voffset, vtlv) in asn1::iter_tlvs(buf, values_tlv.value_start, values_tlv.value_start + values_tlv.length)? {
        values.push(vtlv.whole(buf, voffset).to_vec());
    }
    Ok(ParsedAttribute { oid, values })
}

/// Select the signer certificate among `candidates` (the CMS's own
/// embedded certificates plus any caller-supplied extras) per the
/// matching order: `SignerIdentifier`, then sole-candidate shortcut, then
/// trial verification of the signature against each candidate.
pub fn select_signer_certificate(
    candidates: &[X509Certificate],
    signer_info: &ParsedSignerInfo,
) -> Result<X509Certificate> {
    let by_sid = candidates.iter().find(|c| match &signer_info.sid {
        SignerIdentifier::IssuerAndSerialNumber { serial, .. } => &c.serial_number == serial,
        SignerIdentifier::SubjectKeyIdentifier(ski) => c.subject_key_id.as_deref() == Some(ski.as_slice()),
    });
    if let Some(cert) = by_sid {
        log::debug!("signer identified by SignerIdentifier match: '{}'", cert.subject);
        return Ok(cert.clone());
    }

    if candidates.len() == 1 {
        log::debug!(
            "SignerIdentifier matched nothing; falling back to the sole embedded certificate '{}'",
            candidates[0].subject
        );
        return Ok(candidates[0].clone());
    }

    log::debug!(
        "SignerIdentifier matched nothing among {} candidates; trial-verifying the signature against each",
        candidates.len()
    );
    for cert in candidates {
        for buffer in &signer_info.signed_attrs_verify_candidates {
            if let Ok(true) = verify_with_declared_algorithm(
                buffer,
                &signer_info.signature,
                &cert.public_key,
                signer_info.signature_algorithm.digest_algorithm(),
            ) {
                log::debug!("signer identified by trial verification: '{}'", cert.subject);
                return Ok(cert.clone());
            }
        }
    }

    log::warn!("could not identify the signer certificate among {} embedded certificates", candidates.len());
    Err(PdfSignError::certificate_parse(
        "could not identify the signer certificate among the embedded certificates",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::attrs::{SignatureInput, SignedAttributesRequest};
    use crate::cms::builder::assemble_signed_data;
    use chrono::{TimeZone, Utc};

    #[test]
    fn round_trips_attrs_through_build_and_parse() {
        let req = SignedAttributesRequest {
            content_digest: vec![0x11; 32],
            hash_algorithm: HashAlgorithm::Sha256,
            signing_time: Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap(),
            signer_certificate_digest: vec![0x22; 32],
            signature_policy: None,
        };
        let SignatureInput { der_to_sign, .. } = super::super::attrs::build_signed_attributes(&req).unwrap();

        let fake_cert = asn1::encode_sequence(&[vec![0x02, 0x01, 0x01]]);
        let sid = SignerIdentifier::IssuerAndSerialNumber {
            issuer_der: asn1::encode_sequence(&[]),
            serial: vec![1],
        };
        let der = assemble_signed_data(
            &fake_cert,
            &[],
            &sid,
            HashAlgorithm::Sha256,
            SignatureAlgorithm::RsaPkcs1Sha256,
            &der_to_sign,
            &[0xAB; 256],
            &[],
        )
        .unwrap();

        let parsed = parse_signed_data(&der).unwrap();
        assert_eq!(parsed.certificates.len(), 1);
        assert_eq!(parsed.signer_info.signed_attrs.len(), 4);
        assert!(parsed.signer_info.find_signed_attr(OID_CONTENT_TYPE).is_some());
        assert!(parsed.signer_info.find_signed_attr(OID_MESSAGE_DIGEST).is_some());
        assert_eq!(parsed.signer_info.signature, vec![0xAB; 256]);
    }

    #[test]
    fn tolerates_explicit_signed_attrs_encoding() {
        // Build the SET, then wrap it as A0 LL 31 LL ... (EXPLICIT) instead
        // of the usual implicit tag swap, simulating a producer variant.
        let req = SignedAttributesRequest {
            content_digest: vec![0x33; 32],
            hash_algorithm: HashAlgorithm::Sha256,
            signing_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            signer_certificate_digest: vec![0x44; 32],
            signature_policy: None,
        };
        let SignatureInput { der_to_sign, .. } = super::super::attrs::build_signed_attributes(&req).unwrap();
        let explicit_tagged = asn1::encode_context_explicit(0, &der_to_sign);

        let version_tlv = asn1::encode_small_integer(1);
        let sid_tlv = asn1::encode_sequence(&[asn1::encode_sequence(&[]), asn1::encode_integer(&[1])]);
        let digest_alg = super::super::encode_algorithm_identifier(super::super::OID_SHA256).unwrap();
        let sig_alg = super::super::encode_algorithm_identifier(super::super::OID_SHA256_WITH_RSA).unwrap();
        let sig_tlv = asn1::encode_octet_string(&[0xCD; 256]);
        let signer_info = asn1::encode_sequence(&[version_tlv, sid_tlv, digest_alg, explicit_tagged, sig_alg, sig_tlv]);
        let si_tlv = asn1::read_tlv(&signer_info, 0).unwrap();
        let parsed = parse_signer_info(&signer_info, 0, si_tlv).unwrap();
        assert_eq!(parsed.signed_attrs.len(), 4);
        assert_eq!(parsed.signed_attrs_verify_candidates.len(), 2);
    }
}
