//! Final assembly of a detached CMS `ContentInfo`/`SignedData` once an
//! external signer has produced the raw signature over the signed
//! attributes SET built by [`super::attrs::build_signed_attributes`].

use crate::asn1;
use crate::error::Result;
use crate::types::{HashAlgorithm, SignatureAlgorithm};

pub use super::attrs::build_signed_attributes;
use super::SignerIdentifier;

/// Assemble the final `ContentInfo` DER. `signed_attrs_set_der` must be
/// exactly the `SET OF Attribute` bytes that were signed (tag `0x31`); it
/// is re-tagged to `[0] IMPLICIT` here, never re-sorted or re-encoded, so
/// the signature stays valid against the embedded form.
#[allow(clippy::too_many_arguments)]
pub fn assemble_signed_data(
    signer_cert_der: &[u8],
    chain_certs_der: &[Vec<u8>],
    sid: &SignerIdentifier,
    hash_algorithm: HashAlgorithm,
    signature_algorithm: SignatureAlgorithm,
    signed_attrs_set_der: &[u8],
    signature: &[u8],
    unsigned_attrs: &[Vec<u8>],
) -> Result<Vec<u8>> {
    let version = match sid {
        SignerIdentifier::IssuerAndSerialNumber { .. } => 1u64,
        SignerIdentifier::SubjectKeyIdentifier(_) => 3u64,
    };
    let version_tlv = asn1::encode_small_integer(version);

    let digest_alg_id = super::encode_algorithm_identifier(super::hash_algorithm_oid(hash_algorithm))?;
    let digest_algorithms = asn1::encode_set_unsorted(std::slice::from_ref(&digest_alg_id));

    let content_type_oid = asn1::oid::encode_tlv(super::OID_ID_DATA)?;
    let encap_content_info = asn1::encode_sequence(&[content_type_oid]);

    let mut cert_members = vec![signer_cert_der.to_vec()];
    cert_members.extend(chain_certs_der.iter().cloned());
    let certs_set = asn1::encode_set_unsorted(&cert_members);
    let certificates_tagged = asn1::encode_context_implicit_constructed(0, &certs_set)?;

    let sid_tlv = match sid {
        SignerIdentifier::IssuerAndSerialNumber { issuer_der, serial } => {
            asn1::encode_sequence(&[issuer_der.clone(), asn1::encode_integer(serial)])
        }
        SignerIdentifier::SubjectKeyIdentifier(ski) => asn1::encode_context_implicit_primitive(0, ski),
    };

    let signed_attrs_tagged = asn1::encode_context_implicit_constructed(0, signed_attrs_set_der)?;

    let signature_alg_id = match signature_algorithm {
        SignatureAlgorithm::RsaPkcs1Sha256 | SignatureAlgorithm::RsaPkcs1Sha384 | SignatureAlgorithm::RsaPkcs1Sha512 => {
            super::encode_algorithm_identifier(super::signature_algorithm_oid(signature_algorithm))?
        }
        SignatureAlgorithm::EcdsaP256Sha256 | SignatureAlgorithm::EcdsaP384Sha384 => {
            super::encode_algorithm_identifier_no_params(super::signature_algorithm_oid(signature_algorithm))?
        }
    };
    let signature_tlv = asn1::encode_octet_string(signature);

    let mut signer_info_members = vec![
        version_tlv,
        sid_tlv,
        digest_alg_id.clone(),
        signed_attrs_tagged,
        signature_alg_id,
        signature_tlv,
    ];
    if !unsigned_attrs.is_empty() {
        let unsigned_set = asn1::encode_set_unsorted(unsigned_attrs);
        signer_info_members.push(asn1::encode_context_implicit_constructed(1, &unsigned_set)?);
    }
    let signer_info = asn1::encode_sequence(&signer_info_members);
    let signer_infos = asn1::encode_set_unsorted(std::slice::from_ref(&signer_info));

    let signed_data_version = asn1::encode_small_integer(1);
    let signed_data = asn1::encode_sequence(&[
        signed_data_version,
        digest_algorithms,
        encap_content_info,
        certificates_tagged,
        signer_infos,
    ]);

    let content_explicit = asn1::encode_context_explicit(0, &signed_data);
    let content_type = asn1::oid::encode_tlv(super::OID_ID_SIGNED_DATA)?;
    Ok(asn1::encode_sequence(&[content_type, content_explicit]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::attrs::{SignatureInput, SignedAttributesRequest};
    use chrono::{TimeZone, Utc};

    #[test]
    fn assembles_parseable_content_info() {
        let req = SignedAttributesRequest {
            content_digest: vec![0x11; 32],
            hash_algorithm: HashAlgorithm::Sha256,
            signing_time: Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap(),
            signer_certificate_digest: vec![0x22; 32],
            signature_policy: None,
        };
        let SignatureInput { der_to_sign, .. } = build_signed_attributes(&req).unwrap();

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

        let outer = asn1::read_tlv(&der, 0).unwrap();
        assert_eq!(outer.tag, asn1::TAG_SEQUENCE);
        assert_eq!(outer.total_len(), der.len());
    }
}
