//! CMS/PKCS#7 SignedData engine (C6): builds and parses detached
//! `SignedData` per RFC 5652, including byte-exact recovery of the signed
//! attributes used as the actual verification input.
//!
//! The builder and parser never go through a generic ASN.1 object tree;
//! both compose and walk explicit TLVs via `crate::asn1`, so the exact
//! bytes that end up on the wire (or get fed back into a signature
//! verifier) are always visible at the call site rather than hidden behind
//! a library's re-encoding.

pub mod attrs;
pub mod builder;
pub mod parser;

pub use attrs::{SignatureInput, SignaturePolicyIdInput, SignedAttributesRequest};
pub use builder::{assemble_signed_data, build_signed_attributes};
pub use parser::{parse_signed_data, select_signer_certificate, ParsedAttribute, ParsedCms, ParsedSignerInfo};

use crate::error::{PdfSignError, Result};
use crate::types::{HashAlgorithm, SignatureAlgorithm};

pub const OID_ID_DATA: &str = "1.2.840.113549.1.7.1";
pub const OID_ID_SIGNED_DATA: &str = "1.2.840.113549.1.7.2";
pub const OID_CONTENT_TYPE: &str = "1.2.840.113549.1.9.3";
pub const OID_MESSAGE_DIGEST: &str = "1.2.840.113549.1.9.4";
pub const OID_SIGNING_TIME: &str = "1.2.840.113549.1.9.5";
pub const OID_SIGNING_CERTIFICATE_V2: &str = "1.2.840.113549.1.9.16.2.47";
pub const OID_SIGNATURE_POLICY_ID: &str = "1.2.840.113549.1.9.16.2.15";
pub const OID_SIGNATURE_TIMESTAMP_TOKEN: &str = "1.2.840.113549.1.9.16.2.14";
pub const OID_ID_CT_TSTINFO: &str = "1.2.840.113549.1.9.16.1.4";

pub const OID_SHA1: &str = "1.3.14.3.2.26";
pub const OID_SHA256: &str = "2.16.840.1.101.3.4.2.1";
pub const OID_SHA384: &str = "2.16.840.1.101.3.4.2.2";
pub const OID_SHA512: &str = "2.16.840.1.101.3.4.2.3";

pub const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
pub const OID_SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
pub const OID_SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
pub const OID_SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";
pub const OID_ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";
pub const OID_ECDSA_WITH_SHA384: &str = "1.2.840.10045.4.3.3";

pub fn hash_algorithm_oid(alg: HashAlgorithm) -> &'static str {
    match alg {
        HashAlgorithm::Sha1 => OID_SHA1,
        HashAlgorithm::Sha256 => OID_SHA256,
        HashAlgorithm::Sha384 => OID_SHA384,
        HashAlgorithm::Sha512 => OID_SHA512,
    }
}

pub fn hash_algorithm_from_oid(oid: &str) -> Result<HashAlgorithm> {
    match oid {
        OID_SHA1 => Ok(HashAlgorithm::Sha1),
        OID_SHA256 => Ok(HashAlgorithm::Sha256),
        OID_SHA384 => Ok(HashAlgorithm::Sha384),
        OID_SHA512 => Ok(HashAlgorithm::Sha512),
        other => Err(PdfSignError::unsupported_algorithm(format!("digest algorithm OID {other}"))),
    }
}

pub fn signature_algorithm_oid(alg: SignatureAlgorithm) -> &'static str {
    match alg {
        SignatureAlgorithm::RsaPkcs1Sha256 => OID_SHA256_WITH_RSA,
        SignatureAlgorithm::RsaPkcs1Sha384 => OID_SHA384_WITH_RSA,
        SignatureAlgorithm::RsaPkcs1Sha512 => OID_SHA512_WITH_RSA,
        SignatureAlgorithm::EcdsaP256Sha256 => OID_ECDSA_WITH_SHA256,
        SignatureAlgorithm::EcdsaP384Sha384 => OID_ECDSA_WITH_SHA384,
    }
}

pub fn signature_algorithm_from_oid(oid: &str) -> Result<SignatureAlgorithm> {
    match oid {
        OID_SHA256_WITH_RSA => Ok(SignatureAlgorithm::RsaPkcs1Sha256),
        OID_SHA384_WITH_RSA => Ok(SignatureAlgorithm::RsaPkcs1Sha384),
        OID_SHA512_WITH_RSA => Ok(SignatureAlgorithm::RsaPkcs1Sha512),
        OID_ECDSA_WITH_SHA256 => Ok(SignatureAlgorithm::EcdsaP256Sha256),
        OID_ECDSA_WITH_SHA384 => Ok(SignatureAlgorithm::EcdsaP384Sha384),
        other => Err(PdfSignError::unsupported_algorithm(format!("signature algorithm OID {other}"))),
    }
}

/// `AlgorithmIdentifier ::= SEQUENCE { algorithm OID, parameters ANY OPTIONAL }`.
/// Encoded here with an explicit `NULL` parameter, the common convention for
/// RSA/hash identifiers; harmless and widely tolerated for ECDSA too.
pub fn encode_algorithm_identifier(oid: &str) -> Result<Vec<u8>> {
    let oid_tlv = crate::asn1::oid::encode_tlv(oid)?;
    Ok(crate::asn1::encode_sequence(&[oid_tlv, crate::asn1::encode_null()]))
}

/// Same as `encode_algorithm_identifier` but without a `parameters` field at
/// all (strict ECDSA identifiers per RFC 5480 omit it).
pub fn encode_algorithm_identifier_no_params(oid: &str) -> Result<Vec<u8>> {
    let oid_tlv = crate::asn1::oid::encode_tlv(oid)?;
    Ok(crate::asn1::encode_sequence(&[oid_tlv]))
}

/// `SignerIdentifier ::= CHOICE { issuerAndSerialNumber, [0] subjectKeyIdentifier }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerIdentifier {
    IssuerAndSerialNumber { issuer_der: Vec<u8>, serial: Vec<u8> },
    SubjectKeyIdentifier(Vec<u8>),
}
