//! Core data types shared across the signing, parsing, and validation paths.
//!
//! These mirror the entities of the data model: a `SignedPdf` is just the
//! byte buffer the caller owns; everything else here is a value type
//! computed from it or supplied by the caller (certificates, keys, options).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The four integers of a `/ByteRange` entry: `[s1, l1, s2, l2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub s1: usize,
    pub l1: usize,
    pub s2: usize,
    pub l2: usize,
}

impl ByteRange {
    /// `s2 + l2 == |pdf|`, i.e. the range covers the remainder of the file.
    pub fn covers_whole_document(&self, pdf_len: usize) -> bool {
        self.s2 + self.l2 == pdf_len
    }

    /// Total length of bytes actually covered (excludes the `/Contents` gap).
    pub fn signed_length(&self) -> usize {
        self.l1 + self.l2
    }

    /// The offset used to order signatures ascending by revision size.
    pub fn signed_revision_length(&self) -> usize {
        self.s2 + self.l2
    }

    pub fn is_well_formed(&self, pdf_len: usize) -> bool {
        self.s1 + self.l1 <= self.s2 && self.s2 + self.l2 <= pdf_len
    }
}

/// Byte offsets (inclusive start, exclusive end) of the hex payload inside
/// a `/Contents <...>` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentsRange {
    pub start: usize,
    pub end: usize,
}

impl ContentsRange {
    pub fn hex_len(&self) -> usize {
        self.end - self.start
    }

    pub fn reserved_bytes(&self) -> usize {
        self.hex_len() / 2
    }
}

/// Full set of offsets recovered for one signature dictionary.
#[derive(Debug, Clone)]
pub struct SignatureOffsets {
    pub byte_range: ByteRange,
    /// Offsets of the `[` ... `]` literal itself, for in-place rewriting.
    pub byte_range_brackets: (usize, usize),
    pub contents: ContentsRange,
    /// Offsets of the `<` and `>` delimiters around the contents payload.
    pub contents_angles: (usize, usize),
}

/// A signature dictionary located by the scanner, plus the field that owns it.
#[derive(Debug, Clone)]
pub struct SignatureEntry {
    pub field_name: String,
    pub byte_range: ByteRange,
    pub offsets: SignatureOffsets,
    /// Decoded (de-hexed) CMS/PKCS#7 bytes from `/Contents`.
    pub contents_der: Vec<u8>,
    pub signature_ref: PdfObjectId,
}

/// An indirect object reference: `objnum gennum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PdfObjectId {
    pub number: u32,
    pub generation: u16,
}

/// Key algorithm family of a signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
    EcdsaP256,
    EcdsaP384,
    EcdsaP521,
}

/// Supported message digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

/// Supported signature algorithms for signing and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    RsaPkcs1Sha256,
    RsaPkcs1Sha384,
    RsaPkcs1Sha512,
    EcdsaP256Sha256,
    EcdsaP384Sha384,
}

impl SignatureAlgorithm {
    pub fn digest_algorithm(&self) -> HashAlgorithm {
        match self {
            SignatureAlgorithm::RsaPkcs1Sha256 | SignatureAlgorithm::EcdsaP256Sha256 => {
                HashAlgorithm::Sha256
            }
            SignatureAlgorithm::RsaPkcs1Sha384 | SignatureAlgorithm::EcdsaP384Sha384 => {
                HashAlgorithm::Sha384
            }
            SignatureAlgorithm::RsaPkcs1Sha512 => HashAlgorithm::Sha512,
        }
    }
}

/// A private key used only by the optional in-process `ExternalSigner`
/// convenience implementation; never required by the core path, which
/// accepts raw signature bytes from the caller.
#[derive(Debug, Clone)]
pub struct PrivateKey {
    pub algorithm: KeyAlgorithm,
    pub key_size: u32,
    pub der_data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PublicKey {
    pub algorithm: KeyAlgorithm,
    pub key_size: u32,
    pub der_data: Vec<u8>,
}

/// A parsed certificate, keeping both the structured fields a caller wants
/// and the original DER bytes needed for re-hashing and chain building.
#[derive(Debug, Clone)]
pub struct X509Certificate {
    pub der_data: Vec<u8>,
    pub subject: String,
    pub issuer: String,
    pub serial_number: Vec<u8>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub public_key: PublicKey,
    pub key_usage: Vec<String>,
    pub is_ca: bool,
    pub path_len_constraint: Option<u32>,
    pub authority_key_id: Option<Vec<u8>>,
    pub subject_key_id: Option<Vec<u8>>,
    pub crl_distribution_points: Vec<String>,
    pub ocsp_responder_urls: Vec<String>,
    pub ca_issuer_urls: Vec<String>,
    pub extended_key_usage: Vec<String>,
    pub icp_brasil_san: Option<IcpBrasilSubjectInfo>,
}

impl X509Certificate {
    pub fn is_self_signed_by_name(&self) -> bool {
        self.subject == self.issuer
    }
}

/// Fields extracted from the ICP-Brasil `OtherName` SAN arc (`2.16.76.1.3.*`).
#[derive(Debug, Clone, Default)]
pub struct IcpBrasilSubjectInfo {
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
    pub date_of_birth: Option<String>,
    pub responsible_name: Option<String>,
    pub nis: Option<String>,
}

/// Credentials bundle handed to the orchestrator when the caller wants the
/// crate's own `ExternalSigner` convenience implementation rather than an
/// injected HSM/KMS callback.
#[derive(Debug, Clone)]
pub struct SigningCredentials {
    pub certificate: X509Certificate,
    pub private_key: PrivateKey,
    pub certificate_chain: Vec<X509Certificate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureMeta {
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    pub signing_time: Option<DateTime<Utc>>,
    pub field_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// DocMDP certification permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocMdpPermission {
    NoChangesAllowed = 1,
    FormFillAndSign = 2,
    FormFillSignAndAnnotate = 3,
}

/// A `FieldMDP` transform `/Action`: which form fields a signature locks
/// (SPEC_FULL.md §B — the sibling of DocMDP for certification signatures
/// that only need to lock specific fields rather than the whole document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldMdpAction {
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl FieldMdpAction {
    pub fn action_name(&self) -> &'static str {
        match self {
            FieldMdpAction::All => "All",
            FieldMdpAction::Include(_) => "Include",
            FieldMdpAction::Exclude(_) => "Exclude",
        }
    }

    pub fn fields(&self) -> &[String] {
        match self {
            FieldMdpAction::All => &[],
            FieldMdpAction::Include(f) | FieldMdpAction::Exclude(f) => f,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CustomProperties(pub HashMap<String, String>);
