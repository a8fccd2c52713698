//! PAdES / ICP-Brasil digital signature engine for PDF documents.
//!
//! The crate prepares an unsigned PDF for signing, computes the exact bytes
//! to be signed, packages a CMS/PKCS#7 `SignedData` object around an
//! externally produced signature, embeds it back into the PDF placeholder,
//! and — on the inverse path — locates, parses, and cryptographically
//! validates every signature already present in a PDF (integrity, CMS
//! signature, certificate chain, revocation, timestamp, LTV, signature
//! policy).
//!
//! Four subsystems compose the engine:
//!
//! - [`pdf`] — byte-level signature surgery: reserving a `/Contents`
//!   placeholder and `/ByteRange`, and later locating/splicing signature
//!   bytes without disturbing any other byte of the file.
//! - [`cms`] — ASN.1 DER assembly/disassembly of detached CMS `SignedData`.
//! - [`x509`], [`revocation`], [`timestamp`], [`policy`] — the validation
//!   pipeline: chain building, CRL/OCSP, RFC 3161 timestamps, and
//!   ICP-Brasil signature-policy enforcement.
//! - [`signature`] — the public façade (`prepare_pdf`, `sign`,
//!   `embed_signature`, `validate_all_signatures`, `inspect_signatures`)
//!   that ties the above together into the operations a caller reaches for.
//!
//! Network I/O (CRL/OCSP/TSA/AIA fetch) is never performed directly by the
//! core; it is mediated by the [`traits::HttpTransport`] the caller injects.
//! An external signer (HSM, KMS, smart card) is likewise injected via
//! [`traits::ExternalSigner`]; [`crypto::keys`] provides an in-process
//! convenience implementation for callers holding a private key directly.

pub mod asn1;
pub mod cms;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ltv;
pub mod napi_bindings;
pub mod pdf;
pub mod performance;
pub mod platform;
pub mod policy;
pub mod revocation;
pub mod signature;
pub mod timestamp;
pub mod traits;
#[cfg(feature = "network")]
pub mod transport;
pub mod types;
pub mod x509;

pub use config::{ScannerOptions, SignatureOptions};
pub use error::{ErrorCode, PdfSignError, Result};
pub use signature::{
    embed_signature, inspect_signatures, prepare_pdf, sign, sign_and_timestamp, validate_all_signatures,
    PreparedSignature, SignatureInspection, SignatureReport, SigningRequest,
};
pub use traits::{CancellationToken, ExternalSigner, HttpTransport, PlatformAbstraction, TrustedRootsProvider, ValidationCache};
pub use types::{
    ByteRange, ContentsRange, DocMdpPermission, FieldMdpAction, HashAlgorithm, IcpBrasilSubjectInfo, KeyAlgorithm,
    PrivateKey, PublicKey, Rectangle, SignatureAlgorithm, SignatureEntry, SignatureMeta, SigningCredentials,
    X509Certificate,
};
