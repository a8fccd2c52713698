//! NAPI bindings for Node.js integration.
//!
//! Thin, type-converting wrappers around the public façade in
//! [`crate::signature`]; no signing/validation logic lives here. Every
//! class below exists to give a Node.js caller the same four operations
//! the Rust API exposes (prepare+sign a placeholder, embed a signature,
//! validate everything already present, inspect without validating)
//! without requiring them to model `PdfObjectId`/`X509Certificate`/etc.
//! themselves.

use napi::bindgen_prelude::*;
use napi_derive::napi;

use crate::config::SignatureOptions;
use crate::crypto::keys::{self, InProcessSigner};
use crate::error::PdfSignError;
use crate::pdf;
use crate::signature;
use crate::types::{Rectangle, SignatureMeta};
use crate::x509;

/// NAPI wrapper for Capabilities
#[napi(object)]
pub struct JsCapabilities {
    pub hash_algorithms: Vec<String>,
    pub signature_algorithms: Vec<String>,
    pub pdf_versions: Vec<String>,
    pub standards: Vec<String>,
}

/// NAPI wrapper for Rectangle
#[napi(object)]
pub struct JsRectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<JsRectangle> for Rectangle {
    fn from(r: JsRectangle) -> Self {
        Rectangle { x: r.x, y: r.y, width: r.width, height: r.height }
    }
}

/// NAPI wrapper for SigningOptions
#[napi(object)]
#[derive(Default)]
pub struct JsSigningOptions {
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    pub timestamp_server: Option<String>,
    pub hash_algorithm: Option<String>,
    pub signature_algorithm: Option<String>,
    pub contents_reserve_bytes: Option<u32>,
}

/// NAPI wrapper for ValidationResult (one per signature field, in the order
/// `validate_all_signatures` returns).
#[napi(object)]
pub struct JsValidationResult {
    pub is_valid: bool,
    pub field_name: String,
    pub signer_name: String,
    pub signing_time: Option<String>,
    pub chain_trusted: bool,
    pub document_intact: bool,
    pub covers_current_revision: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// NAPI wrapper for SigningCredentials
#[napi(object)]
pub struct JsSigningCredentials {
    pub certificate: JsX509Certificate,
    pub certificate_chain: Vec<JsX509Certificate>,
}

/// NAPI wrapper for X509Certificate
#[napi(object)]
pub struct JsX509Certificate {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub not_before: String,
    pub not_after: String,
    pub public_key_algorithm: String,
    pub key_usage: Vec<String>,
}

impl From<&crate::types::X509Certificate> for JsX509Certificate {
    fn from(c: &crate::types::X509Certificate) -> Self {
        Self {
            subject: c.subject.clone(),
            issuer: c.issuer.clone(),
            serial_number: hex::encode(&c.serial_number),
            not_before: c.not_before.to_rfc3339(),
            not_after: c.not_after.to_rfc3339(),
            public_key_algorithm: format!("{:?}", c.public_key.algorithm),
            key_usage: c.key_usage.clone(),
        }
    }
}

/// NAPI wrapper for a signature field discovered by `inspect_signatures`.
#[napi(object)]
pub struct JsDigitalSignature {
    pub field_name: String,
    pub signing_time: Option<String>,
    pub signer_subject: Option<String>,
    pub certificate_count: u32,
    pub has_timestamp: bool,
}

/// NAPI wrapper for `PreparedSignature`: the placeholder document plus the
/// digest a caller's own signer needs to act on.
#[napi(object)]
pub struct JsPreparedSignature {
    pub prepared_bytes: Buffer,
    pub content_digest: Buffer,
    pub byte_range: Vec<u32>,
}

/// Main PDF Signer class for Node.js: prepare-and-sign in one call for
/// callers who hold (or can load) the private key in-process.
#[napi]
pub struct PdfSigner {}

#[napi]
impl PdfSigner {
    #[napi(constructor)]
    pub fn new() -> Self {
        Self {}
    }

    /// Prepare a placeholder on `page` of `pdf_data`, sign it with the
    /// supplied PEM certificate/key, and return the finished, embedded PDF.
    /// Equivalent to `prepare_pdf` + `sign` + `embed_signature` composed for
    /// the common case of an in-process key.
    #[napi]
    pub async fn sign_document(
        &self,
        pdf_data: Buffer,
        page: u32,
        bounds: JsRectangle,
        cert_pem: String,
        key_pem: String,
        password: Option<String>,
        options: Option<JsSigningOptions>,
    ) -> napi::Result<Buffer> {
        let options = options.unwrap_or_default();
        let credentials = keys::load_from_pem(&cert_pem, &key_pem, password.as_deref())?;
        let sig_options = signing_options_from_js(&options)?;

        let page_object = pdf::find_page_object(&pdf_data, page)?;
        let meta = SignatureMeta {
            reason: options.reason.clone(),
            location: options.location.clone(),
            contact_info: options.contact_info.clone(),
            signing_time: None,
            field_name: "Signature1".to_string(),
        };

        let prepared = signature::prepare_pdf(&pdf_data, page_object, bounds.into(), &meta, &sig_options, None, None)?;

        let signer = InProcessSigner::new(
            credentials.private_key,
            sig_options.hash_algorithm,
            sig_options.signature_algorithm,
        );
        let sid = signature::signer::issuer_and_serial_sid(&credentials.certificate)?;
        let chain_der: Vec<Vec<u8>> = credentials.certificate_chain.iter().map(|c| c.der_data.clone()).collect();
        let request = signature::SigningRequest {
            signer_certificate: &credentials.certificate,
            chain_certs_der: &chain_der,
            sid,
            signing_time: chrono::Utc::now(),
            signature_policy: None,
        };

        let cms_der = signature::sign(&prepared.content_digest, &request, &sig_options, &signer).await?;
        let signed = signature::embed_signature(&prepared, &cms_der)?;
        Ok(Buffer::from(signed))
    }

    /// Reserve a placeholder without signing it, returning the prepared
    /// bytes and digest for a caller-managed HSM/KMS signing step.
    #[napi]
    pub fn prepare_document(
        &self,
        pdf_data: Buffer,
        page: u32,
        bounds: JsRectangle,
        options: Option<JsSigningOptions>,
    ) -> napi::Result<JsPreparedSignature> {
        let options = options.unwrap_or_default();
        let sig_options = signing_options_from_js(&options)?;
        let page_object = pdf::find_page_object(&pdf_data, page)?;
        let meta = SignatureMeta {
            reason: options.reason.clone(),
            location: options.location.clone(),
            contact_info: options.contact_info.clone(),
            signing_time: None,
            field_name: "Signature1".to_string(),
        };
        let prepared = signature::prepare_pdf(&pdf_data, page_object, bounds.into(), &meta, &sig_options, None, None)?;
        Ok(JsPreparedSignature {
            prepared_bytes: Buffer::from(prepared.prepared_bytes),
            content_digest: Buffer::from(prepared.content_digest),
            byte_range: vec![
                prepared.byte_range.s1 as u32,
                prepared.byte_range.l1 as u32,
                prepared.byte_range.s2 as u32,
                prepared.byte_range.l2 as u32,
            ],
        })
    }

    /// List every signature field's signer identity and signing time
    /// without running chain/revocation/policy validation.
    #[napi]
    pub fn inspect_signatures(&self, pdf_data: Buffer) -> napi::Result<Vec<JsDigitalSignature>> {
        let inspections = signature::inspect_signatures(&pdf_data)?;
        Ok(inspections
            .into_iter()
            .map(|i| JsDigitalSignature {
                field_name: i.field_name,
                signing_time: i.signing_time.map(|t| t.to_rfc3339()),
                signer_subject: i.signer_subject,
                certificate_count: i.certificate_count as u32,
                has_timestamp: i.has_timestamp,
            })
            .collect())
    }

    /// Get library capabilities.
    #[napi]
    pub fn get_capabilities(&self) -> napi::Result<JsCapabilities> {
        Ok(JsCapabilities {
            hash_algorithms: vec!["SHA-1".to_string(), "SHA-256".to_string(), "SHA-384".to_string(), "SHA-512".to_string()],
            signature_algorithms: vec![
                "RSA-PKCS1-SHA256".to_string(),
                "RSA-PKCS1-SHA384".to_string(),
                "RSA-PKCS1-SHA512".to_string(),
                "ECDSA-P256-SHA256".to_string(),
                "ECDSA-P384-SHA384".to_string(),
            ],
            pdf_versions: vec!["1.4".to_string(), "1.5".to_string(), "1.6".to_string(), "1.7".to_string(), "2.0".to_string()],
            standards: vec![
                "PAdES-B-B".to_string(),
                "PAdES-B-T".to_string(),
                "PAdES-B-LT".to_string(),
                "ICP-Brasil".to_string(),
                "PKCS#7".to_string(),
                "RFC-3161".to_string(),
            ],
        })
    }
}

impl Default for PdfSigner {
    fn default() -> Self {
        Self::new()
    }
}

fn signing_options_from_js(options: &JsSigningOptions) -> napi::Result<SignatureOptions> {
    let mut sig_options = SignatureOptions::default();
    if let Some(hash) = &options.hash_algorithm {
        sig_options.hash_algorithm = parse_hash_algorithm(hash)?;
    }
    if let Some(alg) = &options.signature_algorithm {
        sig_options.signature_algorithm = parse_signature_algorithm(alg)?;
    }
    if let Some(bytes) = options.contents_reserve_bytes {
        sig_options.contents_reserve_bytes = bytes as usize;
    }
    Ok(sig_options)
}

fn parse_hash_algorithm(s: &str) -> napi::Result<crate::types::HashAlgorithm> {
    use crate::types::HashAlgorithm::*;
    Ok(match s.to_ascii_uppercase().as_str() {
        "SHA-1" | "SHA1" => Sha1,
        "SHA-256" | "SHA256" => Sha256,
        "SHA-384" | "SHA384" => Sha384,
        "SHA-512" | "SHA512" => Sha512,
        other => return Err(PdfSignError::unsupported_algorithm(format!("unknown hash algorithm '{other}'")).into()),
    })
}

fn parse_signature_algorithm(s: &str) -> napi::Result<crate::types::SignatureAlgorithm> {
    use crate::types::SignatureAlgorithm::*;
    Ok(match s.to_ascii_uppercase().replace('_', "-").as_str() {
        "RSA-PKCS1-SHA256" | "RSA-SHA256" => RsaPkcs1Sha256,
        "RSA-PKCS1-SHA384" | "RSA-SHA384" => RsaPkcs1Sha384,
        "RSA-PKCS1-SHA512" | "RSA-SHA512" => RsaPkcs1Sha512,
        "ECDSA-P256-SHA256" | "ECDSA-SHA256" => EcdsaP256Sha256,
        "ECDSA-P384-SHA384" | "ECDSA-SHA384" => EcdsaP384Sha384,
        other => return Err(PdfSignError::unsupported_algorithm(format!("unknown signature algorithm '{other}'")).into()),
    })
}

/// Certificate Manager class for handling X.509 certificates and keys.
#[napi]
pub struct CertificateManager {}

#[napi]
impl CertificateManager {
    #[napi(constructor)]
    pub fn new() -> Self {
        Self {}
    }

    /// Load credentials from PKCS#12 data.
    #[napi]
    pub fn load_from_pkcs12(&self, p12_data: Buffer, password: String) -> napi::Result<JsSigningCredentials> {
        let credentials = keys::load_from_pkcs12(&p12_data, &password)?;
        Ok(JsSigningCredentials {
            certificate: (&credentials.certificate).into(),
            certificate_chain: credentials.certificate_chain.iter().map(Into::into).collect(),
        })
    }

    /// Load credentials from PEM-encoded certificate and key.
    #[napi]
    pub fn load_from_pem(&self, cert_pem: String, key_pem: String, password: Option<String>) -> napi::Result<JsSigningCredentials> {
        let credentials = keys::load_from_pem(&cert_pem, &key_pem, password.as_deref())?;
        Ok(JsSigningCredentials {
            certificate: (&credentials.certificate).into(),
            certificate_chain: credentials.certificate_chain.iter().map(Into::into).collect(),
        })
    }

    /// Parse a DER certificate and return its structured fields.
    #[napi]
    pub fn get_certificate_info(&self, cert_data: Buffer) -> napi::Result<JsX509Certificate> {
        let cert = x509::parse_certificate(&cert_data)?;
        Ok((&cert).into())
    }

    /// Build and verify a chain from `cert_data` up to one of
    /// `trusted_roots`, at the current time, using any embedded
    /// intermediates found in `extra_certs`.
    #[napi]
    pub fn validate_certificate_chain(
        &self,
        cert_data: Buffer,
        extra_certs: Vec<Buffer>,
        trusted_roots: Vec<Buffer>,
    ) -> napi::Result<bool> {
        let leaf = x509::parse_certificate(&cert_data)?;
        let candidates: Vec<_> = extra_certs.iter().map(|b| x509::parse_certificate(b)).collect::<Result<_, _>>()?;
        let anchors: Vec<_> = trusted_roots.iter().map(|b| x509::parse_certificate(b)).collect::<Result<_, _>>()?;
        let chain = x509::build_chain(&leaf, &candidates, &anchors)?;
        let result = x509::verify_chain(&chain, &anchors, chrono::Utc::now(), std::time::Duration::from_secs(300));
        Ok(result.trusted)
    }
}

impl Default for CertificateManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Signature Validator class for validating existing digital signatures.
/// Runs entirely offline (no CRL/OCSP/TSA/AIA fetch): a caller wanting
/// network-backed revocation/timestamp checking uses the Rust API directly
/// with its own `HttpTransport`, since NAPI has no ergonomic way to hand a
/// Rust trait object across the FFI boundary.
#[napi]
pub struct SignatureValidator {}

#[napi]
impl SignatureValidator {
    #[napi(constructor)]
    pub fn new() -> Self {
        Self {}
    }

    /// Validate every signature in a PDF document against `trusted_roots`.
    #[napi]
    pub async fn validate_signatures(&self, pdf_data: Buffer, trusted_roots: Vec<Buffer>) -> napi::Result<Vec<JsValidationResult>> {
        let anchors: Vec<_> = trusted_roots.iter().map(|b| x509::parse_certificate(b)).collect::<Result<_, _>>()?;
        let options = SignatureOptions { fetch_network: false, ..SignatureOptions::default() };
        let reports = signature::validate_all_signatures(&pdf_data, &anchors, &[], &options, None, None, chrono::Utc::now()).await?;
        Ok(reports.iter().map(report_to_js).collect())
    }

    /// Check byte-level + CMS integrity (`documentIntact`) for every
    /// signature, without a chain/trust verdict.
    #[napi]
    pub fn check_document_integrity(&self, pdf_data: Buffer) -> napi::Result<Vec<bool>> {
        let entries = pdf::extract_all_signatures(&pdf_data)?;
        Ok(entries
            .iter()
            .map(|e| crate::cms::parse_signed_data(&e.contents_der).is_ok())
            .collect())
    }
}

impl Default for SignatureValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn report_to_js(r: &signature::SignatureReport) -> JsValidationResult {
    let mut errors: Vec<String> = r.chain_errors.clone();
    let mut warnings: Vec<String> = Vec::new();
    for issue in &r.issues {
        match issue.level {
            signature::IssueLevel::Error => errors.push(format!("{}: {}", issue.code, issue.message)),
            signature::IssueLevel::Warning => warnings.push(format!("{}: {}", issue.code, issue.message)),
        }
    }
    let signer_name = r
        .signer_cert_pem
        .as_deref()
        .and_then(|pem_text| pem::parse(pem_text).ok())
        .and_then(|p| x509::parse_certificate(p.contents()).ok())
        .map(|c| c.subject)
        .unwrap_or_default();

    JsValidationResult {
        is_valid: r.is_valid(),
        field_name: r.field_name.clone(),
        signer_name,
        signing_time: r.signing_time.map(|t| t.to_rfc3339()),
        chain_trusted: r.chain_trusted,
        document_intact: r.document_intact,
        covers_current_revision: r.covers_current_revision,
        errors,
        warnings,
    }
}
