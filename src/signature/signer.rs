//! Signing half of the orchestrator (C12): placeholder reservation,
//! `SignerInfo` construction via an injected [`ExternalSigner`], optional
//! RFC 3161 timestamping, and final `/Contents` embedding.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cms::attrs::{build_signed_attributes, SignaturePolicyIdInput, SignedAttributesRequest};
use crate::cms::builder::assemble_signed_data;
use crate::cms::{self, SignerIdentifier};
use crate::config::SignatureOptions;
use crate::crypto::hash;
use crate::error::Result;
use crate::pdf::writer;
use crate::timestamp;
use crate::traits::{ExternalSigner, HttpTransport};
use crate::types::{
    ByteRange, ContentsRange, DocMdpPermission, FieldMdpAction, PdfObjectId, Rectangle, SignatureMeta, X509Certificate,
};

/// Output of `prepare_pdf`: the appended document (with a `/Contents`
/// placeholder) plus everything needed to build and embed the CMS.
#[derive(Debug, Clone)]
pub struct PreparedSignature {
    pub prepared_bytes: Vec<u8>,
    /// `Hash(ByteRange-covered bytes)` under `options.hash_algorithm`.
    pub content_digest: Vec<u8>,
    pub byte_range: ByteRange,
    pub contents: ContentsRange,
    pub field_object: PdfObjectId,
}

fn covered_bytes(pdf: &[u8], byte_range: &ByteRange) -> Vec<u8> {
    let mut out = Vec::with_capacity(byte_range.signed_length());
    out.extend_from_slice(&pdf[byte_range.s1..byte_range.s1 + byte_range.l1]);
    out.extend_from_slice(&pdf[byte_range.s2..byte_range.s2 + byte_range.l2]);
    out
}

/// Reserve a signature placeholder and compute the digest an
/// [`ExternalSigner`] (or a caller's own HSM/KMS integration) needs to act
/// on. Does not sign or embed anything itself.
#[allow(clippy::too_many_arguments)]
pub fn prepare_pdf(
    pdf: &[u8],
    page_object: PdfObjectId,
    bounds: Rectangle,
    meta: &SignatureMeta,
    options: &SignatureOptions,
    docmdp: Option<DocMdpPermission>,
    field_mdp: Option<&FieldMdpAction>,
) -> Result<PreparedSignature> {
    let prepared = writer::reserve_placeholder(pdf, page_object, bounds, meta, options, docmdp, field_mdp)?;
    let content_digest = hash(&covered_bytes(&prepared.bytes, &prepared.byte_range), options.hash_algorithm);
    Ok(PreparedSignature {
        prepared_bytes: prepared.bytes,
        content_digest,
        byte_range: prepared.byte_range,
        contents: prepared.contents,
        field_object: prepared.field_object,
    })
}

/// Everything identifying the signer and the certificate material to embed,
/// independent of the document being signed.
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    pub signer_certificate: &'a X509Certificate,
    pub chain_certs_der: &'a [Vec<u8>],
    pub sid: SignerIdentifier,
    pub signing_time: DateTime<Utc>,
    pub signature_policy: Option<SignaturePolicyIdInput>,
}

/// Build a `SignerIdentifier::IssuerAndSerialNumber` for `cert`, the
/// default per spec.md Sec 3's signer-identifier fallback chain.
pub fn issuer_and_serial_sid(cert: &X509Certificate) -> Result<SignerIdentifier> {
    Ok(SignerIdentifier::IssuerAndSerialNumber {
        issuer_der: crate::x509::issuer_name_der(&cert.der_data)?,
        serial: cert.serial_number.clone(),
    })
}

/// Build a `SignerIdentifier::SubjectKeyIdentifier` for `cert`, used when
/// the caller prefers it (e.g. the certificate has no usable issuer DN) or
/// the signer's SKI is already known from a prior exchange.
pub fn subject_key_identifier_sid(cert: &X509Certificate) -> Option<SignerIdentifier> {
    cert.subject_key_id.clone().map(SignerIdentifier::SubjectKeyIdentifier)
}

/// Build signed attributes, ask `external_signer` to sign them, and
/// assemble the final `ContentInfo`/`SignedData` DER. No timestamp token is
/// requested; use [`sign_and_timestamp`] for that.
pub async fn sign(
    content_digest: &[u8],
    request: &SigningRequest<'_>,
    options: &SignatureOptions,
    external_signer: &dyn ExternalSigner,
) -> Result<Vec<u8>> {
    let signer_cert_digest = hash(&request.signer_certificate.der_data, options.hash_algorithm);
    let attrs_req = SignedAttributesRequest {
        content_digest: content_digest.to_vec(),
        hash_algorithm: options.hash_algorithm,
        signing_time: request.signing_time,
        signer_certificate_digest: signer_cert_digest,
        signature_policy: request.signature_policy.clone(),
    };
    let signed_attrs = build_signed_attributes(&attrs_req)?;
    let signature = external_signer.sign(&signed_attrs.der_to_sign).await?;
    assemble_signed_data(
        &request.signer_certificate.der_data,
        request.chain_certs_der,
        &request.sid,
        options.hash_algorithm,
        options.signature_algorithm,
        &signed_attrs.der_to_sign,
        &signature,
        &[],
    )
}

/// Same as [`sign`], then requests an RFC 3161 token over the raw
/// `SignerInfo.signatureValue` from `tsa_url` and embeds it as the
/// `signatureTimeStampToken` unsigned attribute.
#[allow(clippy::too_many_arguments)]
pub async fn sign_and_timestamp(
    content_digest: &[u8],
    request: &SigningRequest<'_>,
    options: &SignatureOptions,
    external_signer: &dyn ExternalSigner,
    tsa_url: &str,
    tsa_trust_anchors: &[X509Certificate],
    transport: &dyn HttpTransport,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let signer_cert_digest = hash(&request.signer_certificate.der_data, options.hash_algorithm);
    let attrs_req = SignedAttributesRequest {
        content_digest: content_digest.to_vec(),
        hash_algorithm: options.hash_algorithm,
        signing_time: request.signing_time,
        signer_certificate_digest: signer_cert_digest,
        signature_policy: request.signature_policy.clone(),
    };
    let signed_attrs = build_signed_attributes(&attrs_req)?;
    let signature = external_signer.sign(&signed_attrs.der_to_sign).await?;

    let token = timestamp::request_and_verify(
        &signature,
        options.hash_algorithm,
        None,
        None,
        tsa_url,
        tsa_trust_anchors,
        Utc::now(),
        options.clock_skew,
        transport,
        timeout,
    )
    .await?;
    let token_attr = cms::attrs::encode_attribute(cms::OID_SIGNATURE_TIMESTAMP_TOKEN, token.der.clone())?;

    assemble_signed_data(
        &request.signer_certificate.der_data,
        request.chain_certs_der,
        &request.sid,
        options.hash_algorithm,
        options.signature_algorithm,
        &signed_attrs.der_to_sign,
        &signature,
        std::slice::from_ref(&token_attr),
    )
}

/// Splice the finished CMS into the reserved `/Contents` placeholder.
pub fn embed_signature(prepared: &PreparedSignature, cms_der: &[u8]) -> Result<Vec<u8>> {
    writer::embed_signature(&prepared.prepared_bytes, prepared.contents, cms_der)
}
