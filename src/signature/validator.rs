//! Validation half of the orchestrator (C12): runs the full per-signature
//! pipeline (ByteRange digest, CMS signature, chain, revocation,
//! timestamp, LTV, policy) and aggregates it into a [`SignatureReport`].

use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::asn1::{self, TAG_OCTET_STRING, TAG_OID, TAG_SEQUENCE};
use crate::cms::{self, ParsedCms};
use crate::config::SignatureOptions;
use crate::crypto::{hash, verify_with_declared_algorithm};
use crate::error::Result;
use crate::ltv;
use crate::pdf::xref;
use crate::pdf::{self, object::PdfObject, object::XRefTable};
use crate::policy::{self, Lpa};
use crate::revocation;
use crate::timestamp;
use crate::traits::HttpTransport;
use crate::types::{DocMdpPermission, HashAlgorithm, SignatureEntry, X509Certificate};
use crate::x509;

use super::report::{
    der_to_pem, DocMdpStatus, IssueLevel, LtvStatus, PolicyStatus, ReportIssue, RevocationSummary, SignatureReport,
    TimestampStatus,
};

const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

/// Validate every signature in `pdf`, earliest revision first (the order
/// [`pdf::extract_all_signatures`] already produces).
///
/// `transport` and `tsa_trust_anchors` are only consulted when
/// `options.fetch_network` is true; `lpa`, when supplied, drives the policy
/// evaluation step. None of these are required: a caller validating a
/// signature entirely offline gets `revocation: Unknown` and no policy
/// verdict rather than an error.
pub async fn validate_all_signatures(
    pdf: &[u8],
    trust_anchors: &[X509Certificate],
    tsa_trust_anchors: &[X509Certificate],
    options: &SignatureOptions,
    transport: Option<&dyn HttpTransport>,
    lpa: Option<&Lpa>,
    at_time: DateTime<Utc>,
) -> Result<Vec<SignatureReport>> {
    let entries = pdf::extract_all_signatures(pdf)?;
    let table = xref::load_xref_chain(pdf).ok();

    let mut reports = Vec::with_capacity(entries.len());
    for entry in &entries {
        reports.push(validate_one(pdf, entry, table.as_ref(), trust_anchors, tsa_trust_anchors, options, transport, lpa, at_time).await);
    }
    Ok(reports)
}

#[allow(clippy::too_many_arguments)]
async fn validate_one(
    pdf: &[u8],
    entry: &SignatureEntry,
    table: Option<&XRefTable>,
    trust_anchors: &[X509Certificate],
    tsa_trust_anchors: &[X509Certificate],
    options: &SignatureOptions,
    transport: Option<&dyn HttpTransport>,
    lpa: Option<&Lpa>,
    at_time: DateTime<Utc>,
) -> SignatureReport {
    let mut issues = Vec::new();
    let covers_current_revision = entry.byte_range.covers_whole_document(pdf.len());
    let well_formed = entry.byte_range.is_well_formed(pdf.len());
    if !well_formed {
        issues.push(ReportIssue::error("byte_range_malformed", "ByteRange does not fit inside the document"));
    }

    let parsed = match cms::parse_signed_data(&entry.contents_der) {
        Ok(p) => p,
        Err(e) => {
            issues.push(ReportIssue::error("cms_parse_failed", e.to_string()));
            return empty_report(entry, covers_current_revision, issues);
        }
    };

    let byte_range_digest_ok = check_byte_range_digest(pdf, entry, &parsed, &mut issues);
    let cms_signature_valid = check_cms_signature(&parsed, &mut issues);

    let candidates: Vec<X509Certificate> = parsed
        .certificates
        .iter()
        .filter_map(|der| x509::parse_certificate(der).ok())
        .collect();

    let signer_cert = cms::select_signer_certificate(&candidates, &parsed.signer_info).ok();
    if signer_cert.is_none() {
        issues.push(ReportIssue::error("signer_certificate_not_found", "could not identify the signer certificate"));
    }

    let (chain_trusted, chain_errors, chain) = match &signer_cert {
        Some(signer) => match x509::build_chain(signer, &candidates, trust_anchors) {
            Ok(chain) => {
                let verification = x509::verify_chain(&chain, trust_anchors, at_time, options.clock_skew);
                (verification.trusted, verification.errors, chain)
            }
            Err(e) => (false, vec![e.to_string()], vec![signer.clone()]),
        },
        None => (false, vec!["no signer certificate".to_string()], Vec::new()),
    };
    if !chain_trusted {
        for e in &chain_errors {
            issues.push(ReportIssue::warning("chain_not_trusted", e.clone()));
        }
    }

    let revocation_summary = if options.fetch_network {
        if let Some(transport) = transport {
            if chain.len() > 1 {
                let report = revocation::check_chain_revocation(
                    &chain,
                    trust_anchors,
                    at_time,
                    options.clock_skew,
                    transport,
                    options.strict_revocation,
                    DEFAULT_NETWORK_TIMEOUT,
                )
                .await;
                let leaf_status = report.per_certificate.first().map(|(_, s)| s.clone());
                match leaf_status {
                    Some(status) => {
                        if matches!(status, crate::revocation::RevocationStatus::Revoked { .. }) {
                            issues.push(ReportIssue::error("certificate_revoked", "signer certificate is revoked"));
                        }
                        Some(RevocationSummary::from_status(status))
                    }
                    None => Some(RevocationSummary::unknown("signer certificate is a trust anchor or self-signed")),
                }
            } else {
                Some(RevocationSummary::unknown("no issuer available to check revocation against"))
            }
        } else {
            None
        }
    } else {
        None
    };

    let signing_time = signed_attr_time(&parsed, cms::OID_SIGNING_TIME);
    let policy_attr = signed_policy_oid(&parsed);

    let policy_status = policy_attr.as_ref().and_then(|(oid, digest)| {
        lpa.map(|lpa| evaluate_policy(lpa, oid, digest.as_ref(), signing_time.unwrap_or(at_time), options.strict_policy_digest))
    });
    if let Some(status) = &policy_status {
        for e in &status.errors {
            issues.push(ReportIssue::error("policy_violation", e.clone()));
        }
        for w in &status.warnings {
            issues.push(ReportIssue::warning("policy_warning", w.clone()));
        }
    }

    let timestamp_status = check_timestamp(&parsed, tsa_trust_anchors, transport, options, at_time, &mut issues).await;
    if policy_attr.is_some() && !timestamp_status.present {
        issues.push(ReportIssue::warning("timestamp_missing", "signature carries a signature policy but no RFC 3161 timestamp token is embedded"));
    }

    let doc_mdp = table
        .and_then(|table| doc_mdp_status(pdf, table, entry.signature_ref));
    let field_mdp = table
        .and_then(|table| field_mdp_status(pdf, table, entry.signature_ref));
    let ltv = table
        .map(|table| ltv_status(pdf, table, entry))
        .unwrap_or_default();

    let document_intact = cms_signature_valid && byte_range_digest_ok;

    SignatureReport {
        field_name: entry.field_name.clone(),
        byte_range: entry.byte_range,
        covers_current_revision,
        signing_time,
        policy_oid: policy_attr.map(|(oid, _)| oid),
        cms_signature_valid,
        byte_range_digest_ok,
        document_intact,
        signer_cert_pem: signer_cert.as_ref().map(|c| der_to_pem(&c.der_data)),
        chain_certs_pem: chain.iter().map(|c| der_to_pem(&c.der_data)).collect(),
        chain_trusted,
        chain_errors,
        doc_mdp,
        field_mdp,
        ltv,
        revocation: revocation_summary,
        policy: policy_status,
        timestamp: timestamp_status,
        issues,
    }
}

fn empty_report(entry: &SignatureEntry, covers_current_revision: bool, issues: Vec<ReportIssue>) -> SignatureReport {
    SignatureReport {
        field_name: entry.field_name.clone(),
        byte_range: entry.byte_range,
        covers_current_revision,
        signing_time: None,
        policy_oid: None,
        cms_signature_valid: false,
        byte_range_digest_ok: false,
        document_intact: false,
        signer_cert_pem: None,
        chain_certs_pem: Vec::new(),
        chain_trusted: false,
        chain_errors: Vec::new(),
        doc_mdp: None,
        field_mdp: None,
        ltv: LtvStatus::default(),
        revocation: None,
        policy: None,
        timestamp: TimestampStatus::default(),
        issues,
    }
}

fn check_byte_range_digest(pdf: &[u8], entry: &SignatureEntry, parsed: &ParsedCms, issues: &mut Vec<ReportIssue>) -> bool {
    if !entry.byte_range.is_well_formed(pdf.len()) {
        return false;
    }
    let mut covered = Vec::with_capacity(entry.byte_range.signed_length());
    covered.extend_from_slice(&pdf[entry.byte_range.s1..entry.byte_range.s1 + entry.byte_range.l1]);
    covered.extend_from_slice(&pdf[entry.byte_range.s2..entry.byte_range.s2 + entry.byte_range.l2]);

    let Some(declared) = parsed.signer_info.find_signed_attr(cms::OID_MESSAGE_DIGEST).and_then(|a| a.single_value()) else {
        issues.push(ReportIssue::error("message_digest_missing", "signedAttrs has no messageDigest"));
        return false;
    };
    let computed = hash(&covered, parsed.signer_info.digest_algorithm);
    if computed.as_slice() != declared {
        issues.push(ReportIssue::error("byte_range_digest_mismatch", "document digest does not match messageDigest"));
        return false;
    }
    true
}

fn check_cms_signature(parsed: &ParsedCms, issues: &mut Vec<ReportIssue>) -> bool {
    let candidates: Vec<X509Certificate> = parsed
        .certificates
        .iter()
        .filter_map(|der| x509::parse_certificate(der).ok())
        .collect();
    let Ok(signer) = cms::select_signer_certificate(&candidates, &parsed.signer_info) else {
        return false;
    };
    let verified = parsed.signer_info.signed_attrs_verify_candidates.iter().any(|buf| {
        verify_with_declared_algorithm(
            buf,
            &parsed.signer_info.signature,
            &signer.public_key,
            parsed.signer_info.signature_algorithm.digest_algorithm(),
        )
        .unwrap_or(false)
    });
    if !verified {
        issues.push(ReportIssue::error("cms_signature_invalid", "CMS signature does not verify against the signer certificate"));
    }
    verified
}

fn signed_attr_time(parsed: &ParsedCms, oid: &str) -> Option<DateTime<Utc>> {
    let value = parsed.signer_info.find_signed_attr(oid)?.single_value()?;
    let tlv = asn1::read_tlv(value, 0).ok()?;
    asn1::time::decode_time(tlv.tag, tlv.value(value)).ok()
}

/// Decode the `SignaturePolicyId` signed attribute value, if present,
/// returning its OID and optional `(hashAlgorithm, hashValue)` digest.
fn signed_policy_oid(parsed: &ParsedCms) -> Option<(String, Option<(HashAlgorithm, Vec<u8>)>)> {
    let value = parsed.signer_info.find_signed_attr(cms::OID_SIGNATURE_POLICY_ID)?.single_value()?;
    let outer = asn1::expect_tlv(value, 0, TAG_SEQUENCE).ok()?;
    let oid_tlv = asn1::expect_tlv(value, outer.value_start, TAG_OID).ok()?;
    let oid = asn1::oid::decode(oid_tlv.value(value)).ok()?;
    let after = oid_tlv.value_start + oid_tlv.length;
    let end = outer.value_start + outer.length;
    let digest = if after < end {
        let hash_seq = asn1::expect_tlv(value, after, TAG_SEQUENCE).ok()?;
        let alg_tlv = asn1::expect_tlv(value, hash_seq.value_start, TAG_OID).ok()?;
        let algorithm = cms::hash_algorithm_from_oid(&asn1::oid::decode(alg_tlv.value(value)).ok()?).ok()?;
        let hash_pos = alg_tlv.value_start + alg_tlv.length;
        let hash_tlv = asn1::expect_tlv(value, hash_pos, TAG_OCTET_STRING).ok()?;
        Some((algorithm, hash_tlv.value(value).to_vec()))
    } else {
        None
    };
    Some((oid, digest))
}

fn evaluate_policy(
    lpa: &Lpa,
    oid: &str,
    digest: Option<&(HashAlgorithm, Vec<u8>)>,
    at_time: DateTime<Utc>,
    strict_digest: bool,
) -> PolicyStatus {
    let eval = policy::validate_policy_with_digest(
        lpa,
        oid,
        at_time,
        digest.map(|(algorithm, value)| (*algorithm, value.as_slice())),
        strict_digest,
    );
    let mut status = PolicyStatus { oid: Some(eval.oid.clone()), valid: eval.valid, errors: Vec::new(), warnings: Vec::new() };
    for issue in eval.issues {
        match IssueLevel::from(issue.severity) {
            IssueLevel::Error => status.errors.push(issue.message),
            IssueLevel::Warning => status.warnings.push(issue.message),
        }
    }
    status
}

async fn check_timestamp(
    parsed: &ParsedCms,
    tsa_trust_anchors: &[X509Certificate],
    transport: Option<&dyn HttpTransport>,
    options: &SignatureOptions,
    at_time: DateTime<Utc>,
    issues: &mut Vec<ReportIssue>,
) -> TimestampStatus {
    let Some(token_der) = parsed
        .signer_info
        .find_unsigned_attr(cms::OID_SIGNATURE_TIMESTAMP_TOKEN)
        .and_then(|a| a.single_value())
    else {
        return TimestampStatus::default();
    };

    let Ok(declared_hash) = timestamp::declared_hash_algorithm(token_der) else {
        issues.push(ReportIssue::error("timestamp_malformed", "could not parse timestamp token"));
        return TimestampStatus { present: true, ..TimestampStatus::default() };
    };

    match timestamp::verify_token(
        token_der,
        &parsed.signer_info.signature,
        declared_hash,
        None,
        tsa_trust_anchors,
        at_time,
        options.clock_skew,
    ) {
        Ok(token) => {
            let mut status = TimestampStatus {
                present: true,
                valid: true,
                gen_time: Some(token.tst_info.gen_time),
                imprint_ok: true,
                token_signature_valid: true,
                chain_trusted: !tsa_trust_anchors.is_empty(),
                revocation: None,
            };
            if let (Some(transport), true) = (transport, options.fetch_network) {
                if let Ok(signer) = cms::select_signer_certificate(&token.tsa_certificates, &parsed.signer_info) {
                    if let Ok(chain) = x509::build_chain(&signer, &token.tsa_certificates, tsa_trust_anchors) {
                        if chain.len() > 1 {
                            let report = revocation::check_chain_revocation(
                                &chain,
                                tsa_trust_anchors,
                                at_time,
                                options.clock_skew,
                                transport,
                                options.strict_revocation,
                                DEFAULT_NETWORK_TIMEOUT,
                            )
                            .await;
                            status.revocation = report.per_certificate.first().map(|(_, s)| RevocationSummary::from_status(s.clone()));
                        }
                    }
                }
            }
            status
        }
        Err(e) => {
            issues.push(ReportIssue::warning("timestamp_invalid", e.to_string()));
            TimestampStatus { present: true, ..TimestampStatus::default() }
        }
    }
}

/// Resolve a signature dictionary's own `/Reference` array, each entry
/// dereferenced to its dictionary. Shared by the DocMDP and FieldMDP lookups
/// below, since PAdES certification signatures can carry both in the same
/// array (SPEC_FULL.md §B).
fn reference_entries(pdf: &[u8], table: &XRefTable, signature_ref: crate::types::PdfObjectId) -> Vec<Rc<PdfObject>> {
    let Ok(sig_obj) = xref::load_object(pdf, table, signature_ref) else { return Vec::new() };
    let Some(sig_dict) = sig_obj.as_dict() else { return Vec::new() };
    let Some(reference_array) = sig_dict.get("Reference").and_then(|o| xref::dereference(pdf, table, o).ok()) else {
        return Vec::new();
    };
    let Some(items) = reference_array.as_array() else { return Vec::new() };
    items.iter().filter_map(|entry| xref::dereference(pdf, table, entry).ok()).collect()
}

fn doc_mdp_status(pdf: &[u8], table: &XRefTable, signature_ref: crate::types::PdfObjectId) -> Option<DocMdpStatus> {
    let root_ref = table.trailer.get("Root")?.clone();
    let root = xref::dereference(pdf, table, &root_ref).ok()?;
    let root_dict = root.as_dict()?;

    let perms_obj = root_dict.get("Perms")?;
    let perms = xref::dereference(pdf, table, perms_obj).ok()?;
    let perms_dict = perms.as_dict()?;
    let docmdp_ref = perms_dict.get("DocMDP")?.as_ref_id()?;
    if docmdp_ref != signature_ref {
        return Some(DocMdpStatus { is_certification: false, permission: None });
    }

    let docmdp_entry = reference_entries(pdf, table, signature_ref).into_iter().find(|entry| {
        entry.as_dict().and_then(|d| d.get("TransformMethod")).and_then(|o| o.as_name()) == Some("DocMDP")
    })?;
    let transform_params = docmdp_entry
        .as_dict()?
        .get("TransformParams")
        .and_then(|o| xref::dereference(pdf, table, o).ok())?;
    let p_value = transform_params.as_dict()?.get("P").and_then(|o| o.as_number());

    let permission = p_value.map(|p| match p as i64 {
        1 => DocMdpPermission::NoChangesAllowed,
        2 => DocMdpPermission::FormFillAndSign,
        _ => DocMdpPermission::FormFillSignAndAnnotate,
    });

    Some(DocMdpStatus { is_certification: true, permission })
}

fn field_mdp_status(pdf: &[u8], table: &XRefTable, signature_ref: crate::types::PdfObjectId) -> Option<super::report::FieldMdpStatus> {
    let fieldmdp_entry = reference_entries(pdf, table, signature_ref).into_iter().find(|entry| {
        entry.as_dict().and_then(|d| d.get("TransformMethod")).and_then(|o| o.as_name()) == Some("FieldMDP")
    })?;
    let transform_params = fieldmdp_entry
        .as_dict()?
        .get("TransformParams")
        .and_then(|o| xref::dereference(pdf, table, o).ok())?;
    let params_dict = transform_params.as_dict()?;
    let action_name = params_dict.get("Action").and_then(|o| o.as_name())?;
    let fields: Vec<String> = params_dict
        .get("Fields")
        .and_then(|o| xref::dereference(pdf, table, o).ok())
        .and_then(|f| f.as_array().map(|a| a.to_vec()))
        .unwrap_or_default()
        .iter()
        .filter_map(|item| match item.as_ref() {
            PdfObject::String(bytes, _) => String::from_utf8(bytes.clone()).ok(),
            _ => None,
        })
        .collect();

    let action = match action_name {
        "Include" => crate::types::FieldMdpAction::Include(fields),
        "Exclude" => crate::types::FieldMdpAction::Exclude(fields),
        _ => crate::types::FieldMdpAction::All,
    };
    Some(super::report::FieldMdpStatus { action })
}

fn ltv_status(pdf: &[u8], table: &XRefTable, entry: &SignatureEntry) -> LtvStatus {
    let Some(root_ref) = table.trailer.get("Root").cloned() else { return LtvStatus::default() };
    let Ok(root) = xref::dereference(pdf, table, &root_ref) else { return LtvStatus::default() };
    let Some(root_dict) = root.as_dict() else { return LtvStatus::default() };
    let Some(dss_obj) = root_dict.get("DSS") else { return LtvStatus::default() };
    let Ok(dss) = xref::dereference(pdf, table, dss_obj) else { return LtvStatus::default() };
    let Some(dss_dict) = dss.as_dict() else { return LtvStatus::default() };

    let count = |key: &str| -> usize {
        dss_dict
            .get(key)
            .and_then(|o| xref::dereference(pdf, table, o).ok())
            .and_then(|o| o.as_array().map(|a| a.len()))
            .unwrap_or(0)
    };

    let vri_key = ltv::vri_key(&entry.contents_der);
    let signature_has_vri = dss_dict
        .get("VRI")
        .and_then(|o| xref::dereference(pdf, table, o).ok())
        .and_then(|o| o.as_dict().cloned())
        .map(|vri| vri.contains_key(&vri_key))
        .unwrap_or(false);

    LtvStatus {
        has_dss: true,
        signature_has_vri,
        cert_count: count("Certs"),
        crl_count: count("CRLs"),
        ocsp_count: count("OCSPs"),
    }
}
