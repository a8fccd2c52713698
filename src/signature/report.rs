//! Aggregated per-signature validation outcome, the return type of
//! [`super::validator::validate_all_signatures`] and the thing
//! `napi_bindings` eventually projects into a `JsValidationResult`.

use chrono::{DateTime, Utc};

use crate::policy::IssueSeverity;
use crate::revocation::RevocationStatus;
use crate::types::{ByteRange, DocMdpPermission, FieldMdpAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warning,
    Error,
}

impl From<IssueSeverity> for IssueLevel {
    fn from(s: IssueSeverity) -> Self {
        match s {
            IssueSeverity::Warning => IssueLevel::Warning,
            IssueSeverity::Error => IssueLevel::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportIssue {
    pub code: String,
    pub message: String,
    pub level: IssueLevel,
}

impl ReportIssue {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), level: IssueLevel::Error }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), level: IssueLevel::Warning }
    }
}

#[derive(Debug, Clone)]
pub struct DocMdpStatus {
    pub is_certification: bool,
    pub permission: Option<DocMdpPermission>,
}

/// The `FieldMDP` sibling transform found (if any) in the signature's own
/// `/Reference` array — which fields it locks, as opposed to DocMDP's
/// whole-document permission level.
#[derive(Debug, Clone)]
pub struct FieldMdpStatus {
    pub action: FieldMdpAction,
}

/// Snapshot of the document's `/DSS` and this signature's `/VRI` entry, as
/// found rather than as required; `validate_all_signatures` does not itself
/// demand LTV material be present.
#[derive(Debug, Clone, Default)]
pub struct LtvStatus {
    pub has_dss: bool,
    pub signature_has_vri: bool,
    pub cert_count: usize,
    pub crl_count: usize,
    pub ocsp_count: usize,
}

#[derive(Debug, Clone)]
pub struct RevocationSummary {
    pub is_revoked: bool,
    pub status: Option<RevocationStatus>,
    pub details: String,
    pub source: Option<&'static str>,
}

impl RevocationSummary {
    pub fn unknown(details: impl Into<String>) -> Self {
        Self { is_revoked: false, status: None, details: details.into(), source: None }
    }

    pub fn from_status(status: RevocationStatus) -> Self {
        match &status {
            RevocationStatus::Good { source } => {
                Self { is_revoked: false, details: "good".to_string(), source: Some(source), status: Some(status) }
            }
            RevocationStatus::Revoked { reason, source, .. } => Self {
                is_revoked: true,
                details: reason.clone().unwrap_or_else(|| "revoked".to_string()),
                source: Some(source),
                status: Some(status),
            },
            RevocationStatus::Unknown { reason } => {
                Self { is_revoked: false, details: reason.clone(), source: None, status: Some(status) }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyStatus {
    pub oid: Option<String>,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TimestampStatus {
    pub present: bool,
    pub valid: bool,
    pub gen_time: Option<DateTime<Utc>>,
    pub imprint_ok: bool,
    pub token_signature_valid: bool,
    pub chain_trusted: bool,
    pub revocation: Option<RevocationSummary>,
}

/// Full validation outcome for a single signature field, sorted into the
/// returned `Vec` by ascending `ByteRange.signed_revision_length` (earliest
/// revision first) by the caller.
#[derive(Debug, Clone)]
pub struct SignatureReport {
    pub field_name: String,
    pub byte_range: ByteRange,
    pub covers_current_revision: bool,
    pub signing_time: Option<DateTime<Utc>>,
    pub policy_oid: Option<String>,
    pub cms_signature_valid: bool,
    pub byte_range_digest_ok: bool,
    pub document_intact: bool,
    pub signer_cert_pem: Option<String>,
    pub chain_certs_pem: Vec<String>,
    pub chain_trusted: bool,
    pub chain_errors: Vec<String>,
    pub doc_mdp: Option<DocMdpStatus>,
    pub field_mdp: Option<FieldMdpStatus>,
    pub ltv: LtvStatus,
    pub revocation: Option<RevocationSummary>,
    pub policy: Option<PolicyStatus>,
    pub timestamp: TimestampStatus,
    pub issues: Vec<ReportIssue>,
}

impl SignatureReport {
    /// True only when every hard check passed and no issue reached
    /// `IssueLevel::Error`; warnings (stale LPA, missing revocation
    /// evidence in non-strict mode, etc.) do not affect this.
    pub fn is_valid(&self) -> bool {
        self.cms_signature_valid
            && self.byte_range_digest_ok
            && self.document_intact
            && self.chain_trusted
            && !self.issues.iter().any(|i| i.level == IssueLevel::Error)
    }
}

pub(crate) fn der_to_pem(der: &[u8]) -> String {
    pem::encode(&pem::Pem::new("CERTIFICATE", der.to_vec()))
}
