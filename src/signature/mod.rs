//! Digital signature orchestrator (C12): ties the PDF writer, CMS engine,
//! X.509 chain builder, revocation engine, timestamp engine, LTV manager,
//! and policy engine into the operations a caller actually needs —
//! preparing a placeholder, signing it, validating what's already there,
//! and a network-free inspection shortcut.

pub mod orchestrator;
pub mod report;
pub mod signer;
pub mod validator;

pub use orchestrator::{inspect_signatures, SignatureInspection};
pub use report::{
    DocMdpStatus, FieldMdpStatus, IssueLevel, LtvStatus, PolicyStatus, ReportIssue, RevocationSummary, SignatureReport,
    TimestampStatus,
};
pub use signer::{embed_signature, issuer_and_serial_sid, prepare_pdf, sign, sign_and_timestamp, PreparedSignature, SigningRequest};
pub use validator::validate_all_signatures;
