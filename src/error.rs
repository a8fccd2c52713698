//! Error types for the PDF signing engine.

use thiserror::Error;

/// Numeric error codes for programmatic handling, grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Parse errors: malformed PDF / ASN.1 / DER / certificates
    PdfParse = 1001,
    Asn1Parse = 1002,
    CertificateParse = 1003,

    // Invariant violations in the signature dictionary / byte range
    ByteRangeInvalid = 1501,
    ContentsInvalid = 1502,
    PlaceholderTooSmall = 1503,

    // Cryptographic failures
    SignatureCreation = 2001,
    SignatureVerification = 2002,
    HashCalculation = 2003,
    UnsupportedAlgorithm = 2004,
    InvalidKey = 2005,
    InvalidPassword = 2006,

    // Chain / revocation
    ChainIncomplete = 3001,
    ChainUntrusted = 3002,
    Revoked = 3003,
    RevocationUnknown = 3004,

    // Timestamp
    TimestampInvalid = 4001,
    TimestampRequestFailed = 4002,

    // Policy
    PolicyViolation = 4501,

    // Network / cancellation
    NetworkFailure = 5001,
    Cancelled = 5002,

    // Not found
    ByteRangeNotFound = 5501,
    ContentsNotFound = 5502,
    SignatureDictionaryNotFound = 5503,

    // Configuration / caller input
    Configuration = 6001,

    // System
    Io = 7001,
    Resource = 7002,
    Concurrency = 7003,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", *self as u32)
    }
}

impl ErrorCode {
    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn category(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            PdfParse | Asn1Parse | CertificateParse => "ParseError",
            ByteRangeInvalid | ContentsInvalid | PlaceholderTooSmall => "InvariantViolated",
            SignatureCreation | SignatureVerification | HashCalculation
            | UnsupportedAlgorithm | InvalidKey | InvalidPassword => "CryptoFailure",
            ChainIncomplete | ChainUntrusted => "ChainError",
            Revoked | RevocationUnknown => "RevocationStatus",
            TimestampInvalid | TimestampRequestFailed => "TimestampInvalid",
            PolicyViolation => "PolicyViolation",
            NetworkFailure => "NetworkFailure",
            Cancelled => "Cancelled",
            ByteRangeNotFound | ContentsNotFound | SignatureDictionaryNotFound => "NotFound",
            Configuration => "Configuration",
            Io | Resource | Concurrency => "System",
        }
    }
}

/// Main error type for the PDF signing engine.
///
/// Variants map onto the report-level error kinds a caller sees in
/// validation output: parse errors, invariant violations, crypto failures,
/// chain/revocation/timestamp/policy problems, network failures, and
/// not-found/configuration errors.
#[derive(Error, Debug)]
pub enum PdfSignError {
    #[error("malformed PDF (code {code}): {message}")]
    PdfParse { message: String, code: ErrorCode },

    #[error("malformed ASN.1/DER (code {code}): {message}")]
    Asn1Parse { message: String, code: ErrorCode },

    #[error("malformed certificate (code {code}): {message}")]
    CertificateParse { message: String, code: ErrorCode },

    #[error("/ByteRange invariant violated (code {code}): {message}")]
    ByteRangeInvalid { message: String, code: ErrorCode },

    #[error("/Contents invariant violated (code {code}): {message}")]
    ContentsInvalid { message: String, code: ErrorCode },

    #[error("signature placeholder too small (code {code}): {message}")]
    PlaceholderTooSmall { message: String, code: ErrorCode },

    #[error("signature creation failed (code {code}): {message}")]
    SignatureCreation { message: String, code: ErrorCode },

    #[error("signature verification failed (code {code}): {message}")]
    SignatureVerification { message: String, code: ErrorCode },

    #[error("hash calculation failed (code {code}): {message}")]
    HashCalculation { message: String, code: ErrorCode },

    #[error("unsupported algorithm (code {code}): {algorithm}")]
    UnsupportedAlgorithm { algorithm: String, code: ErrorCode },

    #[error("invalid key material (code {code}): {message}")]
    InvalidKey { message: String, code: ErrorCode },

    #[error("invalid password for protected key material (code {code})")]
    InvalidPassword { code: ErrorCode },

    #[error("certificate chain incomplete (code {code}): {message}")]
    ChainIncomplete { message: String, code: ErrorCode },

    #[error("certificate chain not trusted (code {code}): {message}")]
    ChainUntrusted { message: String, code: ErrorCode },

    #[error("certificate revoked (code {code}): {details}")]
    Revoked { details: String, code: ErrorCode },

    #[error("revocation status unknown (code {code}): {reason}")]
    RevocationUnknown { reason: String, code: ErrorCode },

    #[error("timestamp token invalid (code {code}): {message}")]
    TimestampInvalid { message: String, code: ErrorCode },

    #[error("timestamp request failed (code {code}): {message}")]
    TimestampRequestFailed { message: String, code: ErrorCode },

    #[error("signature policy violation (code {code}): {message}")]
    PolicyViolation { message: String, code: ErrorCode },

    #[error("network operation failed (code {code}): {message}")]
    NetworkFailure { message: String, code: ErrorCode },

    #[error("operation cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("/ByteRange not found (code {code})")]
    ByteRangeNotFound { code: ErrorCode },

    #[error("/Contents not found (code {code})")]
    ContentsNotFound { code: ErrorCode },

    #[error("signature dictionary not found (code {code}): {message}")]
    SignatureDictionaryNotFound { message: String, code: ErrorCode },

    #[error("invalid configuration (code {code}): {message}")]
    Configuration { message: String, code: ErrorCode },

    #[error("I/O operation failed (code {code}): {message}")]
    Io { message: String, code: ErrorCode },

    #[error("resource allocation failed: {message}")]
    Resource { message: String },

    #[error("concurrency error: {message}")]
    Concurrency { message: String },
}

impl PdfSignError {
    pub fn error_code(&self) -> ErrorCode {
        use PdfSignError::*;
        match self {
            PdfParse { code, .. }
            | Asn1Parse { code, .. }
            | CertificateParse { code, .. }
            | ByteRangeInvalid { code, .. }
            | ContentsInvalid { code, .. }
            | PlaceholderTooSmall { code, .. }
            | SignatureCreation { code, .. }
            | SignatureVerification { code, .. }
            | HashCalculation { code, .. }
            | UnsupportedAlgorithm { code, .. }
            | InvalidKey { code, .. }
            | InvalidPassword { code }
            | ChainIncomplete { code, .. }
            | ChainUntrusted { code, .. }
            | Revoked { code, .. }
            | RevocationUnknown { code, .. }
            | TimestampInvalid { code, .. }
            | TimestampRequestFailed { code, .. }
            | PolicyViolation { code, .. }
            | NetworkFailure { code, .. }
            | ByteRangeNotFound { code }
            | ContentsNotFound { code }
            | SignatureDictionaryNotFound { code, .. }
            | Configuration { code, .. }
            | Io { code, .. } => *code,
            Cancelled { .. } => ErrorCode::Cancelled,
            Resource { .. } => ErrorCode::Resource,
            Concurrency { .. } => ErrorCode::Concurrency,
        }
    }

    pub fn category(&self) -> &'static str {
        self.error_code().category()
    }

    pub fn code(&self) -> u32 {
        self.error_code().code()
    }

    pub fn pdf_parse<S: Into<String>>(message: S) -> Self {
        PdfSignError::PdfParse { message: message.into(), code: ErrorCode::PdfParse }
    }

    pub fn asn1_parse<S: Into<String>>(message: S) -> Self {
        PdfSignError::Asn1Parse { message: message.into(), code: ErrorCode::Asn1Parse }
    }

    pub fn certificate_parse<S: Into<String>>(message: S) -> Self {
        PdfSignError::CertificateParse { message: message.into(), code: ErrorCode::CertificateParse }
    }

    pub fn byte_range_invalid<S: Into<String>>(message: S) -> Self {
        PdfSignError::ByteRangeInvalid { message: message.into(), code: ErrorCode::ByteRangeInvalid }
    }

    pub fn contents_invalid<S: Into<String>>(message: S) -> Self {
        PdfSignError::ContentsInvalid { message: message.into(), code: ErrorCode::ContentsInvalid }
    }

    pub fn placeholder_too_small<S: Into<String>>(message: S) -> Self {
        PdfSignError::PlaceholderTooSmall { message: message.into(), code: ErrorCode::PlaceholderTooSmall }
    }

    pub fn signature_creation<S: Into<String>>(message: S) -> Self {
        PdfSignError::SignatureCreation { message: message.into(), code: ErrorCode::SignatureCreation }
    }

    pub fn signature_verification<S: Into<String>>(message: S) -> Self {
        PdfSignError::SignatureVerification { message: message.into(), code: ErrorCode::SignatureVerification }
    }

    pub fn hash_calculation<S: Into<String>>(message: S) -> Self {
        PdfSignError::HashCalculation { message: message.into(), code: ErrorCode::HashCalculation }
    }

    pub fn unsupported_algorithm<S: Into<String>>(algorithm: S) -> Self {
        PdfSignError::UnsupportedAlgorithm { algorithm: algorithm.into(), code: ErrorCode::UnsupportedAlgorithm }
    }

    pub fn invalid_key<S: Into<String>>(message: S) -> Self {
        PdfSignError::InvalidKey { message: message.into(), code: ErrorCode::InvalidKey }
    }

    pub fn invalid_password() -> Self {
        PdfSignError::InvalidPassword { code: ErrorCode::InvalidPassword }
    }

    pub fn chain_incomplete<S: Into<String>>(message: S) -> Self {
        PdfSignError::ChainIncomplete { message: message.into(), code: ErrorCode::ChainIncomplete }
    }

    pub fn chain_untrusted<S: Into<String>>(message: S) -> Self {
        PdfSignError::ChainUntrusted { message: message.into(), code: ErrorCode::ChainUntrusted }
    }

    pub fn revoked<S: Into<String>>(details: S) -> Self {
        PdfSignError::Revoked { details: details.into(), code: ErrorCode::Revoked }
    }

    pub fn revocation_unknown<S: Into<String>>(reason: S) -> Self {
        PdfSignError::RevocationUnknown { reason: reason.into(), code: ErrorCode::RevocationUnknown }
    }

    pub fn timestamp_invalid<S: Into<String>>(message: S) -> Self {
        PdfSignError::TimestampInvalid { message: message.into(), code: ErrorCode::TimestampInvalid }
    }

    pub fn timestamp_request_failed<S: Into<String>>(message: S) -> Self {
        PdfSignError::TimestampRequestFailed { message: message.into(), code: ErrorCode::TimestampRequestFailed }
    }

    pub fn policy_violation<S: Into<String>>(message: S) -> Self {
        PdfSignError::PolicyViolation { message: message.into(), code: ErrorCode::PolicyViolation }
    }

    pub fn network_failure<S: Into<String>>(message: S) -> Self {
        PdfSignError::NetworkFailure { message: message.into(), code: ErrorCode::NetworkFailure }
    }

    pub fn cancelled<S: Into<String>>(reason: S) -> Self {
        PdfSignError::Cancelled { reason: reason.into() }
    }

    pub fn byte_range_not_found() -> Self {
        PdfSignError::ByteRangeNotFound { code: ErrorCode::ByteRangeNotFound }
    }

    pub fn contents_not_found() -> Self {
        PdfSignError::ContentsNotFound { code: ErrorCode::ContentsNotFound }
    }

    pub fn signature_dictionary_not_found<S: Into<String>>(message: S) -> Self {
        PdfSignError::SignatureDictionaryNotFound { message: message.into(), code: ErrorCode::SignatureDictionaryNotFound }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        PdfSignError::Configuration { message: message.into(), code: ErrorCode::Configuration }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        PdfSignError::Io { message: message.into(), code: ErrorCode::Io }
    }

    pub fn resource<S: Into<String>>(message: S) -> Self {
        PdfSignError::Resource { message: message.into() }
    }

    pub fn concurrency<S: Into<String>>(message: S) -> Self {
        PdfSignError::Concurrency { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, PdfSignError>;

impl From<std::io::Error> for PdfSignError {
    fn from(err: std::io::Error) -> Self {
        PdfSignError::io(format!("{err}"))
    }
}

impl From<der::Error> for PdfSignError {
    fn from(err: der::Error) -> Self {
        PdfSignError::asn1_parse(format!("DER decode error: {err}"))
    }
}

impl From<rsa::Error> for PdfSignError {
    fn from(err: rsa::Error) -> Self {
        PdfSignError::signature_creation(format!("RSA operation failed: {err}"))
    }
}

impl From<serde_json::Error> for PdfSignError {
    fn from(err: serde_json::Error) -> Self {
        PdfSignError::configuration(format!("JSON serialization failed: {err}"))
    }
}

impl From<PdfSignError> for napi::Error {
    fn from(err: PdfSignError) -> Self {
        napi::Error::new(
            napi::Status::GenericFailure,
            format!("{} (category: {}, code: {})", err, err.category(), err.code()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_expected_categories() {
        assert_eq!(ErrorCode::PdfParse.category(), "ParseError");
        assert_eq!(ErrorCode::Revoked.category(), "RevocationStatus");
        assert_eq!(ErrorCode::ChainUntrusted.category(), "ChainError");
        assert_eq!(ErrorCode::ByteRangeNotFound.category(), "NotFound");
    }

    #[test]
    fn constructors_carry_matching_error_code() {
        let err = PdfSignError::byte_range_invalid("range out of order");
        assert_eq!(err.error_code(), ErrorCode::ByteRangeInvalid);
        assert_eq!(err.code(), 1501);
    }

    #[test]
    fn cancelled_does_not_require_a_code_field() {
        let err = PdfSignError::cancelled("caller aborted");
        assert_eq!(err.error_code(), ErrorCode::Cancelled);
    }
}
