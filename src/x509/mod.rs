//! X.509 certificate model (C4) and chain builder/validator (C7).

pub mod certificate;
pub mod chain;

pub use certificate::parse_certificate;
pub use chain::{build_chain, verify_chain, ChainVerificationResult};

use chrono::{DateTime, Utc};
use der::Encode;
use x509_cert::time::Time;
use x509_cert::Certificate;

use crate::error::{PdfSignError, Result};
use crate::types::HashAlgorithm;

pub(crate) fn asn1_time_to_chrono(time: &Time) -> Result<DateTime<Utc>> {
    let unix = time.to_unix_duration();
    DateTime::from_timestamp(unix.as_secs() as i64, 0)
        .ok_or_else(|| PdfSignError::certificate_parse("certificate validity time out of range"))
}

/// Re-derive, from a certificate's own DER, the exact TBSCertificate bytes
/// that were signed, the raw signature value, and the digest algorithm the
/// declared `signatureAlgorithm` implies. Needed because `verify_chain`
/// must verify against precisely the bytes the issuer signed, not a
/// re-encoding of the structured fields (which DER does not guarantee to
/// round-trip byte-for-byte, e.g. under alternate but valid encodings).
pub(crate) fn certificate_signature_input(der_data: &[u8]) -> Result<(Vec<u8>, Vec<u8>, HashAlgorithm)> {
    use der::Decode;
    let cert = Certificate::from_der(der_data)
        .map_err(|e| PdfSignError::certificate_parse(format!("malformed X.509 certificate: {e}")))?;
    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| PdfSignError::certificate_parse(format!("could not re-encode TBSCertificate: {e}")))?;
    let signature = cert
        .signature
        .as_bytes()
        .ok_or_else(|| PdfSignError::certificate_parse("signature BIT STRING is not byte-aligned"))?
        .to_vec();
    let oid = cert.signature_algorithm.oid.to_string();
    let hash_alg = match oid.as_str() {
        "1.2.840.113549.1.1.5" | "1.2.840.10045.4.1" => HashAlgorithm::Sha1,
        "1.2.840.113549.1.1.11" | "1.2.840.10045.4.3.2" => HashAlgorithm::Sha256,
        "1.2.840.113549.1.1.12" | "1.2.840.10045.4.3.3" => HashAlgorithm::Sha384,
        "1.2.840.113549.1.1.13" | "1.2.840.10045.4.3.4" => HashAlgorithm::Sha512,
        other => {
            return Err(PdfSignError::unsupported_algorithm(format!(
                "certificate signatureAlgorithm OID {other}"
            )))
        }
    };
    Ok((tbs_der, signature, hash_alg))
}

/// Raw DER of the certificate's `issuer` `Name`, for building an
/// `IssuerAndSerialNumber` `SignerIdentifier` whose issuer bytes must match
/// what a relying party recovers from the same certificate.
pub(crate) fn issuer_name_der(der_data: &[u8]) -> Result<Vec<u8>> {
    use der::Decode;
    let cert = Certificate::from_der(der_data)
        .map_err(|e| PdfSignError::certificate_parse(format!("malformed X.509 certificate: {e}")))?;
    cert.tbs_certificate
        .issuer
        .to_der()
        .map_err(|e| PdfSignError::certificate_parse(format!("could not encode issuer Name: {e}")))
}

/// Raw DER of the certificate's own `subject` `Name`, used to compute
/// `CertID.issuerNameHash` when this certificate is the issuer of another.
pub(crate) fn subject_name_der(der_data: &[u8]) -> Result<Vec<u8>> {
    use der::Decode;
    let cert = Certificate::from_der(der_data)
        .map_err(|e| PdfSignError::certificate_parse(format!("malformed X.509 certificate: {e}")))?;
    cert.tbs_certificate
        .subject
        .to_der()
        .map_err(|e| PdfSignError::certificate_parse(format!("could not encode subject Name: {e}")))
}
