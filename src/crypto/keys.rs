//! Loading private key / certificate material from PEM, PKCS#8, and
//! PKCS#12 containers for the crate's optional `ExternalSigner`
//! convenience implementation. The core signing path never requires this
//! module: a caller may supply any `ExternalSigner` backed by an HSM, KMS,
//! or smart card that never exposes key bytes to this process at all.

use std::io::Cursor;

use rustls_pemfile::{read_one, Item};

use async_trait::async_trait;

use crate::crypto::primitives::{hash, sign_prehashed};
use crate::error::{PdfSignError, Result};
use crate::traits::ExternalSigner;
use crate::types::{HashAlgorithm, KeyAlgorithm, PrivateKey, SignatureAlgorithm, SigningCredentials, X509Certificate};
use crate::x509::certificate::parse_certificate;

/// Parse a PEM certificate + PEM private key pair into `SigningCredentials`.
/// `password` decrypts PKCS#8-encrypted keys (`ENCRYPTED PRIVATE KEY`).
pub fn load_from_pem(cert_pem: &str, key_pem: &str, password: Option<&str>) -> Result<SigningCredentials> {
    let cert_der = first_certificate_der(cert_pem)?;
    let certificate = parse_certificate(&cert_der)?;
    let private_key = private_key_from_pem(key_pem, password)?;
    Ok(SigningCredentials {
        certificate,
        private_key,
        certificate_chain: Vec::new(),
    })
}

fn first_certificate_der(pem: &str) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(pem.as_bytes());
    loop {
        match read_one(&mut cursor)
            .map_err(|e| PdfSignError::certificate_parse(format!("malformed certificate PEM: {e}")))?
        {
            Some(Item::X509Certificate(der)) => return Ok(der.to_vec()),
            Some(_) => continue,
            None => {
                return Err(PdfSignError::certificate_parse(
                    "no X.509 certificate found in PEM input",
                ))
            }
        }
    }
}

fn private_key_from_pem(pem: &str, password: Option<&str>) -> Result<PrivateKey> {
    let mut cursor = Cursor::new(pem.as_bytes());
    loop {
        let item = read_one(&mut cursor)
            .map_err(|e| PdfSignError::invalid_key(format!("malformed private key PEM: {e}")))?
            .ok_or_else(|| PdfSignError::invalid_key("no private key found in PEM input"))?;
        match item {
            Item::Pkcs1Key(der) => {
                return Ok(rsa_private_key(der.secret_pkcs1_der().to_vec()));
            }
            Item::Pkcs8Key(der) => {
                return classify_pkcs8_key(der.secret_pkcs8_der().to_vec());
            }
            Item::Sec1Key(der) => {
                let der = der.secret_sec1_der().to_vec();
                let curve_oid = sec1_curve_oid(&der);
                return Ok(ecdsa_private_key(der, curve_oid));
            }
            Item::EncryptedKey(der) => {
                let password = password
                    .ok_or_else(PdfSignError::invalid_password)?;
                return decrypt_pkcs8_key(der.secret_encrypted_der(), password);
            }
            _ => continue,
        }
    }
}

fn decrypt_pkcs8_key(encrypted_der: &[u8], password: &str) -> Result<PrivateKey> {
    use pkcs8::{EncryptedPrivateKeyInfo, PrivateKeyInfo};

    let encrypted = EncryptedPrivateKeyInfo::try_from(encrypted_der)
        .map_err(|e| PdfSignError::invalid_key(format!("malformed encrypted PKCS#8 key: {e}")))?;
    let decrypted = encrypted
        .decrypt(password.as_bytes())
        .map_err(|_| PdfSignError::invalid_password())?;
    let info = PrivateKeyInfo::try_from(decrypted.as_bytes())
        .map_err(|e| PdfSignError::invalid_key(format!("malformed decrypted key: {e}")))?;
    classify_pkcs8_key(info.private_key.to_vec())
}

fn classify_pkcs8_key(pkcs8_der: Vec<u8>) -> Result<PrivateKey> {
    use const_oid::db::rfc5912::{ID_EC_PUBLIC_KEY, RSA_ENCRYPTION};
    use pkcs8::PrivateKeyInfo;

    let info = PrivateKeyInfo::try_from(pkcs8_der.as_slice())
        .map_err(|e| PdfSignError::invalid_key(format!("malformed PKCS#8 key: {e}")))?;
    if info.algorithm.oid == RSA_ENCRYPTION {
        Ok(rsa_private_key(info.private_key.to_vec()))
    } else if info.algorithm.oid == ID_EC_PUBLIC_KEY {
        // `parameters` carries the named-curve OID directly for EC keys
        // (no further wrapping), per RFC 5480's `ECParameters` choice.
        let curve_oid = info.algorithm.parameters.and_then(|any| any.decode_as::<const_oid::ObjectIdentifier>().ok());
        Ok(ecdsa_private_key(info.private_key.to_vec(), curve_oid))
    } else {
        Err(PdfSignError::unsupported_algorithm(format!(
            "private key algorithm OID {}",
            info.algorithm.oid
        )))
    }
}

/// Pull the `parameters [0] EXPLICIT ECParameters` named-curve OID out of a
/// SEC1 `ECPrivateKey`, when present, so a bare `-----BEGIN EC PRIVATE
/// KEY-----` PEM (no enclosing PKCS#8 `AlgorithmIdentifier`) can still be
/// classified as P-256 vs P-384 rather than assumed.
fn sec1_curve_oid(der: &[u8]) -> Option<const_oid::ObjectIdentifier> {
    use crate::asn1::{self, TAG_INTEGER, TAG_OCTET_STRING, TAG_OID, TAG_SEQUENCE};

    let outer = asn1::expect_tlv(der, 0, TAG_SEQUENCE).ok()?;
    let version = asn1::expect_tlv(der, outer.value_start, TAG_INTEGER).ok()?;
    let private_key = asn1::expect_tlv(der, version.value_start + version.length, TAG_OCTET_STRING).ok()?;
    let after_private_key = private_key.value_start + private_key.length;
    let end = outer.value_start + outer.length;
    if after_private_key >= end {
        return None;
    }
    let params = asn1::read_tlv(der, after_private_key).ok()?;
    if params.tag != 0xA0 {
        return None;
    }
    let oid_tlv = asn1::expect_tlv(der, params.value_start, TAG_OID).ok()?;
    const_oid::ObjectIdentifier::from_bytes(oid_tlv.value(der)).ok()
}

fn rsa_private_key(der_data: Vec<u8>) -> PrivateKey {
    PrivateKey {
        algorithm: KeyAlgorithm::Rsa,
        key_size: 0,
        der_data,
    }
}

/// `curve_oid`, when available, distinguishes P-256 (`1.2.840.10045.3.1.7`)
/// from P-384 (`1.3.132.0.34`); defaults to P-256 when absent (the
/// overwhelmingly common case for PEM-encoded ICP-Brasil/gov.br signing
/// keys, which are RSA or P-256).
fn ecdsa_private_key(der_data: Vec<u8>, curve_oid: Option<const_oid::ObjectIdentifier>) -> PrivateKey {
    const SECP256R1: const_oid::ObjectIdentifier = const_oid::ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
    const SECP384R1: const_oid::ObjectIdentifier = const_oid::ObjectIdentifier::new_unwrap("1.3.132.0.34");
    let algorithm = match curve_oid {
        Some(oid) if oid == SECP384R1 => KeyAlgorithm::EcdsaP384,
        Some(oid) if oid == SECP256R1 => KeyAlgorithm::EcdsaP256,
        _ => KeyAlgorithm::EcdsaP256,
    };
    let key_size = match algorithm {
        KeyAlgorithm::EcdsaP384 => 384,
        _ => 256,
    };
    PrivateKey { algorithm, key_size, der_data }
}

/// Extract the leaf certificate, full chain, and private key from a
/// PKCS#12 (`.p12`/`.pfx`) container.
pub fn load_from_pkcs12(p12_data: &[u8], password: &str) -> Result<SigningCredentials> {
    let pfx = p12::PFX::parse(p12_data)
        .map_err(|e| PdfSignError::certificate_parse(format!("malformed PKCS#12 container: {e:?}")))?;

    let cert_bags = pfx
        .cert_bags(password)
        .map_err(|_| PdfSignError::invalid_password())?;
    let key_bags = pfx
        .key_bags(password)
        .map_err(|_| PdfSignError::invalid_password())?;

    if cert_bags.is_empty() {
        return Err(PdfSignError::certificate_parse("PKCS#12 container has no certificates"));
    }
    if key_bags.is_empty() {
        return Err(PdfSignError::invalid_key("PKCS#12 container has no private key"));
    }

    let mut certs: Vec<X509Certificate> = Vec::with_capacity(cert_bags.len());
    for der in &cert_bags {
        certs.push(parse_certificate(der)?);
    }
    // Leaf is the certificate whose subject does not appear as another
    // certificate's issuer in the bag.
    let leaf_index = certs
        .iter()
        .position(|c| !certs.iter().any(|other| other.issuer == c.subject && other.subject != c.subject))
        .unwrap_or(0);
    let certificate = certs.remove(leaf_index);

    let private_key = classify_pkcs8_key(key_bags[0].clone())
        .or_else(|_| Ok::<_, PdfSignError>(rsa_private_key(key_bags[0].clone())))?;

    Ok(SigningCredentials {
        certificate,
        private_key,
        certificate_chain: certs,
    })
}

/// An [`ExternalSigner`] backed by a private key this process holds
/// directly. Used when the caller has no HSM/KMS/smart card integration
/// and is fine with the key living in process memory for the duration of
/// the signing call.
pub struct InProcessSigner {
    private_key: PrivateKey,
    hash_algorithm: HashAlgorithm,
    signature_algorithm: SignatureAlgorithm,
}

impl InProcessSigner {
    pub fn new(private_key: PrivateKey, hash_algorithm: HashAlgorithm, signature_algorithm: SignatureAlgorithm) -> Self {
        Self { private_key, hash_algorithm, signature_algorithm }
    }
}

#[async_trait]
impl ExternalSigner for InProcessSigner {
    fn declared_hash(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    async fn sign(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let digest = hash(bytes, self.hash_algorithm);
        sign_prehashed(&digest, &self.private_key, self.signature_algorithm)
    }
}
