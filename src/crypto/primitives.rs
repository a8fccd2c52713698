//! Cryptographic primitives (C5): hashing, RSA and ECDSA verify/sign.
//!
//! Every operation here works on an already-computed digest or raw bytes;
//! none of it knows about PDF or CMS structure. `sign_prehashed` exists for
//! the crate's own optional `ExternalSigner` convenience implementation —
//! the core signing path never requires it, since a caller-supplied signer
//! may be an HSM, KMS, or smart card that performs the private-key
//! operation out of process.

use der::Decode;
use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::pkcs1v15::{Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey};
use rsa::signature::hazmat::{PrehashSigner as RsaPrehashSigner, PrehashVerifier as RsaPrehashVerifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{PdfSignError, Result};
use crate::types::{HashAlgorithm, KeyAlgorithm, PrivateKey, PublicKey, SignatureAlgorithm};

/// Compute `Hash(data)` for the given algorithm.
pub fn hash(data: &[u8], algorithm: HashAlgorithm) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

fn rsa_private_key_from_der(der_data: &[u8]) -> Result<RsaPrivateKey> {
    use rsa::pkcs8::DecodePrivateKey;
    RsaPrivateKey::from_pkcs8_der(der_data)
        .or_else(|_| {
            use rsa::pkcs1::DecodeRsaPrivateKey;
            RsaPrivateKey::from_pkcs1_der(der_data)
        })
        .map_err(|e| PdfSignError::invalid_key(format!("malformed RSA private key: {e}")))
}

fn rsa_public_key_from_der(der_data: &[u8]) -> Result<RsaPublicKey> {
    use rsa::pkcs8::DecodePublicKey;
    RsaPublicKey::from_public_key_der(der_data)
        .or_else(|_| {
            use rsa::pkcs1::DecodeRsaPublicKey;
            RsaPublicKey::from_pkcs1_der(der_data)
        })
        .map_err(|e| PdfSignError::invalid_key(format!("malformed RSA public key: {e}")))
}

/// Sign a pre-computed digest with the given private key and algorithm.
/// Returns the raw signature value (no ASN.1 wrapping beyond what the
/// scheme itself requires, e.g. ECDSA's `SEQUENCE { r, s }`).
pub fn sign_prehashed(digest: &[u8], key: &PrivateKey, algorithm: SignatureAlgorithm) -> Result<Vec<u8>> {
    match (key.algorithm, algorithm) {
        (KeyAlgorithm::Rsa, SignatureAlgorithm::RsaPkcs1Sha256) => {
            let private = rsa_private_key_from_der(&key.der_data)?;
            let signing_key = RsaSigningKey::<Sha256>::new(private);
            let sig: RsaSignature = RsaPrehashSigner::sign_prehash(&signing_key, digest)
                .map_err(|e| PdfSignError::signature_creation(format!("RSA sign failed: {e}")))?;
            Ok(sig.to_vec())
        }
        (KeyAlgorithm::Rsa, SignatureAlgorithm::RsaPkcs1Sha384) => {
            let private = rsa_private_key_from_der(&key.der_data)?;
            let signing_key = RsaSigningKey::<Sha384>::new(private);
            let sig: RsaSignature = RsaPrehashSigner::sign_prehash(&signing_key, digest)
                .map_err(|e| PdfSignError::signature_creation(format!("RSA sign failed: {e}")))?;
            Ok(sig.to_vec())
        }
        (KeyAlgorithm::Rsa, SignatureAlgorithm::RsaPkcs1Sha512) => {
            let private = rsa_private_key_from_der(&key.der_data)?;
            let signing_key = RsaSigningKey::<Sha512>::new(private);
            let sig: RsaSignature = RsaPrehashSigner::sign_prehash(&signing_key, digest)
                .map_err(|e| PdfSignError::signature_creation(format!("RSA sign failed: {e}")))?;
            Ok(sig.to_vec())
        }
        (KeyAlgorithm::EcdsaP256, SignatureAlgorithm::EcdsaP256Sha256) => {
            let secret = p256::SecretKey::from_sec1_der(&key.der_data)
                .map_err(|e| PdfSignError::invalid_key(format!("malformed P-256 key: {e}")))?;
            let signing_key = p256::ecdsa::SigningKey::from(secret);
            let sig: p256::ecdsa::Signature = signing_key
                .sign_prehash(digest)
                .map_err(|e| PdfSignError::signature_creation(format!("ECDSA sign failed: {e}")))?;
            Ok(sig.to_der().as_bytes().to_vec())
        }
        (KeyAlgorithm::EcdsaP384, SignatureAlgorithm::EcdsaP384Sha384) => {
            let secret = p384::SecretKey::from_sec1_der(&key.der_data)
                .map_err(|e| PdfSignError::invalid_key(format!("malformed P-384 key: {e}")))?;
            let signing_key = p384::ecdsa::SigningKey::from(secret);
            let sig: p384::ecdsa::Signature = signing_key
                .sign_prehash(digest)
                .map_err(|e| PdfSignError::signature_creation(format!("ECDSA sign failed: {e}")))?;
            Ok(sig.to_der().as_bytes().to_vec())
        }
        _ => Err(PdfSignError::unsupported_algorithm(format!(
            "{:?} key with {:?} signature algorithm",
            key.algorithm, algorithm
        ))),
    }
}

/// Verify `signature` over `digest` using `public_key`. Returns `Ok(false)`
/// (never an error) for a structurally valid but cryptographically
/// incorrect signature; errors are reserved for malformed key/signature
/// material.
pub fn verify_prehashed(
    digest: &[u8],
    signature: &[u8],
    public_key: &PublicKey,
    algorithm: SignatureAlgorithm,
) -> Result<bool> {
    match (public_key.algorithm, algorithm) {
        (KeyAlgorithm::Rsa, SignatureAlgorithm::RsaPkcs1Sha256) => {
            let key = rsa_public_key_from_der(&public_key.der_data)?;
            let verifying_key = RsaVerifyingKey::<Sha256>::new(key);
            let Ok(sig) = RsaSignature::try_from(signature) else { return Ok(false) };
            Ok(RsaPrehashVerifier::verify_prehash(&verifying_key, digest, &sig).is_ok())
        }
        (KeyAlgorithm::Rsa, SignatureAlgorithm::RsaPkcs1Sha384) => {
            let key = rsa_public_key_from_der(&public_key.der_data)?;
            let verifying_key = RsaVerifyingKey::<Sha384>::new(key);
            let Ok(sig) = RsaSignature::try_from(signature) else { return Ok(false) };
            Ok(RsaPrehashVerifier::verify_prehash(&verifying_key, digest, &sig).is_ok())
        }
        (KeyAlgorithm::Rsa, SignatureAlgorithm::RsaPkcs1Sha512) => {
            let key = rsa_public_key_from_der(&public_key.der_data)?;
            let verifying_key = RsaVerifyingKey::<Sha512>::new(key);
            let Ok(sig) = RsaSignature::try_from(signature) else { return Ok(false) };
            Ok(RsaPrehashVerifier::verify_prehash(&verifying_key, digest, &sig).is_ok())
        }
        (KeyAlgorithm::EcdsaP256, SignatureAlgorithm::EcdsaP256Sha256) => {
            let verifying_key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&public_key.der_data)
                .map_err(|e| PdfSignError::invalid_key(format!("malformed P-256 public key: {e}")))?;
            let sig = p256::ecdsa::Signature::from_der(signature)
                .map_err(|e| PdfSignError::signature_verification(format!("malformed ECDSA signature: {e}")))?;
            Ok(verifying_key.verify_prehash(digest, &sig).is_ok())
        }
        (KeyAlgorithm::EcdsaP384, SignatureAlgorithm::EcdsaP384Sha384) => {
            let verifying_key = p384::ecdsa::VerifyingKey::from_sec1_bytes(&public_key.der_data)
                .map_err(|e| PdfSignError::invalid_key(format!("malformed P-384 public key: {e}")))?;
            let sig = p384::ecdsa::Signature::from_der(signature)
                .map_err(|e| PdfSignError::signature_verification(format!("malformed ECDSA signature: {e}")))?;
            Ok(verifying_key.verify_prehash(digest, &sig).is_ok())
        }
        _ => Err(PdfSignError::unsupported_algorithm(format!(
            "{:?} key with {:?} signature algorithm",
            public_key.algorithm, algorithm
        ))),
    }
}

/// Try each supported RSA/ECDSA algorithm in turn against a given
/// certificate's declared key algorithm, used by chain verification where
/// the signature algorithm is read off the child certificate rather than
/// chosen by the caller.
pub fn verify_with_declared_algorithm(
    message: &[u8],
    signature: &[u8],
    public_key: &PublicKey,
    declared_hash: HashAlgorithm,
) -> Result<bool> {
    let digest = hash(message, declared_hash);
    let algorithm = match (public_key.algorithm, declared_hash) {
        (KeyAlgorithm::Rsa, HashAlgorithm::Sha256) => SignatureAlgorithm::RsaPkcs1Sha256,
        (KeyAlgorithm::Rsa, HashAlgorithm::Sha384) => SignatureAlgorithm::RsaPkcs1Sha384,
        (KeyAlgorithm::Rsa, HashAlgorithm::Sha512) => SignatureAlgorithm::RsaPkcs1Sha512,
        (KeyAlgorithm::EcdsaP256, _) => SignatureAlgorithm::EcdsaP256Sha256,
        (KeyAlgorithm::EcdsaP384, _) => SignatureAlgorithm::EcdsaP384Sha384,
        _ => {
            return Err(PdfSignError::unsupported_algorithm(format!(
                "{:?} with {:?}",
                public_key.algorithm, declared_hash
            )))
        }
    };
    verify_prehashed(&digest, signature, public_key, algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hash_has_expected_length() {
        let digest = hash(b"hello world", HashAlgorithm::Sha256);
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn hash_algorithm_output_lengths_match_rfc_values() {
        assert_eq!(HashAlgorithm::Sha1.output_len(), 20);
        assert_eq!(HashAlgorithm::Sha256.output_len(), 32);
        assert_eq!(HashAlgorithm::Sha384.output_len(), 48);
        assert_eq!(HashAlgorithm::Sha512.output_len(), 64);
    }
}
