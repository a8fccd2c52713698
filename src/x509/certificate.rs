//! X.509 certificate model (C4): parsing a DER certificate into the fields
//! and extensions the rest of the engine needs (AKI/SKI, KeyUsage, EKU,
//! CRLDP, AIA, BasicConstraints, ICP-Brasil SAN).

use const_oid::db::rfc5280;
use der::asn1::OctetStringRef;
use der::Decode;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    AuthorityInfoAccessSyntax, AuthorityKeyIdentifier, BasicConstraints, CrlDistributionPoints,
    ExtendedKeyUsage, KeyUsage, SubjectAltName, SubjectKeyIdentifier,
};
use x509_cert::Certificate;

use crate::error::{PdfSignError, Result};
use crate::types::{IcpBrasilSubjectInfo, KeyAlgorithm, PublicKey, X509Certificate};

/// ICP-Brasil `id-ICPBrasil` OtherName arc, `2.16.76.1.3.*`.
const ICP_BRASIL_ARC: &str = "2.16.76.1.3";

const OID_ID_AD_OCSP: &str = "1.3.6.1.5.5.7.48.1";
const OID_ID_AD_CA_ISSUERS: &str = "1.3.6.1.5.5.7.48.2";

pub fn parse_certificate(der_data: &[u8]) -> Result<X509Certificate> {
    let cert = Certificate::from_der(der_data)
        .map_err(|e| PdfSignError::certificate_parse(format!("malformed X.509 certificate: {e}")))?;
    let tbs = &cert.tbs_certificate;

    let subject = tbs.subject.to_string();
    let issuer = tbs.issuer.to_string();
    let serial_number = tbs.serial_number.as_bytes().to_vec();
    let not_before = crate::x509::asn1_time_to_chrono(&tbs.validity.not_before)?;
    let not_after = crate::x509::asn1_time_to_chrono(&tbs.validity.not_after)?;

    let public_key = parse_public_key(&tbs.subject_public_key_info)?;

    let mut key_usage = Vec::new();
    let mut is_ca = false;
    let mut path_len_constraint = None;
    let mut authority_key_id = None;
    let mut subject_key_id = None;
    let mut crl_distribution_points = Vec::new();
    let mut ocsp_responder_urls = Vec::new();
    let mut ca_issuer_urls = Vec::new();
    let mut extended_key_usage = Vec::new();
    let mut icp_brasil_san = None;

    if let Some(extensions) = &tbs.extensions {
        for ext in extensions {
            if ext.extn_id == rfc5280::ID_CE_KEY_USAGE {
                if let Ok(ku) = KeyUsage::from_der(ext.extn_value.as_bytes()) {
                    key_usage = key_usage_flags(&ku);
                }
            } else if ext.extn_id == rfc5280::ID_CE_BASIC_CONSTRAINTS {
                if let Ok(bc) = BasicConstraints::from_der(ext.extn_value.as_bytes()) {
                    is_ca = bc.ca;
                    path_len_constraint = bc.path_len_constraint.map(|v| v as u32);
                }
            } else if ext.extn_id == rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER {
                if let Ok(aki) = AuthorityKeyIdentifier::from_der(ext.extn_value.as_bytes()) {
                    authority_key_id = aki.key_identifier.map(|o| o.as_bytes().to_vec());
                }
            } else if ext.extn_id == rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER {
                if let Ok(ski) = SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes()) {
                    subject_key_id = Some(ski.0.as_bytes().to_vec());
                }
            } else if ext.extn_id == rfc5280::ID_CE_CRL_DISTRIBUTION_POINTS {
                if let Ok(cdp) = CrlDistributionPoints::from_der(ext.extn_value.as_bytes()) {
                    crl_distribution_points = extract_crl_urls(&cdp);
                }
            } else if ext.extn_id == rfc5280::ID_PE_AUTHORITY_INFO_ACCESS {
                if let Ok(aia) = AuthorityInfoAccessSyntax::from_der(ext.extn_value.as_bytes()) {
                    for access in aia.0.iter() {
                        if let GeneralName::UniformResourceIdentifier(uri) = &access.access_location {
                            let oid_str = access.access_method.to_string();
                            if oid_str == OID_ID_AD_OCSP {
                                ocsp_responder_urls.push(uri.to_string());
                            } else if oid_str == OID_ID_AD_CA_ISSUERS {
                                ca_issuer_urls.push(uri.to_string());
                            }
                        }
                    }
                }
            } else if ext.extn_id == rfc5280::ID_CE_EXT_KEY_USAGE {
                if let Ok(eku) = ExtendedKeyUsage::from_der(ext.extn_value.as_bytes()) {
                    extended_key_usage = eku.0.iter().map(|oid| oid.to_string()).collect();
                }
            } else if ext.extn_id == rfc5280::ID_CE_SUBJECT_ALT_NAME {
                if let Ok(san) = SubjectAltName::from_der(ext.extn_value.as_bytes()) {
                    icp_brasil_san = extract_icp_brasil_san(&san);
                }
            }
        }
    }

    Ok(X509Certificate {
        der_data: der_data.to_vec(),
        subject,
        issuer,
        serial_number,
        not_before,
        not_after,
        public_key,
        key_usage,
        is_ca,
        path_len_constraint,
        authority_key_id,
        subject_key_id,
        crl_distribution_points,
        ocsp_responder_urls,
        ca_issuer_urls,
        extended_key_usage,
        icp_brasil_san,
    })
}

fn key_usage_flags(ku: &KeyUsage) -> Vec<String> {
    let mut flags = Vec::new();
    if ku.digital_signature() {
        flags.push("digitalSignature".to_string());
    }
    if ku.non_repudiation() {
        flags.push("nonRepudiation".to_string());
    }
    if ku.key_encipherment() {
        flags.push("keyEncipherment".to_string());
    }
    if ku.key_cert_sign() {
        flags.push("keyCertSign".to_string());
    }
    if ku.crl_sign() {
        flags.push("cRLSign".to_string());
    }
    flags
}

fn extract_crl_urls(cdp: &CrlDistributionPoints) -> Vec<String> {
    let mut urls = Vec::new();
    for point in cdp.0.iter() {
        if let Some(name) = &point.distribution_point {
            if let x509_cert::ext::pkix::name::DistributionPointName::FullName(names) = name {
                for gn in names.iter() {
                    if let GeneralName::UniformResourceIdentifier(uri) = gn {
                        urls.push(uri.to_string());
                    }
                }
            }
        }
    }
    urls
}

/// Parse the ICP-Brasil `OtherName` entries out of a SAN extension.
/// `2.16.76.1.3.1` = date of birth, `.3.2` = CPF, `.3.3` = responsible
/// name, `.3.5` = CNPJ, `.3.6` = NIS, matching ITI's DOC-ICP-04 mapping.
fn extract_icp_brasil_san(san: &SubjectAltName) -> Option<IcpBrasilSubjectInfo> {
    let mut info = IcpBrasilSubjectInfo::default();
    let mut found = false;
    for gn in san.0.iter() {
        if let GeneralName::OtherName(other) = gn {
            let oid = other.type_id.to_string();
            if !oid.starts_with(ICP_BRASIL_ARC) {
                continue;
            }
            found = true;
            let value = OctetStringRef::from_der(other.value.value())
                .map(|s| String::from_utf8_lossy(s.as_bytes()).into_owned())
                .unwrap_or_default();
            match oid.as_str() {
                "2.16.76.1.3.1" => info.date_of_birth = Some(value),
                "2.16.76.1.3.2" => info.cpf = Some(value),
                "2.16.76.1.3.3" => info.responsible_name = Some(value),
                "2.16.76.1.3.5" => info.cnpj = Some(value),
                "2.16.76.1.3.6" => info.nis = Some(value),
                _ => {}
            }
        }
    }
    found.then_some(info)
}

fn parse_public_key(spki: &x509_cert::spki::SubjectPublicKeyInfoOwned) -> Result<PublicKey> {
    let oid = spki.algorithm.oid.to_string();
    let (algorithm, key_size) = match oid.as_str() {
        "1.2.840.113549.1.1.1" => {
            let modulus_bits = estimate_rsa_modulus_bits(spki.subject_public_key.raw_bytes());
            (KeyAlgorithm::Rsa, modulus_bits)
        }
        "1.2.840.10045.2.1" => {
            let curve_oid = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.decode_as::<der::asn1::ObjectIdentifier>().ok())
                .map(|o| o.to_string())
                .unwrap_or_default();
            match curve_oid.as_str() {
                "1.2.840.10045.3.1.7" => (KeyAlgorithm::EcdsaP256, 256),
                "1.3.132.0.34" => (KeyAlgorithm::EcdsaP384, 384),
                "1.3.132.0.35" => (KeyAlgorithm::EcdsaP521, 521),
                other => {
                    return Err(PdfSignError::unsupported_algorithm(format!(
                        "unknown EC curve OID {other}"
                    )))
                }
            }
        }
        other => return Err(PdfSignError::unsupported_algorithm(format!("public key OID {other}"))),
    };
    Ok(PublicKey {
        algorithm,
        key_size,
        der_data: spki.subject_public_key.raw_bytes().to_vec(),
    })
}

fn estimate_rsa_modulus_bits(der_pubkey: &[u8]) -> u32 {
    use rsa::pkcs1::DecodeRsaPublicKey;
    use rsa::traits::PublicKeyParts;
    rsa::RsaPublicKey::from_pkcs1_der(der_pubkey)
        .map(|k| k.size() as u32 * 8)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    #[test]
    fn icp_brasil_arc_prefix_matches_expected_oid() {
        assert!("2.16.76.1.3.2".starts_with(super::ICP_BRASIL_ARC));
    }
}
