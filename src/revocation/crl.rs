//! X.509 CRL (RFC 5280 §5) fetch, signature/time-window validation, and
//! serial-number lookup.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::asn1::{self, TAG_BIT_STRING, TAG_INTEGER, TAG_SEQUENCE};
use crate::crypto::verify_with_declared_algorithm;
use crate::error::Result;
use crate::traits::HttpTransport;
use crate::types::X509Certificate;
use crate::x509;

use super::RevocationStatus;

pub async fn check(
    cert: &X509Certificate,
    issuer: &X509Certificate,
    url: &str,
    at_time: DateTime<Utc>,
    clock_skew: Duration,
    transport: &dyn HttpTransport,
    timeout: Duration,
) -> Result<Option<RevocationStatus>> {
    let crl_der = transport.get(url, timeout).await?;
    let Some(parsed) = parse_crl(&crl_der)? else { return Ok(None) };

    let issuer_subject = x509::subject_name_der(&issuer.der_data)?;
    if parsed.issuer_der != issuer_subject {
        return Ok(None);
    }

    let skew = chrono::Duration::from_std(clock_skew).unwrap_or_default();
    if at_time + skew < parsed.this_update {
        return Ok(None);
    }
    if let Some(next_update) = parsed.next_update {
        if at_time - skew > next_update {
            return Ok(None);
        }
    }

    match verify_with_declared_algorithm(&parsed.tbs_bytes, &parsed.signature, &issuer.public_key, parsed.signature_algorithm.digest_algorithm()) {
        Ok(true) => {}
        _ => return Ok(None),
    }

    let revoked = parsed.revoked.iter().find(|r| r.serial == cert.serial_number);
    Ok(Some(match revoked {
        Some(entry) => RevocationStatus::Revoked { reason: None, revoked_at: Some(entry.revocation_date), source: "crl" },
        None => RevocationStatus::Good { source: "crl" },
    }))
}

struct RevokedEntry {
    serial: Vec<u8>,
    revocation_date: DateTime<Utc>,
}

struct ParsedCrl {
    issuer_der: Vec<u8>,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    revoked: Vec<RevokedEntry>,
    tbs_bytes: Vec<u8>,
    signature_algorithm: crate::types::SignatureAlgorithm,
    signature: Vec<u8>,
}

fn parse_crl(buf: &[u8]) -> Result<Option<ParsedCrl>> {
    let outer = asn1::expect_tlv(buf, 0, TAG_SEQUENCE)?;
    let mut pos = outer.value_start;

    let tbs_tlv = asn1::expect_tlv(buf, pos, TAG_SEQUENCE)?;
    let tbs_bytes = tbs_tlv.whole(buf, pos).to_vec();
    pos += tbs_tlv.total_len();

    let sig_alg_tlv = asn1::expect_tlv(buf, pos, TAG_SEQUENCE)?;
    let sig_oid_tlv = asn1::read_tlv(buf, sig_alg_tlv.value_start)?;
    let signature_algorithm = match crate::cms::signature_algorithm_from_oid(&asn1::oid::decode(sig_oid_tlv.value(buf))?) {
        Ok(alg) => alg,
        Err(_) => return Ok(None),
    };
    pos += sig_alg_tlv.total_len();

    let sig_bits_tlv = asn1::expect_tlv(buf, pos, TAG_BIT_STRING)?;
    let signature = sig_bits_tlv.value(buf).get(1..).unwrap_or(&[]).to_vec();

    let mut tpos = tbs_tlv.value_start;
    let tend = tbs_tlv.value_start + tbs_tlv.length;

    let peek = asn1::read_tlv(buf, tpos)?;
    if peek.tag == TAG_INTEGER {
        tpos += peek.total_len();
    }

    let inner_sig_alg = asn1::expect_tlv(buf, tpos, TAG_SEQUENCE)?;
    tpos += inner_sig_alg.total_len();

    let issuer_tlv = asn1::read_tlv(buf, tpos)?;
    let issuer_der = issuer_tlv.whole(buf, tpos).to_vec();
    tpos += issuer_tlv.total_len();

    let this_update_tlv = asn1::read_tlv(buf, tpos)?;
    let this_update = asn1::time::decode_time(this_update_tlv.tag, this_update_tlv.value(buf))?;
    tpos += this_update_tlv.total_len();

    let mut next_update = None;
    if tpos < tend {
        let peek = asn1::read_tlv(buf, tpos)?;
        if peek.tag == asn1::TAG_UTC_TIME || peek.tag == asn1::TAG_GENERALIZED_TIME {
            next_update = Some(asn1::time::decode_time(peek.tag, peek.value(buf))?);
            tpos += peek.total_len();
        }
    }

    let mut revoked = Vec::new();
    if tpos < tend {
        let peek = asn1::read_tlv(buf, tpos)?;
        if peek.tag == TAG_SEQUENCE {
            for (offset, member) in asn1::iter_tlvs(buf, peek.value_start, peek.value_start + peek.length)? {
                if let Ok(entry) = parse_revoked_entry(buf, offset, member) {
                    revoked.push(entry);
                }
            }
        }
    }

    Ok(Some(ParsedCrl { issuer_der, this_update, next_update, revoked, tbs_bytes, signature_algorithm, signature }))
}

fn parse_revoked_entry(buf: &[u8], _offset: usize, tlv: asn1::Tlv) -> Result<RevokedEntry> {
    let serial_tlv = asn1::expect_tlv(buf, tlv.value_start, TAG_INTEGER)?;
    let serial = serial_tlv.value(buf).to_vec();
    let date_pos = serial_tlv.value_start + serial_tlv.length;
    let date_tlv = asn1::read_tlv(buf, date_pos)?;
    let revocation_date = asn1::time::decode_time(date_tlv.tag, date_tlv.value(buf))?;
    Ok(RevokedEntry { serial, revocation_date })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc_time(s: &str) -> Vec<u8> {
        asn1::encode_tlv(asn1::TAG_UTC_TIME, s.as_bytes())
    }

    fn fake_issuer() -> Vec<u8> {
        asn1::encode_sequence(&[asn1::encode_set(&mut [asn1::encode_sequence(&[
            asn1::oid::encode_tlv("2.5.4.3").unwrap(),
            asn1::encode_tlv(0x0C, b"Fake CA"),
        ])])])
    }

    fn build_crl(issuer: Vec<u8>, this_update: &str, revoked_serials: &[&[u8]]) -> Vec<u8> {
        let sig_alg = crate::cms::encode_algorithm_identifier(crate::cms::OID_SHA256_WITH_RSA).unwrap();

        let mut tbs_members = vec![sig_alg.clone(), issuer, utc_time(this_update)];
        if !revoked_serials.is_empty() {
            let entries: Vec<Vec<u8>> = revoked_serials
                .iter()
                .map(|serial| asn1::encode_sequence(&[asn1::encode_integer(serial), utc_time(this_update)]))
                .collect();
            tbs_members.push(asn1::encode_sequence(&entries));
        }
        let tbs_cert_list = asn1::encode_sequence(&tbs_members);

        let signature = asn1::encode_tlv(TAG_BIT_STRING, &[0x00, 0xAB, 0xCD]);
        asn1::encode_sequence(&[tbs_cert_list, sig_alg, signature])
    }

    #[test]
    fn parses_issuer_and_this_update() {
        let issuer = fake_issuer();
        let crl = build_crl(issuer.clone(), "250101000000Z", &[]);
        let parsed = parse_crl(&crl).unwrap().unwrap();
        assert_eq!(parsed.issuer_der, issuer);
        assert!(parsed.revoked.is_empty());
    }

    #[test]
    fn finds_revoked_serial_among_entries() {
        let crl = build_crl(fake_issuer(), "250101000000Z", &[&[0x01], &[0x2A]]);
        let parsed = parse_crl(&crl).unwrap().unwrap();
        assert_eq!(parsed.revoked.len(), 2);
        assert!(parsed.revoked.iter().any(|r| r.serial == vec![0x2A]));
    }

    #[test]
    fn unsupported_signature_algorithm_yields_none() {
        let sig_alg = crate::cms::encode_algorithm_identifier("1.2.3.4.5.6.7").unwrap();
        let tbs_cert_list = asn1::encode_sequence(&[sig_alg.clone(), fake_issuer(), utc_time("250101000000Z")]);
        let signature = asn1::encode_tlv(TAG_BIT_STRING, &[0x00, 0xAB]);
        let crl = asn1::encode_sequence(&[tbs_cert_list, sig_alg, signature]);
        assert!(parse_crl(&crl).unwrap().is_none());
    }
}
