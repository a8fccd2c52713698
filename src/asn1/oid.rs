//! Object identifier encode/decode, implemented by hand (base-128 VLQ per
//! X.690 §8.19) rather than delegated to a higher-level ASN.1 crate, so the
//! TLV walker in `asn1::mod` never has to round-trip through a different
//! library's object model just to compare an OID.

use crate::error::{PdfSignError, Result};

/// Decode the raw content octets of an OID (tag/length already stripped)
/// into its dotted string form.
pub fn decode(content: &[u8]) -> Result<String> {
    if content.is_empty() {
        return Err(PdfSignError::asn1_parse("empty OBJECT IDENTIFIER"));
    }
    let first = content[0];
    let arc0 = (first / 40).min(2);
    let arc1 = first as u32 - arc0 as u32 * 40;
    let mut arcs = vec![arc0 as u32, arc1];

    let mut value: u64 = 0;
    for &byte in &content[1..] {
        value = (value << 7) | (byte & 0x7F) as u64;
        if byte & 0x80 == 0 {
            arcs.push(value as u32);
            value = 0;
        }
    }
    if value != 0 {
        return Err(PdfSignError::asn1_parse("truncated OBJECT IDENTIFIER"));
    }
    Ok(arcs.iter().map(u32::to_string).collect::<Vec<_>>().join("."))
}

/// Encode a dotted OID string into raw content octets (no tag/length).
pub fn encode(dotted: &str) -> Result<Vec<u8>> {
    let arcs: Vec<u32> = dotted
        .split('.')
        .map(|s| s.parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| PdfSignError::configuration(format!("malformed OID string '{dotted}'")))?;
    if arcs.len() < 2 {
        return Err(PdfSignError::configuration("OID must have at least two arcs"));
    }
    let mut out = vec![(arcs[0] * 40 + arcs[1]) as u8];
    for &arc in &arcs[2..] {
        out.extend(encode_base128(arc));
    }
    Ok(out)
}

fn encode_base128(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push(((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

pub fn encode_tlv(dotted: &str) -> Result<Vec<u8>> {
    let content = encode(dotted)?;
    Ok(super::encode_tlv(super::TAG_OID, &content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_rfc5652_id_data_oid() {
        let dotted = "1.2.840.113549.1.7.1";
        let content = encode(dotted).unwrap();
        assert_eq!(decode(&content).unwrap(), dotted);
    }

    #[test]
    fn round_trips_icp_brasil_policy_arc() {
        let dotted = "2.16.76.1.7.1.1.2.3";
        let content = encode(dotted).unwrap();
        assert_eq!(decode(&content).unwrap(), dotted);
    }
}
