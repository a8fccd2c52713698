//! UTCTime / GeneralizedTime encode and decode.
//!
//! Per spec.md §4.2: `signingTime` and similar CMS attributes are encoded
//! as `UTCTime` when the year falls in `1950..2049`, and `GeneralizedTime`
//! otherwise (UTCTime's two-digit year cannot represent years outside that
//! window unambiguously).

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{PdfSignError, Result};

use super::{TAG_GENERALIZED_TIME, TAG_UTC_TIME};

/// Encode `time` as the tag+content appropriate for its year.
pub fn encode_time_tlv(time: DateTime<Utc>) -> Vec<u8> {
    let year = time.format("%Y").to_string().parse::<i32>().unwrap_or(0);
    if (1950..2050).contains(&year) {
        let content = time.format("%y%m%d%H%M%SZ").to_string();
        super::encode_tlv(TAG_UTC_TIME, content.as_bytes())
    } else {
        let content = time.format("%Y%m%d%H%M%SZ").to_string();
        super::encode_tlv(TAG_GENERALIZED_TIME, content.as_bytes())
    }
}

/// Decode either a UTCTime or GeneralizedTime content string (tag already
/// identified by the caller) into a UTC timestamp.
pub fn decode_time(tag: u8, content: &[u8]) -> Result<DateTime<Utc>> {
    let text = std::str::from_utf8(content)
        .map_err(|_| PdfSignError::asn1_parse("time value is not valid ASCII"))?;
    let text = text.trim_end_matches('Z');
    let naive = if tag == TAG_UTC_TIME {
        let full = if text.len() == 12 { format!("20{text}") } else { text.to_string() };
        // YYMMDDHHMMSS with a 2000-pivot; ICP-Brasil/PAdES signatures are
        // never dated before 2000, so no 19xx fallback is needed here.
        NaiveDateTime::parse_from_str(&full, "%Y%m%d%H%M%S")
    } else {
        NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S")
    }
    .map_err(|e| PdfSignError::asn1_parse(format!("malformed time value '{text}': {e}")))?;
    Ok(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encodes_modern_year_as_utctime() {
        let t = Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
        let tlv = encode_time_tlv(t);
        assert_eq!(tlv[0], TAG_UTC_TIME);
    }

    #[test]
    fn encodes_far_future_year_as_generalizedtime() {
        let t = Utc.with_ymd_and_hms(2060, 1, 1, 0, 0, 0).unwrap();
        let tlv = encode_time_tlv(t);
        assert_eq!(tlv[0], TAG_GENERALIZED_TIME);
    }

    #[test]
    fn round_trips_utctime() {
        let t = Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 45).unwrap();
        let tlv = encode_time_tlv(t);
        let hdr_len = 2;
        let decoded = decode_time(tlv[0], &tlv[hdr_len..]).unwrap();
        assert_eq!(decoded, t);
    }
}
