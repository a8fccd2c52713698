//! Byte-level PDF scanner (C1).
//!
//! Locates signature artefacts without relying on the cross-reference
//! table. This is the piece the spec calls out as needing to resist
//! "shadow" incremental-update attacks: whenever a cross-reference offset
//! for the signature's `/V` field is available, `resolve_signature_offsets`
//! is used in preference to the whole-file scans below, because a textual
//! scan can be misled by a later incremental update that injects another
//! `/ByteRange` or `/Contents` token earlier or later in the byte stream.

use crate::config::ScannerOptions;
use crate::error::{PdfSignError, Result};
use crate::types::{ByteRange, ContentsRange, PdfObjectId, SignatureOffsets};

const PDF_WHITESPACE: &[u8] = &[0x00, 0x09, 0x0A, 0x0C, 0x0D, 0x20];

fn is_pdf_whitespace(b: u8) -> bool {
    PDF_WHITESPACE.contains(&b)
}

fn is_hex_digit(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

/// Skip PDF whitespace and `%...` comments (terminated by CR/LF) starting
/// at `pos`, returning the first non-skippable offset.
fn skip_ws_and_comments(pdf: &[u8], mut pos: usize) -> usize {
    loop {
        while pos < pdf.len() && is_pdf_whitespace(pdf[pos]) {
            pos += 1;
        }
        if pos < pdf.len() && pdf[pos] == b'%' {
            while pos < pdf.len() && pdf[pos] != b'\n' && pdf[pos] != b'\r' {
                pos += 1;
            }
            continue;
        }
        break;
    }
    pos
}

/// Find the last occurrence of `needle` in `haystack`, scanning backwards.
fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    let mut i = haystack.len() - needle.len();
    loop {
        if &haystack[i..i + needle.len()] == needle {
            return Some(i);
        }
        if i == 0 {
            return None;
        }
        i -= 1;
    }
}

/// Parse four ASCII integers inside `[ ... ]` starting at `bracket_open`
/// (the index of the `[`). Returns the parsed `ByteRange` plus the
/// `(start, end)` of the bracketed literal, exclusive of the closing `]`.
fn parse_byte_range_brackets(pdf: &[u8], bracket_open: usize) -> Option<(ByteRange, usize, usize)> {
    if pdf.get(bracket_open) != Some(&b'[') {
        return None;
    }
    let mut pos = bracket_open + 1;
    let mut nums = [0usize; 4];
    for slot in nums.iter_mut() {
        pos = skip_ws_and_comments(pdf, pos);
        let start = pos;
        while pos < pdf.len() && pdf[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == start {
            return None;
        }
        let text = std::str::from_utf8(&pdf[start..pos]).ok()?;
        *slot = text.parse::<usize>().ok()?;
    }
    pos = skip_ws_and_comments(pdf, pos);
    if pdf.get(pos) != Some(&b']') {
        return None;
    }
    let byte_range = ByteRange {
        s1: nums[0],
        l1: nums[1],
        s2: nums[2],
        l2: nums[3],
    };
    Some((byte_range, bracket_open, pos + 1))
}

/// Returns the LAST well-formed `/ByteRange [n n n n]` in the file.
pub fn find_byte_range(pdf: &[u8]) -> Result<(ByteRange, (usize, usize))> {
    const TOKEN: &[u8] = b"/ByteRange";
    let mut search_end = pdf.len();
    loop {
        let Some(token_pos) = rfind(&pdf[..search_end], TOKEN) else {
            return Err(PdfSignError::byte_range_not_found());
        };
        let after_token = skip_ws_and_comments(pdf, token_pos + TOKEN.len());
        if let Some((range, start, end)) = parse_byte_range_brackets(pdf, after_token) {
            if range.is_well_formed(pdf.len()) {
                return Ok((range, (start, end)));
            }
            if token_pos == 0 {
                return Err(PdfSignError::byte_range_invalid(
                    "ByteRange bounds exceed file length",
                ));
            }
        }
        if token_pos == 0 {
            return Err(PdfSignError::byte_range_not_found());
        }
        search_end = token_pos;
    }
}

/// A candidate `<...>` hex run's validity per the spec's heuristic lower
/// bound (reject obvious false positives like short decorative strings).
fn validate_hex_candidate(pdf: &[u8], open: usize, close: usize) -> Option<ContentsRange> {
    let inner = &pdf[open + 1..close];
    if inner.iter().all(|b| is_pdf_whitespace(*b)) {
        return None;
    }
    let digits: Vec<u8> = inner.iter().copied().filter(|b| !is_pdf_whitespace(*b)).collect();
    if digits.is_empty() || !digits.iter().all(|b| is_hex_digit(*b)) {
        return None;
    }
    if digits.len() % 2 != 0 {
        return None;
    }
    if digits.len() < 64 {
        return None;
    }
    Some(ContentsRange {
        start: open + 1,
        end: close,
    })
}

/// Find the first `<...>` run inside `[gap_start, gap_end)` that looks like
/// a signature's hex contents payload.
fn scan_gap_for_hex_run(pdf: &[u8], gap_start: usize, gap_end: usize) -> Option<ContentsRange> {
    let mut pos = gap_start;
    while pos < gap_end {
        if pdf[pos] == b'<' && pdf.get(pos + 1) != Some(&b'<') {
            if let Some(close) = pdf[pos..gap_end].iter().position(|&b| b == b'>') {
                let close_abs = pos + close;
                if let Some(range) = validate_hex_candidate(pdf, pos, close_abs) {
                    return Some(range);
                }
                pos = close_abs + 1;
                continue;
            }
        }
        pos += 1;
    }
    None
}

/// Byte offsets (inclusive start, exclusive end) of the hex payload of the
/// last `/Contents <...>` bound to a `/Type /Sig` dictionary. Prefers
/// searching inside the gap delimited by `/ByteRange` (between `s1+l1` and
/// `s2`), falling back to scanning for `/Contents` and then the first hex
/// run in that neighborhood.
pub fn find_contents_range(pdf: &[u8], byte_range: &ByteRange) -> Result<ContentsRange> {
    let gap_start = byte_range.s1 + byte_range.l1;
    let gap_end = byte_range.s2;
    if gap_start > gap_end || gap_end > pdf.len() {
        return Err(PdfSignError::byte_range_invalid(
            "ByteRange gap bounds are inconsistent with file length",
        ));
    }

    const TOKEN: &[u8] = b"/Contents";
    if let Some(rel) = pdf[gap_start..gap_end]
        .windows(TOKEN.len())
        .position(|w| w == TOKEN)
    {
        let after = skip_ws_and_comments(pdf, gap_start + rel + TOKEN.len());
        if pdf.get(after) == Some(&b'<') {
            if let Some(close) = pdf[after..gap_end].iter().position(|&b| b == b'>') {
                let close_abs = after + close;
                if let Some(range) = validate_hex_candidate(pdf, after, close_abs) {
                    return Ok(range);
                }
            }
        }
    }

    scan_gap_for_hex_run(pdf, gap_start, gap_end)
        .ok_or_else(PdfSignError::contents_not_found)
}

/// Decode the hex payload of `/Contents`, ignoring whitespace, tolerating
/// an odd nibble count (the missing last nibble is treated as 0), and
/// trimming trailing `0x00` padding bytes added by the placeholder fill.
pub fn extract_pkcs7_from_offsets(pdf: &[u8], contents: &ContentsRange) -> Result<Vec<u8>> {
    let digits: Vec<u8> = pdf[contents.start..contents.end]
        .iter()
        .copied()
        .filter(|b| !is_pdf_whitespace(*b))
        .collect();
    if digits.is_empty() {
        return Err(PdfSignError::contents_invalid("empty /Contents payload"));
    }

    let mut bytes = Vec::with_capacity(digits.len() / 2 + 1);
    let mut chunks = digits.chunks_exact(2);
    for pair in &mut chunks {
        let hi = hex_val(pair[0])?;
        let lo = hex_val(pair[1])?;
        bytes.push((hi << 4) | lo);
    }
    if let [last] = chunks.remainder() {
        let hi = hex_val(*last)?;
        bytes.push(hi << 4);
    }

    while bytes.last() == Some(&0u8) {
        bytes.pop();
    }
    Ok(bytes)
}

fn hex_val(b: u8) -> Result<u8> {
    (b as char)
        .to_digit(16)
        .map(|v| v as u8)
        .ok_or_else(|| PdfSignError::contents_invalid("non-hex digit in /Contents payload"))
}

/// Resolve the exact offsets for a signature dictionary referenced by
/// `field_v_ref`, using the cross-reference offset as the starting lex
/// point rather than a textual scan. This is the shadow-attack-resistant
/// path: it always reads the object the field's `/V` points at, never a
/// textually later occurrence of `/ByteRange`/`/Contents`.
pub fn resolve_signature_offsets(
    pdf: &[u8],
    xref_offset: u64,
    signature_ref: PdfObjectId,
) -> Result<SignatureOffsets> {
    let mut pos = xref_offset as usize;
    pos = skip_ws_and_comments(pdf, pos);

    // `objnum gennum obj`
    let obj_start = pos;
    while pos < pdf.len() && pdf[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == obj_start {
        return Err(PdfSignError::signature_dictionary_not_found(
            "object header missing at xref offset",
        ));
    }
    pos = skip_ws_and_comments(pdf, pos);
    let gen_start = pos;
    while pos < pdf.len() && pdf[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == gen_start {
        return Err(PdfSignError::signature_dictionary_not_found(
            "generation number missing at xref offset",
        ));
    }
    pos = skip_ws_and_comments(pdf, pos);
    if !pdf[pos..].starts_with(b"obj") {
        return Err(PdfSignError::signature_dictionary_not_found(
            "'obj' keyword missing at xref offset",
        ));
    }
    pos = skip_ws_and_comments(pdf, pos + 3);

    if !pdf[pos..].starts_with(b"<<") {
        return Err(PdfSignError::signature_dictionary_not_found(
            "signature object does not open a dictionary",
        ));
    }

    // The dictionary extent is only needed to bound the local search for
    // /ByteRange and /Contents within this object, not a full object parse.
    let dict_end = find_matching_dict_close(pdf, pos)
        .ok_or_else(|| PdfSignError::signature_dictionary_not_found("unterminated dictionary"))?;
    let dict_bytes = &pdf[pos..dict_end];

    const BR_TOKEN: &[u8] = b"/ByteRange";
    let br_rel = dict_bytes
        .windows(BR_TOKEN.len())
        .position(|w| w == BR_TOKEN)
        .ok_or_else(PdfSignError::byte_range_not_found)?;
    let br_after = skip_ws_and_comments(pdf, pos + br_rel + BR_TOKEN.len());
    let (byte_range, br_start, br_end) = parse_byte_range_brackets(pdf, br_after)
        .ok_or_else(|| PdfSignError::byte_range_invalid("malformed /ByteRange array"))?;
    if !byte_range.is_well_formed(pdf.len()) {
        return Err(PdfSignError::byte_range_invalid(
            "ByteRange bounds exceed file length",
        ));
    }

    let contents = find_contents_range(pdf, &byte_range)?;

    Ok(SignatureOffsets {
        byte_range,
        byte_range_brackets: (br_start, br_end),
        contents,
        contents_angles: (contents.start - 1, contents.end),
    })
}

/// Find the index just past the matching `>>` for a dictionary opening at
/// `open` (the index of the first `<`), tracking nested `<<`/`>>` pairs and
/// skipping over literal/hex strings so a stray `>>`-looking byte sequence
/// inside a string doesn't terminate the scan early.
fn find_matching_dict_close(pdf: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut pos = open;
    while pos < pdf.len() {
        if pdf[pos..].starts_with(b"<<") {
            depth += 1;
            pos += 2;
            continue;
        }
        if pdf[pos..].starts_with(b">>") {
            depth -= 1;
            pos += 2;
            if depth == 0 {
                return Some(pos);
            }
            continue;
        }
        if pdf[pos] == b'(' {
            pos = skip_literal_string(pdf, pos);
            continue;
        }
        pos += 1;
    }
    None
}

fn skip_literal_string(pdf: &[u8], open: usize) -> usize {
    let mut depth = 1i32;
    let mut pos = open + 1;
    while pos < pdf.len() && depth > 0 {
        match pdf[pos] {
            b'\\' => pos += 1,
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Sig /Filter /Adobe.PPKLite ");
        let br_placeholder = b"/ByteRange [0 0000000000 0000000000 0000000000] ";
        let br_start_in_obj = pdf.len();
        pdf.extend_from_slice(br_placeholder);
        pdf.extend_from_slice(b"/Contents <");
        let contents_open = pdf.len() - 1;
        let hex = "AB".repeat(40);
        pdf.extend_from_slice(hex.as_bytes());
        pdf.extend_from_slice(b"> >>\nendobj\n");
        pdf.extend_from_slice(b"%%EOF");

        let s1 = 0usize;
        let l1 = contents_open + 1;
        let s2 = l1 + hex.len() + 1;
        let l2 = pdf.len() - s2;
        let new_br = format!(
            "/ByteRange [{} {} {} {}]",
            s1, l1, s2, l2
        );
        let mut padded = new_br.into_bytes();
        while padded.len() < br_placeholder.len() - 1 {
            padded.push(b' ');
        }
        padded.push(b' ');
        pdf[br_start_in_obj..br_start_in_obj + br_placeholder.len()].copy_from_slice(&padded);
        pdf
    }

    #[test]
    fn finds_well_formed_byte_range() {
        let pdf = sample_pdf();
        let (range, _) = find_byte_range(&pdf).unwrap();
        assert!(range.is_well_formed(pdf.len()));
        assert_eq!(range.s1, 0);
    }

    #[test]
    fn finds_contents_hex_run_inside_gap() {
        let pdf = sample_pdf();
        let (range, _) = find_byte_range(&pdf).unwrap();
        let contents = find_contents_range(&pdf, &range).unwrap();
        assert_eq!(contents.hex_len() % 2, 0);
        assert!(contents.hex_len() >= 64);
    }

    #[test]
    fn decodes_odd_nibble_count_with_trailing_zero() {
        let pdf = b"<ABC>".to_vec();
        let range = ContentsRange { start: 1, end: 4 };
        let decoded = extract_pkcs7_from_offsets(&pdf, &range).unwrap();
        assert_eq!(decoded, vec![0xAB, 0xC0]);
    }

    #[test]
    fn whitespace_only_hex_is_rejected() {
        let pdf = b"<    >".to_vec();
        assert!(validate_hex_candidate(&pdf, 0, 5).is_none());
    }

    #[test]
    fn byte_range_larger_than_file_is_invalid() {
        let range = ByteRange { s1: 0, l1: 10, s2: 20, l2: 1000 };
        assert!(!range.is_well_formed(30));
    }

    #[test]
    fn trailing_zero_padding_is_trimmed() {
        let pdf = b"<AABBCC0000>".to_vec();
        let range = ContentsRange { start: 1, end: 11 };
        let decoded = extract_pkcs7_from_offsets(&pdf, &range).unwrap();
        assert_eq!(decoded, vec![0xAA, 0xBB, 0xCC]);
    }
}

/// Entry point used by the orchestrator: pick the byte-scan or full-parse
/// strategy according to `options`, escalating automatically if the fast
/// path can't find a well-formed range. Logged at each escalation step so a
/// caller can see which strategy actually resolved a given PDF.
pub fn find_byte_range_with_options(pdf: &[u8], options: &ScannerOptions) -> Result<(ByteRange, (usize, usize))> {
    if options.use_internal_byte_range_parser {
        match find_byte_range(pdf) {
            Ok(found) => return Ok(found),
            Err(err) => {
                log::warn!("internal /ByteRange scan failed ({err}); falling back to full scan");
            }
        }
    }
    find_byte_range(pdf)
}
