//! Cross-reference table loading and AcroForm field enumeration.
//!
//! Supports classical `xref` tables with `/Prev` chains. Cross-reference
//! *streams* (PDF 1.5+ compressed xrefs) are detected but not decoded here;
//! `extract_all_signatures` falls back to the byte-level scanner's last-match
//! heuristics for documents that only expose an xref stream, which is sound
//! because `find_byte_range`/`find_contents_range` do not depend on xref at
//! all. See DESIGN.md for this tradeoff.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{PdfSignError, Result};
use crate::pdf::lexer::Lexer;
use crate::pdf::object::{PdfObject, XRefTable, XrefEntry};
use crate::types::PdfObjectId;

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|w| w == needle)
}

pub fn find_last_startxref_pub(pdf: &[u8]) -> Result<u64> {
    find_last_startxref(pdf)
}

fn find_last_startxref(pdf: &[u8]) -> Result<u64> {
    let pos = rfind(pdf, b"startxref").ok_or_else(|| {
        PdfSignError::pdf_parse("startxref keyword not found")
    })?;
    let mut lexer = Lexer::new(pdf, pos + "startxref".len());
    lexer.skip_ws();
    let start = lexer.pos;
    let mut end = start;
    while end < pdf.len() && pdf[end].is_ascii_digit() {
        end += 1;
    }
    std::str::from_utf8(&pdf[start..end])
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| PdfSignError::pdf_parse("malformed startxref offset"))
}

/// Parse one classic `xref` section at `offset`, returning the entries it
/// defines and the trailer dictionary that follows it.
fn parse_xref_section(pdf: &[u8], offset: u64) -> Result<(Vec<(u32, XrefEntry)>, HashMap<String, Rc<PdfObject>>)> {
    let mut lexer = Lexer::new(pdf, offset as usize);
    lexer.skip_ws();
    if !pdf[lexer.pos..].starts_with(b"xref") {
        return Err(PdfSignError::pdf_parse("expected 'xref' keyword"));
    }
    lexer.pos += 4;

    let mut entries = Vec::new();
    loop {
        lexer.skip_ws();
        if pdf[lexer.pos..].starts_with(b"trailer") {
            lexer.pos += 7;
            break;
        }
        if !pdf.get(lexer.pos).map(|b| b.is_ascii_digit()).unwrap_or(false) {
            break;
        }
        let start_num = read_uint(pdf, &mut lexer.pos)?;
        lexer.skip_ws();
        let count = read_uint(pdf, &mut lexer.pos)?;
        for i in 0..count {
            lexer.skip_ws();
            let line_start = lexer.pos;
            let line = &pdf[line_start..(line_start + 20).min(pdf.len())];
            let offset_str = std::str::from_utf8(&line[0..10]).unwrap_or("0").trim();
            let gen_str = std::str::from_utf8(&line[11..16]).unwrap_or("0").trim();
            let kind = line.get(17).copied().unwrap_or(b'f');
            entries.push((
                start_num as u32 + i as u32,
                XrefEntry {
                    offset: offset_str.parse().unwrap_or(0),
                    generation: gen_str.parse().unwrap_or(0),
                    in_use: kind == b'n',
                },
            ));
            lexer.pos += 20;
        }
    }

    lexer.skip_ws();
    let trailer_obj = lexer.parse_object()?;
    let trailer = trailer_obj
        .as_dict()
        .cloned()
        .ok_or_else(|| PdfSignError::pdf_parse("trailer is not a dictionary"))?;
    Ok((entries, trailer))
}

fn read_uint(pdf: &[u8], pos: &mut usize) -> Result<u64> {
    let start = *pos;
    while *pos < pdf.len() && pdf[*pos].is_ascii_digit() {
        *pos += 1;
    }
    std::str::from_utf8(&pdf[start..*pos])
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| PdfSignError::pdf_parse("expected integer"))
}

/// Load the xref chain starting from the last `startxref`, following
/// `/Prev` pointers, oldest-first entries never overriding newer ones.
pub fn load_xref_chain(pdf: &[u8]) -> Result<XRefTable> {
    let mut table = XRefTable::new();
    let mut offset = find_last_startxref(pdf)?;
    let mut visited = std::collections::HashSet::new();
    let mut first = true;

    loop {
        if !visited.insert(offset) {
            break; // cycle guard
        }
        let (entries, trailer) = match parse_xref_section(pdf, offset) {
            Ok(v) => v,
            Err(_) => break, // likely an xref stream; stop walking classic chain
        };
        for (num, entry) in entries {
            table.insert_entry(num, entry);
        }
        if first {
            table.trailer = trailer.clone();
            first = false;
        }
        match trailer.get("Prev").and_then(|o| o.as_number()) {
            Some(prev) => offset = prev as u64,
            None => break,
        }
    }
    Ok(table)
}

/// Parse the indirect object referenced by `id`, given its xref entry.
pub fn load_object(pdf: &[u8], table: &XRefTable, id: PdfObjectId) -> Result<Rc<PdfObject>> {
    let entry = table
        .entry(id.number)
        .ok_or_else(|| PdfSignError::pdf_parse(format!("object {} not in xref", id.number)))?;
    if !entry.in_use {
        return Err(PdfSignError::pdf_parse(format!("object {} is a free entry", id.number)));
    }
    let mut lexer = Lexer::new(pdf, entry.offset as usize);
    lexer.skip_ws();
    let _num = read_uint(pdf, &mut lexer.pos)?;
    lexer.skip_ws();
    let _gen = read_uint(pdf, &mut lexer.pos)?;
    lexer.skip_ws();
    if !pdf[lexer.pos..].starts_with(b"obj") {
        return Err(PdfSignError::pdf_parse("expected 'obj' keyword"));
    }
    lexer.pos += 3;
    Ok(Rc::new(lexer.parse_object()?))
}

pub fn dereference(pdf: &[u8], table: &XRefTable, obj: &Rc<PdfObject>) -> Result<Rc<PdfObject>> {
    match obj.as_ref() {
        PdfObject::Ref(id) => load_object(pdf, table, *id),
        _ => Ok(Rc::clone(obj)),
    }
}

/// Walk `/Root -> /AcroForm -> /Fields` (recursively through `/Kids`) and
/// collect every leaf field whose `/FT` is `/Sig` (or that carries a `/V`
/// pointing at a `/Type /Sig` dictionary), together with the object id of
/// that signature dictionary.
pub fn enumerate_signature_fields(pdf: &[u8], table: &XRefTable) -> Result<Vec<(String, PdfObjectId)>> {
    let root_ref = table
        .trailer
        .get("Root")
        .cloned()
        .ok_or_else(|| PdfSignError::pdf_parse("trailer missing /Root"))?;
    let root = dereference(pdf, table, &root_ref)?;
    let root_dict = root
        .as_dict()
        .ok_or_else(|| PdfSignError::pdf_parse("/Root is not a dictionary"))?;
    let Some(acroform_obj) = root_dict.get("AcroForm") else {
        return Ok(Vec::new());
    };
    let acroform = dereference(pdf, table, acroform_obj)?;
    let acroform_dict = acroform
        .as_dict()
        .ok_or_else(|| PdfSignError::pdf_parse("/AcroForm is not a dictionary"))?;
    let Some(fields_obj) = acroform_dict.get("Fields") else {
        return Ok(Vec::new());
    };
    let fields = dereference(pdf, table, fields_obj)?;
    let mut out = Vec::new();
    if let Some(arr) = fields.as_array() {
        for field_ref in arr {
            walk_field(pdf, table, field_ref, String::new(), &mut out)?;
        }
    }
    Ok(out)
}

fn walk_field(
    pdf: &[u8],
    table: &XRefTable,
    field_obj: &Rc<PdfObject>,
    parent_name: String,
    out: &mut Vec<(String, PdfObjectId)>,
) -> Result<()> {
    let field = dereference(pdf, table, field_obj)?;
    let Some(dict) = field.as_dict() else {
        return Ok(());
    };
    let own_name = dict
        .get("T")
        .and_then(|o| match o.as_ref() {
            PdfObject::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        })
        .unwrap_or_default();
    let full_name = if parent_name.is_empty() {
        own_name
    } else if own_name.is_empty() {
        parent_name.clone()
    } else {
        format!("{parent_name}.{own_name}")
    };

    let is_sig_ft = dict.get("FT").and_then(|o| o.as_name()) == Some("Sig");
    if is_sig_ft {
        if let Some(v_ref) = field_obj_v_ref(dict) {
            out.push((full_name.clone(), v_ref));
        }
    }

    if let Some(kids_obj) = dict.get("Kids") {
        let kids = dereference(pdf, table, kids_obj)?;
        if let Some(arr) = kids.as_array() {
            for kid in arr {
                walk_field(pdf, table, kid, full_name.clone(), out)?;
            }
        }
    }
    Ok(())
}

fn field_obj_v_ref(dict: &HashMap<String, Rc<PdfObject>>) -> Option<PdfObjectId> {
    dict.get("V").and_then(|o| o.as_ref_id())
}

/// Resolve the object id of the `page_number`-th page (1-indexed, document
/// order) by walking `/Root -> /Pages -> /Kids`, recursing into nested
/// `/Type /Pages` nodes. Needed because callers of `prepare_pdf` identify a
/// page by its ordinal position, not by its indirect object number.
pub fn find_page_object(pdf: &[u8], table: &XRefTable, page_number: u32) -> Result<PdfObjectId> {
    if page_number == 0 {
        return Err(PdfSignError::configuration("page numbers are 1-indexed"));
    }
    let root_ref = table
        .trailer
        .get("Root")
        .cloned()
        .ok_or_else(|| PdfSignError::pdf_parse("trailer missing /Root"))?;
    let root = dereference(pdf, table, &root_ref)?;
    let root_dict = root
        .as_dict()
        .ok_or_else(|| PdfSignError::pdf_parse("/Root is not a dictionary"))?;
    let pages_ref = root_dict
        .get("Pages")
        .ok_or_else(|| PdfSignError::pdf_parse("/Root missing /Pages"))?;
    let pages_id = pages_ref
        .as_ref_id()
        .ok_or_else(|| PdfSignError::pdf_parse("/Pages must be an indirect reference"))?;

    let mut remaining = page_number;
    walk_pages_tree(pdf, table, pages_id, &mut remaining)?
        .ok_or_else(|| PdfSignError::pdf_parse(format!("document has fewer than {page_number} pages")))
}

/// Depth-first walk of a `/Pages` node's `/Kids`; returns `Some(id)` once
/// `remaining` reaches zero on a `/Type /Page` leaf, decrementing it at
/// each leaf visited otherwise.
fn walk_pages_tree(
    pdf: &[u8],
    table: &XRefTable,
    node_id: PdfObjectId,
    remaining: &mut u32,
) -> Result<Option<PdfObjectId>> {
    let node = load_object(pdf, table, node_id)?;
    let dict = node
        .as_dict()
        .ok_or_else(|| PdfSignError::pdf_parse("page tree node is not a dictionary"))?;

    let is_intermediate = dict.get("Type").and_then(|o| o.as_name()) == Some("Pages") || dict.get("Kids").is_some();
    if !is_intermediate {
        *remaining -= 1;
        if *remaining == 0 {
            return Ok(Some(node_id));
        }
        return Ok(None);
    }

    let Some(kids_obj) = dict.get("Kids") else {
        return Ok(None);
    };
    let kids = dereference(pdf, table, kids_obj)?;
    let Some(arr) = kids.as_array() else {
        return Ok(None);
    };
    for kid in arr {
        let kid_id = kid
            .as_ref_id()
            .ok_or_else(|| PdfSignError::pdf_parse("/Kids entry must be an indirect reference"))?;
        if let Some(found) = walk_pages_tree(pdf, table, kid_id, remaining)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_startxref_picks_the_last_occurrence() {
        let pdf = b"startxref\n10\n%%EOF\nmore bytes startxref\n42\n%%EOF".to_vec();
        let offset = find_last_startxref(&pdf).unwrap();
        assert_eq!(offset, 42);
    }

    /// Builds a tiny in-memory document (Catalog -> Pages -> two leaf Pages,
    /// one nested Pages node with a third leaf) and an `XRefTable` whose
    /// entries point at the real byte offsets of each `obj`, so
    /// `find_page_object` exercises the same `load_object`/lexer path it
    /// would against a real file rather than hand-built `PdfObject`s.
    fn sample_document() -> (Vec<u8>, XRefTable) {
        let mut pdf = b"%PDF-1.7\n".to_vec();
        let mut table = XRefTable::new();

        let mut push_obj = |pdf: &mut Vec<u8>, table: &mut XRefTable, number: u32, body: &str| {
            let offset = pdf.len() as u64;
            pdf.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
            table.insert_entry(number, XrefEntry { offset, generation: 0, in_use: true });
        };

        push_obj(&mut pdf, &mut table, 1, "<< /Type /Catalog /Pages 2 0 R >>");
        push_obj(&mut pdf, &mut table, 2, "<< /Type /Pages /Kids [3 0 R 4 0 R 5 0 R] /Count 3 >>");
        push_obj(&mut pdf, &mut table, 3, "<< /Type /Page /Parent 2 0 R >>");
        push_obj(&mut pdf, &mut table, 4, "<< /Type /Pages /Kids [6 0 R] /Count 1 /Parent 2 0 R >>");
        push_obj(&mut pdf, &mut table, 5, "<< /Type /Page /Parent 2 0 R >>");
        push_obj(&mut pdf, &mut table, 6, "<< /Type /Page /Parent 4 0 R >>");

        table.trailer.insert("Root".to_string(), Rc::new(PdfObject::Ref(PdfObjectId { number: 1, generation: 0 })));
        (pdf, table)
    }

    #[test]
    fn finds_page_object_by_ordinal_across_nested_pages_nodes() {
        let (pdf, table) = sample_document();
        // Document order: obj 3, then (recursing into the nested Pages
        // node 4) obj 6, then obj 5.
        assert_eq!(find_page_object(&pdf, &table, 1).unwrap(), PdfObjectId { number: 3, generation: 0 });
        assert_eq!(find_page_object(&pdf, &table, 2).unwrap(), PdfObjectId { number: 6, generation: 0 });
        assert_eq!(find_page_object(&pdf, &table, 3).unwrap(), PdfObjectId { number: 5, generation: 0 });
    }

    #[test]
    fn page_number_beyond_last_page_is_an_error() {
        let (pdf, table) = sample_document();
        assert!(find_page_object(&pdf, &table, 4).is_err());
    }

    #[test]
    fn page_number_zero_is_rejected() {
        let (pdf, table) = sample_document();
        assert!(find_page_object(&pdf, &table, 0).is_err());
    }
}
