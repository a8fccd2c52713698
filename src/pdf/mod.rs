//! PDF byte scanner (C1) and minimal object model (C2).

pub mod lexer;
pub mod object;
pub mod scanner;
pub mod writer;
pub mod xref;

use std::rc::Rc;

use crate::error::{PdfSignError, Result};
use crate::types::{PdfObjectId, SignatureEntry};

/// Resolve the object id of the `page_number`-th page (1-indexed). Thin
/// wrapper so callers that only need a page lookup (not the full signature
/// enumeration) don't have to reach into `xref` directly.
pub fn find_page_object(pdf: &[u8], page_number: u32) -> Result<PdfObjectId> {
    let table = xref::load_xref_chain(pdf)?;
    xref::find_page_object(pdf, &table, page_number)
}

/// Enumerate every `/Type /Sig` value referenced from an AcroForm field.
/// Uses the xref-resolved `/V` reference to find each signature
/// dictionary's offset (shadow-attack resistant), then the byte scanner to
/// recover its exact `/ByteRange`/`/Contents` offsets from that object.
pub fn extract_all_signatures(pdf: &[u8]) -> Result<Vec<SignatureEntry>> {
    let table = xref::load_xref_chain(pdf)?;
    let fields = xref::enumerate_signature_fields(pdf, &table)?;

    let mut out = Vec::with_capacity(fields.len());
    for (field_name, sig_ref) in fields {
        let entry = table
            .entry(sig_ref.number)
            .ok_or_else(|| PdfSignError::signature_dictionary_not_found(format!(
                "field {field_name} references object {} which is not in the xref table",
                sig_ref.number
            )))?;
        let offsets = scanner::resolve_signature_offsets(pdf, entry.offset, sig_ref)?;
        let contents_der = scanner::extract_pkcs7_from_offsets(pdf, &offsets.contents)?;
        out.push(SignatureEntry {
            field_name,
            byte_range: offsets.byte_range,
            offsets,
            contents_der,
            signature_ref: sig_ref,
        });
    }

    if out.is_empty() {
        // Fall back to the last `/ByteRange` in the file: a document whose
        // xref is an xref *stream* (unsupported by the classic-table
        // walker above) can still be scanned byte-level for its most
        // recent signature.
        if let Ok((byte_range, _)) = scanner::find_byte_range(pdf) {
            let contents = scanner::find_contents_range(pdf, &byte_range)?;
            let contents_der = scanner::extract_pkcs7_from_offsets(pdf, &contents)?;
            out.push(SignatureEntry {
                field_name: String::new(),
                byte_range,
                offsets: crate::types::SignatureOffsets {
                    byte_range,
                    byte_range_brackets: (0, 0),
                    contents,
                    contents_angles: (contents.start - 1, contents.end),
                },
                contents_der,
                signature_ref: PdfObjectId { number: 0, generation: 0 },
            });
        }
    }

    out.sort_by_key(|e| e.byte_range.signed_revision_length());
    Ok(out)
}

/// Resolve a reference into the object it points to, loading it from the
/// xref chain on demand (used by validators that need catalog/page data).
pub fn dereference(
    pdf: &[u8],
    table: &object::XRefTable,
    obj: &Rc<object::PdfObject>,
) -> Result<Rc<object::PdfObject>> {
    xref::dereference(pdf, table, obj)
}
