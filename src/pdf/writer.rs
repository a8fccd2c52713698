//! Incremental-update writer (C2 write side + placeholder reservation for
//! C12's `prepare_pdf`).
//!
//! Produces an appended revision: the original bytes are never touched:
//! modified objects (the page, the AcroForm, optionally the catalog for
//! DocMDP) are rewritten at new offsets under their *same* object number,
//! new objects (the signature field/dictionary) get fresh numbers, and a
//! new classical xref section + trailer (`/Prev` pointing at the previous
//! `startxref`) is appended.

use std::collections::HashMap;
use std::rc::Rc;

use chrono::Utc;

use crate::config::SignatureOptions;
use crate::error::{PdfSignError, Result};
use crate::pdf::lexer::Lexer;
use crate::pdf::object::{PdfObject, StringKind, XRefTable};
use crate::pdf::xref::{dereference, load_xref_chain};
use crate::types::{ByteRange, ContentsRange, DocMdpPermission, FieldMdpAction, PdfObjectId, Rectangle, SignatureMeta};

/// Result of `prepare_pdf`: the appended document plus the exact offsets a
/// caller needs to compute the document hash and later splice in the CMS.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub bytes: Vec<u8>,
    pub byte_range: ByteRange,
    pub contents: ContentsRange,
    pub field_object: PdfObjectId,
}

/// Width, in ASCII bytes, reserved for the literal `/ByteRange [...]`
/// array so it can be rewritten in place once the true offsets are known.
/// Four 10-digit integers plus separators and brackets.
const BYTE_RANGE_FIELD_WIDTH: usize = "/ByteRange [0000000000 0000000000 0000000000 0000000000]".len();

fn pdf_escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// Reserve a signature placeholder in `pdf`, returning the new document and
/// the offsets needed to compute its digest. This is the write half of
/// `prepare_pdf`; it does not perform any hashing or signing itself.
pub fn reserve_placeholder(
    pdf: &[u8],
    page_object: PdfObjectId,
    bounds: Rectangle,
    meta: &SignatureMeta,
    options: &SignatureOptions,
    docmdp: Option<DocMdpPermission>,
    field_mdp: Option<&FieldMdpAction>,
) -> Result<PreparedDocument> {
    let xref = load_xref_chain(pdf)?;
    let prev_startxref = crate::pdf::xref::find_last_startxref_pub(pdf)?;

    let mut next_obj = xref.max_object_number() + 1;
    let field_obj = next_obj;
    next_obj += 1;

    let root_ref = xref
        .trailer
        .get("Root")
        .and_then(|o| o.as_ref_id())
        .ok_or_else(|| PdfSignError::pdf_parse("trailer missing /Root reference"))?;
    let root = dereference(pdf, &xref, &Rc::new(PdfObject::Ref(root_ref)))?;
    let root_dict = root
        .as_dict()
        .ok_or_else(|| PdfSignError::pdf_parse("/Root is not a dictionary"))?
        .clone();

    let (acroform_id, mut acroform_dict, acroform_is_new) = match root_dict.get("AcroForm") {
        Some(obj) => {
            let id = obj
                .as_ref_id()
                .ok_or_else(|| PdfSignError::pdf_parse("/AcroForm must be an indirect reference"))?;
            let resolved = dereference(pdf, &xref, obj)?;
            let dict = resolved
                .as_dict()
                .ok_or_else(|| PdfSignError::pdf_parse("/AcroForm is not a dictionary"))?
                .clone();
            (id, dict, false)
        }
        None => {
            let id = PdfObjectId { number: next_obj, generation: 0 };
            next_obj += 1;
            (id, HashMap::new(), true)
        }
    };

    let fields_array_id = acroform_dict.get("Fields").and_then(|o| o.as_ref_id());
    let mut fields_items: Vec<Rc<PdfObject>> = match acroform_dict.get("Fields") {
        Some(obj) => dereference(pdf, &xref, obj)?
            .as_array()
            .map(|a| a.to_vec())
            .unwrap_or_default(),
        None => Vec::new(),
    };
    fields_items.push(Rc::new(PdfObject::Ref(PdfObjectId { number: field_obj, generation: 0 })));

    let fields_owning_id = fields_array_id.unwrap_or(acroform_id);

    acroform_dict.insert("Fields".to_string(), Rc::new(PdfObject::Ref(fields_owning_id)));
    acroform_dict.insert("SigFlags".to_string(), Rc::new(PdfObject::Number(3.0)));

    let page = dereference(pdf, &xref, &Rc::new(PdfObject::Ref(page_object)))?;
    let mut page_dict = page
        .as_dict()
        .ok_or_else(|| PdfSignError::pdf_parse("page object is not a dictionary"))?
        .clone();
    let mut annots: Vec<Rc<PdfObject>> = match page_dict.get("Annots") {
        Some(obj) => dereference(pdf, &xref, obj)?
            .as_array()
            .map(|a| a.to_vec())
            .unwrap_or_default(),
        None => Vec::new(),
    };
    annots.push(Rc::new(PdfObject::Ref(PdfObjectId { number: field_obj, generation: 0 })));
    page_dict.insert("Annots".to_string(), Rc::new(PdfObject::Array(annots)));

    let mut new_root_dict = root_dict.clone();
    if acroform_is_new || docmdp.is_some() {
        new_root_dict.insert("AcroForm".to_string(), Rc::new(PdfObject::Ref(acroform_id)));
    }
    let root_changed = acroform_is_new || docmdp.is_some();
    if let Some(permission) = docmdp {
        new_root_dict.insert(
            "Perms".to_string(),
            Rc::new(PdfObject::Dict({
                let mut m = HashMap::new();
                m.insert(
                    "DocMDP".to_string(),
                    Rc::new(PdfObject::Ref(PdfObjectId { number: field_obj, generation: 0 })),
                );
                m
            })),
        );
        let _ = permission;
    }

    // --- Serialize the appended revision -----------------------------
    let mut out = pdf.to_vec();
    let mut offsets: HashMap<u32, usize> = HashMap::new();

    let contents_reserve_hex = options.contents_reserve_bytes * 2;
    let byte_range_placeholder = format!(
        "/ByteRange [{:0>10} {:0>10} {:0>10} {:0>10}]",
        0, 0, 0, 0
    );
    debug_assert_eq!(byte_range_placeholder.len(), BYTE_RANGE_FIELD_WIDTH);

    offsets.insert(field_obj, out.len());
    let time_str = meta
        .signing_time
        .unwrap_or_else(Utc::now)
        .format("D:%Y%m%d%H%M%S+00'00'")
        .to_string();

    let mut sig_dict_text = String::new();
    sig_dict_text.push_str(&format!("{} 0 obj\n<< /Type /Sig /FT /Sig /Subtype /Widget /F 132", field_obj));
    sig_dict_text.push_str(&format!(" /T ({})", pdf_escape_literal(&meta.field_name)));
    sig_dict_text.push_str(&format!(
        " /Rect [{} {} {} {}]",
        bounds.x, bounds.y, bounds.x + bounds.width, bounds.y + bounds.height
    ));
    sig_dict_text.push_str(&format!(" /P {} 0 R", page_object.number));
    sig_dict_text.push_str(" /Filter /Adobe.PPKLite /SubFilter /ETSI.CAdES.detached");
    sig_dict_text.push_str(&format!(" /M ({})", time_str));
    if let Some(reason) = &meta.reason {
        sig_dict_text.push_str(&format!(" /Reason ({})", pdf_escape_literal(reason)));
    }
    if let Some(location) = &meta.location {
        sig_dict_text.push_str(&format!(" /Location ({})", pdf_escape_literal(location)));
    }
    if let Some(contact) = &meta.contact_info {
        sig_dict_text.push_str(&format!(" /ContactInfo ({})", pdf_escape_literal(contact)));
    }
    if docmdp.is_some() || field_mdp.is_some() {
        let mut refs = String::new();
        if let Some(permission) = docmdp {
            refs.push_str(&format!(
                "<< /Type /SigRef /TransformMethod /DocMDP /TransformParams << /Type /TransformParams /P {} /V /1.2 >> >>",
                permission as u8
            ));
        }
        if let Some(action) = field_mdp {
            if !refs.is_empty() {
                refs.push(' ');
            }
            let fields_literal: String = action
                .fields()
                .iter()
                .map(|f| format!("({})", pdf_escape_literal(f)))
                .collect::<Vec<_>>()
                .join(" ");
            refs.push_str(&format!(
                "<< /Type /SigRef /TransformMethod /FieldMDP /TransformParams << /Type /TransformParams /Action /{} /Fields [{}] /V /1.2 >> >>",
                action.action_name(),
                fields_literal
            ));
        }
        sig_dict_text.push_str(&format!(" /Reference [ {} ]", refs));
    }
    sig_dict_text.push(' ');
    let byte_range_offset_in_obj = sig_dict_text.len();
    sig_dict_text.push_str(&byte_range_placeholder);
    sig_dict_text.push_str(" /Contents <");
    let contents_open_in_obj = sig_dict_text.len() - 1;
    sig_dict_text.push_str(&"0".repeat(contents_reserve_hex));
    sig_dict_text.push_str("> >>\nendobj\n");

    let obj_start = out.len();
    out.extend_from_slice(sig_dict_text.as_bytes());

    let byte_range_brackets_start = obj_start + byte_range_offset_in_obj;
    let contents_angle_open = obj_start + contents_open_in_obj;
    let contents_start = contents_angle_open + 1;
    let contents_end = contents_start + contents_reserve_hex;

    if acroform_is_new {
        offsets.insert(acroform_id.number, out.len());
        append_dict_object(&mut out, acroform_id.number, &acroform_dict);
    } else if fields_array_id.is_none() {
        offsets.insert(acroform_id.number, out.len());
        append_dict_object(&mut out, acroform_id.number, &acroform_dict);
    } else {
        offsets.insert(acroform_id.number, out.len());
        append_dict_object(&mut out, acroform_id.number, &acroform_dict);
        offsets.insert(fields_owning_id.number, out.len());
        append_array_object(&mut out, fields_owning_id.number, &fields_items);
    }

    offsets.insert(page_object.number, out.len());
    append_dict_object(&mut out, page_object.number, &page_dict);

    if root_changed {
        offsets.insert(root_ref.number, out.len());
        append_dict_object(&mut out, root_ref.number, &new_root_dict);
    }

    let xref_start = out.len();
    let mut nums: Vec<u32> = offsets.keys().copied().collect();
    nums.sort_unstable();
    out.extend_from_slice(b"xref\n");
    let mut i = 0;
    while i < nums.len() {
        let mut j = i + 1;
        while j < nums.len() && nums[j] == nums[j - 1] + 1 {
            j += 1;
        }
        out.extend_from_slice(format!("{} {}\n", nums[i], j - i).as_bytes());
        for num in &nums[i..j] {
            out.extend_from_slice(format!("{:010} 00000 n \n", offsets[num]).as_bytes());
        }
        i = j;
    }
    out.extend_from_slice(b"trailer\n<< ");
    out.extend_from_slice(format!("/Size {} ", next_obj).as_bytes());
    out.extend_from_slice(format!("/Root {} 0 R ", root_ref.number).as_bytes());
    out.extend_from_slice(format!("/Prev {} ", prev_startxref).as_bytes());
    out.extend_from_slice(b">>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF");

    let s1 = 0usize;
    let l1 = contents_angle_open + 1;
    let s2 = contents_end;
    let l2 = out.len() - s2;
    let real_byte_range = format!(
        "/ByteRange [{} {} {} {}]",
        s1, l1, s2, l2
    );
    let mut padded = real_byte_range.into_bytes();
    if padded.len() > BYTE_RANGE_FIELD_WIDTH {
        return Err(PdfSignError::byte_range_invalid(
            "file too large for the fixed-width /ByteRange placeholder",
        ));
    }
    padded.resize(BYTE_RANGE_FIELD_WIDTH - 1, b' ');
    padded.push(b']');
    out[byte_range_brackets_start..byte_range_brackets_start + BYTE_RANGE_FIELD_WIDTH]
        .copy_from_slice(&padded);

    Ok(PreparedDocument {
        bytes: out,
        byte_range: ByteRange { s1, l1, s2, l2 },
        contents: ContentsRange { start: contents_start, end: contents_end },
        field_object: PdfObjectId { number: field_obj, generation: 0 },
    })
}

fn append_dict_object(out: &mut Vec<u8>, num: u32, dict: &HashMap<String, Rc<PdfObject>>) {
    out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
    serialize_dict(out, dict);
    out.extend_from_slice(b"\nendobj\n");
}

fn append_array_object(out: &mut Vec<u8>, num: u32, items: &[Rc<PdfObject>]) {
    out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
    serialize_array(out, items);
    out.extend_from_slice(b"\nendobj\n");
}

fn serialize_object(out: &mut Vec<u8>, obj: &PdfObject) {
    match obj {
        PdfObject::Null => out.extend_from_slice(b"null"),
        PdfObject::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        PdfObject::Number(n) => {
            if n.fract() == 0.0 {
                out.extend_from_slice(format!("{}", *n as i64).as_bytes());
            } else {
                out.extend_from_slice(format!("{}", n).as_bytes());
            }
        }
        PdfObject::String(bytes, StringKind::Literal) => {
            out.push(b'(');
            out.extend_from_slice(bytes);
            out.push(b')');
        }
        PdfObject::String(bytes, StringKind::Hex) => {
            out.push(b'<');
            out.extend_from_slice(hex::encode_upper(bytes).as_bytes());
            out.push(b'>');
        }
        PdfObject::Name(name) => {
            out.push(b'/');
            out.extend_from_slice(name.as_bytes());
        }
        PdfObject::Array(items) => serialize_array(out, items),
        PdfObject::Dict(dict) => serialize_dict(out, dict),
        PdfObject::Stream { dict, data } => {
            serialize_dict(out, dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\nendstream");
        }
        PdfObject::Ref(id) => {
            out.extend_from_slice(format!("{} {} R", id.number, id.generation).as_bytes());
        }
    }
}

fn serialize_array(out: &mut Vec<u8>, items: &[Rc<PdfObject>]) {
    out.push(b'[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        serialize_object(out, item);
    }
    out.push(b']');
}

fn serialize_dict(out: &mut Vec<u8>, dict: &HashMap<String, Rc<PdfObject>>) {
    out.extend_from_slice(b"<< ");
    for (key, value) in dict {
        out.push(b'/');
        out.extend_from_slice(key.as_bytes());
        out.push(b' ');
        serialize_object(out, value);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}

/// Hex-encode (uppercase) `pkcs7_der`, left-align it in the `/Contents`
/// placeholder, and zero-pad (`'0'`, ASCII `0x30`) out to the reserved
/// width. Fails if the signature doesn't fit.
pub fn embed_signature(prepared: &[u8], contents: ContentsRange, pkcs7_der: &[u8]) -> Result<Vec<u8>> {
    let hex_upper = hex::encode_upper(pkcs7_der);
    let placeholder_width = contents.hex_len();
    if hex_upper.len() > placeholder_width {
        return Err(PdfSignError::placeholder_too_small(format!(
            "signature needs {} hex chars but only {} were reserved",
            hex_upper.len(),
            placeholder_width
        )));
    }
    let mut out = prepared.to_vec();
    let mut payload = hex_upper.into_bytes();
    payload.resize(placeholder_width, b'0');
    out[contents.start..contents.end].copy_from_slice(&payload);
    Ok(out)
}

/// Parse the object at `pos` using the shared lexer; exposed for callers
/// that already hold a raw offset (e.g. from `resolve_signature_offsets`).
pub fn parse_object_at(pdf: &[u8], pos: usize) -> Result<PdfObject> {
    let mut lexer = Lexer::new(pdf, pos);
    lexer.parse_object()
}

/// One `/VRI` entry: the material relevant to a single signature, keyed
/// by the uppercase-hex SHA-1 of its CMS `/Contents` bytes.
#[derive(Debug, Clone, Default)]
pub struct VriEntry {
    /// Indices into [`DssMaterial::certs`].
    pub cert_indices: Vec<usize>,
    /// Indices into [`DssMaterial::crls`].
    pub crl_indices: Vec<usize>,
    /// Indices into [`DssMaterial::ocsps`].
    pub ocsp_indices: Vec<usize>,
    pub validation_time: Option<chrono::DateTime<Utc>>,
}

/// Everything needed to append a `/DSS` (Document Security Store) revision.
#[derive(Debug, Clone, Default)]
pub struct DssMaterial {
    pub certs: Vec<Vec<u8>>,
    pub crls: Vec<Vec<u8>>,
    pub ocsps: Vec<Vec<u8>>,
    /// `(uppercase-hex SHA-1 of the signature's CMS bytes, entry)`.
    pub vri: Vec<(String, VriEntry)>,
}

fn make_stream_object(data: &[u8]) -> PdfObject {
    let mut dict = HashMap::new();
    dict.insert("Length".to_string(), Rc::new(PdfObject::Number(data.len() as f64)));
    PdfObject::Stream { dict, data: data.to_vec() }
}

fn ref_array(nums: &[u32]) -> Rc<PdfObject> {
    Rc::new(PdfObject::Array(
        nums.iter()
            .map(|&n| Rc::new(PdfObject::Ref(PdfObjectId { number: n, generation: 0 })))
            .collect(),
    ))
}

/// Append a `/DSS` revision (LTV material for already-embedded signatures)
/// as a new incremental update, pointing `/Root /DSS` at it. Existing
/// content, including prior signatures and any prior `/DSS`, is untouched:
/// this only ever appends.
pub fn embed_dss(pdf: &[u8], material: &DssMaterial) -> Result<Vec<u8>> {
    let xref = load_xref_chain(pdf)?;
    let prev_startxref = crate::pdf::xref::find_last_startxref_pub(pdf)?;

    let mut next_obj = xref.max_object_number() + 1;
    let mut offsets: HashMap<u32, usize> = HashMap::new();
    let mut out = pdf.to_vec();

    let mut alloc = |next_obj: &mut u32| {
        let n = *next_obj;
        *next_obj += 1;
        n
    };

    let cert_nums: Vec<u32> = material.certs.iter().map(|_| alloc(&mut next_obj)).collect();
    let crl_nums: Vec<u32> = material.crls.iter().map(|_| alloc(&mut next_obj)).collect();
    let ocsp_nums: Vec<u32> = material.ocsps.iter().map(|_| alloc(&mut next_obj)).collect();
    let dss_obj = alloc(&mut next_obj);

    let root_ref = xref
        .trailer
        .get("Root")
        .and_then(|o| o.as_ref_id())
        .ok_or_else(|| PdfSignError::pdf_parse("trailer missing /Root reference"))?;
    let root = dereference(pdf, &xref, &Rc::new(PdfObject::Ref(root_ref)))?;
    let mut root_dict = root
        .as_dict()
        .ok_or_else(|| PdfSignError::pdf_parse("/Root is not a dictionary"))?
        .clone();
    root_dict.insert("DSS".to_string(), Rc::new(PdfObject::Ref(PdfObjectId { number: dss_obj, generation: 0 })));

    for (num, data) in cert_nums.iter().zip(&material.certs) {
        offsets.insert(*num, out.len());
        out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
        serialize_object(&mut out, &make_stream_object(data));
        out.extend_from_slice(b"\nendobj\n");
    }
    for (num, data) in crl_nums.iter().zip(&material.crls) {
        offsets.insert(*num, out.len());
        out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
        serialize_object(&mut out, &make_stream_object(data));
        out.extend_from_slice(b"\nendobj\n");
    }
    for (num, data) in ocsp_nums.iter().zip(&material.ocsps) {
        offsets.insert(*num, out.len());
        out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
        serialize_object(&mut out, &make_stream_object(data));
        out.extend_from_slice(b"\nendobj\n");
    }

    let mut vri_dict = HashMap::new();
    for (key, entry) in &material.vri {
        let mut entry_dict = HashMap::new();
        let certs: Vec<u32> = entry.cert_indices.iter().filter_map(|&i| cert_nums.get(i).copied()).collect();
        let crls: Vec<u32> = entry.crl_indices.iter().filter_map(|&i| crl_nums.get(i).copied()).collect();
        let ocsps: Vec<u32> = entry.ocsp_indices.iter().filter_map(|&i| ocsp_nums.get(i).copied()).collect();
        if !certs.is_empty() {
            entry_dict.insert("Cert".to_string(), ref_array(&certs));
        }
        if !crls.is_empty() {
            entry_dict.insert("CRL".to_string(), ref_array(&crls));
        }
        if !ocsps.is_empty() {
            entry_dict.insert("OCSP".to_string(), ref_array(&ocsps));
        }
        if let Some(tu) = entry.validation_time {
            let text = tu.format("D:%Y%m%d%H%M%S+00'00'").to_string();
            entry_dict.insert("TU".to_string(), Rc::new(PdfObject::String(text.into_bytes(), StringKind::Literal)));
        }
        vri_dict.insert(key.clone(), Rc::new(PdfObject::Dict(entry_dict)));
    }

    let mut dss_dict = HashMap::new();
    dss_dict.insert("Type".to_string(), Rc::new(PdfObject::Name("DSS".to_string())));
    if !cert_nums.is_empty() {
        dss_dict.insert("Certs".to_string(), ref_array(&cert_nums));
    }
    if !crl_nums.is_empty() {
        dss_dict.insert("CRLs".to_string(), ref_array(&crl_nums));
    }
    if !ocsp_nums.is_empty() {
        dss_dict.insert("OCSPs".to_string(), ref_array(&ocsp_nums));
    }
    if !vri_dict.is_empty() {
        dss_dict.insert("VRI".to_string(), Rc::new(PdfObject::Dict(vri_dict)));
    }

    offsets.insert(dss_obj, out.len());
    append_dict_object(&mut out, dss_obj, &dss_dict);

    offsets.insert(root_ref.number, out.len());
    append_dict_object(&mut out, root_ref.number, &root_dict);

    let xref_start = out.len();
    let mut nums: Vec<u32> = offsets.keys().copied().collect();
    nums.sort_unstable();
    out.extend_from_slice(b"xref\n");
    let mut i = 0;
    while i < nums.len() {
        let mut j = i + 1;
        while j < nums.len() && nums[j] == nums[j - 1] + 1 {
            j += 1;
        }
        out.extend_from_slice(format!("{} {}\n", nums[i], j - i).as_bytes());
        for num in &nums[i..j] {
            out.extend_from_slice(format!("{:010} 00000 n \n", offsets[num]).as_bytes());
        }
        i = j;
    }
    out.extend_from_slice(b"trailer\n<< ");
    out.extend_from_slice(format!("/Size {} ", next_obj).as_bytes());
    out.extend_from_slice(format!("/Root {} 0 R ", root_ref.number).as_bytes());
    out.extend_from_slice(format!("/Prev {} ", prev_startxref).as_bytes());
    out.extend_from_slice(b">>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF");

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_signature_rejects_oversized_signature() {
        let prepared = b"<0000>".to_vec();
        let contents = ContentsRange { start: 1, end: 5 };
        let err = embed_signature(&prepared, contents, &[0xAA, 0xBB, 0xCC]).unwrap_err();
        assert_eq!(err.error_code(), crate::error::ErrorCode::PlaceholderTooSmall);
    }

    #[test]
    fn embed_signature_pads_with_ascii_zero() {
        let mut prepared = b"X".to_vec();
        prepared.extend(std::iter::repeat(b'0').take(10));
        let contents = ContentsRange { start: 1, end: 11 };
        let signed = embed_signature(&prepared, contents, &[0xAB]).unwrap();
        assert_eq!(&signed[1..11], b"AB00000000");
    }
}
