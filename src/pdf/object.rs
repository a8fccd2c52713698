//! Minimal PDF object model (C2): just enough to load, modify, and write
//! incremental updates. Cross-references resolve through an arena-style
//! table; objects never hold owning back-pointers into each other.

use std::collections::HashMap;
use std::rc::Rc;

use crate::types::PdfObjectId;

#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Bool(bool),
    Number(f64),
    /// Raw bytes of a literal or hex string, plus which syntax it came from.
    String(Vec<u8>, StringKind),
    Name(String),
    Array(Vec<Rc<PdfObject>>),
    Dict(HashMap<String, Rc<PdfObject>>),
    Stream {
        dict: HashMap<String, Rc<PdfObject>>,
        data: Vec<u8>,
    },
    Ref(PdfObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    Literal,
    Hex,
}

impl PdfObject {
    pub fn as_dict(&self) -> Option<&HashMap<String, Rc<PdfObject>>> {
        match self {
            PdfObject::Dict(d) => Some(d),
            PdfObject::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfObject::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Rc<PdfObject>]> {
        match self {
            PdfObject::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PdfObject::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<PdfObjectId> {
        match self {
            PdfObject::Ref(id) => Some(*id),
            _ => None,
        }
    }
}

/// A single cross-reference table/stream entry.
#[derive(Debug, Clone, Copy)]
pub struct XrefEntry {
    pub offset: u64,
    pub generation: u16,
    pub in_use: bool,
}

/// Arena of indirect objects resolved from one or more xref sections,
/// newest revision first (as produced by walking `/Prev` chains).
#[derive(Debug, Default)]
pub struct XRefTable {
    entries: HashMap<u32, XrefEntry>,
    objects: HashMap<u32, Rc<PdfObject>>,
    pub trailer: HashMap<String, Rc<PdfObject>>,
}

impl XRefTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_entry(&mut self, number: u32, entry: XrefEntry) {
        self.entries.entry(number).or_insert(entry);
    }

    pub fn insert_object(&mut self, number: u32, object: Rc<PdfObject>) {
        self.objects.insert(number, object);
    }

    pub fn entry(&self, number: u32) -> Option<&XrefEntry> {
        self.entries.get(&number)
    }

    /// Resolve a reference to its target object. Pure lookup; never
    /// mutates, never follows cycles (a `Ref` pointing at a `Ref` is
    /// resolved exactly one level, matching how PDF indirection works).
    pub fn dereference(&self, id: PdfObjectId) -> Option<&Rc<PdfObject>> {
        self.objects.get(&id.number)
    }

    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }
}

/// Follows a single `/Ref` one level if present, otherwise returns the
/// object itself.
pub fn resolve<'a>(obj: &'a Rc<PdfObject>, xref: &'a XRefTable) -> Option<&'a Rc<PdfObject>> {
    match obj.as_ref() {
        PdfObject::Ref(id) => xref.dereference(*id),
        _ => Some(obj),
    }
}
