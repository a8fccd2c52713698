//! A tiny recursive-descent tokenizer/parser for PDF objects, used to walk
//! the xref/trailer chain and the AcroForm field tree. Deliberately not a
//! full PDF parser: it understands exactly the object syntax needed to
//! reach a signature dictionary (dicts, arrays, names, numbers, strings,
//! references, streams) and stops there.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{PdfSignError, Result};
use crate::pdf::object::{PdfObject, StringKind};
use crate::types::PdfObjectId;

const WS: &[u8] = &[0x00, 0x09, 0x0A, 0x0C, 0x0D, 0x20];

pub struct Lexer<'a> {
    pub pdf: &'a [u8],
    pub pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(pdf: &'a [u8], pos: usize) -> Self {
        Self { pdf, pos }
    }

    fn peek(&self) -> Option<u8> {
        self.pdf.get(self.pos).copied()
    }

    pub fn skip_ws(&mut self) {
        loop {
            while let Some(b) = self.peek() {
                if WS.contains(&b) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if self.peek() == Some(b'%') {
                while let Some(b) = self.peek() {
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn starts_with(&self, token: &[u8]) -> bool {
        self.pdf[self.pos..].starts_with(token)
    }

    /// Parse one PDF object at the current position. Does not resolve
    /// `N G R` references into their targets; returns `PdfObject::Ref`.
    pub fn parse_object(&mut self) -> Result<PdfObject> {
        self.skip_ws();
        match self.peek() {
            None => Err(PdfSignError::pdf_parse("unexpected end of file parsing object")),
            Some(b'/') => Ok(PdfObject::Name(self.parse_name()?)),
            Some(b'(') => Ok(PdfObject::String(self.parse_literal_string()?, StringKind::Literal)),
            Some(b'<') if self.pdf.get(self.pos + 1) == Some(&b'<') => self.parse_dict_or_stream(),
            Some(b'<') => Ok(PdfObject::String(self.parse_hex_string()?, StringKind::Hex)),
            Some(b'[') => self.parse_array(),
            Some(b't') if self.starts_with(b"true") => {
                self.pos += 4;
                Ok(PdfObject::Bool(true))
            }
            Some(b'f') if self.starts_with(b"false") => {
                self.pos += 5;
                Ok(PdfObject::Bool(false))
            }
            Some(b'n') if self.starts_with(b"null") => {
                self.pos += 4;
                Ok(PdfObject::Null)
            }
            Some(b) if b.is_ascii_digit() || b == b'+' || b == b'-' || b == b'.' => {
                self.parse_number_or_ref()
            }
            Some(other) => Err(PdfSignError::pdf_parse(format!(
                "unexpected byte 0x{other:02x} at offset {}",
                self.pos
            ))),
        }
    }

    fn parse_name(&mut self) -> Result<String> {
        debug_assert_eq!(self.peek(), Some(b'/'));
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if WS.contains(&b) || matches!(b, b'/' | b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'%') {
                break;
            }
            self.pos += 1;
        }
        let raw = &self.pdf[start..self.pos];
        Ok(decode_name(raw))
    }

    fn parse_literal_string(&mut self) -> Result<Vec<u8>> {
        debug_assert_eq!(self.peek(), Some(b'('));
        self.pos += 1;
        let mut depth = 1i32;
        let mut out = Vec::new();
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' => {
                    if let Some(next) = self.peek() {
                        self.pos += 1;
                        out.push(next);
                    }
                }
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                _ => out.push(b),
            }
        }
        Err(PdfSignError::pdf_parse("unterminated literal string"))
    }

    fn parse_hex_string(&mut self) -> Result<Vec<u8>> {
        debug_assert_eq!(self.peek(), Some(b'<'));
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some() && self.peek() != Some(b'>') {
            self.pos += 1;
        }
        if self.peek() != Some(b'>') {
            return Err(PdfSignError::pdf_parse("unterminated hex string"));
        }
        let raw = &self.pdf[start..self.pos];
        self.pos += 1;
        Ok(raw.to_vec())
    }

    fn parse_array(&mut self) -> Result<PdfObject> {
        debug_assert_eq!(self.peek(), Some(b'['));
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b']') {
                self.pos += 1;
                break;
            }
            if self.peek().is_none() {
                return Err(PdfSignError::pdf_parse("unterminated array"));
            }
            items.push(Rc::new(self.parse_object()?));
        }
        Ok(PdfObject::Array(items))
    }

    fn parse_dict_or_stream(&mut self) -> Result<PdfObject> {
        self.pos += 2;
        let mut dict = HashMap::new();
        loop {
            self.skip_ws();
            if self.starts_with(b">>") {
                self.pos += 2;
                break;
            }
            if self.peek() != Some(b'/') {
                return Err(PdfSignError::pdf_parse("expected dictionary key"));
            }
            let key = self.parse_name()?;
            let value = self.parse_object()?;
            dict.insert(key, Rc::new(value));
        }
        self.skip_ws();
        if self.starts_with(b"stream") {
            self.pos += 6;
            if self.peek() == Some(b'\r') {
                self.pos += 1;
            }
            if self.peek() == Some(b'\n') {
                self.pos += 1;
            }
            let len = dict
                .get("Length")
                .and_then(|o| o.as_number())
                .map(|n| n as usize)
                .unwrap_or(0);
            let data_start = self.pos;
            let data_end = (data_start + len).min(self.pdf.len());
            let data = self.pdf[data_start..data_end].to_vec();
            self.pos = data_end;
            self.skip_ws();
            if self.starts_with(b"endstream") {
                self.pos += 9;
            }
            return Ok(PdfObject::Stream { dict, data });
        }
        Ok(PdfObject::Dict(dict))
    }

    fn parse_number_or_ref(&mut self) -> Result<PdfObject> {
        let checkpoint = self.pos;
        let first = self.parse_raw_number()?;
        let after_first = self.pos;
        self.skip_ws();
        if let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                let gen_checkpoint = self.pos;
                if let Ok(second) = self.parse_raw_number() {
                    self.skip_ws();
                    if self.peek() == Some(b'R')
                        && self
                            .pdf
                            .get(self.pos + 1)
                            .map(|b| WS.contains(b) || matches!(b, b'/' | b'[' | b']' | b'<' | b'>' | b')'))
                            .unwrap_or(true)
                    {
                        self.pos += 1;
                        return Ok(PdfObject::Ref(PdfObjectId {
                            number: first as u32,
                            generation: second as u16,
                        }));
                    }
                }
                self.pos = gen_checkpoint;
            }
        }
        self.pos = after_first;
        let _ = checkpoint;
        Ok(PdfObject::Number(first))
    }

    fn parse_raw_number(&mut self) -> Result<f64> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        let mut saw_digit = false;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                saw_digit = true;
                self.pos += 1;
            } else if b == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if !saw_digit {
            self.pos = start;
            return Err(PdfSignError::pdf_parse("expected number"));
        }
        std::str::from_utf8(&self.pdf[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| PdfSignError::pdf_parse("malformed number literal"))
    }
}

fn decode_name(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let (Some(h), Some(l)) = (
                (raw[i + 1] as char).to_digit(16),
                (raw[i + 2] as char).to_digit(16),
            ) {
                out.push(((h << 4) | l) as u8);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_dictionary() {
        let pdf = b"<< /Type /Sig /ByteRange [0 1 2 3] /Ref 5 0 R >>";
        let mut lexer = Lexer::new(pdf, 0);
        let obj = lexer.parse_object().unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name(), Some("Sig"));
        assert_eq!(dict.get("Ref").unwrap().as_ref_id().unwrap().number, 5);
    }

    #[test]
    fn decodes_hash_escapes_in_names() {
        assert_eq!(decode_name(b"Na#6de"), "Name");
    }
}
