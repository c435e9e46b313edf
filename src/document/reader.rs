// src/document/reader.rs
use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::UTF_16BE;
use lopdf::content::Content;
use lopdf::{Document as PdfDocument, Object, ObjectId};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::model::{
    Document, Page, ReportType, Rule, TextFragment, AVERAGE_GLYPH_WIDTH, RULE_THICKNESS,
};
use crate::utils::error::DocumentError;

const DEFAULT_PAGE_HEIGHT: f32 = 842.0;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(20[0-2][0-9]|2030)\b").expect("Failed to compile YEAR_RE"));

/// Loads a report PDF into positioned pages.
/// `year` comes from the file name when known; otherwise the first page text is searched.
pub fn read_document(
    path: &Path,
    year: Option<u32>,
    report_type: ReportType,
) -> Result<Document, DocumentError> {
    tracing::debug!("Loading PDF {}", path.display());
    let pdf = PdfDocument::load(path)?;
    let mut pages = read_pages(&pdf);

    if pages.iter().any(Page::is_blank) {
        tracing::debug!("Some pages carry no positioned text, using plain-text fallback");
        let plain_pages = pdf_extract::extract_text(path)
            .ok()
            .map(|text| split_text_into_pages(&text))
            .filter(|split| split.len() == pages.len());
        for (index, page) in pages.iter_mut().enumerate() {
            if !page.is_blank() {
                continue;
            }
            let text = plain_pages
                .as_ref()
                .and_then(|split| split.get(index).cloned())
                .or_else(|| pdf.extract_text(&[page.number]).ok())
                .unwrap_or_default();
            *page = Page::from_text(page.number, &text);
        }
    }

    if pages.is_empty() {
        return Err(DocumentError::Empty(path.display().to_string()));
    }

    let year = match year {
        Some(year) => year,
        None => year_from_pages(&pages)
            .ok_or_else(|| DocumentError::UnknownYear(path.display().to_string()))?,
    };

    tracing::info!(
        "Read {} pages from {} (year {}, {})",
        pages.len(),
        path.display(),
        year,
        report_type
    );

    Ok(Document {
        path: path.to_path_buf(),
        year,
        report_type,
        pages,
    })
}

/// Interprets every page's content stream. Pages that fail to decode come back blank.
pub fn read_pages(pdf: &PdfDocument) -> Vec<Page> {
    pdf.get_pages()
        .into_iter()
        .map(|(page_no, page_id)| {
            let height = page_height(pdf, page_id);
            let (fragments, rules) = interpret_page(pdf, page_id, height).unwrap_or_else(|| {
                tracing::debug!("Page {} content stream could not be decoded", page_no);
                (Vec::new(), Vec::new())
            });
            Page::from_fragments(page_no, fragments, rules)
        })
        .collect()
}

/// First plausible reporting year in the opening pages.
pub fn year_from_pages(pages: &[Page]) -> Option<u32> {
    pages.iter().take(2).find_map(|page| {
        YEAR_RE
            .captures(&page.text())
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

fn split_text_into_pages(raw_text: &str) -> Vec<String> {
    let mut pages = raw_text
        .split('\u{000C}')
        .map(str::to_string)
        .collect::<Vec<_>>();
    if pages.last().is_some_and(String::is_empty) {
        pages.pop();
    }
    pages
}

fn page_height(pdf: &PdfDocument, page_id: ObjectId) -> f32 {
    let mut current = Some(page_id);
    // MediaBox is inheritable, walk up the page tree.
    for _ in 0..16 {
        let Some(id) = current else { break };
        let Ok(dict) = pdf.get_dictionary(id) else { break };
        if let Ok(Object::Array(values)) = dict.get(b"MediaBox") {
            let numbers = values.iter().filter_map(number).collect::<Vec<_>>();
            if numbers.len() == 4 {
                return (numbers[3] - numbers[1]).abs();
            }
        }
        current = dict.get(b"Parent").and_then(|parent| parent.as_reference()).ok();
    }
    DEFAULT_PAGE_HEIGHT
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn looks_decoding_broken(text: &str) -> bool {
    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let replacement = text.matches('\u{FFFD}').count();
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
        .count();
    replacement * 8 > total || control * 5 > total
}

fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = PdfDocument::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    let utf16_hint = encoding.is_some_and(|name| {
        let lower = name.to_ascii_lowercase();
        lower.contains("identity-h") || lower.contains("utf16") || lower.contains("ucs2")
    });
    if utf16_hint || bytes.starts_with(&[0xFE, 0xFF]) {
        let body = bytes.strip_prefix(&[0xFE, 0xFF]).unwrap_or(bytes);
        let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(body);
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values = operands.iter().filter_map(number).collect::<Vec<_>>();
        if values.len() != 6 {
            return None;
        }
        Some(Matrix {
            a: values[0],
            b: values[1],
            c: values[2],
            d: values[3],
            e: values[4],
            f: values[5],
        })
    }

    /// `self × other`
    fn then(self, other: Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn vertical_scale(self) -> f32 {
        self.c.hypot(self.d)
    }
}

struct PageInterpreter<'a> {
    height: f32,
    encodings: BTreeMap<Vec<u8>, &'a str>,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f32,
    font_size: f32,
    encoding: Option<&'a str>,
    path_point: Option<(f32, f32)>,
    fragments: Vec<TextFragment>,
    rules: Vec<Rule>,
}

impl<'a> PageInterpreter<'a> {
    fn new(height: f32, encodings: BTreeMap<Vec<u8>, &'a str>) -> Self {
        Self {
            height,
            encodings,
            ctm: Matrix::IDENTITY,
            ctm_stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            leading: 0.0,
            font_size: 10.0,
            encoding: None,
            path_point: None,
            fragments: Vec::new(),
            rules: Vec::new(),
        }
    }

    fn execute(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(saved) = self.ctm_stack.pop() {
                    self.ctm = saved;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.ctm = matrix.then(self.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(font_name) = operands.first().and_then(|operand| operand.as_name().ok()) {
                    self.encoding = self.encodings.get(font_name).copied();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    self.leading = leading;
                }
            }
            "Td" | "TD" => {
                let tx = operands.first().and_then(number).unwrap_or(0.0);
                let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                if operator == "TD" {
                    self.leading = -ty;
                }
                self.move_line(tx, ty);
            }
            "Tm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.tm = matrix;
                    self.tlm = matrix;
                }
            }
            "T*" => self.move_line(0.0, -self.leading),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.move_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.move_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0 * self.font_size;
                                    self.tm = Matrix::translate(tx, 0.0).then(self.tm);
                                }
                            }
                        }
                    }
                }
            }
            "re" => {
                let values = operands.iter().filter_map(number).collect::<Vec<_>>();
                if values.len() == 4 {
                    self.rectangle(values[0], values[1], values[2], values[3]);
                }
            }
            "m" => {
                if let (Some(x), Some(y)) = (operands.first().and_then(number), operands.get(1).and_then(number)) {
                    self.path_point = Some(self.to_page(x, y));
                }
            }
            "l" => {
                if let (Some(x), Some(y)) = (operands.first().and_then(number), operands.get(1).and_then(number)) {
                    let end = self.to_page(x, y);
                    if let Some(start) = self.path_point {
                        self.push_rule(start, end);
                    }
                    self.path_point = Some(end);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(self.tlm);
        self.tm = self.tlm;
    }

    fn to_page(&self, x: f32, y: f32) -> (f32, f32) {
        let (px, py) = self.ctm.apply(x, y);
        (px, self.height - py)
    }

    fn show(&mut self, bytes: &[u8]) {
        let text = decode_pdf_bytes(self.encoding, bytes);
        let chars = text.chars().count();
        let rendering = self.tm.then(self.ctm);
        let (x, y) = rendering.apply(0.0, 0.0);
        let size = self.font_size * rendering.vertical_scale();
        if !text.trim().is_empty() {
            self.fragments
                .push(TextFragment::new(x, self.height - y, size.abs().max(1.0), text));
        }
        let advance = chars as f32 * self.font_size * AVERAGE_GLYPH_WIDTH;
        self.tm = Matrix::translate(advance, 0.0).then(self.tm);
    }

    fn rectangle(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let corners = [
            self.to_page(x, y),
            self.to_page(x + width, y),
            self.to_page(x + width, y + height),
            self.to_page(x, y + height),
        ];
        if width.abs() <= RULE_THICKNESS || height.abs() <= RULE_THICKNESS {
            // A thin filled box is how many producers draw a single ruling line.
            self.push_rule(corners[0], corners[2]);
            return;
        }
        for index in 0..4 {
            self.push_rule(corners[index], corners[(index + 1) % 4]);
        }
    }

    fn push_rule(&mut self, start: (f32, f32), end: (f32, f32)) {
        let rule = Rule::new(start.0, start.1, end.0, end.1);
        if rule.is_horizontal() || rule.is_vertical() {
            self.rules.push(rule);
        }
    }
}

fn interpret_page(
    pdf: &PdfDocument,
    page_id: ObjectId,
    height: f32,
) -> Option<(Vec<TextFragment>, Vec<Rule>)> {
    let raw_content = pdf.get_page_content(page_id).ok()?;
    let content = Content::decode(&raw_content).ok()?;
    let encodings = pdf
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect::<BTreeMap<Vec<u8>, &str>>();

    let mut interpreter = PageInterpreter::new(height, encodings);
    for operation in &content.operations {
        interpreter.execute(operation.operator.as_str(), &operation.operands);
    }
    Some((interpreter.fragments, interpreter.rules))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_form_feed_delimited_pages() {
        let pages = split_text_into_pages("p1\u{000C}p2\u{000C}");
        assert_eq!(pages, vec!["p1", "p2"]);
    }

    #[test]
    fn matrix_composition_applies_translation_after_scale() {
        let scaled = Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::IDENTITY
        };
        let combined = scaled.then(Matrix::translate(10.0, 20.0));
        assert_eq!(combined.apply(1.0, 1.0), (12.0, 22.0));
    }

    #[test]
    fn text_positions_follow_td_and_leading() {
        let mut interpreter = PageInterpreter::new(800.0, BTreeMap::new());
        interpreter.execute("BT", &[]);
        interpreter.execute("Tf", &["F1".into(), 10.into()]);
        interpreter.execute("TL", &[14.into()]);
        interpreter.execute("Td", &[50.into(), 700.into()]);
        interpreter.execute("Tj", &[Object::string_literal("Assets")]);
        interpreter.execute("T*", &[]);
        interpreter.execute("Tj", &[Object::string_literal("Listed")]);

        let fragments = &interpreter.fragments;
        assert_eq!(fragments.len(), 2);
        assert_eq!((fragments[0].x, fragments[0].y), (50.0, 100.0));
        assert_eq!((fragments[1].x, fragments[1].y), (50.0, 114.0));
    }

    #[test]
    fn rectangles_become_four_rules() {
        let mut interpreter = PageInterpreter::new(800.0, BTreeMap::new());
        interpreter.execute("re", &[10.into(), 10.into(), 100.into(), 20.into()]);
        let horizontal = interpreter.rules.iter().filter(|rule| rule.is_horizontal()).count();
        let vertical = interpreter.rules.iter().filter(|rule| rule.is_vertical()).count();
        assert_eq!((horizontal, vertical), (2, 2));
    }

    #[test]
    fn year_is_found_in_opening_page_text() {
        let pages = vec![Page::from_text(1, "Half-year report\nJanuary - June 2023")];
        assert_eq!(year_from_pages(&pages), Some(2023));
    }
}
