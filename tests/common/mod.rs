// tests/common/mod.rs
#![allow(dead_code)]

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
const LINE_HEIGHT: f32 = 14.0;

/// One page of drawing operations. Coordinates are top-down, like the reader's output.
#[derive(Default)]
pub struct PdfPage {
    operations: Vec<Operation>,
}

impl PdfPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A text run with its baseline at `y` from the top of the page.
    pub fn text(mut self, x: f32, y: f32, size: f32, text: &str) -> Self {
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Real(size)]),
            Operation::new(
                "Tm",
                vec![
                    Object::Integer(1),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Real(x),
                    Object::Real(PAGE_HEIGHT - y),
                ],
            ),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]);
        self
    }

    /// A stroked ruling from (x1, y1) to (x2, y2).
    pub fn rule(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.operations.extend([
            Operation::new("m", vec![Object::Real(x1), Object::Real(PAGE_HEIGHT - y1)]),
            Operation::new("l", vec![Object::Real(x2), Object::Real(PAGE_HEIGHT - y2)]),
            Operation::new("S", vec![]),
        ]);
        self
    }

    /// Lines at 14-unit spacing from the top. Cells separated by two spaces are drawn as
    /// separate runs at the given column offsets; the first cell starts at 50.
    pub fn lines(mut self, lines: &[&str], columns: &[f32]) -> Self {
        for (index, line) in lines.iter().enumerate() {
            let y = 60.0 + LINE_HEIGHT * index as f32;
            let cells = line.split("  ").map(str::trim).filter(|cell| !cell.is_empty());
            for (col, cell) in cells.enumerate() {
                let x = if col == 0 {
                    50.0
                } else {
                    columns.get(col - 1).copied().unwrap_or(300.0 + 100.0 * (col - 1) as f32)
                };
                self = self.text(x, y, 10.0, cell);
            }
        }
        self
    }

    /// Lines drawn as single runs, column gaps included in the run's text.
    pub fn plain_lines(mut self, lines: &[&str]) -> Self {
        for (index, line) in lines.iter().enumerate() {
            self = self.text(50.0, 60.0 + LINE_HEIGHT * index as f32, 10.0, line);
        }
        self
    }

    /// A fully ruled table with 20-unit rows starting at `top`, columns bounded by `edges`.
    pub fn ruled_table(mut self, top: f32, edges: &[f32], rows: &[&[&str]]) -> Self {
        let height = 20.0;
        let bottom = top + height * rows.len() as f32;
        for (index, row) in rows.iter().enumerate() {
            let baseline = top + height * index as f32 + 14.0;
            for (col, cell) in row.iter().enumerate() {
                if !cell.is_empty() {
                    self = self.text(edges[col] + 5.0, baseline, 9.0, cell);
                }
            }
        }
        let (left, right) = (edges[0], edges[edges.len() - 1]);
        for index in 0..=rows.len() {
            let y = top + height * index as f32;
            self = self.rule(left, y, right, y);
        }
        for &x in edges {
            self = self.rule(x, top, x, bottom);
        }
        self
    }
}

/// Writes a PDF with one Helvetica font shared by all pages.
pub fn write_pdf(path: &Path, pages: Vec<PdfPage>) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for page in pages {
        let content = Content {
            operations: page.operations,
        };
        let stream = Stream::new(dictionary! {}, content.encode().expect("content should encode"));
        let content_id = doc.add_object(stream);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("pdf should be written");
}

pub const BALANCE_LABELS: [&str; 17] = [
    "Equities and participations, listed",
    "Equities and participations, unlisted",
    "Bonds and other fixed-income securities",
    "Derivative instruments",
    "Cash and bank balances",
    "Other assets",
    "Prepaid expenses and accrued income",
    "Total assets",
    "Derivative instruments",
    "Other liabilities",
    "Deferred income and accrued expenses",
    "Total liabilities",
    "Fund capital carried forward",
    "Net payments to the national pension system",
    "Net result for the period",
    "Total fund capital",
    "Total fund capital and liabilities",
];

pub const RATIO_LABELS: [&str; 3] = [
    "Fund capital carried forward, SEK bn",
    "Net outflows to the national pension system, SEK bn",
    "Net result for the period, SEK bn",
];

/// Printed figures for one report, each "current  prior", in label order.
#[derive(Clone, Copy)]
pub struct ReportFigures {
    pub ratios: [&'static str; 3],
    pub balance: [&'static str; 17],
}

pub const FIGURES_2024: ReportFigures = ReportFigures {
    ratios: ["357.9  335.0", "-3.4  -6.1", "10.7  16.9"],
    balance: [
        "184 676  170 000",
        "80 112  79 000",
        "98 500  95 000",
        "1 200  900",
        "2 025  1 800",
        "350  300",
        "1 100  1 000",
        "367 963  348 000",
        "2 410  1 900",
        "300  250",
        "90  80",
        "2 800  2 230",
        "357 900  335 000",
        "-3 400  -6 100",
        "10 663  16 870",
        "365 163  345 770",
        "367 963  348 000",
    ],
};

pub const FIGURES_2023: ReportFigures = ReportFigures {
    ratios: ["335.0  320.4", "-6.1  -5.8", "16.9  9.2"],
    balance: [
        "170 000  160 000",
        "79 000  75 000",
        "95 000  90 000",
        "900  800",
        "1 800  1 500",
        "300  200",
        "1 000  900",
        "348 000  328 400",
        "1 900  1 700",
        "250  200",
        "80  70",
        "2 230  1 970",
        "335 000  320 400",
        "-6 100  -5 800",
        "16 870  9 200",
        "345 770  323 800",
        "348 000  325 770",
    ],
};

pub fn balance_sheet_lines(figures: &ReportFigures) -> Vec<String> {
    let row = |index: usize| format!("{}  {}", BALANCE_LABELS[index], figures.balance[index]);
    let mut lines = vec!["Balance sheet, SEK million".to_string(), "Assets".to_string()];
    lines.extend((0..8).map(row));
    lines.push("Fund capital and liabilities".to_string());
    lines.push("Liabilities".to_string());
    lines.extend((8..12).map(row));
    lines.push("Fund capital".to_string());
    lines.extend((12..17).map(row));
    lines
}

pub fn key_ratio_lines(figures: &ReportFigures) -> Vec<String> {
    let mut lines = vec!["Key ratios".to_string()];
    lines.extend(
        RATIO_LABELS
            .iter()
            .zip(figures.ratios)
            .map(|(label, values)| format!("{}  {}", label, values)),
    );
    lines
}

/// Cover page, key ratios page, balance sheet page. Labels sit on the left and each period
/// column is a separate run further right.
pub fn half_year_report(path: &Path, year: u32, figures: &ReportFigures) {
    let ratios = key_ratio_lines(figures);
    let ratios = ratios.iter().map(String::as_str).collect::<Vec<_>>();
    let balance = balance_sheet_lines(figures);
    let balance = balance.iter().map(String::as_str).collect::<Vec<_>>();
    write_pdf(
        path,
        vec![
            PdfPage::new().plain_lines(&[&format!("Half-year report {}", year)]),
            PdfPage::new().lines(&ratios, &[330.0, 390.0]),
            PdfPage::new().lines(&balance, &[300.0, 400.0]),
        ],
    );
}
