use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};

use crate::error::Error;
use crate::model::Markup;

/// Read every worksheet of a workbook. `open_workbook_auto` picks the
/// backend from the extension, so the same loader covers legacy `.xls`
/// and OOXML `.xlsx` files.
pub fn load_workbook(path: &Path) -> Result<Vec<(String, Range<Data>)>, Error> {
    let mut workbook = open_workbook_auto(path)?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        sheets.push((name, range));
    }
    Ok(sheets)
}

/// Generate the intermediate HTML markup for a workbook: one table per
/// sheet, optionally preceded by an `A`, `B`, `C`… header row and a
/// row-number column. Charts and cell fill colors are not carried over.
pub fn to_markup(
    sheets: &[(String, Range<Data>)],
    include_column_headers: bool,
    include_row_numbers: bool,
) -> Result<Markup, Error> {
    let mut html = String::from(
        "<html>\n<head>\n<meta charset=\"utf-8\"/>\n<style>\n\
         table { border-collapse: collapse; margin-bottom: 1em; }\n\
         td, th { border: 1px solid black; padding: 2px 6px; }\n\
         </style>\n</head>\n<body>\n",
    );

    for (name, range) in sheets {
        html.push_str(&format!("<h2>{}</h2>\n<table>\n", escape_markup(name)));

        let (first_row, first_col) = range.start().unwrap_or((0, 0));

        if include_column_headers && range.width() > 0 {
            html.push_str("<tr>");
            if include_row_numbers {
                html.push_str("<th></th>");
            }
            for col in 0..range.width() as u32 {
                html.push_str(&format!("<th>{}</th>", column_label(first_col + col)));
            }
            html.push_str("</tr>\n");
        }

        for (i, row) in range.rows().enumerate() {
            html.push_str("<tr>");
            if include_row_numbers {
                html.push_str(&format!("<th>{}</th>", first_row as usize + i + 1));
            }
            for cell in row {
                html.push_str(&format!("<td>{}</td>", escape_markup(&cell_text(cell))));
            }
            html.push_str("</tr>\n");
        }

        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    Markup::from_source(html)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Whole numbers without the trailing ".0" float formatting
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Spreadsheet column label for a 0-based index: A..Z, AA, AB, …
fn column_label(mut index: u32) -> String {
    let mut label = String::new();
    loop {
        label.insert(0, (b'A' + (index % 26) as u8) as char);
        index /= 26;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    label
}
