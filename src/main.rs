use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;

use officeside_pdf::{
    ConvertOptions, FlatRasterizer, PdfExtensionRule, PdfMarkupRenderer, PdfWmlExporter,
    convert_docx_to_pdf_with, convert_html_to_pdf_with, convert_ppt_to_pdf,
    convert_pptx_to_pdf_with, convert_spreadsheet_to_pdf_with,
};

#[derive(Parser)]
#[command(
    name = "officeside-pdf",
    about = "Convert office documents (DOCX, XLS, XLSX, PPTX, HTML) to PDF"
)]
struct Args {
    /// Input document (.docx, .xls, .xlsx, .pptx, .html)
    input: PathBuf,
    /// Output PDF file (defaults to the input path with a .pdf extension)
    output: Option<PathBuf>,
    /// Fallback font family for text whose font is not installed
    #[arg(long, value_name = "FAMILY")]
    main_font: Option<String>,
    /// Substitute a font family before rendering (repeatable)
    #[arg(long, value_name = "FROM=TO")]
    substitute: Vec<String>,
    /// Leave out the A, B, C… column header row in spreadsheet output
    #[arg(long)]
    no_column_headers: bool,
    /// Leave out the row-number column in spreadsheet output
    #[arg(long)]
    no_row_numbers: bool,
    /// Write the intermediate markup next to the PDF
    #[arg(long)]
    dump_markup: bool,
    /// Recognize the destination extension by everything after the first
    /// dot instead of the path suffix
    #[arg(long)]
    first_dot_extension: bool,
}

fn parse_substitutions(raw: &[String]) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();
    for pair in raw {
        let Some((from, to)) = pair.split_once('=') else {
            return Err(format!("expected FROM=TO, got '{pair}'"));
        };
        map.insert(from.to_string(), to.to_string());
    }
    Ok(map)
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if !args.input.exists() {
        eprintln!("Error: file not found: {}", args.input.display());
        std::process::exit(1);
    }
    if !args.input.is_file() {
        eprintln!("Error: not a file: {}", args.input.display());
        std::process::exit(1);
    }

    let font_substitutions = match parse_substitutions(&args.substitute) {
        Ok(map) => map,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let options = ConvertOptions {
        font_substitutions,
        main_font: args.main_font,
        include_column_headers: !args.no_column_headers,
        include_row_numbers: !args.no_row_numbers,
        debug_dump_markup: args.dump_markup,
        extension_rule: if args.first_dot_extension {
            PdfExtensionRule::AfterFirstDot
        } else {
            PdfExtensionRule::Suffix
        },
    };

    let extension = args
        .input
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let dest = args.output.as_deref();

    let result = match extension.as_str() {
        "docx" => {
            let exporter = PdfWmlExporter::new(options.main_font.clone());
            convert_docx_to_pdf_with(&args.input, dest, &options, &exporter)
        }
        "xls" | "xlsx" => {
            convert_spreadsheet_to_pdf_with(&args.input, dest, &options, &PdfMarkupRenderer)
        }
        "pptx" => convert_pptx_to_pdf_with(&args.input, dest, &options, &FlatRasterizer),
        "ppt" => convert_ppt_to_pdf(&args.input, dest),
        "html" | "htm" | "xhtml" => {
            convert_html_to_pdf_with(&args.input, dest, &options, &PdfMarkupRenderer)
        }
        _ => {
            eprintln!(
                "Error: unsupported input extension '{extension}' (expected docx, xls, xlsx, pptx or html)"
            );
            std::process::exit(1);
        }
    };

    match result {
        Ok(outcome) => println!("{}", outcome.output_path.display()),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
