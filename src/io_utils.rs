//! CSV plumbing: loading a file into a [`Dataset`] and exporting pivot rows.
//!
//! Input bytes are decoded with `encoding_rs` (UTF-8 unless told otherwise),
//! the delimiter follows the file extension unless overridden, and `-` reads
//! from stdin. Column types are inferred from the text before cells are
//! converted, so a numeric column lands as numbers and aggregates directly.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    data::{Dataset, Row, Value, format_number, parse_typed_value},
    pivot::PivotTable,
    table::pivot_headers,
    tree::PivotRowNode,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Buffered writer for `path`, or stdout when no path (or `-`) is given.
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    Ok(writer)
}

fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(reader))
}

fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ));
    }
    Ok(text.into_owned())
}

fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_field(field, encoding))
        .collect()
}

fn dataset_name(path: &Path) -> String {
    if is_dash(path) {
        return "stdin".to_string();
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads a delimited file into a dataset with an inferred schema.
///
/// Short records leave their trailing columns absent; extra cells beyond the
/// header are ignored.
pub fn load_dataset(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Dataset> {
    let mut reader = open_csv_reader_from_path(path, delimiter)?;
    let headers = decode_record(reader.byte_headers()?, encoding)
        .with_context(|| format!("Reading headers of {path:?}"))?;

    let mut raw_rows: Vec<Row> = Vec::new();
    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("Reading row {} of {path:?}", raw_rows.len() + 2))?
    {
        let cells = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {} of {path:?}", raw_rows.len() + 2))?;
        raw_rows.push(
            headers
                .iter()
                .zip(cells)
                .map(|(header, cell)| (header.clone(), Value::Text(cell)))
                .collect(),
        );
    }

    let mut dataset = Dataset::from_rows(dataset_name(path), raw_rows);
    for row in &mut dataset.data {
        for (field, value) in row.iter_mut() {
            let ty = dataset.schema.get(field).copied().unwrap_or_default();
            if let Value::Text(raw) = value {
                *value = parse_typed_value(raw, ty);
            }
        }
    }
    debug!(
        "Loaded {} row(s) with {} column(s) from {path:?}",
        dataset.row_count,
        headers.len()
    );
    Ok(dataset)
}

/// Writes the given visible rows as CSV: level, label, then one cell per
/// column key and value field.
pub fn write_pivot_csv<W: Write>(
    writer: W,
    table: &PivotTable,
    visible: &[&PivotRowNode],
    delimiter: u8,
) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(writer);

    let mut header = vec!["Level".to_string(), "Label".to_string()];
    header.extend(pivot_headers(table));
    csv_writer.write_record(&header)?;

    for node in visible {
        let mut record = vec![node.level.to_string(), node.label.clone()];
        for column in 0..table.columns.len() {
            record.extend(node.values.column(column).iter().map(|v| format_number(*v)));
        }
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush().context("Flushing pivot CSV output")?;
    Ok(())
}
