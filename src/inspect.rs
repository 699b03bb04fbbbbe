use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use calamine::{Data, Range, Reader, Xlsx};

use crate::error::{RenderError, Result};

/// Shape and inferred column types of one sheet read back from a workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSummary {
    pub index: usize,
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub headers: Vec<String>,
    pub column_types: Vec<ColumnKind>,
}

impl fmt::Display for SheetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&str> = self.column_types.iter().map(|kind| kind.label()).collect();
        write!(
            f,
            "{}\t{}\trows={}\tcols={}\ttypes=[{}]",
            self.index + 1,
            self.name,
            self.rows,
            self.cols,
            types.join(",")
        )
    }
}

pub fn inspect_workbook(path: &Path) -> Result<Vec<SheetSummary>> {
    let file = File::open(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    inspect_reader(BufReader::new(file), path)
}

/// Summarize every sheet of an xlsx stream; `path` only labels errors.
pub fn inspect_reader<R: Read + Seek>(reader: R, path: &Path) -> Result<Vec<SheetSummary>> {
    let inspect_error = |message: String| RenderError::Inspect {
        path: path.to_path_buf(),
        message,
    };
    let mut workbook: Xlsx<R> =
        Xlsx::new(reader).map_err(|e| inspect_error(format!("not an xlsx workbook: {}", e)))?;

    let sheet_names = workbook.sheet_names();
    let mut summaries = Vec::with_capacity(sheet_names.len());
    for (index, name) in sheet_names.into_iter().enumerate() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| inspect_error(format!("failed loading sheet '{}': {}", name, e)))?;
        let (rows, cols) = range.get_size();
        summaries.push(SheetSummary {
            index,
            headers: extract_headers(&range),
            column_types: infer_column_types(&range),
            name,
            rows,
            cols,
        });
    }
    Ok(summaries)
}

/// Column types over the data rows (the first row is taken as the header).
fn infer_column_types(range: &Range<Data>) -> Vec<ColumnKind> {
    let (_, width) = range.get_size();
    let mut kinds = vec![ColumnKind::Empty; width];
    for row in range.rows().skip(1) {
        for (idx, cell) in row.iter().enumerate() {
            kinds[idx].update(classify_cell(cell));
        }
    }
    kinds
}

fn extract_headers(range: &Range<Data>) -> Vec<String> {
    range
        .rows()
        .next()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .unwrap_or_default()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Empty,
    Int,
    Float,
    Bool,
    Date,
    Duration,
    String,
    Error,
    Mixed,
}

impl ColumnKind {
    fn update(&mut self, cell: ColumnKind) {
        use ColumnKind::*;
        *self = match (*self, cell) {
            (current, Empty) => current,
            (Empty, next) => next,
            (Mixed, _) => Mixed,
            (Int, Float) | (Float, Int) => Float,
            (current, next) if current == next => current,
            _ => Mixed,
        };
    }

    pub fn label(self) -> &'static str {
        match self {
            ColumnKind::Empty => "empty",
            ColumnKind::Int => "int",
            ColumnKind::Float => "float",
            ColumnKind::Bool => "bool",
            ColumnKind::Date => "date",
            ColumnKind::Duration => "duration",
            ColumnKind::String => "string",
            ColumnKind::Error => "error",
            ColumnKind::Mixed => "mixed",
        }
    }
}

fn classify_cell(cell: &Data) -> ColumnKind {
    match cell {
        Data::Empty => ColumnKind::Empty,
        Data::Int(_) => ColumnKind::Int,
        // Numbers are stored as doubles; whole values read back as integers.
        Data::Float(value) if value.fract() == 0.0 => ColumnKind::Int,
        Data::Float(_) => ColumnKind::Float,
        Data::Bool(_) => ColumnKind::Bool,
        Data::DateTime(dt) if dt.is_duration() => ColumnKind::Duration,
        Data::DateTime(_) | Data::DateTimeIso(_) => ColumnKind::Date,
        Data::DurationIso(_) => ColumnKind::Duration,
        Data::String(_) => ColumnKind::String,
        Data::Error(_) => ColumnKind::Error,
    }
}
