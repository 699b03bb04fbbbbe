use std::fs::File;
use std::path::Path;

use csv::ReaderBuilder;
use indexmap::IndexMap;

use crate::error::{RenderError, Result};
use crate::value::Value;

/// Column-oriented table: ordered named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: IndexMap<String, Vec<Value>>,
    height: usize,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut table = Table::new();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    /// Build from row records; columns appear in first-seen key order and
    /// keys missing from a record become nulls.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = IndexMap<String, Value>>,
    {
        let mut columns: IndexMap<String, Vec<Value>> = IndexMap::new();
        let mut height = 0usize;
        for record in records {
            for (name, value) in record {
                let column = columns
                    .entry(name)
                    .or_insert_with(|| vec![Value::Null; height]);
                column.resize(height, Value::Null);
                column.push(value);
            }
            height += 1;
            for column in columns.values_mut() {
                column.resize(height, Value::Null);
            }
        }
        Table { columns, height }
    }

    /// Load a delimited text file with a header row. `.csv` files are comma
    /// separated, anything else is read as TSV.
    pub fn from_delimited(path: &Path) -> Result<Self> {
        let document_error = |message: String| RenderError::Document {
            path: path.to_path_buf(),
            message,
        };
        let delimiter = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
            _ => b'\t',
        };
        let file = File::open(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| document_error(format!("failed reading header: {}", e)))?
            .iter()
            .map(|s| s.trim_end_matches('\r').to_string())
            .collect();
        for (i, header) in headers.iter().enumerate() {
            if headers[..i].contains(header) {
                return Err(document_error(format!("repeated header '{}'", header)));
            }
        }
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];

        for (row_number, record) in reader.records().enumerate() {
            let record =
                record.map_err(|e| document_error(format!("failed reading row: {}", e)))?;
            if record.len() != headers.len() {
                return Err(document_error(format!(
                    "row {} has {} fields, expected {}",
                    row_number + 2,
                    record.len(),
                    headers.len()
                )));
            }
            for (column, raw) in columns.iter_mut().zip(record.iter()) {
                column.push(Value::infer(raw));
            }
        }

        Table::from_columns(headers.into_iter().zip(columns))
    }

    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.columns.contains_key(&name) {
            return Err(RenderError::DuplicateColumn { column: name });
        }
        if self.columns.is_empty() {
            self.height = values.len();
        } else if values.len() != self.height {
            return Err(RenderError::ColumnLength {
                column: name,
                expected: self.height,
                found: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// No data rows (a table may still carry column names).
    pub fn is_empty(&self) -> bool {
        self.height == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.get_index_of(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Value> {
        self.columns.get(name).and_then(|values| values.get(row))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn record(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn records_fill_missing_keys_with_null() {
        let table = Table::from_records(vec![
            record(&[("store", Value::text("A")), ("qty", Value::Integer(2))]),
            record(&[("qty", Value::Integer(5))]),
            record(&[("store", Value::text("C")), ("note", Value::text("late"))]),
        ]);
        assert_eq!(table.height(), 3);
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["store", "qty", "note"]
        );
        assert_eq!(
            table.column("store").unwrap(),
            &[Value::text("A"), Value::Null, Value::text("C")]
        );
        assert_eq!(
            table.column("note").unwrap(),
            &[Value::Null, Value::Null, Value::text("late")]
        );
        assert_eq!(
            table.column("qty").unwrap(),
            &[Value::Integer(2), Value::Integer(5), Value::Null]
        );
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Table::from_columns(vec![
            ("a", vec![Value::Integer(1), Value::Integer(2)]),
            ("b", vec![Value::Integer(1)]),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            RenderError::ColumnLength { expected: 2, found: 1, .. }
        ));
    }

    #[test]
    fn loads_tsv_with_type_inference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock.tsv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "sku\tqty\tprice\texpiry_date\tactive").unwrap();
        writeln!(file, "A-1\t3\t2.50\t2024-06-01\ttrue").unwrap();
        writeln!(file, "B-2\t\t1.25\t\tfalse").unwrap();
        drop(file);

        let table = Table::from_delimited(&path).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.cell(0, "qty"), Some(&Value::Integer(3)));
        assert_eq!(table.cell(1, "qty"), Some(&Value::Null));
        assert_eq!(table.cell(0, "price"), Some(&Value::Float(2.5)));
        assert_eq!(table.cell(0, "expiry_date"), Some(&Value::date(2024, 6, 1)));
        assert_eq!(table.cell(1, "active"), Some(&Value::Bool(false)));
    }

    #[test]
    fn csv_extension_switches_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.csv");
        std::fs::write(&path, "name,city\nAcme,Recife\n").unwrap();
        let table = Table::from_delimited(&path).unwrap();
        assert_eq!(table.cell(0, "city"), Some(&Value::text("Recife")));
    }

    #[test]
    fn repeated_column_names_are_rejected() {
        let err = Table::from_columns(vec![
            ("a", vec![Value::Integer(1)]),
            ("a", vec![Value::Integer(3)]),
        ])
        .unwrap_err();
        assert!(matches!(err, RenderError::DuplicateColumn { column } if column == "a"));
    }

    #[test]
    fn repeated_header_is_reported_with_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.tsv");
        std::fs::write(&path, "a\tb\ta\n1\t2\t3\n").unwrap();
        let err = Table::from_delimited(&path).unwrap_err();
        assert!(matches!(&err, RenderError::Document { path: p, .. } if p == &path));
        assert!(err.to_string().contains("repeated header 'a'"));
    }

    #[test]
    fn header_only_file_is_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.tsv");
        std::fs::write(&path, "a\tb\n").unwrap();
        let table = Table::from_delimited(&path).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.width(), 2);
    }
}
