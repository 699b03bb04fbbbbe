use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use chrono::{NaiveDateTime, Timelike};
use indexmap::IndexMap;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook, XlsxError};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::dashboard::write_dashboard;
use crate::error::{RenderError, Result, xlsx_error};
use crate::pivot::write_pivot;
use crate::sheet::{excel_date, write_sheet};
use crate::spec::{WorkbookMetadata, WorkbookSpec};
use crate::style::{FormatRegistry, Theme};
use crate::table::Table;

/// Render `spec` into xlsx bytes: data sheets in order, then the dashboard
/// when KPIs exist, then pivots, each of which may read any table
/// registered before it.
pub fn render_to_buffer(spec: &WorkbookSpec, theme: Theme) -> Result<Vec<u8>> {
    spec.validate()?;
    let registry = FormatRegistry::new(theme);
    let mut workbook = Workbook::new();
    let properties = document_properties(&spec.metadata)
        .map_err(xlsx_error("invalid workbook creation timestamp"))?;
    workbook.set_properties(&properties);

    let mut tables: IndexMap<&str, Cow<'_, Table>> = IndexMap::new();

    for sheet in &spec.sheets {
        let report = write_sheet(&mut workbook, sheet, &registry)?;
        debug!(
            sheet = %sheet.name,
            rows = report.rows,
            autofilter = report.autofilter,
            data_bars = report.data_bars.len(),
            highlights = ?report.highlights,
            "sheet written"
        );
        tables.insert(sheet.name.as_str(), Cow::Borrowed(&sheet.data));
    }

    if !spec.kpis.is_empty() {
        write_dashboard(&mut workbook, dashboard_sheet(spec), &spec.kpis, &registry)?;
    }

    for pivot in &spec.pivots {
        let source = tables.get(pivot.data_sheet.as_str()).map(|table| table.as_ref());
        let output = write_pivot(&mut workbook, pivot, source, &registry)?;
        tables.insert(pivot.name.as_str(), Cow::Owned(output.table));
    }

    workbook
        .save_to_buffer()
        .map_err(xlsx_error("failed serializing workbook"))
}

/// Sheet names are case-insensitive, so a data sheet that differs from the
/// dashboard name only in case is the sheet the KPIs go into.
fn dashboard_sheet(spec: &WorkbookSpec) -> &str {
    let wanted = spec.dashboard_name.to_lowercase();
    spec.sheets
        .iter()
        .map(|sheet| sheet.name.as_str())
        .find(|name| name.to_lowercase() == wanted)
        .unwrap_or(spec.dashboard_name.as_str())
}

/// Render `spec` to `path`. The bytes go to a temporary file beside the
/// destination which is renamed into place only after a complete render, so
/// a failed render never leaves a file at `path`.
pub fn render(spec: &WorkbookSpec, theme: Theme, path: &Path) -> Result<()> {
    let bytes = render_to_buffer(spec, theme)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_error = |source: std::io::Error| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut temp = NamedTempFile::new_in(dir).map_err(io_error)?;
    temp.write_all(&bytes).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;

    info!(
        path = %path.display(),
        theme = %theme,
        sheets = spec.sheets.len(),
        pivots = spec.pivots.len(),
        bytes = bytes.len(),
        "workbook saved"
    );
    Ok(())
}

fn document_properties(
    metadata: &WorkbookMetadata,
) -> std::result::Result<DocProperties, XlsxError> {
    let mut properties = DocProperties::new();
    if let Some(title) = &metadata.title {
        properties = properties.set_title(title);
    }
    if let Some(author) = &metadata.author {
        properties = properties.set_author(author);
    }
    if let Some(created) = &metadata.created {
        properties = properties.set_creation_datetime(&excel_datetime(created)?);
    }
    Ok(properties)
}

fn excel_datetime(value: &NaiveDateTime) -> std::result::Result<ExcelDateTime, XlsxError> {
    excel_date(value.date())?.and_hms(value.hour() as u16, value.minute() as u8, value.second())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{Data, Reader, Xlsx};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::aggregate::AggregateKind;
    use crate::spec::{ChartKind, ChartSpec, KpiSpec, PivotSpec, SheetSpec};
    use crate::style::FormatKind;
    use crate::value::Value;

    fn sales_spec() -> WorkbookSpec {
        let sales = Table::from_columns(vec![
            (
                "date",
                vec![
                    Value::date(2024, 1, 2),
                    Value::date(2024, 1, 1),
                    Value::date(2024, 1, 2),
                ],
            ),
            (
                "amount",
                vec![Value::Integer(10), Value::Integer(20), Value::Integer(30)],
            ),
        ])
        .unwrap();
        WorkbookSpec::new()
            .sheet(SheetSpec::new("Sales", sales))
            .kpi(KpiSpec::value("Total", 60i64, FormatKind::Currency))
            .pivot(
                PivotSpec::new("By date", "Sales")
                    .index(["date"])
                    .aggregate("amount", AggregateKind::Sum)
                    .chart(ChartSpec::new(ChartKind::Column).y_title("R$")),
            )
    }

    fn open(bytes: Vec<u8>) -> Xlsx<Cursor<Vec<u8>>> {
        Xlsx::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn renders_sales_dashboard_and_pivot() {
        let bytes = render_to_buffer(&sales_spec(), Theme::Blue).unwrap();
        let mut book = open(bytes);
        assert_eq!(
            book.sheet_names(),
            vec!["Sales".to_string(), "Dashboard".to_string(), "By date".to_string()]
        );

        let sales = book.worksheet_range("Sales").unwrap();
        assert_eq!(sales.height(), 4);
        assert_eq!(sales.get_value((0, 1)), Some(&Data::String("amount".to_string())));

        let dashboard = book.worksheet_range("Dashboard").unwrap();
        assert_eq!(dashboard.get_value((2, 0)), Some(&Data::String("Total".to_string())));
        assert_eq!(dashboard.get_value((2, 1)), Some(&Data::Float(60.0)));

        let pivot = book.worksheet_range("By date").unwrap();
        assert_eq!(pivot.height(), 3);
        let total: f64 = (1..3)
            .filter_map(|row| match pivot.get_value((row, 1)) {
                Some(Data::Float(v)) => Some(*v),
                _ => None,
            })
            .sum();
        assert_eq!(total, 60.0);
    }

    #[test]
    fn pivots_can_chain_from_earlier_pivots() {
        let spec = sales_spec().pivot(
            PivotSpec::new("Days", "By date")
                .index(["date"])
                .aggregate("amount", AggregateKind::Count),
        );
        let mut book = open(render_to_buffer(&spec, Theme::Gray).unwrap());
        let days = book.worksheet_range("Days").unwrap();
        assert_eq!(days.height(), 3);
        assert_eq!(days.get_value((1, 1)), Some(&Data::Float(1.0)));
    }

    #[test]
    fn missing_pivot_source_still_renders() {
        let spec = WorkbookSpec::new().pivot(
            PivotSpec::new("Orphan", "Nowhere")
                .index(["region"])
                .aggregate("amount", AggregateKind::Sum),
        );
        let mut book = open(render_to_buffer(&spec, Theme::Green).unwrap());
        assert_eq!(book.sheet_names(), vec!["Orphan".to_string()]);
        assert!(book.worksheet_range("Orphan").unwrap().is_empty());
    }

    #[test]
    fn dashboard_reuses_a_data_sheet_named_in_another_case() {
        let notes = Table::from_columns(vec![("note", vec![Value::text("ok")])]).unwrap();
        let spec = WorkbookSpec::new()
            .sheet(SheetSpec::new("dashboard", notes))
            .kpi(KpiSpec::value("Total", 5i64, FormatKind::Integer));
        let mut book = open(render_to_buffer(&spec, Theme::Blue).unwrap());
        assert_eq!(book.sheet_names(), vec!["dashboard".to_string()]);
        let sheet = book.worksheet_range("dashboard").unwrap();
        assert_eq!(
            sheet.get_value((2, 0)),
            Some(&Data::String("Total".to_string()))
        );
    }

    #[test]
    fn no_dashboard_without_kpis() {
        let mut spec = sales_spec();
        spec.kpis.clear();
        let book = open(render_to_buffer(&spec, Theme::Blue).unwrap());
        assert!(!book.sheet_names().contains(&"Dashboard".to_string()));
    }

    #[test]
    fn failed_render_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let spec = sales_spec().pivot(
            PivotSpec::new("Broken", "Sales")
                .index(["region"])
                .aggregate("amount", AggregateKind::Sum),
        );
        let err = render(&spec, Theme::Blue, &path).unwrap_err();
        assert!(err.to_string().contains("Broken"));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn successful_render_writes_the_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        render(&sales_spec(), Theme::Orange, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn metadata_timestamp_is_accepted() {
        let created = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let spec = sales_spec().metadata(WorkbookMetadata {
            title: Some("Monthly sales".to_string()),
            author: Some("Finance".to_string()),
            created: Some(created),
        });
        assert!(render_to_buffer(&spec, Theme::Blue).is_ok());
    }
}
