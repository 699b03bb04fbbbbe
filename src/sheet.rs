use chrono::{Datelike, Local, NaiveDate};
use rust_xlsxwriter::{
    ConditionalFormatDataBar, ConditionalFormatFormula, ExcelDateTime, Format, Workbook,
    Worksheet, XlsxError,
};
use tracing::debug;

use crate::cell_ref::{column_letters, parse_cell_ref};
use crate::error::{RenderError, Result, xlsx_error};
use crate::fields::is_magnitude_column;
use crate::highlight::rules_for;
use crate::spec::SheetSpec;
use crate::style::{FormatRegistry, FormatRole};
use crate::table::Table;
use crate::value::Value;

pub const ZEBRA_RULE: &str = "=MOD(ROW(),2)=0";

/// What the writer applied to a sheet, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetReport {
    pub rows: usize,
    pub formatted_columns: Vec<String>,
    pub autofilter: bool,
    pub freeze: Option<(u32, u16)>,
    pub zebra: bool,
    pub data_bars: Vec<String>,
    pub highlights: Vec<&'static str>,
}

pub fn write_sheet(
    workbook: &mut Workbook,
    sheet: &SheetSpec,
    registry: &FormatRegistry,
) -> Result<SheetReport> {
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(&sheet.name)
        .map_err(xlsx_error("failed naming worksheet"))
        .and_then(|worksheet| write_sheet_contents(worksheet, sheet, registry))
        .map_err(|e| e.in_sheet(&sheet.name))
}

fn write_sheet_contents(
    worksheet: &mut Worksheet,
    sheet: &SheetSpec,
    registry: &FormatRegistry,
) -> Result<SheetReport> {
    let table = &sheet.data;
    let rows = table.height();
    let width = table.width();
    let mut report = SheetReport {
        rows,
        ..SheetReport::default()
    };

    write_header_row(worksheet, table, registry)?;

    let mut column_formats: Vec<Option<&Format>> = vec![None; width];
    for column in &sheet.columns {
        let Some(col) = table.position(&column.name) else {
            debug!(sheet = %sheet.name, column = %column.name, "column format skipped, no such column");
            continue;
        };
        let format = registry.for_kind(column.format_kind);
        worksheet
            .set_column_width(col as u16, column.width)
            .and_then(|ws| ws.set_column_format(col as u16, format))
            .map_err(xlsx_error(format!("failed formatting column '{}'", column.name)))?;
        column_formats[col] = Some(format);
        report.formatted_columns.push(column.name.clone());
    }

    for (col, (name, values)) in table.columns().enumerate() {
        for (idx, value) in values.iter().enumerate() {
            let row = idx + 1;
            write_value(worksheet, row as u32, col as u16, value, column_formats[col], registry)
                .map_err(|e| cell_error(name, row, col, e))?;
        }
    }

    if sheet.autofilter && rows > 0 && width > 0 {
        worksheet
            .autofilter(0, 0, rows as u32, (width - 1) as u16)
            .map_err(xlsx_error("failed adding autofilter"))?;
        report.autofilter = true;
    }

    if let Some(reference) = &sheet.freeze {
        let (row, col) = parse_cell_ref(reference)?;
        worksheet
            .set_freeze_panes(row, col)
            .map_err(xlsx_error(format!("failed freezing panes at {}", reference)))?;
        report.freeze = Some((row, col));
    }

    if rows == 0 || width == 0 {
        debug!(sheet = %sheet.name, "empty table, conditional rules skipped");
        return Ok(report);
    }

    let last_row = rows as u32;
    let last_col = (width - 1) as u16;

    let zebra = ConditionalFormatFormula::new()
        .set_rule(ZEBRA_RULE)
        .set_format(registry.zebra_fill().clone());
    worksheet
        .add_conditional_format(1, 0, last_row, last_col, &zebra)
        .map_err(xlsx_error("failed adding zebra stripes"))?;
    report.zebra = true;

    for (col, name) in table.column_names().enumerate() {
        if !is_magnitude_column(name) {
            continue;
        }
        let bar = ConditionalFormatDataBar::new().set_fill_color(registry.data_bar_color());
        worksheet
            .add_conditional_format(1, col as u16, last_row, col as u16, &bar)
            .map_err(xlsx_error(format!("failed adding data bar to '{}'", name)))?;
        report.data_bars.push(name.to_string());
    }

    let today = Local::now().date_naive();
    for rule in rules_for(table) {
        let Some(formula) = rule.formula(table, 1) else {
            continue;
        };
        let highlight = ConditionalFormatFormula::new()
            .set_rule(formula.as_str())
            .set_format(registry.negative_fill().clone());
        worksheet
            .add_conditional_format(1, 0, last_row, last_col, &highlight)
            .map_err(xlsx_error(format!("failed adding {} highlight", rule.name)))?;
        debug!(
            sheet = %sheet.name,
            rule = rule.name,
            matching_today = rule.count_matches(table, today),
            "highlight rule applied"
        );
        report.highlights.push(rule.name);
    }

    Ok(report)
}

pub(crate) fn write_header_row(
    worksheet: &mut Worksheet,
    table: &Table,
    registry: &FormatRegistry,
) -> Result<()> {
    let header = registry.get(FormatRole::Header);
    for (col, name) in table.column_names().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, name, header)
            .map_err(|e| cell_error(name, 0, col, e))?;
    }
    Ok(())
}

/// Write one typed value. Dates always carry the date format and currency
/// values fall back to the currency format when no column format applies.
pub(crate) fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    format: Option<&Format>,
    registry: &FormatRegistry,
) -> std::result::Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Text(text) => {
            match format {
                Some(format) => worksheet.write_string_with_format(row, col, text, format)?,
                None => worksheet.write_string(row, col, text)?,
            };
        }
        Value::Integer(_) | Value::Float(_) => {
            let number = value.as_f64().unwrap_or_default();
            match format {
                Some(format) => worksheet.write_number_with_format(row, col, number, format)?,
                None => worksheet.write_number(row, col, number)?,
            };
        }
        Value::Currency(number) => {
            let format = format.unwrap_or_else(|| registry.get(FormatRole::Currency));
            worksheet.write_number_with_format(row, col, *number, format)?;
        }
        Value::Bool(flag) => {
            match format {
                Some(format) => worksheet.write_boolean_with_format(row, col, *flag, format)?,
                None => worksheet.write_boolean(row, col, *flag)?,
            };
        }
        Value::Date(date) => {
            let datetime = excel_date(*date)?;
            worksheet.write_datetime_with_format(
                row,
                col,
                &datetime,
                registry.get(FormatRole::Date),
            )?;
        }
    }
    Ok(())
}

pub(crate) fn excel_date(date: NaiveDate) -> std::result::Result<ExcelDateTime, XlsxError> {
    let year = u16::try_from(date.year())
        .map_err(|_| XlsxError::DateTimeRangeError(date.to_string()))?;
    ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8)
}

pub(crate) fn cell_error(column: &str, row: usize, col: usize, err: XlsxError) -> RenderError {
    RenderError::Xlsx {
        context: format!(
            "failed writing cell {}{} (column '{}')",
            column_letters(col as u16),
            row + 1,
            column
        ),
        source: err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ColumnFormat;
    use crate::style::{FormatKind, Theme};

    fn registry() -> FormatRegistry {
        FormatRegistry::new(Theme::Blue)
    }

    fn invoices() -> Table {
        Table::from_columns(vec![
            ("invoice", vec![Value::text("T-1"), Value::text("T-2")]),
            ("face_value", vec![Value::Currency(100.0), Value::Currency(250.5)]),
            ("due_date", vec![Value::date(2024, 1, 10), Value::date(2024, 2, 10)]),
            ("paid", vec![Value::Bool(false), Value::Bool(true)]),
        ])
        .unwrap()
    }

    #[test]
    fn writes_full_sheet_features() {
        let mut workbook = Workbook::new();
        let sheet = SheetSpec::new("Invoices", invoices())
            .column(ColumnFormat::new("face_value", FormatKind::Currency).with_width(14.0))
            .column(ColumnFormat::new("due_date", FormatKind::Date))
            .column(ColumnFormat::new("not_here", FormatKind::Integer))
            .freeze("B2");
        let report = write_sheet(&mut workbook, &sheet, &registry()).unwrap();

        assert_eq!(report.rows, 2);
        assert_eq!(report.formatted_columns, vec!["face_value", "due_date"]);
        assert!(report.autofilter);
        assert_eq!(report.freeze, Some((1, 1)));
        assert!(report.zebra);
        assert_eq!(report.data_bars, vec!["face_value"]);
        assert_eq!(report.highlights, vec!["overdue-unpaid"]);
    }

    #[test]
    fn empty_table_gets_only_a_header() {
        let mut workbook = Workbook::new();
        let table = Table::from_columns(vec![
            ("due_date", Vec::new()),
            ("paid", Vec::new()),
            ("revenue", Vec::new()),
        ])
        .unwrap();
        let report = write_sheet(&mut workbook, &SheetSpec::new("Empty", table), &registry()).unwrap();
        assert_eq!(report.rows, 0);
        assert!(!report.autofilter);
        assert!(!report.zebra);
        assert!(report.data_bars.is_empty());
        assert!(report.highlights.is_empty());
    }

    #[test]
    fn autofilter_can_be_disabled() {
        let mut workbook = Workbook::new();
        let sheet = SheetSpec::new("Invoices", invoices()).autofilter(false);
        let report = write_sheet(&mut workbook, &sheet, &registry()).unwrap();
        assert!(!report.autofilter);
        assert!(report.zebra);
    }

    #[test]
    fn bad_freeze_reference_names_the_sheet() {
        let mut workbook = Workbook::new();
        let sheet = SheetSpec::new("Invoices", invoices()).freeze("B-2");
        let err = write_sheet(&mut workbook, &sheet, &registry()).unwrap_err();
        assert!(err.to_string().contains("Invoices"));
        assert!(matches!(err.root(), RenderError::InvalidReference { .. }));
    }

    #[test]
    fn dates_before_1900_are_rejected_with_cell_context() {
        let mut workbook = Workbook::new();
        let table = Table::from_columns(vec![("date", vec![Value::date(1850, 1, 1)])]).unwrap();
        let err = write_sheet(&mut workbook, &SheetSpec::new("Old", table), &registry()).unwrap_err();
        assert!(err.to_string().contains("A2"));
    }
}
