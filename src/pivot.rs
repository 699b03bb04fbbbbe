use std::collections::HashMap;

use indexmap::IndexSet;
use rust_xlsxwriter::{Chart, Format, Workbook, Worksheet};
use tracing::{debug, warn};

use crate::aggregate::evaluate;
use crate::cell_ref::parse_cell_ref;
use crate::error::{RenderError, Result, xlsx_error};
use crate::sheet::{cell_error, write_header_row, write_value};
use crate::spec::{ChartSpec, PivotSpec};
use crate::style::{FormatRegistry, FormatRole};
use crate::table::Table;
use crate::value::{KeyPart, Value, compare_keys};

pub const LEVEL_DELIMITER: &str = " | ";
pub const CHART_ANCHOR: &str = "B8";
pub const CHART_WIDTH: u32 = 576;
pub const CHART_HEIGHT: u32 = 346;

const MIN_COLUMN_WIDTH: usize = 12;

/// Result of writing one pivot sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotOutput {
    /// The computed table, registered so later pivots can read it.
    pub table: Table,
    pub charted: bool,
}

/// Group `source` by the pivot's index and column fields and aggregate each
/// value field. Index fields become leading columns; value columns follow,
/// one per value field and column-axis combination.
pub fn compute_pivot(pivot: &PivotSpec, source: &Table) -> Result<Table> {
    let index = columns_of(source, &pivot.index)?;
    let axis = columns_of(source, &pivot.columns)?;
    let fields = pivot
        .values
        .iter()
        .map(|(field, kind)| {
            Ok::<_, RenderError>((field.as_str(), *kind, column_of(source, field)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut row_keys: IndexSet<Vec<KeyPart>> = IndexSet::new();
    let mut col_keys: IndexSet<Vec<KeyPart>> = IndexSet::new();
    let mut groups: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    let mut dropped = 0usize;

    for row in 0..source.height() {
        let (Some(row_key), Some(col_key)) = (key_at(&index, row), key_at(&axis, row)) else {
            dropped += 1;
            continue;
        };
        let (r, _) = row_keys.insert_full(row_key);
        let (c, _) = col_keys.insert_full(col_key);
        groups.entry((r, c)).or_default().push(row);
    }
    if dropped > 0 {
        debug!(pivot = %pivot.name, dropped, "rows with null keys dropped");
    }
    if pivot.columns.is_empty() && col_keys.is_empty() {
        col_keys.insert(Vec::new());
    }

    let row_order = sorted_positions(&row_keys);
    let col_order = sorted_positions(&col_keys);

    let mut table = Table::new();
    for (level, name) in pivot.index.iter().enumerate() {
        let values = row_order
            .iter()
            .map(|&r| row_keys[r][level].to_value())
            .collect();
        table.push_column(name.clone(), values)?;
    }

    for (field, kind, data) in &fields {
        for &c in &col_order {
            let name = column_name(field, &col_keys[c]);
            let values = row_order
                .iter()
                .map(|&r| {
                    let cell = groups
                        .get(&(r, c))
                        .and_then(|rows| {
                            let group: Vec<&Value> = rows.iter().map(|&row| &data[row]).collect();
                            evaluate(*kind, &group)
                        })
                        .unwrap_or_else(|| pivot.fill_value.clone());
                    match pivot.round {
                        Some(decimals) => cell.round(decimals),
                        None => cell,
                    }
                })
                .collect();
            table.push_column(name, values)?;
        }
    }
    Ok(table)
}

/// Write a pivot sheet (and its chart) into `workbook`. A missing or empty
/// source produces an empty sheet rather than an error.
pub fn write_pivot(
    workbook: &mut Workbook,
    pivot: &PivotSpec,
    source: Option<&Table>,
    registry: &FormatRegistry,
) -> Result<PivotOutput> {
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(&pivot.name)
        .map_err(xlsx_error("failed naming pivot sheet"))
        .and_then(|worksheet| write_pivot_contents(worksheet, pivot, source, registry))
        .map_err(|e| e.in_pivot(&pivot.name))
}

fn write_pivot_contents(
    worksheet: &mut Worksheet,
    pivot: &PivotSpec,
    source: Option<&Table>,
    registry: &FormatRegistry,
) -> Result<PivotOutput> {
    let Some(source) = source.filter(|table| !table.is_empty()) else {
        warn!(
            pivot = %pivot.name,
            source = %pivot.data_sheet,
            "pivot source is missing or empty, writing an empty sheet"
        );
        return Ok(PivotOutput {
            table: Table::new(),
            charted: false,
        });
    };

    let table = compute_pivot(pivot, source)?;
    write_header_row(worksheet, &table, registry)?;

    for (col, (name, values)) in table.columns().enumerate() {
        let width = MIN_COLUMN_WIDTH.max(name.chars().count() + 2);
        worksheet
            .set_column_width(col as u16, width as f64)
            .map_err(xlsx_error(format!("failed sizing column '{}'", name)))?;
        for (idx, value) in values.iter().enumerate() {
            let row = idx + 1;
            write_value(
                worksheet,
                row as u32,
                col as u16,
                value,
                value_format(value, registry),
                registry,
            )
            .map_err(|e| cell_error(name, row, col, e))?;
        }
    }

    let charted = match &pivot.chart {
        Some(chart) if !table.is_empty() => {
            insert_chart(worksheet, pivot, chart, &table)?;
            true
        }
        _ => false,
    };

    debug!(
        pivot = %pivot.name,
        rows = table.height(),
        columns = table.width(),
        charted,
        "pivot written"
    );
    Ok(PivotOutput { table, charted })
}

fn insert_chart(
    worksheet: &mut Worksheet,
    pivot: &PivotSpec,
    spec: &ChartSpec,
    table: &Table,
) -> Result<()> {
    let sheet = pivot.name.as_str();
    let last_row = table.height() as u32;
    let mut chart = Chart::new(spec.kind.chart_type());

    for col in pivot.index.len()..table.width() {
        let col = col as u16;
        chart
            .add_series()
            .set_name((sheet, 0, col))
            .set_categories((sheet, 1, 0, last_row, 0))
            .set_values((sheet, 1, col, last_row, col));
    }

    chart
        .title()
        .set_name(spec.title.as_deref().unwrap_or(sheet));
    if !spec.y_title.is_empty() {
        chart.y_axis().set_name(&spec.y_title);
    }
    chart.set_width(CHART_WIDTH).set_height(CHART_HEIGHT);

    let (row, col) = parse_cell_ref(CHART_ANCHOR)?;
    worksheet
        .insert_chart(row, col, &chart)
        .map_err(xlsx_error(format!("failed inserting {} chart", spec.kind)))?;
    Ok(())
}

fn value_format<'a>(value: &Value, registry: &'a FormatRegistry) -> Option<&'a Format> {
    match value {
        Value::Integer(_) => Some(registry.get(FormatRole::Integer)),
        Value::Float(_) => Some(registry.get(FormatRole::Float)),
        Value::Currency(_) => Some(registry.get(FormatRole::Currency)),
        _ => None,
    }
}

fn column_of<'a>(source: &'a Table, field: &str) -> Result<&'a [Value]> {
    source
        .column(field)
        .ok_or_else(|| RenderError::UnknownPivotColumn {
            column: field.to_string(),
        })
}

fn columns_of<'a>(source: &'a Table, fields: &[String]) -> Result<Vec<&'a [Value]>> {
    fields.iter().map(|field| column_of(source, field)).collect()
}

/// Grouping key for one row, or `None` when any key cell is null.
fn key_at(columns: &[&[Value]], row: usize) -> Option<Vec<KeyPart>> {
    columns
        .iter()
        .map(|column| KeyPart::from_value(&column[row]))
        .collect()
}

fn sorted_positions(keys: &IndexSet<Vec<KeyPart>>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| compare_keys(&keys[a], &keys[b]));
    order
}

fn column_name(field: &str, key: &[KeyPart]) -> String {
    if key.is_empty() {
        return field.to_string();
    }
    let mut levels = Vec::with_capacity(key.len() + 1);
    levels.push(field.to_string());
    levels.extend(key.iter().map(|part| part.to_value().to_string()));
    levels.join(LEVEL_DELIMITER)
}
