use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::debug;

use crate::error::{Result, xlsx_error};
use crate::sheet::{cell_error, write_value};
use crate::spec::{KpiSpec, KpiValue};
use crate::style::{FormatKind, FormatRegistry, FormatRole};

pub const SECTION_TITLE: &str = "KPIs";
pub const FIRST_KPI_ROW: u32 = 2;
pub const LABEL_WIDTH: f64 = 28.0;
pub const VALUE_WIDTH: f64 = 18.0;

/// Write the KPI list into `name`, reusing the sheet when one with that name
/// was already written.
pub fn write_dashboard(
    workbook: &mut Workbook,
    name: &str,
    kpis: &[KpiSpec],
    registry: &FormatRegistry,
) -> Result<()> {
    let reuse = workbook.worksheet_from_name(name).is_ok();
    let worksheet = if reuse {
        workbook
            .worksheet_from_name(name)
            .map_err(xlsx_error("failed reopening dashboard sheet"))
    } else {
        workbook
            .add_worksheet()
            .set_name(name)
            .map_err(xlsx_error("failed naming dashboard sheet"))
    };
    worksheet
        .and_then(|worksheet| write_kpis(worksheet, kpis, registry))
        .map_err(|e| e.in_sheet(name))?;
    debug!(sheet = name, kpis = kpis.len(), reuse, "dashboard written");
    Ok(())
}

fn write_kpis(
    worksheet: &mut Worksheet,
    kpis: &[KpiSpec],
    registry: &FormatRegistry,
) -> Result<()> {
    worksheet
        .write_string_with_format(0, 0, SECTION_TITLE, registry.get(FormatRole::Header))
        .map_err(|e| cell_error(SECTION_TITLE, 0, 0, e))?;

    for (offset, kpi) in kpis.iter().enumerate() {
        let row = FIRST_KPI_ROW + offset as u32;
        worksheet
            .write_string_with_format(row, 0, &kpi.label, registry.get(FormatRole::KpiLabel))
            .map_err(|e| cell_error(&kpi.label, row as usize, 0, e))?;

        match &kpi.value {
            KpiValue::Formula(formula) => {
                worksheet
                    .write_formula_with_format(
                        row,
                        1,
                        formula.as_str(),
                        registry.get(FormatRole::KpiValue),
                    )
                    .map_err(|e| cell_error(&kpi.label, row as usize, 1, e))?;
            }
            KpiValue::Literal { value, format_kind } => {
                let role = match format_kind {
                    FormatKind::Currency => FormatRole::KpiCurrency,
                    FormatKind::Integer | FormatKind::Float => FormatRole::KpiValue,
                    FormatKind::Text | FormatKind::Date => FormatRole::Text,
                };
                let format = registry.get(role);
                // Blank KPIs still carry the fill and border.
                let written = if value.is_null() {
                    worksheet.write_string_with_format(row, 1, "", format).map(|_| ())
                } else {
                    write_value(worksheet, row, 1, value, Some(format), registry)
                };
                written.map_err(|e| cell_error(&kpi.label, row as usize, 1, e))?;
            }
        }
    }

    worksheet
        .set_column_width(0, LABEL_WIDTH)
        .and_then(|worksheet| worksheet.set_column_width(1, VALUE_WIDTH))
        .map_err(xlsx_error("failed sizing dashboard columns"))?;
    Ok(())
}
