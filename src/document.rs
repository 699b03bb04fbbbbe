use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{RenderError, Result};
use crate::fields::default_column_format;
use crate::spec::{
    ChartKind, ChartSpec, ColumnFormat, DEFAULT_DASHBOARD, KpiSpec, PivotSpec, SheetSpec,
    WorkbookMetadata, WorkbookSpec,
};
use crate::style::FormatKind;
use crate::table::Table;
use crate::value::Value;

const DEFAULT_KPI_LABEL: &str = "KPI";

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    metadata: RawMetadata,
    #[serde(default = "default_dashboard")]
    dashboard_name: String,
    #[serde(default)]
    sheets: Vec<RawSheet>,
    #[serde(default)]
    kpis: Vec<RawKpi>,
    #[serde(default)]
    pivots: Vec<RawPivot>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    title: Option<String>,
    author: Option<String>,
    created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSheet {
    name: String,
    data: Option<Vec<IndexMap<String, Value>>>,
    source: Option<PathBuf>,
    columns: Option<Vec<RawColumn>>,
    #[serde(default = "enabled")]
    autofilter: bool,
    freeze: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawColumn {
    name: String,
    width: Option<f64>,
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKpi {
    label: Option<String>,
    #[serde(default)]
    value: Value,
    formula: Option<String>,
    #[serde(alias = "fmt", alias = "format_kind")]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPivot {
    name: String,
    data_sheet: String,
    #[serde(default)]
    index: Fields,
    #[serde(default)]
    columns: Fields,
    #[serde(default)]
    values: IndexMap<String, String>,
    fill_value: Option<Value>,
    round: Option<u32>,
    chart: Option<RawChart>,
}

#[derive(Debug, Deserialize)]
struct RawChart {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    #[serde(default)]
    y_title: String,
}

/// A single field name or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Fields {
    One(String),
    Many(Vec<String>),
}

impl Default for Fields {
    fn default() -> Self {
        Fields::Many(Vec::new())
    }
}

impl Fields {
    fn into_vec(self) -> Vec<String> {
        match self {
            Fields::One(field) => vec![field],
            Fields::Many(fields) => fields,
        }
    }
}

fn default_dashboard() -> String {
    DEFAULT_DASHBOARD.to_string()
}

fn enabled() -> bool {
    true
}

/// Load a JSON workbook document. Relative `source` paths resolve against
/// the document's directory.
pub fn load_document(path: &Path) -> Result<WorkbookSpec> {
    let text = fs::read_to_string(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&text, path)
}

/// Parse document text as if it were read from `path`, which labels errors
/// and anchors relative sources.
pub fn parse_document(text: &str, path: &Path) -> Result<WorkbookSpec> {
    let loader = Loader { path };
    let raw: RawDocument =
        serde_json::from_str(text).map_err(|e| loader.error(e.to_string()))?;

    let mut spec = WorkbookSpec::new()
        .dashboard_name(raw.dashboard_name)
        .metadata(loader.metadata(raw.metadata)?);
    for sheet in raw.sheets {
        spec = spec.sheet(loader.sheet(sheet)?);
    }
    for kpi in raw.kpis {
        spec = spec.kpi(convert_kpi(kpi));
    }
    for pivot in raw.pivots {
        spec = spec.pivot(convert_pivot(pivot)?);
    }

    spec.validate()?;
    debug!(
        path = %path.display(),
        sheets = spec.sheets.len(),
        kpis = spec.kpis.len(),
        pivots = spec.pivots.len(),
        "workbook document loaded"
    );
    Ok(spec)
}

struct Loader<'a> {
    path: &'a Path,
}

impl Loader<'_> {
    fn error(&self, message: String) -> RenderError {
        RenderError::Document {
            path: self.path.to_path_buf(),
            message,
        }
    }

    fn metadata(&self, raw: RawMetadata) -> Result<WorkbookMetadata> {
        let created = match raw.created.as_deref() {
            Some(text) => Some(parse_timestamp(text).ok_or_else(|| {
                self.error(format!("invalid metadata.created timestamp '{}'", text))
            })?),
            None => None,
        };
        Ok(WorkbookMetadata {
            title: raw.title,
            author: raw.author,
            created,
        })
    }

    fn sheet(&self, raw: RawSheet) -> Result<SheetSpec> {
        let data = match (raw.data, raw.source) {
            (Some(_), Some(_)) => {
                return Err(self
                    .error("sheet declares both 'data' and 'source'".to_string())
                    .in_sheet(&raw.name));
            }
            (Some(records), None) => Table::from_records(records),
            (None, Some(source)) => {
                let resolved = match self.path.parent() {
                    Some(base) if source.is_relative() => base.join(source),
                    _ => source,
                };
                debug!(sheet = %raw.name, source = %resolved.display(), "loading sheet source");
                Table::from_delimited(&resolved).map_err(|e| e.in_sheet(&raw.name))?
            }
            (None, None) => Table::new(),
        };

        let columns: Vec<ColumnFormat> = match raw.columns {
            Some(columns) => columns
                .into_iter()
                .map(|column| {
                    let kind = format_kind(column.format.as_deref(), &raw.name, &column.name);
                    let format = ColumnFormat::new(column.name, kind);
                    match column.width {
                        Some(width) => format.with_width(width),
                        None => format,
                    }
                })
                .collect(),
            None => data.column_names().map(default_column_format).collect(),
        };

        let mut sheet = SheetSpec::new(raw.name, data)
            .columns(columns)
            .autofilter(raw.autofilter);
        if let Some(freeze) = raw.freeze {
            sheet = sheet.freeze(freeze);
        }
        Ok(sheet)
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(text, pattern).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Unknown format names degrade to text rather than failing the document.
fn format_kind(name: Option<&str>, sheet: &str, column: &str) -> FormatKind {
    let Some(name) = name else {
        return FormatKind::Text;
    };
    FormatKind::parse(name).unwrap_or_else(|| {
        warn!(sheet, column, format = name, "unknown format, using text");
        FormatKind::Text
    })
}

fn convert_kpi(raw: RawKpi) -> KpiSpec {
    let label = raw.label.unwrap_or_else(|| DEFAULT_KPI_LABEL.to_string());
    if let Some(formula) = raw.formula {
        return KpiSpec::formula(label, formula);
    }
    let kind = format_kind(raw.format.as_deref(), "kpis", &label);
    KpiSpec::value(label, raw.value, kind)
}

fn convert_pivot(raw: RawPivot) -> Result<PivotSpec> {
    let mut pivot = PivotSpec::new(raw.name, raw.data_sheet)
        .index(raw.index.into_vec())
        .columns(raw.columns.into_vec());
    for (field, function) in &raw.values {
        pivot = pivot.value(field.clone(), function)?;
    }
    if let Some(fill) = raw.fill_value {
        pivot = pivot.fill_value(fill);
    }
    if let Some(decimals) = raw.round {
        pivot = pivot.round(decimals);
    }
    if let Some(chart) = raw.chart {
        let kind = match chart.kind.as_deref() {
            Some(name) => name.parse::<ChartKind>().map_err(|e| e.in_pivot(&pivot.name))?,
            None => ChartKind::default(),
        };
        let mut spec = ChartSpec::new(kind).y_title(chart.y_title);
        if let Some(title) = chart.title {
            spec = spec.title(title);
        }
        pivot = pivot.chart(spec);
    }
    Ok(pivot)
}
