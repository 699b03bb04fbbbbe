use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use rust_xlsxwriter::ChartType;

use crate::aggregate::AggregateKind;
use crate::cell_ref::parse_cell_ref;
use crate::error::{RenderError, Result};
use crate::style::FormatKind;
use crate::table::Table;
use crate::value::Value;

pub const DEFAULT_DASHBOARD: &str = "Dashboard";
pub const DEFAULT_COLUMN_WIDTH: f64 = 15.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub created: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookSpec {
    pub sheets: Vec<SheetSpec>,
    pub pivots: Vec<PivotSpec>,
    pub kpis: Vec<KpiSpec>,
    pub dashboard_name: String,
    pub metadata: WorkbookMetadata,
}

impl Default for WorkbookSpec {
    fn default() -> Self {
        WorkbookSpec {
            sheets: Vec::new(),
            pivots: Vec::new(),
            kpis: Vec::new(),
            dashboard_name: DEFAULT_DASHBOARD.to_string(),
            metadata: WorkbookMetadata::default(),
        }
    }
}

impl WorkbookSpec {
    pub fn new() -> Self {
        WorkbookSpec::default()
    }

    pub fn sheet(mut self, sheet: SheetSpec) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn pivot(mut self, pivot: PivotSpec) -> Self {
        self.pivots.push(pivot);
        self
    }

    pub fn kpi(mut self, kpi: KpiSpec) -> Self {
        self.kpis.push(kpi);
        self
    }

    pub fn dashboard_name(mut self, name: impl Into<String>) -> Self {
        self.dashboard_name = name.into();
        self
    }

    pub fn metadata(mut self, metadata: WorkbookMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check the structural invariants that would otherwise surface halfway
    /// through a render. Missing pivot sources are deliberately not checked:
    /// they degrade to an empty sheet.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for sheet in &self.sheets {
            if !names.insert(sheet.name.to_lowercase()) {
                return Err(RenderError::DuplicateSheet(sheet.name.clone()));
            }
            if let Some(freeze) = &sheet.freeze {
                parse_cell_ref(freeze).map_err(|e| e.in_sheet(&sheet.name))?;
            }
        }

        let dashboard = self.dashboard_name.to_lowercase();
        for pivot in &self.pivots {
            let key = pivot.name.to_lowercase();
            if !names.insert(key.clone()) || (!self.kpis.is_empty() && key == dashboard) {
                return Err(RenderError::DuplicateSheet(pivot.name.clone()));
            }
            if pivot.index.is_empty() || pivot.values.is_empty() {
                return Err(RenderError::EmptyPivotAxis.in_pivot(&pivot.name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetSpec {
    pub name: String,
    pub data: Table,
    pub columns: Vec<ColumnFormat>,
    pub autofilter: bool,
    pub freeze: Option<String>,
}

impl SheetSpec {
    pub fn new(name: impl Into<String>, data: Table) -> Self {
        SheetSpec {
            name: name.into(),
            data,
            columns: Vec::new(),
            autofilter: true,
            freeze: None,
        }
    }

    pub fn column(mut self, column: ColumnFormat) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = ColumnFormat>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn autofilter(mut self, enabled: bool) -> Self {
        self.autofilter = enabled;
        self
    }

    pub fn freeze(mut self, reference: impl Into<String>) -> Self {
        self.freeze = Some(reference.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFormat {
    pub name: String,
    pub width: f64,
    pub format_kind: FormatKind,
}

impl ColumnFormat {
    pub fn new(name: impl Into<String>, format_kind: FormatKind) -> Self {
        ColumnFormat {
            name: name.into(),
            width: DEFAULT_COLUMN_WIDTH,
            format_kind,
        }
    }

    /// Non-positive or non-finite widths keep the default.
    pub fn with_width(mut self, width: f64) -> Self {
        if width.is_finite() && width > 0.0 {
            self.width = width;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KpiValue {
    /// Spreadsheet formula, evaluated by the spreadsheet application.
    Formula(String),
    Literal { value: Value, format_kind: FormatKind },
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiSpec {
    pub label: String,
    pub value: KpiValue,
}

impl KpiSpec {
    pub fn value(
        label: impl Into<String>,
        value: impl Into<Value>,
        format_kind: FormatKind,
    ) -> Self {
        KpiSpec {
            label: label.into(),
            value: KpiValue::Literal {
                value: value.into(),
                format_kind,
            },
        }
    }

    pub fn formula(label: impl Into<String>, formula: impl Into<String>) -> Self {
        KpiSpec {
            label: label.into(),
            value: KpiValue::Formula(formula.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotSpec {
    pub name: String,
    pub data_sheet: String,
    pub index: Vec<String>,
    pub columns: Vec<String>,
    pub values: IndexMap<String, AggregateKind>,
    pub fill_value: Value,
    pub round: Option<u32>,
    pub chart: Option<ChartSpec>,
}

impl PivotSpec {
    pub fn new(name: impl Into<String>, data_sheet: impl Into<String>) -> Self {
        PivotSpec {
            name: name.into(),
            data_sheet: data_sheet.into(),
            index: Vec::new(),
            columns: Vec::new(),
            values: IndexMap::new(),
            fill_value: Value::Integer(0),
            round: None,
            chart: None,
        }
    }

    pub fn index<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn columns<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Add an aggregated field; the function name is parsed here so unknown
    /// aggregations fail at construction.
    pub fn value(mut self, field: impl Into<String>, function: &str) -> Result<Self> {
        let kind = function
            .parse::<AggregateKind>()
            .map_err(|e| e.in_pivot(&self.name))?;
        self.values.insert(field.into(), kind);
        Ok(self)
    }

    pub fn aggregate(mut self, field: impl Into<String>, kind: AggregateKind) -> Self {
        self.values.insert(field.into(), kind);
        self
    }

    pub fn fill_value(mut self, value: impl Into<Value>) -> Self {
        self.fill_value = value.into();
        self
    }

    pub fn round(mut self, decimals: u32) -> Self {
        self.round = Some(decimals);
        self
    }

    pub fn chart(mut self, chart: ChartSpec) -> Self {
        self.chart = Some(chart);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartKind {
    #[default]
    Column,
    Bar,
    Line,
    Area,
    Pie,
    Doughnut,
    Radar,
    Scatter,
}

impl ChartKind {
    pub fn chart_type(self) -> ChartType {
        match self {
            ChartKind::Column => ChartType::Column,
            ChartKind::Bar => ChartType::Bar,
            ChartKind::Line => ChartType::Line,
            ChartKind::Area => ChartType::Area,
            ChartKind::Pie => ChartType::Pie,
            ChartKind::Doughnut => ChartType::Doughnut,
            ChartKind::Radar => ChartType::Radar,
            ChartKind::Scatter => ChartType::Scatter,
        }
    }
}

impl FromStr for ChartKind {
    type Err = RenderError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_lowercase().as_str() {
            "column" | "col" => Ok(ChartKind::Column),
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "area" => Ok(ChartKind::Area),
            "pie" => Ok(ChartKind::Pie),
            "doughnut" | "donut" => Ok(ChartKind::Doughnut),
            "radar" => Ok(ChartKind::Radar),
            "scatter" => Ok(ChartKind::Scatter),
            _ => Err(RenderError::UnknownChartType(name.to_string())),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Column => "column",
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Area => "area",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
            ChartKind::Radar => "radar",
            ChartKind::Scatter => "scatter",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    /// Defaults to the pivot sheet name.
    pub title: Option<String>,
    pub y_title: String,
}

impl ChartSpec {
    pub fn new(kind: ChartKind) -> Self {
        ChartSpec {
            kind,
            ..ChartSpec::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn y_title(mut self, title: impl Into<String>) -> Self {
        self.y_title = title.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pivot(name: &str) -> PivotSpec {
        PivotSpec::new(name, "Sales")
            .index(["region"])
            .aggregate("amount", AggregateKind::Sum)
    }

    #[test]
    fn defaults_follow_the_document_conventions() {
        let spec = WorkbookSpec::new();
        assert_eq!(spec.dashboard_name, "Dashboard");
        let sheet = SheetSpec::new("Sales", Table::new());
        assert!(sheet.autofilter);
        assert_eq!(ColumnFormat::new("x", FormatKind::Text).width, 15.0);
        assert_eq!(ColumnFormat::new("x", FormatKind::Text).with_width(-3.0).width, 15.0);
        assert_eq!(pivot("p").fill_value, Value::Integer(0));
    }

    #[test]
    fn duplicate_sheet_names_are_rejected() {
        let spec = WorkbookSpec::new()
            .sheet(SheetSpec::new("Sales", Table::new()))
            .sheet(SheetSpec::new("sales", Table::new()));
        assert!(matches!(spec.validate(), Err(RenderError::DuplicateSheet(name)) if name == "sales"));

        let spec = WorkbookSpec::new()
            .sheet(SheetSpec::new("Sales", Table::new()))
            .pivot(pivot("Sales"));
        assert!(matches!(spec.validate(), Err(RenderError::DuplicateSheet(_))));
    }

    #[test]
    fn dashboard_may_reuse_a_data_sheet_but_not_a_pivot() {
        let kpi = KpiSpec::value("Total", 1i64, FormatKind::Integer);
        let reuse = WorkbookSpec::new()
            .sheet(SheetSpec::new("Summary", Table::new()))
            .kpi(kpi.clone())
            .dashboard_name("Summary");
        assert!(reuse.validate().is_ok());

        let clash = WorkbookSpec::new()
            .kpi(kpi)
            .pivot(pivot("Dashboard"));
        assert!(matches!(clash.validate(), Err(RenderError::DuplicateSheet(_))));
    }

    #[test]
    fn malformed_freeze_reference_names_the_sheet() {
        let spec = WorkbookSpec::new().sheet(SheetSpec::new("Orders", Table::new()).freeze("2B"));
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("Orders"));
        assert!(matches!(err.root(), RenderError::InvalidReference { .. }));
    }

    #[test]
    fn unknown_aggregation_fails_at_construction() {
        let err = PivotSpec::new("By region", "Sales")
            .value("amount", "harmonic")
            .unwrap_err();
        assert!(err.to_string().contains("By region"));
        assert!(matches!(err.root(), RenderError::UnknownAggregation { .. }));
    }

    #[test]
    fn pivots_need_index_and_values() {
        let spec = WorkbookSpec::new().pivot(PivotSpec::new("Empty", "Sales").index(["region"]));
        assert!(matches!(
            spec.validate().unwrap_err().root(),
            RenderError::EmptyPivotAxis
        ));
    }

    #[test]
    fn chart_kind_names() {
        assert_eq!("Column".parse::<ChartKind>().unwrap(), ChartKind::Column);
        assert_eq!("donut".parse::<ChartKind>().unwrap(), ChartKind::Doughnut);
        assert!(matches!(
            "sunburst".parse::<ChartKind>(),
            Err(RenderError::UnknownChartType(_))
        ));
    }
}
