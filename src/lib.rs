//! Render declarative workbook specifications into styled xlsx files:
//! formatted data sheets with conditional highlighting, a KPI dashboard and
//! pivot tables with charts.

pub mod aggregate;
pub mod cell_ref;
pub mod dashboard;
pub mod document;
pub mod error;
pub mod fields;
pub mod highlight;
pub mod inspect;
pub mod pivot;
pub mod sheet;
pub mod spec;
pub mod style;
pub mod table;
pub mod value;
pub mod workbook;

pub use aggregate::AggregateKind;
pub use cell_ref::{column_letters, parse_cell_ref};
pub use document::{load_document, parse_document};
pub use error::{RenderError, Result};
pub use inspect::{SheetSummary, inspect_workbook};
pub use pivot::compute_pivot;
pub use spec::{
    ChartKind, ChartSpec, ColumnFormat, KpiSpec, KpiValue, PivotSpec, SheetSpec, WorkbookMetadata,
    WorkbookSpec,
};
pub use style::{FormatKind, FormatRegistry, Theme};
pub use table::Table;
pub use value::Value;
pub use workbook::{render, render_to_buffer};
