use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid cell reference '{reference}': {reason}")]
    InvalidReference {
        reference: String,
        reason: &'static str,
    },

    #[error("unknown style theme '{0}' (expected Blue, Green, Gray or Orange)")]
    UnknownTheme(String),

    #[error(
        "unsupported aggregation '{function}': sum, mean, median, count, countunique, min, max, first, last, sd, var, prod"
    )]
    UnknownAggregation { function: String },

    #[error("unsupported chart type '{0}': column, bar, line, area, pie, doughnut, radar, scatter")]
    UnknownChartType(String),

    #[error("sheet name '{0}' is used more than once")]
    DuplicateSheet(String),

    #[error("column '{column}' has {found} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("column '{column}' appears more than once")]
    DuplicateColumn { column: String },

    #[error("column '{column}' not found in source table")]
    UnknownPivotColumn { column: String },

    #[error("pivot needs at least one index field and one value field")]
    EmptyPivotAxis,

    #[error("sheet '{sheet}': {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: Box<RenderError>,
    },

    #[error("pivot '{pivot}': {source}")]
    Pivot {
        pivot: String,
        #[source]
        source: Box<RenderError>,
    },

    #[error("{context}: {source}")]
    Xlsx {
        context: String,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("failed reading workbook document {}: {message}", path.display())]
    Document { path: PathBuf, message: String },

    #[error("failed reading workbook {}: {message}", path.display())]
    Inspect { path: PathBuf, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub fn in_sheet(self, sheet: &str) -> Self {
        RenderError::Sheet {
            sheet: sheet.to_string(),
            source: Box::new(self),
        }
    }

    pub fn in_pivot(self, pivot: &str) -> Self {
        RenderError::Pivot {
            pivot: pivot.to_string(),
            source: Box::new(self),
        }
    }

    /// Innermost error with the sheet/pivot context stripped.
    pub fn root(&self) -> &RenderError {
        match self {
            RenderError::Sheet { source, .. } | RenderError::Pivot { source, .. } => source.root(),
            other => other,
        }
    }
}

pub(crate) fn xlsx_error(
    context: impl Into<String>,
) -> impl FnOnce(rust_xlsxwriter::XlsxError) -> RenderError {
    let context = context.into();
    move |source| RenderError::Xlsx { context, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_wrappers_name_the_offender() {
        let err = RenderError::UnknownPivotColumn {
            column: "amount".to_string(),
        }
        .in_pivot("Revenue by region");
        let message = err.to_string();
        assert!(message.contains("Revenue by region"));
        assert!(message.contains("amount"));
        assert!(matches!(err.root(), RenderError::UnknownPivotColumn { .. }));
    }
}
