use chrono::{Days, NaiveDate};

use crate::cell_ref::column_letters;
use crate::table::Table;
use crate::value::Value;

/// Row-level highlight keyed on the presence of specific columns.
///
/// The spreadsheet evaluates `formula` against its own clock when the file
/// is opened; `predicate` is the same condition evaluated for a given date
/// and is used for diagnostics only.
pub struct HighlightRule {
    pub name: &'static str,
    pub required: &'static [&'static str],
    formula: fn(&[String]) -> String,
    predicate: fn(&[&Value], NaiveDate) -> bool,
}

pub const NEAR_EXPIRY_DAYS: u64 = 7;

pub static RULES: [HighlightRule; 3] = [
    HighlightRule {
        name: "overdue-unpaid",
        required: &["due_date", "paid"],
        formula: |refs| {
            format!(
                "=AND(NOT(ISBLANK({due})),TODAY()>{due},{paid}=FALSE)",
                due = refs[0],
                paid = refs[1]
            )
        },
        predicate: |cells, today| {
            let unpaid = matches!(cells[1], Value::Bool(false) | Value::Null);
            cells[0].as_date().is_some_and(|due| today > due) && unpaid
        },
    },
    HighlightRule {
        name: "late-delivery",
        required: &["promised_delivery_date", "actual_delivery_date"],
        formula: |refs| {
            format!(
                "=AND(NOT(ISBLANK({actual})),{actual}>{promised})",
                promised = refs[0],
                actual = refs[1]
            )
        },
        predicate: |cells, _today| match cells[1].as_date() {
            Some(actual) => cells[0].as_date().is_none_or(|promised| actual > promised),
            None => false,
        },
    },
    HighlightRule {
        name: "near-expiry",
        required: &["expiry_date"],
        formula: |refs| {
            format!(
                "=AND(NOT(ISBLANK({expiry})),{expiry}<=TODAY()+{NEAR_EXPIRY_DAYS})",
                expiry = refs[0]
            )
        },
        predicate: |cells, today| {
            let horizon = today
                .checked_add_days(Days::new(NEAR_EXPIRY_DAYS))
                .unwrap_or(NaiveDate::MAX);
            cells[0].as_date().is_some_and(|expiry| expiry <= horizon)
        },
    },
];

impl HighlightRule {
    pub fn applies_to(&self, table: &Table) -> bool {
        self.required.iter().all(|name| table.has_column(name))
    }

    /// Conditional-format formula anchored on `first_row` (zero-based), with
    /// column-absolute, row-relative references so one rule covers every row.
    pub fn formula(&self, table: &Table, first_row: u32) -> Option<String> {
        let refs = self
            .required
            .iter()
            .map(|name| {
                table
                    .position(name)
                    .map(|col| format!("${}{}", column_letters(col as u16), first_row + 1))
            })
            .collect::<Option<Vec<_>>>()?;
        Some((self.formula)(&refs))
    }

    pub fn matches(&self, table: &Table, row: usize, today: NaiveDate) -> bool {
        let cells = self
            .required
            .iter()
            .map(|name| table.cell(row, name))
            .collect::<Option<Vec<_>>>();
        match cells {
            Some(cells) => (self.predicate)(&cells, today),
            None => false,
        }
    }

    pub fn count_matches(&self, table: &Table, today: NaiveDate) -> usize {
        (0..table.height())
            .filter(|&row| self.matches(table, row, today))
            .count()
    }
}

pub fn rules_for(table: &Table) -> impl Iterator<Item = &'static HighlightRule> + '_ {
    RULES.iter().filter(move |rule| rule.applies_to(table))
}

pub fn rule(name: &str) -> Option<&'static HighlightRule> {
    RULES.iter().find(|rule| rule.name == name)
}
