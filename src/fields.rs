use crate::spec::ColumnFormat;
use crate::style::FormatKind;

/// Columns that receive an in-cell data bar whenever a sheet contains them.
pub const MAGNITUDE_COLUMNS: &[&str] = &[
    "quantity",
    "revenue",
    "face_value",
    "net_value",
    "freight",
    "weight_kg",
    "distance_km",
    "total_cost",
    "production_t",
    "salary",
    "duration_s",
    "labor_hours",
    "qty",
    "total_value",
    "value",
];

const DATE_FIELDS: &[&str] = &[
    "date",
    "issue_date",
    "due_date",
    "pickup_date",
    "promised_delivery_date",
    "actual_delivery_date",
    "planting_date",
    "harvest_date",
    "payment_date",
    "expiry_date",
    "opened_at",
    "expected_end",
    "closed_at",
    "period",
    "hire_date",
    "termination_date",
];

const INTEGER_FIELDS: &[&str] = &["quantity", "distance_km", "qty", "sla_hours", "duration_s"];

const CURRENCY_FIELDS: &[&str] = &[
    "unit_price",
    "face_value",
    "fine",
    "interest",
    "discount",
    "net_value",
    "freight",
    "price_t",
    "revenue",
    "total_cost",
    "total_value",
    "parts_value",
    "labor_value",
    "price_kg",
    "exchange_rate",
    "value",
    "benefits",
    "salary",
    "deductions",
    "net_pay",
    "unit_price_fx",
    "total_fx",
    "total_local",
    "sale_value",
];

const FLOAT_FIELDS: &[&str] = &[
    "weight_kg",
    "volume_m3",
    "area_ha",
    "yield_t_ha",
    "production_t",
    "labor_hours",
];

pub fn is_magnitude_column(name: &str) -> bool {
    MAGNITUDE_COLUMNS.contains(&name)
}

/// Formatting defaults keyed on well-known field names, used when a sheet
/// does not declare its own column formats.
pub fn default_column_format(name: &str) -> ColumnFormat {
    let kind = if DATE_FIELDS.contains(&name) {
        FormatKind::Date
    } else if INTEGER_FIELDS.contains(&name) {
        FormatKind::Integer
    } else if CURRENCY_FIELDS.contains(&name) {
        FormatKind::Currency
    } else if FLOAT_FIELDS.contains(&name) {
        FormatKind::Float
    } else {
        let width = (name.chars().count() + 6).clamp(10, 26) as f64;
        return ColumnFormat::new(name, FormatKind::Text).with_width(width);
    };
    ColumnFormat::new(name, kind).with_width(12.0)
}
