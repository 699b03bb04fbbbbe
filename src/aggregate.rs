use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::RenderError;
use crate::value::{KeyPart, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Sum,
    Mean,
    Median,
    Count,
    CountUnique,
    Min,
    Max,
    First,
    Last,
    Sd,
    Var,
    Prod,
}

impl AggregateKind {
    pub fn label(self) -> &'static str {
        match self {
            AggregateKind::Sum => "sum",
            AggregateKind::Mean => "mean",
            AggregateKind::Median => "median",
            AggregateKind::Count => "count",
            AggregateKind::CountUnique => "countunique",
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
            AggregateKind::First => "first",
            AggregateKind::Last => "last",
            AggregateKind::Sd => "sd",
            AggregateKind::Var => "var",
            AggregateKind::Prod => "prod",
        }
    }
}

impl FromStr for AggregateKind {
    type Err = RenderError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "sum" => AggregateKind::Sum,
            "mean" | "avg" | "average" => AggregateKind::Mean,
            "median" | "med" => AggregateKind::Median,
            "count" => AggregateKind::Count,
            "countunique" | "nunique" | "distinct" => AggregateKind::CountUnique,
            "min" => AggregateKind::Min,
            "max" => AggregateKind::Max,
            "first" => AggregateKind::First,
            "last" => AggregateKind::Last,
            "sd" | "std" | "stddev" => AggregateKind::Sd,
            "var" | "variance" => AggregateKind::Var,
            "prod" | "product" => AggregateKind::Prod,
            _ => {
                return Err(RenderError::UnknownAggregation {
                    function: name.to_string(),
                });
            }
        };
        Ok(kind)
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Aggregate one group. `None` means the result is undefined for this group
/// (no usable values) and the caller substitutes its fill value.
pub fn evaluate(kind: AggregateKind, values: &[&Value]) -> Option<Value> {
    match kind {
        AggregateKind::Count => Some(Value::Integer(
            values.iter().filter(|v| !v.is_null()).count() as i64,
        )),
        AggregateKind::CountUnique => {
            let distinct: HashSet<KeyPart> =
                values.iter().filter_map(|v| KeyPart::from_value(v)).collect();
            Some(Value::Integer(distinct.len() as i64))
        }
        AggregateKind::First => values.iter().find(|v| !v.is_null()).map(|v| (*v).clone()),
        AggregateKind::Last => values.iter().rev().find(|v| !v.is_null()).map(|v| (*v).clone()),
        AggregateKind::Sum => {
            let numbers = Numbers::collect(values)?;
            match numbers.integers.as_ref().and_then(|ints| checked_sum(ints)) {
                Some(total) => Some(Value::Integer(total)),
                None => Some(numbers.fractional(numbers.values.iter().sum())),
            }
        }
        AggregateKind::Prod => {
            let numbers = Numbers::collect(values)?;
            match numbers.integers.as_ref().and_then(|ints| checked_product(ints)) {
                Some(total) => Some(Value::Integer(total)),
                None => Some(numbers.fractional(numbers.values.iter().product())),
            }
        }
        AggregateKind::Min | AggregateKind::Max => {
            let numbers = Numbers::collect(values)?;
            let is_min = kind == AggregateKind::Min;
            if let Some(ints) = &numbers.integers {
                let best = if is_min { ints.iter().min() } else { ints.iter().max() };
                return best.map(|v| Value::Integer(*v));
            }
            numbers
                .values
                .iter()
                .cloned()
                .reduce(|a, b| if is_min { a.min(b) } else { a.max(b) })
                .map(|v| numbers.fractional(v))
        }
        AggregateKind::Mean => {
            let numbers = Numbers::collect(values)?;
            let mean = numbers.values.iter().sum::<f64>() / numbers.values.len() as f64;
            Some(numbers.fractional(mean))
        }
        AggregateKind::Median => {
            let numbers = Numbers::collect(values)?;
            median(&numbers.values).map(|v| numbers.fractional(v))
        }
        AggregateKind::Var => {
            let numbers = Numbers::collect(values)?;
            sample_variance(&numbers.values).map(Value::Float)
        }
        AggregateKind::Sd => {
            let numbers = Numbers::collect(values)?;
            sample_variance(&numbers.values).map(|var| Value::Float(var.sqrt()))
        }
    }
}

struct Numbers {
    values: Vec<f64>,
    /// Present while every input is an integer or boolean.
    integers: Option<Vec<i64>>,
    currency: bool,
}

impl Numbers {
    fn collect(values: &[&Value]) -> Option<Numbers> {
        let mut numbers = Numbers {
            values: Vec::with_capacity(values.len()),
            integers: Some(Vec::with_capacity(values.len())),
            currency: false,
        };
        for value in values {
            let Some(number) = value.as_f64() else {
                continue;
            };
            numbers.values.push(number);
            match value {
                Value::Integer(i) => push_int(&mut numbers.integers, *i),
                Value::Bool(b) => push_int(&mut numbers.integers, i64::from(*b)),
                Value::Currency(_) => {
                    numbers.currency = true;
                    numbers.integers = None;
                }
                _ => numbers.integers = None,
            }
        }
        if numbers.values.is_empty() {
            None
        } else {
            Some(numbers)
        }
    }

    fn fractional(&self, value: f64) -> Value {
        if self.currency {
            Value::Currency(value)
        } else {
            Value::Float(value)
        }
    }
}

fn push_int(integers: &mut Option<Vec<i64>>, value: i64) {
    if let Some(ints) = integers {
        ints.push(value);
    }
}

fn checked_sum(values: &[i64]) -> Option<i64> {
    values.iter().try_fold(0i64, |acc, v| acc.checked_add(*v))
}

fn checked_product(values: &[i64]) -> Option<i64> {
    values.iter().try_fold(1i64, |acc, v| acc.checked_mul(*v))
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (values.len() - 1) as f64;
    Some(var.max(0.0))
}
