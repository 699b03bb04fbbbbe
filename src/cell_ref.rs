use std::sync::LazyLock;

use regex::Regex;

use crate::error::{RenderError, Result};

static CELL_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)([0-9]+)$").expect("valid cell reference pattern"));

/// Resolve an A1-style reference such as `B10` into zero-based `(row, col)`.
pub fn parse_cell_ref(reference: &str) -> Result<(u32, u16)> {
    let invalid = |reason| RenderError::InvalidReference {
        reference: reference.to_string(),
        reason,
    };

    if reference.is_empty() {
        return Err(invalid("reference is empty"));
    }
    if !reference.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("only letters and digits are allowed"));
    }
    let captures = CELL_REF
        .captures(reference)
        .ok_or_else(|| invalid("expected column letters followed by a row number"))?;

    let mut col = 0u64;
    for byte in captures[1].bytes() {
        col = col * 26 + u64::from(byte.to_ascii_uppercase() - b'A') + 1;
        if col > u64::from(u16::MAX) + 1 {
            return Err(invalid("column is out of range"));
        }
    }
    let row: u64 = captures[2]
        .parse()
        .map_err(|_| invalid("row number is out of range"))?;
    if row == 0 {
        return Err(invalid("row numbers are 1-based"));
    }
    if row > u64::from(u32::MAX) {
        return Err(invalid("row number is out of range"));
    }

    Ok(((row - 1) as u32, (col - 1) as u16))
}

/// Column letters for a zero-based column index (`0` -> `A`, `26` -> `AA`).
pub fn column_letters(col: u16) -> String {
    let mut n = col as usize + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_documented_references() {
        assert_eq!(parse_cell_ref("A1").unwrap(), (0, 0));
        assert_eq!(parse_cell_ref("B10").unwrap(), (9, 1));
        assert_eq!(parse_cell_ref("AA5").unwrap(), (4, 26));
    }

    #[test]
    fn letters_are_case_insensitive() {
        assert_eq!(parse_cell_ref("b2").unwrap(), (1, 1));
        assert_eq!(parse_cell_ref("aB3").unwrap(), parse_cell_ref("AB3").unwrap());
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in ["", "1A", "A", "12", "A-1", "A 1", "A1B", "A0", "Ä1"] {
            let err = parse_cell_ref(bad).unwrap_err();
            assert!(
                matches!(err, RenderError::InvalidReference { .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn column_letters_round_trip_through_parser() {
        for col in [0u16, 1, 25, 26, 27, 51, 52, 701, 702, 16383] {
            let reference = format!("{}7", column_letters(col));
            assert_eq!(parse_cell_ref(&reference).unwrap(), (6, col));
        }
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
    }
}
