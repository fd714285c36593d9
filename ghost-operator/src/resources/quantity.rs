//! Resource quantity comparison.
//!
//! The API server stores quantities in canonical form, so `1.5Gi` reads back
//! as `1536Mi`. Comparing the strings would report a change on every pass.

const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 10),
    ("Mi", 20),
    ("Gi", 30),
    ("Ti", 40),
    ("Pi", 50),
    ("Ei", 60),
];

const DECIMAL_SUFFIXES: [(&str, u32); 6] =
    [("k", 3), ("M", 6), ("G", 9), ("T", 12), ("P", 15), ("E", 18)];

/// Exact value of a quantity: `numerator / 10^scale` milli-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Value {
    numerator: u128,
    scale: u32,
}

/// Split off the suffix, returning the number and its multiplier in milli-units.
fn split_suffix(qty: &str) -> Option<(&str, u128)> {
    for (suffix, shift) in BINARY_SUFFIXES {
        if let Some(number) = qty.strip_suffix(suffix) {
            return Some((number, 1000u128.checked_mul(1u128.checked_shl(shift)?)?));
        }
    }
    for (suffix, exp) in DECIMAL_SUFFIXES {
        if let Some(number) = qty.strip_suffix(suffix) {
            return Some((number, 10u128.checked_pow(exp + 3)?));
        }
    }
    if let Some(number) = qty.strip_suffix('m') {
        return Some((number, 1));
    }
    Some((qty, 1000))
}

fn parse(qty: &str) -> Option<Value> {
    let (number, multiplier) = split_suffix(qty.trim())?;
    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part
        .chars()
        .chain(frac_part.chars())
        .all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let digits: u128 = format!("{int_part}{frac_part}").parse().ok()?;
    Some(Value {
        numerator: digits.checked_mul(multiplier)?,
        scale: u32::try_from(frac_part.len()).ok()?,
    })
}

/// Whether `qty` is a plain or suffixed quantity such as `10Gi`, `1.5G` or `500m`.
pub fn is_valid_quantity(qty: &str) -> bool {
    parse(qty).is_some()
}

/// Whether two quantities denote the same amount.
pub fn same_quantity(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (Some(a), Some(b)) = (parse(a), parse(b)) else {
        return false;
    };
    let lhs = 10u128
        .checked_pow(b.scale)
        .and_then(|p| a.numerator.checked_mul(p));
    let rhs = 10u128
        .checked_pow(a.scale)
        .and_then(|p| b.numerator.checked_mul(p));
    lhs.is_some() && lhs == rhs
}
