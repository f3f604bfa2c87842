//! Parsing of command-line option overrides.
//!
//! Override values arrive as text and are converted according to the target
//! option's declared kind. Integers and floats are scanned the way C's `%d`
//! and `%f` conversions scan them: leading whitespace is skipped, the longest
//! numeric prefix is taken, and anything after it is ignored. Floats are
//! scanned at single precision and then widened.

use super::{OptionDescriptor, OptionKind, OptionValue};
use crate::error::{Error, Result};

/// Converts an override string into a value for `option`.
///
/// Returns `Ok(None)` for boolean options, which have no override path.
pub fn parse_override(option: &OptionDescriptor, raw: &str) -> Result<Option<OptionValue>> {
    let parse_error = || Error::OptionParse {
        name: option.name.clone(),
        expected: option.kind,
        value: raw.to_string(),
    };

    match option.kind {
        OptionKind::Bool => Ok(None),
        OptionKind::Int => scan_int(raw)
            .map(|v| Some(OptionValue::Int(v)))
            .ok_or_else(parse_error),
        OptionKind::Float => scan_float(raw)
            .map(|v| Some(OptionValue::Float(f64::from(v))))
            .ok_or_else(parse_error),
        OptionKind::String => Ok(Some(OptionValue::String(raw.to_string()))),
    }
}

/// Scans a leading decimal integer.
pub fn scan_int(text: &str) -> Option<i32> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = count_digits(&bytes[sign..]);
    if digits == 0 {
        return None;
    }
    s[..sign + digits].parse().ok()
}

/// Scans a leading single-precision float.
pub fn scan_float(text: &str) -> Option<f32> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let negative = bytes.first() == Some(&b'-');
    let rest = &s[sign..];

    if starts_with_ignore_case(rest, "inf") {
        return Some(if negative {
            f32::NEG_INFINITY
        } else {
            f32::INFINITY
        });
    }
    if starts_with_ignore_case(rest, "nan") {
        return Some(f32::NAN);
    }

    let int_digits = count_digits(&bytes[sign..]);
    let mut end = sign + int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    // An exponent only counts when digits follow it
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_start = end + 1;
        if matches!(bytes.get(exp_start), Some(b'+' | b'-')) {
            exp_start += 1;
        }
        let exp_digits = count_digits(bytes.get(exp_start..).unwrap_or_default());
        if exp_digits > 0 {
            end = exp_start + exp_digits;
        }
    }

    s[..end].parse().ok()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Constraint;

    fn option(kind: OptionKind) -> OptionDescriptor {
        OptionDescriptor {
            index: 1,
            name: "opt".into(),
            title: "Option".into(),
            description: String::new(),
            kind,
            size: 4,
            readonly: false,
            inactive: false,
            constraint: Constraint::None,
        }
    }

    #[test]
    fn test_scan_int() {
        assert_eq!(scan_int("42"), Some(42));
        assert_eq!(scan_int("  -17"), Some(-17));
        assert_eq!(scan_int("+8"), Some(8));
        assert_eq!(scan_int("300dpi"), Some(300));
        assert_eq!(scan_int("abc"), None);
        assert_eq!(scan_int("-"), None);
        assert_eq!(scan_int(""), None);
        assert_eq!(scan_int("99999999999"), None);
    }

    #[test]
    fn test_scan_float() {
        assert_eq!(scan_float("3.5"), Some(3.5));
        assert_eq!(scan_float(" .25"), Some(0.25));
        assert_eq!(scan_float("7."), Some(7.0));
        assert_eq!(scan_float("1e2"), Some(100.0));
        assert_eq!(scan_float("2e"), Some(2.0));
        assert_eq!(scan_float("210.5mm"), Some(210.5));
        assert_eq!(scan_float("-Inf"), Some(f32::NEG_INFINITY));
        assert!(scan_float("nan").is_some_and(f32::is_nan));
        assert_eq!(scan_float("wide"), None);
        assert_eq!(scan_float("."), None);
    }

    #[test]
    fn test_float_override_widens_from_single_precision() {
        let value = parse_override(&option(OptionKind::Float), "0.1").unwrap();
        assert_eq!(value, Some(OptionValue::Float(f64::from(0.1f32))));
        assert_ne!(f64::from(0.1f32), 0.1f64);

        let value = parse_override(&option(OptionKind::Float), "3.5").unwrap();
        assert_eq!(value, Some(OptionValue::Float(3.5)));
    }

    #[test]
    fn test_parse_override_by_kind() {
        assert_eq!(
            parse_override(&option(OptionKind::Int), "42").unwrap(),
            Some(OptionValue::Int(42))
        );
        assert_eq!(
            parse_override(&option(OptionKind::String), "Color").unwrap(),
            Some(OptionValue::String("Color".into()))
        );
        assert_eq!(parse_override(&option(OptionKind::Bool), "yes").unwrap(), None);
    }

    #[test]
    fn test_parse_override_rejects_garbage() {
        let err = parse_override(&option(OptionKind::Int), "abc").unwrap_err();
        assert!(matches!(err, Error::OptionParse { .. }));
        assert_eq!(err.to_string(), "Option opt not an integer: abc");
    }
}
