//! Core schema resolution for scalars.
//!
//! Turns scalar text into a typed [`Value`] given its style and resolved tag.
//! These are pure functions of their inputs.

use crate::decimal::Decimal;
use crate::lexer::ScalarStyle;
use crate::value::Value;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

const CORE_PREFIX: &str = "tag:yaml.org,2002:";

/// More significant digits than this cannot round-trip through an `f64`.
const MAX_DOUBLE_DIGITS: usize = 15;

/// Interpret scalar text under the core schema.
///
/// `tag` is a fully resolved tag (`tag:yaml.org,2002:int`, `!`, ...).
pub fn interpret_scalar(text: &str, style: ScalarStyle, tag: Option<&str>) -> Value {
    if let Some(tag) = tag {
        return match tag.strip_prefix(CORE_PREFIX) {
            Some("null") => Value::Null,
            Some("bool") => Value::Bool(is_true(text)),
            Some("int") | Some("float") => {
                if looks_like_number(text) {
                    parse_number(text)
                } else {
                    Value::String(text.to_string())
                }
            }
            _ => Value::String(text.to_string()),
        };
    }

    if style != ScalarStyle::Plain {
        return Value::String(text.to_string());
    }

    if let Some(value) = parse_keyword(text) {
        return value;
    }
    if looks_like_number(text) {
        return parse_number(text);
    }
    Value::String(text.to_string())
}

// ============================================================================
// Keywords
// ============================================================================

fn is_true(text: &str) -> bool {
    matches!(text, "true" | "True" | "TRUE")
}

/// Null and boolean spellings of the core schema. Infinity and NaN
/// spellings stay strings.
fn parse_keyword(text: &str) -> Option<Value> {
    match text {
        "" | "null" | "Null" | "NULL" | "~" => Some(Value::Null),
        "true" | "True" | "TRUE" => Some(Value::Bool(true)),
        "false" | "False" | "FALSE" => Some(Value::Bool(false)),
        _ => None,
    }
}

// ============================================================================
// Numbers
// ============================================================================

/// Optional sign, then either a `0x`/`0o` prefix or decimal digits with at
/// most one `.` and an optional exponent.
pub(crate) fn looks_like_number(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned.starts_with("0x") || unsigned.starts_with("0o") {
        return true;
    }

    let mut has_digit = false;
    let mut has_dot = false;
    let mut has_exponent = false;
    let mut after_exponent = false;
    for c in unsigned.chars() {
        match c {
            '0'..='9' => has_digit = true,
            '.' if !has_dot && !has_exponent => has_dot = true,
            'e' | 'E' if has_digit && !has_exponent => {
                has_exponent = true;
                after_exponent = true;
                continue;
            }
            '+' | '-' if after_exponent => {}
            _ => return false,
        }
        after_exponent = false;
    }
    has_digit
}

pub(crate) fn parse_number(text: &str) -> Value {
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if let Some(digits) = unsigned.strip_prefix("0x") {
        return parse_radix(text, digits, 16, negative);
    }
    if let Some(digits) = unsigned.strip_prefix("0o") {
        return parse_radix(text, digits, 8, negative);
    }
    if unsigned.contains(['e', 'E']) {
        return parse_decimal(text);
    }
    if unsigned.contains('.') {
        return parse_float(text);
    }
    match text.parse::<i64>() {
        Ok(n) => Value::Integer(n),
        Err(_) => parse_decimal(text),
    }
}

fn parse_radix(text: &str, digits: &str, radix: u32, negative: bool) -> Value {
    let Some(magnitude) = BigInt::parse_bytes(digits.as_bytes(), radix) else {
        return Value::String(text.to_string());
    };
    if digits.starts_with(['+', '-']) {
        return Value::String(text.to_string());
    }
    let n = if negative { -magnitude } else { magnitude };
    match n.to_i64() {
        Some(n) => Value::Integer(n),
        None => Value::Decimal(Decimal::new(n, 0)),
    }
}

fn parse_decimal(text: &str) -> Value {
    match text.parse::<Decimal>() {
        Ok(d) => Value::Decimal(d),
        Err(_) => Value::String(text.to_string()),
    }
}

/// Significant digits, counted from the first non-zero digit.
fn significant_digits(text: &str) -> usize {
    text.chars()
        .filter(char::is_ascii_digit)
        .skip_while(|&c| c == '0')
        .count()
}

fn parse_float(text: &str) -> Value {
    if significant_digits(text) > MAX_DOUBLE_DIGITS {
        return parse_decimal(text);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => Value::Integer(f as i64),
        Ok(f) => Value::Real(f),
        Err(_) => parse_decimal(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> Value {
        interpret_scalar(text, ScalarStyle::Plain, None)
    }

    fn tagged(text: &str, tag: &str) -> Value {
        interpret_scalar(text, ScalarStyle::Plain, Some(tag))
    }

    fn dec(text: &str) -> Value {
        Value::Decimal(text.parse().unwrap())
    }

    #[test]
    fn test_keywords() {
        assert_eq!(plain(""), Value::Null);
        assert_eq!(plain("~"), Value::Null);
        assert_eq!(plain("NULL"), Value::Null);
        assert_eq!(plain("True"), Value::Bool(true));
        assert_eq!(plain("FALSE"), Value::Bool(false));
        assert_eq!(plain("yes"), Value::from("yes"));
    }

    #[test]
    fn test_special_floats_stay_strings() {
        for text in [".inf", "-.Inf", "+.INF", ".nan", ".NaN", ".NAN"] {
            assert_eq!(plain(text), Value::from(text));
        }
    }

    #[test]
    fn test_quoted_and_block_are_strings() {
        assert_eq!(interpret_scalar("", ScalarStyle::SingleQuoted, None), Value::from(""));
        assert_eq!(interpret_scalar("1", ScalarStyle::DoubleQuoted, None), Value::from("1"));
        assert_eq!(interpret_scalar("true", ScalarStyle::Literal, None), Value::from("true"));
    }

    #[test]
    fn test_integers() {
        assert_eq!(plain("1"), Value::Integer(1));
        assert_eq!(plain("-17"), Value::Integer(-17));
        assert_eq!(plain("+5"), Value::Integer(5));
        assert_eq!(plain("0x1A"), Value::Integer(26));
        assert_eq!(plain("-0x10"), Value::Integer(-16));
        assert_eq!(plain("0o17"), Value::Integer(15));
        assert_eq!(plain("0xZZ"), Value::from("0xZZ"));
    }

    #[test]
    fn test_radix_prefixes_are_lowercase() {
        assert_eq!(plain("0X1A"), Value::from("0X1A"));
        assert_eq!(plain("0O17"), Value::from("0O17"));
        assert_eq!(plain("-0X10"), Value::from("-0X10"));
    }

    #[test]
    fn test_integer_overflow_becomes_decimal() {
        assert_eq!(
            plain("123456789012345678901234567890"),
            dec("123456789012345678901234567890")
        );
        assert_eq!(plain("0xFFFFFFFFFFFFFFFFFF"), Value::Decimal(Decimal::new(
            BigInt::parse_bytes(b"FFFFFFFFFFFFFFFFFF", 16).unwrap(),
            0
        )));
    }

    #[test]
    fn test_floats() {
        assert_eq!(plain("3.14"), Value::Real(3.14));
        assert_eq!(plain("3.0"), Value::Integer(3));
        assert_eq!(plain("-0.5"), Value::Real(-0.5));
        assert_eq!(plain(".5"), Value::Real(0.5));
    }

    #[test]
    fn test_exponent_is_always_decimal() {
        assert_eq!(plain("1e10"), dec("1e10"));
        assert!(matches!(plain("1e10"), Value::Decimal(_)));
        assert!(matches!(plain("2.5E-3"), Value::Decimal(_)));
    }

    #[test]
    fn test_significant_digit_threshold() {
        assert_eq!(plain("1.23456789012345"), Value::Real(1.23456789012345));
        assert_eq!(plain("0.000123456789012345"), Value::Real(0.000123456789012345));
        assert_eq!(plain("1.234567890123456"), dec("1.234567890123456"));
        assert_eq!(
            plain("3.141592653589793238462643383279"),
            dec("3.141592653589793238462643383279")
        );
    }

    #[test]
    fn test_not_numbers() {
        assert_eq!(plain("1.29.2"), Value::from("1.29.2"));
        assert_eq!(plain("1e"), Value::from("1e"));
        assert_eq!(plain("-"), Value::from("-"));
        assert_eq!(plain("12abc"), Value::from("12abc"));
        assert_eq!(plain("."), Value::from("."));
    }

    #[test]
    fn test_tags() {
        let str_tag = "tag:yaml.org,2002:str";
        assert_eq!(tagged("123", str_tag), Value::from("123"));
        assert_eq!(tagged("123", "!"), Value::from("123"));
        assert_eq!(tagged("anything", "tag:yaml.org,2002:null"), Value::Null);
        assert_eq!(tagged("TRUE", "tag:yaml.org,2002:bool"), Value::Bool(true));
        assert_eq!(tagged("yes", "tag:yaml.org,2002:bool"), Value::Bool(false));
        assert_eq!(tagged("42", "tag:yaml.org,2002:int"), Value::Integer(42));
        assert_eq!(tagged("2.0", "tag:yaml.org,2002:float"), Value::Integer(2));
        assert_eq!(tagged("abc", "tag:yaml.org,2002:int"), Value::from("abc"));
        assert_eq!(tagged("1", "tag:example.com,2000:thing"), Value::from("1"));
        assert_eq!(
            interpret_scalar("7", ScalarStyle::DoubleQuoted, Some("tag:yaml.org,2002:int")),
            Value::Integer(7)
        );
    }

    #[test]
    fn test_pure() {
        for text in ["1.234567890123456", "123456789012345", "0x1A", "x"] {
            assert_eq!(plain(text), plain(text));
        }
    }
}
