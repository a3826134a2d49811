//! Numeric helpers used by the value model

use crate::{Value, prelude::*};

/// The number of significant digits used when converting numbers to strings
const NUMBER_PRECISION: usize = 14;

/// Arithmetic operations that can be performed with [arith]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Power,
    Negate,
}

impl ArithOp {
    /// The tag method that's used when the operation is applied to non-numeric values
    pub fn tag_method(self) -> TagMethod {
        use ArithOp::*;
        match self {
            Add => TagMethod::Add,
            Subtract => TagMethod::Sub,
            Multiply => TagMethod::Mul,
            Divide => TagMethod::Div,
            Remainder => TagMethod::Mod,
            Power => TagMethod::Pow,
            Negate => TagMethod::Unm,
        }
    }
}

/// Performs an arithmetic operation on two numbers
///
/// The second operand is ignored for [ArithOp::Negate].
/// The remainder takes the sign of the dividend.
pub fn arith(op: ArithOp, a: f64, b: f64) -> f64 {
    use ArithOp::*;
    match op {
        Add => a + b,
        Subtract => a - b,
        Multiply => a * b,
        Divide => a / b,
        Remainder => a % b,
        Power => a.powf(b),
        Negate => -a,
    }
}

/// Converts a value to a number
///
/// Numbers are returned unchanged, strings are parsed (allowing surrounding whitespace and
/// hexadecimal integers), other values can't be converted.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Str(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();

    // 'inf' and 'nan' are accepted by f64's parser but aren't numeric literals
    if s.contains(['n', 'N']) {
        return None;
    }

    let (negative, unsigned) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let hex = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"));

    let n = match hex {
        Some(digits) => u64::from_str_radix(digits, 16).ok()? as f64,
        None => s.parse::<f64>().ok()?,
    };

    Some(if negative && hex.is_some() { -n } else { n })
}

/// Converts a number to a string with 14 significant digits
///
/// The output matches C's `%.14g` format.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return if n.is_sign_negative() { "-nan" } else { "nan" }.into();
    }
    if n.is_infinite() {
        return if n < 0.0 { "-inf" } else { "inf" }.into();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.into();
    }

    // Formatting in scientific notation first gives the exponent after rounding
    let scientific = format!("{:.*e}", NUMBER_PRECISION - 1, n);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..NUMBER_PRECISION as i32).contains(&exponent) {
        let decimals = (NUMBER_PRECISION as i32 - 1 - exponent) as usize;
        let fixed = format!("{n:.decimals$}");
        strip_trailing_zeros(&fixed).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            strip_trailing_zeros(mantissa),
            exponent.abs()
        )
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Converts a value to a string
///
/// Strings are returned unchanged, numbers are formatted with [number_to_string],
/// other values can't be converted.
pub fn coerce_to_string(value: &Value) -> Option<Ptr<str>> {
    match value {
        Value::Str(s) => Some(s.clone()),
        Value::Number(n) => Some(number_to_string(*n).into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1.0, "1")]
    #[test_case(-2.5, "-2.5")]
    #[test_case(0.1, "0.1")]
    #[test_case(1.0 / 3.0, "0.33333333333333")]
    #[test_case(100000000000000.0, "1e+14")]
    #[test_case(12345678901234.0, "12345678901234")]
    #[test_case(0.0001, "0.0001")]
    #[test_case(0.00001, "1e-05")]
    #[test_case(1.5e300, "1.5e+300")]
    #[test_case(f64::INFINITY, "inf")]
    #[test_case(-0.0, "-0")]
    fn number_formatting(n: f64, expected: &str) {
        assert_eq!(number_to_string(n), expected);
    }

    #[test_case("42", Some(42.0))]
    #[test_case("  -1.5e2 ", Some(-150.0))]
    #[test_case("0x1F", Some(31.0))]
    #[test_case("-0x10", Some(-16.0))]
    #[test_case("inf", None)]
    #[test_case("nan", None)]
    #[test_case("1 2", None)]
    #[test_case("", None)]
    fn string_to_number(s: &str, expected: Option<f64>) {
        assert_eq!(to_number(&Value::from(s)), expected);
    }

    #[test]
    fn remainder_takes_the_sign_of_the_dividend() {
        assert_eq!(arith(ArithOp::Remainder, -5.0, 3.0), -2.0);
        assert_eq!(arith(ArithOp::Remainder, 5.0, -3.0), 2.0);
    }

    #[test]
    fn coercion() {
        assert_eq!(coerce_to_string(&Value::Number(3.0)).as_deref(), Some("3"));
        assert_eq!(coerce_to_string(&Value::from("x")).as_deref(), Some("x"));
        assert!(coerce_to_string(&Value::Bool(true)).is_none());
    }
}
