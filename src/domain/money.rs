use std::fmt;

/// Money is represented as integer cents to avoid floating-point precision
/// issues. 50.00 in whatever currency the office books in = 5000 cents.
pub type Cents = i64;

/// Format cents as a decimal string. Example: 5000 -> "50.00".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal string into cents. Example: "50.00" -> 5000, "50" -> 5000.
/// More than two decimal digits are truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let cents = match digits.split_once('.') {
        None => parse_digits(digits)? * 100,
        Some((units, decimals)) => {
            let units = if units.is_empty() {
                0
            } else {
                parse_digits(units)?
            };
            let decimals = match decimals.len() {
                0 => 0,
                1 => parse_digits(decimals)? * 10,
                // get() rather than a byte slice: a multibyte character in
                // the decimal part must fail, not panic mid-codepoint.
                _ => parse_digits(decimals.get(..2).ok_or(ParseCentsError::InvalidFormat)?)?,
            };
            units * 100 + decimals
        }
    };

    Ok(if negative { -cents } else { cents })
}

fn parse_digits(s: &str) -> Result<i64, ParseCentsError> {
    s.parse().map_err(|_| ParseCentsError::InvalidFormat)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(50000), "500.00");
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(1), "0.01");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-5000), "-50.00");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("500.00"), Ok(50000));
        assert_eq!(parse_cents("500"), Ok(50000));
        assert_eq!(parse_cents("12.34"), Ok(1234));
        assert_eq!(parse_cents("12.5"), Ok(1250));
        assert_eq!(parse_cents(".50"), Ok(50));
        assert_eq!(parse_cents("-50.00"), Ok(-5000));
        assert_eq!(parse_cents("100.999"), Ok(10099)); // Truncates
    }

    #[test]
    fn test_parse_cents_invalid() {
        assert!(parse_cents("abc").is_err());
        assert!(parse_cents("12.34.56").is_err());
        assert!(parse_cents("").is_err());
    }

    #[test]
    fn test_parse_cents_multibyte_decimals() {
        // Must be a parse error, not a panic on a codepoint boundary.
        assert_eq!(parse_cents("1.€5"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("1.5€"), Err(ParseCentsError::InvalidFormat));
    }
}
