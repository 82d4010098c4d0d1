//! Brazilian-Portuguese number, date and address formatting used on certificates

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Placeholder printed when a statistic is missing
pub const MISSING_NUMBER: &str = "0,00";

/// Placeholder printed when the correction factor is missing
pub const MISSING_FACTOR: &str = "1,0000";

/// Printed when an address has no usable part
pub const MISSING_ADDRESS: &str = "Endereço não informado";

/// Format a number with a comma decimal separator and fixed places
pub fn decimal_comma(value: f64, places: usize) -> String {
    format!("{:.*}", places, value).replace('.', ",")
}

/// Format a statistic with two places; missing or zero values print "0,00"
pub fn number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v != 0.0 => decimal_comma(v, 2),
        _ => MISSING_NUMBER.to_string(),
    }
}

/// Format the correction factor with four places
pub fn factor(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => decimal_comma(v, 4),
        _ => MISSING_FACTOR.to_string(),
    }
}

/// Format a nominal volume the way operators write it ("100", "2,5")
pub fn volume(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string().replace('.', ",")
    }
}

/// Format a date as DD/MM/YYYY
pub fn date(value: NaiveDate) -> String {
    value.format("%d/%m/%Y").to_string()
}

/// Structured postal address of a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub street: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub number: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub district: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub city: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub postal_code: String,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.format_line() == MISSING_ADDRESS
    }

    /// Single-line form: "Street, number - District - City - UF - CEP 00000-000"
    ///
    /// Empty parts are left out with their separator. The postal code is
    /// printed only when it has exactly eight digits.
    pub fn format_line(&self) -> String {
        let mut line = String::new();

        let mut push = |sep: &str, part: &str| {
            if part.is_empty() {
                return;
            }
            if !line.is_empty() {
                line.push_str(sep);
            }
            line.push_str(part);
        };

        push("", self.street.trim());
        push(", ", self.number.trim());
        push(" - ", self.district.trim());
        push(" - ", self.city.trim());
        push(" - ", &self.state.trim().to_uppercase());

        let digits: String = self
            .postal_code
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        if digits.len() == 8 {
            push(" - ", &format!("CEP {}-{}", &digits[..5], &digits[5..]));
        }

        if line.is_empty() {
            MISSING_ADDRESS.to_string()
        } else {
            line
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format_line())
    }
}

/// Whether a certificate number has the form `<digits>.<digits?>`
pub fn is_valid_certificate_number(number: &str) -> bool {
    match number.split_once('.') {
        Some((prefix, suffix)) => {
            !prefix.is_empty()
                && prefix.chars().all(|c| c.is_ascii_digit())
                && suffix.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Part of a certificate number up to and including the dot ("123.")
pub fn certificate_prefix(number: &str) -> String {
    match number.find('.') {
        Some(idx) => number[..=idx].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number(Some(99.88)), "99,88");
        assert_eq!(number(Some(-0.12)), "-0,12");
        assert_eq!(number(Some(1234.5)), "1234,50");
        assert_eq!(number(None), "0,00");
        assert_eq!(number(Some(0.0)), "0,00");
        assert_eq!(number(Some(f64::NAN)), "0,00");
    }

    #[test]
    fn test_factor_formatting() {
        assert_eq!(factor(Some(1.0043)), "1,0043");
        assert_eq!(factor(Some(1.002)), "1,0020");
        assert_eq!(factor(None), "1,0000");
    }

    #[test]
    fn test_volume_formatting() {
        assert_eq!(volume(100.0), "100");
        assert_eq!(volume(2.5), "2,5");
    }

    #[test]
    fn test_date_formatting() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(date(d), "07/03/2025");
    }

    #[test]
    fn test_full_address() {
        let address = Address {
            street: "Rua das Flores".into(),
            number: "120".into(),
            district: "Centro".into(),
            city: "Fortaleza".into(),
            state: "ce".into(),
            postal_code: "60.110-000".into(),
        };
        assert_eq!(
            address.format_line(),
            "Rua das Flores, 120 - Centro - Fortaleza - CE - CEP 60110-000"
        );
    }

    #[test]
    fn test_partial_address() {
        let address = Address {
            city: "Fortaleza".into(),
            postal_code: "123".into(),
            ..Address::default()
        };
        assert_eq!(address.format_line(), "Fortaleza");
    }

    #[test]
    fn test_empty_address() {
        assert_eq!(Address::default().format_line(), MISSING_ADDRESS);
        assert!(Address::default().is_empty());
    }

    #[test]
    fn test_certificate_number_validation() {
        assert!(is_valid_certificate_number("123.45"));
        assert!(is_valid_certificate_number("123."));
        assert!(!is_valid_certificate_number(".45"));
        assert!(!is_valid_certificate_number("123"));
        assert!(!is_valid_certificate_number("12a.4"));
        assert!(!is_valid_certificate_number("1.2.3"));
        assert!(!is_valid_certificate_number(""));
    }

    #[test]
    fn test_certificate_prefix() {
        assert_eq!(certificate_prefix("123.45"), "123.");
        assert_eq!(certificate_prefix("77"), "");
    }
}
