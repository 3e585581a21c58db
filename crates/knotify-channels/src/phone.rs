//! Phone number normalization to E.164.

/// Normalize a raw phone number to `+<country><national>` form.
///
/// Accepts common formatting noise (spaces, dashes, dots, parens), a
/// leading `+` or `00` international prefix, or a national number with a
/// leading trunk `0` which is replaced by `country_code`. Returns `None`
/// when the result is not a plausible E.164 number.
pub fn normalize(raw: &str, country_code: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    // Anything left besides digits and formatting noise is invalid.
    if trimmed
        .chars()
        .any(|c| !c.is_ascii_digit() && !matches!(c, '+' | ' ' | '-' | '.' | '(' | ')'))
    {
        return None;
    }

    let international = if has_plus {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("{country_code}{rest}")
    } else {
        // Already in international form without the plus, or a bare
        // national number in a no-trunk-prefix plan. Assume the former
        // when it starts with the country code.
        if digits.starts_with(country_code) {
            digits
        } else {
            format!("{country_code}{digits}")
        }
    };

    // E.164: up to 15 digits; anything under 8 is not a real subscriber number.
    if international.len() < 8 || international.len() > 15 {
        return None;
    }
    Some(format!("+{international}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_international() {
        assert_eq!(normalize("+15551234567", "1"), Some("+15551234567".into()));
    }

    #[test]
    fn test_formatting_noise() {
        assert_eq!(
            normalize("+1 (555) 123-4567", "1"),
            Some("+15551234567".into())
        );
        assert_eq!(normalize("555.123.4567", "1"), Some("+15551234567".into()));
    }

    #[test]
    fn test_trunk_zero_replaced() {
        assert_eq!(normalize("0912 345 678", "84"), Some("+84912345678".into()));
    }

    #[test]
    fn test_double_zero_prefix() {
        assert_eq!(normalize("0084912345678", "1"), Some("+84912345678".into()));
    }

    #[test]
    fn test_existing_country_code_not_doubled() {
        assert_eq!(normalize("15551234567", "1"), Some("+15551234567".into()));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(normalize("", "1"), None);
        assert_eq!(normalize("not a phone", "1"), None);
        assert_eq!(normalize("555-CALL-NOW", "1"), None);
        assert_eq!(normalize("123", "1"), None);
        assert_eq!(normalize("+123456789012345678", "1"), None);
    }
}
