//! Removal of personally identifiable information from voter comments.

use lazy_static::lazy_static;
use regex::Regex;

pub const REDACTED_PHONE_NUMBER: &str = "[REDACTED PHONE NUMBER]";
pub const REDACTED_NAME: &str = "[REDACTED NAME]";
pub const REDACTED_EMAIL: &str = "[REDACTED EMAIL]";
pub const REDACTED_NATIONAL_ID: &str = "[REDACTED NATIONAL ID]";

lazy_static! {
    // A 3-3-4 digit number not preceded by a digit. The leading character is
    // captured so it can be put back.
    static ref PHONE_NUMBER: Regex =
        Regex::new(r"(?P<lead>^|[^\d])\(?\d{3}\)?[-\s]?\d{3}[-\s]?\d{4}\b").unwrap();
    static ref EMAIL: Regex = Regex::new(r"\b\S+@\S+\.\S+\b").unwrap();
    static ref NATIONAL_ID: Regex = Regex::new(r"\b\d{3}[-\s]?[\s\d]{2}[-\s]?\d{4}\b").unwrap();
}

/// Redact the voter's own names, phone numbers, e-mail addresses and
/// national IDs from free text.
pub fn redact_free_text(free_text: &str, first_name: &str, last_name: &str) -> String {
    let mut text = free_text.to_string();
    for name in [first_name, last_name] {
        if !name.is_empty() {
            text = text.replace(name, REDACTED_NAME);
        }
    }

    let phone_replacement = format!("${{lead}}{REDACTED_PHONE_NUMBER}");
    let text = PHONE_NUMBER.replace_all(&text, phone_replacement.as_str());
    let text = EMAIL.replace_all(&text, REDACTED_EMAIL);
    let text = NATIONAL_ID.replace_all(&text, REDACTED_NATIONAL_ID);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_everything_personal() {
        let comment = "I am Adam Smith, call 555-123-4567 or (555) 123-4567, \
                       mail adam.smith@example.com, ID 111-11-1111.";
        assert_eq!(
            redact_free_text(comment, "Adam", "Smith"),
            "I am [REDACTED NAME] [REDACTED NAME], call [REDACTED PHONE NUMBER] or \
             [REDACTED PHONE NUMBER], mail [REDACTED EMAIL], ID [REDACTED NATIONAL ID]."
        );
    }

    #[test]
    fn phone_number_shapes() {
        assert_eq!(
            redact_free_text("5551234567", "", ""),
            REDACTED_PHONE_NUMBER
        );
        assert_eq!(
            redact_free_text("tel:555 123 4567!", "", ""),
            "tel:[REDACTED PHONE NUMBER]!"
        );
        // Too many digits to be a phone number.
        assert_eq!(redact_free_text("15551234567", "", ""), "15551234567");
    }

    #[test]
    fn national_id_shapes() {
        assert_eq!(
            redact_free_text("my id 111111111", "", ""),
            "my id [REDACTED NATIONAL ID]"
        );
        assert_eq!(
            redact_free_text("my id 111 11 1111", "", ""),
            "my id [REDACTED NATIONAL ID]"
        );
    }

    #[test]
    fn leaves_ordinary_text_alone() {
        let comment = "Please fix the potholes on 5th street by 2025.";
        assert_eq!(redact_free_text(comment, "Linda", "Qi"), comment);
        assert_eq!(redact_free_text("", "Linda", "Qi"), "");
    }
}
