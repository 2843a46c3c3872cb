use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Field, FieldErrors};
use crate::lookup::{normalize_university_key, UniversityDirectory};
use crate::models::{SubmissionForm, SubmissionRecord};

pub const NAME_MESSAGE: &str = "Please enter your name (at least 2 characters)";
pub const PHONE_MESSAGE: &str = "Please enter a valid phone number (10-15 digits)";
pub const EMAIL_MESSAGE: &str = "Please enter a valid email address";
pub const UNIVERSITY_MESSAGE: &str = "Please select a university from the list";

pub const DEFAULT_COUNTRY_CODE: &str = "+1";

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Whether the email field must be filled in. The two product variants differ
/// only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmailPolicy {
    Required,
    #[default]
    Optional,
}

pub fn validate_name(name: &str) -> bool {
    name.trim().chars().count() >= 2
}

pub fn validate_phone(phone: &str) -> bool {
    (10..=15).contains(&digits_only(phone).len())
}

pub fn validate_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();

    EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Renders a 10-digit number as `123-456-7890`; anything else is returned unchanged.
pub fn format_phone_display(phone: &str) -> String {
    let digits = digits_only(phone);
    if digits.len() == 10 {
        format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..])
    } else {
        phone.to_string()
    }
}

/// Checks every field and, if all pass, produces the normalized record that
/// gets written. The country code is concatenated with the local number
/// before the digit count is checked, and a blank code fails the phone field
/// since it is the country counter's key.
pub fn validate_form(
    form: &SubmissionForm,
    policy: EmailPolicy,
    universities: &UniversityDirectory,
) -> Result<SubmissionRecord, FieldErrors> {
    let mut errors = FieldErrors::default();
    let full_phone = format!("{}{}", form.country_code, form.phone);

    if !validate_name(&form.name) {
        errors.insert(Field::Name, NAME_MESSAGE);
    }

    if form.country_code.trim().is_empty() || !validate_phone(&full_phone) {
        errors.insert(Field::Phone, PHONE_MESSAGE);
    }

    let email = form.email.trim().to_lowercase();
    let email = match policy {
        EmailPolicy::Optional if email.is_empty() => None,
        _ if validate_email(&email) => Some(email),
        _ => {
            errors.insert(Field::Email, EMAIL_MESSAGE);
            None
        }
    };

    let university = form
        .university
        .as_deref()
        .map(normalize_university_key)
        .filter(|key| !key.is_empty());

    if let Some(key) = &university {
        if !universities.contains(key) {
            errors.insert(Field::University, UNIVERSITY_MESSAGE);
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(SubmissionRecord {
        name: form.name.trim().to_string(),
        phone: digits_only(&full_phone),
        country_code: form.country_code.trim().to_string(),
        email,
        university,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, country_code: &str, phone: &str, email: &str) -> SubmissionForm {
        SubmissionForm {
            name: name.to_string(),
            country_code: country_code.to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
            university: None,
        }
    }

    fn universities() -> UniversityDirectory {
        UniversityDirectory::bundled().expect("bundled universities parse")
    }

    #[test]
    fn name_needs_two_characters_after_trimming() {
        assert!(validate_name("Al"));
        assert!(validate_name("  Avery Lee "));
        assert!(!validate_name(" A "));
        assert!(!validate_name(""));
        assert!(!validate_name("     "));
    }

    #[test]
    fn phone_counts_digits_only() {
        assert!(validate_phone("+1 555-123-4567"));
        assert!(validate_phone("0123456789"));
        assert!(validate_phone("123456789012345"));
        assert!(!validate_phone("123"));
        assert!(!validate_phone("123456789"));
        assert!(!validate_phone("1234567890123456"));
        assert!(!validate_phone("phone: (555) 12"));
    }

    #[test]
    fn email_needs_a_dot_after_the_at_sign() {
        assert!(validate_email("a@b.com"));
        assert!(validate_email("first.last@mail.example.org"));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("a@b"));
        assert!(!validate_email("a@@b.com"));
        assert!(!validate_email("a b@c.com"));
        assert!(!validate_email("a@b."));
    }

    #[test]
    fn formats_ten_digit_numbers_with_dashes() {
        assert_eq!(format_phone_display("5551234567"), "555-123-4567");
        assert_eq!(format_phone_display("+27 82 123 4567"), "+27 82 123 4567");
    }

    #[test]
    fn valid_form_is_normalized() {
        let mut input = form("  Avery Lee ", " +27 ", "82 123 4567", " Avery@Example.COM ");
        input.university = Some(" UCT ".to_string());

        let record = validate_form(&input, EmailPolicy::Required, &universities()).expect("valid");

        assert_eq!(record.name, "Avery Lee");
        assert_eq!(record.phone, "27821234567");
        assert_eq!(record.country_code, "+27");
        assert_eq!(record.email.as_deref(), Some("avery@example.com"));
        assert_eq!(record.university.as_deref(), Some("uct"));
    }

    #[test]
    fn optional_email_variant_skips_empty_email() {
        let input = form("Jules", "+1", "5551234567", "   ");
        let record = validate_form(&input, EmailPolicy::Optional, &universities()).expect("valid");
        assert_eq!(record.email, None);

        let errors = validate_form(&input, EmailPolicy::Required, &universities()).unwrap_err();
        assert_eq!(errors.get(Field::Email), Some(EMAIL_MESSAGE));
    }

    #[test]
    fn optional_email_is_still_checked_when_present() {
        let input = form("Jules", "+1", "5551234567", "jules@nowhere");
        let errors = validate_form(&input, EmailPolicy::Optional, &universities()).unwrap_err();
        assert_eq!(errors.get(Field::Email), Some(EMAIL_MESSAGE));
    }

    #[test]
    fn every_failing_field_is_reported() {
        let mut input = form("J", "+1", "12", "x");
        input.university = Some("hogwarts".to_string());

        let errors = validate_form(&input, EmailPolicy::Required, &universities()).unwrap_err();

        assert_eq!(errors.get(Field::Name), Some(NAME_MESSAGE));
        assert_eq!(errors.get(Field::Phone), Some(PHONE_MESSAGE));
        assert_eq!(errors.get(Field::Email), Some(EMAIL_MESSAGE));
        assert_eq!(errors.get(Field::University), Some(UNIVERSITY_MESSAGE));
        assert_eq!(errors.iter().count(), 4);
    }

    #[test]
    fn blank_country_code_is_a_phone_error() {
        let input = form("Jules", "   ", "0821234567", "");
        let errors = validate_form(&input, EmailPolicy::Optional, &universities()).unwrap_err();
        assert_eq!(errors.get(Field::Phone), Some(PHONE_MESSAGE));
        assert_eq!(errors.iter().count(), 1);
    }

    #[test]
    fn blank_university_is_treated_as_not_selected() {
        let mut input = form("Kiara", "+27", "821234567", "");
        input.university = Some("  ".to_string());

        let record = validate_form(&input, EmailPolicy::Optional, &universities()).expect("valid");
        assert_eq!(record.university, None);
    }
}
