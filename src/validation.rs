//! Validates `ScreeningInput` before any matching work.
//!
//! Checks run in a fixed order; the first failure is returned. Every
//! failure is logged through the security log with a sanitized excerpt
//! of the offending value.

use regex::Regex;
use tracing::warn;

use crate::config::InputValidationConfig;
use crate::error::ValidationError;
use crate::log_sanitizer::sanitize_for_logging_with_limit;
use crate::model::ScreeningInput;

/// Validates a `ScreeningInput` against `config`, logging and returning
/// the first failing check, in order.
pub fn validate_screening_input(
    input: &ScreeningInput,
    config: &InputValidationConfig,
) -> Result<(), ValidationError> {
    let name = input.name.trim();

    if name.chars().count() < config.name_min_length {
        return fail(ValidationError::NameTooShort, &input.name, "name");
    }
    if input.name.chars().count() > config.name_max_length {
        return fail(ValidationError::NameTooLong, &input.name, "name");
    }
    if input
        .name
        .chars()
        .any(|c| config.blocked_characters.contains(c))
    {
        return fail(ValidationError::BlockedCharacters, &input.name, "name");
    }
    if input
        .name
        .chars()
        .any(|c| general_category_is_c(c))
    {
        return fail(ValidationError::ControlCharacter, &input.name, "name");
    }
    if !config.allow_unicode_names {
        let latin_name = Regex::new(r"^[A-Za-zÀ-ÿ\s\-\.',]*$").unwrap();
        if !latin_name.is_match(&input.name) {
            return fail(ValidationError::InvalidFormat, &input.name, "name");
        }
    }
    if let Some(dob) = &input.date_of_birth {
        let dob_pattern = Regex::new(r"^\d{4}(-\d{2}(-\d{2})?)?$").unwrap();
        if !dob_pattern.is_match(dob) {
            return fail(ValidationError::InvalidDobFormat, dob, "date_of_birth");
        }
    }
    if let Some(doc) = &input.document_number {
        if doc.chars().count() > config.document_max_length {
            return fail(ValidationError::DocumentTooLong, doc, "document_number");
        }
        let doc_pattern = Regex::new(r"^[A-Za-z0-9\-\s.]+$").unwrap();
        if !doc_pattern.is_match(doc) {
            return fail(
                ValidationError::InvalidDocumentFormat,
                doc,
                "document_number",
            );
        }
    }

    Ok(())
}

/// Unicode general category "C*" (control, format, surrogate, unassigned).
/// `char::is_control` only covers Cc; Cf/Cs/Co/Cn are approximated with
/// explicit ranges for the zero-width/format/bidi marks most likely to
/// appear in spoofed input, since Rust's standard library does not expose
/// the full Unicode category table without an extra dependency.
fn general_category_is_c(c: char) -> bool {
    if c.is_control() {
        return true;
    }
    matches!(
        c as u32,
        0x200B..=0x200F // zero-width/format marks
        | 0x202A..=0x202E // bidi format controls
        | 0x2060..=0x2064
        | 0xFEFF
        | 0xFFF9..=0xFFFB
        | 0xD800..=0xDFFF // surrogate range, unreachable via valid `char` but kept for clarity
    )
}

fn fail(err: ValidationError, raw_value: &str, field: &str) -> Result<(), ValidationError> {
    let sanitized = sanitize_for_logging_with_limit(raw_value, 50);
    warn!(
        target: "security",
        event_type = "VALIDATION_FAILED",
        field = field,
        error_code = err.code(),
        sanitized_input = %sanitized,
        "screening input failed validation"
    );
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> InputValidationConfig {
        InputValidationConfig::default()
    }

    fn input(name: &str) -> ScreeningInput {
        ScreeningInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_too_short_name() {
        let err = validate_screening_input(&input("A"), &cfg()).unwrap_err();
        assert_eq!(err.code(), "NAME_TOO_SHORT");
    }

    #[test]
    fn rejects_too_long_name() {
        let long = "A".repeat(201);
        let err = validate_screening_input(&input(&long), &cfg()).unwrap_err();
        assert_eq!(err.code(), "NAME_TOO_LONG");
    }

    #[test]
    fn rejects_blocked_characters() {
        let err =
            validate_screening_input(&input("Robert'); DROP TABLE--"), &cfg()).unwrap_err();
        assert_eq!(err.code(), "BLOCKED_CHARACTERS");
    }

    #[test]
    fn rejects_control_characters() {
        let err = validate_screening_input(&input("John\x01Smith"), &cfg()).unwrap_err();
        assert_eq!(err.code(), "CONTROL_CHARACTER");
    }

    #[test]
    fn accepts_unicode_names_by_default() {
        let cjk = input("李明");
        assert!(validate_screening_input(&cjk, &cfg()).is_ok());
        let arabic = input("محمد احمد");
        assert!(validate_screening_input(&arabic, &cfg()).is_ok());
        let cyrillic = input("Иван Петров");
        assert!(validate_screening_input(&cyrillic, &cfg()).is_ok());
    }

    #[test]
    fn rejects_non_latin_when_unicode_disabled() {
        let mut c = cfg();
        c.allow_unicode_names = false;
        let err = validate_screening_input(&input("李明"), &c).unwrap_err();
        assert_eq!(err.code(), "INVALID_FORMAT");
    }

    #[test]
    fn rejects_bad_dob_format() {
        let mut inp = input("John Smith");
        inp.date_of_birth = Some("70-01-01".to_string());
        let err = validate_screening_input(&inp, &cfg()).unwrap_err();
        assert_eq!(err.code(), "INVALID_DOB_FORMAT");
    }

    #[test]
    fn accepts_partial_dob_formats() {
        for dob in ["1970", "1970-01", "1970-01-15"] {
            let mut inp = input("John Smith");
            inp.date_of_birth = Some(dob.to_string());
            assert!(validate_screening_input(&inp, &cfg()).is_ok());
        }
    }

    #[test]
    fn rejects_bad_document_format() {
        let mut inp = input("John Smith");
        inp.document_number = Some("AB#123".to_string());
        let err = validate_screening_input(&inp, &cfg()).unwrap_err();
        assert_eq!(err.code(), "INVALID_DOCUMENT_FORMAT");
    }

    #[test]
    fn rejects_document_too_long() {
        let mut inp = input("John Smith");
        inp.document_number = Some("A".repeat(51));
        let err = validate_screening_input(&inp, &cfg()).unwrap_err();
        assert_eq!(err.code(), "DOCUMENT_TOO_LONG");
    }

    #[test]
    fn validation_ordering_returns_earliest_check() {
        // A name that is both too short AND contains blocked characters:
        // length check (earlier in the table) must win.
        let err = validate_screening_input(&input(";"), &cfg()).unwrap_err();
        assert_eq!(err.code(), "NAME_TOO_SHORT");
    }
}
