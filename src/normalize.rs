//! Canonical form of names and document numbers.
//!
//! Both functions are pure, total, and stateless; `normalize_name` and
//! `normalize_document` are idempotent.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Unicode NFD-decompose, drop combining marks, replace anything outside
/// letters/digits/whitespace with a single space, collapse whitespace,
/// uppercase, trim.
pub fn normalize_name(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let decomposed: String = s.nfd().filter(|c| !is_combining_mark(*c)).collect();

    let mut collapsed = String::with_capacity(decomposed.len());
    let mut last_was_space = false;
    for c in decomposed.chars() {
        let keep = c.is_alphanumeric() || c.is_whitespace();
        if keep {
            if c.is_whitespace() {
                if !last_was_space {
                    collapsed.push(' ');
                }
                last_was_space = true;
            } else {
                collapsed.push(c);
                last_was_space = false;
            }
        } else if !last_was_space {
            collapsed.push(' ');
            last_was_space = true;
        }
    }

    collapsed.trim().to_uppercase()
}

/// Strip whitespace, hyphen, period, comma, forward-slash; uppercase.
pub fn normalize_document(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    s.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | ',' | '/'))
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_strips_accents_and_uppercases() {
        assert_eq!(normalize_name("José María García"), "JOSE MARIA GARCIA");
    }

    #[test]
    fn normalize_name_is_idempotent() {
        let s = "  Jose-María O'Brien  ";
        let once = normalize_name(s);
        let twice = normalize_name(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_name_empty_and_absent() {
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn normalize_name_collapses_punctuation_to_space() {
        assert_eq!(normalize_name("Smith,  John."), "SMITH JOHN");
    }

    #[test]
    fn normalize_document_strips_separators() {
        assert_eq!(normalize_document("ab-123.456"), "AB123456");
        assert_eq!(normalize_document(" A B / C , D "), "ABCD");
    }

    #[test]
    fn normalize_document_idempotent() {
        let s = "ab-123.456";
        assert_eq!(normalize_document(&normalize_document(s)), normalize_document(s));
    }

    #[test]
    fn normalize_document_empty() {
        assert_eq!(normalize_document(""), "");
    }

    #[test]
    fn normalize_name_cjk_passthrough() {
        assert_eq!(normalize_name("李明"), "李明");
    }
}
