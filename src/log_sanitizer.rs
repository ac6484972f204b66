//! Strips control/format characters before untrusted text reaches logs.
//! Grounded on `xml_utils.py::sanitize_for_logging`, extended with
//! zero-width/format-character stripping beyond plain ASCII control codes.

/// Characters that enable log-view smuggling beyond plain ASCII control
/// codes: zero-width space/joiners, BOM, and line/paragraph separators.
const SMUGGLING_CHARS: [char; 6] = [
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}', '\u{2028}', '\u{2029}',
];

const DEFAULT_MAX_LEN: usize = 500;

/// `sanitize_for_logging(s)`: deterministic, total. Returns the empty
/// string for empty/absent input.
pub fn sanitize_for_logging(s: &str) -> String {
    sanitize_for_logging_with_limit(s, DEFAULT_MAX_LEN)
}

/// Security-log call sites may impose a tighter cap than the default 500.
pub fn sanitize_for_logging_with_limit(s: &str, max_len: usize) -> String {
    if s.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        let is_control = matches!(c, '\x00'..='\x1F' | '\x7F'..='\u{9F}' | '\r' | '\n');
        let is_smuggling = SMUGGLING_CHARS.contains(&c);
        if is_control || is_smuggling {
            if is_control {
                if !last_was_space {
                    out.push(' ');
                }
                last_was_space = true;
            }
            // Smuggling characters are dropped entirely, not replaced with
            // a space, since they carry no visual width to collapse.
            continue;
        }
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }

    let trimmed = out.trim();
    if trimmed.chars().count() > max_len {
        trimmed.chars().take(max_len).collect()
    } else {
        trimmed.to_string()
    }
}
