//! Lexical rules shared by every statement.
//!
//! - identifiers: `[A-Za-z_][A-Za-z0-9_]*`
//! - variable references: an identifier, optionally scoped as `scope.name`
//! - numbers: shortest round-trip decimal, integral values without a fraction

/// Separator between a scope prefix and a variable name.
pub const SCOPE_SEPARATOR: char = '.';

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A variable reference is either `name` or `scope.name`.
pub fn is_variable_reference(s: &str) -> bool {
    match s.split_once(SCOPE_SEPARATOR) {
        Some((scope, name)) => is_identifier(scope) && is_identifier(name),
        None => is_identifier(s),
    }
}

/// Splits `scope.name` into its parts. Unscoped references yield `None`.
pub fn split_scope(reference: &str) -> Option<(&str, &str)> {
    reference.split_once(SCOPE_SEPARATOR)
}

pub fn scoped(scope: &str, name: &str) -> String {
    format!("{scope}{SCOPE_SEPARATOR}{name}")
}

/// Render a finite number deterministically.
///
/// `f64`'s `Display` already produces the shortest representation that
/// round-trips and never switches to exponent notation, so `10.0` renders as
/// `10` and `0.1` as `0.1`. Negative zero is normalized to `0`.
pub fn format_number(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    if value == 0.0 {
        return Some("0".to_string());
    }
    Some(format!("{value}"))
}

/// Bare (unquoted) option values such as algorithm names (`CVODE`,
/// `kisao.0000019`).
pub fn is_bare_word(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("S1"));
        assert!(is_identifier("_tmp"));
        assert!(is_identifier("model0"));
        assert!(!is_identifier("0model"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn variable_references() {
        assert!(is_variable_reference("time"));
        assert!(is_variable_reference("task1.S1"));
        assert!(!is_variable_reference("task1."));
        assert!(!is_variable_reference("a.b.c"));
    }

    #[test]
    fn numbers_render_without_trailing_fraction() {
        assert_eq!(format_number(10.0).as_deref(), Some("10"));
        assert_eq!(format_number(0.4).as_deref(), Some("0.4"));
        assert_eq!(format_number(-0.0).as_deref(), Some("0"));
        assert_eq!(format_number(-2.5).as_deref(), Some("-2.5"));
        assert_eq!(format_number(f64::NAN), None);
        assert_eq!(format_number(f64::INFINITY), None);
    }

    #[test]
    fn split_scope_only_splits_scoped_refs() {
        assert_eq!(split_scope("task1.S1"), Some(("task1", "S1")));
        assert_eq!(split_scope("S1"), None);
        assert_eq!(scoped("task1", "S1"), "task1.S1");
    }
}
