//! Pattern anchoring, character-class detection and the accepted regex
//! subset (spec §4.3, §6).

use crate::error::NfaError;

/// Rewrites `pattern` to `.*pattern$` unless it already ends with `$`.
/// Returns the anchored form; the original is kept unchanged by the
/// caller for metadata.
pub fn anchor_pattern(pattern: &str) -> String {
    if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!(".*{pattern}$")
    }
}

/// Validates that `pattern` only uses the accepted subset: literal
/// characters, `.`, `*`, `+`, `?`, `|`, grouping `()`, character classes
/// `[abc]`, and a trailing `$`. Rejects lookaround, backreferences,
/// Unicode property classes, and any anchor other than a trailing `$`.
pub fn validate_pattern_subset(pattern: &str) -> Result<(), NfaError> {
    let bytes = pattern.as_bytes();
    let mut chars = pattern.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '^' => {
                return Err(NfaError::InvalidRegex(
                    pattern.to_string(),
                    "'^' anchors are not part of the accepted subset".to_string(),
                ));
            }
            '$' if i + 1 != bytes.len() => {
                return Err(NfaError::InvalidRegex(
                    pattern.to_string(),
                    "'$' is only accepted as the trailing anchor".to_string(),
                ));
            }
            '\\' => {
                if let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_digit() {
                        return Err(NfaError::InvalidRegex(
                            pattern.to_string(),
                            "backreferences are not supported".to_string(),
                        ));
                    }
                }
            }
            '(' => {
                if pattern[i..].starts_with("(?") {
                    return Err(NfaError::InvalidRegex(
                        pattern.to_string(),
                        "lookaround/named groups are not supported".to_string(),
                    ));
                }
            }
            'p' if i > 0 && bytes[i - 1] == b'\\' => {
                return Err(NfaError::InvalidRegex(
                    pattern.to_string(),
                    "Unicode property classes are not supported".to_string(),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Extracts the characters inside a `[...]` character class, if one is
/// present anywhere in `pattern`. Returns `None` if no class is found.
pub fn extract_character_class(pattern: &str) -> Option<Vec<char>> {
    let start = pattern.find('[')?;
    let end = pattern[start..].find(']')? + start;
    let class = &pattern[start + 1..end];
    if class.is_empty() {
        return None;
    }
    Some(class.chars().collect())
}

/// Replaces the `[...]` class in `pattern` with a single literal
/// character, preserving the rest of the pattern verbatim.
pub fn substitute_class_with_char(pattern: &str, c: char) -> String {
    let start = match pattern.find('[') {
        Some(s) => s,
        None => return pattern.to_string(),
    };
    let end = match pattern[start..].find(']') {
        Some(e) => e + start,
        None => return pattern.to_string(),
    };
    let mut out = String::with_capacity(pattern.len());
    out.push_str(&pattern[..start]);
    out.push(c);
    out.push_str(&pattern[end + 1..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchoring_is_idempotent_when_dollar_present() {
        assert_eq!(anchor_pattern(".*A$"), ".*A$");
    }

    #[test]
    fn anchoring_wraps_bare_pattern() {
        assert_eq!(anchor_pattern(".*A"), ".*.*A$");
        assert_eq!(anchor_pattern("A"), ".*A$");
    }

    #[test]
    fn rejects_caret_anchor() {
        assert!(validate_pattern_subset("^A.*").is_err());
    }

    #[test]
    fn rejects_mid_string_dollar() {
        assert!(validate_pattern_subset("A$B").is_err());
    }

    #[test]
    fn accepts_trailing_dollar() {
        assert!(validate_pattern_subset(".*A$").is_ok());
    }

    #[test]
    fn rejects_backreference() {
        assert!(validate_pattern_subset(r"(A)\1").is_err());
    }

    #[test]
    fn rejects_lookaround() {
        assert!(validate_pattern_subset("(?=A)B").is_err());
    }

    #[test]
    fn rejects_unicode_property_class() {
        assert!(validate_pattern_subset(r"\p{L}").is_err());
    }

    #[test]
    fn extracts_character_class() {
        assert_eq!(
            extract_character_class(".*[IJKL].*"),
            Some(vec!['I', 'J', 'K', 'L'])
        );
        assert_eq!(extract_character_class(".*A.*"), None);
    }

    #[test]
    fn substitutes_class_with_single_char() {
        assert_eq!(substitute_class_with_char(".*[IJKL].*", 'J'), ".*J.*");
    }
}
