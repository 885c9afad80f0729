//! SQL `LIKE` pattern matching.
//!
//! Patterns are matched against the entire input string. `%` matches zero
//! or more characters and `_` matches exactly one; every other character
//! matches itself, case sensitively.

/// Returns true if `value` matches the LIKE `pattern`.
pub fn like(value: &str, pattern: &str) -> bool {
    let value_chars: Vec<char> = value.chars().collect();
    let pattern_chars: Vec<char> = pattern.chars().collect();
    like_recursive(&value_chars, &pattern_chars, 0, 0)
}

fn like_recursive(value: &[char], pattern: &[char], vi: usize, pi: usize) -> bool {
    if pi == pattern.len() {
        return vi == value.len();
    }

    match pattern[pi] {
        '%' => {
            // % matches zero or more characters
            for i in vi..=value.len() {
                if like_recursive(value, pattern, i, pi + 1) {
                    return true;
                }
            }
            false
        }
        '_' => {
            // _ matches exactly one character
            if vi < value.len() {
                like_recursive(value, pattern, vi + 1, pi + 1)
            } else {
                false
            }
        }
        c => {
            if vi < value.len() && value[vi] == c {
                like_recursive(value, pattern, vi + 1, pi + 1)
            } else {
                false
            }
        }
    }
}
