//! Path-segment sanitization for report directories.

/// Turn an arbitrary string into a directory-name segment: ASCII
/// alphanumerics and dots pass through, every other run of characters
/// collapses to a single underscore, and leading/trailing underscores are
/// dropped.
pub fn sanitize_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_underscore = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            out.push(c);
            prev_underscore = false;
        } else if !prev_underscore {
            out.push('_');
            prev_underscore = true;
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_alnum_and_dots() {
        assert_eq!(sanitize_segment("Float32"), "Float32");
        assert_eq!(sanitize_segment("bfv v1.2"), "bfv_v1.2");
    }

    #[test]
    fn collapses_and_trims_underscores() {
        assert_eq!(sanitize_segment("MatMul (2x3) x (3x2)"), "MatMul_2x3_x_3x2");
        assert_eq!(sanitize_segment("__a__b__"), "a_b");
        assert_eq!(sanitize_segment("  spaced  out  "), "spaced_out");
    }

    #[test]
    fn idempotent() {
        for s in ["MatMul (2x3) x (3x2)", "a..b", "--x--", "plain"] {
            let once = sanitize_segment(s);
            assert_eq!(sanitize_segment(&once), once);
        }
    }

    #[test]
    fn segments_match_the_allowed_alphabet() {
        let out = sanitize_segment("weird/§chars\tempty");
        assert!(out.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_'));
        assert!(!out.starts_with('_') && !out.ends_with('_'));
    }
}
