use regex::Regex;
use std::fmt::Display;
use std::sync::OnceLock;

/// Literal used for values that are missing from the source row.
pub const MISSING_VALUE: &str = "None";

fn illegal_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("filename regex"))
}

/// Replace characters not allowed in filenames with `_` and trim surrounding whitespace.
pub fn sanitize_filename(value: impl Display) -> String {
    let s = value.to_string();
    illegal_chars().replace_all(&s, "_").trim().to_string()
}

/// Same as [`sanitize_filename`], with a missing value rendered as `None`.
pub fn sanitize_optional(value: Option<&str>) -> String {
    sanitize_filename(value.unwrap_or(MISSING_VALUE))
}

/// Keep only the date part of an ISO-8601 timestamp (everything before the first `T`).
pub fn date_part(raw: &str) -> &str {
    match raw.find('T') {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_illegal_character() {
        let out = sanitize_filename(r#"a\b/c*d?e:f"g<h>i|j"#);
        assert_eq!(out, "a_b_c_d_e_f_g_h_i_j");
        assert!(!out.chars().any(|c| r#"\/*?:"<>|"#.contains(c)));
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(sanitize_filename("  Acme Co  "), "Acme Co");
    }

    #[test]
    fn is_idempotent() {
        for s in ["", "  x ", "A/B: C?", "Ünïcødé <ok>", " | ", "plain"] {
            let once = sanitize_filename(s);
            assert_eq!(sanitize_filename(&once), once, "input {:?}", s);
        }
    }

    #[test]
    fn accepts_non_string_values() {
        assert_eq!(sanitize_filename(42), "42");
        assert_eq!(sanitize_optional(None), "None");
        assert_eq!(sanitize_optional(Some(" a:b ")), "a_b");
    }

    #[test]
    fn date_part_cuts_at_t() {
        assert_eq!(date_part("2025-01-01T00:00:00Z"), "2025-01-01");
        assert_eq!(date_part("2025-01-01"), "2025-01-01");
        assert_eq!(date_part("01/02/2025 10:00"), "01/02/2025 10:00");
    }
}
