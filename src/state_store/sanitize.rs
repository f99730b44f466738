//! Profile-name sanitizer (spec.md §6): lowercase, replace anything outside
//! `[a-z0-9_-]` with `-`, collapse runs, trim; empty result becomes
//! `"untitled"`. Hand-rolled rather than pulled from a filesystem-sanitizing
//! crate: the allowed grammar here is narrower and fixed (no dots, no
//! preserved case, no platform-specific reserved-name handling), so a
//! general-purpose filename sanitizer would do both less and more than
//! needed.

#[must_use]
pub fn sanitize_profile_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut last_was_dash = false;
    for c in lower.chars() {
        let normalized = if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' };
        if normalized == '-' {
            if !last_was_dash {
                out.push('-');
            }
            last_was_dash = true;
        } else {
            out.push(normalized);
            last_was_dash = false;
        }
    }
    let trimmed = out.trim_matches('-').to_string();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_profile_name;

    #[test]
    fn lowercases_and_replaces_separators() {
        assert_eq!(sanitize_profile_name("My Demo Profile!"), "my-demo-profile");
    }

    #[test]
    fn collapses_runs_and_trims() {
        assert_eq!(sanitize_profile_name("  --foo...bar--  "), "foo-bar");
    }

    #[test]
    fn empty_becomes_untitled() {
        assert_eq!(sanitize_profile_name(""), "untitled");
        assert_eq!(sanitize_profile_name("###"), "untitled");
    }

    #[test]
    fn preserves_already_clean_names() {
        assert_eq!(sanitize_profile_name("demo_123-x"), "demo_123-x");
    }
}
