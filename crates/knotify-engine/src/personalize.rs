//! Token substitution for message bodies.
//!
//! Intentionally minimal: `{name}` and `{first_name}`, case-insensitive,
//! nothing else. No loops, no conditionals.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\{name\}").unwrap());
static FIRST_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{first_name\}").unwrap());

/// Render a template for one guest. An absent or blank name falls back to
/// "there"; `{first_name}` is the first whitespace-delimited token of the
/// resolved name.
pub fn render(template: &str, guest_name: &str) -> String {
    let name = match guest_name.trim() {
        "" => "there",
        n => n,
    };
    let first_name = name.split_whitespace().next().unwrap_or("there");

    let pass = FIRST_NAME_RE.replace_all(template, NoExpand(first_name));
    NAME_RE.replace_all(&pass, NoExpand(name)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_token() {
        assert_eq!(render("Hi {name}!", "Mai Anh"), "Hi Mai Anh!");
    }

    #[test]
    fn test_first_name_token() {
        assert_eq!(render("Hi {first_name}!", "Mai Anh"), "Hi Mai!");
    }

    #[test]
    fn test_case_insensitive_tokens() {
        assert_eq!(render("{Name} / {FIRST_NAME}", "Mai Anh"), "Mai Anh / Mai");
    }

    #[test]
    fn test_blank_name_falls_back() {
        assert_eq!(render("Hi {name}, {first_name}!", "  "), "Hi there, there!");
    }

    #[test]
    fn test_no_tokens_passes_through() {
        assert_eq!(render("See you at 4pm", "Mai"), "See you at 4pm");
    }

    #[test]
    fn test_dollar_signs_in_name_are_literal() {
        assert_eq!(render("Hi {name}", "$broke$"), "Hi $broke$");
    }

    #[test]
    fn test_repeated_tokens() {
        assert_eq!(render("{name} {name}", "Mai"), "Mai Mai");
    }
}
