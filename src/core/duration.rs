//! Compact ISO-8601 duration tokens (`PT1H2M3S`) to whole seconds

use regex::Regex;
use std::sync::OnceLock;

static DURATION_PATTERN: OnceLock<Regex> = OnceLock::new();

fn pattern() -> &'static Regex {
    DURATION_PATTERN.get_or_init(|| {
        Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").expect("duration pattern is valid")
    })
}

/// Total seconds of a `PT[<h>H][<m>M][<s>S]` token.
///
/// Anything that does not start with `PT` yields 0. Duration is only used to
/// exclude short-form videos, so a bad token must never fail the caller.
pub fn parse_duration(token: &str) -> u64 {
    let Some(caps) = pattern().captures(token.trim()) else {
        return 0;
    };

    let component = |index: usize| -> u64 {
        caps.get(index)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    component(1)
        .saturating_mul(3600)
        .saturating_add(component(2).saturating_mul(60))
        .saturating_add(component(3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_token() {
        assert_eq!(parse_duration("PT1H2M3S"), 3723);
    }

    #[test]
    fn test_partial_tokens() {
        assert_eq!(parse_duration("PT45S"), 45);
        assert_eq!(parse_duration("PT0S"), 0);
        assert_eq!(parse_duration("PT3M"), 180);
        assert_eq!(parse_duration("PT2H"), 7200);
        assert_eq!(parse_duration("PT1H30S"), 3630);
    }

    #[test]
    fn test_malformed_tokens_are_zero() {
        assert_eq!(parse_duration(""), 0);
        assert_eq!(parse_duration("garbage"), 0);
        assert_eq!(parse_duration("1H2M"), 0);
        assert_eq!(parse_duration("P1D"), 0);
    }

    #[test]
    fn test_huge_component_does_not_panic() {
        assert_eq!(parse_duration("PT99999999999999999999999H"), 0);
        assert_eq!(parse_duration(&format!("PT{}H", u64::MAX)), u64::MAX);
    }
}
