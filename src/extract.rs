//! Power extractor: pulls the instantaneous watt value out of a device's
//! raw status page.
//!
//! The inverter embeds its current output as a JS variable in the page,
//! e.g. `var webdata_now_p = "2500";`.

use regex::Regex;
use std::sync::OnceLock;

/// Valid range for a single device reading, in watts.
pub const MAX_DEVICE_WATTS: i64 = 1_000_000;

fn power_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Value may or may not be quoted depending on firmware version.
        Regex::new(r#"webdata_now_p\s*=\s*"?(\d+)"?"#).expect("invalid power pattern")
    })
}

/// Extract the power value from a status page body.
///
/// Takes the first match of the `webdata_now_p` variable; returns `None`
/// when the token is absent, unparsable, or outside [0, 1,000,000] W.
pub fn extract_power(body: &str) -> Option<i64> {
    let captures = power_pattern().captures(body)?;
    let value: i64 = captures.get(1)?.as_str().parse().ok()?;
    if !(0..=MAX_DEVICE_WATTS).contains(&value) {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_quoted() {
        assert_eq!(extract_power(r#"var webdata_now_p = "2500";"#), Some(2500));
    }

    #[test]
    fn test_extract_unquoted() {
        assert_eq!(extract_power("webdata_now_p=2500"), Some(2500));
    }

    #[test]
    fn test_extract_zero_is_valid() {
        assert_eq!(extract_power(r#"var webdata_now_p = "0";"#), Some(0));
    }

    #[test]
    fn test_extract_first_match_wins() {
        let body = r#"var webdata_now_p = "100"; var webdata_now_p = "200";"#;
        assert_eq!(extract_power(body), Some(100));
    }

    #[test]
    fn test_extract_missing_token() {
        assert_eq!(extract_power("<html>no power here</html>"), None);
    }

    #[test]
    fn test_extract_out_of_range() {
        assert_eq!(extract_power(r#"webdata_now_p = "2000001""#), None);
    }

    #[test]
    fn test_extract_within_larger_page() {
        let body = concat!(
            "<html><head><script>\n",
            "var webdata_sn = \"XYZ123\";\n",
            "var webdata_now_p = \"3142\";\n",
            "var webdata_today_e = \"12.5\";\n",
            "</script></head></html>"
        );
        assert_eq!(extract_power(body), Some(3142));
    }
}
