//! TikTok link detection.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Full video links, `vm.` short links and `/t/` share links, in priority order
    static ref TIKTOK_PATTERNS: Vec<Regex> = [
        r"https?://(?:www\.)?tiktok\.com/@[\w.-]+/video/\d+",
        r"https?://vm\.tiktok\.com/\w+",
        r"https?://(?:www\.)?tiktok\.com/t/\w+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("TikTok pattern should be valid"))
    .collect();
}

/// First TikTok link found in `text`
pub fn extract_tiktok_url(text: &str) -> Option<&str> {
    TIKTOK_PATTERNS
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_supported_links() {
        assert!(extract_tiktok_url(
            "https://www.tiktok.com/@some.user-1/video/7234567890123456789"
        )
        .is_some());
        assert!(extract_tiktok_url("look https://vm.tiktok.com/ZMabc123/ lol").is_some());
        assert!(extract_tiktok_url("http://tiktok.com/t/ZT8abc/").is_some());
        assert!(extract_tiktok_url("https://www.youtube.com/watch?v=abc").is_none());
        assert!(extract_tiktok_url("tiktok.com/@user/video/1").is_none());
    }

    #[test]
    fn test_extracts_link_from_text() {
        assert_eq!(
            extract_tiktok_url("смотри https://www.tiktok.com/@user/video/123?lang=ru !"),
            Some("https://www.tiktok.com/@user/video/123")
        );
        assert_eq!(
            extract_tiktok_url("https://vm.tiktok.com/ZMabc123/"),
            Some("https://vm.tiktok.com/ZMabc123")
        );
        assert_eq!(extract_tiktok_url("nothing here"), None);
    }
}
