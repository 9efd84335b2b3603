use std::sync::LazyLock;

use regex::Regex;

static RE_STATUS_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"status/(\d+)").expect("status id pattern is valid"));

/// Pull the numeric post id out of a post URL such as
/// `https://x.com/someone/status/1790000000000000000`.
pub fn extract_post_id(url: &str) -> Option<&str> {
    RE_STATUS_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
