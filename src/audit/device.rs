//! Human readable device names from user agent strings.

use regex::Regex;
use std::sync::LazyLock;

const UNKNOWN_DEVICE: &str = "Unknown device";

// Order matters: Edge and Opera also advertise Chrome, Chrome also advertises Safari.
static BROWSERS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    compile(&[
        (r"Edg(e|A|iOS)?/", "Edge"),
        (r"OPR/|Opera", "Opera"),
        (r"Firefox/|FxiOS/", "Firefox"),
        (r"Chrome/|CriOS/", "Chrome"),
        (r"Version/[\d.]+.*Safari/", "Safari"),
    ])
});

static PLATFORMS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    compile(&[
        (r"iPhone|iPad|iPod", "iOS"),
        (r"Android", "Android"),
        (r"Windows NT", "Windows"),
        (r"Mac OS X|Macintosh", "macOS"),
        (r"CrOS", "ChromeOS"),
        (r"Linux", "Linux"),
    ])
});

fn compile(patterns: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    patterns
        .iter()
        .filter_map(|(pattern, name)| Regex::new(pattern).ok().map(|re| (re, *name)))
        .collect()
}

fn first_match(table: &[(Regex, &'static str)], user_agent: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(re, _)| re.is_match(user_agent))
        .map(|(_, name)| *name)
}

/// "<Browser> on <OS>", or "Unknown device" when neither can be recognized.
#[must_use]
pub fn describe(user_agent: &str) -> String {
    match (
        first_match(&BROWSERS, user_agent),
        first_match(&PLATFORMS, user_agent),
    ) {
        (Some(browser), Some(os)) => format!("{browser} on {os}"),
        (Some(browser), None) => browser.to_string(),
        (None, Some(os)) => os.to_string(),
        (None, None) => UNKNOWN_DEVICE.to_string(),
    }
}
