//! Room name generation.

use regex::Regex;
use std::sync::LazyLock;

/// Prefix of auto-generated standard rooms.
pub const STANDARD_PREFIX: &str = "RM-";

/// Prefix of auto-generated two-sharing rooms.
pub const TWO_SHARING_PREFIX: &str = "2SH-";

/// `<prefix><digits><non-digit suffix>`, with the shortest possible prefix.
#[allow(clippy::expect_used)]
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)(\d+)(\D*)$").expect("room number pattern is valid"));

/// Highest number used by rooms named `<prefix><number>...`.
///
/// Leading digits after the prefix are read; anything else is ignored.
pub fn highest_number<'a>(existing: impl IntoIterator<Item = &'a str>, prefix: &str) -> u64 {
    existing
        .into_iter()
        .filter_map(|name| name.strip_prefix(prefix))
        .filter_map(|rest| {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u64>().ok()
        })
        .max()
        .unwrap_or(0)
}

/// `count` fresh names continuing after the highest existing number.
///
/// Numbers are zero-padded to two digits (`RM-01`, ..., `RM-99`, `RM-100`).
pub fn next_sequential<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    prefix: &str,
    count: usize,
) -> Vec<String> {
    let start = highest_number(existing, prefix);
    (1..=count as u64)
        .map(|offset| format!("{prefix}{:02}", start + offset))
        .collect()
}

/// `count` names derived from an admin-supplied base name.
///
/// One room keeps `base` exactly. For more rooms, a trailing number in
/// `base` is incremented with its zero padding preserved (`A-07`, `A-08`);
/// a base without digits is used as is for the first room and suffixed
/// `-2`, `-3`, ... after that.
#[must_use]
pub fn from_base(base: &str, count: usize) -> Vec<String> {
    if count <= 1 {
        return vec![base.to_string(); count];
    }

    if let Some(caps) = NUMBERED.captures(base) {
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        let digits = caps.get(2).map_or("", |m| m.as_str());
        let suffix = caps.get(3).map_or("", |m| m.as_str());
        if let Ok(start) = digits.parse::<u64>() {
            let width = digits.len();
            return (0..count as u64)
                .map(|offset| format!("{prefix}{:0width$}{suffix}", start + offset))
                .collect();
        }
    }

    std::iter::once(base.to_string())
        .chain((2..=count).map(|n| format!("{base}-{n}")))
        .collect()
}
