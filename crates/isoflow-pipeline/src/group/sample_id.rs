use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Repeat-measurement ordering taken from an `R<major>[.<minor>]` token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunNumber {
    pub major: u64,
    pub minor: u64,
}

impl RunNumber {
    /// Identifiers without a run token sort after every numbered run.
    pub const UNNUMBERED: RunNumber = RunNumber {
        major: 9999,
        minor: 0,
    };

    /// First `r<digits>[.<digits>]` occurrence anywhere in the identifier (case-insensitive).
    pub fn parse(identifier: &str) -> RunNumber {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"(?i)r(\d+)(?:\.(\d+))?").expect("valid regex"));

        let Some(caps) = re.captures(identifier) else {
            return RunNumber::UNNUMBERED;
        };
        let major = saturating_digits(&caps[1]);
        let minor = caps.get(2).map_or(0, |m| saturating_digits(m.as_str()));
        RunNumber { major, minor }
    }
}

/// The captures are all digits, so parsing only fails on overflow; such runs clamp to the
/// largest number and still sort after every smaller one.
fn saturating_digits(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

/// A sample identifier split into its base name and run number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleId {
    pub base: String,
    pub run: RunNumber,
}

impl SampleId {
    pub fn parse(identifier: &str) -> SampleId {
        static SUFFIX: OnceLock<Regex> = OnceLock::new();
        let suffix =
            SUFFIX.get_or_init(|| Regex::new(r"(?i)\s*r\d+(\.\d+)?$").expect("valid regex"));

        let trimmed = identifier.trim();
        SampleId {
            base: suffix.replace(trimmed, "").trim().to_string(),
            run: RunNumber::parse(identifier),
        }
    }
}

/// Grouping key: compatibility-decomposed, ASCII alphanumerics only, lowercase.
pub fn group_key(base: &str) -> String {
    base.nfkd()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase()
}

/// Identifiers such as `N Arag`, `N.Arag` or `n.arag 3` mark aragonite samples.
pub fn is_aragonite(identifier: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bn\.?\s*arag\b").expect("valid regex"))
        .is_match(identifier)
}
