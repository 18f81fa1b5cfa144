//! Episode and quality extraction.
//!
//! Each cascade is a list of independent matchers evaluated in order; the
//! first one that matches wins. New patterns are added to the lists, not to
//! control flow.

use lazy_regex::{regex, Regex};

/// One pattern plus the capture group holding the value
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    pub regex: &'static Regex,
    pub group: usize,
}

impl Matcher {
    fn capture<'a>(&self, haystack: &'a str) -> Option<&'a str> {
        self.regex
            .captures(haystack)
            .and_then(|c| c.get(self.group))
            .map(|m| m.as_str())
    }
}

/// A quality pattern and the token it yields (`None` = use the matched text)
#[derive(Debug, Clone, Copy)]
pub struct QualityMatcher {
    pub matcher: Matcher,
    pub token: Option<&'static str>,
}

/// Episode markers for rename templates, most specific first
pub fn episode_patterns() -> [Matcher; 6] {
    [
        // S01E05, S01EP05
        Matcher {
            regex: regex!(r"S(\d+)(?:E|EP)(\d+)"),
            group: 2,
        },
        // S01 E05, S01 - EP05
        Matcher {
            regex: regex!(r"S(\d+)\s*(?:E|EP|-\s*EP)(\d+)"),
            group: 2,
        },
        // [E05], (EP 5), E05
        Matcher {
            regex: regex!(r"(?:[(\[<{]?\s*(?:E|EP)\s*(\d+)\s*[)\]>}]?)"),
            group: 1,
        },
        // Title - 05
        Matcher {
            regex: regex!(r"(?:\s*-\s*(\d+)\s*)"),
            group: 1,
        },
        // s1 ... 5
        Matcher {
            regex: regex!(r"(?i)S(\d+)[^\d]*(\d+)"),
            group: 2,
        },
        // any digits
        Matcher {
            regex: regex!(r"(\d+)"),
            group: 1,
        },
    ]
}

/// Quality tokens for rename templates
pub fn quality_patterns() -> [QualityMatcher; 6] {
    [
        QualityMatcher {
            matcher: Matcher {
                regex: regex!(r"(?i)\b(\d{3,4}p)\b"),
                group: 1,
            },
            token: None,
        },
        QualityMatcher {
            matcher: Matcher {
                regex: regex!(r"(?i)4kX264"),
                group: 0,
            },
            token: Some("4kX264"),
        },
        QualityMatcher {
            matcher: Matcher {
                regex: regex!(r"(?i)4kx265"),
                group: 0,
            },
            token: Some("4kx265"),
        },
        QualityMatcher {
            matcher: Matcher {
                regex: regex!(r"(?i)[(\[<{]?\s*\b4k\b\s*[)\]>}]?"),
                group: 0,
            },
            token: Some("4k"),
        },
        QualityMatcher {
            matcher: Matcher {
                regex: regex!(r"(?i)[(\[<{]?\s*\b2k\b\s*[)\]>}]?"),
                group: 0,
            },
            token: Some("2k"),
        },
        QualityMatcher {
            matcher: Matcher {
                regex: regex!(r"(?i)\bHdRip\b"),
                group: 0,
            },
            token: Some("HdRip"),
        },
    ]
}

/// Episode markers for the special-content series profile
pub fn series_episode_patterns() -> [Matcher; 4] {
    [
        Matcher {
            regex: regex!(r"(?i)(?:E|EP|Episode)\s*(\d+)"),
            group: 1,
        },
        Matcher {
            regex: regex!(r"(?i)S\d+E(\d+)"),
            group: 1,
        },
        Matcher {
            regex: regex!(r"\s+(\d+)\s+"),
            group: 1,
        },
        Matcher {
            regex: regex!(r"-\s*(\d+)"),
            group: 1,
        },
    ]
}

/// Episode marker in an auto-trim output name
pub fn autotrim_episode_pattern() -> Matcher {
    Matcher {
        regex: regex!(r"(?i)(?:Episode|Ep|E)\s*(\d+)"),
        group: 1,
    }
}

/// Runs a cascade, returning the first captured value
pub fn first_match<'a>(patterns: &[Matcher], haystack: &'a str) -> Option<&'a str> {
    patterns.iter().find_map(|m| m.capture(haystack))
}

fn parse_number(digits: &str) -> Option<u32> {
    digits.parse().ok()
}

/// Episode number from a rename source filename
pub fn extract_episode(filename: &str) -> Option<u32> {
    first_match(&episode_patterns(), filename).and_then(parse_number)
}

/// Quality token from a filename, `Unknown` when nothing matches
pub fn extract_quality(filename: &str) -> String {
    quality_patterns()
        .iter()
        .find_map(|q| {
            q.matcher
                .capture(filename)
                .map(|text| q.token.map(str::to_string).unwrap_or_else(|| text.to_string()))
        })
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Episode for the series profile as a zero-padded string, `01` when absent
pub fn extract_series_episode(filename: &str) -> String {
    first_match(&series_episode_patterns(), filename)
        .and_then(parse_number)
        .map(|n| format!("{:02}", n))
        .unwrap_or_else(|| "01".to_string())
}

/// Episode for an auto-trim output name, `1` when absent
pub fn extract_autotrim_episode(filename: &str) -> u32 {
    autotrim_episode_pattern()
        .capture(filename)
        .and_then(parse_number)
        .unwrap_or(1)
}

/// `[NNNp]` tag of a series upload
pub fn bracketed_quality(filename: &str) -> Option<&str> {
    regex!(r"\[(\d+p)\]")
        .captures(filename)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_episode_cascade_order() {
        assert_eq!(extract_episode("Naruto S01E05 1080p.mkv"), Some(5));
        assert_eq!(extract_episode("Show S02 EP12.mkv"), Some(12));
        assert_eq!(extract_episode("Show [E07].mkv"), Some(7));
        assert_eq!(extract_episode("Show - 09.mkv"), Some(9));
        assert_eq!(extract_episode("Movie.mkv"), None);
    }

    #[test]
    fn test_generic_digits_are_last_resort() {
        assert_eq!(extract_episode("Clip 42.mp4"), Some(42));
    }

    #[test]
    fn test_quality_tokens() {
        assert_eq!(extract_quality("Naruto S01E05 1080p.mkv"), "1080p");
        assert_eq!(extract_quality("Movie.720P.mkv"), "720P");
        assert_eq!(extract_quality("Movie 4kX264.mkv"), "4kX264");
        assert_eq!(extract_quality("Movie [4K].mkv"), "4k");
        assert_eq!(extract_quality("Movie.HdRip.mkv"), "HdRip");
        assert_eq!(extract_quality("Movie.mkv"), "Unknown");
    }

    #[test]
    fn test_series_episode_defaults_to_01() {
        assert_eq!(extract_series_episode("Jai Bajarangabali Episode 7 [720p].mp4"), "07");
        assert_eq!(extract_series_episode("Jai Bajarangabali S01E112.mp4"), "112");
        assert_eq!(extract_series_episode("Jai Bajarangabali.mp4"), "01");
    }

    #[test]
    fn test_autotrim_episode() {
        assert_eq!(extract_autotrim_episode("Show Ep 23.mp4"), 23);
        assert_eq!(extract_autotrim_episode("Show.mp4"), 1);
    }

    #[test]
    fn test_bracketed_quality() {
        assert_eq!(bracketed_quality("Jai Bajarangabali 12 [1080p].mkv"), Some("1080p"));
        assert_eq!(bracketed_quality("Jai Bajarangabali 12.mkv"), None);
    }
}
