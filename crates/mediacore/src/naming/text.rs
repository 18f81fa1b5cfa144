//! String steps of the naming pipeline

use lazy_regex::regex;

/// Collapses whitespace runs to one space and trims the ends
pub fn collapse_whitespace(text: &str) -> String {
    regex!(r"\s+").replace_all(text, " ").trim().to_string()
}

/// Literal, case-sensitive deletion of every word in list order
pub fn remove_words(text: &str, words: &[String]) -> String {
    let mut out = text.to_string();
    for word in words.iter().filter(|w| !w.is_empty()) {
        out = out.replace(word.as_str(), "");
    }
    out
}

/// Literal, case-sensitive substitution of every pair in order
pub fn replace_words(text: &str, pairs: &[(String, String)]) -> String {
    let mut out = text.to_string();
    for (old, new) in pairs.iter().filter(|(old, _)| !old.is_empty()) {
        out = out.replace(old.as_str(), new);
    }
    out
}

/// `_` and `.` become spaces, then whitespace is collapsed
pub fn normalize_separators(text: &str) -> String {
    collapse_whitespace(&text.replace(['_', '.'], " "))
}

/// Strips characters illegal in filenames, collapses whitespace and trims
/// leading/trailing dots and spaces
pub fn sanitize_filename(name: &str) -> String {
    let stripped = regex!(r#"[<>:"/\\|?*]"#).replace_all(name, "");
    let collapsed = regex!(r"\s+").replace_all(&stripped, " ");
    collapsed.trim_matches(|c| c == '.' || c == ' ').to_string()
}
