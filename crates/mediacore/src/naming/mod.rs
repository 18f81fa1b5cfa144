//! Naming transform engine.
//!
//! Computes an output filename from the raw filename, the optional caption and
//! the user's naming rules. Everything here is pure and deterministic; the only
//! non-pure outcome, asking the user for a name, is returned as
//! [`NamePlan::Ask`] and resolved by the rename job.
//!
//! Order of operations on the chosen basis:
//! 1. remove words, then replace words, then collapse whitespace
//! 2. prefix
//! 3. `_`/`.` to spaces
//! 4. suffix
//! 5. extension, sanitize
//!
//! A format template replaces step 1 entirely.

pub mod patterns;
pub mod text;

use crate::media::{has_media_extension, split_extension};

/// The subset of preferences that drives naming
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingRules {
    pub template: Option<String>,
    pub remove_words: Vec<String>,
    pub replace_words: Vec<(String, String)>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl NamingRules {
    /// True when any remove or replace rule is configured
    pub fn has_word_rules(&self) -> bool {
        !self.remove_words.is_empty() || !self.replace_words.is_empty()
    }

    fn active_template(&self) -> Option<&str> {
        self.template
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("none"))
    }
}

/// Result of the naming decision table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePlan {
    /// Final filename
    Ready(String),
    /// Nothing to derive a name from; the user must supply one
    Ask,
}

/// Runs the decision table for `raw_filename` and `caption`.
pub fn plan_filename(raw_filename: &str, caption: Option<&str>, rules: &NamingRules) -> NamePlan {
    let (_, extension) = split_extension(raw_filename);

    if let Some(template) = rules.active_template() {
        let rendered = render_template(template, raw_filename);
        return NamePlan::Ready(finish(&rendered, extension, rules, raw_filename));
    }

    if !rules.has_word_rules() {
        return NamePlan::Ask;
    }

    let basis = match caption.map(str::trim).filter(|c| !c.is_empty()) {
        Some(caption) if has_media_extension(caption) => split_extension(caption).0,
        _ => split_extension(raw_filename).0,
    };
    NamePlan::Ready(apply_rules_and_finish(basis, extension, rules, raw_filename))
}

/// Turns a user-supplied reply into the final filename.
///
/// A reply without a recognized media extension gets the original extension.
/// Word rules still apply to the reply.
pub fn name_from_reply(reply: &str, raw_filename: &str, rules: &NamingRules) -> String {
    let reply = reply.trim();
    let (stem, extension) = if has_media_extension(reply) {
        split_extension(reply)
    } else {
        (reply, split_extension(raw_filename).1)
    };
    apply_rules_and_finish(stem, extension, rules, raw_filename)
}

/// Original filename, sanitized. Used when a prompt times out.
pub fn fallback_name(raw_filename: &str) -> String {
    let sanitized = text::sanitize_filename(raw_filename);
    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

/// Substitutes `[episode]` (first occurrence, as `EP{n}`) and `[quality]`
/// (every occurrence). An unknown episode leaves the placeholder in place.
pub fn render_template(template: &str, raw_filename: &str) -> String {
    let mut rendered = template.to_string();
    if let Some(episode) = patterns::extract_episode(raw_filename) {
        rendered = rendered.replacen("[episode]", &format!("EP{}", episode), 1);
    }
    if rendered.contains("[quality]") {
        rendered = rendered.replace("[quality]", &patterns::extract_quality(raw_filename));
    }
    rendered
}

fn apply_rules_and_finish(stem: &str, extension: &str, rules: &NamingRules, raw_filename: &str) -> String {
    let removed = text::remove_words(stem, &rules.remove_words);
    let replaced = text::replace_words(&removed, &rules.replace_words);
    let basis = text::collapse_whitespace(&replaced);
    finish(&basis, extension, rules, raw_filename)
}

fn finish(basis: &str, extension: &str, rules: &NamingRules, raw_filename: &str) -> String {
    let mut name = basis.to_string();

    if let Some(prefix) = rules.prefix.as_deref().filter(|p| !p.trim().is_empty()) {
        name = format!("{} {}", prefix.trim(), name);
    }

    name = text::normalize_separators(&name);

    if let Some(suffix) = rules.suffix.as_deref().filter(|s| !s.trim().is_empty()) {
        name = format!("{} {}", name, suffix.trim());
    }

    if name.trim().is_empty() {
        // Every character was stripped; keep the source stem rather than ship ".mkv"
        name = text::normalize_separators(split_extension(raw_filename).0);
    }

    text::sanitize_filename(&format!("{}{}", name, extension))
}
