//! Content-aware framework selection.
//!
//! Each persona framework declares keyword triggers. The input text is
//! scanned for every trigger; the two frameworks with the highest trigger
//! counts are selected, ties broken by persona declaration order. When
//! nothing fires, the `tiny_habits` default applies.

use crate::config::{Framework, PersonaConfig};

/// Maximum frameworks injected into one prompt.
pub const MAX_SELECTED: usize = 2;

/// Counts occurrences of `needle` in `haystack` at word boundaries.
///
/// Both sides are compared lowercased; accents are significant because the
/// triggers are written in the content language.
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let boundary_before = begin == 0
            || haystack[..begin]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric());
        let boundary_after = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if boundary_before && boundary_after {
            count += 1;
        }
        start = end;
    }
    count
}

/// Total trigger hits for one framework in `text` (already lowercased).
fn trigger_count(framework: &Framework, text: &str) -> usize {
    framework
        .triggers
        .iter()
        .map(|trigger| count_occurrences(text, &trigger.to_lowercase()))
        .sum()
}

/// Selects up to [`MAX_SELECTED`] frameworks for the given input text.
///
/// Returns the persona default when no trigger fires.
#[must_use]
pub fn select_frameworks<'a>(persona: &'a PersonaConfig, text: &str) -> Vec<&'a Framework> {
    let lowered = text.to_lowercase();

    let mut scored: Vec<(usize, usize, &Framework)> = persona
        .frameworks
        .iter()
        .enumerate()
        .map(|(index, framework)| (trigger_count(framework, &lowered), index, framework))
        .filter(|(count, _, _)| *count > 0)
        .collect();

    if scored.is_empty() {
        return vec![persona.default_framework()];
    }

    // Highest count first; declaration order breaks ties.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored
        .into_iter()
        .take(MAX_SELECTED)
        .map(|(_, _, framework)| framework)
        .collect()
}
