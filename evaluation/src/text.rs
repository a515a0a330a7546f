//! Text normalization shared by judges and the failure taxonomy.

/// Phrases that mark an answer as an abstention.
const ABSTENTION_MARKERS: [&str; 4] = [
    "unknown",
    "cannot be inferred",
    "cannot be answered",
    "not enough information",
];

/// Lowercased words, split on anything that is not alphanumeric or `_`.
pub fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whitespace-collapsed, lowercased text.
pub fn normalize(text: &str) -> String {
    tokens(text).join(" ")
}

/// Whether the answer declines to answer.
pub fn abstains(output: &str) -> bool {
    let normalized = normalize(output);
    ABSTENTION_MARKERS
        .iter()
        .any(|marker| contains_phrase(&normalized, marker))
}

/// Whether `normalized` contains `phrase` on word boundaries.
///
/// `normalized` must come from [`normalize`]; `phrase` is normalized here.
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    let phrase = normalize(phrase);
    if phrase.is_empty() {
        return false;
    }
    let padded = format!(" {normalized} ");
    padded.contains(&format!(" {phrase} "))
}
