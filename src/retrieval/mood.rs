//! Mood inference from the raw query text.
//!
//! A [`MoodTable`] is an ordered list of rules (mood → trigger terms → tone text).
//! Matching is case-insensitive and token based: a trigger, which may span several
//! words, matches when its tokens occur contiguously in the query. A trigger token
//! of at least [`MIN_STEM_CHARS`] characters also matches inflected forms that
//! start with it or with its stem (a trailing `e` removed), so "relax" matches
//! "relaxation" and "explore" matches "exploring". Shorter triggers such as "spa"
//! or "kid" match whole tokens only. The first matching rule in table order wins;
//! if none match, the table's neutral label is returned.

use serde::{Deserialize, Serialize};

/// Shortest trigger token or stem that may match as a word prefix.
pub const MIN_STEM_CHARS: usize = 4;

/// Tone categories used to condition generation style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Romantic,
    Adventure,
    FamilyFriendly,
    Relaxed,
    Cultural,
    Neutral,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Romantic => "romantic",
            Self::Adventure => "adventure",
            Self::FamilyFriendly => "family_friendly",
            Self::Relaxed => "relaxed",
            Self::Cultural => "cultural",
            Self::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The inferred tone for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodLabel {
    pub mood: Mood,
    /// Experience phrase, e.g. `"romantic and intimate"`.
    pub description: String,
    /// Tone instruction, e.g. `"gentle, poetic, and emotionally appealing"`.
    pub tone: String,
}

impl MoodLabel {
    pub fn neutral() -> Self {
        Self {
            mood: Mood::Neutral,
            description: "balanced and general-purpose".into(),
            tone: "clear, helpful, and informative".into(),
        }
    }
}

/// One row of the mood table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodRule {
    pub mood: Mood,
    pub triggers: Vec<String>,
    pub description: String,
    pub tone: String,
}

impl MoodRule {
    fn new(mood: Mood, triggers: &[&str], description: &str, tone: &str) -> Self {
        Self {
            mood,
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            description: description.into(),
            tone: tone.into(),
        }
    }

    fn label(&self) -> MoodLabel {
        MoodLabel {
            mood: self.mood,
            description: self.description.clone(),
            tone: self.tone.clone(),
        }
    }
}

/// Ordered mood rules. Earlier rules take priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodTable {
    pub rules: Vec<MoodRule>,
    /// Returned when no rule matches.
    pub fallback: MoodLabel,
}

impl Default for MoodTable {
    fn default() -> Self {
        Self {
            rules: vec![
                MoodRule::new(
                    Mood::Romantic,
                    &["romantic", "romance", "couple", "couples", "honeymoon", "love", "anniversary"],
                    "romantic and intimate",
                    "gentle, poetic, and emotionally appealing",
                ),
                MoodRule::new(
                    Mood::Adventure,
                    &["adventure", "adventurous", "thrill", "hike", "hiking", "trek", "explore"],
                    "adventurous and energetic",
                    "exciting, bold, and full of action",
                ),
                MoodRule::new(
                    Mood::FamilyFriendly,
                    &["family", "families", "kid", "kids", "children", "child", "toddler"],
                    "family-friendly and joyful",
                    "warm, inclusive, and comforting",
                ),
                MoodRule::new(
                    Mood::Relaxed,
                    &["relax", "peaceful", "calm", "spa", "spas", "wellness", "slow travel"],
                    "relaxing and rejuvenating",
                    "soothing, tranquil, and wellness-focused",
                ),
                MoodRule::new(
                    Mood::Cultural,
                    &["cultural", "culture", "heritage", "history", "historical"],
                    "cultural and educational",
                    "insightful, respectful, and enriching",
                ),
            ],
            fallback: MoodLabel::neutral(),
        }
    }
}

/// Infers a [`MoodLabel`] from query text using a fixed [`MoodTable`].
#[derive(Debug, Clone)]
pub struct MoodClassifier {
    rules: Vec<(Vec<Vec<String>>, MoodLabel)>,
    fallback: MoodLabel,
}

impl MoodClassifier {
    pub fn new(table: &MoodTable) -> Self {
        let rules = table
            .rules
            .iter()
            .map(|rule| {
                let triggers = rule
                    .triggers
                    .iter()
                    .map(|t| tokenize(t))
                    .filter(|tokens| !tokens.is_empty())
                    .collect();
                (triggers, rule.label())
            })
            .collect();
        Self {
            rules,
            fallback: table.fallback.clone(),
        }
    }

    /// Classify a query. Pure: the same text always yields the same label.
    pub fn classify(&self, query: &str) -> MoodLabel {
        let tokens = tokenize(query);
        self.rules
            .iter()
            .find(|(triggers, _)| triggers.iter().any(|t| contains_run(&tokens, t)))
            .map(|(_, label)| label.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for MoodClassifier {
    fn default() -> Self {
        Self::new(&MoodTable::default())
    }
}

/// Lowercased alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `needle` occurs as a contiguous run inside `haystack`.
fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    haystack
        .windows(needle.len())
        .any(|w| w.iter().zip(needle).all(|(token, trigger)| token_matches(token, trigger)))
}

/// Exact match, or an inflected form of a trigger long enough to act as a stem.
fn token_matches(token: &str, trigger: &str) -> bool {
    if token == trigger {
        return true;
    }
    let stem = trigger.strip_suffix('e').unwrap_or(trigger);
    [trigger, stem]
        .iter()
        .any(|t| t.chars().count() >= MIN_STEM_CHARS && token.starts_with(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_romantic_weekend() {
        let label = MoodClassifier::default().classify("I want a romantic weekend");
        assert_eq!(label.mood, Mood::Romantic);
        assert_eq!(label.tone, "gentle, poetic, and emotionally appealing");
    }

    #[test]
    fn test_no_triggers_is_neutral() {
        let label = MoodClassifier::default().classify("What is there to see in Hanoi?");
        assert_eq!(label, MoodLabel::neutral());
        assert_eq!(label.tone, "clear, helpful, and informative");
    }

    #[test]
    fn test_priority_order_resolves_multi_theme() {
        let classifier = MoodClassifier::default();
        assert_eq!(classifier.classify("romantic adventure in Sapa").mood, Mood::Romantic);
        assert_eq!(classifier.classify("adventure trip for the kids").mood, Mood::Adventure);
        assert_eq!(classifier.classify("calm heritage walk").mood, Mood::Relaxed);
    }

    #[test]
    fn test_table_order_is_the_priority() {
        let mut table = MoodTable::default();
        table.rules.reverse();
        let classifier = MoodClassifier::new(&table);
        assert_eq!(classifier.classify("romantic adventure").mood, Mood::Adventure);
    }

    #[test]
    fn test_case_insensitive_and_punctuation() {
        let classifier = MoodClassifier::default();
        assert_eq!(classifier.classify("HONEYMOON!!").mood, Mood::Romantic);
        assert_eq!(classifier.classify("kids-friendly ideas?").mood, Mood::FamilyFriendly);
    }

    #[test]
    fn test_no_substring_false_positives() {
        let classifier = MoodClassifier::default();
        // "spa" must not match inside "Spain", "love" not inside "glove"
        assert_eq!(classifier.classify("flights to Spain").mood, Mood::Neutral);
        assert_eq!(classifier.classify("buy a glove").mood, Mood::Neutral);
    }

    #[test]
    fn test_inflected_forms_match() {
        let classifier = MoodClassifier::default();
        assert_eq!(classifier.classify("I need some relaxation").mood, Mood::Relaxed);
        assert_eq!(classifier.classify("exploring the mountains").mood, Mood::Adventure);
        assert_eq!(classifier.classify("thrilling things to do").mood, Mood::Adventure);
        assert_eq!(classifier.classify("hikes near Sapa").mood, Mood::Adventure);
        assert_eq!(classifier.classify("a trip with my kid").mood, Mood::FamilyFriendly);
        assert_eq!(classifier.classify("places we loved").mood, Mood::Romantic);
        assert_eq!(classifier.classify("trekking in Ha Giang").mood, Mood::Adventure);
    }

    #[test]
    fn test_short_triggers_need_whole_tokens() {
        assert!(token_matches("spa", "spa"));
        assert!(!token_matches("spain", "spa"));
        assert!(!token_matches("kidney", "kid"));
        assert!(token_matches("exploration", "explore"));
        assert!(!token_matches("glove", "love"));
    }

    #[test]
    fn test_multi_word_trigger() {
        let classifier = MoodClassifier::default();
        assert_eq!(classifier.classify("some slow travel in Hue").mood, Mood::Relaxed);
        assert_eq!(classifier.classify("travel slow").mood, Mood::Neutral);
    }

    #[test]
    fn test_classify_is_pure() {
        let classifier = MoodClassifier::default();
        let query = "A peaceful family holiday";
        let first = classifier.classify(query);
        for _ in 0..10 {
            assert_eq!(classifier.classify(query), first);
        }
        assert_eq!(first.mood, Mood::FamilyFriendly);
    }

    #[test]
    fn test_table_from_toml() {
        let table: MoodTable = toml::from_str(
            r#"
[[rules]]
mood = "cultural"
triggers = ["pagoda"]
description = "cultural and educational"
tone = "insightful"
"#,
        )
        .unwrap();
        let classifier = MoodClassifier::new(&table);
        assert_eq!(classifier.classify("Visit a pagoda").mood, Mood::Cultural);
        // Default fallback still applies
        assert_eq!(classifier.classify("romantic").mood, Mood::Neutral);
    }
}
