//! Source vocabulary to canonical bucket mapping.
//!
//! Unrecognised inputs fall back to safe defaults instead of failing, so a
//! malformed record still produces a storable draft.

use crate::{Difficulty, Topic};

pub const EASY_RATING_CEILING: u32 = 1200;
pub const MEDIUM_RATING_CEILING: u32 = 1600;

const DIFFICULTY_LABELS: &[(&str, Difficulty)] = &[
    ("easy", Difficulty::Easy),
    ("medium", Difficulty::Medium),
    ("hard", Difficulty::Hard),
    ("basic", Difficulty::Easy),
];

const TOPIC_TAGS: &[(&str, Topic)] = &[
    ("array", Topic::Arrays),
    ("string", Topic::Strings),
    ("tree", Topic::Trees),
    ("graph", Topic::Graphs),
    ("dynamic programming", Topic::Dp),
    ("dp", Topic::Dp),
    ("greedy", Topic::Greedy),
    ("sorting", Topic::Sorting),
    ("searching", Topic::Searching),
    ("math", Topic::Math),
];

/// Categorical label (e.g. `"Easy"`, `"Basic"`); unknown labels are medium.
pub fn difficulty_from_label(label: &str) -> Difficulty {
    let label = label.trim().to_lowercase();
    DIFFICULTY_LABELS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, difficulty)| *difficulty)
        .unwrap_or(Difficulty::Medium)
}

/// Numeric rating buckets: `< 1200` easy, `< 1600` medium, otherwise hard.
pub fn difficulty_from_rating(rating: Option<u32>) -> Difficulty {
    match rating {
        None => Difficulty::Medium,
        Some(r) if r < EASY_RATING_CEILING => Difficulty::Easy,
        Some(r) if r < MEDIUM_RATING_CEILING => Difficulty::Medium,
        Some(_) => Difficulty::Hard,
    }
}

/// Only the first tag decides the topic.
pub fn topic_from_tags<S: AsRef<str>>(tags: &[S]) -> Topic {
    let Some(first) = tags.first() else {
        return Topic::Other;
    };
    let tag = first.as_ref().trim().to_lowercase();
    TOPIC_TAGS
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, topic)| *topic)
        .unwrap_or(Topic::Other)
}
