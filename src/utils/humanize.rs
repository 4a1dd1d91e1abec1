//! Cosmetic reply shaping: occasional conversational fillers so synthesized
//! speech sounds less like a form letter. Pure function over an injected
//! RNG, so tests can pin the dice.

use rand::Rng;

/// Delivery register for shaped replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mood {
    #[default]
    Neutral,
    Warm,
    Upbeat,
}

const NEUTRAL_OPENERS: &[&str] = &["Right,", "So,", "Well,"];
const WARM_OPENERS: &[&str] = &["Ah, good question.", "Happy to help.", "Sure thing."];
const UPBEAT_OPENERS: &[&str] = &["Oh, nice one!", "Love that.", "Great question!"];

fn openers(mood: Mood) -> &'static [&'static str] {
    match mood {
        Mood::Neutral => NEUTRAL_OPENERS,
        Mood::Warm => WARM_OPENERS,
        Mood::Upbeat => UPBEAT_OPENERS,
    }
}

/// Prepend a mood-appropriate opener with probability `intensity` (clamped
/// to [0, 1]). Zero intensity always returns the text untouched; replies
/// that already start with a filler are left alone to avoid stacking.
pub fn humanize<R: Rng>(text: &str, mood: Mood, intensity: f32, rng: &mut R) -> String {
    let intensity = intensity.clamp(0.0, 1.0);
    let trimmed = text.trim();
    if trimmed.is_empty() || intensity == 0.0 {
        return trimmed.to_string();
    }

    if !rng.gen_bool(f64::from(intensity)) {
        return trimmed.to_string();
    }

    let pool = openers(mood);
    let all_openers = NEUTRAL_OPENERS
        .iter()
        .chain(WARM_OPENERS)
        .chain(UPBEAT_OPENERS);
    for opener in all_openers {
        if trimmed.starts_with(opener) {
            return trimmed.to_string();
        }
    }

    let opener = pool[rng.gen_range(0..pool.len())];
    format!("{opener} {trimmed}")
}
