//! Terminal-intent detection and the graduated re-prompt ladder.

use once_cell::sync::Lazy;
use regex::Regex;

/// Case-insensitive, word-boundary match on call-ending phrases. Word
/// boundaries matter: "goodbyes" as a product name must not trigger, a bare
/// "bye" must.
static END_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(goodbye|bye|hang up|that's all|thats all|that is all|stop|end the call|end call|no more questions)\b",
    )
    .expect("end-of-call keyword pattern must compile")
});

/// True when the caller's literal text carries terminal intent. Empty or
/// whitespace-only utterances can never carry terminal intent.
pub fn is_terminal_intent(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && END_KEYWORDS.is_match(trimmed)
}

/// Graduated re-prompt by consecutive-empty-turn count: a gentle re-ask
/// first, then a request for a shorter repeat, then a minimal-effort
/// yes/no ask. Repeating one identical apology reads as broken to callers.
pub fn reprompt_line(consecutive_empty_turns: u32) -> &'static str {
    match consecutive_empty_turns {
        0 | 1 => "Sorry, I didn't quite catch that. What was that again?",
        2 => "I'm still having trouble hearing you. Could you repeat that in just a few words?",
        _ => "Let's keep it simple. Was that a yes or a no?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_keywords_trigger() {
        assert!(is_terminal_intent("bye"));
        assert!(is_terminal_intent("Goodbye!"));
        assert!(is_terminal_intent("ok thanks, that's all"));
        assert!(is_terminal_intent("please hang up now"));
        assert!(is_terminal_intent("STOP"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(is_terminal_intent("BYE"));
        assert!(is_terminal_intent("GoodBye"));
    }

    #[test]
    fn word_boundaries_are_respected() {
        // Product name containing an ending keyword must not end the call
        assert!(!is_terminal_intent("tell me about goodbyes the album"));
        assert!(!is_terminal_intent("is bypass surgery risky"));
        assert!(!is_terminal_intent("the bus stopped outside"));
        // A bare keyword still does
        assert!(is_terminal_intent("bye"));
    }

    #[test]
    fn empty_text_never_terminal() {
        assert!(!is_terminal_intent(""));
        assert!(!is_terminal_intent("   "));
    }

    #[test]
    fn reprompt_ladder_escalates_without_repeating() {
        let first = reprompt_line(1);
        let second = reprompt_line(2);
        let third = reprompt_line(3);
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_ne!(first, third);
        // Past the third miss the ladder stays at the minimal-effort ask
        assert_eq!(reprompt_line(4), third);
    }
}
