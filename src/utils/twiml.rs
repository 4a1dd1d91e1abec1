//! Telephony markup (TwiML) rendering for the webhook call flow.
//!
//! Rendering rules for a turn: a cached synthesized artifact plays via
//! `<Play>`, otherwise the literal text is spoken with `<Say>`. Non-terminal
//! turns wrap the utterance in a `<Gather input="speech">` that posts the
//! next recognition result back to the voice webhook; terminal turns play
//! the line and `<Hangup/>`.

use uuid::Uuid;

use crate::core::turn::TurnOutcome;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Escape text for embedding in XML character data.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn artifact_url(public_url: &str, id: Uuid) -> String {
    format!("{}/audio/{}", public_url.trim_end_matches('/'), id)
}

fn utterance_markup(outcome: &TurnOutcome, public_url: &str) -> String {
    match outcome.audio {
        Some(id) => format!("<Play>{}</Play>", escape(&artifact_url(public_url, id))),
        None => format!("<Say>{}</Say>", escape(&outcome.text)),
    }
}

/// Render one turn outcome as a complete TwiML document.
pub fn turn_response(outcome: &TurnOutcome, public_url: &str, language: &str) -> String {
    let utterance = utterance_markup(outcome, public_url);

    if outcome.terminal {
        return format!("{XML_HEADER}<Response>{utterance}<Hangup/></Response>");
    }

    // The utterance lives inside the Gather so recognition starts while the
    // agent is still speaking. The trailing Redirect re-arms listening when
    // the gather times out without any speech.
    format!(
        "{XML_HEADER}<Response>\
         <Gather input=\"speech\" action=\"/voice\" method=\"POST\" language=\"{}\" speechTimeout=\"auto\">\
         {utterance}\
         </Gather>\
         <Redirect method=\"POST\">/voice</Redirect>\
         </Response>",
        escape(language),
    )
}

/// TwiML that hands the call off to the bidirectional media stream.
pub fn connect_stream(public_url: &str) -> String {
    let trimmed = public_url.trim_end_matches('/');
    let ws_url = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}/stream")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}/stream")
    } else {
        format!("wss://{trimmed}/stream")
    };
    format!(
        "{XML_HEADER}<Response><Connect><Stream url=\"{}\"/></Connect></Response>",
        escape(&ws_url)
    )
}

/// Last-resort document when turn processing itself panicked: apologize and
/// hang up rather than returning an HTTP error the telephony provider would
/// read out as a generic failure.
pub fn apology_hangup(line: &str) -> String {
    format!(
        "{XML_HEADER}<Response><Say>{}</Say><Hangup/></Response>",
        escape(line)
    )
}
