//! Prompt construction, DOM truncation and completion cleanup.

use healer_core_types::SuggestionRequest;
use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on the DOM text handed to a backend. Best-effort input
/// limit, not a correctness guarantee.
pub const MAX_DOM_BYTES: usize = 10_000;

/// Marker appended when a snapshot is cut at the bound.
pub const TRUNCATION_MARKER: &str = "...";

static BODY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").unwrap());
static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n?(.*?)\n?```$").unwrap());

/// Build the single prompt sent to the backend for one healing attempt.
pub fn build_prompt(request: &SuggestionRequest) -> String {
    let mut prompt = format!(
        "The CSS/XPath selector \"{}\" failed to find an element.\n\n\
         Current page DOM:\n{}\n",
        request.broken_selector,
        truncate_dom(&request.current.html)
    );

    if let Some(historical) = &request.historical {
        prompt.push_str(&format!(
            "\nHistorical DOM:\n{}\n",
            truncate_dom(&historical.html)
        ));
    }

    prompt.push_str(
        "\nFind a new selector for the same element. Respond ONLY with the selector, \
         no explanation.\nPrefer simple, stable selectors like data-testid, id, or text content.",
    );
    prompt
}

/// Reduce a full-page snapshot to its body content and bound its length.
/// The result is always a prefix of the body content; the cut lands on a
/// `char` boundary so the opening-tag region is never split mid-codepoint.
pub fn truncate_dom(dom: &str) -> String {
    let content = BODY_RE
        .captures(dom)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(dom);

    if content.len() <= MAX_DOM_BYTES {
        return content.to_string();
    }

    let mut cut = MAX_DOM_BYTES;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &content[..cut], TRUNCATION_MARKER)
}

/// Strip prose decoration from a backend completion so only the selector
/// string remains. Code fences, surrounding quotes and a leading
/// "selector:" label are all removed.
pub fn clean_suggestion(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(caps) = CODE_FENCE_RE.captures(text) {
        if let Some(inner) = caps.get(1) {
            text = inner.as_str().trim();
        }
    }

    // Models occasionally answer "Selector: #foo" despite instructions.
    if let Some(rest) = strip_label(text, "selector:") {
        text = rest.trim();
    }

    // Take the first line; anything after it is explanation.
    if let Some(first_line) = text.lines().next() {
        text = first_line.trim();
    }

    let text = text
        .trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim();
    text.to_string()
}

fn strip_label<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let head = text.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(&text[label.len()..])
    } else {
        None
    }
}
