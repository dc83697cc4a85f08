//! Provider error bodies end up in `Failure::message` and in logs, so they
//! are cut to a readable length and stripped of anything shaped like a key.

const ERROR_BODY_LIMIT: usize = 200;

const REDACTED: &str = "[REDACTED]";

/// Key prefixes of the vendors we talk to (OpenAI, Groq, Google, Slack-style bots).
const KEY_PREFIXES: [&str; 5] = ["sk-", "gsk_", "AIza", "xoxb-", "xoxp-"];

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

/// Earliest key prefix in `text`, as (byte offset, prefix).
fn next_key_prefix(text: &str) -> Option<(usize, &'static str)> {
    KEY_PREFIXES
        .iter()
        .filter_map(|prefix| text.find(prefix).map(|at| (at, *prefix)))
        .min_by_key(|(at, _)| *at)
}

/// Replace every `<prefix><key chars>` run with `[REDACTED]`.
///
/// A prefix with nothing after it is kept as-is.
pub fn redact_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some((at, prefix)) = next_key_prefix(rest) {
        let key = &rest[at + prefix.len()..];
        let key_len = key.find(|c| !is_key_char(c)).unwrap_or(key.len());

        out.push_str(&rest[..at]);
        out.push_str(if key_len == 0 { prefix } else { REDACTED });
        rest = &key[key_len..];
    }

    out.push_str(rest);
    out
}

/// Trim, redact, and cap an upstream error body at a fixed number of chars.
pub fn clean_error_body(body: &str) -> String {
    let redacted = redact_keys(body.trim());
    match redacted.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => format!("{}...", &redacted[..cut]),
        None => redacted,
    }
}
