//! Placeholder grammar: substitution and conditional blocks.
//!
//! Delimiters are `{%` / `%}`. Three forms share one parameter name:
//!
//! - literal:      `{%name%}`
//! - toggle block: `{%name content name%}` (whitespace-delimited name tokens)
//! - match block:  `{%name:alt1|alt2 content name:alt1|alt2%}`
//!
//! ## Key Invariants
//!
//! 1. A literal token matches the full delimited name, never a prefix of a
//!    longer name (`{%color%}` does not touch `{%colorful%}`).
//! 2. Toggle matching is non-greedy and spans newlines: the first closing
//!    token wins, so nested toggles for the same name are unsupported.
//!    Documented behavior, not a bug.
//! 3. Each name resolves in its own pass (toggle, then match, then literal).
//!    Content revealed by one name must never be re-scanned as another
//!    name's tokens, so callers drive names one at a time.
//! 4. Malformed or unterminated syntax is not an error: it fails to match
//!    and survives as literal text.

use regex::Regex;

/// The literal placeholder token for `name`.
pub fn token(name: &str) -> String {
    format!("{{%{}%}}", name)
}

/// Replace every exact `{%name%}` occurrence with `value`. No-op if absent.
pub fn substitute(text: &str, name: &str, value: &str) -> String {
    text.replace(&token(name), value)
}

/// Resolve toggle and match blocks for one name, in that order.
pub fn resolve_blocks(text: &str, name: &str, value: &str) -> String {
    let toggled = resolve_toggle(text, name, value);
    resolve_match(&toggled, name, value)
}

/// Toggle block: `{%name content name%}`.
///
/// Empty value deletes the whole block, delimiters included. Non-empty value
/// keeps the content (the closing token's leading whitespace belongs to the
/// content); leftover unpaired delimiter tokens are stripped afterwards.
fn resolve_toggle(text: &str, name: &str, value: &str) -> String {
    let escaped = regex::escape(name);
    // The closing name token must sit after whitespace, so a name that is a
    // suffix of a longer word in the content can never close the block. The
    // whitespace itself stays inside the capture.
    let block = Regex::new(&format!(r"(?s)\{{%{}\s(.*?\s){}%\}}", escaped, escaped))
        .expect("toggle pattern");

    if value.is_empty() {
        return block.replace_all(text, "").into_owned();
    }

    let kept = block.replace_all(text, "$1").into_owned();

    // Cleanup pass: bare delimiter tokens left behind by unpaired toggles.
    let open = Regex::new(&format!(r"\{{%{}\s", escaped)).expect("toggle open");
    let close = Regex::new(&format!(r"\s{}%\}}", escaped)).expect("toggle close");
    let kept = open.replace_all(&kept, "").into_owned();
    close.replace_all(&kept, "").into_owned()
}

/// Match block: `{%name:alt1|alt2 content name:alt1|alt2%}`.
///
/// Content is kept (delimiters stripped) iff `value` contains at least one
/// alternative of the opening token as a substring; otherwise the whole
/// occurrence is deleted. Occurrences are independent and the opening list
/// decides; the closing list is located but not compared.
fn resolve_match(text: &str, name: &str, value: &str) -> String {
    let escaped = regex::escape(name);
    let block = Regex::new(&format!(
        r"(?s)\{{%{}:(\S+?)\s(.*?)\s{}:\S+?%\}}",
        escaped, escaped
    ))
    .expect("match pattern");

    block
        .replace_all(text, |caps: &regex::Captures| {
            let hit = caps[1]
                .split('|')
                .any(|alt| !alt.is_empty() && value.contains(alt));
            if hit {
                caps[2].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Rewrite every occurrence of `old` as a parameter name to `new`, across
/// all three placeholder forms, without touching surrounding text. Used by
/// the assembler's rename tables.
pub fn rename_token(text: &str, old: &str, new: &str) -> String {
    let escaped = regex::escape(old);

    // Literal form.
    let out = text.replace(&token(old), &token(new));

    // Toggle open/close (name token bounded by whitespace).
    let toggle_open = Regex::new(&format!(r"\{{%{}(\s)", escaped)).expect("rename toggle open");
    let out = toggle_open
        .replace_all(&out, format!("{{%{}$1", new))
        .into_owned();
    let toggle_close = Regex::new(&format!(r"(\s){}%\}}", escaped)).expect("rename toggle close");
    let out = toggle_close
        .replace_all(&out, format!("${{1}}{}%}}", new))
        .into_owned();

    // Match open/close. The closing pattern requires the trailing `%}` so a
    // bare `name:` in content (CSS property syntax, say) is never touched.
    let match_open = Regex::new(&format!(r"\{{%{}:", escaped)).expect("rename match open");
    let out = match_open
        .replace_all(&out, format!("{{%{}:", new))
        .into_owned();
    let match_close =
        Regex::new(&format!(r"(\s){}:(\S*?%\}})", escaped)).expect("rename match close");
    match_close
        .replace_all(&out, format!("${{1}}{}:$2", new))
        .into_owned()
}
