//! Text normalization applied to the rule-based planner's output
//! before comparing it against the legacy planner's.
//!
//! The two planners label unaliased select-list expressions
//! differently: merlin emits zero-based `EXPR$N`, alder emits
//! one-based `C(N+1)`. The names describe the same select-list
//! position, so comparisons run over normalized text rather than
//! teaching either planner the other's convention.

/// Rewrite every `EXPR$N` occurrence to `C(N+1)`.
///
/// Pure string transform; nothing else in the text is touched, and
/// running it twice is the same as running it once because the output
/// convention never contains `EXPR$`.
pub fn normalize_columns(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("EXPR$") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + "EXPR$".len()..];
        let digits = tail.chars().take_while(char::is_ascii_digit).count();
        let (ordinal, after) = tail.split_at(digits);
        match ordinal.parse::<usize>() {
            Ok(n) => {
                out.push('C');
                out.push_str(&(n + 1).to_string());
            }
            // No ordinal (or one too large to read): not a generated
            // column name, leave the text alone.
            Err(_) => {
                out.push_str("EXPR$");
                out.push_str(ordinal);
            }
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Erase the `#id` stamps a numbered rendering carries on every node
/// name. Expectation strings are written without ids, so the stamps
/// must go before comparing.
pub fn strip_node_ids(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('#') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let digits = tail.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            out.push('#');
        }
        rest = &tail[digits..];
    }
    out.push_str(rest);
    out
}
