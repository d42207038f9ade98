use std::borrow::Cow;

/// Collapse `s` onto one line: every run of whitespace or control
/// characters becomes a single space and the ends are trimmed.
///
/// Feed titles routinely carry newlines and tabs; output is one line per
/// entry, so they must not survive.
///
/// # Examples
///
/// ```
/// use feedmark::util::single_line;
///
/// assert_eq!(single_line("Hello\n  World"), "Hello World");
/// assert_eq!(single_line("plain"), "plain");
/// ```
pub fn single_line(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim_matches(is_break);

    // Fast path: nothing to collapse inside
    let needs_collapse = trimmed
        .char_indices()
        .any(|(i, c)| (is_break(c) && c != ' ') || (c == ' ' && trimmed[i + 1..].starts_with(is_break)));
    if !needs_collapse {
        return Cow::Borrowed(trimmed);
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut pending_space = false;
    for c in trimmed.chars() {
        if is_break(c) {
            pending_space = true;
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    Cow::Owned(out)
}

fn is_break(c: char) -> bool {
    c.is_whitespace() || c.is_control()
}
