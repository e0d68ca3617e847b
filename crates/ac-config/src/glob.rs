//! `*`-wildcard matching for permission/tool-enablement patterns (spec §4.1).
//!
//! `*` matches any substring (including empty); everything else must match
//! literally. Patterns with zero or one `*` take a fast prefix/suffix path;
//! patterns with two or more stars fall back to a recursive matcher.

/// Match `input` against `pattern`, where `*` is any-substring and all other
/// characters must match literally.
pub fn match_wildcard(pattern: &str, input: &str) -> bool {
    let star_count = pattern.matches('*').count();
    match star_count {
        0 => pattern == input,
        1 => match_single_star(pattern, input),
        _ => match_recursive(pattern.as_bytes(), input.as_bytes()),
    }
}

fn match_single_star(pattern: &str, input: &str) -> bool {
    let idx = pattern.find('*').expect("caller guarantees exactly one '*'");
    let prefix = &pattern[..idx];
    let suffix = &pattern[idx + 1..];

    // Length floor: input must be at least as long as the non-star literal
    // parts combined, otherwise prefix/suffix can't both match without
    // overlapping.
    if input.len() < prefix.len() + suffix.len() {
        return false;
    }
    input.starts_with(prefix) && input.ends_with(suffix)
}

/// Recursive matcher for patterns with multiple `*`. Classic glob matching:
/// consume literal runs, and for each `*` try every possible split.
fn match_recursive(pattern: &[u8], input: &[u8]) -> bool {
    match pattern.first() {
        None => input.is_empty(),
        Some(b'*') => {
            // `*` matches zero or more characters; try shrinking input from
            // the front until the rest of the pattern matches.
            if match_recursive(&pattern[1..], input) {
                return true;
            }
            for i in 0..input.len() {
                if match_recursive(&pattern[1..], &input[i + 1..]) {
                    return true;
                }
            }
            false
        }
        Some(&c) => input.first() == Some(&c) && match_recursive(&pattern[1..], &input[1..]),
    }
}
