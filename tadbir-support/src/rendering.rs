//! Text rendering utilities for human-friendly diagnostics.
//!
//! Used by the container to print dependency paths, shorten
//! fully-qualified type names, and suggest near-miss tokens.

/// Renders a dependency path as a readable string.
///
/// # Examples
/// ```
/// use tadbir_support::rendering::render_chain;
///
/// let chain = vec!["repo", "db", "config", "repo"];
/// assert_eq!(render_chain(&chain), "repo → db → config → repo");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders one bullet line per item, indented for nesting under
/// an error headline.
///
/// ```
/// use tadbir_support::rendering::render_bullets;
///
/// let out = render_bullets(&["db: connection reset", "cache: timeout"], 2);
/// assert_eq!(out, "\n  - db: connection reset\n  - cache: timeout");
/// ```
pub fn render_bullets(items: &[impl AsRef<str>], indent: usize) -> String {
    let pad = " ".repeat(indent);
    items
        .iter()
        .map(|item| format!("\n{pad}- {}", item.as_ref()))
        .collect()
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use tadbir_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::services::user::UserService");
/// assert_eq!(short, "UserService");
///
/// let short = shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>");
/// assert_eq!(short, "Arc<dyn Logger>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Classic Levenshtein edit distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

/// Picks the registered labels closest to `requested`, best first.
///
/// A candidate qualifies when one label contains the other, or when the
/// edit distance is at most a third of the longer label (minimum 1).
/// Comparison ignores case and module paths.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let wanted = shorten_type_name(requested).to_lowercase();
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &str)> = available
        .iter()
        .filter_map(|&candidate| {
            let short = shorten_type_name(candidate).to_lowercase();
            if short == wanted {
                return None;
            }
            if short.contains(&wanted) || wanted.contains(&short) {
                return Some((0, candidate));
            }

            let distance = edit_distance(&wanted, &short);
            let budget = (wanted.len().max(short.len()) / 3).max(1);
            (distance <= budget).then_some((distance, candidate))
        })
        .collect();

    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(_, name)| name.to_string())
        .collect()
}
