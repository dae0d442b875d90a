//! Namespace-qualified names.
//!
//! Class and define names are stored lowercase and joined with `::`.
//! Resource type names in references are capitalised per segment
//! (`experiment::baz` is referenced as `Experiment::Baz`).

/// Separator between namespace segments
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Join a namespace and a name; an empty namespace yields the bare name
#[must_use]
pub fn join_namespace(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}{NAMESPACE_SEPARATOR}{name}")
    }
}

/// Whether a name carries a namespace separator
#[must_use]
pub fn is_qualified(name: &str) -> bool {
    name.contains(NAMESPACE_SEPARATOR)
}

/// The namespace enclosing a qualified name (`a::b::c` -> `a::b`)
#[must_use]
pub fn parent_namespace(name: &str) -> &str {
    name.rfind(NAMESPACE_SEPARATOR).map_or("", |idx| &name[..idx])
}

/// Candidate fully-qualified names for an unqualified `name` looked up from
/// `namespace`, innermost namespace first and the bare global name last.
#[must_use]
pub fn candidate_names(namespace: &str, name: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut current = namespace;
    while !current.is_empty() {
        candidates.push(join_namespace(current, name));
        current = parent_namespace(current);
    }
    candidates.push(name.to_string());
    candidates
}

/// Capitalise every namespace segment (`foo::bar_baz` -> `Foo::Bar_baz`)
#[must_use]
pub fn capitalize_name(name: &str) -> String {
    name.trim_start_matches(NAMESPACE_SEPARATOR)
        .split(NAMESPACE_SEPARATOR)
        .map(|segment| {
            let lower = segment.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(NAMESPACE_SEPARATOR)
}
