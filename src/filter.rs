//! Test case filter expressions.
//!
//! A filter is a comma-separated list of alternatives; a case matches when
//! any alternative matches. Each alternative is a conjunction of terms:
//!
//! - `[tag]` matches cases carrying the tag (ASCII case-insensitive),
//! - `name` matches the exact case name; `*` at either end is a wildcard,
//! - `"quoted name"` allows brackets or commas inside a name,
//! - `~` before a term negates it.
//!
//! `Has failure`, `[tag]~[neat]`, `*tags, Foo` are all valid filters. An
//! empty filter matches every case.

use std::fmt;

use crate::diagnostics::CatchError;
use crate::err_msg;
use crate::registry::TestCase;
use crate::tags::TagSet;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NamePattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Any,
}

impl NamePattern {
    fn new(text: &str) -> Self {
        let starts = text.starts_with('*');
        let ends = text.len() > 1 && text.ends_with('*');
        let core = text.trim_start_matches('*').trim_end_matches('*').to_string();
        match (starts, ends) {
            _ if core.is_empty() => NamePattern::Any,
            (true, true) => NamePattern::Contains(core),
            (true, false) => NamePattern::Suffix(core),
            (false, true) => NamePattern::Prefix(core),
            (false, false) => NamePattern::Exact(core),
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Exact(s) => name == s,
            NamePattern::Prefix(s) => name.starts_with(s.as_str()),
            NamePattern::Suffix(s) => name.ends_with(s.as_str()),
            NamePattern::Contains(s) => name.contains(s.as_str()),
            NamePattern::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TermKind {
    Tag(String),
    Name(NamePattern),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    negated: bool,
    kind: TermKind,
}

impl Term {
    fn matches(&self, name: &str, tags: &TagSet) -> bool {
        let hit = match &self.kind {
            TermKind::Tag(tag) => tags.contains(tag),
            TermKind::Name(pattern) => pattern.matches(name),
        };
        hit != self.negated
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFilter {
    source: String,
    alternatives: Vec<Vec<Term>>,
}

impl TestFilter {
    /// The filter that matches every case.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, CatchError> {
        let mut alternatives = Vec::new();
        for part in split_alternatives(text)? {
            let terms = parse_terms(&part)?;
            if !terms.is_empty() {
                alternatives.push(terms);
            }
        }
        Ok(Self {
            source: text.trim().to_string(),
            alternatives,
        })
    }

    /// Combines several command-line filter arguments as alternatives.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, CatchError> {
        let joined = args
            .iter()
            .map(|a| a.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        Self::parse(&joined)
    }

    pub fn is_all(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn matches(&self, case: &TestCase) -> bool {
        self.matches_parts(case.name(), case.tags())
    }

    pub fn matches_parts(&self, name: &str, tags: &TagSet) -> bool {
        self.is_all()
            || self
                .alternatives
                .iter()
                .any(|terms| terms.iter().all(|t| t.matches(name, tags)))
    }
}

impl fmt::Display for TestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            f.write_str("*")
        } else {
            f.write_str(&self.source)
        }
    }
}

/// Splits on commas outside quotes and brackets.
fn split_alternatives(text: &str) -> Result<Vec<String>, CatchError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_brackets = false;
    for c in text.chars() {
        match c {
            '"' if !in_brackets => in_quotes = !in_quotes,
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            ',' if !in_quotes && !in_brackets => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if in_quotes {
        return Err(err_msg!(Validation, "unterminated quote in filter '{}'", text));
    }
    parts.push(current);
    Ok(parts)
}

fn parse_terms(text: &str) -> Result<Vec<Term>, CatchError> {
    let mut terms = Vec::new();
    let mut chars = text.chars();
    let mut negated = false;
    let mut name = String::new();

    let flush_name = |name: &mut String, negated: &mut bool, terms: &mut Vec<Term>| {
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            terms.push(Term {
                negated: std::mem::take(negated),
                kind: TermKind::Name(NamePattern::new(trimmed)),
            });
        }
        name.clear();
    };

    while let Some(c) = chars.next() {
        match c {
            '~' if name.trim().is_empty() => negated = true,
            '[' => {
                flush_name(&mut name, &mut negated, &mut terms);
                let mut tag = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    tag.push(c);
                }
                if !closed {
                    return Err(err_msg!(Validation, "unterminated tag in filter '{}'", text)
                        .with_help("tags are written as [name]"));
                }
                terms.push(Term {
                    negated: std::mem::take(&mut negated),
                    kind: TermKind::Tag(tag.trim().to_string()),
                });
            }
            '"' => {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    name.push(c);
                }
                // Quoted names never expand wildcards.
                let quoted = std::mem::take(&mut name);
                if !quoted.is_empty() {
                    terms.push(Term {
                        negated: std::mem::take(&mut negated),
                        kind: TermKind::Name(NamePattern::Exact(quoted)),
                    });
                }
            }
            _ => name.push(c),
        }
    }
    flush_name(&mut name, &mut negated, &mut terms);
    if negated {
        return Err(err_msg!(Validation, "'~' without a term in filter '{}'", text)
            .with_help("negate a tag or name, e.g. ~[slow] or ~Foo"));
    }
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(filter: &str, name: &str, tags: &str) -> bool {
        TestFilter::parse(filter)
            .unwrap()
            .matches_parts(name, &TagSet::parse(tags))
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(TestFilter::parse("  ").unwrap().is_all());
        assert!(matches("", "anything", ""));
    }

    #[test]
    fn names_match_exactly_and_tags_by_membership() {
        assert!(matches("No tags", "No tags", ""));
        assert!(!matches("No tag", "No tags", ""));
        assert!(matches("[neat]", "With tags", "[tag][neat]"));
        assert!(!matches("[neat]", "Has failure", "[tag]"));
    }

    #[test]
    fn wildcards_negation_and_alternatives() {
        assert!(matches("*tags", "With tags", ""));
        assert!(matches("Has*", "Has failure", ""));
        assert!(matches("*fail*", "Has forced failure", ""));
        assert!(matches("[tag]~[neat]", "Has failure", "[tag]"));
        assert!(!matches("[tag]~[neat]", "With tags", "[tag][neat]"));
        assert!(matches("~Foo", "Warn", ""));
        assert!(matches("Warn, Info", "Info", ""));
    }

    #[test]
    fn quoted_names_may_contain_commas() {
        assert!(matches("\"a, b\"", "a, b", ""));
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        assert!(TestFilter::parse("[tag").is_err());
    }

    #[test]
    fn dangling_negation_is_an_error() {
        for filter in ["~", " ~ ", "Foo,~", "~\"\"", "[tag] ~"] {
            let err = TestFilter::parse(filter).unwrap_err();
            assert!(err.to_string().contains("'~' without a term"), "{}", filter);
        }
        assert!(TestFilter::parse("~Foo").is_ok());
    }
}
