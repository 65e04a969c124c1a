use crate::config::types::{JudgeError, Result};
use crate::selector::query::TestQuery;
use glob::{MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// Compiled form of a [`TestQuery`].
///
/// Compiling is the only fallible step; matching is total and free of side
/// effects, so one matcher can be shared across any number of candidates.
#[derive(Clone, Debug)]
pub enum Matcher {
    Id(String),
    Wildcard {
        pattern: Pattern,
        options: MatchOptions,
    },
    Regex(Regex),
    AnyOf(Vec<Matcher>),
}

impl Matcher {
    pub fn compile(query: &TestQuery) -> Result<Self> {
        match query {
            TestQuery::Id(id) => Ok(Matcher::Id(id.clone())),
            TestQuery::Wildcard {
                pattern,
                case_insensitive,
            } => {
                let compiled = Pattern::new(&fnmatch_to_glob(pattern)).map_err(|e| {
                    JudgeError::InvalidTestQuery(format!("wildcard {:?}: {}", pattern, e))
                })?;
                Ok(Matcher::Wildcard {
                    pattern: compiled,
                    options: fnmatch_options(*case_insensitive),
                })
            }
            TestQuery::Regex {
                pattern,
                case_insensitive,
            } => {
                let anchored = format!("^(?:{})$", pattern);
                let compiled = RegexBuilder::new(&anchored)
                    .case_insensitive(*case_insensitive)
                    .build()
                    .map_err(|e| {
                        JudgeError::InvalidTestQuery(format!("regex {:?}: {}", pattern, e))
                    })?;
                Ok(Matcher::Regex(compiled))
            }
            TestQuery::AnyOf(children) => children
                .iter()
                .map(Matcher::compile)
                .collect::<Result<Vec<_>>>()
                .map(Matcher::AnyOf),
        }
    }

    pub fn matches(&self, test_id: &str) -> bool {
        match self {
            Matcher::Id(id) => id == test_id,
            Matcher::Wildcard { pattern, options } => pattern.matches_with(test_id, *options),
            Matcher::Regex(regex) => regex.is_match(test_id),
            Matcher::AnyOf(children) => children.iter().any(|child| child.matches(test_id)),
        }
    }

    /// Members of `universe` accepted by this matcher
    pub fn select<'a, I>(&self, universe: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        universe
            .into_iter()
            .filter(|id| self.matches(id))
            .cloned()
            .collect()
    }
}

/// fnmatch(3) without FNM_PATHNAME/FNM_PERIOD: `*` crosses `/` and leading dots
fn fnmatch_options(case_insensitive: bool) -> MatchOptions {
    MatchOptions {
        case_sensitive: !case_insensitive,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

/// Rewrite an fnmatch(3) pattern into `glob` syntax.
///
/// - `\c` matches `c` literally
/// - `[^...]` negates like `[!...]`
/// - `[` without a closing `]` is a literal `[`
/// - runs of `*` collapse, since glob rejects `**` outside a whole component
fn fnmatch_to_glob(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => match chars.get(i + 1) {
                Some(&c) => {
                    out.push_str(&Pattern::escape(&c.to_string()));
                    i += 2;
                }
                None => {
                    out.push('\\');
                    i += 1;
                }
            },
            '*' => {
                out.push('*');
                while chars.get(i).copied() == Some('*') {
                    i += 1;
                }
            }
            '[' => match bracket_end(&chars, i) {
                Some(end) => {
                    push_bracket(&mut out, &chars[i + 1..end]);
                    i = end + 1;
                }
                None => {
                    out.push_str("[[]");
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Index of the `]` closing the bracket expression opened at `start`.
///
/// A `]` right after the opening bracket (or its negation mark) is a member.
fn bracket_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if matches!(chars.get(i), Some('!') | Some('^')) {
        i += 1;
    }
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            ']' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn push_bracket(out: &mut String, body: &[char]) {
    out.push('[');
    let mut body = body;
    if let Some((&first, rest)) = body.split_first() {
        if first == '!' || first == '^' {
            out.push('!');
            body = rest;
        }
    }
    let mut escaped = false;
    for &c in body {
        if c == '\\' && !escaped {
            escaped = true;
            continue;
        }
        escaped = false;
        out.push(c);
    }
    out.push(']');
}

/// Resolve `query` against the full test universe.
///
/// The result is always a subset of `universe`; ids named by the query but
/// missing from the universe are simply not selected.
pub fn resolve(query: &TestQuery, universe: &HashSet<String>) -> Result<HashSet<String>> {
    let matcher = Matcher::compile(query)?;
    let selected = matcher.select(universe);
    log::debug!(
        "Selected {} of {} tests",
        selected.len(),
        universe.len()
    );
    Ok(selected)
}
