//! Goal directive rewriting.
//!
//! A directive is a conjunction of clauses separated by top-level `&`:
//!
//! ```text
//! Flag(TypeOn("x")) & Flag(FileOn("g1.res")) & Set(...)
//! ```
//!
//! Only three clause shapes are understood: the type flag, the result-file flag
//! and the trace flag. Every other clause is carried through verbatim. Text that
//! cannot be split into clauses (unbalanced parentheses, an unterminated string)
//! is never rewritten.

use std::sync::LazyLock;

use regex::Regex;

static TYPE_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^Flag\(\s*TypeOn\(.*\)\s*\)$").expect("type flag regex"));
static FILE_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^Flag\(\s*FileOn\(\s*"([^"]*)"\s*\)\s*\)$"#).expect("file flag regex"));
static TRACE_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^Flag\(\s*TraceOn\(\s*"([^"]*)"\s*\)\s*\)$"#).expect("trace flag regex"));

/// One top-level clause of a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause<'a> {
    Type,
    ResultFile(&'a str),
    Trace(&'a str),
    Other(&'a str),
}

impl<'a> Clause<'a> {
    fn classify(text: &'a str) -> Self {
        if TYPE_FLAG.is_match(text) {
            return Clause::Type;
        }
        if let Some(name) = FILE_FLAG.captures(text).and_then(|c| c.get(1)) {
            return Clause::ResultFile(name.as_str());
        }
        if let Some(name) = TRACE_FLAG.captures(text).and_then(|c| c.get(1)) {
            return Clause::Trace(name.as_str());
        }
        Clause::Other(text)
    }
}

/// Split a directive into its top-level clauses.
///
/// Returns `None` when the text is not well formed. Empty text has no clauses.
pub fn parse_clauses(text: &str) -> Option<Vec<Clause<'_>>> {
    let mut clauses = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            '&' if depth == 0 => {
                clauses.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if in_string || depth != 0 {
        return None;
    }
    clauses.push(&text[start..]);

    let trimmed: Vec<&str> = clauses.into_iter().map(str::trim).collect();
    if trimmed.iter().all(|c| c.is_empty()) {
        return Some(Vec::new());
    }
    if trimmed.iter().any(|c| c.is_empty()) {
        // a dangling `&`
        return None;
    }
    Some(trimmed.into_iter().map(Clause::classify).collect())
}

/// Output of [`translate_goal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// The directive now requests the trace and the result file.
    Rewritten(String),
    /// The input was not recognisable and is returned as is; no trace was requested.
    Unchanged(String),
}

impl Translation {
    pub fn text(&self) -> &str {
        match self {
            Translation::Rewritten(s) | Translation::Unchanged(s) => s,
        }
    }

    pub fn requests_trace(&self) -> bool {
        matches!(self, Translation::Rewritten(_))
    }
}

fn trace_flag(name: &str) -> String {
    format!("Flag(TraceOn(\"{name}\"))")
}

fn file_flag(name: &str) -> String {
    format!("Flag(FileOn(\"{name}\"))")
}

/// Rewrite a stage-1 goal so that the prover also writes a trace.
///
/// The type flag and any trace flag are dropped. The first result-file flag is
/// replaced in place by `TraceOn(trace_name) & FileOn(result_name)`; further
/// result-file flags are dropped. Without a result-file flag the pair is
/// prepended.
pub fn translate_goal(content: &str, trace_name: &str, result_name: &str) -> Translation {
    let Some(clauses) = parse_clauses(content) else {
        return Translation::Unchanged(content.to_string());
    };

    let requested = [trace_flag(trace_name), file_flag(result_name)];
    let mut out: Vec<String> = Vec::with_capacity(clauses.len() + 1);
    let mut placed = false;
    for clause in clauses {
        match clause {
            Clause::Type | Clause::Trace(_) => {}
            Clause::ResultFile(_) if placed => {}
            Clause::ResultFile(_) => {
                out.extend(requested.iter().cloned());
                placed = true;
            }
            Clause::Other(text) => out.push(text.to_string()),
        }
    }
    if !placed {
        let mut prefixed = requested.to_vec();
        prefixed.append(&mut out);
        out = prefixed;
    }
    Translation::Rewritten(out.join(" & "))
}

/// Stage-2 goal: replay `trace_path`, writing the status token to `result_name`.
pub fn replay_directive(trace_path: &str, result_name: &str) -> String {
    format!("{} & (\"{trace_path}\")", file_flag(result_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(text: &str, needle: &str) -> usize {
        text.matches(needle).count()
    }

    #[test]
    fn test_replaces_type_and_result_flags() {
        let t = translate_goal(r#"Flag(TypeOn("x")) & Flag(FileOn("g1.res")) & P"#, "g1.trace", "g1.res");
        assert_eq!(
            t,
            Translation::Rewritten(r#"Flag(TraceOn("g1.trace")) & Flag(FileOn("g1.res")) & P"#.into())
        );
    }

    #[test]
    fn test_prepends_when_no_result_flag() {
        let t = translate_goal("Set(a | a <: b) => c", "a.trace", "a.res");
        assert_eq!(
            t.text(),
            r#"Flag(TraceOn("a.trace")) & Flag(FileOn("a.res")) & Set(a | a <: b) => c"#
        );
        assert!(t.requests_trace());
    }

    #[test]
    fn test_result_flag_is_replaced_in_place() {
        let t = translate_goal(r#"Flag(Other(1)) & Flag(FileOn("old.res")) & Q"#, "q.trace", "q.res");
        assert_eq!(
            t.text(),
            r#"Flag(Other(1)) & Flag(TraceOn("q.trace")) & Flag(FileOn("q.res")) & Q"#
        );
    }

    #[test]
    fn test_translation_is_idempotent() {
        let once = translate_goal(r#"Flag(TypeOn("x")) & Flag(FileOn("g1.res")) & P"#, "g1.trace", "g1.res");
        let twice = translate_goal(once.text(), "g1.trace", "g1.res");
        assert_eq!(once, twice);
        assert_eq!(count(twice.text(), "TraceOn"), 1);
        assert_eq!(count(twice.text(), "FileOn"), 1);
    }

    #[test]
    fn test_last_requested_result_flag_wins() {
        let once = translate_goal("P", "p.trace", "first.res");
        let twice = translate_goal(once.text(), "p.trace", "second.res");
        assert_eq!(twice.text(), r#"Flag(TraceOn("p.trace")) & Flag(FileOn("second.res")) & P"#);
    }

    #[test]
    fn test_duplicate_result_flags_collapse() {
        let t = translate_goal(r#"Flag(FileOn("a.res")) & Flag(FileOn("b.res")) & P"#, "x.trace", "x.res");
        assert_eq!(count(t.text(), "FileOn"), 1);
        assert!(t.text().contains(r#"FileOn("x.res")"#));
    }

    #[test]
    fn test_empty_content_gets_only_flags() {
        let t = translate_goal("  \n", "e.trace", "e.res");
        assert_eq!(t.text(), r#"Flag(TraceOn("e.trace")) & Flag(FileOn("e.res"))"#);
    }

    #[test]
    fn test_malformed_input_passes_through() {
        for bad in ["Flag(FileOn(\"a.res\") & P", "P & \"unterminated", "P &", "P ) & (Q"] {
            let t = translate_goal(bad, "a.trace", "a.res");
            assert_eq!(t, Translation::Unchanged(bad.to_string()), "input: {bad}");
            assert!(!t.requests_trace());
        }
    }

    #[test]
    fn test_ampersand_inside_parens_and_strings_is_not_a_separator() {
        let clauses = parse_clauses(r#"Flag(FileOn("a&b.res")) & (P & Q) & R"#).unwrap();
        assert_eq!(
            clauses,
            vec![Clause::ResultFile("a&b.res"), Clause::Other("(P & Q)"), Clause::Other("R")]
        );
    }

    #[test]
    fn test_parse_recognises_trace_and_multiline_type() {
        let clauses = parse_clauses("Flag(TypeOn(\n  \"x\"\n)) & Flag(TraceOn(\"t.trace\"))").unwrap();
        assert_eq!(clauses, vec![Clause::Type, Clause::Trace("t.trace")]);
    }

    #[test]
    fn test_replay_directive_template() {
        assert_eq!(
            replay_directive("/out/trace/g1.trace", "g1.replay.res"),
            r#"Flag(FileOn("g1.replay.res")) & ("/out/trace/g1.trace")"#
        );
    }
}
