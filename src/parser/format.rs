//! Readability heuristics for text pulled out of minified question markup.
//!
//! Every transform is a named rule in a table, so the rule set can be read
//! (and tested) one line at a time. Each rule re-emits the whitespace it
//! matches around its landmark, which keeps both formatters idempotent.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// How a rule rewrites a match.
#[derive(Clone, Copy)]
enum Rewrite {
    /// A `regex` replacement template (`${1}` style).
    Template(&'static str),
    /// `${1}` then a blank line then `${2}` with its first letter upper-cased.
    BlankThenCapitalized,
}

struct RuleSpec {
    name: &'static str,
    pattern: &'static str,
    rewrite: Rewrite,
}

pub struct Rule {
    pub name: &'static str,
    re: Regex,
    rewrite: Rewrite,
}

impl Rule {
    pub fn apply(&self, text: &str) -> String {
        match self.rewrite {
            Rewrite::Template(t) => self.re.replace_all(text, t).into_owned(),
            Rewrite::BlankThenCapitalized => self
                .re
                .replace_all(text, |c: &Captures| format!("{}\n\n{}", &c[1], capitalize(&c[2])))
                .into_owned(),
        }
    }
}

/// Substrings that mark a question body as source code.
const CODE_MARKERS: &[&str] = &[
    "#include",
    "#define",
    "int main(",
    "void main(",
    "printf(",
    "scanf(",
    "cout <<",
    "cin >>",
    "System.out.print",
    "public static void",
    "return 0",
];

const CODE_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "include",
        pattern: r#"(#include\s*(?:<[^>\n]*>|"[^"\n]*"))[ \t]*\n?"#,
        rewrite: Rewrite::Template("${1}\n"),
    },
    RuleSpec {
        name: "entry_point",
        pattern: r"\n?[ \t]*((?:int|void)\s+main\s*\([^)\n]*\))",
        rewrite: Rewrite::Template("\n${1}"),
    },
    RuleSpec {
        name: "open_brace",
        pattern: r"\{[ \t]*\n?",
        rewrite: Rewrite::Template("{\n"),
    },
    RuleSpec {
        name: "close_brace",
        pattern: r"\n?[ \t]*\}",
        rewrite: Rewrite::Template("\n}"),
    },
    RuleSpec {
        name: "statement",
        pattern: r";[ \t]*\n?[ \t]*([A-Za-z_])",
        rewrite: Rewrite::Template(";\n${1}"),
    },
    RuleSpec {
        name: "return",
        pattern: r"\n?[ \t]*(return\b[^;{}\n]*;)",
        rewrite: Rewrite::Template("\n${1}"),
    },
];

const PROSE_RULES: &[RuleSpec] = &[RuleSpec {
    name: "sentence",
    pattern: r"([?.])([A-Z])",
    rewrite: Rewrite::Template("${1}\n\n${2}"),
}];

const EXPLANATION_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "step",
        pattern: r"\s*(Step\s*\d+\s*:)",
        rewrite: Rewrite::Template("\n\n${1}"),
    },
    RuleSpec {
        name: "transition",
        pattern: r"([.;?!])\s*((?i:here|hence|so|therefore|this|the\s+(?:answer|output|result|solution))\b)",
        rewrite: Rewrite::BlankThenCapitalized,
    },
    RuleSpec {
        name: "sentence",
        pattern: r"([.?!])\s*([A-Z])",
        rewrite: Rewrite::Template("${1}\n\n${2}"),
    },
];

const CLEANUP_RULES: &[RuleSpec] = &[RuleSpec {
    name: "collapse_blank_lines",
    pattern: r"\n[ \t]*\n(?:[ \t]*\n)+",
    rewrite: Rewrite::Template("\n\n"),
}];

fn compile(specs: &[RuleSpec]) -> Vec<Rule> {
    specs
        .iter()
        .map(|s| Rule {
            name: s.name,
            re: Regex::new(s.pattern).unwrap(),
            rewrite: s.rewrite,
        })
        .collect()
}

pub static CODE: LazyLock<Vec<Rule>> = LazyLock::new(|| compile(CODE_RULES));
pub static PROSE: LazyLock<Vec<Rule>> = LazyLock::new(|| compile(PROSE_RULES));
pub static EXPLANATION: LazyLock<Vec<Rule>> = LazyLock::new(|| compile(EXPLANATION_RULES));
static CLEANUP: LazyLock<Vec<Rule>> = LazyLock::new(|| compile(CLEANUP_RULES));

pub fn apply_rules(text: &str, rules: &[Rule]) -> String {
    rules.iter().fold(text.to_string(), |acc, rule| {
        let out = rule.apply(&acc);
        if out != acc {
            tracing::trace!(rule = rule.name, "formatter rule applied");
        }
        out
    })
}

pub fn looks_like_code(text: &str) -> bool {
    CODE_MARKERS.iter().any(|m| text.contains(m)) || (text.contains('{') && text.contains('}'))
}

/// Break a question body into readable lines, code-aware.
pub fn format_question(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let rules = if looks_like_code(text) {
        CODE.as_slice()
    } else {
        PROSE.as_slice()
    };
    finish(apply_rules(text, rules))
}

/// Paragraph an explanation on steps, transitions and sentence ends.
pub fn format_explanation(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    finish(apply_rules(text, &EXPLANATION))
}

fn finish(text: String) -> String {
    apply_rules(&text, &CLEANUP).trim().to_string()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C_SAMPLE: &str = "Point out the error, if any in the program.#include <stdio.h> int main() { int i = 1; switch(i) { printf(\"This is c program.\"); case 1: printf(\"Case1\"); break; case 2: printf(\"Case2\"); break; } return 0; }";

    fn rule<'a>(rules: &'a [Rule], name: &str) -> &'a Rule {
        rules.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn empty_in_empty_out() {
        assert_eq!(format_question(""), "");
        assert_eq!(format_question("   "), "");
        assert_eq!(format_explanation(""), "");
    }

    #[test]
    fn code_gets_one_statement_per_line() {
        let out = format_question(C_SAMPLE);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].ends_with("#include <stdio.h>"));
        assert!(lines.contains(&"int main() {"));
        assert!(lines.contains(&"int i = 1;"));
        assert!(lines.contains(&"return 0;"));
        assert_eq!(*lines.last().unwrap(), "}");
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn prose_splits_run_together_sentences() {
        let out = format_question("Which is correct?Choose the best.Both are fine");
        assert_eq!(out, "Which is correct?\n\nChoose the best.\n\nBoth are fine");
    }

    #[test]
    fn prose_leaves_spaced_sentences_alone() {
        assert_eq!(format_question("What is 2+2? Pick one."), "What is 2+2? Pick one.");
    }

    #[test]
    fn question_formatting_is_idempotent() {
        for sample in [
            C_SAMPLE,
            "Which is correct?Choose the best.Both",
            "void main(){int x;x=1;return x;}",
            "  spaced   out  ",
        ] {
            let once = format_question(sample);
            assert_eq!(format_question(&once), once, "sample: {sample}");
        }
    }

    #[test]
    fn transition_word_after_semicolon_gets_capitalized_paragraph() {
        let out = format_explanation("X;here Y is");
        assert!(out.contains("\n\nHere Y is"), "{out:?}");
    }

    #[test]
    fn steps_start_new_paragraphs() {
        let out = format_explanation("Given data.Step 1: add them. Step 2: halve it.");
        assert!(out.contains("\n\nStep 1:"));
        assert!(out.contains("\n\nStep 2:"));
        assert!(!out.starts_with('\n'));
    }

    #[test]
    fn answer_phrases_are_transitions() {
        let out = format_explanation("Add both sides.the answer is 4.");
        assert!(out.contains(".\n\nThe answer is 4."), "{out:?}");
    }

    #[test]
    fn explanation_formatting_is_idempotent() {
        for sample in [
            "X;here Y is",
            "Given.Step 1: a.Step 2: b;hence c.Therefore d",
            "One. Two! Three? four",
        ] {
            let once = format_explanation(sample);
            assert_eq!(format_explanation(&once), once, "sample: {sample}");
        }
    }

    #[test]
    fn collapse_limits_blank_runs() {
        assert_eq!(format_explanation("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn statement_rule_needs_identifier_after_semicolon() {
        let r = rule(&CODE, "statement");
        assert_eq!(r.apply("a; b; }"), "a;\nb; }");
    }

    #[test]
    fn include_rule_handles_quoted_headers() {
        let r = rule(&CODE, "include");
        assert_eq!(r.apply("#include \"x.h\" int"), "#include \"x.h\"\nint");
    }

    #[test]
    fn code_detection() {
        assert!(looks_like_code("x { y }"));
        assert!(looks_like_code("printf(\"hi\")"));
        assert!(!looks_like_code("Who wrote Gitanjali?"));
    }
}
