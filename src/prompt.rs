//! Prompt construction.
//!
//! Pure and deterministic: no process or network calls. The diff is embedded
//! verbatim and unmodified. Exemplar messages are ordered by descending
//! influence, and that ordering is stated in the instruction text itself, not
//! just implied by position. With no exemplars available the baseline
//! template is used instead of the few-shot one.

/// Which diff unit a prompt is built for. The scope determines the trailing
/// output-format directive, since per-file output is later attributed by
/// file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptScope {
    Aggregate,
    PerFile(String),
}

const PREAMBLE: &str =
    "You are a programmer to produce concise, descriptive commit messages for Git changes.";

const NO_REFERENCES: &str =
    "Do not include references to issue numbers or pull requests.";

fn format_directive(scope: &PromptScope, with_exemplars: bool) -> String {
    let style_tail = if with_exemplars {
        ", consistent with the style and context demonstrated by the above examples"
    } else {
        ""
    };

    match scope {
        PromptScope::Aggregate => format!(
            "A short commit message (in one sentence) describing what changed and why{style_tail}."
        ),
        PromptScope::PerFile(file) => format!(
            "Exactly one block of the following form, where the message is a short \
             commit message (in one sentence) describing what changed and why{style_tail}:\n\
             File: {file}\n\
             Commit Message: <message>"
        ),
    }
}

/// Render a diff plus exemplars into a single instruction prompt.
pub fn build_prompt(diff: &str, exemplars: &[String], scope: &PromptScope) -> String {
    let directive = format_directive(scope, !exemplars.is_empty());

    if exemplars.is_empty() {
        return format!(
            "{PREAMBLE} \n\
             {NO_REFERENCES}\n\
             \n\
             Now here is the new Git diff for which you must generate a commit message:\n\
             {diff}\n\
             \n\
             Format:\n\
             {directive}\n\
             \n\
             Output:\n"
        );
    }

    let numbered: String = exemplars
        .iter()
        .enumerate()
        .map(|(i, message)| format!("{}. {}", i + 1, message))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{PREAMBLE} \n\
         Below are examples of commit messages that previously touched upon the same code or files. \n\
         Please note that the first example is more important and should influence your message the most. \n\
         Use the style and context of these examples, prioritizing the first examples, to inspire a new commit message for the provided Git diff. \n\
         {NO_REFERENCES}\n\
         \n\
         Examples of relevant commit messages:\n\
         {numbered}\n\
         \n\
         Now here is the new Git diff for which you must generate a commit message:\n\
         {diff}\n\
         \n\
         Format:\n\
         {directive}\n\
         \n\
         Output:\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exemplars() -> Vec<String> {
        vec![
            "Fix off-by-one in pagination".to_string(),
            "Add retry logic to uploader".to_string(),
        ]
    }

    #[test]
    fn test_diff_embedded_verbatim() {
        let diff = "diff --git a/a.py b/a.py\n+print(1)\n  \ttrailing\n";
        let prompt = build_prompt(diff, &[], &PromptScope::Aggregate);
        assert!(prompt.contains(diff));

        let prompt = build_prompt(diff, &exemplars(), &PromptScope::Aggregate);
        assert!(prompt.contains(diff));
    }

    #[test]
    fn test_exemplar_ordering_is_stated() {
        let prompt = build_prompt("+x", &exemplars(), &PromptScope::Aggregate);
        assert!(prompt.contains("the first example is more important"));
        assert!(prompt.contains("1. Fix off-by-one in pagination"));
        assert!(prompt.contains("2. Add retry logic to uploader"));
    }

    #[test]
    fn test_no_exemplars_uses_baseline() {
        let prompt = build_prompt("+x", &[], &PromptScope::Aggregate);
        assert!(!prompt.contains("Examples of relevant commit messages"));
        assert!(prompt.contains("Do not include references"));
    }

    #[test]
    fn test_aggregate_directive_is_single_sentence() {
        let prompt = build_prompt("+x", &[], &PromptScope::Aggregate);
        assert!(prompt.contains("A short commit message (in one sentence)"));
        assert!(!prompt.contains("File:"));
    }

    #[test]
    fn test_per_file_directive_names_the_file() {
        let scope = PromptScope::PerFile("src/app.py".to_string());
        let prompt = build_prompt("+x", &exemplars(), &scope);
        assert!(prompt.contains("File: src/app.py"));
        assert!(prompt.contains("Commit Message: <message>"));
    }

    #[test]
    fn test_deterministic() {
        let scope = PromptScope::PerFile("a.py".to_string());
        let a = build_prompt("+x", &exemplars(), &scope);
        let b = build_prompt("+x", &exemplars(), &scope);
        assert_eq!(a, b);
    }
}
