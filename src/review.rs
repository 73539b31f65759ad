//! Interactive review of generated messages.
//!
//! Aggregate mode offers one accept/reject choice; multi-file mode shows a
//! numbered list with a leading "Accept all" entry and a second-level
//! accept/reject per file. Declining or dismissing a prompt is a recognized
//! outcome, never an error. Accepting copies the trimmed text to the system
//! clipboard. Review blocks indefinitely on user input by design.
//!
//! Failed per-file generations stay in the list with a failure marker so the
//! user can see what went wrong; they cannot be accepted.

use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::debug;

use crate::generator::GeneratedMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    Reject,
    AcceptAll,
    NoAction,
}

/// One list entry in multi-file review: either a generated message or the
/// error text for a failed generation.
pub struct ReviewEntry {
    pub file: String,
    pub result: std::result::Result<GeneratedMessage, String>,
}

/// What the user picked from the multi-file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSelection {
    AcceptAll,
    Entry(usize),
    Dismissed,
}

/// Interpret a single-choice answer. Empty input (or EOF) is "no action".
pub fn parse_single_choice(input: &str) -> ReviewDecision {
    match input.trim().to_lowercase().as_str() {
        "a" | "accept" | "y" | "yes" => ReviewDecision::Accept,
        "r" | "reject" | "n" | "no" => ReviewDecision::Reject,
        _ => ReviewDecision::NoAction,
    }
}

/// Interpret a list selection: `0` is "Accept all", `1..=len` picks a file.
pub fn parse_batch_choice(input: &str, len: usize) -> BatchSelection {
    match input.trim().parse::<usize>() {
        Ok(0) => BatchSelection::AcceptAll,
        Ok(n) if n <= len => BatchSelection::Entry(n - 1),
        _ => BatchSelection::Dismissed,
    }
}

/// Clipboard payload for "Accept all": one `file: message` line per
/// successful entry, in change-set order.
pub fn accept_all_block(entries: &[ReviewEntry]) -> String {
    entries
        .iter()
        .filter_map(|entry| {
            entry
                .result
                .as_ref()
                .ok()
                .map(|message| format!("{}: {}", entry.file, message.trimmed()))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Short one-line label for the selection list.
pub fn entry_label(entry: &ReviewEntry) -> String {
    match &entry.result {
        Ok(message) => {
            let first_line = message.trimmed().lines().next().unwrap_or("");
            format!("{} - {}", entry.file, first_line)
        }
        Err(reason) => format!("{} - [failed] {}", entry.file, reason),
    }
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    arboard::Clipboard::new()
        .and_then(|mut clipboard| clipboard.set_text(text))
        .context("Failed to write clipboard")?;
    debug!("copied {} bytes to clipboard", text.len());
    Ok(())
}

fn read_answer(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer)
}

fn accept_reject(message: &GeneratedMessage) -> Result<ReviewDecision> {
    println!("\nGenerated commit message:\n");
    println!("  {}\n", message.trimmed().replace('\n', "\n  "));

    let answer = read_answer("[a]ccept and copy to clipboard / [r]eject (Enter to skip): ")?;
    let decision = parse_single_choice(&answer);

    match decision {
        ReviewDecision::Accept => {
            copy_to_clipboard(message.trimmed())?;
            println!("✅ Commit message copied to clipboard.");
        }
        ReviewDecision::Reject => println!("Rejected. Nothing copied."),
        _ => println!("No action taken."),
    }

    Ok(decision)
}

/// Aggregate-mode review: exactly one accept/reject choice.
pub fn review_aggregate(message: &GeneratedMessage) -> Result<ReviewDecision> {
    accept_reject(message)
}

/// Multi-file review: "Accept all" plus one entry per reviewed file.
pub fn review_batch(entries: &[ReviewEntry]) -> Result<ReviewDecision> {
    println!("\nGenerated commit messages:\n");
    println!("  0) Accept all");
    for (i, entry) in entries.iter().enumerate() {
        println!("  {}) {}", i + 1, entry_label(entry));
    }

    let answer = read_answer("\nSelect an entry (Enter to skip): ")?;
    match parse_batch_choice(&answer, entries.len()) {
        BatchSelection::AcceptAll => {
            copy_to_clipboard(&accept_all_block(entries))?;
            println!("✅ All commit messages copied to clipboard.");
            Ok(ReviewDecision::AcceptAll)
        }
        BatchSelection::Entry(index) => match &entries[index].result {
            Ok(message) => accept_reject(message),
            Err(reason) => {
                println!("Generation failed for {}: {}", entries[index].file, reason);
                Ok(ReviewDecision::NoAction)
            }
        },
        BatchSelection::Dismissed => {
            println!("No action taken.");
            Ok(ReviewDecision::NoAction)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::fold_chunks;

    fn message(file: &str, text: &str) -> GeneratedMessage {
        fold_chunks(Some(file.to_string()), vec![text.to_string()])
    }

    #[test]
    fn test_parse_single_choice() {
        assert_eq!(parse_single_choice("a\n"), ReviewDecision::Accept);
        assert_eq!(parse_single_choice("ACCEPT"), ReviewDecision::Accept);
        assert_eq!(parse_single_choice("r"), ReviewDecision::Reject);
        assert_eq!(parse_single_choice("no"), ReviewDecision::Reject);
        assert_eq!(parse_single_choice(""), ReviewDecision::NoAction);
        assert_eq!(parse_single_choice("what"), ReviewDecision::NoAction);
    }

    #[test]
    fn test_parse_batch_choice() {
        assert_eq!(parse_batch_choice("0", 2), BatchSelection::AcceptAll);
        assert_eq!(parse_batch_choice("1\n", 2), BatchSelection::Entry(0));
        assert_eq!(parse_batch_choice("2", 2), BatchSelection::Entry(1));
        assert_eq!(parse_batch_choice("3", 2), BatchSelection::Dismissed);
        assert_eq!(parse_batch_choice("", 2), BatchSelection::Dismissed);
        assert_eq!(parse_batch_choice("abc", 2), BatchSelection::Dismissed);
    }

    #[test]
    fn test_accept_all_block_keeps_change_set_order() {
        let entries = vec![
            ReviewEntry {
                file: "b.py".to_string(),
                result: Ok(message("b.py", "  Add parser\n")),
            },
            ReviewEntry {
                file: "a.py".to_string(),
                result: Ok(message("a.py", "Fix tests")),
            },
        ];
        assert_eq!(accept_all_block(&entries), "b.py: Add parser\na.py: Fix tests");
    }

    #[test]
    fn test_accept_all_block_skips_failed_entries() {
        let entries = vec![
            ReviewEntry {
                file: "a.py".to_string(),
                result: Ok(message("a.py", "Fix tests")),
            },
            ReviewEntry {
                file: "b.py".to_string(),
                result: Err("exit code 2".to_string()),
            },
        ];
        assert_eq!(accept_all_block(&entries), "a.py: Fix tests");
    }

    #[test]
    fn test_entry_label_marks_failures() {
        let ok = ReviewEntry {
            file: "a.py".to_string(),
            result: Ok(message("a.py", "Fix tests\n\ndetails")),
        };
        assert_eq!(entry_label(&ok), "a.py - Fix tests");

        let failed = ReviewEntry {
            file: "b.py".to_string(),
            result: Err("exit code 2".to_string()),
        };
        assert_eq!(entry_label(&failed), "b.py - [failed] exit code 2");
    }
}
