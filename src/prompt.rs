//! Console questions asked while repairing playlists

use crate::model::PlaylistEntry;
use anyhow::{Context, Result};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

/// Answer to "what to do with this entry?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// Use this exact file
    Update(PathBuf),
    /// Map the entry's directory to another one, for this and later entries
    Relocate(PathBuf),
    /// Rewrite the filename with a regex, for this and later entries
    Rename {
        pattern: String,
        substitution: String,
    },
    Remove,
    Skip,
    Exit,
}

/// Source of user decisions
pub trait Prompter {
    /// Ask what to do with an entry no strategy could resolve
    fn choose(&mut self, entry: &PlaylistEntry) -> Result<Choice>;

    /// The previous choice could not be applied; it will be asked again
    fn rejected(&mut self, reason: &str);

    /// Yes/no question
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Whether a human can answer
    fn is_interactive(&self) -> bool;
}

const MENU: [&str; 6] = ["Update", "Relocate", "Rename", "Remove", "Skip", "Exit"];

/// Reads answers from stdin, writes questions to stderr
#[derive(Debug)]
pub struct ConsolePrompter {
    interactive: bool,
}

impl Default for ConsolePrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolePrompter {
    pub fn new() -> Self {
        Self {
            interactive: io::stdin().is_terminal(),
        }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        eprint!("{question}");
        io::stderr().flush().context("Failed to flush stderr")?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("Failed to read answer from stdin")?;
        Ok(answer.trim().to_string())
    }
}

impl Prompter for ConsolePrompter {
    fn choose(&mut self, entry: &PlaylistEntry) -> Result<Choice> {
        eprintln!("Invalid \"{}\"", entry.original);
        eprintln!("Please select an action [Skip]:");
        for (i, name) in MENU.iter().enumerate() {
            eprintln!("  [{}] {}", i + 1, name);
        }

        let answer = self.ask("> ")?;
        let picked = match answer.parse::<usize>() {
            Ok(n) if (1..=MENU.len()).contains(&n) => MENU[n - 1],
            _ => MENU
                .iter()
                .find(|m| m.eq_ignore_ascii_case(&answer))
                .copied()
                .unwrap_or("Skip"),
        };

        let choice = match picked {
            "Update" => {
                let path = self.ask("New path: ")?;
                if path.is_empty() {
                    Choice::Skip
                } else {
                    Choice::Update(PathBuf::from(shellexpand::tilde(&path).as_ref()))
                }
            }
            "Relocate" => {
                let dir = self.ask(&format!(
                    "Replace all occurences of \"{}\" to: ",
                    entry.dir()
                ))?;
                if dir.is_empty() {
                    Choice::Skip
                } else {
                    Choice::Relocate(PathBuf::from(shellexpand::tilde(&dir).as_ref()))
                }
            }
            "Rename" => {
                let pattern = self.ask("Pattern: ")?;
                let substitution = self.ask("Substitution: ")?;
                if pattern.is_empty() || substitution.is_empty() {
                    Choice::Skip
                } else {
                    Choice::Rename {
                        pattern,
                        substitution,
                    }
                }
            }
            "Remove" => Choice::Remove,
            "Exit" => Choice::Exit,
            _ => Choice::Skip,
        };

        Ok(choice)
    }

    fn rejected(&mut self, reason: &str) {
        eprintln!("{reason}");
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        if !self.interactive {
            return Ok(false);
        }
        let answer = self.ask(&format!("{question} [y/N] "))?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

/// Replays canned answers; used by tests and scripted runs
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    choices: Vec<Choice>,
    confirms: Vec<bool>,
    /// Every rejection reason received, in order
    pub rejections: Vec<String>,
    /// Number of `choose()` calls made
    pub asked: usize,
}

impl ScriptedPrompter {
    pub fn new(choices: Vec<Choice>) -> Self {
        Self {
            choices,
            ..Self::default()
        }
    }

    pub fn with_confirms(mut self, confirms: Vec<bool>) -> Self {
        self.confirms = confirms;
        self
    }
}

impl Prompter for ScriptedPrompter {
    /// Answers in order, then `Skip` forever
    fn choose(&mut self, _entry: &PlaylistEntry) -> Result<Choice> {
        self.asked += 1;
        if self.choices.is_empty() {
            return Ok(Choice::Skip);
        }
        Ok(self.choices.remove(0))
    }

    fn rejected(&mut self, reason: &str) {
        self.rejections.push(reason.to_string());
    }

    fn confirm(&mut self, _question: &str) -> Result<bool> {
        if self.confirms.is_empty() {
            return Ok(false);
        }
        Ok(self.confirms.remove(0))
    }

    fn is_interactive(&self) -> bool {
        true
    }
}
