// ============================================================================
// src/ui.rs – Console output helpers
// ============================================================================

use console::{style, Style};
use dialoguer::Confirm;
use std::io::IsTerminal;

pub struct UX {
    pub quiet: bool,
    pub assume_yes: bool,
}

impl UX {
    pub fn new(quiet: bool, assume_yes: bool) -> Self {
        Self { quiet, assume_yes }
    }

    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{} {}", style("•").cyan().bold(), msg);
        }
    }

    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green().bold(), msg);
        }
    }

    pub fn warn(&self, msg: &str) {
        eprintln!("{} {}", style("!").yellow().bold(), style(msg).yellow());
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{} {}", style("✘").red().bold(), style(msg).red());
    }

    /// Aligned key/value block under a bold title.
    pub fn data_panel(&self, title: &str, rows: &[(&str, String)]) {
        if self.quiet {
            return;
        }
        let key_style = Style::new().dim();
        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        println!("{}", style(title).bold().underlined());
        for (key, value) in rows {
            println!(
                "  {}  {}",
                key_style.apply_to(format!("{key:<width$}")),
                value
            );
        }
    }

    /// Plain line on stdout, printed even when quiet (command results).
    pub fn out(&self, line: &str) {
        println!("{line}");
    }

    /// Ask before a destructive step. `--yes`, or stdin not being a
    /// terminal, answers yes without prompting. Redirecting stdout alone
    /// still prompts.
    pub fn confirm(&self, prompt: &str) -> anyhow::Result<bool> {
        if !needs_prompt(self.assume_yes, std::io::stdin().is_terminal()) {
            return Ok(true);
        }
        Ok(Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?)
    }
}

fn needs_prompt(assume_yes: bool, stdin_is_tty: bool) -> bool {
    !assume_yes && stdin_is_tty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_depends_on_stdin_and_yes_flag() {
        assert!(needs_prompt(false, true));
        assert!(!needs_prompt(true, true));
        assert!(!needs_prompt(false, false));
    }

    #[test]
    fn assume_yes_confirms_without_terminal() {
        let ui = UX::new(true, true);
        assert!(ui.confirm("Delete resource foo?").unwrap());
    }
}
