//! Terminal interaction behind a trait so the add flow can be scripted.

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};

pub trait Prompter {
    /// Prints an informational line.
    fn notice(&mut self, message: &str);

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;

    /// Free text. An empty answer is allowed and comes back as `""`.
    fn input(&mut self, prompt: &str) -> Result<String>;

    /// Index of the chosen item.
    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> Result<usize>;
}

pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn notice(&mut self, message: &str) {
        println!("{message}");
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    fn input(&mut self, prompt: &str) -> Result<String> {
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(answer.trim().to_string())
    }

    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        Ok(Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()?)
    }
}
