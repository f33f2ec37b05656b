//! Operator name prompt for newly seen cards

use attendance_core::{CardUid, NamePrompt, PromptError};
use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};

/// Line-based prompt; re-asks until a non-blank name is entered
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl LinePrompt<StdinLock<'static>, Stdout> {
    pub fn stdin() -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask `question` and return the trimmed answer (possibly empty)
    pub fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(PromptError::Closed);
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> NamePrompt for LinePrompt<R, W> {
    fn prompt_for_name(&mut self, card: CardUid) -> Result<String, PromptError> {
        writeln!(self.output, "\nNew card {}", card)?;
        loop {
            let name = self.ask("Enter your name: ")?;
            if !name.is_empty() {
                return Ok(name);
            }
        }
    }
}
