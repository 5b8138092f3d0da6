use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Whitespace-token prompt reader over any input/output pair.
pub struct Console<R, W> {
    input: R,
    output: W,
    pending: VecDeque<String>,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            pending: VecDeque::new(),
        }
    }

    pub fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)
    }

    /// Prints `text` and returns the next token, or `None` at end of input.
    pub fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;
        self.next_token()
    }

    /// Like [`prompt`](Self::prompt) but re-asks until the token is a number.
    pub fn prompt_int(&mut self, text: &str) -> io::Result<Option<i32>> {
        loop {
            let Some(token) = self.prompt(text)? else {
                return Ok(None);
            };
            match token.parse() {
                Ok(value) => return Ok(Some(value)),
                Err(_) => self.say("Please enter a valid number.")?,
            }
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn next_token(&mut self) -> io::Result<Option<String>> {
        while self.pending.is_empty() {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_string));
        }
        Ok(self.pending.pop_front())
    }
}
