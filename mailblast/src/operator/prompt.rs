//! Terminal implementation of [`Operator`].

use async_trait::async_trait;
use colored::{ColoredString, Colorize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use super::{Operator, Tone};

/// Prompts on stdout and reads answers from a single long-lived reader.
///
/// The reader is kept for the whole run so input buffered ahead of one
/// prompt (piped answers, for instance) is still there for the next.
pub struct ConsoleOperator<R = BufReader<Stdin>> {
    input: Mutex<R>,
}

impl ConsoleOperator {
    /// Read answers from stdin.
    pub fn new() -> Self {
        Self::with_input(BufReader::new(tokio::io::stdin()))
    }
}

impl Default for ConsoleOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ConsoleOperator<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn with_input(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }

    async fn read_answer(&self) -> bool {
        let mut answer = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut answer).await {
            Ok(_) => parse_answer(&answer),
            Err(e) => {
                warn!(error = %e, "prompt_read_failed");
                false
            }
        }
    }
}

#[async_trait]
impl<R> Operator for ConsoleOperator<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn confirm(&self, question: &str) -> bool {
        let mut stdout = tokio::io::stdout();
        let prompt = format!("{} (y/N) ", question.cyan());
        if let Err(e) = stdout.write_all(prompt.as_bytes()).await {
            warn!(error = %e, "prompt_write_failed");
            return false;
        }
        if let Err(e) = stdout.flush().await {
            warn!(error = %e, "prompt_flush_failed");
        }

        self.read_answer().await
    }

    fn announce(&self, tone: Tone, message: &str) {
        match tone {
            Tone::Error => eprintln!("{}", styled(tone, message)),
            _ => println!("{}", styled(tone, message)),
        }
    }
}

/// Colour a message for the terminal.
pub fn styled(tone: Tone, message: &str) -> ColoredString {
    match tone {
        Tone::Info => message.green(),
        Tone::Success => message.green().bold(),
        Tone::Warning => message.yellow(),
        Tone::Error => message.red(),
    }
}

/// Only an explicit yes proceeds; anything else, including EOF, declines.
pub fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
