//! User-facing output and confirmation prompts
//!
//! Everything a run shows the person driving it goes through [`Console`]:
//! intro, informational messages, SQL and diff sections, the failure summary
//! and the step-mode prompt. Diagnostics go to `tracing` instead.

use crate::domain::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};

/// Output sink and prompt for a run
#[async_trait]
pub trait Console: Send {
    /// Plain line
    fn line(&mut self, text: &str);

    /// Informational message
    fn info(&mut self, text: &str);

    /// Error message
    fn error(&mut self, text: &str);

    /// Section heading
    fn section(&mut self, title: &str);

    /// Table with a header row
    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]);

    fn new_line(&mut self);

    /// Ask a yes/no question; an empty answer takes `default`
    async fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;
}

/// Render a table as aligned plain text, one string per line
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let columns = headers
        .len()
        .max(rows.iter().map(Vec::len).max().unwrap_or(0));

    let mut widths = vec![0usize; columns];
    for (i, header) in headers.iter().enumerate() {
        widths[i] = widths[i].max(header.chars().count());
    }
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let separator = format!(
        "+{}+",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+")
    );

    let format_row = |cells: Vec<&str>| {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).copied().unwrap_or("");
                let padding = width - cell.chars().count();
                format!(" {}{} ", cell, " ".repeat(padding))
            })
            .collect();
        format!("|{}|", padded.join("|"))
    };

    let mut lines = vec![separator.clone()];
    lines.push(format_row(headers.to_vec()));
    lines.push(separator.clone());
    for row in rows {
        lines.push(format_row(row.iter().map(String::as_str).collect()));
    }
    lines.push(separator);
    lines
}

/// Console backed by the process's stdout and stderr, reading answers from
/// `input`
///
/// The reader lives as long as the console, so answers piped in ahead of
/// their prompts are kept for the prompts that follow.
#[derive(Debug)]
pub struct TerminalConsole<I = BufReader<Stdin>> {
    input: I,
}

impl TerminalConsole {
    /// Answers come from stdin
    pub fn new() -> Self {
        Self::with_input(BufReader::new(tokio::io::stdin()))
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> TerminalConsole<I>
where
    I: AsyncBufRead + Unpin + Send,
{
    pub fn with_input(input: I) -> Self {
        Self { input }
    }

    /// Next answer line, `None` at end of input
    async fn read_answer(&mut self) -> Result<Option<String>> {
        let mut answer = String::new();
        match self.input.read_line(&mut answer).await? {
            0 => Ok(None),
            _ => Ok(Some(answer)),
        }
    }
}

#[async_trait]
impl<I> Console for TerminalConsole<I>
where
    I: AsyncBufRead + Unpin + Send,
{
    fn line(&mut self, text: &str) {
        println!("{text}");
    }

    fn info(&mut self, text: &str) {
        println!("{text}");
    }

    fn error(&mut self, text: &str) {
        eprintln!("{text}");
    }

    fn section(&mut self, title: &str) {
        println!();
        println!("{title}");
        println!("{}", "-".repeat(title.chars().count()));
    }

    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        for line in render_table(headers, rows) {
            println!("{line}");
        }
    }

    fn new_line(&mut self) {
        println!();
    }

    async fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{question} {hint}: ").as_bytes())
            .await?;
        stdout.flush().await?;

        // End of input means nobody is there to answer
        Ok(self
            .read_answer()
            .await?
            .is_some_and(|answer| parse_answer(&answer, default)))
    }
}

fn parse_answer(input: &str, default: bool) -> bool {
    match input.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

/// One captured console event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Line(String),
    Info(String),
    Error(String),
    Section(String),
    Table(Vec<String>),
    NewLine,
    Question(String),
}

#[derive(Debug, Default)]
struct BufferState {
    events: Vec<ConsoleEvent>,
    answers: VecDeque<bool>,
}

/// Console that records output in memory and replays scripted answers
///
/// Clones share the same buffer, so a test can keep a handle while the runner
/// owns another. When the scripted answers run out, `confirm` returns the
/// question's default.
#[derive(Debug, Clone, Default)]
pub struct BufferedConsole {
    state: Arc<Mutex<BufferState>>,
}

impl BufferedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for upcoming confirmations
    pub fn with_answers(self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.lock().answers.extend(answers);
        self
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn push(&self, event: ConsoleEvent) {
        self.lock().events.push(event);
    }

    pub fn events(&self) -> Vec<ConsoleEvent> {
        self.lock().events.clone()
    }

    /// All output flattened to text lines, excluding prompts
    pub fn output(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for event in self.lock().events.iter() {
            match event {
                ConsoleEvent::Line(text)
                | ConsoleEvent::Info(text)
                | ConsoleEvent::Error(text)
                | ConsoleEvent::Section(text) => lines.push(text.clone()),
                ConsoleEvent::Table(rows) => lines.extend(rows.iter().cloned()),
                ConsoleEvent::NewLine | ConsoleEvent::Question(_) => {}
            }
        }
        lines
    }

    pub fn errors(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                ConsoleEvent::Error(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of confirmation prompts shown so far
    pub fn questions_asked(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|event| matches!(event, ConsoleEvent::Question(_)))
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.output().iter().any(|line| line.contains(needle))
    }
}

#[async_trait]
impl Console for BufferedConsole {
    fn line(&mut self, text: &str) {
        self.push(ConsoleEvent::Line(text.to_string()));
    }

    fn info(&mut self, text: &str) {
        self.push(ConsoleEvent::Info(text.to_string()));
    }

    fn error(&mut self, text: &str) {
        self.push(ConsoleEvent::Error(text.to_string()));
    }

    fn section(&mut self, title: &str) {
        self.push(ConsoleEvent::Section(title.to_string()));
    }

    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        self.push(ConsoleEvent::Table(render_table(headers, rows)));
    }

    fn new_line(&mut self) {
        self.push(ConsoleEvent::NewLine);
    }

    async fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let mut state = self.lock();
        state.events.push(ConsoleEvent::Question(question.to_string()));
        Ok(state.answers.pop_front().unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table_aligns_columns() {
        let lines = render_table(
            &["", "Original", "Updated"],
            &[vec!["name".to_string(), "Chris".to_string(), "Taylor".to_string()]],
        );
        assert_eq!(lines[0], "+------+----------+---------+");
        assert_eq!(lines[1], "|      | Original | Updated |");
        assert_eq!(lines[3], "| name | Chris    | Taylor  |");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("\n", true));
        assert!(!parse_answer("", false));
        assert!(parse_answer("Y\n", false));
        assert!(parse_answer("yes", false));
        assert!(!parse_answer("no", true));
    }

    #[tokio::test]
    async fn test_terminal_console_reads_answers_from_one_reader() {
        let mut console = TerminalConsole::with_input(&b"y\n\nyes\nn\n"[..]);

        assert!(console.confirm("Continue?", false).await.unwrap());
        assert!(console.confirm("Continue?", true).await.unwrap());
        assert!(console.confirm("Continue?", false).await.unwrap());
        assert!(!console.confirm("Continue?", true).await.unwrap());
    }

    #[tokio::test]
    async fn test_terminal_console_declines_at_end_of_input() {
        let mut console = TerminalConsole::with_input(&b"y"[..]);

        assert!(console.confirm("Continue?", true).await.unwrap());
        assert!(!console.confirm("Continue?", true).await.unwrap());
    }

    #[tokio::test]
    async fn test_buffered_console_replays_answers() {
        let mut console = BufferedConsole::new().with_answers([true, false]);
        let handle = console.clone();

        assert!(console.confirm("Continue?", true).await.unwrap());
        assert!(!console.confirm("Continue?", true).await.unwrap());
        // Out of scripted answers: default wins
        assert!(console.confirm("Continue?", true).await.unwrap());
        assert_eq!(handle.questions_asked(), 3);
    }

    #[test]
    fn test_buffered_console_captures_output() {
        let mut console = BufferedConsole::new();
        console.info("Querying users (no database transaction)...");
        console.error("boom");
        console.new_line();

        let handle = console.clone();
        assert!(handle.contains("Querying users"));
        assert_eq!(handle.errors(), vec!["boom".to_string()]);
        assert_eq!(handle.events().len(), 3);
    }
}
