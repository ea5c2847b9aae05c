//! Interactive question loop.

use std::io::{self, Write};

use reqmind_runtime::orchestrator::snippet;
use reqmind_runtime::QueryOrchestrator;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::display;

const PROMPT: &str = "Question: ";

/// Answers in `history` are cut to this many characters.
const HISTORY_ANSWER_CHARS: usize = 150;

/// Input handled by the loop itself instead of being sent as a question.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Exit,
    History,
    Clear,
    Skip,
    Ask(String),
}

fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "exit" | "quit" | "q" => Command::Exit,
        "history" => Command::History,
        "clear" => Command::Clear,
        "" => Command::Skip,
        _ => Command::Ask(trimmed.to_string()),
    }
}

/// Questions and answers from this session.
#[derive(Debug, Default)]
struct History {
    turns: Vec<(String, String)>,
}

impl History {
    fn record(&mut self, question: &str, answer: &str) {
        self.turns.push((question.to_string(), answer.to_string()));
    }

    fn clear(&mut self) {
        self.turns.clear();
    }

    fn render(&self) -> String {
        if self.turns.is_empty() {
            return "No questions asked yet.".to_string();
        }
        self.turns
            .iter()
            .enumerate()
            .map(|(i, (q, a))| {
                format!("  {}. Q: {}\n     A: {}", i + 1, q, snippet(a, HISTORY_ANSWER_CHARS))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Read questions from stdin until `exit`, `quit`, `q` or end of input.
///
/// A failed question is reported and the loop keeps going.
pub async fn run(orchestrator: &QueryOrchestrator) -> anyhow::Result<()> {
    println!("Ask a question about your requirements documents.");
    println!("Type 'history' to list questions, 'clear' to forget them, 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history = History::default();

    loop {
        print!("\n{}", PROMPT);
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            debug!("End of input");
            break;
        };

        match parse_command(&line) {
            Command::Exit => break,
            Command::History => println!("{}", history.render()),
            Command::Clear => {
                history.clear();
                println!("History cleared.");
            }
            Command::Skip => {}
            Command::Ask(question) => match orchestrator.answer(&question).await {
                Ok(result) => {
                    history.record(&question, &result.answer);
                    display::print_result(&result, false)?;
                }
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }

    println!("Goodbye!");
    Ok(())
}
