//! Natural-language-to-SQL query engine.
//!
//! Uses the LLM to convert a question like "what is the license plate of
//! the blue car?" into a SELECT on the detections table, then renders the
//! result. Falls back to a local LLM if OpenRouter is unavailable.

use anyhow::Result;
use std::io::{self, Write};
use tracing::info;

use crate::database::{EventStore, SCHEMA};
use crate::llm::LlmClient;

// ─── Example queries shown to user on startup ────────────────────────────────

pub const EXAMPLE_QUERIES: &[&str] = &[
    "What is the license plate of the blue car?",
    "Find the white truck",
    "How many distinct vehicles were seen?",
    "Show all buses with recognized plates",
    "When did the red car first appear?",
    "List every license plate seen in the video",
    "Which vehicles appeared after 30 seconds?",
    "Show the 10 most recent detections",
];

// ─── Query result ────────────────────────────────────────────────────────────

pub struct QueryResult {
    pub question: String,
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    pub fn print_table(&self) {
        println!();
        println!("SQL: {}", self.sql);
        println!();

        if self.rows.is_empty() {
            println!("No matching events were found in the video footage.");
            return;
        }

        // Column widths
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, val) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(val.len().min(60));
                }
            }
        }

        // Header
        let header: String = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" │ ");
        println!("┌─{}─┐", "─".repeat(header.len()));
        println!("│ {} │", header);
        println!("├─{}─┤", "─".repeat(header.len()));

        // Rows (cap at 50)
        for row in self.rows.iter().take(50) {
            let line: String = row
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let w = widths.get(i).copied().unwrap_or(10);
                    let s = if v.len() > 60 {
                        format!("{}…", &v[..59])
                    } else {
                        v.clone()
                    };
                    format!("{:<width$}", s, width = w)
                })
                .collect::<Vec<_>>()
                .join(" │ ");
            println!("│ {} │", line);
        }
        println!("└─{}─┘", "─".repeat(header.len()));

        if self.rows.len() > 50 {
            println!("  … {} more rows", self.rows.len() - 50);
        }
        println!("  {} row(s)", self.rows.len());
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct QueryEngine {
    db: EventStore,
    client: LlmClient,
}

impl QueryEngine {
    pub fn new(db: EventStore, client: LlmClient) -> Self {
        Self { db, client }
    }

    /// Convert natural language question → SQL → execute → display.
    pub async fn ask(&self, question: &str) -> Result<QueryResult> {
        info!("Text-to-SQL: {}", question);

        let sql = self.client.text_to_sql(question, SCHEMA).await?;
        info!("Generated SQL: {}", sql);

        let (columns, rows) = self.db.execute_query(&sql)?;

        Ok(QueryResult {
            question: question.to_string(),
            sql,
            columns,
            rows,
        })
    }

    /// Interactive REPL loop — ask questions until "exit".
    pub async fn repl(&self) {
        println!();
        println!("╔════════════════════════════════════════════════════╗");
        println!("║   CityEye — Video Footage Query Interface          ║");
        println!("╠════════════════════════════════════════════════════╣");
        println!("║  Ask a question about the processed video.         ║");
        println!("║  Type 'exit' or Ctrl+C to quit.                    ║");
        println!("╠════════════════════════════════════════════════════╣");
        println!("  Examples:");
        for q in EXAMPLE_QUERIES {
            println!("    • {}", q);
        }
        println!("╚════════════════════════════════════════════════════╝");
        println!();

        loop {
            print!("❯ ");
            io::stdout().flush().ok();

            let mut input = String::new();
            if io::stdin().read_line(&mut input).is_err() {
                break;
            }
            let question = input.trim();

            if question.is_empty() {
                continue;
            }
            if question.eq_ignore_ascii_case("exit")
                || question.eq_ignore_ascii_case("quit")
                || question == "q"
            {
                break;
            }

            match self.ask(question).await {
                Ok(result) => result.print_table(),
                Err(e) => println!("Error: {}", e),
            }
            println!();
        }
    }
}
