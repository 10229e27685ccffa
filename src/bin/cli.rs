//! abkrdb - CLI client
//!
//! Reads command lines, checks them locally and sends each valid command to
//! the server as one request.

use std::time::Duration;

use anyhow::Result;
use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use abkrdb::client::Client;
use abkrdb::protocol::{Command, Response, ResultSet};
use abkrdb::server::DEFAULT_PORT;
use abkrdb::sql::{parse_line, Statement};

/// abkrdb command-line client
#[derive(ClapParser, Debug)]
#[command(name = "abkrdb-cli", version, about = "Command-line client for abkrdb")]
struct Args {
    /// Server hostname
    #[arg(short = 'H', long, default_value = "localhost", env = "ABKR_HOST")]
    host: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT, env = "ABKR_PORT")]
    port: u16,

    /// Seconds to wait for a response
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

/// Format a result table
fn format_results(result: &ResultSet) -> String {
    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &result.rows {
        for (i, value) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(value.len());
            }
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    let mut output = String::new();
    output.push_str(&separator);
    let header: String = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    for row in &result.rows {
        let line: String = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:<width$} ", v, width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", line));
    }
    if !result.rows.is_empty() {
        output.push_str(&separator);
    }

    output.push_str(&format!("{} row(s) returned\n", result.rows.len()));
    output
}

/// Track the selected database after a successful command
fn update_current(current: &mut Option<String>, command: &Command) {
    match command {
        Command::UseDatabase { name } => *current = Some(name.clone()),
        Command::DropDatabase { name } if current.as_deref() == Some(name.as_str()) => {
            *current = None
        }
        _ => {}
    }
}

fn run_line(client: &Client, current: &mut Option<String>, line: &str) -> bool {
    let command = match parse_line(line) {
        Ok(None) => return true,
        Ok(Some(Statement::Exit)) => return false,
        Ok(Some(Statement::Command(command))) => command,
        Err(e) => {
            eprintln!("Error. Wrong input: {}", e);
            return true;
        }
    };

    match client.send(&command) {
        Ok(Response::Done) => update_current(current, &command),
        Ok(Response::Table(result)) => print!("{}", format_results(&result)),
        Ok(Response::Error { code, message }) => eprintln!("Error. {}: {}", code, message),
        Err(e) => eprintln!("Error. {}", e),
    }
    true
}

fn main() -> Result<()> {
    let args = Args::parse();
    let client = Client::new(format!("{}:{}", args.host, args.port))
        .timeout(Duration::from_secs(args.timeout));

    let mut editor = DefaultEditor::new()?;
    let mut current: Option<String> = None;

    loop {
        let prompt = format!("{}> ", current.as_deref().unwrap_or("none"));
        match editor.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                if !run_line(&client, &mut current, &line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }

    Ok(())
}
