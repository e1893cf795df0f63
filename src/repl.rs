//! Interactive question loop.
//!
//! Reads one question per line from any [`BufRead`], answers it through the
//! [`Session`] and writes to any [`Write`], so the loop runs the same against
//! a terminal or in-memory buffers.
//!
//! | Input | Effect |
//! |-------|--------|
//! | `exit`, `quit` | end the loop (case-insensitive) |
//! | blank line | ignored |
//! | `:load <path>` | load another document and clear the transcript |
//! | `:history` | print the transcript |
//! | `:help` | list commands |
//! | anything else | answer it |
//!
//! A failing question or load is reported and the loop keeps going.

use std::io::{BufRead, Write};
use std::path::Path;

use crate::session::Session;
use crate::transcript::Transcript;

pub const PROMPT: &str = "Ask: ";

const HELP: &str = "\
Commands:
  :load <path>   load another document
  :history       show this conversation
  :help          show this help
  exit | quit    leave
Anything else is answered from the loaded document.
";

/// Run until `exit`/`quit` or end of input.
///
/// Only errors writing to `output` end the loop early.
pub fn run_repl<R: BufRead, W: Write>(
    session: &mut Session,
    transcript: &mut Transcript,
    input: R,
    mut output: W,
) -> std::io::Result<()> {
    let mut lines = input.lines();
    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => {
                writeln!(output)?;
                break;
            }
        };
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            writeln!(output, "Goodbye!")?;
            break;
        }

        if let Some(command) = question.strip_prefix(':') {
            run_command(command, session, transcript, &mut output)?;
            continue;
        }

        transcript.push_user(question);
        match session.ask(question) {
            Ok(answer) => {
                writeln!(output, "\nAnswer: {}\n", answer.text)?;
                transcript.push_bot(answer.text);
            }
            Err(e) => {
                tracing::warn!(error = %e, "question failed");
                writeln!(output, "Error: {}", e)?;
            }
        }
    }
    Ok(())
}

fn run_command<W: Write>(
    command: &str,
    session: &mut Session,
    transcript: &mut Transcript,
    output: &mut W,
) -> std::io::Result<()> {
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "load" if !arg.is_empty() => match session.load(Path::new(arg)) {
            Ok(ready) => {
                transcript.clear();
                writeln!(
                    output,
                    "Loaded {} ({} pages, {} chunks).",
                    ready.source.display(),
                    ready.pages,
                    ready.chunks
                )?;
            }
            Err(e) => writeln!(output, "Error: {}", e)?,
        },
        "load" => writeln!(output, "Usage: :load <path>")?,
        "history" => write!(output, "{}", transcript.render())?,
        "help" => write!(output, "{}", HELP)?,
        other => writeln!(output, "Unknown command ':{}'. Type :help.", other)?,
    }
    Ok(())
}
