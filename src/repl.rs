/// The REPL (Read-Eval-Print-Loop) module.
use crate::command::{self, ExecuteResult, MetaCommand};
use crate::console;
use crate::errors::Error;
use crate::session::Session;
use crate::storage::btree;
use std::io::{BufRead, Write};
use tracing::{info, warn};

/// Why the loop stopped.
#[derive(Debug, PartialEq, Eq)]
pub enum Exit {
    /// `.exit` was entered and every page was flushed.
    Requested,
    /// The input ended before `.exit`. Nothing was flushed.
    EndOfInput,
}

/// Reads lines from `input` until `.exit` or end of input.
///
/// Statement failures are reported on `out` and the loop continues. Only
/// failures to talk to the console or to flush on `.exit` are returned.
pub fn run<R: BufRead, W: Write>(
    session: &mut Session,
    mut input: R,
    out: &mut W,
    styled: bool,
) -> Result<Exit, Error> {
    info!(session_id = session.id.to_string(), "Starting REPL session...");

    let mut buf = Vec::new();
    loop {
        console::print_prompt(out, styled)?;

        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            warn!(session_id = session.id.to_string(), "Input ended without .exit");
            return Ok(Exit::EndOfInput);
        }
        let text = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(text) => text,
            Err(e) => {
                echo!(out, "{}", Error::from(e).user_message())?;
                continue;
            }
        };
        let line = text.trim_end_matches(['\n', '\r']);

        if line.starts_with('.') {
            match command::parse_meta(line) {
                Ok(MetaCommand::Exit) => {
                    session.close()?;
                    return Ok(Exit::Requested);
                }
                Ok(MetaCommand::Btree) => match session.table.tree_lines() {
                    Ok(lines) => {
                        echo!(out, "Tree:")?;
                        console::echo_lines(out, &lines)?;
                    }
                    Err(e) => echo!(out, "{}", e.user_message())?,
                },
                Ok(MetaCommand::Constants) => {
                    echo!(out, "Constants:")?;
                    console::echo_lines(out, &btree::constants())?;
                }
                Err(e) => echo!(out, "{}", e.user_message())?,
            }
            continue;
        }

        let result = command::prepare(line).and_then(|s| command::execute(session, s));
        match result {
            Ok(ExecuteResult::Inserted) => echo!(out, "Executed.")?,
            Ok(ExecuteResult::Rows(rows)) => {
                for row in rows {
                    echo!(out, "{}", row)?;
                }
                echo!(out, "Executed.")?;
            }
            Err(e) => echo!(out, "{}", e.user_message())?,
        }
    }
}
