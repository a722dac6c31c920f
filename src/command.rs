use crate::errors::Error;
use crate::session::Session;
use crate::storage::Row;
use tracing::{debug, trace};

/// Commands starting with a dot, handled by the shell itself.
#[derive(Debug, PartialEq, Eq)]
pub enum MetaCommand {
    Exit,
    Btree,
    Constants,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ExecuteResult {
    Inserted,
    Rows(Vec<Row>),
}

/// Parses a line starting with `.`.
pub fn parse_meta(line: &str) -> Result<MetaCommand, Error> {
    match line {
        ".exit" => Ok(MetaCommand::Exit),
        ".btree" => Ok(MetaCommand::Btree),
        ".constants" => Ok(MetaCommand::Constants),
        _ => Err(Error::UnrecognizedCommand(line.to_string())),
    }
}

/// Parses a statement.
///
/// Keywords are matched on the start of the line. `insert` takes exactly
/// three whitespace separated arguments; anything after them is ignored.
pub fn prepare(line: &str) -> Result<Statement, Error> {
    if line.starts_with("insert") {
        return prepare_insert(line);
    }
    if line.starts_with("select") {
        return Ok(Statement::Select);
    }
    Err(Error::UnrecognizedStatement(line.to_string()))
}

fn prepare_insert(line: &str) -> Result<Statement, Error> {
    let mut tokens = line.split_whitespace().skip(1);
    let (Some(id), Some(username), Some(email)) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(err!(Syntax, "insert expects <id> <username> <email>"));
    };

    let id = match id.parse::<i32>() {
        Ok(id) if id > 0 => id as u32,
        _ => return Err(Error::NegativeId),
    };
    trace!(id, "Prepared insert statement");
    Ok(Statement::Insert(Row::new(id, username, email)?))
}

/// Executes a prepared statement against the session table.
pub fn execute(session: &mut Session, statement: Statement) -> Result<ExecuteResult, Error> {
    match statement {
        Statement::Insert(row) => {
            session.table.insert(&row)?;
            Ok(ExecuteResult::Inserted)
        }
        Statement::Select => {
            let rows = session.table.select()?;
            debug!(
                session_id = session.id.to_string(),
                rows = rows.len(),
                "Selected rows"
            );
            Ok(ExecuteResult::Rows(rows))
        }
    }
}
