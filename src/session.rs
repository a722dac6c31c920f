use crate::errors::Error;
use crate::storage::Table;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// An open database file and the table stored in it.
pub struct Session {
    pub id: Uuid,
    pub path: PathBuf,
    pub table: Table,
}

impl Session {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let id = Uuid::new_v4();
        let table = Table::open(path)?;
        info!(
            session_id = id.to_string(),
            path = %path.display(),
            "Opened session."
        );
        Ok(Session {
            id,
            path: path.to_path_buf(),
            table,
        })
    }

    /// Flushes every cached page to disk.
    pub fn close(&mut self) -> Result<(), Error> {
        self.table.close()?;
        info!(
            session_id = self.id.to_string(),
            path = %self.path.display(),
            "Closed session."
        );
        Ok(())
    }
}
