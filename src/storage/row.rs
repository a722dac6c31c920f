//! Fixed-width row encoding.
//!
//! The table has a hard-coded schema:
//!
//! | column   | type         | size |
//! |----------|--------------|------|
//! | id       | integer      | 4    |
//! | username | varchar(32)  | 33   |
//! | email    | varchar(255) | 256  |
//!
//! Each string column reserves one extra byte for the terminator, so every
//! row occupies exactly `ROW_SIZE` bytes no matter how long its strings are.
use crate::errors::Error;
use bincode::config::{self, Config};
use bincode::{Decode, Encode};
use std::fmt;

pub const COLUMN_USERNAME_SIZE: usize = 32;
pub const COLUMN_EMAIL_SIZE: usize = 255;

pub const ID_SIZE: usize = std::mem::size_of::<u32>();
pub const USERNAME_SIZE: usize = COLUMN_USERNAME_SIZE + 1;
pub const EMAIL_SIZE: usize = COLUMN_EMAIL_SIZE + 1;
pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;
pub const ROW_SIZE: usize = EMAIL_OFFSET + EMAIL_SIZE;

/// A row of the only table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

/// On-disk shape of a row.
#[derive(Encode, Decode)]
struct RowRecord {
    id: u32,
    username: [u8; USERNAME_SIZE],
    email: [u8; EMAIL_SIZE],
}

fn row_config() -> impl Config {
    config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

impl Row {
    /// Builds a row, checking the string widths.
    ///
    /// # Errors
    /// Returns `Error::StringTooLong` if the username exceeds 32 bytes or the
    /// email exceeds 255 bytes.
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, Error> {
        if username.len() > COLUMN_USERNAME_SIZE || email.len() > COLUMN_EMAIL_SIZE {
            return Err(Error::StringTooLong);
        }
        Ok(Row {
            id,
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    /// Serializes the row into its fixed-width record. Unused bytes are zero.
    pub fn encode(&self) -> Result<[u8; ROW_SIZE], Error> {
        let record = RowRecord {
            id: self.id,
            username: str_to_fixed_bytes(&self.username)?,
            email: str_to_fixed_bytes(&self.email)?,
        };

        let mut buf = [0u8; ROW_SIZE];
        let written = bincode::encode_into_slice(record, &mut buf, row_config())?;
        if written != ROW_SIZE {
            return Err(err!(
                Encoding,
                "Encoded row size mismatch: expected {}, got {}",
                ROW_SIZE,
                written
            ));
        }
        Ok(buf)
    }

    /// Deserializes a row from a record produced by [`Row::encode`].
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() != ROW_SIZE {
            return Err(err!(
                Encoding,
                "Encoded row size mismatch: expected {}, got {}",
                ROW_SIZE,
                buf.len()
            ));
        }
        let (record, _): (RowRecord, usize) = bincode::decode_from_slice(buf, row_config())?;
        Ok(Row {
            id: record.id,
            username: fixed_bytes_to_string(&record.username)?,
            email: fixed_bytes_to_string(&record.email)?,
        })
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}

/// Copies `input` into a zero-filled array, keeping at least one trailing zero.
fn str_to_fixed_bytes<const N: usize>(input: &str) -> Result<[u8; N], Error> {
    let bytes = input.as_bytes();
    if bytes.len() >= N {
        return Err(Error::StringTooLong);
    }
    let mut buf = [0u8; N];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

fn fixed_bytes_to_string(buf: &[u8]) -> Result<String, Error> {
    let trimmed = buf.split(|&b| b == 0).next().unwrap_or(&[]);
    Ok(String::from_utf8(trimmed.to_vec())?)
}
