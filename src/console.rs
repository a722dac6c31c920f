/// Console output helpers.
use crossterm::{queue, style, tty::IsTty};
use std::io::{self, Write};

pub const PROMPT: &str = "db > ";

/// Returns whether the process stdout is attached to a terminal.
pub fn stdout_is_tty() -> bool {
    io::stdout().is_tty()
}

/// Writes the prompt and flushes, so it is visible before input is read.
///
/// When `styled` is set the prompt is rendered bold.
pub fn print_prompt<W: Write>(out: &mut W, styled: bool) -> io::Result<()> {
    if styled {
        queue!(
            out,
            style::SetAttribute(style::Attribute::Bold),
            style::Print(PROMPT),
            style::SetAttribute(style::Attribute::Reset)
        )?;
    } else {
        queue!(out, style::Print(PROMPT))?;
    }
    out.flush()
}

pub fn println<W: Write>(out: &mut W, s: &str) -> io::Result<()> {
    queue!(out, style::Print(s), style::Print("\n"))
}

pub fn echo_lines<W: Write>(out: &mut W, lines: &[String]) -> io::Result<()> {
    for l in lines {
        println(out, l)?;
    }
    Ok(())
}

#[macro_export]
macro_rules! echo {
    ($out:expr, $($arg:tt)*) => {
        $crate::console::println($out, &format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_prompt() {
        let mut out = Vec::new();
        print_prompt(&mut out, false).unwrap();
        assert_eq!(out, b"db > ");
    }

    #[test]
    fn test_styled_prompt() {
        let mut out = Vec::new();
        print_prompt(&mut out, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(PROMPT));
        assert_ne!(text, PROMPT);
    }

    #[test]
    fn test_echo() {
        let mut out = Vec::new();
        echo!(&mut out, "({}, {})", 1, "a").unwrap();
        echo_lines(&mut out, &["x".to_string(), "y".to_string()]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "(1, a)\nx\ny\n");
    }
}
