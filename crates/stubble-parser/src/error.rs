//! The single build-time error kind.

use std::fmt;

/// A parse or build failure. All builder validation failures share this
/// kind and are fatal to the current build call; no partial unit escapes.
/// Display renders the file/line/caret layout of the original error
/// format; the bare message is available through [`ParseError::message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    msg: String,
    line: Option<u32>,
    column: Option<u32>,
    text: Option<String>,
    filename: Option<String>,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        ParseError {
            msg: msg.into(),
            line: None,
            column: None,
            text: None,
            filename: None,
        }
    }

    pub fn with_location(mut self, line: u32, column: Option<u32>) -> Self {
        self.line = Some(line);
        self.column = column;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.msg
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filename.is_some() || self.line.is_some() {
            writeln!(
                f,
                "  File: \"{}\", line {}",
                self.filename.as_deref().unwrap_or("<string>"),
                self.line.map_or_else(|| "?".to_string(), |l| l.to_string()),
            )?;
        }
        if let (Some(column), Some(text)) = (self.column, &self.text) {
            let stripped = text.trim_start();
            let indent = 4;
            writeln!(f, "{:indent$}{}", "", stripped, indent = indent)?;
            let skipped = text.len() - stripped.len();
            let pos = (indent + (column as usize).saturating_sub(1)).saturating_sub(skipped);
            writeln!(f, "{:pos$}^", "", pos = pos)?;
        }
        write!(f, "ParseError: {}", self.msg)
    }
}

impl std::error::Error for ParseError {}

impl From<stubble_core::CoreError> for ParseError {
    fn from(err: stubble_core::CoreError) -> Self {
        ParseError::new(err.to_string())
    }
}
