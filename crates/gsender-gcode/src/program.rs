//! Program loading
//!
//! A program is the list of sendable lines of a G-code file: comments are
//! stripped, blank lines dropped, everything else kept in file order.

use crate::block::{strip_comments, GcodeBlock};
use gsender_core::{GcodeError, Result};
use std::path::Path;

/// One sendable line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramLine {
    /// 1-based line number in the source file
    pub source_line: usize,
    /// Text written to the controller
    pub text: String,
    /// Parsed block
    pub block: GcodeBlock,
}

/// A loaded G-code program
#[derive(Debug, Clone, Default)]
pub struct Program {
    name: String,
    lines: Vec<ProgramLine>,
    size: usize,
}

impl Program {
    /// Build a program from source text
    pub fn parse(name: impl Into<String>, source: &str) -> Self {
        let mut lines = Vec::new();
        let mut size = 0;
        for (index, raw) in source.lines().enumerate() {
            let (code, _) = strip_comments(raw);
            if code.is_empty() {
                continue;
            }
            size += code.len() + 1;
            lines.push(ProgramLine {
                source_line: index + 1,
                block: GcodeBlock::parse(raw),
                text: code,
            });
        }
        Self {
            name: name.into(),
            lines,
            size,
        }
    }

    /// Build a program from individual lines
    pub fn from_lines<I, S>(name: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let source: Vec<String> = lines.into_iter().map(|l| l.as_ref().to_string()).collect();
        Self::parse(name, &source.join("\n"))
    }

    /// Read a program from disk
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| GcodeError::FileError {
            reason: format!("{}: {}", path.display(), e),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let program = Self::parse(name, &source);
        if program.is_empty() {
            return Err(GcodeError::EmptyProgram.into());
        }
        tracing::info!(
            "Loaded {} ({} lines, {} bytes)",
            program.name,
            program.len(),
            program.size
        );
        Ok(program)
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sendable lines
    pub fn lines(&self) -> &[ProgramLine] {
        &self.lines
    }

    /// Sendable line at `index`
    pub fn line(&self, index: usize) -> Option<&ProgramLine> {
        self.lines.get(index)
    }

    /// Number of sendable lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing is sendable
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Bytes written to the controller for the whole program, newlines included
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether any line drives the A axis
    pub fn is_rotary(&self) -> bool {
        self.lines.iter().any(|l| l.block.has_rotary_axis())
    }

    /// Number of M6 lines
    pub fn tool_change_count(&self) -> usize {
        self.lines.iter().filter(|l| l.block.is_tool_change()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "(header)\nG21 G90\n\nG0 X0 Y0 ; home\nG1 X10 F500\nM30\n";

    #[test]
    fn test_blank_and_comment_lines_dropped() {
        let program = Program::parse("sample.nc", SAMPLE);
        assert_eq!(program.len(), 4);
        assert_eq!(program.lines()[0].text, "G21 G90");
        assert_eq!(program.lines()[0].source_line, 2);
        assert_eq!(program.lines()[1].text, "G0 X0 Y0");
    }

    #[test]
    fn test_size_counts_newlines() {
        let program = Program::from_lines("p", ["G0 X1", "G1 X2"]);
        assert_eq!(program.size(), 12);
    }

    #[test]
    fn test_rotary_and_tool_changes() {
        let program = Program::from_lines("p", ["T1 M6", "G1 A45 F100", "T2 M6"]);
        assert!(program.is_rotary());
        assert_eq!(program.tool_change_count(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Program::load(Path::new("/nonexistent/file.nc")).is_err());
    }

    #[test]
    fn test_load_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "; nothing\n\n").unwrap();
        assert!(Program::load(file.path()).is_err());
    }
}
