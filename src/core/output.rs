//! Typed terminal output commands and a single output gate.
//!
//! Invariant: all terminal writes must flow through `OutputGate::flush(..)`.

use crate::core::style::Style;
use crate::core::terminal::Terminal;

/// Erase the current line and return the cursor to column zero.
pub const CLEAR_LINE: &str = "\r\x1b[K";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCmd {
    /// Text written verbatim.
    Text(String),
    /// Static text written verbatim.
    TextStatic(&'static str),
    /// Switch the active style.
    Style(Style),
    ClearLine,
    Newline,
}

impl TerminalCmd {
    pub fn text(data: impl Into<String>) -> Self {
        Self::Text(data.into())
    }

    /// `text` wrapped in `style` and followed by a reset.
    pub fn styled(style: Style, text: impl Into<String>) -> [Self; 3] {
        [
            Self::Style(style),
            Self::Text(text.into()),
            Self::Style(Style::Reset),
        ]
    }
}

#[derive(Debug, Default)]
pub struct OutputGate {
    cmds: Vec<TerminalCmd>,
}

impl OutputGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: TerminalCmd) {
        self.cmds.push(cmd);
    }

    pub fn extend<I>(&mut self, cmds: I)
    where
        I: IntoIterator<Item = TerminalCmd>,
    {
        self.cmds.extend(cmds);
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    /// Flush buffered commands to the terminal.
    ///
    /// This is the single write gate: `Terminal::write(..)` must not be called
    /// from anywhere else.
    pub fn flush<T: Terminal + ?Sized>(&mut self, term: &mut T) {
        if self.cmds.is_empty() {
            return;
        }
        for cmd in self.cmds.drain(..) {
            match cmd {
                TerminalCmd::Text(data) => term.write(&data),
                TerminalCmd::TextStatic(data) => term.write(data),
                TerminalCmd::Style(style) => term.write(style.code()),
                TerminalCmd::ClearLine => term.write(CLEAR_LINE),
                TerminalCmd::Newline => term.write("\n"),
            }
        }
        term.flush();
    }
}
