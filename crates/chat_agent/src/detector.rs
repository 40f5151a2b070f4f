//! Local echo control for a live completion stream.
//!
//! The provider stops generation on the invocation end marker; this module
//! only decides what reaches the terminal while chunks arrive.

use termchat::{Style, TerminalCmd};

use crate::markup::INVOCATION_START;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    StreamingNormal,
    InvocationDetected,
    Done,
}

#[derive(Debug)]
pub struct StreamingDetector {
    buffer: String,
    state: DetectorState,
}

impl Default for StreamingDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingDetector {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            state: DetectorState::StreamingNormal,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Whether the start marker was ever seen. Monotonic.
    pub fn detected(&self) -> bool {
        self.buffer.contains(INVOCATION_START) && self.state != DetectorState::StreamingNormal
    }

    /// Accept one chunk and return the terminal commands that echo it.
    ///
    /// In normal streaming each chunk is echoed once, unchanged. The chunk that
    /// completes the start marker switches to the tool style; if part of the
    /// marker was already echoed, the current line is cleared and its prose
    /// prefix reprinted so the marker appears only once, styled.
    pub fn push(&mut self, chunk: &str) -> Vec<TerminalCmd> {
        match self.state {
            DetectorState::Done => {
                tracing::warn!(len = chunk.len(), "chunk received after stream finished");
                Vec::new()
            }
            DetectorState::InvocationDetected => {
                self.buffer.push_str(chunk);
                vec![TerminalCmd::text(chunk)]
            }
            DetectorState::StreamingNormal => {
                let echoed = self.buffer.len();
                self.buffer.push_str(chunk);
                let Some(marker_at) = self.buffer.find(INVOCATION_START) else {
                    return vec![TerminalCmd::text(chunk)];
                };

                self.state = DetectorState::InvocationDetected;
                tracing::debug!(offset = marker_at, "tool invocation marker detected");

                let mut cmds = Vec::with_capacity(4);
                if marker_at >= echoed {
                    if marker_at > echoed {
                        cmds.push(TerminalCmd::text(&self.buffer[echoed..marker_at]));
                    }
                } else {
                    let line_start = self.buffer[..marker_at]
                        .rfind('\n')
                        .map_or(0, |newline| newline + 1);
                    cmds.push(TerminalCmd::ClearLine);
                    if marker_at > line_start {
                        cmds.push(TerminalCmd::text(&self.buffer[line_start..marker_at]));
                    }
                }
                cmds.push(TerminalCmd::Style(Style::Tool));
                cmds.push(TerminalCmd::text(&self.buffer[marker_at..]));
                cmds
            }
        }
    }

    /// End of stream. Restores styling if the tool style was switched on.
    pub fn finish(&mut self) -> Vec<TerminalCmd> {
        let was_detected = self.state == DetectorState::InvocationDetected;
        self.state = DetectorState::Done;
        if was_detected {
            vec![TerminalCmd::Style(Style::Reset), TerminalCmd::Newline]
        } else {
            vec![TerminalCmd::Newline]
        }
    }
}
