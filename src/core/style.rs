//! Closed set of named style tokens.

/// Semantic styling applied to terminal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    /// Echo of what the user typed.
    User,
    Success,
    Warning,
    Error,
    /// Raw invocation markup while a tool call streams in.
    Tool,
    Reset,
}

impl Style {
    /// ANSI SGR sequence for this token.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::User => "\x1b[94m",
            Self::Success => "\x1b[92m",
            Self::Warning => "\x1b[93m",
            Self::Error => "\x1b[91m",
            Self::Tool => "\x1b[96m",
            Self::Reset => "\x1b[0m",
        }
    }
}
