//! Terminal trait.

/// Line-oriented terminal: incremental writes out, whole lines in.
pub trait Terminal {
    /// Write output to the terminal.
    fn write(&mut self, data: &str);

    /// Push buffered output to the device.
    fn flush(&mut self);

    /// Blocking read of one input line without its line terminator.
    ///
    /// Returns `Ok(None)` at end of input.
    fn read_line(&mut self) -> std::io::Result<Option<String>>;
}
