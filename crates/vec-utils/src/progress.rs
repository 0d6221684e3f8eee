use std::io::{self, Write};

/// Progress reporter for long-running sync operations.
///
/// Writes status lines to a configurable sink (stdout by default). Only the
/// protocol layer reports progress; lower layers surface typed errors and
/// stay silent.
///
/// Counted phases render as `title: 42` or `title:  50% (42/84)` depending
/// on whether a total is known.
pub struct Progress {
    sink: Box<dyn Write + Send>,
    title: String,
    total: Option<u64>,
    current: u64,
    /// Last percentage displayed, to suppress redundant updates.
    last_percent: Option<u32>,
}

impl Progress {
    /// Create a progress reporter writing to stdout.
    pub fn new(title: &str, total: Option<u64>) -> Self {
        Self::with_sink(title, total, Box::new(io::stdout()))
    }

    /// Create a progress reporter writing to the given sink.
    pub fn with_sink(title: &str, total: Option<u64>, sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink,
            title: title.to_string(),
            total,
            current: 0,
            last_percent: None,
        }
    }

    /// Advance the counter by `n` and redraw if the display would change.
    pub fn advance(&mut self, n: u64) {
        self.current += n;
        self.draw(false);
    }

    /// Set the counter to an absolute value and redraw.
    pub fn set(&mut self, current: u64) {
        self.current = current;
        self.draw(false);
    }

    /// Emit a one-off status line outside the counted phase.
    pub fn status(&mut self, message: &str) {
        let _ = writeln!(self.sink, "{message}");
        let _ = self.sink.flush();
    }

    /// Finish the phase: draw the final count and terminate the line.
    pub fn finish(&mut self) {
        self.draw(true);
        let _ = writeln!(self.sink, ", done.");
        let _ = self.sink.flush();
    }

    fn draw(&mut self, force: bool) {
        match self.total {
            Some(total) if total > 0 => {
                let percent = (self.current * 100 / total) as u32;
                if !force && self.last_percent == Some(percent) {
                    return;
                }
                self.last_percent = Some(percent);
                let _ = write!(
                    self.sink,
                    "\r{}: {:3}% ({}/{})",
                    self.title, percent, self.current, total
                );
            }
            _ => {
                let _ = write!(self.sink, "\r{}: {}", self.title, self.current);
            }
        }
        let _ = self.sink.flush();
    }
}
