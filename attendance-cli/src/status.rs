//! Console status feedback for the attendance loop

use attendance_core::{AttendanceError, CardUid, StatusIndicator};
use std::io::{self, Write};

/// Prints one line per outcome so the person at the reader gets feedback
pub struct ConsoleIndicator<W> {
    out: W,
}

impl ConsoleIndicator<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleIndicator<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        // Feedback is cosmetic; a broken stdout must not stop the loop.
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
    }
}

impl<W: Write> StatusIndicator for ConsoleIndicator<W> {
    fn registration_started(&mut self, card: CardUid) {
        self.line(format_args!("… Unknown card {}, registering", card));
    }

    fn registration_finished(&mut self) {}

    fn attendance_accepted(&mut self, name: &str) {
        self.line(format_args!("✓ Welcome, {}", name));
    }

    fn attendance_suppressed(&mut self, name: &str) {
        self.line(format_args!("✓ Already signed in: {}", name));
    }

    fn event_failed(&mut self, card: CardUid, error: &AttendanceError) {
        self.line(format_args!("✗ Could not record card {}: {}", card, error));
    }
}
