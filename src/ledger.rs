//! The error ledger: assertion failures awaiting report.

use std::panic::Location;

use crate::report::Reporter;

/// One recorded assertion failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub suite: String,
    pub test: String,
    /// Run-relative number of the test that failed (`-t<N>` in reports).
    pub test_number: usize,
    pub file: &'static str,
    pub line: u32,
    pub message: String,
    pub description: Option<String>,
}

impl ErrorRecord {
    pub fn new(
        suite: &str,
        test: &str,
        test_number: usize,
        location: &'static Location<'static>,
        message: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            suite: suite.to_string(),
            test: test.to_string(),
            test_number,
            file: location.file(),
            line: location.line(),
            message: message.into(),
            description,
        }
    }
}

/// Append-only list of failures for the current reporting segment.
#[derive(Debug, Default)]
pub struct ErrorLedger {
    records: Vec<ErrorRecord>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    /// Reports every pending record in insertion order (numbered from 1) and
    /// empties the ledger. Returns how many records were reported.
    pub fn drain(&mut self, reporter: &mut dyn Reporter) -> usize {
        let drained = self.records.len();
        for (i, record) in self.records.drain(..).enumerate() {
            reporter.on_error(i + 1, &record);
        }
        drained
    }
}
