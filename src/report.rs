//! Reporting sink for engine events.
//!
//! The engine never formats text itself. It emits these events, and a
//! [`Reporter`] decides how they look. [`ClassicPrinter`](crate::output::ClassicPrinter)
//! renders the familiar dot-per-test output; [`RecordingReporter`] keeps the
//! events around for inspection.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ledger::ErrorRecord;

/// Receives discrete run events in the order they happen.
pub trait Reporter {
    /// Run start: number of registered tests and suites, suite names joined.
    fn on_init(&mut self, test_count: usize, suite_count: usize, suite_names: &str);
    fn on_suite(&mut self, suite_name: &str, suite_index: usize);
    fn on_test(&mut self, test_name: &str, test_number: usize, failed: bool);
    /// One drained ledger entry; `index` is 1-based within the drain.
    fn on_error(&mut self, index: usize, error: &ErrorRecord);
    fn on_shutdown(&mut self, test_count: usize, suite_count: usize, error_count: usize);
    /// A run-level abort message (bad selector, sandbox failure, cleanup abort).
    fn on_abort(&mut self, message: &str);
}

/// A reporter event, as captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Init {
        test_count: usize,
        suite_count: usize,
        suite_names: String,
    },
    Suite {
        name: String,
        index: usize,
    },
    Test {
        name: String,
        number: usize,
        failed: bool,
    },
    Error {
        index: usize,
        record: ErrorRecord,
    },
    Shutdown {
        test_count: usize,
        suite_count: usize,
        error_count: usize,
    },
    Abort {
        message: String,
    },
}

/// Shared handle on a list of captured events.
pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Collects every event into a shared log.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: EventLog,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second handle on the log, usable after the reporter has been boxed.
    pub fn log(&self) -> EventLog {
        Rc::clone(&self.events)
    }

    fn push(&mut self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn on_init(&mut self, test_count: usize, suite_count: usize, suite_names: &str) {
        self.push(Event::Init {
            test_count,
            suite_count,
            suite_names: suite_names.to_string(),
        });
    }

    fn on_suite(&mut self, suite_name: &str, suite_index: usize) {
        self.push(Event::Suite {
            name: suite_name.to_string(),
            index: suite_index,
        });
    }

    fn on_test(&mut self, test_name: &str, test_number: usize, failed: bool) {
        self.push(Event::Test {
            name: test_name.to_string(),
            number: test_number,
            failed,
        });
    }

    fn on_error(&mut self, index: usize, error: &ErrorRecord) {
        self.push(Event::Error {
            index,
            record: error.clone(),
        });
    }

    fn on_shutdown(&mut self, test_count: usize, suite_count: usize, error_count: usize) {
        self.push(Event::Shutdown {
            test_count,
            suite_count,
            error_count,
        });
    }

    fn on_abort(&mut self, message: &str) {
        self.push(Event::Abort {
            message: message.to_string(),
        });
    }
}
