//! Suite and test descriptors, plus `-s` selector resolution.
//!
//! The registry is a static input: it is built once by the embedding binary
//! (usually from generated tables) and only read by the engine.

use crate::context::{RunContext, Step};
use crate::errors::ClarError;

/// Signature shared by test bodies and suite setup/teardown hooks.
pub type TestFn = fn(&mut RunContext) -> Step;

/// A single named test callback.
#[derive(Debug, Clone, Copy)]
pub struct Test {
    pub name: &'static str,
    pub func: TestFn,
}

impl Test {
    pub const fn new(name: &'static str, func: TestFn) -> Self {
        Self { name, func }
    }
}

/// A named, ordered group of tests sharing setup/teardown and category tags.
#[derive(Debug, Clone)]
pub struct Suite {
    pub index: usize,
    pub name: &'static str,
    pub setup: Option<TestFn>,
    pub teardown: Option<TestFn>,
    pub categories: Vec<&'static str>,
    pub tests: Vec<Test>,
}

impl Suite {
    /// Starts a suite description. The index is assigned by [`SuiteRegistry`].
    pub fn new(name: &'static str) -> Self {
        Self {
            index: 0,
            name,
            setup: None,
            teardown: None,
            categories: Vec::new(),
            tests: Vec::new(),
        }
    }

    pub fn setup(mut self, func: TestFn) -> Self {
        self.setup = Some(func);
        self
    }

    pub fn teardown(mut self, func: TestFn) -> Self {
        self.teardown = Some(func);
        self
    }

    pub fn category(mut self, category: &'static str) -> Self {
        self.categories.push(category);
        self
    }

    pub fn test(mut self, name: &'static str, func: TestFn) -> Self {
        self.tests.push(Test::new(name, func));
        self
    }
}

/// The ordered set of suites known to this binary.
#[derive(Debug, Clone, Default)]
pub struct SuiteRegistry {
    suites: Vec<Suite>,
}

impl SuiteRegistry {
    /// Builds a registry, numbering suites in registration order.
    pub fn new(suites: Vec<Suite>) -> Self {
        let mut registry = Self::default();
        for suite in suites {
            registry.push(suite);
        }
        registry
    }

    pub fn push(&mut self, mut suite: Suite) {
        suite.index = self.suites.len();
        self.suites.push(suite);
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    pub fn get(&self, index: usize) -> Option<&Suite> {
        self.suites.get(index)
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// Total number of registered test callbacks across all suites.
    pub fn test_count(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }

    /// Suite names joined for the run-start banner.
    pub fn names(&self) -> String {
        self.suites
            .iter()
            .map(|s| s.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Resolves one selector to the suites it names, in registry order.
    pub fn select(&self, selector: &Selector) -> Result<Vec<&Suite>, ClarError> {
        let selected: Vec<&Suite> = match selector {
            Selector::Index(index) => {
                let suite = self
                    .get(*index)
                    .ok_or(ClarError::SuiteIndexOutOfRange { index: *index })?;
                vec![suite]
            }
            Selector::Prefix(prefix) => self
                .suites
                .iter()
                .filter(|s| s.name.starts_with(prefix.as_str()))
                .collect(),
            Selector::Exact(name) => self
                .suites
                .iter()
                .find(|s| s.name == name.as_str())
                .into_iter()
                .collect(),
        };

        if selected.is_empty() {
            return Err(ClarError::UnknownSuite {
                selector: selector.to_string(),
            });
        }
        Ok(selected)
    }
}

/// A parsed `-s` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// All digits: a suite index.
    Index(usize),
    /// No colon: every suite whose name starts with this text.
    Prefix(String),
    /// Contains a colon (`core::buffer`): the one suite with exactly this name.
    /// A selector ending in a colon is a prefix.
    Exact(String),
}

impl Selector {
    /// Parses the text after `-s` (an optional leading `=` is stripped).
    pub fn parse(raw: &str) -> Result<Self, ClarError> {
        let text = raw.strip_prefix('=').unwrap_or(raw);
        if text.is_empty() {
            return Err(ClarError::UnknownSuite {
                selector: String::new(),
            });
        }

        if text.bytes().all(|b| b.is_ascii_digit()) {
            // Overlong digit strings cannot name a real suite.
            let index = text.parse::<usize>().unwrap_or(usize::MAX);
            return Ok(Selector::Index(index));
        }

        // A trailing colon (`core::`) still selects by prefix.
        if text.contains(':') && !text.ends_with(':') {
            Ok(Selector::Exact(text.to_string()))
        } else {
            Ok(Selector::Prefix(text.to_string()))
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Index(index) => write!(f, "{index}"),
            Selector::Prefix(text) | Selector::Exact(text) => f.write_str(text),
        }
    }
}
