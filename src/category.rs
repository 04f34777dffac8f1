//! Category-based suite filtering (`-i<category>`).

use crate::suite::Suite;

/// Category enabled when nothing else was asked for; uncategorized suites
/// belong to it.
pub const DEFAULT_CATEGORY: &str = "default";

/// Keyword for `-iall`.
pub const ALL_CATEGORIES: &str = "all";

/// The set of enabled categories. Names compare ASCII case-insensitively.
///
/// A plain `Vec` with linear lookups: suites declare a handful of
/// categories at most.
#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    enabled: Vec<String>,
}

impl CategoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.enabled
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }

    /// Adds `category` unless an equal (ignoring case) name is already there.
    pub fn enable(&mut self, category: &str) {
        if !self.contains(category) {
            self.enabled.push(category.to_string());
        }
    }

    /// Enables the default category plus every category any suite declares.
    pub fn enable_all<'a>(&mut self, suites: impl IntoIterator<Item = &'a Suite>) {
        self.enable(DEFAULT_CATEGORY);
        for suite in suites {
            for category in &suite.categories {
                self.enable(category);
            }
        }
    }

    /// Decides whether `suite` runs. An empty set means "default only".
    pub fn is_enabled(&mut self, suite: &Suite) -> bool {
        if self.enabled.is_empty() {
            self.enable(DEFAULT_CATEGORY);
        }

        if suite.categories.is_empty() {
            return self.contains(DEFAULT_CATEGORY);
        }
        suite.categories.iter().any(|c| self.contains(c))
    }

    /// Enabled names, reverse case-insensitive order, each behind `prefix`.
    pub fn list_enabled(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<&String> = self.enabled.iter().collect();
        names.sort_by(|a, b| b.to_ascii_lowercase().cmp(&a.to_ascii_lowercase()));
        names
            .into_iter()
            .map(|name| format!("{prefix}{name}"))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}
