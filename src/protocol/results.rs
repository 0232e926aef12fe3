//! Test case results.
//!
//! A [`TestResults`] carries either a map of harvested cases or an error
//! string, never both. A [`TestCase`] distinguishes "not applicable"
//! (`null`) from "empty output" (`""`).

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// Harvested cases keyed by the label of their result tab.
pub type TestCases = BTreeMap<String, TestCase>;

// ============================================================================
// TestResults
// ============================================================================

/// Outcome of a run or submit.
///
/// Exactly one of `cases` and `error` is present. Deserializing a value
/// that violates this fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTestResults")]
pub struct TestResults {
    cases: Option<TestCases>,
    error: Option<String>,
}

/// Unvalidated wire shape of [`TestResults`].
#[derive(Deserialize)]
struct RawTestResults {
    #[serde(default)]
    cases: Option<TestCases>,
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<RawTestResults> for TestResults {
    type Error = String;

    fn try_from(raw: RawTestResults) -> Result<Self, Self::Error> {
        match (raw.cases, raw.error) {
            (Some(cases), None) => Ok(Self::from_cases(cases)),
            (None, Some(error)) => Ok(Self::from_error(error)),
            (Some(_), Some(_)) => Err("testResults carries both cases and error".to_string()),
            (None, None) => Err("testResults carries neither cases nor error".to_string()),
        }
    }
}

impl TestResults {
    /// Creates a successful result.
    #[inline]
    #[must_use]
    pub fn from_cases(cases: TestCases) -> Self {
        Self {
            cases: Some(cases),
            error: None,
        }
    }

    /// Creates a failed result.
    #[inline]
    #[must_use]
    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            cases: None,
            error: Some(error.into()),
        }
    }

    /// Returns the harvested cases, if the harvest succeeded.
    #[inline]
    #[must_use]
    pub fn cases(&self) -> Option<&TestCases> {
        self.cases.as_ref()
    }

    /// Returns the error, if the harvest failed.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns `true` when the harvest succeeded but found no cases.
    ///
    /// Judges show no tabs when everything passed, so callers should read
    /// this as "likely passed", not as failure.
    #[inline]
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        self.cases.as_ref().is_some_and(BTreeMap::is_empty)
    }
}

// ============================================================================
// TestCase
// ============================================================================

/// A single test case and its result.
///
/// Present fields are trimmed. A case with `error` set never carries
/// `output` or `expected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Input fed to the program.
    pub input: String,
    /// Program output, if the program ran.
    pub output: Option<String>,
    /// Expected output, if known.
    pub expected: Option<String>,
    /// Compile or runtime error text.
    pub error: Option<String>,
}

impl TestCase {
    /// Creates a case for a program that executed.
    #[must_use]
    pub fn executed(input: &str, output: Option<&str>, expected: Option<&str>) -> Self {
        Self {
            input: input.trim().to_string(),
            output: output.map(|s| s.trim().to_string()),
            expected: expected.map(|s| s.trim().to_string()),
            error: None,
        }
    }

    /// Creates a case for a program that failed to compile or crashed.
    #[must_use]
    pub fn error(input: &str, error: &str) -> Self {
        Self {
            input: input.trim().to_string(),
            output: None,
            expected: None,
            error: Some(error.trim().to_string()),
        }
    }

    /// Returns `true` if this case reports a compile or runtime failure.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns `true` if output and expected are both known and equal.
    #[must_use]
    pub fn is_match(&self) -> bool {
        match (&self.output, &self.expected) {
            (Some(output), Some(expected)) => !self.is_error() && output == expected,
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
