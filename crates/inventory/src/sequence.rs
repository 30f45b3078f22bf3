//! Sequence-number service contract.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use slabtrace_core::{DomainError, DomainResult};

/// How values of one sequence code are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDefinition {
    pub prefix: String,
    /// Minimum number of digits; shorter numbers are zero-padded.
    pub padding: usize,
}

impl SequenceDefinition {
    pub fn render(&self, number: u64) -> String {
        format!("{}{:0width$}", self.prefix, number, width = self.padding)
    }
}

/// Host sequence-number service.
///
/// `next` must be atomic per code: two concurrent callers never receive the
/// same value. Unseen codes are registered with `definition` on first use.
pub trait SequenceService: Send + Sync {
    fn next(&self, code: &str, definition: &SequenceDefinition) -> DomainResult<String>;
}

impl<S> SequenceService for Arc<S>
where
    S: SequenceService + ?Sized,
{
    fn next(&self, code: &str, definition: &SequenceDefinition) -> DomainResult<String> {
        (**self).next(code, definition)
    }
}

#[derive(Debug)]
struct Counter {
    definition: SequenceDefinition,
    last: u64,
}

/// In-memory sequence service for tests/dev.
///
/// A single mutex serializes every increment, which is stricter than the
/// per-code row lock a database would take.
#[derive(Debug, Default)]
pub struct InMemorySequences {
    counters: Mutex<HashMap<String, Counter>>,
}

impl InMemorySequences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value handed out for `code` (0 when unseen).
    pub fn current(&self, code: &str) -> u64 {
        self.counters
            .lock()
            .map(|counters| counters.get(code).map_or(0, |c| c.last))
            .unwrap_or(0)
    }
}

impl SequenceService for InMemorySequences {
    fn next(&self, code: &str, definition: &SequenceDefinition) -> DomainResult<String> {
        if code.trim().is_empty() {
            return Err(DomainError::validation("sequence code cannot be empty"));
        }

        let mut counters = self
            .counters
            .lock()
            .map_err(|_| DomainError::conflict("sequence counters are poisoned"))?;

        let counter = counters.entry(code.to_string()).or_insert_with(|| {
            tracing::info!(code, prefix = %definition.prefix, "registered sequence");
            Counter {
                definition: definition.clone(),
                last: 0,
            }
        });
        counter.last += 1;
        Ok(counter.definition.render(counter.last))
    }
}
