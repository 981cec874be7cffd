//! Process and job span helpers.

use tracing::{Span, span::Entered};
use uuid::Uuid;

use crate::init::build_sha;

/// Guard that keeps the process-level span entered for its lifetime.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the process span tagged with `command` and the build SHA.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("ferry", command = %command, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Span wrapping a single background job.
#[must_use]
pub fn job_span(job_id: Uuid, kind: &'static str) -> Span {
    tracing::info_span!("job", job_id = %job_id, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_context_guard_enters_and_drops() {
        let guard = GlobalContextGuard::new("test");
        drop(guard);
    }

    #[test]
    fn job_span_can_be_entered() {
        let span = job_span(Uuid::new_v4(), "fetch");
        let _entered = span.enter();
    }
}
