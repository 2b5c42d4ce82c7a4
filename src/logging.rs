//! Tracing setup and the per-component log context.

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over `level`.
///
/// Only the binary calls this; library code never touches subscriber state.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Context handed explicitly to each component that logs.
///
/// Suffixes are appended to every event the component emits, through a span
/// field, so two runs against different sources can be told apart.
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    suffix: Vec<String>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this context with one more suffix.
    pub fn with_suffix(&self, suffix: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.suffix.push(suffix.into());
        next
    }

    pub fn suffix(&self) -> &[String] {
        &self.suffix
    }

    /// Formats `msg` with the suffixes, `msg | a | b`.
    pub fn decorate(&self, msg: &str) -> String {
        if self.suffix.is_empty() {
            msg.to_string()
        } else {
            format!("{} | {}", msg, self.suffix.join(" | "))
        }
    }

    /// A span for `component` carrying the joined suffixes.
    pub fn span(&self, component: &'static str) -> tracing::Span {
        tracing::info_span!("toolkit", component, suffix = %self.suffix.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decorate_without_suffix() {
        assert_eq!(LogContext::new().decorate("loaded"), "loaded");
    }

    #[test]
    fn test_decorate_with_suffixes() {
        let ctx = LogContext::new().with_suffix("run-1").with_suffix("leads.csv");
        assert_eq!(ctx.decorate("loaded"), "loaded | run-1 | leads.csv");
        assert_eq!(ctx.suffix().len(), 2);
    }
}
