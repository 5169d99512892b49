//! # Bus configuration.
//!
//! Provides [`BusConfig`], settings applied to an [`EventBus`](crate::EventBus)
//! at construction time.
//!
//! ## Sentinel values
//! - `backlog_warn = 0` → backlog warnings disabled

/// Configuration for one bus instance.
///
/// ## Field semantics
/// - `backlog_warn`: per-subscription queue depth at which a warning is
///   logged (`0` = never warn)
///
/// ## Notes
/// Subscription queues are unbounded: a slow subscriber delays only itself
/// and never causes drops. The threshold exists to surface subscribers that
/// fall behind, not to shed load. Prefer the helper accessor over checking
/// the `0` sentinel at call sites.
#[derive(Clone, Copy, Debug)]
pub struct BusConfig {
    /// Queue depth at which a per-subscription backlog warning is emitted.
    ///
    /// - `0` = disabled
    /// - `n > 0` = one `warn` log line each time a queue climbs past `n`
    pub backlog_warn: usize,
}

impl BusConfig {
    /// Returns the backlog warning threshold as an `Option`.
    ///
    /// - `None` → warnings disabled
    /// - `Some(n)` → warn when a subscription's queue depth reaches `n`
    #[inline]
    pub fn backlog_threshold(&self) -> Option<usize> {
        if self.backlog_warn == 0 {
            None
        } else {
            Some(self.backlog_warn)
        }
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `backlog_warn = 1024` (a subscriber this far behind is worth a log line)
    fn default() -> Self {
        Self { backlog_warn: 1024 }
    }
}
