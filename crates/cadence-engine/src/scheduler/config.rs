/// What the scheduler does when a frame callback panics.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum PanicPolicy {
    /// Log the panic and keep running the remaining callbacks of the tick.
    /// The panicking callback stays registered.
    #[default]
    Isolate,
    /// Stop the scheduler and resume unwinding out of the tick.
    Propagate,
}

/// Scheduler configuration.
///
/// `label` prefixes the scheduler's log lines so several schedulers in one
/// process can be told apart.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub label: String,
    pub panic_policy: PanicPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            label: "scheduler".to_string(),
            panic_policy: PanicPolicy::default(),
        }
    }
}
