//! Name-to-policy lookup for scheduling policies.

use super::{EasyBackfill, Fifo, Scheduler};
use crate::error::{CoreError, CoreResult};

type SchedulerBuilder = Box<dyn Fn() -> Box<dyn Scheduler> + Send + Sync>;

/// Ordered registry of scheduler builders.
///
/// Ordering is insertion order, so listing the registry is deterministic.
/// Registering an existing name replaces its builder in place.
pub struct SchedulerRegistry {
    entries: Vec<(String, SchedulerBuilder)>,
}

impl SchedulerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A registry with the built-in policies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("fifo", || Box::new(Fifo::new()));
        registry.register("easy-backfill", || Box::new(EasyBackfill::new()));
        registry
    }

    /// Register a builder under `name`, replacing any previous one.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        builder: impl Fn() -> Box<dyn Scheduler> + Send + Sync + 'static,
    ) {
        let name = name.into();
        let builder: SchedulerBuilder = Box::new(builder);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = builder,
            None => self.entries.push((name, builder)),
        }
    }

    /// Build a fresh scheduler instance by name.
    pub fn resolve(&self, name: &str) -> CoreResult<Box<dyn Scheduler>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, builder)| builder())
            .ok_or_else(|| CoreError::UnknownScheduler(name.to_string()))
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve() {
        let registry = SchedulerRegistry::with_builtins();
        assert_eq!(registry.resolve("fifo").unwrap().name(), "fifo");
        assert_eq!(
            registry.resolve("easy-backfill").unwrap().name(),
            "easy-backfill"
        );
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["fifo", "easy-backfill"]);
    }

    #[test]
    fn test_unknown_name_errors() {
        let registry = SchedulerRegistry::with_builtins();
        assert!(matches!(
            registry.resolve("slurm"),
            Err(CoreError::UnknownScheduler(_))
        ));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = SchedulerRegistry::with_builtins();
        registry.register("fifo", || Box::new(Fifo::new().with_queue_depth(1)));
        let scheduler = registry.resolve("fifo").unwrap();
        assert_eq!(scheduler.queue_depth(), Some(1));
        // Still exactly one "fifo" entry.
        assert_eq!(registry.names().filter(|n| *n == "fifo").count(), 1);
    }
}
