use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::ConfigError;
use crate::context::WorkerContext;

pub type HookResult = anyhow::Result<()>;

/// A workload run by one worker.
///
/// The coordinator creates one instance per worker. Instances of the same run may share state
/// handed to them by their [ScenarioFactory], e.g. an atomic key generator.
///
/// An error returned from [Scenario::iterate] is recoverable if a
/// [replibench_core::prelude::DbError] appears in its chain. The iteration is counted as failed and
/// the worker continues. Any other error stops the worker.
pub trait Scenario: Send {
    /// Read the configuration. Called on every instance before any worker starts.
    fn initialize(&mut self, ctx: &WorkerContext) -> HookResult;

    /// Called once, on worker 0's instance, before any worker runs [Scenario::prepare].
    ///
    /// Typically creates and populates the tables shared by every worker.
    fn global_prepare(&mut self) -> HookResult {
        Ok(())
    }

    /// Per worker setup, run on the worker's own thread. Usually opens the worker's connection.
    fn prepare(&mut self) -> HookResult;

    /// One unit of work. `iteration` starts at 1.
    fn iterate(&mut self, iteration: u64) -> HookResult;

    /// Per worker teardown. Errors are logged.
    fn cleanup(&mut self) -> HookResult;

    /// Called once, on worker 0's instance, after every worker has cleaned up. Errors are logged.
    fn global_cleanup(&mut self) -> HookResult {
        Ok(())
    }
}

/// Creates the scenario instances for one run.
pub trait ScenarioFactory: Send + Sync {
    fn instantiate(&self, workers: usize) -> Vec<Box<dyn Scenario>>;
}

/// A closure taking the worker index builds one instance per worker.
impl<F> ScenarioFactory for F
where
    F: Fn(usize) -> Box<dyn Scenario> + Send + Sync,
{
    fn instantiate(&self, workers: usize) -> Vec<Box<dyn Scenario>> {
        (0..workers).map(self).collect()
    }
}

/// Maps scenario names, as used by the `scenario` configuration key, to factories.
#[derive(Clone, Default)]
pub struct ScenarioRegistry {
    factories: BTreeMap<String, Arc<dyn ScenarioFactory>>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl ScenarioFactory + 'static,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(ConfigError::DuplicateScenario(name));
        }
        log::debug!("Registering scenario: {name}");
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Builder style [ScenarioRegistry::register].
    ///
    /// # Panics
    /// If a scenario with the same name is already registered.
    pub fn with_scenario(
        mut self,
        name: impl Into<String>,
        factory: impl ScenarioFactory + 'static,
    ) -> Self {
        let name = name.into();
        if let Err(e) = self.register(name.clone(), factory) {
            panic!("Cannot register scenario {name}: {e}");
        }
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ScenarioFactory>, ConfigError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownScenario(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Debug for ScenarioRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Noop;

    impl Scenario for Noop {
        fn initialize(&mut self, _ctx: &WorkerContext) -> HookResult {
            Ok(())
        }

        fn prepare(&mut self) -> HookResult {
            Ok(())
        }

        fn iterate(&mut self, _iteration: u64) -> HookResult {
            Ok(())
        }

        fn cleanup(&mut self) -> HookResult {
            Ok(())
        }
    }

    fn noop(_worker: usize) -> Box<dyn Scenario> {
        Box::new(Noop)
    }

    #[test]
    fn closure_factory_builds_one_instance_per_worker() {
        assert_eq!(3, noop.instantiate(3).len());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = ScenarioRegistry::new();
        registry.register("noop", noop).unwrap();
        assert!(matches!(
            registry.register("noop", noop),
            Err(ConfigError::DuplicateScenario(_))
        ));
    }

    #[test]
    fn unknown_name() {
        let registry = ScenarioRegistry::new().with_scenario("noop", noop);
        assert!(registry.get("noop").is_ok());
        assert!(matches!(
            registry.get("other"),
            Err(ConfigError::UnknownScenario(_))
        ));
        assert_eq!(vec!["noop"], registry.names().collect::<Vec<_>>());
    }
}
