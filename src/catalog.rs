//! Registry of configured chargers
//!
//! The catalog is owned by whoever composes the application; there is no
//! process-wide instance. Each device name maps to exactly one adapter and
//! one coordinator.

use crate::adapter::DeviceAdapter;
use crate::commands::{ChargerCommand, CommandRequest, ValueResolver};
use crate::config::{ChargerConfig, Config, MIN_POLL_INTERVAL};
use crate::coordinator::RefreshCoordinator;
use crate::error::{GoeError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::transport::TransportFactory;
use std::collections::HashMap;
use std::sync::Arc;

/// One registered charger
#[derive(Debug)]
pub struct ChargerHandle {
    config: ChargerConfig,
    coordinator: Arc<RefreshCoordinator>,
}

impl ChargerHandle {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ChargerConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<DeviceAdapter> {
        self.coordinator.adapter()
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }
}

pub struct ChargerCatalog {
    factory: Arc<dyn TransportFactory>,
    chargers: HashMap<String, ChargerHandle>,
    logger: StructuredLogger,
}

impl ChargerCatalog {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            chargers: HashMap::new(),
            logger: get_logger("catalog"),
        }
    }

    /// Build a catalog holding every charger in `config`
    pub async fn from_config(config: &Config, factory: Arc<dyn TransportFactory>) -> Result<Self> {
        let mut catalog = Self::new(factory);
        for charger in &config.chargers {
            catalog.register(charger.clone()).await?;
        }
        Ok(catalog)
    }

    /// Set up a charger: build its adapter, run the first refresh and start
    /// polling.
    ///
    /// Fails on a taken name or an unknown protocol. A failing first
    /// refresh is logged and the charger stays registered with an empty
    /// snapshot until a later poll succeeds.
    pub async fn register(&mut self, config: ChargerConfig) -> Result<Arc<RefreshCoordinator>> {
        if self.chargers.contains_key(&config.name) {
            return Err(GoeError::duplicate_device(config.name.as_str()));
        }
        let adapter = Arc::new(DeviceAdapter::from_config(&config, self.factory.as_ref())?);
        let coordinator = Arc::new(RefreshCoordinator::new(&config.name, adapter));

        coordinator.poll_once().await;

        if config.poll_interval_seconds < MIN_POLL_INTERVAL.as_secs() {
            self.logger.warn(&format!(
                "Poll interval {}s for '{}' is below the minimum, using {}s",
                config.poll_interval_seconds,
                config.name,
                MIN_POLL_INTERVAL.as_secs()
            ));
        }
        coordinator.start(config.poll_interval());

        self.logger.info(&format!(
            "Registered charger '{}' at {} (API {})",
            config.name,
            config.host,
            coordinator.adapter().protocol_version()
        ));
        self.chargers.insert(
            config.name.clone(),
            ChargerHandle {
                config,
                coordinator: Arc::clone(&coordinator),
            },
        );
        Ok(coordinator)
    }

    pub fn get(&self, name: &str) -> Result<&ChargerHandle> {
        self.chargers
            .get(name)
            .ok_or_else(|| GoeError::unknown_device(name))
    }

    pub fn coordinator(&self, name: &str) -> Result<Arc<RefreshCoordinator>> {
        self.get(name).map(|h| Arc::clone(&h.coordinator))
    }

    /// Unregister a charger and stop its polling
    pub fn remove(&mut self, name: &str) -> Result<ChargerHandle> {
        let handle = self
            .chargers
            .remove(name)
            .ok_or_else(|| GoeError::unknown_device(name))?;
        handle.coordinator.stop();
        self.logger.info(&format!("Removed charger '{}'", name));
        Ok(handle)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.chargers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.chargers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chargers.is_empty()
    }

    pub fn start_all(&self) {
        for handle in self.chargers.values() {
            handle.coordinator.start(handle.config.poll_interval());
        }
    }

    pub fn stop_all(&self) {
        for handle in self.chargers.values() {
            handle.coordinator.stop();
        }
    }

    /// Resolve a command request and run it on its target.
    ///
    /// Without a device name the command goes to every registered charger.
    /// All targets are attempted; the first failure is returned after the
    /// rest have run.
    pub async fn dispatch(
        &self,
        request: &CommandRequest,
        resolver: &dyn ValueResolver,
    ) -> Result<Vec<(String, ChargerCommand)>> {
        let targets: Vec<&ChargerHandle> = match &request.device {
            Some(name) => vec![self.get(name)?],
            None => {
                let mut all: Vec<&ChargerHandle> = self.chargers.values().collect();
                all.sort_by(|a, b| a.name().cmp(b.name()));
                all
            }
        };
        let command = request.resolve(resolver)?;

        let mut applied = Vec::with_capacity(targets.len());
        let mut first_error = None;
        for handle in targets {
            match handle.coordinator.execute(command).await {
                Ok(sent) => applied.push((handle.name().to_string(), sent)),
                Err(e) => {
                    self.logger.error(&format!(
                        "{} failed on '{}': {}",
                        request.kind,
                        handle.name(),
                        e
                    ));
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(applied),
        }
    }
}

impl std::fmt::Debug for ChargerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargerCatalog")
            .field("chargers", &self.names())
            .finish()
    }
}
