/// Recorder lifecycle: configuration, device connection and the start/stop state machine
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::{
    self, environment, ConfigOverrides, Configuration, TaskConfiguration, TaskOverrides,
};
use crate::delivery::{DeliveryGateway, Transport};
use crate::device::{self, Device, DeviceConnector, SharedDevice};
use crate::error::{ConfigurationError, RecorderError};
use crate::scheduler::cycle::{self, CycleContext};
use crate::scheduler::RetryPolicy;

/// Either stopped (initial) or running. While running with a task configured it owns
/// exactly one cycle task, which in turn has at most one pending wait.
pub struct Recorder {
    config: Arc<Configuration>,
    current_conditions: Option<TaskConfiguration>,
    device: SharedDevice,
    gateway: DeliveryGateway,
    retry: RetryPolicy,
    running: bool,
    cycle: Option<JoinHandle<()>>,
}

impl Recorder {
    /// Resolve the configuration and connect to the station.
    ///
    /// Configuration errors are raised before any connection attempt.
    pub async fn create(
        overrides: ConfigOverrides,
        use_environment: bool,
        connector: &dyn DeviceConnector,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RecorderError> {
        let config = config::resolve(overrides, use_environment)?;
        Self::connect(config, connector, transport).await
    }

    /// Connect to the station using an already resolved configuration
    pub async fn connect(
        config: Configuration,
        connector: &dyn DeviceConnector,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RecorderError> {
        let device = connector.connect(&config).await?;
        Ok(Self::with_device(config, device, transport))
    }

    /// Build a stopped recorder around a connected device
    pub fn with_device(
        config: Configuration,
        device: Box<dyn Device>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let gateway = DeliveryGateway::new(transport, &config);
        Self {
            config: Arc::new(config),
            current_conditions: None,
            device: device::shared(device),
            gateway,
            retry: RetryPolicy::default(),
            running: false,
            cycle: None,
        }
    }

    /// Replace the read retry policy (unbounded 1 s backoff by default)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cap concurrent in-flight deliveries (uncapped by default)
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.gateway = self.gateway.clone().with_max_in_flight(max);
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn current_conditions(&self) -> Option<TaskConfiguration> {
        self.current_conditions
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a cycle task is alive, i.e. a cycle is running or its next fire is armed
    pub fn has_pending_cycle(&self) -> bool {
        self.cycle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Configure the current-conditions task; `None` disables it.
    ///
    /// Takes effect on the next `start()`. On error the previous task configuration
    /// is kept.
    pub fn configure_current_conditions(
        &mut self,
        settings: Option<TaskOverrides>,
    ) -> Result<(), ConfigurationError> {
        self.configure_current_conditions_with(settings, &environment::process_env)
    }

    /// Same as [`Recorder::configure_current_conditions`] with an explicit environment
    pub fn configure_current_conditions_with(
        &mut self,
        settings: Option<TaskOverrides>,
        env: environment::EnvSource<'_>,
    ) -> Result<(), ConfigurationError> {
        let task = config::resolve_task(settings, env)?;
        match task {
            Some(task) => info!("Current conditions every {} s", task.interval_secs),
            None => info!("Current conditions disabled"),
        }
        if self.running {
            debug!("Recorder is running, task change applies after restart");
        }
        self.current_conditions = task;
        Ok(())
    }

    /// Stopped -> Running. The first cycle fires immediately.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;

        let task = match self.current_conditions {
            Some(task) => task,
            None => {
                warn!("Recorder started without any task configured");
                return;
            }
        };

        info!("Starting recorder");
        let ctx = CycleContext {
            device: Arc::clone(&self.device),
            gateway: self.gateway.clone(),
            retry: self.retry,
            task,
        };
        self.cycle = Some(tokio::spawn(cycle::run(ctx)));
    }

    /// Running -> Stopped. Cancels the pending cycle; in-flight deliveries continue.
    ///
    /// On a current-thread runtime, like the binary's, no further read or dispatch
    /// happens once this returns. On a multi-thread runtime the abort only lands at the
    /// cycle's next await point, so a cycle already being polled on another worker may
    /// still finish its read and dispatch.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        if let Some(handle) = self.cycle.take() {
            handle.abort();
        }
        info!("Recorder stopped");
    }

    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    /// Resolves only if the cycle task ends on its own, which means it panicked
    pub async fn fault(&mut self) -> String {
        let handle = match self.cycle.as_mut() {
            Some(handle) => handle,
            None => return std::future::pending().await,
        };

        let reason = match handle.await {
            Ok(()) => "cycle task exited".to_string(),
            Err(e) if e.is_panic() => format!("cycle task panicked: {}", e),
            Err(e) => format!("cycle task failed: {}", e),
        };
        self.cycle = None;
        reason
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(handle) = self.cycle.take() {
            handle.abort();
        }
    }
}
