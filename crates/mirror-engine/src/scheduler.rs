//! Fixed-order system scheduler.
//!
//! The [`Scheduler`] owns the [`Registry`] and an ordered list of systems.
//! Each tick:
//!
//! 1. Every active system's `update` runs in registration order, each getting
//!    exclusive access to the registry and the tick's `dt`.
//! 2. The tick counter and simulation time advance.
//!
//! Order is part of the contract: a system registered after another always
//! observes that system's writes from the same tick. Ticking is single
//! threaded and runs to completion; there is no suspension mid-tick.
//!
//! # Example
//!
//! ```
//! use mirror_engine::prelude::*;
//!
//! let mut scheduler = Scheduler::new(Registry::new(), TickConfig::default());
//! scheduler
//!     .add_fn_system("noop", |_registry, _dt| Ok(()))
//!     .unwrap();
//!
//! scheduler.start().unwrap();
//! scheduler.run_ticks(10).unwrap();
//! scheduler.shutdown();
//!
//! assert_eq!(scheduler.tick_count(), 10);
//! ```

use std::time::{Duration, Instant};

use mirror_ecs::registry::Registry;
use tracing::{debug, debug_span, info, trace, warn};

use crate::config::{ConfigError, EngineConfig, TickConfig};
use crate::system::{FnSystem, System, SystemError, SystemState};

// ---------------------------------------------------------------------------
// SchedulerError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler has not been started")]
    NotStarted,

    #[error("scheduler has been shut down")]
    ShutDown,

    #[error("duplicate system name: {0:?}")]
    DuplicateSystem(String),

    /// A system's `init` failed. It stays `Uninitialized`.
    #[error("system '{name}' failed to initialise")]
    Init {
        name: String,
        #[source]
        source: SystemError,
    },

    /// A system's `update` failed. The rest of the tick was skipped and the
    /// tick counter did not advance.
    #[error("system '{name}' failed on tick {tick}")]
    Update {
        name: String,
        tick: u64,
        #[source]
        source: SystemError,
    },
}

impl SchedulerError {
    /// Name of the system that failed, if this error came from one.
    pub fn system_name(&self) -> Option<&str> {
        match self {
            Self::Init { name, .. } | Self::Update { name, .. } => Some(name),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last completed tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system, in order of execution.
    pub system_times: Vec<(String, Duration)>,
    /// Total time for the tick.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

struct ScheduledSystem {
    /// Cached from `System::name` at registration.
    name: String,
    system: Box<dyn System>,
    state: SystemState,
}

/// Drives registered systems against a [`Registry`] once per tick.
///
/// Lifecycle: systems are added, [`start`](Self::start) initialises them,
/// [`tick`](Self::tick) updates them, [`shutdown`](Self::shutdown) ends
/// them. `tick` before `start` or after `shutdown` is an error.
pub struct Scheduler {
    registry: Registry,
    systems: Vec<ScheduledSystem>,
    config: TickConfig,
    lifecycle: Lifecycle,
    tick_counter: u64,
    /// Ticks that used the configured `fixed_dt`.
    fixed_ticks: u64,
    /// Sum of every host-supplied `dt`.
    host_time: f64,
    last_diagnostics: TickDiagnostics,
}

impl Scheduler {
    /// Create a scheduler over `registry`.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite. Use
    /// [`from_config`](Self::from_config) to get an error instead.
    pub fn new(registry: Registry, config: TickConfig) -> Self {
        assert!(
            config.validate().is_ok(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            registry,
            systems: Vec::new(),
            config,
            lifecycle: Lifecycle::Idle,
            tick_counter: 0,
            fixed_ticks: 0,
            host_time: 0.0,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Validate `config` and build a scheduler with a fresh registry.
    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(Registry::with_config(config.registry), config.tick))
    }

    // -- registration -------------------------------------------------------

    /// Append a system to the run order.
    ///
    /// If the scheduler is already running the system is initialised
    /// immediately; if that fails it is still registered but left
    /// `Uninitialized` and never updated.
    pub fn add_system(&mut self, system: Box<dyn System>) -> Result<(), SchedulerError> {
        if self.lifecycle == Lifecycle::Stopped {
            return Err(SchedulerError::ShutDown);
        }
        let name = system.name().to_owned();
        if self.systems.iter().any(|s| s.name == name) {
            return Err(SchedulerError::DuplicateSystem(name));
        }

        debug!(system = %name, position = self.systems.len(), "system registered");
        self.systems.push(ScheduledSystem {
            name,
            system,
            state: SystemState::Uninitialized,
        });

        if self.lifecycle == Lifecycle::Running {
            let last = self.systems.len() - 1;
            init_one(&mut self.systems[last], &mut self.registry)?;
        }
        Ok(())
    }

    /// Register a closure as a system. See [`FnSystem`].
    pub fn add_fn_system<F>(&mut self, name: &str, func: F) -> Result<(), SchedulerError>
    where
        F: FnMut(&mut Registry, f64) -> Result<(), SystemError> + 'static,
    {
        self.add_system(Box::new(FnSystem::new(name, func)))
    }

    // -- lifecycle ----------------------------------------------------------

    /// Initialise every not-yet-initialised system in registration order.
    ///
    /// Stops at the first failing `init`. Systems initialised before it stay
    /// initialised, and calling `start` again retries from the failed one.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        match self.lifecycle {
            Lifecycle::Stopped => return Err(SchedulerError::ShutDown),
            Lifecycle::Running => return Ok(()),
            Lifecycle::Idle => {}
        }

        for entry in &mut self.systems {
            if entry.state == SystemState::Uninitialized {
                init_one(entry, &mut self.registry)?;
            }
        }

        self.lifecycle = Lifecycle::Running;
        info!(systems = self.systems.len(), fixed_dt = self.config.fixed_dt, "scheduler started");
        Ok(())
    }

    /// Execute one tick using the configured `fixed_dt`.
    pub fn tick(&mut self) -> Result<(), SchedulerError> {
        self.run_tick(self.config.fixed_dt)?;
        self.fixed_ticks += 1;
        Ok(())
    }

    /// Execute one tick with a host-supplied `dt`, passed to every system
    /// unmodified.
    pub fn tick_with_dt(&mut self, dt: f64) -> Result<(), SchedulerError> {
        self.run_tick(dt)?;
        self.host_time += dt;
        Ok(())
    }

    /// Run `count` fixed ticks, stopping at the first error.
    pub fn run_ticks(&mut self, count: u64) -> Result<(), SchedulerError> {
        for _ in 0..count {
            self.tick()?;
        }
        Ok(())
    }

    /// Shut down every initialised system exactly once, in registration
    /// order. Later calls do nothing.
    ///
    /// Systems that were never initialised are marked `Shutdown` without
    /// being called.
    pub fn shutdown(&mut self) {
        if self.lifecycle == Lifecycle::Stopped {
            return;
        }

        for entry in &mut self.systems {
            if entry.state.is_active() {
                trace!(system = %entry.name, "shutdown");
                entry.system.shutdown(&mut self.registry);
            }
            entry.state = SystemState::Shutdown;
        }

        self.lifecycle = Lifecycle::Stopped;
        info!(ticks = self.tick_counter, "scheduler shut down");
    }

    fn run_tick(&mut self, dt: f64) -> Result<(), SchedulerError> {
        match self.lifecycle {
            Lifecycle::Idle => return Err(SchedulerError::NotStarted),
            Lifecycle::Stopped => return Err(SchedulerError::ShutDown),
            Lifecycle::Running => {}
        }

        let tick = self.tick_counter + 1;
        let span = debug_span!("tick", tick, dt);
        let _guard = span.enter();

        let tick_start = Instant::now();
        let mut system_times = Vec::with_capacity(self.systems.len());

        for entry in &mut self.systems {
            if !entry.state.is_active() {
                continue;
            }
            trace!(system = %entry.name, "update");
            let sys_start = Instant::now();
            if let Err(source) = entry.system.update(&mut self.registry, dt) {
                warn!(system = %entry.name, error = %source, "system update failed, tick aborted");
                return Err(SchedulerError::Update {
                    name: entry.name.clone(),
                    tick,
                    source,
                });
            }
            entry.state = SystemState::Updating;
            system_times.push((entry.name.clone(), sys_start.elapsed()));
        }

        self.tick_counter = tick;
        self.last_diagnostics = TickDiagnostics {
            system_times,
            total_time: tick_start.elapsed(),
        };
        Ok(())
    }

    // -- accessors ----------------------------------------------------------

    /// The number of ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulation time in seconds.
    ///
    /// Fixed ticks contribute `count * fixed_dt` (multiplied, not summed, to
    /// avoid drift); host-supplied `dt`s are summed.
    pub fn sim_time(&self) -> f64 {
        self.fixed_ticks as f64 * self.config.fixed_dt + self.host_time
    }

    pub fn fixed_dt(&self) -> f64 {
        self.config.fixed_dt
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the registry, for setup and inspection between
    /// ticks.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Consume the scheduler, shutting it down first, and hand back the
    /// registry.
    pub fn into_registry(mut self) -> Registry {
        self.shutdown();
        self.registry
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// The names of all registered systems, in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn system_state(&self, name: &str) -> Option<SystemState> {
        self.systems.iter().find(|s| s.name == name).map(|s| s.state)
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// Diagnostics from the last completed tick.
    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

fn init_one(entry: &mut ScheduledSystem, registry: &mut Registry) -> Result<(), SchedulerError> {
    trace!(system = %entry.name, "init");
    match entry.system.init(registry) {
        Ok(()) => {
            entry.state = SystemState::Initialized;
            Ok(())
        }
        Err(source) => {
            warn!(system = %entry.name, error = %source, "system init failed");
            Err(SchedulerError::Init {
                name: entry.name.clone(),
                source,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
