//! Mirror Engine -- system contract and fixed-order scheduler.
//!
//! This crate builds on [`mirror_ecs`] to provide the simulation driver: a
//! [`Scheduler`](scheduler::Scheduler) that owns the registry, initialises
//! systems once, updates them in registration order every tick and shuts
//! them down once.
//!
//! # Quick Start
//!
//! ```
//! use mirror_engine::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Score(u32);
//!
//! let mut scheduler = Scheduler::new(Registry::new(), TickConfig::default());
//! let player = scheduler.registry_mut().create_entity().unwrap();
//! scheduler.registry_mut().add_component(player, Score(0)).unwrap();
//!
//! scheduler
//!     .add_fn_system("score", |registry, _dt| {
//!         for (_, score) in registry.store::<Score>().iter_mut() {
//!             score.0 += 1;
//!         }
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! scheduler.start().unwrap();
//! scheduler.run_ticks(100).unwrap();
//! scheduler.shutdown();
//!
//! assert_eq!(scheduler.registry().get_component::<Score>(player), Ok(&Score(100)));
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod scheduler;
pub mod system;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use mirror_ecs;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the ECS prelude.
    pub use mirror_ecs::prelude::*;

    pub use crate::config::{ConfigError, EngineConfig, TickConfig};
    pub use crate::scheduler::{Scheduler, SchedulerError, TickDiagnostics};
    pub use crate::system::{FnSystem, System, SystemError, SystemState};
}
