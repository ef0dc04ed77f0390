//! The per-tick logic contract.
//!
//! A [`System`] is driven through `init` → `update`* → `shutdown` by the
//! [`Scheduler`](crate::scheduler::Scheduler). Systems never track their own
//! lifecycle; the scheduler records a [`SystemState`] for each one and is the
//! only caller of these methods.

use std::fmt;

use mirror_ecs::registry::Registry;
use mirror_ecs::EcsError;

// ---------------------------------------------------------------------------
// SystemError
// ---------------------------------------------------------------------------

/// Failure reported by a system's `init` or `update`.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// A registry or store operation failed.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// Any other failure, described by the system.
    #[error("{0}")]
    Failed(String),
}

impl SystemError {
    /// Free-form failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

// ---------------------------------------------------------------------------
// SystemState
// ---------------------------------------------------------------------------

/// Where a system is in its lifecycle.
///
/// Transitions only ever move forward:
/// `Uninitialized → Initialized → Updating → Shutdown`. A system that never
/// received an update goes straight from `Initialized` to `Shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemState {
    /// Registered, `init` not yet called (or it failed).
    Uninitialized,
    /// `init` succeeded; no update has run yet.
    Initialized,
    /// At least one `update` has run.
    Updating,
    /// `shutdown` has run. No further calls happen.
    Shutdown,
}

impl SystemState {
    /// Whether the scheduler will still call `update` on a system in this
    /// state.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Initialized | Self::Updating)
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Updating => "updating",
            Self::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A unit of per-tick logic operating on the [`Registry`].
///
/// Only `name` and `update` are required. `dt` is the elapsed time the host
/// supplied for this tick, passed through unmodified.
pub trait System {
    /// Unique name within a scheduler. Used in errors, logs and diagnostics.
    fn name(&self) -> &str;

    /// Called exactly once before the first `update`.
    fn init(&mut self, _registry: &mut Registry) -> Result<(), SystemError> {
        Ok(())
    }

    /// Called once per tick while the system is active.
    fn update(&mut self, registry: &mut Registry, dt: f64) -> Result<(), SystemError>;

    /// Called exactly once, after which the system is never called again.
    fn shutdown(&mut self, _registry: &mut Registry) {}
}

// ---------------------------------------------------------------------------
// FnSystem
// ---------------------------------------------------------------------------

/// A [`System`] built from a name and an update closure, with no-op `init`
/// and `shutdown`.
pub struct FnSystem<F> {
    name: String,
    func: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut Registry, f64) -> Result<(), SystemError>,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut Registry, f64) -> Result<(), SystemError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, registry: &mut Registry, dt: f64) -> Result<(), SystemError> {
        (self.func)(registry, dt)
    }
}

impl<F> fmt::Debug for FnSystem<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSystem").field("name", &self.name).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
