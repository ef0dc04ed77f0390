//! Component type identity.
//!
//! Any `Send + Sync + 'static` type can be stored as a component; there is no
//! registration step required for storage. [`ComponentTypeId`] is the key the
//! [`Registry`](crate::registry::Registry) uses to find the one store that
//! exists per component type.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker for types that can live in a component store.
///
/// Blanket-implemented; the bounds are what the registry needs to stay
/// `Send + Sync` and to hand stores out as `dyn Any`.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Runtime identity of a component type: its `TypeId` plus the Rust type
/// name for diagnostics and error messages.
#[derive(Clone, Copy)]
pub struct ComponentTypeId {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentTypeId {
    /// The id for component type `T`.
    #[inline]
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying Rust `TypeId`.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified Rust type name (e.g. `"game::Position"`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type name without its module path (e.g. `"Position"`).
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }
}

// Identity is the TypeId alone; the name is derived from it.
impl PartialEq for ComponentTypeId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentTypeId {}

impl Hash for ComponentTypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.short_name())
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Strip the module path from a `type_name` result, keeping generics intact
/// (`"a::b::Wrapper<c::D>"` -> `"Wrapper<c::D>"`).
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
