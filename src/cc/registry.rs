//! The context table (§5, §9): a `Mutex<SlotMap<ContextId, Context>>` held
//! by the caller, mutated only by create/release. Callers must not race
//! create/release with other calls on the same context — the mutex
//! serializes the table itself, not operations on an individual context.

use slotmap::SlotMap;
use std::sync::Mutex;

use crate::debug::DebugSink;
use crate::ComponentId;
use crate::ContextId;

use super::query::{component_data, connected_components, ComponentTypeMask, DataKind};
use super::ConnectedComponent;
use crate::error::CutError;

/// One dispatch context: its published connected components plus the
/// debug-message sink registered for it (§4.I).
#[derive(Default)]
pub struct Context {
    pub components: SlotMap<ComponentId, ConnectedComponent>,
    pub debug_sink: DebugSink,
}

impl Context {
    pub fn publish(&mut self, cc: ConnectedComponent) -> ComponentId {
        self.components.insert(cc)
    }

    pub fn release(&mut self, handles: &[ComponentId]) {
        for handle in handles {
            self.components.remove(*handle);
        }
    }

    /// `connected_components(type_mask)` (§4.H).
    pub fn connected_components(&self, type_mask: ComponentTypeMask) -> Vec<ComponentId> {
        connected_components(&self.components, type_mask)
    }

    /// `component_data(handle, kind, byte_limit)` (§4.H).
    pub fn component_data(
        &self,
        handle: ComponentId,
        kind: DataKind,
        byte_limit: Option<usize>,
    ) -> Result<Vec<u8>, CutError> {
        let cc = self
            .components
            .get(handle)
            .ok_or_else(|| CutError::invalid_argument("unknown connected-component handle"))?;
        component_data(cc, kind, byte_limit)
    }
}

/// The global context table. The crate exposes this value directly rather
/// than a process-wide `static` with a C-style handle surface layered on
/// top (§9 design note) — callers own a `Registry` and hand out `ContextId`s
/// from it.
#[derive(Default)]
pub struct Registry {
    contexts: Mutex<SlotMap<ContextId, Context>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_context(&self) -> ContextId {
        self.contexts.lock().unwrap().insert(Context::default())
    }

    pub fn release_context(&self, context: ContextId) {
        self.contexts.lock().unwrap().remove(context);
    }

    /// Runs `f` against the named context, if it still exists.
    pub fn with_context<R>(&self, context: ContextId, f: impl FnOnce(&mut Context) -> R) -> Option<R> {
        self.contexts.lock().unwrap().get_mut(context).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_context_is_queryable_until_released() {
        let registry = Registry::new();
        let ctx = registry.create_context();

        assert!(registry.with_context(ctx, |c| c.components.len()).is_some());

        registry.release_context(ctx);
        assert!(registry.with_context(ctx, |c| c.components.len()).is_none());
    }

    #[test]
    fn release_connected_components_drops_only_named_handles() {
        use crate::cc::{ComponentVariant, ConnectedComponent, Origin};
        use crate::mesh::HalfedgeMesh;
        use std::sync::Arc;

        let registry = Registry::new();
        let ctx = registry.create_context();

        let (a, b) = registry
            .with_context(ctx, |c| {
                let a = c.publish(ConnectedComponent::new(
                    HalfedgeMesh::new(),
                    ComponentVariant::Input {
                        origin: Origin::SrcMesh,
                    },
                    Arc::new(super::super::Provenance::default()),
                ));
                let b = c.publish(ConnectedComponent::new(
                    HalfedgeMesh::new(),
                    ComponentVariant::Input {
                        origin: Origin::CutMesh,
                    },
                    Arc::new(super::super::Provenance::default()),
                ));
                (a, b)
            })
            .unwrap();

        registry.with_context(ctx, |c| c.release(&[a])).unwrap();

        let remaining = registry.with_context(ctx, |c| c.components.len()).unwrap();
        assert_eq!(remaining, 1);
        assert!(registry
            .with_context(ctx, |c| c.components.contains_key(b))
            .unwrap());
    }
}
