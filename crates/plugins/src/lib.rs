//! Built-in plugins for the report pipeline.
//!
//! Implements the [`pipeline`] plugin ports for the capabilities every
//! installation ships with:
//!
//! | Registry | Key | Plugin |
//! |----------|-----|--------|
//! | data | `string` (`inline`) | [`InlineData`] |
//! | data | `file` | [`FileData`] |
//! | data | `http` | [`HttpData`] |
//! | data | `glob` | [`GlobData`] |
//! | render | `json` | [`JsonRender`] |
//! | action | `file_output` | [`FileOutput`] |
//! | enhance | `template` | [`TemplateEnhance`] |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All filesystem and network I/O lives here. Connection
//! handles are owned by the [`ResourcePool`], which the composition root
//! creates once and closes at shutdown.

pub mod actions;
pub mod enhance;
pub mod pool;
pub mod render;
pub mod sources;

use std::sync::Arc;

use pipeline::{
    ActionType, PluginDescriptor, PluginName, PluginPhase, Registries, RegistryError, RenderMode,
    SourceKind,
};

pub use actions::FileOutput;
pub use enhance::TemplateEnhance;
pub use pool::ResourcePool;
pub use render::JsonRender;
pub use sources::{FileData, GlobData, HttpData, InlineData};

/// Contract range declared by every built-in plugin.
const COMPATIBLE_CONTRACTS: &str = "^1.0.0";

fn descriptor(name: &'static str, phase: PluginPhase) -> PluginDescriptor {
    PluginDescriptor {
        name: PluginName::from_static(name),
        version: env!("CARGO_PKG_VERSION").to_string(),
        compatible_contracts: COMPATIBLE_CONTRACTS.to_string(),
        phase,
    }
}

/// Registers every built-in plugin. Registries must not be locked yet.
pub fn register_builtins(
    registries: &mut Registries,
    pool: Arc<ResourcePool>,
) -> Result<(), RegistryError> {
    registries
        .data
        .register(SourceKind::Inline, Arc::new(InlineData::new()))?;
    registries
        .data
        .register(SourceKind::File, Arc::new(FileData::new()))?;
    registries
        .data
        .register(SourceKind::Http, Arc::new(HttpData::new(pool)))?;
    registries
        .data
        .register(SourceKind::Glob, Arc::new(GlobData::new()))?;
    registries
        .render
        .register(RenderMode::json(), Arc::new(JsonRender::new()))?;
    registries.action.register(
        ActionType::from_static(actions::FILE_OUTPUT),
        Arc::new(FileOutput::new()),
    )?;
    registries.enhance.register(
        PluginName::from_static(enhance::TEMPLATE),
        Arc::new(TemplateEnhance::new()),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pipeline::CONTRACTS_VERSION;

    use super::*;

    #[test]
    fn builtins_cover_every_source_kind() {
        let mut registries = Registries::new(CONTRACTS_VERSION);
        register_builtins(&mut registries, Arc::new(ResourcePool::new())).unwrap();

        let kinds = [SourceKind::Inline, SourceKind::File, SourceKind::Http, SourceKind::Glob];
        for kind in kinds {
            assert!(registries.data.has(&kind), "{kind} not served");
        }
        assert!(registries.render.has(&RenderMode::json()));
        assert!(registries.action.has(&ActionType::from_static("file_output")));
        assert_eq!(registries.enhance.size(), 1);
    }

    #[test]
    fn builtins_are_rejected_by_an_incompatible_contract() {
        let mut registries = Registries::new(pipeline::Version::new(2, 0, 0));
        let err = register_builtins(&mut registries, Arc::new(ResourcePool::new())).unwrap_err();
        assert!(matches!(err, RegistryError::PluginIncompatible { .. }));
    }

    #[test]
    fn builtins_cannot_be_registered_after_lock() {
        let mut registries = Registries::new(CONTRACTS_VERSION);
        registries.lock_all();
        let err = register_builtins(&mut registries, Arc::new(ResourcePool::new())).unwrap_err();
        assert!(matches!(err, RegistryError::Locked { .. }));
    }
}
