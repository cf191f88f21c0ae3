//! Versioned, lock-once plugin registries.
//!
//! A [`Registry`] binds capability keys to plugin implementations. It accepts
//! registrations until [`Registry::lock`] is called; from then on it is
//! read-only and can be shared freely behind an `Arc`.
//!
//! Registration checks run in a fixed order: lock state, duplicate key,
//! expected phase, then the version gate. The first failing check wins and
//! leaves the registry unchanged.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use tracing::debug;

use crate::errors::RegistryError;
use crate::plugin::{ActionPlugin, DataPlugin, EnhancePlugin, Plugin, PluginDescriptor, RenderPlugin};
use crate::version::{Version, VersionGate};
use crate::{ActionType, PluginName, PluginPhase, RenderMode, SourceKind};

/// Keyed plugin store for one subsystem.
pub struct Registry<K, P: ?Sized> {
    name: &'static str,
    gate: VersionGate,
    expected_phase: Option<PluginPhase>,
    entries: Vec<(K, Arc<P>)>,
    index: HashMap<K, usize>,
    locked: bool,
}

impl<K, P> Registry<K, P>
where
    K: Clone + Eq + Hash + fmt::Display,
    P: ?Sized + Plugin,
{
    pub fn new(name: &'static str, gate: VersionGate, expected_phase: Option<PluginPhase>) -> Self {
        Self {
            name,
            gate,
            expected_phase,
            entries: Vec::new(),
            index: HashMap::new(),
            locked: false,
        }
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Installs `plugin` under `key`.
    pub fn register(&mut self, key: K, plugin: Arc<P>) -> Result<(), RegistryError> {
        if self.locked {
            return Err(RegistryError::Locked {
                registry: self.name.to_string(),
            });
        }
        if self.index.contains_key(&key) {
            return Err(RegistryError::DuplicatePlugin {
                registry: self.name.to_string(),
                key: key.to_string(),
            });
        }

        let descriptor = plugin.descriptor();
        if let Some(expected) = self.expected_phase {
            if descriptor.phase != expected {
                return Err(RegistryError::PluginType {
                    plugin: descriptor.name.to_string(),
                    expected,
                    actual: descriptor.phase,
                });
            }
        }
        self.check_version(descriptor)?;

        debug!(
            registry = self.name,
            key = %key,
            plugin = %descriptor.name,
            version = %descriptor.version,
            "Plugin registered"
        );
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, plugin));
        Ok(())
    }

    fn check_version(&self, descriptor: &PluginDescriptor) -> Result<(), RegistryError> {
        let invalid = |source| RegistryError::InvalidVersion {
            plugin: descriptor.name.to_string(),
            source,
        };
        Version::parse(&descriptor.version).map_err(invalid)?;
        if self
            .gate
            .accepts(&descriptor.compatible_contracts)
            .map_err(invalid)?
        {
            Ok(())
        } else {
            Err(RegistryError::PluginIncompatible {
                plugin: descriptor.name.to_string(),
                version: descriptor.version.clone(),
                contracts: self.gate.contracts().to_string(),
            })
        }
    }

    /// Closes the registration window. Idempotent.
    pub fn lock(&mut self) {
        if !self.locked {
            debug!(registry = self.name, plugins = self.entries.len(), "Registry locked");
        }
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn get(&self, key: &K) -> Option<&Arc<P>> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Like [`Registry::get`], failing with [`RegistryError::PluginNotFound`].
    pub fn require(&self, key: &K) -> Result<&Arc<P>, RegistryError> {
        self.get(key).ok_or_else(|| RegistryError::PluginNotFound {
            registry: self.name.to_string(),
            key: key.to_string(),
        })
    }

    pub fn has(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Registered plugins in registration order.
    pub fn list(&self) -> impl Iterator<Item = (&K, &Arc<P>)> {
        self.entries.iter().map(|(k, p)| (k, p))
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }
}

impl<K: fmt::Display, P: ?Sized> fmt::Debug for Registry<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.entries.iter().map(|(k, _)| k.to_string()).collect();
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("contracts", &self.gate.contracts().to_string())
            .field("keys", &keys)
            .field("locked", &self.locked)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Subsystem registries
// ---------------------------------------------------------------------------

pub type DataRegistry = Registry<SourceKind, dyn DataPlugin>;
pub type RenderRegistry = Registry<RenderMode, dyn RenderPlugin>;
pub type ActionRegistry = Registry<ActionType, dyn ActionPlugin>;
/// Enhance plugins run in registration order.
pub type EnhanceRegistry = Registry<PluginName, dyn EnhancePlugin>;

/// The four subsystem registries of one process, sharing one contract version.
#[derive(Debug)]
pub struct Registries {
    pub data: DataRegistry,
    pub render: RenderRegistry,
    pub action: ActionRegistry,
    pub enhance: EnhanceRegistry,
}

impl Registries {
    pub fn new(contracts: Version) -> Self {
        let gate = VersionGate::new(contracts);
        Self {
            data: Registry::new("data", gate.clone(), Some(PluginPhase::Data)),
            render: Registry::new("render", gate.clone(), Some(PluginPhase::Render)),
            action: Registry::new("action", gate.clone(), Some(PluginPhase::Action)),
            enhance: Registry::new("enhance", gate, Some(PluginPhase::Enhance)),
        }
    }

    /// Locks every registry.
    pub fn lock_all(&mut self) {
        self.data.lock();
        self.render.lock();
        self.action.lock();
        self.enhance.lock();
    }
}
