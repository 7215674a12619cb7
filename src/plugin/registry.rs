//! Plugin registry: loads plugin modules from a directory at startup,
//! validates each one, and indexes them by package name.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use libloading::{Library, Symbol};

use crate::core::GatewayCore;
use crate::plugin::callbacks::GatewayCallbacks;
use crate::plugin::trait_def::{JanusPlugin, PluginConstructor};

/// Symbol name every plugin module must export.
const ENTRY_POINT_SYMBOL: &[u8] = b"janus_plugin_create";

/// A loaded plugin module and its trait object.
///
/// `_module` keeps the `Library` alive for the process lifetime: registry
/// entries live until orderly shutdown and are never unloaded mid-run. It
/// is never read, only held, hence the underscore.
pub struct PluginEntry {
    package: String,
    vtable: Arc<dyn JanusPlugin>,
    _module: Option<Library>,
}

impl PluginEntry {
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn vtable(&self) -> &Arc<dyn JanusPlugin> {
        &self.vtable
    }
}

/// Written only during startup and read-only thereafter, so it needs no
/// runtime locking.
#[derive(Default)]
pub struct PluginRegistry {
    entries: HashMap<String, Arc<PluginEntry>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans `plugins_dir` for shared modules, opens each, resolves the
    /// entry point, and keeps every plugin that exposes it. Incomplete
    /// modules (missing the symbol, or one that panics during `init`) are
    /// rejected with a logged warning rather than aborting startup.
    pub fn load_directory(
        &mut self,
        plugins_dir: &Path,
        config_dir: &Path,
        core: &Arc<GatewayCore>,
    ) -> Result<()> {
        let read_dir = std::fs::read_dir(plugins_dir)
            .with_context(|| format!("Failed to read plugins directory {}", plugins_dir.display()))?;

        for entry in read_dir {
            let entry = entry.context("Failed to read plugin directory entry")?;
            let path = entry.path();

            let is_module = path
                .extension()
                .map(|ext| ext == std::env::consts::DLL_EXTENSION)
                .unwrap_or(false);

            if !is_module {
                continue;
            }

            match self.load_one(&path, config_dir, core) {
                Ok(package) => log::info!("Loaded plugin {} from {}", package, path.display()),
                Err(err) => crate::err!("Rejected plugin candidate {}: {:#}", path.display(), err),
            }
        }

        Ok(())
    }

    fn load_one(&mut self, path: &Path, config_dir: &Path, core: &Arc<GatewayCore>) -> Result<String> {
        let library = unsafe { Library::new(path) }
            .with_context(|| format!("Failed to open plugin module {}", path.display()))?;

        let constructor: Symbol<PluginConstructor> = unsafe { library.get(ENTRY_POINT_SYMBOL) }
            .with_context(|| format!("Plugin {} is missing the `{}` entry point", path.display(), String::from_utf8_lossy(ENTRY_POINT_SYMBOL)))?;

        let raw = unsafe { constructor() };
        if raw.is_null() {
            bail!("Plugin {} entry point returned a null descriptor", path.display());
        }

        let boxed: Box<dyn JanusPlugin> = unsafe { Box::from_raw(raw) };
        let vtable: Arc<dyn JanusPlugin> = Arc::from(boxed);
        let package = vtable.get_package().to_owned();

        let callbacks = GatewayCallbacks::new(package.clone(), core.clone());
        vtable
            .init(callbacks, config_dir)
            .map_err(|err| anyhow::anyhow!("Plugin init failed: {}", err))?;

        self.entries.insert(
            package.clone(),
            Arc::new(PluginEntry {
                package: package.clone(),
                vtable,
                _module: Some(library),
            }),
        );

        Ok(package)
    }

    /// Registers an already-constructed plugin without going through
    /// dynamic loading. Used to attach built-in plugins (`echotest`) and in
    /// tests.
    pub fn register(&mut self, vtable: Arc<dyn JanusPlugin>, config_dir: &Path, core: &Arc<GatewayCore>) -> Result<()> {
        let package = vtable.get_package().to_owned();
        let callbacks = GatewayCallbacks::new(package.clone(), core.clone());
        vtable
            .init(callbacks, config_dir)
            .map_err(|err| anyhow::anyhow!("Plugin init failed: {}", err))?;

        self.entries.insert(
            package.clone(),
            Arc::new(PluginEntry {
                package,
                vtable,
                _module: None,
            }),
        );

        Ok(())
    }

    pub fn get(&self, package: &str) -> Option<Arc<PluginEntry>> {
        self.entries.get(package).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::error::PluginError;
    use crate::plugin::PluginToken;
    use crate::sdp::Jsep;
    use std::path::Path;

    pub struct NoopPlugin;

    impl JanusPlugin for NoopPlugin {
        fn init(&self, _callbacks: GatewayCallbacks, _config_dir: &Path) -> Result<(), PluginError> {
            Ok(())
        }

        fn destroy(&self) {}
        fn get_version(&self) -> i32 {
            1
        }
        fn get_version_string(&self) -> &str {
            "0.1.0"
        }
        fn get_description(&self) -> &str {
            "Test plugin"
        }
        fn get_name(&self) -> &str {
            "Noop"
        }
        fn get_package(&self) -> &str {
            "janus.plugin.noop"
        }

        fn create_session(&self, _token: PluginToken) -> Result<(), PluginError> {
            Ok(())
        }

        fn handle_message(
            &self,
            _token: PluginToken,
            _transaction: String,
            _body: serde_json::Value,
            _jsep: Option<Jsep>,
        ) -> Result<(), PluginError> {
            Ok(())
        }

        fn setup_media(&self, _token: PluginToken) {}
        fn incoming_rtp(&self, _token: PluginToken, _is_video: bool, _buf: &[u8]) {}
        fn incoming_rtcp(&self, _token: PluginToken, _is_video: bool, _buf: &[u8]) {}
        fn hangup_media(&self, _token: PluginToken) {}

        fn destroy_session(&self, _token: PluginToken) -> Result<(), PluginError> {
            Ok(())
        }
    }

    pub fn dummy_plugin_entry() -> Arc<PluginEntry> {
        Arc::new(PluginEntry {
            package: "janus.plugin.noop".to_owned(),
            vtable: Arc::new(NoopPlugin),
            _module: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testing::NoopPlugin;

    #[test]
    fn register_indexes_by_package() {
        let mut registry = PluginRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let core = GatewayCore::stub();
        registry.register(Arc::new(NoopPlugin), dir.path(), &core).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("janus.plugin.noop").is_some());
        assert!(registry.get("janus.plugin.missing").is_none());
    }

    #[test]
    fn rejects_directory_without_valid_modules() {
        let mut registry = PluginRegistry::new();
        let plugins_dir = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let core = GatewayCore::stub();

        registry
            .load_directory(plugins_dir.path(), config_dir.path(), &core)
            .unwrap();

        assert!(registry.is_empty());
    }
}
