//! Where controllers come from.
//!
//! A [`ControllerSource`] resolves a controller name to a
//! [`ControllerModule`]. Three sources are provided:
//!
//! | Source | Resolves from | Identity |
//! |---|---|---|
//! | [`StaticControllers`] | an in-memory mapping | unique per instance |
//! | [`DirectoryControllers`] | `<dir>/<name>.<ext>` files | the absolute directory |
//! | [`FactoryControllers`] | a callback run once with [`Dependencies`] | unique per instance |

use crate::canned::{CannedLoader, ModuleLoader};
use crate::dependencies::Dependencies;
use crate::error::ControllerError;
use crate::module::{Controller, ControllerModule};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::debug;
use uuid::Uuid;

/// Resolves controller names to modules.
pub trait ControllerSource: Send + Sync + fmt::Debug {
    /// Returns a key identifying the controllers this source yields.
    ///
    /// Sources with equal identities resolve to the same controllers.
    fn identity(&self) -> String;

    /// Runs once before any name is resolved.
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot produce controllers at all.
    fn prepare(&self, _deps: &Dependencies) -> Result<(), ControllerError> {
        Ok(())
    }

    /// Resolves a controller by name.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] when no controller has that name,
    /// or a loading error.
    fn resolve(&self, name: &str) -> Result<ControllerModule, ControllerError>;
}

/// Controllers held in memory.
///
/// # Example
///
/// ```
/// use enforcer_controllers::{Controller, ControllerSource, StaticControllers};
///
/// let source = StaticControllers::new().controller("people", Controller::new());
/// assert!(source.resolve("people").is_ok());
/// assert!(source.resolve("pets").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct StaticControllers {
    id: Uuid,
    modules: IndexMap<String, ControllerModule>,
}

impl StaticControllers {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            modules: IndexMap::new(),
        }
    }

    /// Adds a controller, or a factory module, under a name.
    #[must_use]
    pub fn controller(mut self, name: impl Into<String>, module: impl Into<ControllerModule>) -> Self {
        self.modules.insert(name.into(), module.into());
        self
    }
}

impl Default for StaticControllers {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerSource for StaticControllers {
    fn identity(&self) -> String {
        format!("static:{}", self.id)
    }

    fn resolve(&self, name: &str) -> Result<ControllerModule, ControllerError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| ControllerError::not_found(name))
    }
}

/// Controllers loaded from files in a directory.
///
/// `people` resolves to the first of `<dir>/people.json` and
/// `<dir>/people.toml` that exists. Loaded modules are cached by absolute
/// path, so controllers shared by many operations are read once.
pub struct DirectoryControllers {
    directory: PathBuf,
    loader: Arc<dyn ModuleLoader>,
    cache: Mutex<HashMap<PathBuf, ControllerModule>>,
}

impl DirectoryControllers {
    /// Creates a source reading canned-response files from `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_loader(directory, CannedLoader)
    }

    /// Creates a source with a custom module loader.
    #[must_use]
    pub fn with_loader(directory: impl Into<PathBuf>, loader: impl ModuleLoader) -> Self {
        let directory = directory.into();
        let directory = std::fs::canonicalize(&directory).unwrap_or(directory);
        Self {
            directory,
            loader: Arc::new(loader),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the (absolute when it exists) directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the number of cached modules.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        self.loader
            .extensions()
            .iter()
            .map(|ext| self.directory.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
            .map(|path| std::fs::canonicalize(&path).unwrap_or(path))
    }
}

impl fmt::Debug for DirectoryControllers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryControllers")
            .field("directory", &self.directory)
            .field("cached", &self.cached())
            .finish_non_exhaustive()
    }
}

impl ControllerSource for DirectoryControllers {
    fn identity(&self) -> String {
        format!("directory:{}", self.directory.display())
    }

    fn resolve(&self, name: &str) -> Result<ControllerModule, ControllerError> {
        let path = self.locate(name).ok_or_else(|| ControllerError::NotFound {
            name: name.to_string(),
            location: Some(self.directory.clone()),
        })?;

        let mut cache = self.cache.lock();
        if let Some(module) = cache.get(&path) {
            return Ok(module.clone());
        }

        debug!(controller = name, path = %path.display(), "loading controller module");
        let module = self.loader.load(&path)?;
        cache.insert(path, module.clone());
        Ok(module)
    }
}

type SourceFactory = Box<dyn Fn(&Dependencies) -> Option<IndexMap<String, Controller>> + Send + Sync>;

/// Controllers produced by a setup callback.
///
/// The callback runs once, when the registry is first built, and must
/// return a mapping.
pub struct FactoryControllers {
    id: Uuid,
    name: String,
    factory: SourceFactory,
    preparing: Mutex<()>,
    produced: OnceLock<IndexMap<String, ControllerModule>>,
}

impl FactoryControllers {
    /// Creates a source from a named callback.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Dependencies) -> Option<IndexMap<String, Controller>> + Send + Sync + 'static,
    {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            factory: Box::new(factory),
            preparing: Mutex::new(()),
            produced: OnceLock::new(),
        }
    }

    /// Returns `true` once the callback has run.
    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.produced.get().is_some()
    }
}

impl fmt::Debug for FactoryControllers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryControllers")
            .field("name", &self.name)
            .field("prepared", &self.is_prepared())
            .finish_non_exhaustive()
    }
}

impl ControllerSource for FactoryControllers {
    fn identity(&self) -> String {
        format!("factory:{}:{}", self.name, self.id)
    }

    fn prepare(&self, deps: &Dependencies) -> Result<(), ControllerError> {
        if self.is_prepared() {
            return Ok(());
        }
        // Held across the callback so racing callers wait for the first run.
        let _guard = self.preparing.lock();
        if self.is_prepared() {
            return Ok(());
        }
        let controllers = (self.factory)(deps).ok_or_else(|| ControllerError::EmptyFactory {
            name: self.name.clone(),
        })?;
        let modules = controllers
            .into_iter()
            .map(|(name, controller)| (name, ControllerModule::from_controller(controller)))
            .collect();
        self.produced.get_or_init(|| modules);
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<ControllerModule, ControllerError> {
        let modules = self.produced.get().ok_or_else(|| ControllerError::NotPrepared {
            name: self.name.clone(),
        })?;
        modules
            .get(name)
            .cloned()
            .ok_or_else(|| ControllerError::not_found(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_static_identities_differ() {
        let a = StaticControllers::new();
        let b = a.clone();
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), StaticControllers::new().identity());
    }

    #[test]
    fn test_directory_resolution_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("people.json"), r#"{ "listPeople": { "body": [] } }"#)
            .unwrap();

        let source = DirectoryControllers::new(dir.path());
        assert!(source.resolve("people").is_ok());
        assert!(source.resolve("people").is_ok());
        assert_eq!(source.cached(), 1);

        let err = source.resolve("pets").unwrap_err();
        assert!(matches!(err, ControllerError::NotFound { location: Some(_), .. }));
        assert!(source.resolve("../people").is_err());
    }

    #[test]
    fn test_directory_identity_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryControllers::new(dir.path());
        assert!(source.directory().is_absolute());
        assert_eq!(
            source.identity(),
            DirectoryControllers::new(dir.path()).identity()
        );
    }

    #[test]
    fn test_factory_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source = FactoryControllers::new("app", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(IndexMap::from([("people".to_string(), Controller::new())]))
        });

        assert!(matches!(
            source.resolve("people"),
            Err(ControllerError::NotPrepared { .. })
        ));
        source.prepare(&Dependencies::new()).unwrap();
        source.prepare(&Dependencies::new()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(source.resolve("people").is_ok());
    }

    #[test]
    fn test_factory_runs_once_under_contention() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source = FactoryControllers::new("app", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Some(IndexMap::from([("people".to_string(), Controller::new())]))
        });
        let start = std::sync::Barrier::new(8);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    start.wait();
                    source.prepare(&Dependencies::new()).unwrap();
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(source.resolve("people").is_ok());
    }

    #[test]
    fn test_factory_must_return_mapping() {
        let source = FactoryControllers::new("app", |_| None);
        assert!(matches!(
            source.prepare(&Dependencies::new()),
            Err(ControllerError::EmptyFactory { .. })
        ));
    }
}
