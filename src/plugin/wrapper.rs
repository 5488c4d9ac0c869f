use super::PluginGlobal;
use std::fmt;
use std::sync::Arc;

type Factory<P> = Box<dyn Fn() -> Box<P> + Send + Sync>;

/// Associates a plugin name with a factory for fresh instances and, for
/// plugins with cross-message state, the single global those instances share
pub struct PluginWrapper<P: ?Sized> {
    name: String,
    factory: Factory<P>,
    global: Option<Arc<dyn PluginGlobal>>,
}

impl<P: ?Sized> PluginWrapper<P> {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<P> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(factory),
            global: None,
        }
    }

    /// Every created instance receives a handle to `global`, and `global`
    /// receives the pipeline's lifecycle events
    pub fn with_global<G, F>(name: impl Into<String>, global: Arc<G>, factory: F) -> Self
    where
        G: PluginGlobal + 'static,
        F: Fn(Arc<G>) -> Box<P> + Send + Sync + 'static,
    {
        let shared = Arc::clone(&global);
        Self {
            name: name.into(),
            factory: Box::new(move || factory(Arc::clone(&shared))),
            global: Some(global as Arc<dyn PluginGlobal>),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create(&self) -> Box<P> {
        (self.factory)()
    }

    pub fn global(&self) -> Option<&Arc<dyn PluginGlobal>> {
        self.global.as_ref()
    }
}

impl<P: ?Sized> fmt::Debug for PluginWrapper<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginWrapper")
            .field("name", &self.name)
            .field("has_global", &self.global.is_some())
            .finish()
    }
}
