//! Process-wide main instance
//!
//! The SDK keeps one global cloud object. [`SharedCloud`] guards its creation
//! and teardown with a single lock, so concurrent first accesses converge on
//! one instance and teardown cannot interleave with creation.

use crate::cloud::{CloudKind, TrtcCloud};
use crate::engine::{DylibEngine, NativeEngine};
use crate::error::{CloudError, Result};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

static GLOBAL: OnceCell<SharedCloud> = OnceCell::new();

/// Load the SDK and set up the process-wide [`SharedCloud`]
///
/// Only the first successful call loads anything; later calls return the
/// existing instance and ignore `library`.
///
/// # Errors
///
/// Returns [`CloudError::Library`] if the SDK cannot be loaded
pub fn init_shared(library: Option<&Path>) -> Result<&'static SharedCloud> {
    GLOBAL.get_or_try_init(|| {
        let engine = DylibEngine::load(library)?;
        Ok(SharedCloud::new(Arc::new(engine)))
    })
}

/// The process-wide [`SharedCloud`], loading the SDK on first use
///
/// # Errors
///
/// Returns [`CloudError::Library`] if the SDK cannot be loaded
pub fn shared() -> Result<&'static SharedCloud> {
    init_shared(None)
}

/// Owner of the main instance
pub struct SharedCloud {
    engine: Arc<dyn NativeEngine>,
    slot: Mutex<Option<Arc<TrtcCloud>>>,
}

impl SharedCloud {
    /// Wrap an engine; no native instance is created yet
    pub fn new(engine: Arc<dyn NativeEngine>) -> Self {
        Self {
            engine,
            slot: Mutex::new(None),
        }
    }

    /// Engine backing this instance
    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    /// Main instance, created on first call
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::NullInstance`] if the SDK returns no instance
    pub fn instance(&self) -> Result<Arc<TrtcCloud>> {
        let mut slot = self.slot.lock();
        if let Some(cloud) = slot.as_ref() {
            return Ok(Arc::clone(cloud));
        }

        let raw = self
            .engine
            .share_instance()
            .ok_or(CloudError::NullInstance("main"))?;
        let cloud = Arc::new(TrtcCloud::new(Arc::clone(&self.engine), CloudKind::Main, raw));
        tracing::info!("Created main cloud {:?}", raw);
        *slot = Some(Arc::clone(&cloud));
        Ok(cloud)
    }

    /// Whether the main instance currently exists
    pub fn is_initialized(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Create an independent instance, creating the main one first if needed
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::NullInstance`] if the SDK returns no instance
    pub fn create_sub_cloud(&self) -> Result<TrtcCloud> {
        self.instance()?.create_sub_cloud()
    }

    /// Global teardown of the main instance
    ///
    /// Remaining handler registrations are removed and freed first. Handles
    /// still held elsewhere report [`CloudError::Destroyed`] afterwards. A
    /// later [`instance`](Self::instance) call creates a fresh main instance.
    pub fn destroy(&self) {
        let mut slot = self.slot.lock();
        match slot.take() {
            Some(cloud) => cloud.release_main(),
            None => tracing::debug!("Main cloud not created, nothing to destroy"),
        }
    }
}

impl std::fmt::Debug for SharedCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCloud")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
