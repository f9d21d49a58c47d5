//! Process-wide map from info hash to live content session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::metrics::CONTENT_HANDLES_ACTIVE;

use super::{ByteStream, ContentEngine, ContentFile, ContentPointer, EngineError};

/// Readiness of a content session.
#[derive(Debug, Clone)]
pub enum HandleState {
    Pending,
    Ready(Arc<Vec<ContentFile>>),
    Failed(String),
}

/// A live session for one pointer, shared by every request for it.
#[derive(Debug)]
pub struct ContentHandle {
    pointer: ContentPointer,
    state: watch::Receiver<HandleState>,
}

impl ContentHandle {
    pub fn pointer(&self) -> &ContentPointer {
        &self.pointer
    }

    pub fn info_hash(&self) -> &str {
        self.pointer.info_hash()
    }

    /// Current readiness without waiting.
    pub fn state(&self) -> HandleState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), HandleState::Ready(_))
    }

    async fn ready(&self) -> Result<Arc<Vec<ContentFile>>, EngineError> {
        let mut state = self.state.clone();
        let settled = state
            .wait_for(|s| !matches!(s, HandleState::Pending))
            .await
            .map_err(|_| EngineError::SessionFailed("session task ended".to_string()))?;

        match &*settled {
            HandleState::Ready(files) => Ok(files.clone()),
            HandleState::Failed(reason) => Err(EngineError::SessionFailed(reason.clone())),
            HandleState::Pending => Err(EngineError::SessionFailed(
                "session still pending".to_string(),
            )),
        }
    }
}

type HandleMap = Mutex<HashMap<String, Arc<ContentHandle>>>;

/// Ensures at most one engine session per info hash.
///
/// Handles are created under the registry lock and the engine session is
/// started in a background task, so `acquire` never waits on the network.
/// A handle whose session fails is dropped from the registry; healthy
/// handles live for the rest of the process.
pub struct ContentHandleRegistry {
    engine: Arc<dyn ContentEngine>,
    handles: Arc<HandleMap>,
}

impl ContentHandleRegistry {
    pub fn new(engine: Arc<dyn ContentEngine>) -> Self {
        Self {
            engine,
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<String, Arc<ContentHandle>>> {
        lock(&self.handles)
    }

    /// Return the handle for `pointer`, creating it and starting its session
    /// on first use. Must be called from within a tokio runtime.
    pub fn acquire(&self, pointer: &str) -> Result<Arc<ContentHandle>, EngineError> {
        let pointer = ContentPointer::parse(pointer)?;

        let mut handles = self.handles();
        if let Some(existing) = handles.get(pointer.info_hash()) {
            return Ok(existing.clone());
        }

        let (tx, rx) = watch::channel(HandleState::Pending);
        let handle = Arc::new(ContentHandle {
            pointer: pointer.clone(),
            state: rx,
        });
        handles.insert(pointer.info_hash().to_string(), handle.clone());
        CONTENT_HANDLES_ACTIVE.set(handles.len() as i64);
        drop(handles);

        info!(
            engine = self.engine.name(),
            info_hash = %pointer.info_hash(),
            "Starting content session"
        );

        let engine = self.engine.clone();
        let registry = Arc::downgrade(&self.handles);
        let owned = Arc::downgrade(&handle);
        tokio::spawn(async move {
            let outcome = match engine.start_session(&pointer).await {
                Ok(()) => engine.wait_ready(&pointer).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(files) => {
                    debug!(info_hash = %pointer.info_hash(), files = files.len(), "Content session ready");
                    let _ = tx.send(HandleState::Ready(Arc::new(files)));
                }
                Err(e) => {
                    warn!(info_hash = %pointer.info_hash(), error = %e, "Content session failed");

                    // Evict before publishing, so anyone who sees the failure
                    // and retries gets a fresh handle.
                    if let Some(registry) = registry.upgrade() {
                        let mut handles = lock(&registry);
                        let same = handles
                            .get(pointer.info_hash())
                            .is_some_and(|h| std::ptr::eq(Arc::as_ptr(h), owned.as_ptr()));
                        if same {
                            handles.remove(pointer.info_hash());
                            CONTENT_HANDLES_ACTIVE.set(handles.len() as i64);
                        }
                    }

                    let _ = tx.send(HandleState::Failed(e.to_string()));
                }
            }
        });

        Ok(handle)
    }

    /// Suspend until `handle` is ready and return its file list.
    ///
    /// With a deadline, only this waiter gives up on expiry; the session
    /// keeps running for other requests.
    pub async fn wait_ready(
        &self,
        handle: &ContentHandle,
        deadline: Option<Duration>,
    ) -> Result<Arc<Vec<ContentFile>>, EngineError> {
        match deadline {
            Some(limit) => tokio::time::timeout(limit, handle.ready())
                .await
                .map_err(|_| EngineError::ReadyTimeout(limit.as_secs()))?,
            None => handle.ready().await,
        }
    }

    /// Open an independent read of `start..=end` of one file of `handle`.
    pub async fn open_range(
        &self,
        handle: &ContentHandle,
        file_index: usize,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, EngineError> {
        self.engine
            .open_range(handle.pointer(), file_index, start, end)
            .await
    }

    /// Handle registered for `info_hash`, if any.
    pub fn get(&self, info_hash: &str) -> Option<Arc<ContentHandle>> {
        self.handles().get(&info_hash.to_lowercase()).cloned()
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock(map: &HandleMap) -> MutexGuard<'_, HashMap<String, Arc<ContentHandle>>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}
