//! Process-scoped dataset caches.
//!
//! Static datasets (the catalog file, the Spot Advisor document) are
//! fetched once and shared read-only by every pipeline in the process.
//! Concurrent first access waits on the same in-flight load instead of
//! issuing duplicate fetches. [`DatasetCache::invalidate`] drops the
//! cached value so the next access reloads it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::OnceCell;
use tracing::debug;

use crate::catalog::CatalogDataset;
use crate::live::advisor::AdvisorDataset;

/// A lazily loaded, shareable dataset with single-loader semantics.
pub struct DatasetCache<T> {
    /// Swapped for a fresh cell on invalidation.
    cell: RwLock<Arc<OnceCell<Arc<T>>>>,
    loads: AtomicU64,
}

impl<T> Default for DatasetCache<T> {
    fn default() -> Self {
        Self {
            cell: RwLock::new(Arc::new(OnceCell::new())),
            loads: AtomicU64::new(0),
        }
    }
}

impl<T> DatasetCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value, running `load` if nothing is cached yet.
    ///
    /// A failed load caches nothing; the next caller tries again.
    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cell = self.current_cell();
        let loads = &self.loads;
        let value = cell
            .get_or_try_init(|| async move {
                let value = load().await?;
                let n = loads.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(loads = n, "dataset loaded");
                Ok::<_, E>(Arc::new(value))
            })
            .await?;
        Ok(Arc::clone(value))
    }

    /// The cached value, if loaded.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.current_cell().get().cloned()
    }

    /// Forget the cached value.
    pub fn invalidate(&self) {
        let mut cell = self.cell.write().unwrap_or_else(|e| e.into_inner());
        *cell = Arc::new(OnceCell::new());
        debug!("dataset cache invalidated");
    }

    /// Number of successful loads since creation.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    fn current_cell(&self) -> Arc<OnceCell<Arc<T>>> {
        let cell = self.cell.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&cell)
    }
}

/// Read-mostly state shared by every pipeline in a process.
///
/// Created once at startup and injected into [`crate::ProviderFactory`];
/// nothing looks it up globally.
#[derive(Clone, Default)]
pub struct SharedState {
    pub catalog: Arc<DatasetCache<CatalogDataset>>,
    pub advisor: Arc<DatasetCache<AdvisorDataset>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached dataset.
    pub fn invalidate_all(&self) {
        self.catalog.invalidate();
        self.advisor.invalidate();
    }
}
