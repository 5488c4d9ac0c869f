use super::pack::PipelinePack;
use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineError, Result};
use crate::metrics::Metrics;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

/// Fixed set of packs shared by every input
///
/// All packs are allocated up front; `acquire` on an empty pool waits until
/// some holder drops its [`PackGuard`], which is the pipeline's only
/// backpressure. Waiters are served in arrival order.
#[derive(Clone)]
pub struct PackPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    sender: mpsc::Sender<Box<PipelinePack>>,
    receiver: Mutex<mpsc::Receiver<Box<PipelinePack>>>,
    size: usize,
    outstanding: AtomicUsize,
    peak: AtomicUsize,
    metrics: Arc<Metrics>,
}

impl PackPool {
    pub fn new(config: &Arc<PipelineConfig>, metrics: Arc<Metrics>) -> Result<Self> {
        let size = config.pool_size;
        if size == 0 {
            return Err(ConfigError::Validation("pool size must be greater than 0".into()).into());
        }

        let (sender, receiver) = mpsc::channel(size + 1);
        for _ in 0..size {
            sender
                .try_send(Box::new(PipelinePack::new(Arc::clone(config))))
                .map_err(|_| PipelineError::PoolClosed)?;
        }
        debug!(size, "Pack pool filled");

        Ok(Self {
            inner: Arc::new(PoolInner {
                sender,
                receiver: Mutex::new(receiver),
                size,
                outstanding: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                metrics,
            }),
        })
    }

    /// Take a pack, waiting for one to be recycled if the pool is empty
    pub async fn acquire(&self) -> Result<PackGuard> {
        let pack = {
            let mut receiver = self.inner.receiver.lock().await;
            receiver.recv().await.ok_or(PipelineError::PoolClosed)?
        };
        Ok(self.checkout(pack))
    }

    pub fn try_acquire(&self) -> Option<PackGuard> {
        let pack = self.inner.receiver.try_lock().ok()?.try_recv().ok()?;
        Some(self.checkout(pack))
    }

    /// Reset the pack and return it to the pool
    pub fn release(&self, guard: PackGuard) {
        drop(guard);
    }

    fn checkout(&self, pack: Box<PipelinePack>) -> PackGuard {
        let outstanding = self.inner.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(outstanding, Ordering::SeqCst);
        self.inner.metrics.set_packs_in_flight(outstanding);
        PackGuard {
            pack: Some(pack),
            pool: self.clone(),
        }
    }

    fn recycle(&self, mut pack: Box<PipelinePack>) {
        pack.zero();
        // Decrement before the pack becomes visible to the next acquirer so the
        // count never exceeds the pool size
        let outstanding = self.inner.outstanding.fetch_sub(1, Ordering::SeqCst) - 1;
        self.inner.metrics.set_packs_in_flight(outstanding);
        if self.inner.sender.try_send(pack).is_err() {
            error!("Pack pool rejected a recycled pack");
        }
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Packs currently held outside the pool
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    pub fn peak_outstanding(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for PackPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackPool")
            .field("size", &self.size())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

/// Exclusive hold on one pack; dropping it resets the pack and returns it to the pool
pub struct PackGuard {
    pack: Option<Box<PipelinePack>>,
    pool: PackPool,
}

impl PackGuard {
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PackGuard {
    type Target = PipelinePack;

    fn deref(&self) -> &PipelinePack {
        self.pack.as_deref().expect("pack is present until the guard drops")
    }
}

impl DerefMut for PackGuard {
    fn deref_mut(&mut self) -> &mut PipelinePack {
        self.pack
            .as_deref_mut()
            .expect("pack is present until the guard drops")
    }
}

impl Drop for PackGuard {
    fn drop(&mut self) {
        if let Some(pack) = self.pack.take() {
            self.pool.recycle(pack);
        }
    }
}

impl std::fmt::Debug for PackGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PackGuard").field(&self.pack).finish()
    }
}
