use crate::backend::ResourceBackend;
use crate::resource::{ResourceDesc, ResourceHandle};
use log::debug;
use parking_lot::Mutex;
use prism_core::collections::HashMap;
use std::sync::Arc;

/// Resource pool shared by every graph runner of an engine.
pub type SharedResourcePool = Arc<Mutex<ResourcePool>>;

/// Caches released resources by descriptor so later plans can reuse them.
pub struct ResourcePool {
    backend: Box<dyn ResourceBackend>,
    available: HashMap<ResourceDesc, Vec<ResourceHandle>>,
    in_use: usize,
}

impl ResourcePool {
    pub fn new(backend: impl ResourceBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            available: HashMap::default(),
            in_use: 0,
        }
    }

    pub fn shared(backend: impl ResourceBackend + 'static) -> SharedResourcePool {
        Arc::new(Mutex::new(Self::new(backend)))
    }

    pub(crate) fn pop(&mut self, desc: &ResourceDesc) -> Option<ResourceHandle> {
        self.available.get_mut(desc).and_then(|list| list.pop())
    }

    /// Take a cached resource matching `desc`, or create one through the backend.
    ///
    /// When the backend is full, idle resources of other descriptors are released to make room.
    pub fn acquire(&mut self, desc: &ResourceDesc) -> anyhow::Result<ResourceHandle> {
        let handle = match self.pop(desc) {
            Some(handle) => handle,
            None => self.create(desc)?,
        };
        self.in_use += 1;
        Ok(handle)
    }

    fn create(&mut self, desc: &ResourceDesc) -> anyhow::Result<ResourceHandle> {
        loop {
            match self.backend.acquire(desc) {
                Ok(handle) => return Ok(handle),
                Err(err) => match self.available.values_mut().find_map(|handles| handles.pop()) {
                    Some(idle) => {
                        debug!("Evicting {idle} to make room for {desc}");
                        self.backend.release(idle);
                    }
                    None => return Err(err),
                },
            }
        }
    }

    pub fn recycle(&mut self, desc: ResourceDesc, handle: ResourceHandle) {
        self.in_use = self.in_use.saturating_sub(1);
        self.available.entry(desc).or_default().push(handle);
    }

    /// Release every cached resource back to the backend. Resources in use are untouched.
    pub fn clear(&mut self) {
        for (_, handles) in self.available.drain() {
            for handle in handles {
                self.backend.release(handle);
            }
        }
    }

    /// Release cached resources whose descriptor `keep` rejects. Returns how many were released.
    pub fn trim(&mut self, mut keep: impl FnMut(&ResourceDesc) -> bool) -> usize {
        let mut released = 0;
        for (_, handles) in self.available.extract_if(|desc, _| !keep(desc)) {
            released += handles.len();
            for handle in handles {
                self.backend.release(handle);
            }
        }
        released
    }

    pub fn stats(&self) -> ResourcePoolStats {
        ResourcePoolStats {
            available_count: self.available.values().map(|v| v.len()).sum(),
            in_use_count: self.in_use,
            live_count: self.backend.live_count(),
        }
    }
}

impl Drop for ResourcePool {
    fn drop(&mut self) {
        self.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourcePoolStats {
    /// Cached resources ready for reuse.
    pub available_count: usize,
    /// Resources handed out and not yet recycled.
    pub in_use_count: usize,
    /// Resources alive in the backend.
    pub live_count: usize,
}
