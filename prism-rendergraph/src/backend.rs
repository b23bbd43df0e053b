use crate::resource::{ResourceDesc, ResourceHandle};
use anyhow::bail;
use log::trace;

/// Creates and destroys the physical resources behind [`ResourceHandle`]s.
pub trait ResourceBackend: Send {
    fn acquire(&mut self, desc: &ResourceDesc) -> anyhow::Result<ResourceHandle>;

    fn release(&mut self, handle: ResourceHandle);

    /// Number of resources created and not yet released.
    fn live_count(&self) -> usize;
}

/// Backend without a device. Hands out numbered handles and enforces an optional capacity.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    live: usize,
    capacity: Option<usize>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    #[inline]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Total number of handles ever created.
    #[inline]
    pub fn created_count(&self) -> u64 {
        self.next_id
    }
}

impl ResourceBackend for HeadlessBackend {
    fn acquire(&mut self, desc: &ResourceDesc) -> anyhow::Result<ResourceHandle> {
        if let Some(capacity) = self.capacity {
            if self.live >= capacity {
                bail!("out of resources ({} of {capacity} in use)", self.live);
            }
        }

        let handle = ResourceHandle(self.next_id);
        self.next_id += 1;
        self.live += 1;

        trace!("Created {handle} for {desc}");
        Ok(handle)
    }

    fn release(&mut self, handle: ResourceHandle) {
        self.live = self.live.saturating_sub(1);
        trace!("Destroyed {handle}");
    }

    fn live_count(&self) -> usize {
        self.live
    }
}
