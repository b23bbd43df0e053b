//! Maps virtual resources onto pooled physical resources, aliasing those whose lifetimes do not overlap.

use crate::compiler::{CompiledPlan, VirtualResourceId};
use crate::error::RenderGraphError;
use crate::pool::SharedResourcePool;
use crate::resource::{ResourceDesc, ResourceHandle};
use log::debug;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSlot {
    pub desc: ResourceDesc,
    pub handle: ResourceHandle,
}

/// Physical resources backing a compiled plan. Dropping the table returns them to the pool.
pub struct ResourceBindingTable {
    pool: SharedResourcePool,
    slots: Vec<ResourceSlot>,
    assignment: Vec<usize>,
    graph_id: u64,
    topology_version: u64,
}

impl ResourceBindingTable {
    #[inline]
    pub fn slots(&self) -> &[ResourceSlot] {
        &self.slots
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_of(&self, resource: VirtualResourceId) -> Option<usize> {
        self.assignment.get(resource.index()).copied()
    }

    pub fn handle(&self, resource: VirtualResourceId) -> Option<ResourceHandle> {
        self.slot_of(resource).map(|slot| self.slots[slot].handle)
    }

    /// Handle of every virtual resource, indexed by id.
    pub(crate) fn resolved_handles(&self) -> Vec<ResourceHandle> {
        self.assignment.iter().map(|&slot| self.slots[slot].handle).collect()
    }

    pub(crate) fn is_allocated_for(&self, plan: &CompiledPlan) -> bool {
        self.graph_id == plan.graph_id
            && self.topology_version == plan.topology_version
            && self.assignment.len() == plan.resources.len()
    }
}

impl Drop for ResourceBindingTable {
    fn drop(&mut self) {
        let mut pool = self.pool.lock();
        for slot in self.slots.drain(..) {
            pool.recycle(slot.desc, slot.handle);
        }
    }
}

impl std::fmt::Debug for ResourceBindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBindingTable")
            .field("slots", &self.slots)
            .field("assignment", &self.assignment)
            .finish_non_exhaustive()
    }
}

struct SlotState {
    desc: ResourceDesc,
    last: usize,
    pinned: bool,
}

/// Assign every virtual resource of `plan` to a slot by interval colouring.
///
/// Resources are visited by first use. A slot returns to the free set once its occupant's last use
/// is strictly before the current first use, and is reused only for an identical descriptor.
/// Slots of marked outputs are never freed.
fn assign_slots(plan: &CompiledPlan) -> (Vec<SlotState>, Vec<usize>) {
    let aliasing = plan.config.enable_aliasing;

    let mut sorted = plan.resources.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|resource| (resource.lifetime.first, resource.id));

    let mut slots: Vec<SlotState> = Vec::new();
    let mut assignment = vec![0; plan.resources.len()];
    let mut active: Vec<usize> = Vec::new();
    let mut free: BTreeSet<usize> = BTreeSet::new();

    for resource in sorted {
        let reused = if aliasing {
            active.retain(|&slot| {
                let state = &slots[slot];
                let expired = !state.pinned && state.last < resource.lifetime.first;
                if expired {
                    free.insert(slot);
                }
                !expired
            });

            free.iter().copied().find(|&slot| slots[slot].desc == resource.desc)
        } else {
            None
        };

        let slot = match reused {
            Some(slot) => {
                free.remove(&slot);
                let state = &mut slots[slot];
                state.last = resource.lifetime.last;
                state.pinned = resource.pinned;
                slot
            }
            None => {
                slots.push(SlotState {
                    desc: resource.desc,
                    last: resource.lifetime.last,
                    pinned: resource.pinned,
                });
                slots.len() - 1
            }
        };

        active.push(slot);
        assignment[resource.id.index()] = slot;
    }

    (slots, assignment)
}

/// Allocate physical resources for a compiled plan from the shared pool.
#[profiling::function]
pub fn allocate(plan: &CompiledPlan, pool: &SharedResourcePool) -> Result<ResourceBindingTable, RenderGraphError> {
    let (states, assignment) = assign_slots(plan);

    let mut slots = Vec::with_capacity(states.len());
    {
        let mut guard = pool.lock();
        for state in &states {
            match guard.acquire(&state.desc) {
                Ok(handle) => slots.push(ResourceSlot { desc: state.desc, handle }),
                Err(reason) => {
                    for slot in slots {
                        guard.recycle(slot.desc, slot.handle);
                    }
                    return Err(RenderGraphError::ResourceExhausted { desc: state.desc, reason });
                }
            }
        }
    }

    debug!(
        "Allocated {} slots for {} virtual resources (aliasing {})",
        slots.len(),
        assignment.len(),
        if plan.config.enable_aliasing { "on" } else { "off" }
    );

    Ok(ResourceBindingTable {
        pool: pool.clone(),
        slots,
        assignment,
        graph_id: plan.graph_id,
        topology_version: plan.topology_version,
    })
}
