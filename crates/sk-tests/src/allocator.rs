use std::sync::Arc;

use parking_lot::Mutex;
use sk_core::{AllocationInfo, AllocationScope, Allocator, HostAllocator, Uuid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationEvent {
    Allocate(AllocationInfo),
    Refuse(AllocationInfo),
    Free(AllocationInfo),
}

/// Host allocator that records every call and can run out after a budget.
#[derive(Debug, Default)]
pub struct RecordingAllocator {
    events: Mutex<Vec<AllocationEvent>>,
    budget: Mutex<Option<usize>>,
}

impl RecordingAllocator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Grants `budget` allocations, then refuses every request.
    pub fn with_budget(budget: usize) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            budget: Mutex::new(Some(budget)),
        })
    }

    pub fn allocator(self: &Arc<Self>) -> Allocator {
        Allocator::new(self.clone())
    }

    pub fn events(&self) -> Vec<AllocationEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn granted(&self) -> Vec<AllocationInfo> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                AllocationEvent::Allocate(info) => Some(*info),
                _ => None,
            })
            .collect()
    }

    pub fn frees(&self) -> Vec<AllocationInfo> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                AllocationEvent::Free(info) => Some(*info),
                _ => None,
            })
            .collect()
    }

    /// `(scope, identity)` of every free, in order.
    pub fn free_order(&self) -> Vec<(AllocationScope, Uuid)> {
        self.frees()
            .into_iter()
            .map(|info| (info.scope, info.identity))
            .collect()
    }

    pub fn refusals(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, AllocationEvent::Refuse(_)))
            .count()
    }

    /// Granted allocations not yet freed.
    pub fn outstanding(&self) -> usize {
        self.granted().len() - self.frees().len()
    }
}

impl HostAllocator for RecordingAllocator {
    fn allocate(&self, info: &AllocationInfo) -> bool {
        let mut budget = self.budget.lock();
        let granted = match budget.as_mut() {
            None => true,
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
        };
        let event = if granted {
            AllocationEvent::Allocate(*info)
        } else {
            AllocationEvent::Refuse(*info)
        };
        self.events.lock().push(event);
        granted
    }

    fn free(&self, info: &AllocationInfo) {
        self.events.lock().push(AllocationEvent::Free(*info));
    }
}
