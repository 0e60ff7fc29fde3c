//! Resource reservation for safely interleaved sequences.
//!
//! Sequences that run interleaved in a round-robin funnel must not clobber
//! each other's registers. The [`Reserver`] is the sole mediator: a sequence
//! asks for concrete resources or class-level slots, exclusively or shared,
//! and either receives the whole claim or nothing. A `None` outcome is a
//! retryable conflict; a [`ReservationError`] is a bug in the requesting
//! sequence and must abort generation.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

/// Identifier of a resource inside its namespace.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceIdent {
    /// A numbered resource, e.g. a register index.
    Index(u32),
    /// A named resource, e.g. a CSR.
    Name(String),
}

/// Concrete reference to one specific resource (e.g. "I want x5").
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    /// Resource namespace: `GPR`, `FPR` or `CSR`.
    pub namespace: String,
    /// Identifier inside the namespace.
    pub ident: ResourceIdent,
}

impl ResourceId {
    /// A numbered resource, e.g. `ResourceId::indexed("GPR", 5)`.
    pub fn indexed(namespace: &str, index: u32) -> Self {
        Self {
            namespace: namespace.to_owned(),
            ident: ResourceIdent::Index(index),
        }
    }

    /// A named resource, e.g. `ResourceId::named("CSR", "mscratch")`.
    pub fn named(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_owned(),
            ident: ResourceIdent::Name(name.to_owned()),
        }
    }
}

/// Class-level request: any `count` resources from a namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSlot {
    /// Namespace to draw from.
    pub namespace: String,
    /// How many resources are needed.
    pub count: u32,
}

impl ResourceSlot {
    /// A slot request for `count` resources from `namespace`.
    pub fn new(namespace: &str, count: u32) -> Self {
        Self {
            namespace: namespace.to_owned(),
            count,
        }
    }
}

/// One entry in a request list.
#[derive(Clone, Debug)]
pub enum ResourceRequest {
    /// A concrete resource.
    Id(ResourceId),
    /// A class-level slot.
    Slot(ResourceSlot),
}

/// The full request of one sequence, split by reservation kind.
#[derive(Clone, Debug, Default)]
pub struct ResourceRequests {
    /// Resources only this sequence may touch.
    pub exclusive: Vec<ResourceRequest>,
    /// Resources this sequence shares with other shared holders.
    pub shared: Vec<ResourceRequest>,
}

impl ResourceRequests {
    /// True when nothing is requested.
    pub fn is_empty(&self) -> bool {
        self.exclusive.is_empty() && self.shared.is_empty()
    }
}

/// A granted reservation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocatedClaim {
    /// Exclusively held resources.
    pub exclusive: BTreeSet<ResourceId>,
    /// Shared holds.
    pub shared: BTreeSet<ResourceId>,
}

/// A structurally invalid request; a bug in the sequence, never retryable.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ReservationError(pub String);

/// The set of resources that can be reserved, keyed by namespace.
#[derive(Clone, Debug)]
pub struct ResourceSpace {
    all: BTreeSet<ResourceId>,
    by_namespace: BTreeMap<String, BTreeSet<ResourceId>>,
}

impl ResourceSpace {
    /// Builds a space from namespace pools.
    pub fn from_pools(pools: BTreeMap<String, Vec<ResourceIdent>>) -> Self {
        let mut all = BTreeSet::new();
        let mut by_namespace: BTreeMap<String, BTreeSet<ResourceId>> = BTreeMap::new();
        for (namespace, idents) in pools {
            for ident in idents {
                let rid = ResourceId {
                    namespace: namespace.clone(),
                    ident,
                };
                let _ = all.insert(rid.clone());
                let _ = by_namespace.entry(namespace.clone()).or_default().insert(rid);
            }
        }
        Self { all, by_namespace }
    }

    /// Every reservable resource.
    pub fn all_resources(&self) -> &BTreeSet<ResourceId> {
        &self.all
    }

    /// Resources of `namespace` not in `exclude`, in ascending order.
    pub fn allocatable_from_namespace(
        &self,
        namespace: &str,
        exclude: &BTreeSet<ResourceId>,
    ) -> BTreeSet<ResourceId> {
        self.by_namespace
            .get(namespace)
            .map(|pool| pool.difference(exclude).cloned().collect())
            .unwrap_or_default()
    }

    /// True when the namespace exists in this space.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.by_namespace.contains_key(namespace)
    }
}

/// Unique identifier the funnel assigns to each started sequence.
pub type SequenceId = u64;

/// Centralised resource reservation; all sequences of a funnel share one.
#[derive(Debug)]
pub struct Reserver {
    space: ResourceSpace,
    unassigned: BTreeSet<ResourceId>,
    exclusive: BTreeMap<SequenceId, BTreeSet<ResourceId>>,
    shared: BTreeMap<SequenceId, BTreeSet<ResourceId>>,
    shared_refcount: BTreeMap<ResourceId, u32>,
    next_id: SequenceId,
}

impl Reserver {
    /// Creates a reserver over a resource space.
    pub fn new(space: ResourceSpace) -> Self {
        let unassigned = space.all_resources().clone();
        Self {
            space,
            unassigned,
            exclusive: BTreeMap::new(),
            shared: BTreeMap::new(),
            shared_refcount: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Hands out a fresh sequence identifier.
    pub fn next_sequence_id(&mut self) -> SequenceId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// All-or-nothing reservation.
    ///
    /// Exclusive picks draw from the unassigned pool minus every current
    /// hold; shared picks draw from everything minus exclusive holds. The
    /// request succeeds fully or commits nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError`] when the request names the zero register
    /// or an unknown namespace. Returns `Ok(None)` on a retryable conflict.
    pub fn request(
        &mut self,
        sequence_id: SequenceId,
        requests: &ResourceRequests,
    ) -> Result<Option<AllocatedClaim>, ReservationError> {
        if self.exclusive.contains_key(&sequence_id) || self.shared.contains_key(&sequence_id) {
            return Ok(None); // Already allocated; caller must release first
        }

        let zero_reg = ResourceId::indexed("GPR", 0);
        for req in requests.exclusive.iter().chain(requests.shared.iter()) {
            match req {
                ResourceRequest::Id(id) => {
                    if *id == zero_reg {
                        return Err(ReservationError(
                            "GPR 0 (x0) is the zero register and cannot be reserved".to_owned(),
                        ));
                    }
                }
                ResourceRequest::Slot(slot) => {
                    if !self.space.has_namespace(&slot.namespace) {
                        return Err(ReservationError(format!(
                            "unknown resource namespace '{}'",
                            slot.namespace
                        )));
                    }
                }
            }
        }

        let mut exclusive_holds: BTreeSet<ResourceId> = BTreeSet::new();
        for holds in self.exclusive.values() {
            exclusive_holds.extend(holds.iter().cloned());
        }
        let mut shared_holds: BTreeSet<ResourceId> = BTreeSet::new();
        for holds in self.shared.values() {
            shared_holds.extend(holds.iter().cloned());
        }
        let exclusive_exclude: BTreeSet<ResourceId> =
            exclusive_holds.union(&shared_holds).cloned().collect();

        let mut exclusive_needed: BTreeSet<ResourceId> = BTreeSet::new();
        for req in &requests.exclusive {
            match req {
                ResourceRequest::Id(id) => {
                    let available =
                        self.unassigned.contains(id) && !exclusive_exclude.contains(id);
                    // A duplicate in the same request list is a conflict with
                    // itself; all-or-nothing means no partial commit either way.
                    if !available || !exclusive_needed.insert(id.clone()) {
                        return Ok(None);
                    }
                }
                ResourceRequest::Slot(slot) => {
                    let mut pool: Vec<ResourceId> = self
                        .space
                        .allocatable_from_namespace(&slot.namespace, &exclusive_exclude)
                        .into_iter()
                        .filter(|r| self.unassigned.contains(r) && !exclusive_needed.contains(r))
                        .collect();
                    if pool.len() < slot.count as usize {
                        return Ok(None);
                    }
                    pool.truncate(slot.count as usize);
                    exclusive_needed.extend(pool);
                }
            }
        }

        let shared_exclude: BTreeSet<ResourceId> =
            exclusive_holds.union(&exclusive_needed).cloned().collect();

        let mut shared_needed: BTreeSet<ResourceId> = BTreeSet::new();
        for req in &requests.shared {
            match req {
                ResourceRequest::Id(id) => {
                    if shared_exclude.contains(id) {
                        return Ok(None);
                    }
                    let _ = shared_needed.insert(id.clone());
                }
                ResourceRequest::Slot(slot) => {
                    let mut pool: Vec<ResourceId> = self
                        .space
                        .allocatable_from_namespace(&slot.namespace, &shared_exclude)
                        .into_iter()
                        .filter(|r| !shared_needed.contains(r))
                        .collect();
                    if pool.len() < slot.count as usize {
                        return Ok(None);
                    }
                    pool.truncate(slot.count as usize);
                    shared_needed.extend(pool);
                }
            }
        }

        if !exclusive_needed.is_disjoint(&shared_needed) {
            return Ok(None);
        }

        // Commit.
        for id in &exclusive_needed {
            let _ = self.unassigned.remove(id);
        }
        if !exclusive_needed.is_empty() {
            let _ = self.exclusive.insert(sequence_id, exclusive_needed.clone());
        }
        if !shared_needed.is_empty() {
            let _ = self.shared.insert(sequence_id, shared_needed.clone());
            for id in &shared_needed {
                let count = self.shared_refcount.entry(id.clone()).or_insert(0);
                *count += 1;
                if *count == 1 {
                    let _ = self.unassigned.remove(id);
                }
            }
        }

        Ok(Some(AllocatedClaim {
            exclusive: exclusive_needed,
            shared: shared_needed,
        }))
    }

    /// Returns every hold of `sequence_id` to the pool.
    ///
    /// Safe to call at most once per successful request; releasing an
    /// unknown identifier is a no-op.
    pub fn release(&mut self, sequence_id: SequenceId) {
        if let Some(holds) = self.exclusive.remove(&sequence_id) {
            self.unassigned.extend(holds);
        }
        if let Some(holds) = self.shared.remove(&sequence_id) {
            for id in holds {
                if let Some(count) = self.shared_refcount.get_mut(&id) {
                    *count -= 1;
                    if *count == 0 {
                        let _ = self.shared_refcount.remove(&id);
                        let _ = self.unassigned.insert(id);
                    }
                }
            }
        }
    }

    /// True when `sequence_id` currently holds anything.
    pub fn holds_anything(&self, sequence_id: SequenceId) -> bool {
        self.exclusive.contains_key(&sequence_id) || self.shared.contains_key(&sequence_id)
    }
}
