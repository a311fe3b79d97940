use super::union_find::{Slot, UnionFind};
use crate::formula::{Formula, FormulaId};
use formula_common::hash::{IndexMap, IndexSet};
use std::fmt;

/// Extracts the formula ids a definition depends on.
pub type ExtractDeps = dyn Fn(&Formula) -> Vec<FormulaId> + Send + Sync;
/// Tells ids of locally collectible formulas from ids hosted elsewhere.
pub type IsLocalId = dyn Fn(&FormulaId) -> bool + Send + Sync;

/// The two halves of a promise, keyed by the store they share.
#[derive(Debug, Default, Clone, Copy)]
struct PromiseResolverPair {
    promise: Option<Slot>,
    resolver: Option<Slot>,
}

/// Dependency structure between formulas, kept in sync by the host and
/// swept on demand by [`FormulaGraph::collect`].
///
/// Two edge sets are kept:
/// - static deps, recorded once per formula from its definition;
/// - pet-store edges, from a naming store to each formula it names, which
///   come and go with pet names.
///
/// Formulas sharing one identity (an agent and its handle, a promise and
/// its resolver) are merged into a group and collected together.
pub struct FormulaGraph {
    /// interning arena; a slot is the index of its id here
    pub(super) ids: IndexSet<FormulaId>,
    pub(super) groups: UnionFind,
    pub(super) formula_deps: IndexMap<Slot, IndexSet<Slot>>,
    pub(super) pet_store_edges: IndexMap<Slot, IndexSet<Slot>>,
    pub(super) roots: IndexSet<Slot>,
    /// roots for the duration of one host command
    pub(super) transient_roots: IndexSet<Slot>,
    promise_resolver_by_store: IndexMap<Slot, PromiseResolverPair>,
    dirty: bool,
    extract_deps: Box<ExtractDeps>,
    is_local_id: Box<IsLocalId>,
}

impl fmt::Debug for FormulaGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaGraph")
            .field(
                "formulas",
                &format!("[{} formulas]", self.formula_deps.len()),
            )
            .field(
                "pet_stores",
                &format!("[{} stores]", self.pet_store_edges.len()),
            )
            .field("roots", &self.roots.len())
            .field("transient_roots", &self.transient_roots.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Default for FormulaGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaGraph {
    /// A graph that takes dependencies from [`Formula::deps`] and treats
    /// every id as local.
    pub fn new() -> Self {
        Self::with_hooks(Formula::deps, |_| true)
    }

    pub fn with_hooks<E, L>(extract_deps: E, is_local_id: L) -> Self
    where
        E: Fn(&Formula) -> Vec<FormulaId> + Send + Sync + 'static,
        L: Fn(&FormulaId) -> bool + Send + Sync + 'static,
    {
        Self {
            ids: IndexSet::default(),
            groups: UnionFind::default(),
            formula_deps: IndexMap::default(),
            pet_store_edges: IndexMap::default(),
            roots: IndexSet::default(),
            transient_roots: IndexSet::default(),
            promise_resolver_by_store: IndexMap::default(),
            dirty: true,
            extract_deps: Box::new(extract_deps),
            is_local_id: Box::new(is_local_id),
        }
    }

    /// Interns `id`, giving it a singleton group on first sight.
    fn ensure(&mut self, id: &FormulaId) -> Slot {
        if let Some(slot) = self.ids.get_index_of(id) {
            return slot;
        }
        let (slot, _) = self.ids.insert_full(id.clone());
        self.groups.grow(self.ids.len());
        slot
    }

    pub(super) fn id(&self, slot: Slot) -> &FormulaId {
        &self.ids[slot]
    }

    fn slot(&self, id: &FormulaId) -> Option<Slot> {
        self.ids.get_index_of(id)
    }

    /// Representative of the group containing `id`.
    pub fn find_group(&mut self, id: &FormulaId) -> FormulaId {
        let slot = self.ensure(id);
        let root = self.groups.find(slot);
        self.id(root).clone()
    }

    /// Puts `left` and `right` in the same group.
    pub fn union(&mut self, left: &FormulaId, right: &FormulaId) {
        let left = self.ensure(left);
        let right = self.ensure(right);
        self.union_slots(left, right);
    }

    fn union_slots(&mut self, left: Slot, right: Slot) {
        if self.groups.union(left, right).is_some() {
            let size = self.groups.group_size(left);
            trace!(
                "merged {} with {}, group of {size}",
                self.id(left),
                self.id(right)
            );
            self.dirty = true;
        }
    }

    /// Adds `id` to the permanent root set.
    pub fn add_root(&mut self, id: &FormulaId) {
        let slot = self.ensure(id);
        self.roots.insert(slot);
        self.dirty = true;
    }

    pub fn is_root(&self, id: &FormulaId) -> bool {
        self.slot(id).map_or(false, |slot| self.roots.contains(&slot))
    }

    /// Protects `id` from collection until [`unpin_transient`](Self::unpin_transient).
    pub fn pin_transient(&mut self, id: &FormulaId) {
        let slot = self.ensure(id);
        if self.transient_roots.insert(slot) {
            self.dirty = true;
        }
    }

    pub fn unpin_transient(&mut self, id: &FormulaId) {
        let Some(slot) = self.slot(id) else {
            return;
        };
        if self.transient_roots.swap_remove(&slot) {
            self.dirty = true;
        }
    }

    pub fn is_pinned(&self, id: &FormulaId) -> bool {
        self.slot(id)
            .map_or(false, |slot| self.transient_roots.contains(&slot))
    }

    /// Registers a formula: records its local static deps and merges it
    /// with the formulas it shares an identity with.
    pub fn on_formula_added(&mut self, id: &FormulaId, formula: &Formula) {
        let slot = self.ensure(id);
        let deps: Vec<FormulaId> = (self.extract_deps)(formula)
            .into_iter()
            .filter(|dep| (self.is_local_id)(dep))
            .collect();
        let deps: IndexSet<Slot> = deps.iter().map(|dep| self.ensure(dep)).collect();
        trace!(
            "{} formula {} depends on {} formulas",
            formula.kind(),
            id,
            deps.len()
        );
        if self.formula_deps.insert(slot, deps).is_some() {
            warn!("formula {id} registered twice, replacing its dependencies");
        }

        match formula {
            Formula::Handle { agent } => {
                let agent = self.ensure(agent);
                self.union_slots(slot, agent);
            }
            Formula::Host { handle, .. } | Formula::Guest { handle, .. } => {
                let handle = self.ensure(handle);
                self.union_slots(slot, handle);
            }
            Formula::Promise { store } | Formula::Resolver { store } => {
                let store = self.ensure(store);
                let pair = self.promise_resolver_by_store.entry(store).or_default();
                if let Formula::Promise { .. } = formula {
                    pair.promise = Some(slot);
                } else {
                    pair.resolver = Some(slot);
                }
                let PromiseResolverPair { promise, resolver } = *pair;
                if let (Some(promise), Some(resolver)) = (promise, resolver) {
                    self.union_slots(promise, resolver);
                }
            }
            _ => {}
        }
        self.dirty = true;
    }

    /// Forgets a formula's static deps and promise pairing. Its group and
    /// any pet-store edges naming it are left alone.
    pub fn on_formula_removed(&mut self, id: &FormulaId) {
        if let Some(slot) = self.slot(id) {
            self.remove_slot(slot);
        }
        self.dirty = true;
    }

    pub(super) fn remove_slot(&mut self, slot: Slot) {
        self.formula_deps.swap_remove(&slot);
        self.promise_resolver_by_store.retain(|_, pair| {
            if pair.promise == Some(slot) {
                pair.promise = None;
            }
            if pair.resolver == Some(slot) {
                pair.resolver = None;
            }
            pair.promise.is_some() || pair.resolver.is_some()
        });
        self.dirty = true;
    }

    /// Records that `pet_store` names `id`.
    pub fn on_pet_store_write(&mut self, pet_store: &FormulaId, id: &FormulaId) {
        let store = self.ensure(pet_store);
        let target = self.ensure(id);
        self.pet_store_edges.entry(store).or_default().insert(target);
        trace!("{pet_store} names {id}");
        self.dirty = true;
    }

    /// Records that `pet_store` no longer names `id`. Returns whether there
    /// was such an edge; only then is the graph dirtied.
    pub fn on_pet_store_remove(&mut self, pet_store: &FormulaId, id: &FormulaId) -> bool {
        let (Some(store), Some(target)) = (self.slot(pet_store), self.slot(id)) else {
            return false;
        };
        let Some(names) = self.pet_store_edges.get_mut(&store) else {
            return false;
        };
        let removed = names.swap_remove(&target);
        if names.is_empty() {
            self.pet_store_edges.swap_remove(&store);
        }
        if removed {
            trace!("{pet_store} no longer names {id}");
            self.dirty = true;
        }
        removed
    }

    /// Drops every edge out of `pet_store`, as when the store itself goes
    /// away. Returns whether there was anything to drop.
    pub fn on_pet_store_remove_all(&mut self, pet_store: &FormulaId) -> bool {
        let removed = self
            .slot(pet_store)
            .map_or(false, |store| self.remove_pet_store_slot(store));
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub(super) fn remove_pet_store_slot(&mut self, store: Slot) -> bool {
        self.pet_store_edges.swap_remove(&store).is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Whether `id` is a registered formula.
    pub fn contains(&self, id: &FormulaId) -> bool {
        self.slot(id)
            .map_or(false, |slot| self.formula_deps.contains_key(&slot))
    }

    /// Number of registered formulas.
    pub fn len(&self) -> usize {
        self.formula_deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formula_deps.is_empty()
    }

    /// Static deps recorded for `id`, empty when `id` isn't registered.
    pub fn deps_of(&self, id: &FormulaId) -> Vec<FormulaId> {
        self.slot(id)
            .and_then(|slot| self.formula_deps.get(&slot))
            .map(|deps| deps.iter().map(|&dep| self.id(dep).clone()).collect())
            .unwrap_or_default()
    }

    /// Formulas currently named by `pet_store`.
    pub fn named_by(&self, pet_store: &FormulaId) -> Vec<FormulaId> {
        self.slot(pet_store)
            .and_then(|store| self.pet_store_edges.get(&store))
            .map(|names| names.iter().map(|&id| self.id(id).clone()).collect())
            .unwrap_or_default()
    }

    pub fn roots(&self) -> impl Iterator<Item = &FormulaId> + '_ {
        self.roots.iter().map(|&slot| self.id(slot))
    }

    /// Registered formulas that would be collected together with `id`.
    pub fn group_members(&mut self, id: &FormulaId) -> Vec<FormulaId> {
        let Some(slot) = self.slot(id) else {
            return Vec::new();
        };
        let group = self.groups.find(slot);
        let live: Vec<Slot> = self.formula_deps.keys().copied().collect();
        let mut members: Vec<FormulaId> = live
            .into_iter()
            .filter(|&member| self.groups.find(member) == group)
            .map(|member| self.ids[member].clone())
            .collect();
        members.sort();
        members
    }
}
