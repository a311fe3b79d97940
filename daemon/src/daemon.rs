use crate::pet_store::PetStore;
use crate::residence::{Closed, ResidenceTracker, Retainer, RetainerId, Teardown};
use crate::{CollectorSettings, DaemonError};
use formula_common::{
    hash::IndexMap,
    lock::{FgMutex, FgMutexGuard},
};
use formula_graph::{CollectResult, Formula, FormulaGraph, FormulaId};
use std::{fmt, time::Instant};

/// What one collection pass removed, and what went down with it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Collection {
    pub result: CollectResult,
    pub closed: Vec<Closed>,
    pub terminated: Vec<FormulaId>,
}

impl Collection {
    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    /// Collected ids, sorted.
    pub fn collected(&self) -> &[FormulaId] {
        &self.result.collected
    }
}

struct State {
    graph: FormulaGraph,
    formulas: IndexMap<FormulaId, Formula>,
    pet_stores: IndexMap<FormulaId, PetStore>,
    residence: ResidenceTracker,
    enabled: bool,
    last_collect: Instant,
}

/// Owns the formula table and everything that keeps formulas alive.
///
/// All state sits behind one lock, so graph mutations and collection
/// passes never interleave. Retainers and the terminate hook run after a
/// pass has released the lock, and may call back into the daemon.
pub struct Daemon {
    state: FgMutex<State>,
    settings: CollectorSettings,
}

impl fmt::Debug for Daemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Daemon")
            .field("formulas", &format!("[{} formulas]", state.formulas.len()))
            .field("pet_stores", &state.pet_stores.len())
            .field("graph", &state.graph)
            .field("residence", &state.residence)
            .field("enabled", &state.enabled)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new(CollectorSettings::default())
    }
}

fn pet_store<'a>(
    pet_stores: &'a mut IndexMap<FormulaId, PetStore>,
    store: &FormulaId,
) -> Result<&'a mut PetStore, DaemonError> {
    pet_stores
        .get_mut(store)
        .ok_or_else(|| DaemonError::UnknownPetStore(store.clone()))
}

impl Daemon {
    pub fn new(settings: CollectorSettings) -> Self {
        Self::with_graph(settings, FormulaGraph::new())
    }

    /// A daemon for peer `node`: formulas hosted by other peers are never
    /// collected here and never hold local formulas alive.
    pub fn for_node(settings: CollectorSettings, node: impl Into<String>) -> Self {
        let node = node.into();
        let graph = FormulaGraph::with_hooks(Formula::deps, move |id| id.is_on_node(&node));
        Self::with_graph(settings, graph)
    }

    pub fn with_graph(settings: CollectorSettings, graph: FormulaGraph) -> Self {
        Self {
            state: FgMutex::new(State {
                graph,
                formulas: IndexMap::default(),
                pet_stores: IndexMap::default(),
                residence: ResidenceTracker::default(),
                enabled: settings.enabled,
                last_collect: Instant::now(),
            }),
            settings,
        }
    }

    fn state(&self) -> FgMutexGuard<'_, State> {
        self.state.lock()
    }

    pub fn settings(&self) -> CollectorSettings {
        self.settings
    }

    /// Records a formula and registers it with the graph.
    pub fn formulate(&self, id: FormulaId, formula: Formula) {
        let mut guard = self.state();
        let state = &mut *guard;
        state.graph.on_formula_added(&id, &formula);
        if formula.is_naming_store() {
            state.pet_stores.entry(id.clone()).or_default();
        }
        if let Formula::Worker = formula {
            state.residence.track_worker(&id);
        }
        debug!("formulated {} {id}", formula.kind());
        state.formulas.insert(id, formula);
    }

    pub fn formula(&self, id: &FormulaId) -> Option<Formula> {
        self.state().formulas.get(id).cloned()
    }

    pub fn contains(&self, id: &FormulaId) -> bool {
        self.state().formulas.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state().formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().formulas.is_empty()
    }

    pub fn add_root(&self, id: &FormulaId) {
        self.state().graph.add_root(id);
    }

    pub fn pin_transient(&self, id: &FormulaId) {
        self.state().graph.pin_transient(id);
    }

    pub fn unpin_transient(&self, id: &FormulaId) {
        self.state().graph.unpin_transient(id);
    }

    pub fn find_group(&self, id: &FormulaId) -> FormulaId {
        self.state().graph.find_group(id)
    }

    pub fn is_dirty(&self) -> bool {
        self.state().graph.is_dirty()
    }

    /// Binds `name` in `store`. The id it replaces stops being held by the
    /// store once no other name there points at it.
    pub fn write_name(
        &self,
        store: &FormulaId,
        name: &str,
        id: FormulaId,
    ) -> Result<(), DaemonError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let pets = pet_store(&mut state.pet_stores, store)?;
        let previous = pets.write(name, id.clone())?;
        state.graph.on_pet_store_write(store, &id);
        if let Some(previous) = previous.filter(|previous| *previous != id) {
            if !pets.is_named(&previous) {
                state.graph.on_pet_store_remove(store, &previous);
            }
        }
        Ok(())
    }

    pub fn remove_name(&self, store: &FormulaId, name: &str) -> Result<FormulaId, DaemonError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let pets = pet_store(&mut state.pet_stores, store)?;
        let id = pets.remove(name)?;
        if !pets.is_named(&id) {
            state.graph.on_pet_store_remove(store, &id);
        }
        Ok(id)
    }

    pub fn rename_name(&self, store: &FormulaId, from: &str, to: &str) -> Result<(), DaemonError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let pets = pet_store(&mut state.pet_stores, store)?;
        let (id, overwritten) = pets.rename(from, to)?;
        state.graph.on_pet_store_write(store, &id);
        if let Some(overwritten) = overwritten.filter(|overwritten| *overwritten != id) {
            if !pets.is_named(&overwritten) {
                state.graph.on_pet_store_remove(store, &overwritten);
            }
        }
        Ok(())
    }

    pub fn identify(
        &self,
        store: &FormulaId,
        name: &str,
    ) -> Result<Option<FormulaId>, DaemonError> {
        let mut state = self.state();
        let pets = pet_store(&mut state.pet_stores, store)?;
        Ok(pets.identify(name)?.cloned())
    }

    pub fn reverse_identify(
        &self,
        store: &FormulaId,
        id: &FormulaId,
    ) -> Result<Vec<String>, DaemonError> {
        let mut state = self.state();
        Ok(pet_store(&mut state.pet_stores, store)?.reverse_identify(id))
    }

    pub fn list_names(&self, store: &FormulaId) -> Result<Vec<String>, DaemonError> {
        let mut state = self.state();
        Ok(pet_store(&mut state.pet_stores, store)?.list())
    }

    pub fn register_retainer<R>(&self, retainer: R) -> RetainerId
    where
        R: Retainer + 'static,
    {
        self.state().residence.register(Box::new(retainer))
    }

    pub fn retain(&self, retainer: RetainerId, id: &FormulaId) -> Result<(), DaemonError> {
        self.state().residence.retain(retainer, id)
    }

    pub fn release_retainer(&self, retainer: RetainerId) -> bool {
        self.state().residence.release(retainer)
    }

    /// Called with every collected worker.
    pub fn set_terminate_hook<F>(&self, terminate: F)
    where
        F: Fn(&FormulaId) + Send + Sync + 'static,
    {
        self.state().residence.set_terminate_hook(terminate);
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state().enabled = enabled;
    }

    /// Whether a scheduled pass is due: collection is enabled, something
    /// changed, and `min_interval` has passed since the last pass.
    pub fn should_collect(&self) -> bool {
        let state = self.state();
        self.is_due(&state)
    }

    fn is_due(&self, state: &State) -> bool {
        state.enabled
            && state.graph.is_dirty()
            && state.last_collect.elapsed() >= self.settings.min_interval
    }

    /// Runs a pass if [`should_collect`](Self::should_collect) says so.
    pub fn maybe_collect(&self) -> Collection {
        self.collect_when(|state| self.is_due(state))
    }

    /// Runs a pass unless collection is disabled or nothing changed since
    /// the last one.
    pub fn collect_if_dirty(&self) -> Collection {
        self.collect_when(|state| state.enabled && state.graph.is_dirty())
    }

    /// Runs a pass even if nothing changed. Does nothing while collection is
    /// disabled.
    pub fn collect(&self) -> Collection {
        self.collect_when(|state| state.enabled)
    }

    fn collect_when(&self, due: impl FnOnce(&State) -> bool) -> Collection {
        let mut state = self.state();
        if !due(&*state) {
            return Collection::default();
        }
        let (result, teardown) = Self::run_pass(&mut state);
        drop(state);

        if result.is_empty() {
            return Collection {
                result,
                ..Default::default()
            };
        }
        let (closed, terminated) = teardown.run();
        info!(
            "formulas collected, count={} (cyclic={}), retainers closed={}, workers terminated={}",
            result.len(),
            result.cyclic_cnt,
            closed.len(),
            terminated.len()
        );
        Collection {
            result,
            closed,
            terminated,
        }
    }

    /// The locked half of a pass: the graph, formula table and pet stores
    /// are settled before any retainer or hook runs.
    fn run_pass(state: &mut State) -> (CollectResult, Teardown) {
        let result = state.graph.collect();
        state.last_collect = Instant::now();
        if result.is_empty() {
            return (result, Teardown::default());
        }

        let teardown = state.residence.disconnect_retainers_holding(&result);
        for id in &result {
            let Some(formula) = state.formulas.shift_remove(id) else {
                warn!("collected {id}, which has no formula");
                continue;
            };
            if formula.is_naming_store() {
                state.graph.on_pet_store_remove_all(id);
                state.pet_stores.shift_remove(id);
            }
        }
        state.graph.clear_dirty();
        (result, teardown)
    }
}
