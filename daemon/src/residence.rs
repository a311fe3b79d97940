//! Which live sessions hold which formulas.
//!
//! When a pass collects a formula, every retainer holding it is forgotten
//! and a collected worker stops being tracked. The returned [`Teardown`]
//! closes those retainers and terminates those workers once the caller has
//! let go of the daemon.

use crate::DaemonError;
use formula_common::hash::{IndexMap, IndexSet};
use formula_graph::FormulaId;
use std::{fmt, sync::Arc};

/// Something outside the daemon holding formula references, usually an
/// open connection.
pub trait Retainer: Send {
    /// Called once, when a formula this retainer holds is collected. The
    /// retainer is forgotten afterwards.
    fn close(&mut self, reason: &Disconnect);
}

impl<F> Retainer for F
where
    F: FnMut(&Disconnect) + Send,
{
    fn close(&mut self, reason: &Disconnect) {
        self(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RetainerId(u64);

impl fmt::Display for RetainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retainer#{}", self.0)
    }
}

/// Why a retainer was closed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("connection closed: formula {id} became unreachable")]
pub struct Disconnect {
    pub id: FormulaId,
}

/// A retainer closed by [`ResidenceTracker::disconnect_retainers_holding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closed {
    pub retainer: RetainerId,
    pub reason: Disconnect,
}

pub type TerminateHook = dyn Fn(&FormulaId) + Send + Sync;

struct Residence {
    retainer: Box<dyn Retainer>,
    holds: IndexSet<FormulaId>,
}

#[derive(Default)]
pub struct ResidenceTracker {
    next_id: u64,
    retainers: IndexMap<RetainerId, Residence>,
    holders: IndexMap<FormulaId, IndexSet<RetainerId>>,
    workers: IndexSet<FormulaId>,
    terminate: Option<Arc<TerminateHook>>,
}

impl fmt::Debug for ResidenceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResidenceTracker")
            .field("retainers", &self.retainers.len())
            .field("held", &self.holders.len())
            .field("workers", &self.workers)
            .finish()
    }
}

impl ResidenceTracker {
    pub fn set_terminate_hook<F>(&mut self, terminate: F)
    where
        F: Fn(&FormulaId) + Send + Sync + 'static,
    {
        self.terminate = Some(Arc::new(terminate));
    }

    pub fn register(&mut self, retainer: Box<dyn Retainer>) -> RetainerId {
        let id = RetainerId(self.next_id);
        self.next_id += 1;
        self.retainers.insert(
            id,
            Residence {
                retainer,
                holds: IndexSet::default(),
            },
        );
        id
    }

    /// Records that `retainer` holds `id`.
    pub fn retain(&mut self, retainer: RetainerId, id: &FormulaId) -> Result<(), DaemonError> {
        let residence = self
            .retainers
            .get_mut(&retainer)
            .ok_or(DaemonError::UnknownRetainer(retainer))?;
        if residence.holds.insert(id.clone()) {
            self.holders.entry(id.clone()).or_default().insert(retainer);
        }
        Ok(())
    }

    /// Forgets a retainer that went away on its own, without closing it.
    pub fn release(&mut self, retainer: RetainerId) -> bool {
        match self.retainers.swap_remove(&retainer) {
            Some(residence) => {
                self.forget_holds(retainer, &residence.holds);
                true
            }
            None => false,
        }
    }

    pub fn holds(&self, retainer: RetainerId) -> Vec<FormulaId> {
        self.retainers
            .get(&retainer)
            .map(|residence| residence.holds.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_registered(&self, retainer: RetainerId) -> bool {
        self.retainers.contains_key(&retainer)
    }

    pub fn track_worker(&mut self, id: &FormulaId) {
        self.workers.insert(id.clone());
    }

    pub fn is_worker(&self, id: &FormulaId) -> bool {
        self.workers.contains(id)
    }

    /// Forgets every retainer holding one of `ids` and every collected
    /// worker. Nothing is closed or terminated until the returned
    /// [`Teardown`] runs.
    pub fn disconnect_retainers_holding<'a, I>(&mut self, ids: I) -> Teardown
    where
        I: IntoIterator<Item = &'a FormulaId>,
    {
        let mut teardown = Teardown {
            terminate: self.terminate.clone(),
            ..Default::default()
        };
        for id in ids {
            let holders = self.holders.swap_remove(id).unwrap_or_default();
            for retainer in holders {
                let Some(residence) = self.retainers.swap_remove(&retainer) else {
                    continue;
                };
                self.forget_holds(retainer, &residence.holds);
                let reason = Disconnect { id: id.clone() };
                teardown.retainers.push((residence.retainer, Closed { retainer, reason }));
            }
            if self.workers.swap_remove(id) {
                teardown.workers.push(id.clone());
            }
        }
        teardown
    }

    fn forget_holds(&mut self, retainer: RetainerId, holds: &IndexSet<FormulaId>) {
        for id in holds {
            if let Some(holders) = self.holders.get_mut(id) {
                holders.swap_remove(&retainer);
                if holders.is_empty() {
                    self.holders.swap_remove(id);
                }
            }
        }
    }
}

/// Retainers to close and workers to terminate after a pass.
#[derive(Default)]
pub struct Teardown {
    retainers: Vec<(Box<dyn Retainer>, Closed)>,
    workers: Vec<FormulaId>,
    terminate: Option<Arc<TerminateHook>>,
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("retainers", &self.retainers.len())
            .field("workers", &self.workers)
            .finish()
    }
}

impl Teardown {
    pub fn is_empty(&self) -> bool {
        self.retainers.is_empty() && self.workers.is_empty()
    }

    /// Closes the retainers, then terminates the workers. Returns what was
    /// closed and what was terminated.
    pub fn run(self) -> (Vec<Closed>, Vec<FormulaId>) {
        let mut closed = Vec::with_capacity(self.retainers.len());
        for (mut retainer, entry) in self.retainers {
            debug!("closing {}: {}", entry.retainer, entry.reason);
            retainer.close(&entry.reason);
            closed.push(entry);
        }
        for worker in &self.workers {
            debug!("terminating worker {worker}");
            if let Some(terminate) = &self.terminate {
                terminate(worker);
            }
        }
        (closed, self.workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn id(s: &str) -> FormulaId {
        FormulaId::from(s)
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>) -> Box<dyn Retainer> {
        let log = Arc::clone(log);
        Box::new(move |reason: &Disconnect| log.lock().unwrap().push(reason.to_string()))
    }

    #[test]
    fn holders_of_collected_ids_are_closed_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = ResidenceTracker::default();
        let session = tracker.register(recorder(&log));
        let bystander = tracker.register(recorder(&log));
        tracker.retain(session, &id("a")).unwrap();
        tracker.retain(session, &id("b")).unwrap();
        tracker.retain(bystander, &id("c")).unwrap();

        let teardown = tracker.disconnect_retainers_holding(&[id("a"), id("b")]);
        assert!(!tracker.is_registered(session));
        assert!(log.lock().unwrap().is_empty());

        let (closed, terminated) = teardown.run();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].retainer, session);
        assert!(terminated.is_empty());
        assert_eq!(
            *log.lock().unwrap(),
            ["connection closed: formula a became unreachable"]
        );
        assert_eq!(tracker.holds(bystander), vec![id("c")]);
    }

    #[test]
    fn collected_workers_are_terminated() {
        let terminated = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = ResidenceTracker::default();
        let sink = Arc::clone(&terminated);
        tracker.set_terminate_hook(move |id| sink.lock().unwrap().push(id.clone()));
        tracker.track_worker(&id("w1"));
        tracker.track_worker(&id("w2"));

        let teardown = tracker.disconnect_retainers_holding(&[id("w1"), id("x")]);
        assert!(!tracker.is_worker(&id("w1")));
        assert!(terminated.lock().unwrap().is_empty());

        let (_, reported) = teardown.run();
        assert_eq!(reported, vec![id("w1")]);
        assert_eq!(*terminated.lock().unwrap(), vec![id("w1")]);
        assert!(tracker.is_worker(&id("w2")));
    }

    #[test]
    fn released_retainers_are_not_closed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = ResidenceTracker::default();
        let session = tracker.register(recorder(&log));
        tracker.retain(session, &id("a")).unwrap();
        assert!(tracker.release(session));
        assert!(!tracker.release(session));

        let teardown = tracker.disconnect_retainers_holding(&[id("a")]);
        assert!(teardown.is_empty());
        let (closed, _) = teardown.run();
        assert!(closed.is_empty());
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(
            tracker.retain(session, &id("a")),
            Err(DaemonError::UnknownRetainer(session))
        );
    }
}
