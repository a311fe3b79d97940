//! In-memory pet name tables.
//!
//! A [`PetStore`] only keeps names. Turning name changes into graph edges is
//! the daemon's job, see [`Daemon::write_name`](crate::Daemon::write_name).

use crate::DaemonError;
use formula_common::hash::{IndexMap, IndexSet};
use formula_graph::FormulaId;
use itertools::Itertools;

const MAX_PET_NAME_LEN: usize = 255;

/// Pet names are single path segments.
pub fn validate_name(name: &str) -> Result<(), DaemonError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_PET_NAME_LEN
        && name != "."
        && name != ".."
        && !name.contains(['/', '\0']);
    if valid {
        Ok(())
    } else {
        Err(DaemonError::InvalidPetName(name.to_owned()))
    }
}

/// Names to ids, with the reverse index kept alongside.
#[derive(Debug, Default, Clone)]
pub struct PetStore {
    names: IndexMap<String, FormulaId>,
    ids: IndexMap<FormulaId, IndexSet<String>>,
}

impl PetStore {
    pub fn has(&self, name: &str) -> Result<bool, DaemonError> {
        validate_name(name)?;
        Ok(self.names.contains_key(name))
    }

    pub fn identify(&self, name: &str) -> Result<Option<&FormulaId>, DaemonError> {
        validate_name(name)?;
        Ok(self.names.get(name))
    }

    /// Every name bound to `id`, sorted.
    pub fn reverse_identify(&self, id: &FormulaId) -> Vec<String> {
        self.ids
            .get(id)
            .map(|names| names.iter().cloned().sorted().collect())
            .unwrap_or_default()
    }

    pub fn is_named(&self, id: &FormulaId) -> bool {
        self.ids.contains_key(id)
    }

    pub fn list(&self) -> Vec<String> {
        self.names.keys().cloned().sorted().collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Binds `name` to `id`, returning the id it was bound to before.
    pub fn write(&mut self, name: &str, id: FormulaId) -> Result<Option<FormulaId>, DaemonError> {
        validate_name(name)?;
        let previous = self.names.insert(name.to_owned(), id.clone());
        if let Some(previous) = &previous {
            self.unlink(previous, name);
        }
        self.ids.entry(id).or_default().insert(name.to_owned());
        Ok(previous)
    }

    /// Unbinds `name`, returning the id it was bound to.
    pub fn remove(&mut self, name: &str) -> Result<FormulaId, DaemonError> {
        validate_name(name)?;
        let id = self
            .names
            .shift_remove(name)
            .ok_or_else(|| DaemonError::MissingName(name.to_owned()))?;
        self.unlink(&id, name);
        Ok(id)
    }

    /// Moves the binding of `from` to `to`. Returns the moved id and the id
    /// `to` was bound to before, if any.
    pub fn rename(
        &mut self,
        from: &str,
        to: &str,
    ) -> Result<(FormulaId, Option<FormulaId>), DaemonError> {
        validate_name(from)?;
        validate_name(to)?;
        let id = self
            .names
            .get(from)
            .cloned()
            .ok_or_else(|| DaemonError::MissingName(from.to_owned()))?;
        if from == to {
            return Ok((id, None));
        }
        self.remove(from)?;
        let overwritten = self.write(to, id.clone())?;
        Ok((id, overwritten))
    }

    fn unlink(&mut self, id: &FormulaId, name: &str) {
        if let Some(names) = self.ids.get_mut(id) {
            names.shift_remove(name);
            if names.is_empty() {
                self.ids.shift_remove(id);
            }
        }
    }
}
