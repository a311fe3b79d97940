use crate::formula::FormulaId;

/// What one collection pass removed from the graph.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectResult {
    /// formulas whose group lost its last reference
    pub acyclic_cnt: usize,
    /// formulas whose group only survived through an unreachable cycle
    pub cyclic_cnt: usize,
    /// every collected id, sorted
    pub collected: Vec<FormulaId>,
}

impl CollectResult {
    pub fn is_empty(&self) -> bool {
        self.collected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.collected.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.collected
            .binary_search_by(|probe| probe.as_str().cmp(id))
            .is_ok()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FormulaId> {
        self.collected.iter()
    }
}

impl IntoIterator for CollectResult {
    type Item = FormulaId;
    type IntoIter = std::vec::IntoIter<FormulaId>;

    fn into_iter(self) -> Self::IntoIter {
        self.collected.into_iter()
    }
}

impl<'a> IntoIterator for &'a CollectResult {
    type Item = &'a FormulaId;
    type IntoIter = std::slice::Iter<'a, FormulaId>;

    fn into_iter(self) -> Self::IntoIter {
        self.collected.iter()
    }
}
