use super::graph::FormulaGraph;
use super::union_find::Slot;
use super::utils::CollectResult;
use formula_common::hash::{IndexMap, IndexSet};
use itertools::Itertools;
use std::collections::VecDeque;

/// other colors of the paper (green, red, orange) have no use in a
/// stop-the-world pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// In use or free
    Black,
    /// Possible member of cycle
    Gray,
    /// Member of garbage cycle
    White,
    /// Possible root of cycle
    Purple,
}

#[derive(Debug)]
struct GroupNode {
    /// registered formulas of this group
    members: Vec<Slot>,
    /// distinct other groups this one references
    children: Vec<usize>,
    /// distinct referencing groups, plus one per outside pet store naming
    /// the group, plus one if the group holds a root
    rc: usize,
    color: Color,
    collected: bool,
}

/// The formula graph projected onto groups, built afresh for each pass.
#[derive(Debug, Default)]
struct GroupGraph {
    /// group representative -> node index
    index: IndexMap<Slot, usize>,
    nodes: Vec<GroupNode>,
    edges: IndexSet<(usize, usize)>,
}

impl GroupGraph {
    fn build(graph: &mut FormulaGraph) -> Self {
        let mut groups = GroupGraph::default();

        for &slot in graph.formula_deps.keys() {
            let rep = graph.groups.find(slot);
            let node = groups.node_for(rep);
            groups.nodes[node].members.push(slot);
        }

        for (&slot, deps) in &graph.formula_deps {
            let from = groups.index[&graph.groups.find(slot)];
            for &dep in deps {
                if let Some(&to) = groups.index.get(&graph.groups.find(dep)) {
                    groups.add_edge(from, to);
                }
            }
        }

        for (&store, names) in &graph.pet_store_edges {
            let targets: IndexSet<usize> = names
                .iter()
                .filter_map(|&id| groups.index.get(&graph.groups.find(id)).copied())
                .collect();
            match groups.index.get(&graph.groups.find(store)).copied() {
                // a registered store holds its names like any other dependency
                Some(from) => targets.into_iter().for_each(|to| groups.add_edge(from, to)),
                None => targets.into_iter().for_each(|to| groups.nodes[to].rc += 1),
            }
        }

        let pinned: IndexSet<usize> = graph
            .roots
            .iter()
            .chain(&graph.transient_roots)
            .filter_map(|&root| groups.index.get(&graph.groups.find(root)).copied())
            .collect();
        for node in pinned {
            groups.nodes[node].rc += 1;
        }

        groups
    }

    fn node_for(&mut self, rep: Slot) -> usize {
        let next = self.nodes.len();
        let node = *self.index.entry(rep).or_insert(next);
        if node == next {
            self.nodes.push(GroupNode {
                members: Vec::new(),
                children: Vec::new(),
                rc: 0,
                color: Color::Black,
                collected: false,
            });
        }
        node
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if from != to && self.edges.insert((from, to)) {
            self.nodes[from].children.push(to);
            self.nodes[to].rc += 1;
        }
    }

    /// Collects every group nothing references, then whatever that frees,
    /// until the counts settle.
    fn collect_acyclic(&mut self) -> Vec<usize> {
        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&node| self.nodes[node].rc == 0)
            .collect();
        let mut freed = Vec::new();
        while let Some(node) = queue.pop_front() {
            if self.nodes[node].collected {
                continue;
            }
            self.nodes[node].collected = true;
            freed.push(node);
            for child in std::mem::take(&mut self.nodes[node].children) {
                let child_node = &mut self.nodes[child];
                debug_assert!(child_node.rc > 0);
                child_node.rc -= 1;
                if child_node.rc == 0 {
                    queue.push_back(child);
                }
            }
        }
        freed
    }

    /// Trial deletion over the survivors of [`collect_acyclic`]: subtract
    /// every internal edge, restore counts from whatever still has an
    /// outside reference, and what stays at zero is a garbage cycle.
    ///
    /// [`collect_acyclic`]: Self::collect_acyclic
    fn collect_cycles(&mut self) -> Vec<usize> {
        let candidates: Vec<usize> = (0..self.nodes.len())
            .filter(|&node| !self.nodes[node].collected)
            .collect();
        for &node in &candidates {
            self.nodes[node].color = Color::Purple;
        }
        // 1. mark roots: trial decref so isolated cycles drop to zero
        for &node in &candidates {
            if self.nodes[node].color == Color::Purple {
                self.mark_gray(node);
            }
        }
        // 2. scan roots: anything still referenced turns black again
        for &node in &candidates {
            self.scan(node);
        }
        // 3. collect roots
        candidates
            .into_iter()
            .filter(|&node| self.collect_white(node))
            .collect()
    }

    fn mark_gray(&mut self, start: usize) {
        self.nodes[start].color = Color::Gray;
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for i in 0..self.nodes[node].children.len() {
                let child = self.nodes[node].children[i];
                let child_node = &mut self.nodes[child];
                child_node.rc -= 1;
                if child_node.color != Color::Gray {
                    child_node.color = Color::Gray;
                    stack.push(child);
                }
            }
        }
    }

    fn scan(&mut self, start: usize) {
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if self.nodes[node].color != Color::Gray {
                continue;
            }
            if self.nodes[node].rc > 0 {
                self.scan_black(node);
            } else {
                self.nodes[node].color = Color::White;
                stack.extend(self.nodes[node].children.iter().copied());
            }
        }
    }

    fn scan_black(&mut self, start: usize) {
        self.nodes[start].color = Color::Black;
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for i in 0..self.nodes[node].children.len() {
                let child = self.nodes[node].children[i];
                let child_node = &mut self.nodes[child];
                child_node.rc += 1;
                if child_node.color != Color::Black {
                    child_node.color = Color::Black;
                    stack.push(child);
                }
            }
        }
    }

    fn collect_white(&mut self, node: usize) -> bool {
        let node = &mut self.nodes[node];
        if node.color == Color::White && !node.collected {
            node.color = Color::Black;
            node.collected = true;
            true
        } else {
            false
        }
    }

    fn members<'a>(&'a self, nodes: &'a [usize]) -> impl Iterator<Item = Slot> + 'a {
        nodes
            .iter()
            .flat_map(|&node| self.nodes[node].members.iter().copied())
    }
}

// core of the collection pass
impl FormulaGraph {
    /// Runs one collection pass: removes every group that neither a root
    /// nor an outside pet store can reach, and returns the removed ids.
    ///
    /// Collected formulas leave through the same bookkeeping as
    /// [`on_formula_removed`](Self::on_formula_removed); a collected
    /// naming store also loses its outgoing pet-store edges. The graph is
    /// clean afterwards.
    pub fn collect(&mut self) -> CollectResult {
        let mut groups = GroupGraph::build(self);
        debug!(
            "collecting over {} groups of {} formulas, {} group edges",
            groups.nodes.len(),
            self.formula_deps.len(),
            groups.edges.len()
        );

        let acyclic = groups.collect_acyclic();
        let cyclic = groups.collect_cycles();
        let acyclic_slots: Vec<Slot> = groups.members(&acyclic).collect();
        let cyclic_slots: Vec<Slot> = groups.members(&cyclic).collect();

        let collected = acyclic_slots
            .iter()
            .chain(&cyclic_slots)
            .map(|&slot| self.id(slot).clone())
            .sorted()
            .collect();
        for &slot in acyclic_slots.iter().chain(&cyclic_slots) {
            self.remove_slot(slot);
            self.remove_pet_store_slot(slot);
        }
        self.clear_dirty();

        let result = CollectResult {
            acyclic_cnt: acyclic_slots.len(),
            cyclic_cnt: cyclic_slots.len(),
            collected,
        };
        if !result.is_empty() {
            debug!(
                "collected {} formulas ({} in cycles)",
                result.len(),
                result.cyclic_cnt
            );
        }
        result
    }
}
