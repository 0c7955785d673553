// Tue Jan 20 2026 - Alex
//
// The output call graph: one node per function, one edge per resolved call
// site. SCC computation is iterative Tarjan (a single explicit stack
// instead of per-vertex recursion) to keep the whole analysis consistent
// about never trusting call-stack depth to program size.

use crate::ir::FunctionId;
use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    edges: IndexMap<FunctionId, IndexSet<FunctionId>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, caller: FunctionId, callee: FunctionId) {
        self.edges.entry(caller).or_insert_with(IndexSet::new).insert(callee);
    }

    /// Ensures `f` has a node in the graph even if it calls nothing, so
    /// leaf functions aren't invisible to `functions()`.
    pub fn touch(&mut self, f: FunctionId) {
        self.edges.entry(f).or_insert_with(IndexSet::new);
    }

    pub fn callees(&self, f: FunctionId) -> impl Iterator<Item = FunctionId> + '_ {
        self.edges.get(&f).into_iter().flat_map(|s| s.iter().copied())
    }

    pub fn functions(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.edges.keys().copied()
    }

    /// Strongly connected components with more than one member, i.e. the
    /// mutually- or directly-recursive function groups. Singletons (a
    /// function with no self-loop) are never returned.
    pub fn recursive_groups(&self) -> Vec<Vec<FunctionId>> {
        let mut indices: IndexMap<FunctionId, usize> = IndexMap::new();
        let mut lowlinks: IndexMap<FunctionId, usize> = IndexMap::new();
        let mut on_stack: IndexSet<FunctionId> = IndexSet::new();
        let mut stack: Vec<FunctionId> = Vec::new();
        let mut sccs: Vec<Vec<FunctionId>> = Vec::new();
        let mut counter = 0usize;

        // Explicit-stack Tarjan: each frame tracks the vertex, its
        // neighbor iterator position, and whether we're entering it fresh
        // or resuming after a child's strongconnect returned.
        enum Frame {
            Enter(FunctionId),
            Resume(FunctionId, usize),
        }

        let all_vertices: Vec<FunctionId> = self.edges.keys().copied().collect();
        for root in all_vertices {
            if indices.contains_key(&root) {
                continue;
            }
            let mut work: Vec<Frame> = vec![Frame::Enter(root)];
            while let Some(frame) = work.pop() {
                match frame {
                    Frame::Enter(v) => {
                        indices.insert(v, counter);
                        lowlinks.insert(v, counter);
                        counter += 1;
                        stack.push(v);
                        on_stack.insert(v);
                        work.push(Frame::Resume(v, 0));
                    }
                    Frame::Resume(v, next_idx) => {
                        let neighbors: Vec<FunctionId> = self.callees(v).collect();
                        // A non-zero resume position means we're returning
                        // from the tree edge to neighbors[next_idx - 1];
                        // fold its lowlink in now, same as the recursive
                        // version does right after `strongconnect` returns.
                        if next_idx > 0 {
                            let child = neighbors[next_idx - 1];
                            let low_child = lowlinks[&child];
                            let low_v = lowlinks[&v];
                            lowlinks.insert(v, low_v.min(low_child));
                        }
                        let mut idx = next_idx;
                        let mut pushed_child = false;
                        while idx < neighbors.len() {
                            let w = neighbors[idx];
                            idx += 1;
                            if !indices.contains_key(&w) {
                                work.push(Frame::Resume(v, idx));
                                work.push(Frame::Enter(w));
                                pushed_child = true;
                                break;
                            } else if on_stack.contains(&w) {
                                let low_v = lowlinks[&v];
                                let idx_w = indices[&w];
                                lowlinks.insert(v, low_v.min(idx_w));
                            }
                        }
                        if pushed_child {
                            continue;
                        }
                        if lowlinks[&v] == indices[&v] {
                            let mut scc = Vec::new();
                            loop {
                                let w = stack.pop().expect("SCC root must be on stack");
                                on_stack.shift_remove(&w);
                                scc.push(w);
                                if w == v {
                                    break;
                                }
                            }
                            if scc.len() > 1 || scc.first().map_or(false, |&f| self.callees(f).any(|c| c == f)) {
                                sccs.push(scc);
                            }
                        }
                    }
                }
            }
        }
        sccs
    }

    /// True if `f` appears in a recursive group (including direct
    /// self-recursion).
    pub fn is_recursive(&self, f: FunctionId) -> bool {
        self.recursive_groups().iter().any(|g| g.contains(&f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(i: u32) -> FunctionId {
        crate::ir::ids::FunctionId(i)
    }

    #[test]
    fn direct_self_recursion_is_a_group() {
        let mut g = CallGraph::new();
        g.add_edge(fid(0), fid(0));
        let groups = g.recursive_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0], vec![fid(0)]);
    }

    #[test]
    fn mutual_recursion_forms_one_group() {
        let mut g = CallGraph::new();
        g.add_edge(fid(0), fid(1));
        g.add_edge(fid(1), fid(0));
        let groups = g.recursive_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn acyclic_graph_has_no_groups() {
        let mut g = CallGraph::new();
        g.add_edge(fid(0), fid(1));
        g.add_edge(fid(1), fid(2));
        assert!(g.recursive_groups().is_empty());
    }
}
