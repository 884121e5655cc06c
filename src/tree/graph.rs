//! DOT rendering of the tree for debugging.
//!
//! Same quiescence requirements as the validation walkers: render only
//! while no concurrent operation is in flight. Pipe the output through
//! `dot -Tsvg` to see the routing structure and the leaf chain.

use std::fmt::Write as _;

use crate::node::NodeRef;

use super::BPlusTree;

impl BPlusTree {
    /// Render the tree as a Graphviz digraph.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let Some(root) = self.load_root() else {
            return String::from("digraph bplustree {}\n");
        };

        let mut graph = String::from("digraph bplustree {\nnode [shape=record];\n");
        let mut edges = String::new();
        let mut leaves: Vec<NodeRef> = Vec::new();

        let mut frontier = vec![root];
        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for &node in &frontier {
                if node.is_leaf() {
                    // SAFETY: quiescent tree per module contract.
                    let leaf = unsafe { node.as_leaf() };
                    let label = leaf
                        .keys()
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("|");
                    let _ = writeln!(graph, "{} [label=\"{label}\"];", node_id(node));
                    leaves.push(node);
                } else {
                    // SAFETY: quiescent tree per module contract.
                    let inner = unsafe { node.as_inner() };
                    let label = (0..inner.len())
                        .map(|i| inner.separator_key(i).to_string())
                        .collect::<Vec<_>>()
                        .join("|");
                    let _ = writeln!(
                        graph,
                        "{} [label=\"{label}\" style=filled fillcolor=\"#f3b664\"];",
                        node_id(node)
                    );

                    let _ = writeln!(edges, "{} -> {};", node_id(node), node_id(inner.low_child()));
                    next_frontier.push(inner.low_child());
                    for i in 0..inner.len() {
                        let child = inner.child_at(i);
                        let _ = writeln!(edges, "{} -> {};", node_id(node), node_id(child));
                        next_frontier.push(child);
                    }
                }
            }
            frontier = next_frontier;
        }

        graph.push_str(&edges);

        // Chain the leaves on one rank so the linked list reads left to
        // right.
        if leaves.len() > 1 {
            graph.push_str("subgraph leaf_chain {\nrank=same;\n");
            for pair in leaves.windows(2) {
                let _ = writeln!(
                    graph,
                    "{} -> {} [dir=both constraint=false];",
                    node_id(pair[0]),
                    node_id(pair[1])
                );
            }
            graph.push_str("}\n");
        }

        graph.push_str("}\n");
        graph
    }
}

fn node_id(node: NodeRef) -> String {
    format!("node_{:x}", node.as_ptr() as usize)
}
