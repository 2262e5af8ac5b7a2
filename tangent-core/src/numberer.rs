//! Degree-of-freedom numbering.
//!
//! Maps every node DOF either to a global equation number or, when a
//! constraint acts on it, to a prescribed value. The order in which nodes
//! receive equation numbers controls the bandwidth of the assembled
//! operator; [`reverse_cuthill_mckee`] provides a bandwidth-reducing order.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::load::Constraint;
use crate::node::Node;
use crate::object::DomainObject;
use crate::registry::Registry;
use crate::types::{ObjectKind, Tag};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Node ordering strategy used when assigning equation numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NumbererKind {
    /// Ascending node tag.
    Plain,
    /// Reverse Cuthill–McKee on the node connectivity graph.
    #[default]
    ReverseCuthillMcKee,
}

/// Status of a single node DOF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dof {
    /// Unknown with the given equation number.
    Free(usize),
    /// Eliminated, with its prescribed displacement.
    Fixed(f64),
}

/// Global DOF numbering.
#[derive(Debug, Clone, Default)]
pub struct DofMap {
    nodes: HashMap<Tag, Vec<Dof>>,
    n_equations: usize,
}

impl DofMap {
    /// Number of free equations.
    pub fn n_equations(&self) -> usize {
        self.n_equations
    }

    /// DOF layout of a node.
    pub fn node(&self, tag: Tag) -> Result<&[Dof]> {
        self.nodes
            .get(&tag)
            .map(Vec::as_slice)
            .ok_or(Error::NotFound {
                kind: ObjectKind::Node,
                tag,
            })
    }

    /// Equation number of `(node, dof)`, `None` if eliminated.
    pub fn equation(&self, node: Tag, dof: usize) -> Option<usize> {
        match self.nodes.get(&node)?.get(dof)? {
            Dof::Free(eq) => Some(*eq),
            Dof::Fixed(_) => None,
        }
    }

    /// Equation numbers of an element's DOFs in node-major order.
    pub fn equations(&self, nodes: &[Tag]) -> Result<Vec<Option<usize>>> {
        let mut eqs = Vec::new();
        for &tag in nodes {
            eqs.extend(self.node(tag)?.iter().map(|dof| match dof {
                Dof::Free(eq) => Some(*eq),
                Dof::Fixed(_) => None,
            }));
        }
        Ok(eqs)
    }

    /// Gather the displacement of `nodes` from a global vector, substituting
    /// prescribed values for eliminated DOFs.
    pub fn gather(&self, nodes: &[Tag], u: &DVector<f64>) -> Result<Vec<f64>> {
        let mut field = Vec::new();
        for &tag in nodes {
            field.extend(self.node(tag)?.iter().map(|dof| match dof {
                Dof::Free(eq) => u[*eq],
                Dof::Fixed(value) => *value,
            }));
        }
        Ok(field)
    }

    /// Refresh prescribed values from the constraint registry.
    pub fn apply_constraints(&mut self, constraints: &Registry<Constraint>) -> Result<()> {
        for c in constraints.iter_active() {
            // Constraints on disabled nodes do not take part
            let Some(slots) = self.nodes.get_mut(&c.node()) else {
                continue;
            };
            match slots.get_mut(c.dof()) {
                Some(slot @ Dof::Fixed(_)) => *slot = Dof::Fixed(c.value()),
                _ => {
                    return Err(Error::Configuration(format!(
                        "constraint {} was added after numbering",
                        c.tag()
                    )))
                }
            }
        }
        Ok(())
    }
}

/// Assign equation numbers to every active node DOF.
///
/// # Errors
///
/// - [`Error::NotFound`] if a constraint or active element refers to a
///   missing or disabled node
/// - [`Error::Configuration`] if a constraint targets a DOF the node does
///   not have, or two constraints target the same DOF
pub fn number_dofs(
    nodes: &Registry<Node>,
    elements: &Registry<Box<dyn Element>>,
    constraints: &Registry<Constraint>,
    kind: NumbererKind,
) -> Result<DofMap> {
    let mut fixed: HashMap<(Tag, usize), (Tag, f64)> = HashMap::new();
    for c in constraints.iter_active() {
        let node = nodes.at(c.node())?;
        if !nodes.is_active(c.node()) {
            continue;
        }
        if c.dof() >= node.ndf() {
            return Err(Error::Configuration(format!(
                "constraint {} targets DOF {} of node {} which has {} DOFs",
                c.tag(),
                c.dof(),
                c.node(),
                node.ndf()
            )));
        }
        if let Some((other, _)) = fixed.insert((c.node(), c.dof()), (c.tag(), c.value())) {
            return Err(Error::Configuration(format!(
                "constraints {} and {} both act on DOF {} of node {}",
                other,
                c.tag(),
                c.dof(),
                c.node()
            )));
        }
    }

    for element in elements.iter_active() {
        if let Some(&missing) = element.nodes().iter().find(|&&t| !nodes.is_active(t)) {
            return Err(Error::NotFound {
                kind: ObjectKind::Node,
                tag: missing,
            });
        }
    }

    let order = node_order(nodes, elements, kind);

    let mut map = DofMap::default();
    let mut next = 0;
    for tag in order {
        let node = nodes.at(tag)?;
        let slots = (0..node.ndf())
            .map(|dof| match fixed.get(&(tag, dof)) {
                Some(&(_, value)) => Dof::Fixed(value),
                None => {
                    next += 1;
                    Dof::Free(next - 1)
                }
            })
            .collect();
        map.nodes.insert(tag, slots);
    }
    map.n_equations = next;
    Ok(map)
}

fn node_order(
    nodes: &Registry<Node>,
    elements: &Registry<Box<dyn Element>>,
    kind: NumbererKind,
) -> Vec<Tag> {
    let tags: Vec<Tag> = nodes.active().to_vec();
    if kind == NumbererKind::Plain {
        return tags;
    }

    let index: HashMap<Tag, usize> = tags.iter().enumerate().map(|(i, &t)| (t, i)).collect();
    let mut adjacency = vec![Vec::new(); tags.len()];
    for element in elements.iter_active() {
        let connected: Vec<usize> = element
            .nodes()
            .iter()
            .filter_map(|tag| index.get(tag).copied())
            .collect();
        for &a in &connected {
            for &b in &connected {
                if a != b {
                    adjacency[a].push(b);
                }
            }
        }
    }
    for neighbors in &mut adjacency {
        neighbors.sort_unstable();
        neighbors.dedup();
    }

    reverse_cuthill_mckee(&adjacency)
        .into_iter()
        .map(|i| tags[i])
        .collect()
}

/// Reverse Cuthill–McKee ordering of an undirected graph.
///
/// `adjacency[v]` lists the neighbors of vertex `v`; every listed neighbor
/// must be `< adjacency.len()`. Returns `order` such that `order[k]` is the
/// original vertex placed at position `k`. Each connected component is
/// started from its lowest-degree unvisited vertex and neighbors are
/// expanded in ascending degree (ties broken by index).
pub fn reverse_cuthill_mckee(adjacency: &[Vec<usize>]) -> Vec<usize> {
    let n = adjacency.len();
    let degree: Vec<usize> = adjacency.iter().map(Vec::len).collect();

    let mut starts: Vec<usize> = (0..n).collect();
    starts.sort_by_key(|&v| (degree[v], v));

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    for start in starts {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        while let Some(v) = queue.pop_front() {
            order.push(v);
            let mut next: Vec<usize> = adjacency[v]
                .iter()
                .copied()
                .filter(|&w| {
                    debug_assert!(w < n, "neighbor {} out of range", w);
                    !visited[w]
                })
                .collect();
            next.sort_by_key(|&w| (degree[w], w));
            next.dedup();
            for w in next {
                visited[w] = true;
                queue.push_back(w);
            }
        }
    }

    order.reverse();
    order
}

/// Bandwidth of the graph when vertices are relabelled by `order`.
pub fn bandwidth(adjacency: &[Vec<usize>], order: &[usize]) -> usize {
    let mut position = vec![0; adjacency.len()];
    for (k, &v) in order.iter().enumerate() {
        position[v] = k;
    }
    adjacency
        .iter()
        .enumerate()
        .flat_map(|(v, neighbors)| neighbors.iter().map(move |&w| (v, w)))
        .map(|(v, w)| position[v].abs_diff(position[w]))
        .max()
        .unwrap_or(0)
}
