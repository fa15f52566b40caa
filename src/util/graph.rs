//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

/// Basic graph data structure
/// - source: http://smallcultfollowing.com/babysteps/blog/2015/04/06/modeling-graphs-in-rust-using-vector-indices/
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};

pub type NodeIndex = usize;

#[derive(Debug, PartialEq)]
struct NodeData<V> {
    node: V,
    first_outgoing_edge: Option<EdgeIndex>,
    first_incoming_edge: Option<EdgeIndex>,
}

type EdgeIndex = usize;

#[derive(Debug, PartialEq)]
struct EdgeData<E> {
    edge: E,
    source: NodeIndex,
    target: NodeIndex,
    next_outgoing_edge: Option<EdgeIndex>,
    next_incoming_edge: Option<EdgeIndex>,
}

#[derive(Debug, PartialEq)]
pub struct Graph<V, E> {
    vertices: Vec<NodeData<V>>,
    edges: Vec<EdgeData<E>>,
}

impl<V, E> Graph<V, E> {
    /// Creates an empty `Graph` struct.
    pub fn new() -> Self {
        Self {
            edges: Vec::new(),
            vertices: Vec::new(),
        }
    }

    /// Adds a new node to the graph.
    ///
    /// Returns the `NodeIndex` to remember the node.
    pub fn add_node(&mut self, node: V) -> NodeIndex {
        let index = self.vertices.len();
        self.vertices.push(NodeData {
            node: node,
            first_outgoing_edge: None,
            first_incoming_edge: None,
        });
        index
    }

    /// Checks if a given `source` node is in the graph.
    pub fn has_node(&self, source: NodeIndex) -> bool {
        source < self.node_count()
    }

    /// Checks if a given `source` node is connected to the given `target` node.
    pub fn has_edge(&self, source: NodeIndex, target: NodeIndex) -> bool {
        let mut successors = self.successors(source);
        successors.find(|f| f == &target).is_some()
    }

    /// Returns the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Accesses the node data label behind the `node` index.
    pub fn get_node(&self, node: NodeIndex) -> Option<&V> {
        Some(&self.vertices.get(node)?.node)
    }

    /// Adds a new edge to the graph from `source` to `target`.
    ///
    /// Duplicate edges and self-loops are rejected and reported through the
    /// returned [EdgeStatus].
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, cost: E) -> EdgeStatus {
        if self.has_node(source) == false {
            return EdgeStatus::MissingSource;
        }
        if self.has_node(target) == false {
            return EdgeStatus::MissingTarget;
        }
        // do not allow self-loops
        if source == target {
            return EdgeStatus::SelfLoop;
        }
        // do not allow duplicate edges
        if self.has_edge(source, target) == true {
            return EdgeStatus::AlreadyExists;
        }

        let edge_index = self.edges.len();
        let next_outgoing_edge = self.vertices[source].first_outgoing_edge;
        let next_incoming_edge = self.vertices[target].first_incoming_edge;
        self.edges.push(EdgeData {
            source: source,
            edge: cost,
            target: target,
            next_outgoing_edge: next_outgoing_edge,
            next_incoming_edge: next_incoming_edge,
        });
        self.vertices[source].first_outgoing_edge = Some(edge_index);
        self.vertices[target].first_incoming_edge = Some(edge_index);
        EdgeStatus::Success
    }

    /// Returns the number of predecessors to the `target` node.
    pub fn in_degree(&self, target: NodeIndex) -> usize {
        self.predecessors(target).count()
    }

    /// Creates an iterator over the incoming nodes to the `target` source.
    pub fn predecessors(&self, target: NodeIndex) -> Predecessors<V, E> {
        let first_incoming_edge = self.vertices[target].first_incoming_edge;
        Predecessors {
            graph: self,
            current_edge_index: first_incoming_edge,
        }
    }

    /// Creates an iterator over the outgoing nodes from the `source` node.
    ///
    /// Nodes are visited from the most recently connected to the first connected.
    pub fn successors(&self, source: NodeIndex) -> Successors<V, E> {
        let first_outgoing_edge = self.vertices[source].first_outgoing_edge;
        Successors {
            graph: self,
            current_edge_index: first_outgoing_edge,
        }
    }

    /// Collects every node that can reach `target` by following edges forward.
    ///
    /// The `target` itself is not included.
    pub fn ancestors(&self, target: NodeIndex) -> HashSet<NodeIndex> {
        let mut visited = HashSet::new();
        let mut tunnels: Vec<NodeIndex> = self.predecessors(target).collect();
        while let Some(n) = tunnels.pop() {
            if visited.insert(n) == true {
                tunnels.extend(self.predecessors(n));
            }
        }
        visited
    }

    /// Finds the shortest path of nodes leading from `source` to `target`.
    ///
    /// The path starts with `source` and ends with `target`.
    pub fn find_path(&self, source: NodeIndex, target: NodeIndex) -> Option<Vec<NodeIndex>> {
        self.shortest_path_within(source, target, &|_| true)
    }

    fn shortest_path_within(
        &self,
        source: NodeIndex,
        target: NodeIndex,
        allow: &dyn Fn(NodeIndex) -> bool,
    ) -> Option<Vec<NodeIndex>> {
        if source == target {
            return Some(vec![source]);
        }
        let mut parent: Vec<Option<NodeIndex>> = vec![None; self.node_count()];
        let mut seen = vec![false; self.node_count()];
        let mut queue = VecDeque::new();
        seen[source] = true;
        queue.push_back(source);
        while let Some(n) = queue.pop_front() {
            for s in self.successors(n) {
                if seen[s] == true || allow(s) == false {
                    continue;
                }
                seen[s] = true;
                parent[s] = Some(n);
                if s == target {
                    // rewind the chain of parents
                    let mut path = vec![s];
                    let mut cur = s;
                    while let Some(p) = parent[cur] {
                        path.push(p);
                        cur = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(s);
            }
        }
        None
    }

    /// Finds the shortest cycle that only passes through the nodes in `within`.
    ///
    /// Candidates are tried in order of `key` so the same graph always reports the
    /// same cycle. The returned path begins and ends at different nodes; the
    /// closing edge runs from the last node back to the first.
    pub fn shortest_cycle<K, F>(&self, within: &HashSet<NodeIndex>, key: F) -> Option<Vec<NodeIndex>>
    where
        K: Ord,
        F: Fn(NodeIndex) -> K,
    {
        let mut candidates: Vec<NodeIndex> = within.iter().copied().collect();
        candidates.sort_by_key(|n| key(*n));

        let mut best: Option<Vec<NodeIndex>> = None;
        for start in candidates {
            // check every edge that closes back into `start`
            for last in self.predecessors(start) {
                if within.contains(&last) == false {
                    continue;
                }
                if let Some(path) =
                    self.shortest_path_within(start, last, &|n| within.contains(&n))
                {
                    let is_shorter = match &best {
                        Some(b) => path.len() < b.len(),
                        None => true,
                    };
                    if is_shorter == true {
                        best = Some(path);
                    }
                }
            }
        }
        best
    }

    /// Performs topological sort where ties between ready nodes are broken by the
    /// smallest `key`.
    ///
    /// A node given as `hold` is only placed once no other node is ready. Nodes
    /// that cannot be placed (because they sit on or behind a cycle) are left out
    /// of the returned order.
    pub fn topological_sort_by_key<K, F>(&self, key: F, hold: Option<NodeIndex>) -> Vec<NodeIndex>
    where
        K: Ord,
        F: Fn(NodeIndex) -> K,
    {
        let mut order = Vec::<NodeIndex>::with_capacity(self.node_count());
        let mut remaining: Vec<usize> = (0..self.node_count()).map(|i| self.in_degree(i)).collect();

        let mut ready = BinaryHeap::new();
        let mut held = false;
        for (i, deg) in remaining.iter().enumerate() {
            if *deg == 0 {
                match Some(i) == hold {
                    true => held = true,
                    false => ready.push(Reverse((key(i), i))),
                }
            }
        }

        loop {
            let current = match ready.pop() {
                Some(Reverse((_, i))) => i,
                None => match held {
                    true => {
                        held = false;
                        hold.unwrap_or_default()
                    }
                    false => break,
                },
            };
            order.push(current);
            for s in self.successors(current) {
                remaining[s] -= 1;
                if remaining[s] == 0 {
                    match Some(s) == hold {
                        true => held = true,
                        false => ready.push(Reverse((key(s), s))),
                    }
                }
            }
        }
        order
    }

    /// Recursively generates the in-order y-down list of nodes to print with their
    /// corresponding twig style and level of indentation.
    fn recurse_treeview(
        &self,
        target: NodeIndex,
        level: Twig,
        path: &mut Vec<NodeIndex>,
    ) -> Vec<(Twig, NodeIndex)> {
        let mut traversal = Vec::new();
        traversal.push((level.clone(), target));
        // guard against revisiting a node already on the current branch
        if path.contains(&target) == true {
            return traversal;
        }
        path.push(target);
        // display children in the order they were connected
        let mut children: Vec<NodeIndex> = self.successors(target).collect();
        children.reverse();
        let mut tunnels = children.into_iter().peekable();
        while let Some(n) = tunnels.next() {
            // remember the order and parent branch type
            let twig_type = match tunnels.peek() {
                Some(_) => Twig::MidBranch(Some(Box::new(level.clone()))),
                None => Twig::EndLeaf(Some(Box::new(level.clone()))),
            };
            traversal.append(&mut self.recurse_treeview(n, twig_type, path));
        }
        path.pop();
        traversal
    }

    /// Creates the in-order y-down list of nodes reachable from `root` with their
    /// corresponding indentation depth and twig style.
    pub fn treeview(&self, root: NodeIndex) -> Vec<(Twig, NodeIndex)> {
        self.recurse_treeview(root, Twig::EndLeaf(None), &mut Vec::new())
    }
}

#[derive(Debug, PartialEq)]
pub enum EdgeStatus {
    MissingSource,
    MissingTarget,
    SelfLoop,
    AlreadyExists,
    Success,
}

impl EdgeStatus {
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Success => true,
            _ => false,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Twig {
    EndLeaf(Option<Box<Twig>>),
    MidBranch(Option<Box<Twig>>),
}

impl Twig {
    /// Accesses what type of node was the parent to the current `self`.
    pub fn get_upper(&self) -> Option<&Twig> {
        match self {
            Self::EndLeaf(e) => e.as_deref(),
            Self::MidBranch(e) => e.as_deref(),
        }
    }

    /// Converts the twig's text from box-drawing characters to plain ascii.
    pub fn to_ascii(&self) -> String {
        self.to_string()
            .chars()
            .map(|c| match c {
                '─' => '-',
                '│' => '|',
                '├' => '+',
                '└' => '\\',
                _ => c,
            })
            .collect()
    }
}

impl std::fmt::Display for Twig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // determine the spacing leading up the node in the tree
        let space: String = {
            let mut space = String::new();
            let mut x = self;
            while let Some(n) = x.get_upper() {
                match n {
                    Self::EndLeaf(q) => {
                        if q.is_some() {
                            space.push_str("   ")
                        }
                    }
                    Self::MidBranch(q) => {
                        if q.is_some() {
                            space.push_str("  │")
                        }
                    }
                }
                x = n;
            }
            // twig chains are collected bottom-up
            space.chars().rev().collect()
        };

        match self {
            Self::EndLeaf(m) => match m.is_none() {
                true => write!(f, ""),
                false => write!(f, "{}└─ ", space),
            },
            Self::MidBranch(_) => write!(f, "{}├─ ", space),
        }
    }
}

pub struct Predecessors<'graph, V, E> {
    graph: &'graph Graph<V, E>,
    current_edge_index: Option<EdgeIndex>,
}

impl<'graph, V, E> Iterator for Predecessors<'graph, V, E> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current_edge_index {
            None => None,
            Some(edge_num) => {
                let edge = &self.graph.edges[edge_num];
                self.current_edge_index = edge.next_incoming_edge;
                Some(edge.source)
            }
        }
    }
}

pub struct Successors<'graph, V, E> {
    graph: &'graph Graph<V, E>,
    current_edge_index: Option<EdgeIndex>,
}

impl<'graph, V, E> Iterator for Successors<'graph, V, E> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current_edge_index {
            None => None,
            Some(edge_num) => {
                let edge = &self.graph.edges[edge_num];
                self.current_edge_index = edge.next_outgoing_edge;
                Some(edge.target)
            }
        }
    }
}
