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

use super::graph::{EdgeStatus, Graph, NodeIndex};
use std::{collections::HashMap, hash::Hash};

/// A [Graph] whose nodes are also looked up by a unique key.
#[derive(Debug)]
pub struct GraphMap<K: Eq + Hash + Clone, V, E> {
    graph: Graph<K, E>,
    map: HashMap<K, Node<V>>,
}

#[derive(Debug, PartialEq)]
pub struct Node<V>(V, NodeIndex);

impl<V> Node<V> {
    pub fn index(&self) -> NodeIndex {
        self.1
    }

    pub fn as_ref(&self) -> &V {
        &self.0
    }

    pub fn as_ref_mut(&mut self) -> &mut V {
        &mut self.0
    }
}

impl<K: Eq + Hash + Clone, V, E> GraphMap<K, V, E> {
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            map: HashMap::new(),
        }
    }

    /// Inserts a node under `key`.
    ///
    /// Returns the existing index without modifying anything when `key` is
    /// already taken.
    pub fn add_node(&mut self, key: K, value: V) -> NodeIndex {
        if let Some(existing) = self.map.get(&key) {
            return existing.index();
        }
        let iden = self.graph.add_node(key.clone());
        self.map.insert(key, Node(value, iden));
        iden
    }

    pub fn add_edge_by_key(&mut self, source: &K, target: &K, cost: E) -> EdgeStatus {
        let source = match self.map.get(source) {
            Some(i) => i.index(),
            None => return EdgeStatus::MissingSource,
        };
        let target = match self.map.get(target) {
            Some(i) => i.index(),
            None => return EdgeStatus::MissingTarget,
        };
        self.graph.add_edge(source, target, cost)
    }

    pub fn add_edge_by_index(&mut self, source: NodeIndex, target: NodeIndex, cost: E) -> EdgeStatus {
        self.graph.add_edge(source, target, cost)
    }

    pub fn get_node_by_key(&self, key: &K) -> Option<&Node<V>> {
        self.map.get(key)
    }

    pub fn get_node_by_index(&self, index: NodeIndex) -> Option<&Node<V>> {
        self.map.get(self.graph.get_node(index)?)
    }

    pub fn get_node_by_index_mut(&mut self, index: NodeIndex) -> Option<&mut Node<V>> {
        let key = self.graph.get_node(index)?;
        self.map.get_mut(key)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Iterates over the (key, value) pairs in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        (0..self.graph.node_count()).filter_map(move |i| {
            let key = self.graph.get_node(i)?;
            Some((key, self.map.get(key)?.as_ref()))
        })
    }

    pub fn get_graph(&self) -> &Graph<K, E> {
        &self.graph
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_node_is_idempotent_by_key() {
        let mut g: GraphMap<&str, u8, ()> = GraphMap::new();
        let a = g.add_node("a", 1);
        let b = g.add_node("b", 2);
        assert_eq!(g.add_node("a", 9), a);
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.get_node_by_key(&"a").unwrap().as_ref(), &1);
        assert_eq!(g.get_node_by_index(b).unwrap().as_ref(), &2);
    }

    #[test]
    fn edges_by_key() {
        let mut g: GraphMap<&str, (), ()> = GraphMap::new();
        g.add_node("a", ());
        g.add_node("b", ());
        assert_eq!(g.add_edge_by_key(&"a", &"b", ()), EdgeStatus::Success);
        assert_eq!(g.add_edge_by_key(&"a", &"b", ()), EdgeStatus::AlreadyExists);
        assert_eq!(g.add_edge_by_key(&"z", &"b", ()), EdgeStatus::MissingSource);
        assert_eq!(g.get_graph().edge_count(), 1);
    }

    #[test]
    fn iter_in_insertion_order() {
        let mut g: GraphMap<String, usize, ()> = GraphMap::new();
        for (i, k) in ["z", "m", "a"].iter().enumerate() {
            g.add_node(k.to_string(), i);
        }
        let keys: Vec<&String> = g.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "m", "a"]);
    }
}
