//! Min-priority queue keyed by path length
//! Used for Dijkstra on surface meshes where priorities are continuous distances
//!
//! Shorter distance = popped first; equal distances pop the lower node index first

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Clone, Copy, Debug)]
struct Entry {
    dist: f64,
    node: usize,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.total_cmp(&other.dist).then(self.node.cmp(&other.node))
    }
}

pub struct DistanceQueue {
    heap: BinaryHeap<Reverse<Entry>>,
}

impl DistanceQueue {
    pub fn new() -> Self {
        DistanceQueue { heap: BinaryHeap::new() }
    }

    #[inline]
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline]
    pub fn push(&mut self, dist: f64, node: usize) {
        self.heap.push(Reverse(Entry { dist, node }));
    }

    #[inline]
    pub fn pop(&mut self) -> Option<(f64, usize)> {
        self.heap.pop().map(|Reverse(e)| (e.dist, e.node))
    }
}
