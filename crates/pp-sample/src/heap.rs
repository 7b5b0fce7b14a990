//! Bounded Top-N selection over a min-heap of `Candidate`s.
//!
//! `Candidate`'s `Ord` is defined so that a *stronger* candidate (higher
//! score, or tied score with a lower pid) compares as *greater*. Wrapping
//! candidates in `Reverse` before pushing onto a `BinaryHeap` turns that
//! max-heap into a min-heap over strength: `peek()`/`pop()` always surface
//! the weakest retained candidate, which is exactly the one a new arrival
//! needs to beat to enter the Top-N.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use pp_common::{ProcessIdentity, ProcessInfo};

#[derive(Debug, Clone)]
pub struct Candidate {
    pub identity: ProcessIdentity,
    pub score: f64,
    pub info: ProcessInfo,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.identity.pid == other.identity.pid
    }
}
impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.identity.pid.0.cmp(&self.identity.pid.0))
    }
}

/// A fixed-capacity min-heap of the strongest `capacity` candidates seen so
/// far. Candidates bumped out by a stronger arrival are returned from
/// `offer` so the caller can route them to the tail aggregate instead of
/// dropping them silently.
pub struct TopHeap {
    capacity: usize,
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl TopHeap {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    /// Offer a candidate. Returns `Some(evicted)` if the heap was already
    /// at capacity and `candidate` either replaced the weakest retained
    /// entry (evicting it) or lost to it (the candidate itself is returned
    /// unevicted, i.e. it never entered the heap).
    pub fn offer(&mut self, candidate: Candidate) -> Option<Candidate> {
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(candidate));
            return None;
        }
        // `peek` on a `Reverse`-wrapped min-heap surfaces the weakest
        // retained candidate (the root = smallest-of-top).
        let weakest = &self.heap.peek().expect("heap at capacity is non-empty").0;
        if candidate.cmp(weakest) == Ordering::Greater {
            let Reverse(evicted) = self.heap.pop().expect("heap at capacity is non-empty");
            self.heap.push(Reverse(candidate));
            Some(evicted)
        } else {
            Some(candidate)
        }
    }

    /// Drain the heap into a strongest-first vector.
    pub fn into_sorted_vec(self) -> Vec<Candidate> {
        let mut v: Vec<Candidate> = self.heap.into_iter().map(|Reverse(c)| c).collect();
        v.sort_by(|a, b| b.cmp(a));
        v
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
