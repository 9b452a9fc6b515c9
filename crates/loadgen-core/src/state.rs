//! Per-session mutable state owned by a single virtual user.

use rand::seq::SliceRandom;
use rand::Rng;

/// Private record of one virtual user's session.
///
/// Seed identifiers are copied in at spawn time. Nothing outside the owning
/// user ever holds a reference to this value, so it needs no locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualUserState {
    known_ids: Vec<String>,
    created_ids: Vec<String>,
    sequence_counter: u64,
}

impl VirtualUserState {
    pub fn new(known_ids: &[String], counter_base: u64) -> Self {
        Self {
            known_ids: known_ids.to_vec(),
            created_ids: Vec::new(),
            sequence_counter: counter_base,
        }
    }

    /// Identifiers known to exist before the session started.
    pub fn known_ids(&self) -> &[String] {
        &self.known_ids
    }

    /// Identifiers this session created, in creation order.
    pub fn created_ids(&self) -> &[String] {
        &self.created_ids
    }

    pub fn sequence_counter(&self) -> u64 {
        self.sequence_counter
    }

    /// Take the current counter value and advance it.
    pub fn next_sequence(&mut self) -> u64 {
        let value = self.sequence_counter;
        self.sequence_counter += 1;
        value
    }

    /// Pick uniformly among known and created identifiers.
    pub fn choose_existing<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        let total = self.known_ids.len() + self.created_ids.len();
        if total == 0 {
            return None;
        }
        let idx = rng.gen_range(0..total);
        let id = if idx < self.known_ids.len() {
            &self.known_ids[idx]
        } else {
            &self.created_ids[idx - self.known_ids.len()]
        };
        Some(id.as_str())
    }

    /// Pick uniformly among the seed identifiers only.
    pub fn choose_known<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.known_ids.choose(rng).map(String::as_str)
    }

    // Append-only; called by the user loop after a 201 to its own create.
    pub(crate) fn record_created(&mut self, id: String) {
        self.created_ids.push(id);
    }
}
