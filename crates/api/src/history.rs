//! The reversible mutation journal.
//!
//! Every state listener routes its mutations through a [`History`]: each
//! change is staged as a paired forward/backward closure over the listener's
//! state, committed when the block settles, and undone in reverse insertion
//! order on rollback. No state is mutated outside the journal, which is what
//! makes rollback deterministic.

/// One journalled mutation.
struct Entry<S> {
    height: u32,
    forward: Box<dyn Fn(&mut S) + Send + Sync>,
    backward: Box<dyn Fn(&mut S) + Send + Sync>,
}

/// An append-only journal of paired do/undo closures indexed by block height.
///
/// The journal never interprets the closures; values they need are captured
/// by value at append time, so replaying them is pure with respect to the
/// state parameter.
pub struct History<S> {
    committed: Vec<Entry<S>>,
    staged: Vec<Entry<S>>,
    /// Height of the last committed block.
    height: u32,
}

impl<S> Default for History<S> {
    fn default() -> Self {
        History {
            committed: Vec::new(),
            staged: Vec::new(),
            height: 0,
        }
    }
}

impl<S> History<S> {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Height of the last committed block.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of committed entries still held for rollback.
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// True when no committed entries remain.
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Stages a mutation for the block at `height`.
    ///
    /// The forward closure runs when [`commit`](History::commit) seals the
    /// block; the backward closure must exactly invert it.
    pub fn append<F, B>(&mut self, height: u32, forward: F, backward: B)
    where
        F: Fn(&mut S) + Send + Sync + 'static,
        B: Fn(&mut S) + Send + Sync + 'static,
    {
        self.staged.push(Entry {
            height,
            forward: Box::new(forward),
            backward: Box::new(backward),
        });
    }

    /// Executes all staged mutations against `state` and seals them at
    /// `height`.
    pub fn commit(&mut self, height: u32, state: &mut S) {
        for entry in &self.staged {
            (entry.forward)(state);
        }
        self.committed.append(&mut self.staged);
        self.height = height;
    }

    /// Undoes every committed mutation above `height`, most recent first.
    pub fn rollback_to(&mut self, height: u32, state: &mut S) {
        while let Some(entry) = self.committed.last() {
            if entry.height <= height {
                break;
            }
            // Pop first so a panic in the closure cannot replay it.
            if let Some(entry) = self.committed.pop() {
                (entry.backward)(state);
            }
        }
        self.staged.clear();
        self.height = height.min(self.height);
    }

    /// Drops journal entries above `height` without executing them.
    ///
    /// Used after the owning state has been replaced wholesale from a
    /// snapshot, where running the undo closures would double-apply.
    pub fn seek_to(&mut self, height: u32) {
        self.committed.retain(|e| e.height <= height);
        self.staged.clear();
        self.height = height.min(self.height);
    }

    /// Discards entries at or below `height`, freeing memory for blocks
    /// that can no longer be rolled back.
    pub fn prune_below(&mut self, height: u32) {
        self.committed.retain(|e| e.height > height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, PartialEq, Debug, Clone)]
    struct Counters {
        a: i64,
        b: i64,
    }

    fn apply_block(h: &mut History<Counters>, state: &mut Counters, height: u32, delta: i64) {
        h.append(
            height,
            move |s: &mut Counters| s.a += delta,
            move |s: &mut Counters| s.a -= delta,
        );
        h.append(
            height,
            move |s: &mut Counters| s.b -= delta,
            move |s: &mut Counters| s.b += delta,
        );
        h.commit(height, state);
    }

    #[test]
    fn commit_applies_in_order() {
        let mut h = History::new();
        let mut state = Counters::default();
        apply_block(&mut h, &mut state, 1, 5);
        assert_eq!(state, Counters { a: 5, b: -5 });
        assert_eq!(h.height(), 1);
    }

    #[test]
    fn rollback_restores_exact_state() {
        let mut h = History::new();
        let mut state = Counters::default();
        apply_block(&mut h, &mut state, 1, 5);
        let at_one = state.clone();
        apply_block(&mut h, &mut state, 2, 7);
        apply_block(&mut h, &mut state, 3, 11);

        h.rollback_to(1, &mut state);
        assert_eq!(state, at_one);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn reapply_after_rollback_matches_direct_apply() {
        // apply(1..=3); rollback(1); apply(2', 3') == apply(1, 2', 3')
        let mut h = History::new();
        let mut state = Counters::default();
        apply_block(&mut h, &mut state, 1, 5);
        apply_block(&mut h, &mut state, 2, 7);
        apply_block(&mut h, &mut state, 3, 11);
        h.rollback_to(1, &mut state);
        apply_block(&mut h, &mut state, 2, 100);
        apply_block(&mut h, &mut state, 3, 200);

        let mut h2 = History::new();
        let mut direct = Counters::default();
        apply_block(&mut h2, &mut direct, 1, 5);
        apply_block(&mut h2, &mut direct, 2, 100);
        apply_block(&mut h2, &mut direct, 3, 200);

        assert_eq!(state, direct);
    }

    #[test]
    fn seek_drops_without_executing() {
        let mut h = History::new();
        let mut state = Counters::default();
        apply_block(&mut h, &mut state, 1, 5);
        apply_block(&mut h, &mut state, 2, 7);
        let before = state.clone();

        h.seek_to(1);
        assert_eq!(state, before);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn staged_but_uncommitted_entries_do_not_mutate() {
        let mut h: History<Counters> = History::new();
        let mut state = Counters::default();
        h.append(1, |s: &mut Counters| s.a += 1, |s: &mut Counters| s.a -= 1);
        assert_eq!(state.a, 0);
        h.rollback_to(0, &mut state);
        assert_eq!(state.a, 0);
        assert!(h.is_empty());
    }
}
