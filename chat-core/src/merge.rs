//! Merge engine for chatsync.
//!
//! Combines one bulk snapshot and any number of live events for a
//! conversation into a single sequence that is:
//! - ordered by `client_timestamp` (ties keep arrival order)
//! - free of duplicates under [`Message::same_as`]
//! - monotonic: nothing once observed disappears until the engine is dropped
//!
//! The engine is a plain value. Whoever owns it is responsible for routing
//! every mutation through one place; `chat-client` does that with an actor.

use chat_types::Message;

/// Result of applying an input to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The view changed and should be republished.
    Changed,
    /// Nothing changed (duplicate input); do not republish.
    Unchanged,
}

impl Applied {
    /// True if the view changed.
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// A message plus the order in which it was first observed.
#[derive(Debug, Clone)]
struct Entry {
    message: Message,
    seq: u64,
}

impl Entry {
    fn order_key(&self) -> (i64, u64) {
        (self.message.client_timestamp(), self.seq)
    }
}

/// Ordered, duplicate-free view of one conversation.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    /// Sorted by `(client_timestamp, seq)`.
    entries: Vec<Entry>,
    /// Arrival counter; assigned on first observation of a logical message.
    next_seq: u64,
    /// Bumped on every change.
    revision: u64,
    snapshot_applied: bool,
}

impl MergeEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the bulk snapshot.
    ///
    /// Each snapshot copy replaces at most one equal-identity message already
    /// held (so a live echo is upgraded to the stored record) while keeping
    /// its original arrival position for ties. Messages already held that the snapshot
    /// does not represent are retained. Duplicates inside the batch collapse
    /// to their first occurrence. Applying the same snapshot again is a no-op.
    pub fn apply_snapshot(&mut self, batch: Vec<Message>) -> Applied {
        let mut merged: Vec<Entry> = Vec::with_capacity(batch.len() + self.entries.len());
        let mut represented = vec![false; self.entries.len()];

        for message in batch {
            if merged.iter().any(|e| e.message.same_as(&message)) {
                continue;
            }

            let seq = match self.claim(&message, &represented) {
                Some(i) => {
                    represented[i] = true;
                    self.entries[i].seq
                }
                None => self.take_seq(),
            };
            merged.push(Entry { message, seq });
        }

        for (entry, seen) in self.entries.iter().zip(represented) {
            if !seen {
                merged.push(entry.clone());
            }
        }

        merged.sort_by_key(Entry::order_key);
        self.snapshot_applied = true;

        let unchanged = merged.len() == self.entries.len()
            && merged
                .iter()
                .zip(&self.entries)
                .all(|(a, b)| a.message == b.message);
        if unchanged {
            return Applied::Unchanged;
        }

        self.entries = merged;
        self.revision += 1;
        Applied::Changed
    }

    /// The one held entry a snapshot message stands for, if any.
    ///
    /// `same_as` is not transitive, so a single snapshot row could match two
    /// different held messages. Preference: equal server id and equal
    /// composite, then equal composite, then equal server id. Entries already
    /// claimed are skipped; whatever stays unclaimed is kept as is.
    fn claim(&self, message: &Message, represented: &[bool]) -> Option<usize> {
        let same_id = |e: &Entry| {
            message.server_id().is_some() && e.message.server_id() == message.server_id()
        };
        let same_composite = |e: &Entry| {
            e.message.sender() == message.sender()
                && e.message.content() == message.content()
                && e.message.client_timestamp() == message.client_timestamp()
        };
        let find = |pred: &dyn Fn(&Entry) -> bool| {
            self.entries
                .iter()
                .enumerate()
                .find(|(i, e)| !represented[*i] && pred(*e))
                .map(|(i, _)| i)
        };

        find(&|e: &Entry| same_id(e) && same_composite(e))
            .or_else(|| find(&same_composite))
            .or_else(|| find(&same_id))
    }

    /// Apply one live event.
    ///
    /// A message whose identity is already present is discarded.
    pub fn apply_live(&mut self, message: Message) -> Applied {
        if self.contains(&message) {
            return Applied::Unchanged;
        }

        let seq = self.take_seq();
        let entry = Entry { message, seq };
        // seq is the largest so far, so the entry goes after all equal timestamps.
        let key = entry.order_key();
        let at = self.entries.partition_point(|e| e.order_key() <= key);
        self.entries.insert(at, entry);
        self.revision += 1;
        Applied::Changed
    }

    /// Check whether a message with the same identity is present.
    pub fn contains(&self, message: &Message) -> bool {
        self.entries.iter().any(|e| e.message.same_as(message))
    }

    /// The current view, in order.
    pub fn messages(&self) -> impl ExactSizeIterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    /// Copy the current view out.
    pub fn to_vec(&self) -> Vec<Message> {
        self.messages().cloned().collect()
    }

    /// Number of messages in the view.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the view is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of changes applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True once any snapshot has been applied.
    pub fn snapshot_applied(&self) -> bool {
        self.snapshot_applied
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::{MessageKind, ParticipantId, ServerId};

    fn msg(sender: &str, receiver: &str, content: &str, ts: i64) -> Message {
        Message::new(
            ParticipantId::new(sender).unwrap(),
            ParticipantId::new(receiver).unwrap(),
            content,
            MessageKind::Text,
            ts,
        )
    }

    fn contents(engine: &MergeEngine) -> Vec<&str> {
        engine.messages().map(Message::content).collect()
    }

    fn assert_invariants(engine: &MergeEngine) {
        let view = engine.to_vec();
        for pair in view.windows(2) {
            assert!(
                pair[0].client_timestamp() <= pair[1].client_timestamp(),
                "order violated: {:?}",
                view
            );
        }
        for (i, a) in view.iter().enumerate() {
            for b in &view[i + 1..] {
                assert!(
                    !(a.sender() == b.sender()
                        && a.content() == b.content()
                        && a.client_timestamp() == b.client_timestamp()),
                    "duplicate identity in view: {:?}",
                    view
                );
            }
        }
    }

    enum Input {
        Snapshot(Vec<Message>),
        Live(Message),
    }

    fn apply(engine: &mut MergeEngine, input: &Input) -> Applied {
        match input {
            Input::Snapshot(batch) => engine.apply_snapshot(batch.clone()),
            Input::Live(m) => engine.apply_live(m.clone()),
        }
    }

    fn permutations(n: usize) -> Vec<Vec<usize>> {
        if n == 0 {
            return vec![vec![]];
        }
        let mut out = Vec::new();
        for rest in permutations(n - 1) {
            for pos in 0..=rest.len() {
                let mut p = rest.clone();
                p.insert(pos, n - 1);
                out.push(p);
            }
        }
        out
    }

    // ===========================================
    // Snapshot Tests
    // ===========================================

    #[test]
    fn new_engine_is_empty() {
        let engine = MergeEngine::new();
        assert!(engine.is_empty());
        assert_eq!(engine.revision(), 0);
        assert!(!engine.snapshot_applied());
    }

    #[test]
    fn empty_snapshot_is_valid() {
        let mut engine = MergeEngine::new();
        assert_eq!(engine.apply_snapshot(vec![]), Applied::Unchanged);
        assert!(engine.snapshot_applied());
        assert!(engine.is_empty());
    }

    #[test]
    fn snapshot_is_sorted_regardless_of_store_order() {
        let mut engine = MergeEngine::new();
        engine.apply_snapshot(vec![
            msg("alice", "bob", "c", 300),
            msg("bob", "alice", "a", 100),
            msg("alice", "bob", "b", 200),
        ]);
        assert_eq!(contents(&engine), ["a", "b", "c"]);
        assert_invariants(&engine);
    }

    #[test]
    fn snapshot_is_idempotent() {
        let batch = vec![msg("alice", "bob", "hi", 100), msg("bob", "alice", "yo", 90)];
        let mut engine = MergeEngine::new();
        assert_eq!(engine.apply_snapshot(batch.clone()), Applied::Changed);
        let first = engine.to_vec();
        let revision = engine.revision();

        assert_eq!(engine.apply_snapshot(batch), Applied::Unchanged);
        assert_eq!(engine.to_vec(), first);
        assert_eq!(engine.revision(), revision);
    }

    #[test]
    fn duplicates_inside_snapshot_collapse() {
        let mut engine = MergeEngine::new();
        engine.apply_snapshot(vec![
            msg("alice", "bob", "hi", 100),
            msg("alice", "bob", "hi", 100),
        ]);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn snapshot_upgrades_live_copy_to_confirmed() {
        let mut engine = MergeEngine::new();
        engine.apply_live(msg("alice", "bob", "hi", 100));
        assert!(!engine.to_vec()[0].is_confirmed());

        let stored = msg("alice", "bob", "hi", 100).with_server_id(ServerId::new("1"));
        assert_eq!(engine.apply_snapshot(vec![stored]), Applied::Changed);
        assert_eq!(engine.len(), 1);
        assert!(engine.to_vec()[0].is_confirmed());
    }

    #[test]
    fn later_snapshot_never_shrinks_view() {
        let mut engine = MergeEngine::new();
        engine.apply_snapshot(vec![msg("alice", "bob", "a", 1), msg("alice", "bob", "b", 2)]);
        engine.apply_snapshot(vec![msg("alice", "bob", "b", 2)]);
        assert_eq!(contents(&engine), ["a", "b"]);
    }

    #[test]
    fn snapshot_row_claims_at_most_one_held_message() {
        let mut engine = MergeEngine::new();
        engine.apply_live(msg("alice", "bob", "hi", 100).with_server_id(ServerId::new("5")));
        engine.apply_live(msg("alice", "bob", "hey", 101));
        assert_eq!(engine.len(), 2);

        let stored = msg("alice", "bob", "hey", 101).with_server_id(ServerId::new("5"));
        engine.apply_snapshot(vec![stored.clone()]);

        assert_eq!(contents(&engine), ["hi", "hey"]);
        assert_eq!(engine.to_vec()[1], stored);
        assert_invariants(&engine);

        assert_eq!(engine.apply_snapshot(vec![stored]), Applied::Unchanged);
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn snapshot_falls_back_to_server_id_match() {
        let mut engine = MergeEngine::new();
        engine.apply_live(msg("alice", "bob", "draft", 100).with_server_id(ServerId::new("9")));
        engine.apply_live(msg("alice", "bob", "other", 100));

        let edited = msg("alice", "bob", "final", 100).with_server_id(ServerId::new("9"));
        engine.apply_snapshot(vec![edited]);

        assert_eq!(contents(&engine), ["final", "other"]);
    }

    // ===========================================
    // Live Event Tests
    // ===========================================

    #[test]
    fn live_event_is_idempotent() {
        let event = msg("alice", "bob", "hi", 100);
        let mut once = MergeEngine::new();
        once.apply_live(event.clone());

        let mut twice = MergeEngine::new();
        assert_eq!(twice.apply_live(event.clone()), Applied::Changed);
        assert_eq!(twice.apply_live(event), Applied::Unchanged);

        assert_eq!(once.to_vec(), twice.to_vec());
        assert_eq!(twice.revision(), 1);
    }

    #[test]
    fn live_events_inserted_in_timestamp_order() {
        let mut engine = MergeEngine::new();
        engine.apply_live(msg("alice", "bob", "late", 300));
        engine.apply_live(msg("alice", "bob", "early", 100));
        engine.apply_live(msg("bob", "alice", "middle", 200));
        assert_eq!(contents(&engine), ["early", "middle", "late"]);
    }

    #[test]
    fn ties_keep_arrival_order() {
        let mut engine = MergeEngine::new();
        engine.apply_live(msg("alice", "bob", "first", 100));
        engine.apply_live(msg("bob", "alice", "second", 100));
        engine.apply_live(msg("alice", "bob", "third", 100));
        assert_eq!(contents(&engine), ["first", "second", "third"]);

        // A snapshot listing them in another order keeps arrival order.
        engine.apply_snapshot(vec![
            msg("alice", "bob", "third", 100),
            msg("alice", "bob", "first", 100),
            msg("bob", "alice", "second", 100),
        ]);
        assert_eq!(contents(&engine), ["first", "second", "third"]);
    }

    #[test]
    fn ties_between_snapshot_and_later_live_keep_arrival_order() {
        let mut engine = MergeEngine::new();
        engine.apply_snapshot(vec![msg("alice", "bob", "stored", 100)]);
        engine.apply_live(msg("bob", "alice", "pushed", 100));
        assert_eq!(contents(&engine), ["stored", "pushed"]);
    }

    #[test]
    fn same_server_id_with_different_content_is_duplicate() {
        let mut engine = MergeEngine::new();
        engine.apply_live(msg("alice", "bob", "hi", 100).with_server_id(ServerId::new("5")));
        let applied =
            engine.apply_live(msg("alice", "bob", "hi!", 101).with_server_id(ServerId::new("5")));
        assert_eq!(applied, Applied::Unchanged);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn composite_collision_is_merged() {
        // Same sender, text and millisecond: treated as one message even with
        // distinct server ids.
        let mut engine = MergeEngine::new();
        engine.apply_live(msg("alice", "bob", "ok", 100).with_server_id(ServerId::new("1")));
        engine.apply_live(msg("alice", "bob", "ok", 100).with_server_id(ServerId::new("2")));
        assert_eq!(engine.len(), 1);
        assert_invariants(&engine);
    }

    // ===========================================
    // Scenario Tests
    // ===========================================

    #[test]
    fn snapshot_then_live() {
        let mut engine = MergeEngine::new();
        engine.apply_snapshot(vec![msg("alice", "bob", "hi", 100)]);

        assert_eq!(
            engine.apply_live(msg("alice", "bob", "hi", 100)),
            Applied::Unchanged
        );
        assert_eq!(engine.len(), 1);

        assert_eq!(
            engine.apply_live(msg("bob", "alice", "hey", 150)),
            Applied::Changed
        );
        let view = engine.to_vec();
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].client_timestamp(), 100);
        assert_eq!(view[1].client_timestamp(), 150);
        assert_eq!(view[1].sender().as_str(), "bob");
    }

    #[test]
    fn live_before_snapshot() {
        let live = msg("alice", "bob", "x", 200);
        let snapshot = vec![msg("alice", "bob", "y", 50)];

        let mut live_first = MergeEngine::new();
        live_first.apply_live(live.clone());
        live_first.apply_snapshot(snapshot.clone());

        let mut snapshot_first = MergeEngine::new();
        snapshot_first.apply_snapshot(snapshot);
        snapshot_first.apply_live(live);

        assert_eq!(contents(&live_first), ["y", "x"]);
        assert_eq!(live_first.to_vec(), snapshot_first.to_vec());
    }

    #[test]
    fn every_interleaving_converges() {
        let inputs = vec![
            Input::Snapshot(vec![
                msg("alice", "bob", "s1", 10),
                msg("bob", "alice", "s2", 30),
                msg("alice", "bob", "dup", 40),
            ]),
            Input::Live(msg("alice", "bob", "dup", 40)),
            Input::Live(msg("bob", "alice", "l1", 20)),
            Input::Live(msg("bob", "alice", "l1", 20)),
            Input::Live(msg("alice", "bob", "l2", 50)),
        ];

        let mut expected: Option<Vec<String>> = None;
        for order in permutations(inputs.len()) {
            let mut engine = MergeEngine::new();
            let mut last_len = 0;
            for &i in &order {
                apply(&mut engine, &inputs[i]);
                assert_invariants(&engine);
                assert!(engine.len() >= last_len, "view shrank in order {:?}", order);
                last_len = engine.len();
            }
            let got: Vec<String> = engine.messages().map(|m| m.content().to_string()).collect();
            match &expected {
                None => expected = Some(got),
                Some(e) => assert_eq!(&got, e, "diverged in order {:?}", order),
            }
        }
        assert_eq!(
            expected.unwrap(),
            ["s1", "l1", "s2", "dup", "l2"]
        );
    }

    #[test]
    fn unchanged_does_not_bump_revision() {
        let mut engine = MergeEngine::new();
        engine.apply_live(msg("alice", "bob", "a", 1));
        engine.apply_live(msg("alice", "bob", "a", 1));
        engine.apply_snapshot(vec![msg("alice", "bob", "a", 1)]);
        assert_eq!(engine.revision(), 1);
        assert!(Applied::Changed.is_changed());
        assert!(!Applied::Unchanged.is_changed());
    }
}
