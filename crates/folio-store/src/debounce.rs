//! Payload edit coalescing.
//!
//! Typing into a paragraph produces a payload change per keystroke, and every
//! payload update is a row write. The debouncer keeps only the latest payload
//! per block and releases it once the block has been quiet for
//! `quiet_period`, or once it has been pending for `max_delay` under
//! continuous editing.
//!
//! Time is passed in rather than read, so the session decides when to poll.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use folio_types::{BlockId, Payload};

/// Timing for payload coalescing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Release after this long without a new edit.
    pub quiet_period: Duration,
    /// Release after this long regardless of further edits.
    pub max_delay: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(400),
            max_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug)]
struct PendingEdit {
    payload: Payload,
    first_push: Instant,
    last_push: Instant,
}

impl PendingEdit {
    fn due_at(&self, config: &DebounceConfig) -> Instant {
        (self.last_push + config.quiet_period).min(self.first_push + config.max_delay)
    }
}

/// Latest-wins buffer of payload edits, keyed by block.
#[derive(Debug, Default)]
pub struct PayloadDebouncer {
    config: DebounceConfig,
    pending: HashMap<BlockId, PendingEdit>,
}

impl PayloadDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Record an edit. Returns true if it replaced one still pending.
    pub fn push(&mut self, id: BlockId, payload: Payload, now: Instant) -> bool {
        match self.pending.get_mut(&id) {
            Some(edit) => {
                edit.payload = payload;
                edit.last_push = now;
                true
            }
            None => {
                self.pending.insert(
                    id,
                    PendingEdit {
                        payload,
                        first_push: now,
                        last_push: now,
                    },
                );
                false
            }
        }
    }

    /// Remove and return every edit due at `now`, oldest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(BlockId, Payload)> {
        let mut due: Vec<BlockId> = self
            .pending
            .iter()
            .filter(|(_, edit)| edit.due_at(&self.config) <= now)
            .map(|(id, _)| *id)
            .collect();
        due.sort_by_key(|id| self.pending.get(id).map(|e| e.first_push));

        due.into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|edit| (id, edit.payload)))
            .collect()
    }

    /// Remove and return everything, oldest first.
    pub fn drain_all(&mut self) -> Vec<(BlockId, Payload)> {
        let mut all: Vec<(BlockId, PendingEdit)> = self.pending.drain().collect();
        all.sort_by_key(|(_, edit)| edit.first_push);
        all.into_iter().map(|(id, edit)| (id, edit.payload)).collect()
    }

    /// Drop a pending edit without releasing it (the block was deleted).
    pub fn discard(&mut self, id: &BlockId) -> Option<Payload> {
        self.pending.remove(id).map(|edit| edit.payload)
    }

    /// The pending payload for a block, if any.
    pub fn peek(&self, id: &BlockId) -> Option<&Payload> {
        self.pending.get(id).map(|edit| &edit.payload)
    }

    /// When the next edit becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|e| e.due_at(&self.config)).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{BlockKind, ParagraphPayload};

    fn para(html: &str) -> Payload {
        Payload::Paragraph(ParagraphPayload {
            html: html.into(),
            ..Default::default()
        })
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_latest_payload_wins() {
        let mut d = PayloadDebouncer::default();
        let id = BlockId::new();
        let t0 = Instant::now();

        assert!(!d.push(id, para("h"), t0));
        assert!(d.push(id, para("he"), t0 + ms(50)));
        assert!(d.push(id, para("hello"), t0 + ms(100)));
        assert_eq!(d.len(), 1);

        assert!(d.take_due(t0 + ms(300)).is_empty());
        let due = d.take_due(t0 + ms(500));
        assert_eq!(due, vec![(id, para("hello"))]);
        assert!(d.is_empty());
    }

    #[test]
    fn test_max_delay_under_continuous_typing() {
        let mut d = PayloadDebouncer::new(DebounceConfig {
            quiet_period: ms(400),
            max_delay: ms(1000),
        });
        let id = BlockId::new();
        let t0 = Instant::now();

        let mut released = None;
        for i in 0..30u64 {
            let now = t0 + ms(i * 100);
            d.push(id, para(&i.to_string()), now);
            let due = d.take_due(now);
            if !due.is_empty() {
                released = Some((i, due));
                break;
            }
        }
        let (i, due) = released.unwrap();
        assert_eq!(i, 10);
        assert_eq!(due[0].1, para("10"));
    }

    #[test]
    fn test_drain_all_in_push_order() {
        let mut d = PayloadDebouncer::default();
        let (a, b) = (BlockId::new(), BlockId::new());
        let t0 = Instant::now();
        d.push(b, para("b"), t0);
        d.push(a, para("a"), t0 + ms(10));

        let ids: Vec<BlockId> = d.drain_all().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn test_discard_and_deadline() {
        let mut d = PayloadDebouncer::default();
        let id = BlockId::new();
        let t0 = Instant::now();
        assert_eq!(d.next_deadline(), None);

        d.push(id, Payload::default_for(BlockKind::Title), t0);
        assert_eq!(d.next_deadline(), Some(t0 + ms(400)));
        assert!(d.peek(&id).is_some());
        assert!(d.discard(&id).is_some());
        assert!(d.take_due(t0 + ms(5000)).is_empty());
    }
}
