//! Scheduled topology-switch events.
//!
//! Events are `(time, topology-index)` pairs supplied before the run
//! begins. They fire in time order; events scheduled at the same instant
//! apply in registration order, so with conflicting targets the last
//! registered one wins. That ordering is a contract, not an accident.

use vf_core::numeric::Real;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchEvent {
    pub time: Real,
    pub topology: usize,
}

#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<SwitchEvent>,
    cursor: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: Real, topology: usize) {
        self.events.push(SwitchEvent { time, topology });
    }

    /// Sort by time (stable, preserving registration order for ties) and
    /// validate every target. Returns the first invalid topology index.
    pub fn finalize(&mut self, topology_count: usize) -> Result<(), usize> {
        self.events.sort_by(|a, b| a.time.total_cmp(&b.time));
        for event in &self.events {
            if event.topology >= topology_count {
                return Err(event.topology);
            }
        }
        self.cursor = 0;
        Ok(())
    }

    /// Pop the next event due at or before `now` (within `tol`).
    pub fn due(&mut self, now: Real, tol: Real) -> Option<SwitchEvent> {
        let event = *self.events.get(self.cursor)?;
        if event.time <= now + tol {
            self.cursor += 1;
            Some(event)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_time_order() {
        let mut queue = EventQueue::new();
        queue.push(2.0, 0);
        queue.push(1.0, 1);
        queue.finalize(2).unwrap();

        assert_eq!(queue.due(1.0, 0.0).unwrap().topology, 1);
        assert!(queue.due(1.0, 0.0).is_none());
        assert_eq!(queue.due(2.0, 0.0).unwrap().topology, 0);
    }

    #[test]
    fn same_instant_keeps_registration_order() {
        let mut queue = EventQueue::new();
        queue.push(1.0, 2);
        queue.push(1.0, 0);
        queue.push(1.0, 1);
        queue.finalize(3).unwrap();

        let fired: Vec<usize> = std::iter::from_fn(|| queue.due(1.0, 0.0))
            .map(|e| e.topology)
            .collect();
        assert_eq!(fired, vec![2, 0, 1]);
    }

    #[test]
    fn invalid_target_rejected() {
        let mut queue = EventQueue::new();
        queue.push(1.0, 5);
        assert_eq!(queue.finalize(2), Err(5));
    }

    #[test]
    fn not_due_before_time() {
        let mut queue = EventQueue::new();
        queue.push(1.0, 0);
        queue.finalize(1).unwrap();
        assert!(queue.due(0.5, 1e-6).is_none());
        assert!(queue.due(1.0 - 1e-9, 1e-6).is_some());
    }
}
