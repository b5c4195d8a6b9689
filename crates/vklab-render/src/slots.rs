// SPDX-License-Identifier: CEPL-1.0
use std::fmt;

/// Index of the sync objects and command buffer used by one frame iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameSlot(usize);

impl FrameSlot {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Round-robin cursor over `[0, count)`.
#[derive(Clone, Copy, Debug)]
pub struct FrameSlots {
    count: usize,
    current: usize,
}

impl FrameSlots {
    /// `None` when `count` is zero: with no slot there is nothing to wait on.
    pub fn new(count: usize) -> Option<Self> {
        (count > 0).then_some(FrameSlots { count, current: 0 })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn current(&self) -> FrameSlot {
        FrameSlot(self.current)
    }

    pub fn advance(&mut self) -> FrameSlot {
        self.current = (self.current + 1) % self.count;
        FrameSlot(self.current)
    }

    pub fn iter(&self) -> impl Iterator<Item = FrameSlot> {
        (0..self.count).map(FrameSlot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_slots_rejected() {
        assert!(FrameSlots::new(0).is_none());
    }

    #[test]
    fn advance_wraps_round_robin() {
        let mut slots = FrameSlots::new(3).unwrap();
        let seen: Vec<usize> = (0..7)
            .map(|_| {
                let s = slots.current().index();
                slots.advance();
                s
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn single_slot_stays_put() {
        let mut slots = FrameSlots::new(1).unwrap();
        assert_eq!(slots.advance().index(), 0);
        assert_eq!(slots.iter().count(), 1);
    }
}
