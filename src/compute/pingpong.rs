//! Ping-pong bookkeeping for a double-buffered field.
//!
//! Two buffers, A and B. Each iteration reads the current buffer and writes
//! the other one, then the roles swap.

use std::fmt;

/// Identity of one of the two field buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldSlot {
    #[default]
    A,
    B,
}

impl FieldSlot {
    /// The opposite buffer.
    #[inline]
    pub fn other(self) -> Self {
        match self {
            FieldSlot::A => FieldSlot::B,
            FieldSlot::B => FieldSlot::A,
        }
    }

    /// Array index for per-slot storage (`A` = 0, `B` = 1).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            FieldSlot::A => 0,
            FieldSlot::B => 1,
        }
    }
}

impl fmt::Display for FieldSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSlot::A => write!(f, "A"),
            FieldSlot::B => write!(f, "B"),
        }
    }
}

/// Read source and write target of one update iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    pub source: FieldSlot,
    pub target: FieldSlot,
}

/// Which buffer holds the newest generation, and how many iterations ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingPong {
    current: FieldSlot,
    generation: u64,
}

impl PingPong {
    /// Start with A current and zero completed iterations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer holding the most recently computed generation.
    #[inline]
    pub fn current(&self) -> FieldSlot {
        self.current
    }

    /// Buffer the next iteration will write.
    #[inline]
    pub fn next(&self) -> FieldSlot {
        self.current.other()
    }

    /// Completed iterations since construction.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Source/target pair for the next iteration.
    #[inline]
    pub fn pass(&self) -> Pass {
        Pass {
            source: self.current,
            target: self.current.other(),
        }
    }

    /// Record one completed iteration: the target becomes current.
    #[inline]
    pub fn advance(&mut self) {
        self.current = self.current.other();
        self.generation += 1;
    }

    /// Record `n` completed iterations.
    pub fn advance_by(&mut self, n: u64) {
        if n % 2 == 1 {
            self.current = self.current.other();
        }
        self.generation += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_starts_on_a() {
        let pp = PingPong::new();
        assert_eq!(pp.current(), FieldSlot::A);
        assert_eq!(pp.next(), FieldSlot::B);
        assert_eq!(pp.generation(), 0);
    }

    #[test]
    fn test_pass_reads_current_writes_next() {
        let mut pp = PingPong::new();
        assert_eq!(
            pp.pass(),
            Pass {
                source: FieldSlot::A,
                target: FieldSlot::B
            }
        );
        pp.advance();
        assert_eq!(
            pp.pass(),
            Pass {
                source: FieldSlot::B,
                target: FieldSlot::A
            }
        );
    }

    #[test]
    fn test_slot_index_and_other() {
        assert_eq!(FieldSlot::A.index(), 0);
        assert_eq!(FieldSlot::B.index(), 1);
        assert_eq!(FieldSlot::A.other().other(), FieldSlot::A);
    }

    proptest! {
        #[test]
        fn prop_alternation(n in 0u64..512, start_on_b in any::<bool>()) {
            let mut pp = PingPong::new();
            if start_on_b {
                pp.advance();
            }
            let before = pp.current();
            for _ in 0..n {
                pp.advance();
            }
            let expected = if n % 2 == 1 { before.other() } else { before };
            prop_assert_eq!(pp.current(), expected);
        }

        #[test]
        fn prop_never_self_aliasing(n in 0usize..256) {
            let mut pp = PingPong::new();
            for _ in 0..n {
                let pass = pp.pass();
                prop_assert_ne!(pass.source, pass.target);
                pp.advance();
            }
        }

        #[test]
        fn prop_advance_by_matches_single_steps(n in 0u64..1024) {
            let mut stepped = PingPong::new();
            for _ in 0..n {
                stepped.advance();
            }
            let mut jumped = PingPong::new();
            jumped.advance_by(n);
            prop_assert_eq!(stepped, jumped);
            prop_assert_eq!(jumped.generation(), n);
        }
    }
}
