//! Dense bit-per-index visited set, shared by independent traversal phases
//! (each phase calls [`BitSet::clear`] before reusing it).

pub(crate) struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    pub(crate) fn new(len: usize) -> Self {
        Self { words: vec![0; len.div_ceil(64)] }
    }

    /// Inserts `index`, returning whether it was *not* already present
    /// (i.e. `true` exactly once per index between clears).
    pub(crate) fn set(&mut self, index: usize) -> bool {
        let (word, bit) = (index / 64, 1u64 << (index % 64));
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    pub(crate) fn get(&self, index: usize) -> bool {
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    pub(crate) fn clear(&mut self) {
        self.words.fill(0);
    }
}
