//! Fixed size bit mask backed by `u64` words.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BitMask {
    words: Vec<u64>,
    len: usize,
}

impl BitMask {
    pub(crate) fn new(len: usize) -> Self {
        BitMask {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Out of range indices read as unset.
    #[inline(always)]
    pub(crate) fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.words[index >> 6] & (1u64 << (index & 63)) != 0
    }

    #[inline(always)]
    pub(crate) fn set(&mut self, index: usize, value: bool) {
        if index >= self.len {
            return;
        }
        let bit = 1u64 << (index & 63);
        if value {
            self.words[index >> 6] |= bit;
        } else {
            self.words[index >> 6] &= !bit;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.words.fill(0);
    }

    pub(crate) fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}
