/// A bit set of up to 2^63 bits stored as a sequence of 64-bit words,
/// counting bits from least-to-most significant within each word and
/// ascending words, so word 0 holds bits 0..=63.
///
/// The word vector never carries trailing all-zero words; mutation keeps
/// that invariant so value equality is set equality.
#[derive(Clone, Default, PartialEq, Eq, Debug, Hash)]
pub struct BitField {
    words: Vec<u64>,
}

impl BitField {
    pub fn new() -> Self {
        BitField { words: Vec::new() }
    }

    /// Builds a set from the positions of its set bits.
    pub fn from_bits(bits: &[u64]) -> Self {
        let mut bf = BitField::new();
        for &b in bits {
            bf.set(b);
        }
        bf
    }

    pub fn set(&mut self, bit: u64) {
        let word = (bit / 64) as usize;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % 64);
    }

    pub fn clear(&mut self, bit: u64) {
        let word = (bit / 64) as usize;
        if word < self.words.len() {
            self.words[word] &= !(1 << (bit % 64));
            self.trim();
        }
    }

    pub fn get(&self, bit: u64) -> bool {
        let word = (bit / 64) as usize;
        match self.words.get(word) {
            Some(w) => (w & (1 << (bit % 64))) != 0,
            None => false,
        }
    }

    pub fn count(&self) -> u64 {
        self.words.iter().map(|w| w.count_ones() as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of words the storage form occupies.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// The word sequence with trailing all-zero words trimmed.
    pub fn to_storage_form(&self) -> Vec<u64> {
        self.words.clone()
    }

    /// Accepts a word sequence of any length.
    pub fn from_storage_form(words: &[u64]) -> Self {
        let mut bf = BitField {
            words: words.to_vec(),
        };
        bf.trim();
        bf
    }

    /// The word sequence padded (never truncated) to `words` entries.
    /// Returns None if the set does not fit.
    pub fn to_storage_form_padded(&self, words: usize) -> Option<Vec<u64>> {
        if self.words.len() > words {
            return None;
        }
        let mut out = self.words.clone();
        out.resize(words, 0);
        Some(out)
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

/// Serializes several bit sets as one flat word table, each row padded to
/// the widest set. Returns (row word count, words).
pub fn pack_padded_rows(sets: &[BitField]) -> (usize, Vec<u64>) {
    let width = sets.iter().map(|s| s.word_count()).max().unwrap_or(0);
    let mut flat = Vec::with_capacity(width * sets.len());
    for s in sets {
        // width covers every set, so padding cannot fail
        flat.extend(s.to_storage_form_padded(width).unwrap_or_default());
    }
    (width, flat)
}

/// Inverse of [`pack_padded_rows`] for a known row width.
pub fn unpack_padded_rows(flat: &[u64], width: usize) -> Vec<BitField> {
    if width == 0 {
        return Vec::new();
    }
    flat.chunks(width).map(BitField::from_storage_form).collect()
}
