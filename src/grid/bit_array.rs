//! Packed arrays of bits

/// A growable array of bits, packed most significant bit first.
///
/// Used for grid masks (indexed by global node index) and for the
/// `is_parent` / `is_masked` streams of an interface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitArray {
    bytes: Vec<u8>,
    len: usize,
}

impl BitArray {
    /// Create an empty bit array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bit array of `len` bits, all unset.
    pub fn with_len(len: usize) -> Self {
        Self {
            bytes: vec![0; len.div_ceil(8)],
            len,
        }
    }

    /// Number of bits stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array holds no bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a bit.
    pub fn push(&mut self, value: bool) {
        let index = self.len;
        self.resize(index + 1);
        self.set(index, value);
    }

    /// Value of bit `index`, bits past the end read as unset.
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.bytes[index / 8] & (0x80 >> (index % 8)) != 0
    }

    /// Set bit `index`, growing the array when needed.
    pub fn set(&mut self, index: usize, value: bool) {
        if index >= self.len {
            self.resize(index + 1);
        }
        let bit = 0x80 >> (index % 8);
        if value {
            self.bytes[index / 8] |= bit;
        } else {
            self.bytes[index / 8] &= !bit;
        }
    }

    /// Resize to `len` bits. New bits are unset.
    pub fn resize(&mut self, len: usize) {
        if len < self.len {
            // Clear the dropped bits of the last byte so a later grow reads them as unset
            for index in len..self.len.min(len.div_ceil(8) * 8) {
                self.bytes[index / 8] &= !(0x80 >> (index % 8));
            }
        }
        self.bytes.resize(len.div_ceil(8), 0);
        self.len = len;
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Number of bytes used on the wire by a stream of `count` bits.
    pub fn wire_len(count: usize) -> usize {
        count.div_ceil(8) + 1
    }

    /// Pack the first `count` bits for sending, followed by a zero byte.
    pub fn to_wire(&self, count: usize) -> Vec<u8> {
        assert!(count <= self.len, "Cannot pack {count} bits out of {}", self.len);
        let mut wire = vec![0u8; Self::wire_len(count)];
        let full = count / 8;
        wire[..full].copy_from_slice(&self.bytes[..full]);
        if count % 8 != 0 {
            let keep = 0xffu8 << (8 - count % 8);
            wire[full] = self.bytes[full] & keep;
        }
        wire
    }

    /// Unpack a stream of `count` bits produced by [BitArray::to_wire].
    ///
    /// Returns `None` if `wire` does not have the expected length or its trailing byte is not zero.
    pub fn from_wire(wire: &[u8], count: usize) -> Option<Self> {
        if wire.len() != Self::wire_len(count) || wire[wire.len() - 1] != 0 {
            return None;
        }
        let mut bits = Self {
            bytes: wire[..count.div_ceil(8)].to_vec(),
            len: count,
        };
        if count % 8 != 0 {
            let last = bits.bytes.len() - 1;
            bits.bytes[last] &= 0xffu8 << (8 - count % 8);
        }
        Some(bits)
    }

    /// Iterate over the bits.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

impl FromIterator<bool> for BitArray {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bits = BitArray::new();
        for value in iter {
            bits.push(value);
        }
        bits
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut bits = BitArray::new();
        for i in 0..19 {
            bits.push(i % 3 == 0);
        }
        assert_eq!(bits.len(), 19);
        for i in 0..19 {
            assert_eq!(bits.get(i), i % 3 == 0);
        }
        assert!(!bits.get(100));
        assert_eq!(bits.count_ones(), 7);
    }

    #[test]
    fn test_set_grows() {
        let mut bits = BitArray::new();
        bits.set(12, true);
        assert_eq!(bits.len(), 13);
        assert!(bits.get(12));
        assert_eq!(bits.count_ones(), 1);
        bits.set(12, false);
        assert_eq!(bits.count_ones(), 0);
    }

    #[test]
    fn test_wire_layout_is_msb_first() {
        let bits: BitArray = [true, false, true, true, false, false, false, false, true]
            .into_iter()
            .collect();
        let wire = bits.to_wire(9);
        assert_eq!(wire, vec![0b1011_0000, 0b1000_0000, 0]);
    }

    #[test]
    fn test_wire_len() {
        assert_eq!(BitArray::wire_len(0), 1);
        assert_eq!(BitArray::wire_len(1), 2);
        assert_eq!(BitArray::wire_len(8), 2);
        assert_eq!(BitArray::wire_len(9), 3);
    }

    #[test]
    fn test_from_wire_rejects_bad_buffers() {
        assert!(BitArray::from_wire(&[0xff, 0], 3).is_some());
        assert!(BitArray::from_wire(&[0xff, 1], 3).is_none());
        assert!(BitArray::from_wire(&[0xff], 3).is_none());

        let bits = BitArray::from_wire(&[0xff, 0], 3).unwrap();
        assert_eq!(bits.len(), 3);
        assert_eq!(bits.count_ones(), 3);
    }

    #[test]
    fn test_to_wire_prefix() {
        let bits: BitArray = (0..16).map(|_| true).collect();
        let wire = bits.to_wire(5);
        assert_eq!(wire, vec![0b1111_1000, 0]);
    }

    #[test]
    fn test_shrink_then_grow_reads_unset() {
        let mut bits: BitArray = (0..8).map(|_| true).collect();
        bits.resize(3);
        bits.resize(8);
        assert_eq!(bits.count_ones(), 3);
    }
}
