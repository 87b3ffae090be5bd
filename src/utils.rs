//! Address decomposition into `[tag | index | offset]`.

/// Width of every simulated address.
pub const ADDRESS_BITS: u32 = 32;

pub type Tag = u32;
pub type SetIndex = u32;

/// Leading `tag_bits` bits of the 32-bit address.
pub fn tag_of(addr: u32, tag_bits: u32) -> Tag {
    if tag_bits == 0 {
        return 0;
    }
    (u64::from(addr) >> (ADDRESS_BITS - tag_bits.min(ADDRESS_BITS))) as Tag
}

/// The `index_bits` bits following the tag. Always 0 when there are no index bits.
pub fn index_of(addr: u32, tag_bits: u32, index_bits: u32) -> SetIndex {
    if index_bits == 0 {
        return 0;
    }
    let shift = ADDRESS_BITS - tag_bits - index_bits;
    let mask = (1u64 << index_bits) - 1;
    ((u64::from(addr) >> shift) & mask) as SetIndex
}

/// Trailing offset bits; the engine compares blocks by identity and never uses these.
pub fn offset_of(addr: u32, offset_bits: u32) -> u32 {
    let mask = (1u64 << offset_bits) - 1;
    (u64::from(addr) & mask) as u32
}

/// Inverse of the three accessors above.
pub fn recombine(tag: Tag, index: SetIndex, offset: u32, index_bits: u32, offset_bits: u32) -> u32 {
    let tag_part = if index_bits + offset_bits >= ADDRESS_BITS {
        0
    } else {
        u64::from(tag) << (index_bits + offset_bits)
    };
    (tag_part | (u64::from(index) << offset_bits) | u64::from(offset)) as u32
}

/// `log2(n)` when `n` is a power of two.
pub fn log2_exact(n: u32) -> Option<u32> {
    n.is_power_of_two().then(|| n.trailing_zeros())
}

pub fn calculate_num_sets(cache_size: u32, assoc: u32, block_size: u32) -> Option<u32> {
    let set_bytes = u64::from(assoc) * u64::from(block_size);
    if set_bytes == 0 || u64::from(cache_size) % set_bytes != 0 {
        return None;
    }
    Some((u64::from(cache_size) / set_bytes) as u32)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_direct_mapped_l1() {
        // 1KB, 16B blocks, direct mapped: 4 offset bits, 6 index bits, 22 tag bits
        let addr = 0x4000_13c5;
        assert_eq!(tag_of(addr, 22), 0x4000_13c5 >> 10);
        assert_eq!(index_of(addr, 22, 6), (0x13c5 >> 4) & 0x3f);
        assert_eq!(offset_of(addr, 4), 0x5);
    }

    #[test]
    fn decomposition_recombines() {
        for &(addr, offset_bits, index_bits) in &[
            (0u32, 4u32, 6u32),
            (0xffff_ffff, 5, 8),
            (0x1234_5678, 6, 0),
            (0x8000_0001, 0, 12),
            (0xdead_beef, 3, 29),
        ] {
            let tag_bits = ADDRESS_BITS - offset_bits - index_bits;
            let tag = tag_of(addr, tag_bits);
            let index = index_of(addr, tag_bits, index_bits);
            let offset = offset_of(addr, offset_bits);
            assert_eq!(recombine(tag, index, offset, index_bits, offset_bits), addr);
        }
    }

    #[test]
    fn zero_index_bits_map_to_set_zero() {
        assert_eq!(index_of(0xffff_fff0, 28, 0), 0);
    }

    #[test]
    fn full_width_tag() {
        assert_eq!(tag_of(0xabcd_0123, 32), 0xabcd_0123);
        assert_eq!(tag_of(0xabcd_0123, 0), 0);
    }

    #[test]
    fn num_sets_must_divide_exactly() {
        assert_eq!(calculate_num_sets(1024, 1, 16), Some(64));
        assert_eq!(calculate_num_sets(8192, 4, 32), Some(64));
        assert_eq!(calculate_num_sets(1000, 1, 16), None);
        assert_eq!(calculate_num_sets(1024, 0, 16), None);
    }

    #[test]
    fn log2_of_powers_only() {
        assert_eq!(log2_exact(1), Some(0));
        assert_eq!(log2_exact(64), Some(6));
        assert_eq!(log2_exact(48), None);
        assert_eq!(log2_exact(0), None);
    }
}
