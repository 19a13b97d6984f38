/// Rolling 32-bit hash used by version 4 tracks to name their joint.
///
/// The hash keeps the case of its input. Callers that need a
/// case-insensitive match hash the lowercased name as a second attempt.
pub fn name_hash(name: &str) -> u32 {
    name.bytes().fold(0u32, |h, c| {
        let h = (c as u32).wrapping_add(h.wrapping_mul(16));
        let high = h & 0xF000_0000;
        if high != 0 {
            h ^ high ^ (high >> 24)
        } else {
            h
        }
    })
}
