/// Expand a cluster into the 16-bit code units the input layer consumes.
///
/// BMP codepoints map to a single unit; anything above U+FFFF becomes a
/// high/low surrogate pair. The exact arithmetic is a wire contract: the
/// receiving application reassembles these units as UTF-16.
pub fn code_units(cluster: &str) -> Vec<u16> {
    let mut units = Vec::with_capacity(cluster.len());
    for c in cluster.chars() {
        let v = c as u32;
        if v <= 0xFFFF {
            units.push(v as u16);
        } else {
            let v = v - 0x1_0000;
            units.push(0xD800 + (v >> 10) as u16);
            units.push(0xDC00 + (v & 0x3FF) as u16);
        }
    }
    units
}
