pub fn trim_ascii_whitespace(b: &[u8]) -> Option<&[u8]> {
    let start = b.iter().position(|&c| !c.is_ascii_whitespace())?;
    let end = b.iter().rposition(|&c| !c.is_ascii_whitespace())?;
    Some(&b[start..=end])
}

/// Parse an optionally signed decimal integer, ignoring surrounding whitespace.
pub fn parse_signed(b: &[u8]) -> Option<i64> {
    let b = trim_ascii_whitespace(b)?;
    std::str::from_utf8(b).ok()?.parse().ok()
}
