//! Byte-level sequence utilities shared by the searches.

use bio::alphabets::dna;

/// IUPAC nucleotide letters, upper case.
pub const IUPAC_NUCLEOTIDES: &[u8] = b"ACGTURYSWKMBDHVN";

/// Gap and stop letters found in aligned or masked sequences.
pub const GAP_LETTERS: &[u8] = b"-.*";

/// Reverse complement, with IUPAC ambiguity codes and case preserved.
pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    dna::revcomp(seq)
}

pub fn is_iupac(seq: &[u8]) -> bool {
    seq.iter()
        .all(|c| IUPAC_NUCLEOTIDES.contains(&c.to_ascii_uppercase()))
}

/// Whether an upper-cased sequence contains anything other than `ACGTU`.
pub fn is_degenerate(seq: &[u8]) -> bool {
    seq.iter().any(|c| !matches!(c, b'A' | b'C' | b'G' | b'T' | b'U'))
}

/// Translate an upper-cased primer with degenerate bases into a regex pattern.
///
/// Each ambiguity code becomes a character class of the bases it stands for,
/// `N` matches any byte. Other bytes are matched literally.
pub fn degenerate_to_regex(seq: &[u8]) -> String {
    let mut res = String::with_capacity(seq.len() * 4);

    for &c in seq {
        let class = match c {
            b'R' => "[AGR]",
            b'Y' => "[CTY]",
            b'S' => "[GCS]",
            b'W' => "[ATW]",
            b'K' => "[GTK]",
            b'M' => "[ACM]",
            b'B' => "[CGTB]",
            b'D' => "[AGTD]",
            b'H' => "[ACTH]",
            b'V' => "[ACGV]",
            b'N' => ".",
            _ => {
                res.push_str(&regex::escape(&(c as char).to_string()));
                continue;
            }
        };
        res.push_str(class);
    }

    res
}

/// Number of positions where `a` and `b` differ.
///
/// Compares eight bytes at a time. The slices must have the same length.
pub fn hamming(a: &[u8], b: &[u8]) -> usize {
    assert_eq!(a.len(), b.len());

    let mut res = 0;
    let a_words = a.chunks_exact(8);
    let b_words = b.chunks_exact(8);
    let a_rest = a_words.remainder();
    let b_rest = b_words.remainder();

    for (a_word, b_word) in a_words.zip(b_words) {
        let a_word = u64::from_ne_bytes(a_word.try_into().unwrap());
        let b_word = u64::from_ne_bytes(b_word.try_into().unwrap());

        // fold each differing byte into its lowest bit
        let xor = a_word ^ b_word;
        let or1 = xor | (xor >> 1);
        let or2 = or1 | (or1 >> 2);
        let or3 = or2 | (or2 >> 4);
        let mask = or3 & 0x0101010101010101u64;
        res += mask.count_ones() as usize;
    }

    res + a_rest
        .iter()
        .zip(b_rest)
        .filter(|(x, y)| x != y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revcomp_round_trip() {
        let primer = b"GGACTACHVGGGTWTCTAAT";
        let rc = revcomp(primer);
        assert_eq!(rc, b"ATTAGAWACCCBDGTAGTCC");
        assert_eq!(revcomp(&rc), primer);
        assert_eq!(revcomp(b"acgtN"), b"Nacgt");
    }

    #[test]
    fn degenerate_detection() {
        assert!(!is_degenerate(b"ACGTACGT"));
        assert!(is_degenerate(b"ACGNACGT"));
        assert!(is_degenerate(b"ACRT"));
        assert!(is_iupac(b"acgtRYn"));
        assert!(!is_iupac(b"ACGT-"));
    }

    #[test]
    fn degenerate_regex_matches() {
        let pattern = degenerate_to_regex(b"ACRN");
        assert_eq!(pattern, "AC[AGR].");

        let re = regex::bytes::Regex::new(&pattern).unwrap();
        assert!(re.is_match(b"TTACGT"));
        assert!(re.is_match(b"ACAA"));
        assert!(!re.is_match(b"ACTA"));
    }

    #[test]
    fn hamming_counts() {
        assert_eq!(hamming(b"", b""), 0);
        assert_eq!(hamming(b"ACGT", b"ACGT"), 0);
        assert_eq!(hamming(b"ACGT", b"TCGA"), 2);
        // crosses the eight byte boundary
        assert_eq!(hamming(b"AAAAAAAAAAAA", b"AAAAAAATAAAC"), 2);
        assert_eq!(hamming(b"ACGTACGTACGTACGT", b"TGCATGCATGCATGCA"), 16);
    }
}
