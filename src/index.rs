//! Approximate substring index over a single sequence.
//!
//! The index is a bio FM-index (suffix array, BWT, sampled occurrence table).
//! Approximate search walks the pattern backwards and branches on every
//! alphabet symbol while mismatches remain, pruning empty suffix array intervals.

use bio::alphabets::Alphabet;
use bio::data_structures::bwt::{bwt, less, Less, Occ, BWT};
use bio::data_structures::fmindex::{FMIndex, FMIndexable};
use bio::data_structures::suffix_array::{suffix_array, RawSuffixArray};

use crate::errors::*;
use crate::seq::{GAP_LETTERS, IUPAC_NUCLEOTIDES};

const SENTINEL: u8 = b'$';

/// Options for building an [`ApproxIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Reject sequences containing bytes that are neither IUPAC nucleotide letters nor gaps.
    pub validate_seq: bool,
    /// Sampling rate of the occurrence table.
    pub occ_sampling: u32,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            validate_seq: true,
            occ_sampling: 32,
        }
    }
}

pub struct ApproxIndex {
    fm: FMIndex<BWT, Less, Occ>,
    sa: RawSuffixArray,
    symbols: Vec<u8>,
    len: usize,
}

impl ApproxIndex {
    /// Index an upper-cased sequence.
    pub fn new(seq: &[u8], options: &IndexOptions) -> Result<Self> {
        if seq.is_empty() {
            return Err(Error::EmptySequence("building the sequence index"));
        }

        let mut present = [false; 256];

        for (pos, &c) in seq.iter().enumerate() {
            // the sentinel must sort before every other byte
            if c <= SENTINEL || (options.validate_seq && !is_valid_byte(c)) {
                return Err(Error::InvalidSequence {
                    byte: c as char,
                    pos,
                });
            }
            present[c as usize] = true;
        }

        let symbols = (0..=255u8)
            .filter(|&c| present[c as usize])
            .collect::<Vec<_>>();

        let mut text = Vec::with_capacity(seq.len() + 1);
        text.extend_from_slice(seq);
        text.push(SENTINEL);

        let alphabet = Alphabet::new(symbols.iter());
        let sa = suffix_array(&text);
        let bwt = bwt(&text, &sa);
        let less = less(&bwt, &alphabet);
        let occ = Occ::new(&bwt, options.occ_sampling, &alphabet);

        Ok(Self {
            fm: FMIndex::new(bwt, less, occ),
            sa,
            symbols,
            len: seq.len(),
        })
    }

    /// All 0-based start positions where `pattern` occurs with at most `max_mismatch`
    /// substitutions, sorted ascending.
    pub fn locate(&self, pattern: &[u8], max_mismatch: usize) -> Vec<usize> {
        let mut res = Vec::new();

        if pattern.is_empty() || pattern.len() > self.len {
            return res;
        }

        // half-open suffix array interval covering every suffix
        let whole = (0, self.len + 1);
        self.search(pattern, pattern.len(), whole, max_mismatch, &mut res);

        res.sort_unstable();
        res.dedup();
        res
    }

    fn search(
        &self,
        pattern: &[u8],
        remaining: usize,
        (lower, upper): (usize, usize),
        mismatches_left: usize,
        res: &mut Vec<usize>,
    ) {
        if remaining == 0 {
            res.extend(self.sa[lower..upper].iter().copied());
            return;
        }

        let expected = pattern[remaining - 1];

        if mismatches_left == 0 {
            // only exact extension left
            if let Some(interval) = self.extend((lower, upper), expected) {
                self.search(pattern, remaining - 1, interval, 0, res);
            }
            return;
        }

        for &c in &self.symbols {
            if let Some(interval) = self.extend((lower, upper), c) {
                let left = if c == expected {
                    mismatches_left
                } else {
                    mismatches_left - 1
                };
                self.search(pattern, remaining - 1, interval, left, res);
            }
        }
    }

    /// Backward extension of a half-open interval by one symbol.
    fn extend(&self, (lower, upper): (usize, usize), c: u8) -> Option<(usize, usize)> {
        if lower >= upper || self.symbols.binary_search(&c).is_err() {
            return None;
        }

        let less = self.fm.less(c);
        let new_lower = less + if lower > 0 { self.fm.occ(lower - 1, c) } else { 0 };
        let new_upper = less + self.fm.occ(upper - 1, c);

        if new_lower < new_upper {
            Some((new_lower, new_upper))
        } else {
            None
        }
    }
}

fn is_valid_byte(c: u8) -> bool {
    IUPAC_NUCLEOTIDES.contains(&c) || GAP_LETTERS.contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(text: &[u8], pattern: &[u8], k: usize) -> Vec<usize> {
        text.windows(pattern.len())
            .enumerate()
            .filter(|(_, w)| crate::seq::hamming(w, pattern) <= k)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn exact_locate() -> Result<()> {
        let text = b"GCCTTAACATTATTACGCCTA";
        let index = ApproxIndex::new(text, &IndexOptions::default())?;

        assert_eq!(index.locate(b"TTA", 0), vec![3, 9, 12]);
        assert_eq!(index.locate(b"GCC", 0), vec![0, 16]);
        assert!(index.locate(b"GGGG", 0).is_empty());
        assert!(index.locate(b"A", 0).len() == 6);
        Ok(())
    }

    #[test]
    fn mismatch_locate_matches_naive_scan() -> Result<()> {
        let text = b"ACGTTGCAAGGCTTAACGTAGCTAGCTAGGATCCAGTCAGTTGACNNACGT";
        let index = ApproxIndex::new(text, &IndexOptions::default())?;

        for pattern in [&b"ACGT"[..], b"TAGCTAG", b"GGATCC", b"CAGTTGAC", b"ACGTA"] {
            for k in 0..3 {
                assert_eq!(index.locate(pattern, k), naive(text, pattern, k));
            }
        }
        Ok(())
    }

    #[test]
    fn pattern_symbol_absent_from_text() -> Result<()> {
        let index = ApproxIndex::new(b"AAAAAAA", &IndexOptions::default())?;
        assert!(index.locate(b"AAC", 0).is_empty());
        assert_eq!(index.locate(b"AAC", 1), vec![0, 1, 2, 3, 4]);
        assert!(index.locate(b"AAAAAAAA", 3).is_empty());
        Ok(())
    }

    #[test]
    fn invalid_sequences() {
        let options = IndexOptions::default();
        assert!(matches!(
            ApproxIndex::new(b"", &options),
            Err(Error::EmptySequence(_))
        ));
        assert!(matches!(
            ApproxIndex::new(b"ACG$T", &options),
            Err(Error::InvalidSequence { pos: 3, .. })
        ));
        assert!(matches!(
            ApproxIndex::new(b"ACGXT", &options),
            Err(Error::InvalidSequence { pos: 3, .. })
        ));

        let lenient = IndexOptions {
            validate_seq: false,
            ..options
        };
        assert!(ApproxIndex::new(b"ACGXT", &lenient).is_ok());
    }

    #[test]
    fn gaps_are_indexed() -> Result<()> {
        let index = ApproxIndex::new(b"ACG-TA.C*GT", &IndexOptions::default())?;
        assert_eq!(index.locate(b"GT", 0), vec![9]);
        assert_eq!(index.locate(b"G-T", 0), vec![2]);
        assert_eq!(index.locate(b"GAT", 1), vec![2]);
        Ok(())
    }
}
