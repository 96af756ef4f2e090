use memchr::memmem;

use regex::bytes::Regex;

use std::sync::Arc;

use crate::amplicon::*;
use crate::index::*;
use crate::primers::PrimerPair;
use crate::seq::*;

/// An upper-cased primer or pattern compiled for exact searching.
///
/// Primers without degenerate bases are searched literally, others through a regex
/// built from their degenerate bases.
#[derive(Debug, Clone)]
pub struct PrimerMatcher {
    primer: Vec<u8>,
    regex: Option<Regex>,
}

impl PrimerMatcher {
    pub fn new(primer: &[u8]) -> Result<Self> {
        let primer = primer.to_ascii_uppercase();

        let regex = if is_degenerate(&primer) {
            let pattern = degenerate_to_regex(&primer);
            Some(Regex::new(&pattern).map_err(|e| Error::Regex {
                primer: utf8(&primer),
                source: e,
            })?)
        } else {
            None
        };

        Ok(Self { primer, regex })
    }

    pub fn primer(&self) -> &[u8] {
        &self.primer
    }

    pub fn len(&self) -> usize {
        self.primer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primer.is_empty()
    }

    /// Start of the leftmost occurrence.
    pub fn find_first(&self, seq: &[u8]) -> Option<usize> {
        match &self.regex {
            Some(regex) => regex.find(seq).map(|m| m.start()),
            None => memmem::find(seq, &self.primer),
        }
    }

    /// Start of the rightmost occurrence.
    ///
    /// For degenerate primers this is the last of the non-overlapping regex matches.
    pub fn find_last(&self, seq: &[u8]) -> Option<usize> {
        match &self.regex {
            Some(regex) => regex.find_iter(seq).last().map(|m| m.start()),
            None => memmem::rfind(seq, &self.primer),
        }
    }

    /// Starts of all occurrences, overlapping ones included, in ascending order.
    pub fn find_all(&self, seq: &[u8]) -> Vec<usize> {
        let mut res = Vec::new();
        let mut from = 0;

        while from < seq.len() {
            let found = match &self.regex {
                Some(regex) => regex.find_at(seq, from).map(|m| m.start()),
                None => memmem::find(&seq[from..], &self.primer).map(|i| from + i),
            };
            let Some(start) = found else {
                break;
            };
            res.push(start);
            from = start + 1;
        }

        res
    }

    /// Mismatches between the primer and a window it matched exactly.
    ///
    /// Only non-zero when a degenerate base matched a different letter.
    pub fn mismatches(&self, window: &[u8]) -> usize {
        if self.regex.is_some() {
            hamming(window, &self.primer)
        } else {
            0
        }
    }
}

/// Forward primer and reverse complement of the reverse primer of one pair, compiled once
/// and shared by every finder of that pair.
#[derive(Debug, Clone)]
pub struct CompiledPair {
    pub name: String,
    pub forward: PrimerMatcher,
    pub reverse: Option<PrimerMatcher>,
}

impl CompiledPair {
    pub fn new(pair: &PrimerPair) -> Result<Self> {
        let reverse = if pair.reverse.is_empty() {
            None
        } else {
            Some(PrimerMatcher::new(&pair.reverse_rc())?)
        };

        Ok(Self {
            name: pair.name.clone(),
            forward: PrimerMatcher::new(&pair.forward)?,
            reverse,
        })
    }
}

/// An amplicon at `begin..=end` (0-based) in the searched sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amplicon {
    pub begin: usize,
    pub end: usize,
    pub mismatches: Mismatches,
}

impl Amplicon {
    pub fn location(&self) -> Location {
        Location::new(self.begin + 1, self.end + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Unsearched,
    NotFound,
    Found(Amplicon),
}

/// Finds the amplicon of one primer pair in a sequence.
///
/// The amplicon spans from the leftmost forward primer hit to the end of the rightmost
/// hit of the reverse complemented reverse primer. A finder is reset to a new sequence
/// instead of being rebuilt, and caches its result until the next reset.
pub struct AmpliconFinder {
    pair: Arc<CompiledPair>,
    seq: Vec<u8>,
    max_mismatch: usize,
    options: IndexOptions,
    index: Option<ApproxIndex>,
    state: SearchState,
}

impl AmpliconFinder {
    pub fn new(
        pair: Arc<CompiledPair>,
        seq: &[u8],
        max_mismatch: usize,
        options: IndexOptions,
    ) -> Result<Self> {
        let mut finder = Self {
            pair,
            seq: Vec::with_capacity(seq.len()),
            max_mismatch,
            options,
            index: None,
            state: SearchState::Unsearched,
        };
        finder.reset(seq, max_mismatch)?;
        Ok(finder)
    }

    /// Swap in a new sequence and forget the previous result.
    ///
    /// With `max_mismatch > 0` the approximate index is rebuilt over the new sequence.
    pub fn reset(&mut self, seq: &[u8], max_mismatch: usize) -> Result<()> {
        if seq.is_empty() {
            return Err(Error::EmptySequence("resetting the amplicon finder"));
        }

        self.seq.clear();
        self.seq.extend(seq.iter().map(|c| c.to_ascii_uppercase()));
        self.max_mismatch = max_mismatch;
        self.state = SearchState::Unsearched;
        self.index = None;

        if max_mismatch > 0 {
            self.index = Some(ApproxIndex::new(&self.seq, &self.options)?);
        }

        Ok(())
    }

    pub fn pair(&self) -> &Arc<CompiledPair> {
        &self.pair
    }

    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// 1-based location of the amplicon and its primer mismatches.
    pub fn locate(&mut self) -> Option<(Location, Mismatches)> {
        self.amplicon().map(|a| (a.location(), a.mismatches))
    }

    /// 1-based location of a region relative to the amplicon, with the amplicon's
    /// primer mismatches.
    pub fn locate_range(&mut self, region: &Region) -> Option<(Location, Mismatches)> {
        let amplicon = self.amplicon()?;
        region
            .locate(self.seq.len(), amplicon.begin, amplicon.end)
            .map(|l| (l, amplicon.mismatches))
    }

    fn amplicon(&mut self) -> Option<Amplicon> {
        if self.state == SearchState::Unsearched {
            let found = if self.max_mismatch == 0 {
                self.locate_exact()
            } else {
                self.locate_approx()
            };

            self.state = match found {
                Some(amplicon) => SearchState::Found(amplicon),
                None => SearchState::NotFound,
            };
        }

        match self.state {
            SearchState::Found(amplicon) => Some(amplicon),
            _ => None,
        }
    }

    fn locate_exact(&self) -> Option<Amplicon> {
        let forward = &self.pair.forward;
        let f_start = forward.find_first(&self.seq)?;
        let five = forward.mismatches(&self.seq[f_start..f_start + forward.len()]);

        let Some(reverse) = &self.pair.reverse else {
            return Some(Amplicon {
                begin: f_start,
                end: f_start + forward.len() - 1,
                mismatches: Mismatches { five, three: 0 },
            });
        };

        let r_start = reverse.find_last(&self.seq)?;

        // reverse primer upstream of the forward primer
        if r_start < f_start {
            return None;
        }

        let r_end = r_start + reverse.len();
        let three = reverse.mismatches(&self.seq[r_start..r_end]);

        Some(Amplicon {
            begin: f_start,
            end: r_end - 1,
            mismatches: Mismatches { five, three },
        })
    }

    // No orientation check here, unlike exact mode.
    fn locate_approx(&self) -> Option<Amplicon> {
        let index = self.index.as_ref()?;
        let forward = self.pair.forward.primer();
        let f_start = *index.locate(forward, self.max_mismatch).first()?;
        let five = hamming(&self.seq[f_start..f_start + forward.len()], forward);

        let Some(reverse) = &self.pair.reverse else {
            return Some(Amplicon {
                begin: f_start,
                end: f_start + forward.len() - 1,
                mismatches: Mismatches { five, three: 0 },
            });
        };

        let reverse = reverse.primer();
        let r_start = *index.locate(reverse, self.max_mismatch).last()?;
        let r_end = r_start + reverse.len();

        if r_end <= f_start {
            return None;
        }

        let three = hamming(&self.seq[r_start..r_end], reverse);

        Some(Amplicon {
            begin: f_start,
            end: r_end - 1,
            mismatches: Mismatches { five, three },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finder(forward: &[u8], reverse: &[u8], seq: &[u8], k: usize) -> AmpliconFinder {
        let pair = PrimerPair::new("p", forward, reverse).unwrap();
        let pair = Arc::new(CompiledPair::new(&pair).unwrap());
        AmpliconFinder::new(pair, seq, k, IndexOptions::default()).unwrap()
    }

    fn exact(start: usize, end: usize) -> Option<(Location, Mismatches)> {
        Some((Location::new(start, end), Mismatches::default()))
    }

    // reverse primer TCAA, so TTGA is expected downstream of the forward primer GGCC

    #[test]
    fn exact_amplicon() {
        let mut f = finder(b"GGCC", b"TCAA", b"AAAGGCCAAATTGAAAA", 0);
        assert_eq!(f.state(), SearchState::Unsearched);
        assert_eq!(f.locate(), exact(4, 14));
        assert!(matches!(f.state(), SearchState::Found(_)));
    }

    #[test]
    fn first_forward_last_reverse() {
        let mut f = finder(b"GGCC", b"TCAA", b"GGCCTTGAGGCCATTGACC", 0);
        assert_eq!(f.locate(), exact(1, 17));
    }

    #[test]
    fn reverse_upstream_of_forward_is_not_found() {
        let mut f = finder(b"GGCC", b"TCAA", b"AAATTGAAAAGGCCAAA", 0);
        assert_eq!(f.locate(), None);
        assert_eq!(f.state(), SearchState::NotFound);
    }

    #[test]
    fn missing_primer_is_not_found() {
        assert_eq!(finder(b"GGCC", b"TCAA", b"AAAGGCCAAA", 0).locate(), None);
        assert_eq!(finder(b"GGCC", b"TCAA", b"AAATTGAAAA", 0).locate(), None);
    }

    #[test]
    fn forward_only() {
        let mut f = finder(b"ggcc", b"", b"TTTTGGCCGGCC", 0);
        assert_eq!(f.locate(), exact(5, 8));

        // a lone reverse primer is searched as the forward primer
        let mut f = finder(b"", b"GGCC", b"TTTTGGCCGGCC", 0);
        assert_eq!(f.locate(), exact(5, 8));

        let mut f = finder(b"GGCC", b"", b"TTTTGGACGGTT", 1);
        assert_eq!(
            f.locate(),
            Some((Location::new(5, 8), Mismatches { five: 1, three: 0 }))
        );
    }

    #[test]
    fn case_insensitive() {
        let mut f = finder(b"GGCC", b"TCAA", b"aaaggccaaattgaaaa", 0);
        assert_eq!(f.locate(), exact(4, 14));
    }

    #[test]
    fn degenerate_primers() {
        // N in the forward primer matches A, counted as a mismatch
        let mut f = finder(b"GGNC", b"TCRA", b"AAAGGACAAATTGAAAA", 0);
        assert_eq!(
            f.locate(),
            Some((Location::new(4, 14), Mismatches { five: 1, three: 1 }))
        );
    }

    #[test]
    fn approximate_amplicon() {
        let seq = b"AAAAGGCTATCCCCCCCCTTGTTAAAAA";
        let mut f = finder(b"GGCCAT", b"TAAGAA", seq, 0);
        assert_eq!(f.locate(), None);

        let mut f = finder(b"GGCCAT", b"TAAGAA", seq, 1);
        assert_eq!(
            f.locate(),
            Some((Location::new(5, 24), Mismatches { five: 1, three: 1 }))
        );
    }

    #[test]
    fn approximate_mode_skips_orientation_check() {
        let seq = b"TTAGGCCTT";
        assert_eq!(finder(b"GGCC", b"CCTA", seq, 0).locate(), None);

        let mut f = finder(b"GGCC", b"CCTA", seq, 1);
        assert_eq!(f.locate(), exact(4, 5));

        // a reverse primer ending before the forward primer gives no amplicon
        let mut f = finder(b"GGCC", b"AAAA", b"TTTTCCCCGGCC", 1);
        assert_eq!(f.locate(), None);
    }

    #[test]
    fn reset_reuses_finder() -> Result<()> {
        let mut f = finder(b"GGCC", b"TCAA", b"AAAGGCCAAATTGAAAA", 0);
        assert_eq!(f.locate(), exact(4, 14));

        f.reset(b"GGCCTTGA", 0)?;
        assert_eq!(f.state(), SearchState::Unsearched);
        assert_eq!(f.locate(), exact(1, 8));

        f.reset(b"CCCCCCCC", 0)?;
        assert_eq!(f.locate(), None);

        f.reset(b"AGGCTTTGAA", 1)?;
        assert_eq!(
            f.locate(),
            Some((Location::new(2, 9), Mismatches { five: 1, three: 0 }))
        );

        assert!(matches!(f.reset(b"", 0), Err(Error::EmptySequence(_))));
        Ok(())
    }

    #[test]
    fn locate_range_inner_and_flanking() -> Result<()> {
        let mut f = finder(b"GGCC", b"TCAA", b"CCAAAGGCCAAATTGAAAAGG", 0);

        let whole = Region::new(1, -1, false, false)?;
        assert_eq!(f.locate_range(&whole), exact(6, 16));

        let insert = Region::new(5, -5, false, false)?;
        assert_eq!(f.locate_range(&insert), exact(10, 12));

        let upstream = Region::new(-3, -1, true, false)?;
        assert_eq!(f.locate_range(&upstream), exact(3, 5));

        let downstream = Region::new(1, 10, true, false)?;
        assert_eq!(f.locate_range(&downstream), exact(17, 21));

        let strict = Region::new(1, 10, true, true)?;
        assert_eq!(f.locate_range(&strict), None);

        f.reset(b"CCCC", 0)?;
        assert_eq!(f.locate_range(&whole), None);
        Ok(())
    }

    #[test]
    fn find_all_overlapping() -> Result<()> {
        let m = PrimerMatcher::new(b"AA")?;
        assert_eq!(m.find_all(b"AAAA"), vec![0, 1, 2]);
        assert_eq!(m.find_last(b"AAAA"), Some(2));

        let m = PrimerMatcher::new(b"AN")?;
        assert_eq!(m.find_all(b"AAAT"), vec![0, 1, 2]);
        assert_eq!(m.find_first(b"CCAT"), Some(2));
        assert!(m.find_all(b"").is_empty());
        Ok(())
    }
}
