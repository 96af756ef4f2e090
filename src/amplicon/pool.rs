use log::debug;

use std::sync::{Arc, Mutex};

use crate::amplicon::*;
use crate::index::IndexOptions;

/// Free lists of reusable finders, one per primer pair.
///
/// Checking out moves a finder to the caller, so a finder is never shared between
/// threads. Each free list holds at most `capacity` idle finders; extra finders
/// checked in are dropped.
pub struct FinderPool {
    pairs: Vec<Arc<CompiledPair>>,
    free: Vec<Mutex<Vec<AmpliconFinder>>>,
    capacity: usize,
    options: IndexOptions,
}

impl FinderPool {
    pub fn new(pairs: Vec<Arc<CompiledPair>>, capacity: usize, options: IndexOptions) -> Self {
        let free = pairs.iter().map(|_| Mutex::new(Vec::new())).collect();

        Self {
            pairs,
            free,
            capacity,
            options,
        }
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// Take a finder for primer pair `idx`, reset against `seq`.
    pub fn checkout(&self, idx: usize, seq: &[u8], max_mismatch: usize) -> Result<AmpliconFinder> {
        let pooled = self.free[idx].lock().unwrap().pop();

        match pooled {
            Some(mut finder) => {
                finder.reset(seq, max_mismatch)?;
                Ok(finder)
            }
            None => {
                debug!(
                    "Creating a new amplicon finder for primer pair \"{}\"",
                    self.pairs[idx].name
                );
                AmpliconFinder::new(Arc::clone(&self.pairs[idx]), seq, max_mismatch, self.options)
            }
        }
    }

    /// Return a finder taken from `checkout(idx, ..)`.
    pub fn checkin(&self, idx: usize, finder: AmpliconFinder) {
        debug_assert!(Arc::ptr_eq(finder.pair(), &self.pairs[idx]));

        let mut free = self.free[idx].lock().unwrap();
        if free.len() < self.capacity {
            free.push(finder);
        }
    }

    /// Number of idle finders for primer pair `idx`.
    pub fn idle(&self, idx: usize) -> usize {
        self.free[idx].lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primers::PrimerPair;

    use rand::prelude::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use std::thread;

    fn pool(capacity: usize) -> FinderPool {
        let pairs = [
            PrimerPair::new("a", b"GGCC", b"TCAA").unwrap(),
            PrimerPair::new("b", b"ACGTTG", b"").unwrap(),
        ];
        let pairs = pairs
            .iter()
            .map(|p| Arc::new(CompiledPair::new(p).unwrap()))
            .collect();
        FinderPool::new(pairs, capacity, IndexOptions::default())
    }

    #[test]
    fn checkout_reuses_idle_finders() -> Result<()> {
        let pool = pool(1);
        assert_eq!(pool.num_pairs(), 2);
        assert_eq!(pool.idle(0), 0);

        let mut first = pool.checkout(0, b"GGCCTTGA", 0)?;
        let second = pool.checkout(0, b"CCCC", 0)?;
        assert_eq!(first.locate(), Some((Location::new(1, 8), Mismatches::default())));

        pool.checkin(0, first);
        pool.checkin(0, second);
        assert_eq!(pool.idle(0), 1);
        assert_eq!(pool.idle(1), 0);

        // a reused finder forgets its previous result
        let mut reused = pool.checkout(0, b"CCCC", 0)?;
        assert_eq!(reused.state(), SearchState::Unsearched);
        assert_eq!(reused.locate(), None);
        assert_eq!(pool.idle(0), 0);

        assert!(matches!(
            pool.checkout(1, b"", 0),
            Err(Error::EmptySequence(_))
        ));
        Ok(())
    }

    #[test]
    fn concurrent_checkout() {
        let pool = pool(4);

        thread::scope(|s| {
            for t in 0..8u64 {
                let pool = &pool;
                s.spawn(move || {
                    let mut rng = Xoshiro256PlusPlus::seed_from_u64(t);

                    for _ in 0..200 {
                        let pre = rng.gen_range(0..20);
                        let mid = rng.gen_range(0..20);
                        let post = rng.gen_range(0..20);
                        let k = rng.gen_range(0..2);

                        let mut seq = vec![b'A'; pre];
                        seq.extend_from_slice(b"GGCC");
                        seq.extend(std::iter::repeat(b'C').take(mid));
                        seq.extend_from_slice(b"TTGA");
                        seq.extend(std::iter::repeat(b'A').take(post));

                        let mut finder = pool.checkout(0, &seq, k).unwrap();
                        let found = finder.locate();
                        pool.checkin(0, finder);

                        if k == 0 {
                            let end = pre + 4 + mid + 4;
                            assert_eq!(
                                found,
                                Some((Location::new(pre + 1, end), Mismatches::default()))
                            );
                        } else {
                            let (location, _) = found.unwrap();
                            assert!(location.start <= location.end);
                            assert!(location.end <= seq.len());
                        }
                    }
                });
            }
        });

        assert!(pool.idle(0) <= 4);
    }
}
