use crate::error::{SimError, SimResult};
use crate::network::PersonId;
use rand::prelude::*;

/// Draws items of a pool without replacement.
#[derive(Debug, Clone)]
pub struct PoolSampler<T> {
    pool: Vec<T>,
    remaining: usize,
}

pub type IndexSampler = PoolSampler<usize>;
pub type PersonSampler = PoolSampler<PersonId>;

impl<T: Copy> PoolSampler<T> {
    pub fn from_pool(pool: Vec<T>) -> Self {
        let remaining = pool.len();
        Self { pool, remaining }
    }

    /// Draw the next item, or `None` once the pool is exhausted.
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<T> {
        if self.remaining == 0 {
            return None;
        }
        let i_item = rng.random_range(0..self.remaining);
        self.remaining -= 1;
        self.pool.swap(i_item, self.remaining);
        Some(self.pool[self.remaining])
    }

    /// Draw `count` distinct items.
    pub fn take<R: Rng + ?Sized>(&mut self, rng: &mut R, count: usize) -> SimResult<Vec<T>> {
        if count > self.remaining {
            return Err(SimError::InvalidSampleSize {
                requested: count,
                universe: self.remaining,
                max: self.remaining,
            });
        }
        Ok((0..count).filter_map(|_| self.next(rng)).collect())
    }
}

impl IndexSampler {
    pub fn new(n: usize) -> Self {
        Self::from_pool((0..n).collect())
    }
}

/// Draws distinct unordered pairs `(a, b)` with `a != b` from `0..n`.
#[derive(Debug, Clone)]
pub struct PairSampler {
    n: usize,
    requested: usize,
    emitted: usize,
    seen: Vec<u64>,
}

impl PairSampler {
    /// Largest sample size allowed for a universe of `n` items: half of all
    /// unordered pairs, which keeps rejection sampling cheap.
    pub fn max_sample(n: usize) -> usize {
        n * n.saturating_sub(1) / 4
    }

    pub fn new(n: usize, requested: usize) -> SimResult<Self> {
        let max = Self::max_sample(n);
        if n <= 2 || requested > max {
            return Err(SimError::InvalidSampleSize {
                requested,
                universe: n,
                max,
            });
        }
        let n_pairs = n * (n - 1) / 2;
        Ok(Self {
            n,
            requested,
            emitted: 0,
            seen: vec![0; n_pairs.div_ceil(64)],
        })
    }

    /// Draw the next pair, or `None` once `requested` pairs were emitted.
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<(usize, usize)> {
        if self.emitted == self.requested {
            return None;
        }
        loop {
            let src = rng.random_range(0..self.n);
            let tgt = rng.random_range(0..self.n);
            if src == tgt {
                continue;
            }
            let key = pair_key(src, tgt);
            let (word, bit) = (key / 64, 1u64 << (key % 64));
            if self.seen[word] & bit != 0 {
                continue;
            }
            self.seen[word] |= bit;
            self.emitted += 1;
            return Some((src, tgt));
        }
    }
}

/// Order-independent index of the unordered pair `{a, b}`, `a != b`.
fn pair_key(a: usize, b: usize) -> usize {
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi * (hi - 1) / 2 + lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;
    use std::collections::HashSet;

    #[test]
    fn index_sampler_draws_each_index_once() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let mut sampler = IndexSampler::new(50);
        let drawn: HashSet<_> = std::iter::from_fn(|| sampler.next(&mut rng)).collect();
        assert_eq!(drawn.len(), 50);
        assert!(drawn.iter().all(|&i| i < 50));
        assert_eq!(sampler.next(&mut rng), None);
    }

    #[test]
    fn take_rejects_oversized_requests() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let mut sampler = IndexSampler::new(3);
        assert!(sampler.take(&mut rng, 4).is_err());
        assert_eq!(sampler.take(&mut rng, 3).unwrap().len(), 3);
    }

    #[test]
    fn pair_sampler_emits_distinct_pairs() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        for n in [3, 4, 10, 37] {
            let k = PairSampler::max_sample(n);
            let mut sampler = PairSampler::new(n, k).unwrap();
            let mut pairs = HashSet::new();
            while let Some((a, b)) = sampler.next(&mut rng) {
                assert_ne!(a, b);
                assert!(a < n && b < n);
                assert!(pairs.insert((a.min(b), a.max(b))));
            }
            assert_eq!(pairs.len(), k);
        }
    }

    #[test]
    fn pair_sampler_rejects_invalid_sizes() {
        assert!(PairSampler::new(2, 0).is_err());
        assert!(PairSampler::new(10, 22).is_ok());
        assert_eq!(
            PairSampler::new(10, 23).unwrap_err(),
            SimError::InvalidSampleSize {
                requested: 23,
                universe: 10,
                max: 22
            }
        );
    }

    #[test]
    fn pair_keys_are_unique_and_symmetric() {
        let n = 20;
        let mut keys = HashSet::new();
        for a in 0..n {
            for b in 0..a {
                assert_eq!(pair_key(a, b), pair_key(b, a));
                assert!(keys.insert(pair_key(a, b)));
            }
        }
        assert_eq!(keys.len(), n * (n - 1) / 2);
        assert_eq!(keys.iter().max(), Some(&(n * (n - 1) / 2 - 1)));
    }
}
