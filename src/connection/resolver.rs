// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use enum_dispatch::enum_dispatch;
use log::debug;
use rand::Rng;

use crate::error::{ArangoError, Result};

/// Pure host-selection logic; no I/O, no suspension.
///
/// The exclude set lets a caller steer a manual re-attempt away from hosts
/// that already failed. The driver itself never retries.
#[enum_dispatch]
pub trait ResolveHost {
    /// Index of the host that should handle the next call.
    fn get_host_index(&self, exclude: &HashSet<usize>) -> usize;

    fn host_count(&self) -> usize;

    /// Upper bound a caller should put on manual re-attempts.
    fn max_tries(&self) -> usize;
}

/// Which host a [`Connection`](crate::connection::Connection) talks to next.
#[enum_dispatch(ResolveHost)]
#[derive(Debug)]
pub enum HostResolver {
    Single(SingleHostResolver),
    Random(RandomHostResolver),
    RoundRobin(RoundRobinHostResolver),
    Fallback(FallbackHostResolver),
}

impl HostResolver {
    pub fn single() -> Self {
        Self::Single(SingleHostResolver)
    }

    /// Uniformly random selection; requires at least two hosts, since its
    /// point is retry diversity.
    pub fn random(host_count: usize) -> Result<Self> {
        if host_count < 2 {
            return Err(ArangoError::invalid_input(
                "random host resolution needs at least 2 hosts",
            ));
        }
        Ok(Self::Random(RandomHostResolver { host_count }))
    }

    pub fn round_robin(host_count: usize) -> Result<Self> {
        if host_count == 0 {
            return Err(ArangoError::invalid_input("host count must be positive"));
        }
        Ok(Self::RoundRobin(RoundRobinHostResolver {
            host_count,
            // first call wraps to index 0
            index: AtomicUsize::new(host_count - 1),
        }))
    }

    pub fn fallback(host_count: usize) -> Result<Self> {
        if host_count == 0 {
            return Err(ArangoError::invalid_input("host count must be positive"));
        }
        Ok(Self::Fallback(FallbackHostResolver {
            host_count,
            index: AtomicUsize::new(0),
        }))
    }
}

/// Always host 0.
#[derive(Debug)]
pub struct SingleHostResolver;

impl ResolveHost for SingleHostResolver {
    fn get_host_index(&self, _exclude: &HashSet<usize>) -> usize {
        0
    }

    fn host_count(&self) -> usize {
        1
    }

    fn max_tries(&self) -> usize {
        3
    }
}

#[derive(Debug)]
pub struct RandomHostResolver {
    host_count: usize,
}

impl ResolveHost for RandomHostResolver {
    fn get_host_index(&self, exclude: &HashSet<usize>) -> usize {
        let candidates: Vec<usize> = (0..self.host_count)
            .filter(|index| !exclude.contains(index))
            .collect();
        let mut rng = rand::thread_rng();
        match candidates.len() {
            // caller excluded everything; any host is as good as any other
            0 => rng.gen_range(0..self.host_count),
            n => candidates[rng.gen_range(0..n)],
        }
    }

    fn host_count(&self) -> usize {
        self.host_count
    }

    fn max_tries(&self) -> usize {
        self.host_count * 3
    }
}

/// Successive indices, wrapping modulo the host count.
#[derive(Debug)]
pub struct RoundRobinHostResolver {
    host_count: usize,
    index: AtomicUsize,
}

impl ResolveHost for RoundRobinHostResolver {
    fn get_host_index(&self, _exclude: &HashSet<usize>) -> usize {
        let previous = self.index.fetch_add(1, Ordering::Relaxed);
        (previous + 1) % self.host_count
    }

    fn host_count(&self) -> usize {
        self.host_count
    }

    fn max_tries(&self) -> usize {
        self.host_count * 3
    }
}

/// Sticks to the current host until the caller excludes it, then advances.
#[derive(Debug)]
pub struct FallbackHostResolver {
    host_count: usize,
    index: AtomicUsize,
}

impl ResolveHost for FallbackHostResolver {
    fn get_host_index(&self, exclude: &HashSet<usize>) -> usize {
        let mut current = self.index.load(Ordering::Relaxed);
        if exclude.len() >= self.host_count {
            return current;
        }
        while exclude.contains(&current) {
            current = (current + 1) % self.host_count;
            debug!("trying fallback on host {}", current);
        }
        self.index.store(current, Ordering::Relaxed);
        current
    }

    fn host_count(&self) -> usize {
        self.host_count
    }

    fn max_tries(&self) -> usize {
        self.host_count * 3
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn no_exclusions() -> HashSet<usize> {
        HashSet::new()
    }

    #[rstest]
    #[case(1)]
    #[case(5)]
    #[case(100)]
    fn single_always_returns_zero(#[case] calls: usize) {
        let resolver = HostResolver::single();
        for _ in 0..calls {
            assert_eq!(resolver.get_host_index(&no_exclusions()), 0);
        }
    }

    #[test]
    fn round_robin_wraps_in_order() {
        let resolver = HostResolver::round_robin(3).unwrap();
        let indices: Vec<usize> = (0..4)
            .map(|_| resolver.get_host_index(&no_exclusions()))
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 0]);
    }

    #[test]
    fn random_needs_two_hosts() {
        assert!(matches!(
            HostResolver::random(1),
            Err(ArangoError::InvalidInput { .. })
        ));
    }

    #[test]
    fn random_stays_in_range_and_honors_exclusions() {
        let resolver = HostResolver::random(4).unwrap();
        let exclude: HashSet<usize> = [0, 2].into_iter().collect();
        for _ in 0..50 {
            let index = resolver.get_host_index(&exclude);
            assert!(index == 1 || index == 3, "unexpected index {}", index);
        }
    }

    #[test]
    fn fallback_advances_past_excluded_hosts() {
        let resolver = HostResolver::fallback(3).unwrap();
        assert_eq!(resolver.get_host_index(&no_exclusions()), 0);
        let exclude: HashSet<usize> = [0].into_iter().collect();
        assert_eq!(resolver.get_host_index(&exclude), 1);
        // sticky once moved
        assert_eq!(resolver.get_host_index(&no_exclusions()), 1);
        let exclude: HashSet<usize> = [1, 2].into_iter().collect();
        assert_eq!(resolver.get_host_index(&exclude), 0);
    }
}
