//! Key generation and selection
//!
//! Before dispatch starts, the executor asks a [`KeySource`] for a plan: the
//! ordered list of keys it will hand out, one per lookup. Building the whole
//! plan up front keeps workers free of shared RNG state and makes runs
//! reproducible whenever the source is.

use crate::{
    error::{ConfigError, ConfigResult},
    metric::LookupKey,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::path::Path;

/// Produces the keys a run will look up.
pub trait KeySource: Send + Sync {
    /// Return at most `samples` keys, in dispatch order.
    ///
    /// A source that runs dry returns fewer. The executor then dispatches
    /// only what it was given.
    fn plan(&self, samples: usize) -> Vec<LookupKey>;
}

/// How keys are picked out of the pool for each dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    /// Dispatch `i` uses pool entry `i`, wrapping around a fixed pool.
    #[default]
    Sequential,
    /// Every dispatch draws uniformly from the pool. A seed makes the draw
    /// reproducible.
    Random { seed: Option<u64> },
}

/// A pool of domain names plus a [`Selection`] strategy.
///
/// Without a fixed domain list the pool is generated per run as
/// `example0.com .. example{n-1}.com`, `n` being the sample count.
#[derive(Clone, Debug, Default)]
pub struct KeyPool {
    domains: Option<Vec<LookupKey>>,
    selection: Selection,
}

impl KeyPool {
    /// A pool generated from the sample count.
    pub fn generated(selection: Selection) -> Self {
        Self {
            domains: None,
            selection,
        }
    }

    /// A fixed pool of domains.
    pub fn from_domains(domains: Vec<LookupKey>, selection: Selection) -> Self {
        Self {
            domains: Some(domains),
            selection,
        }
    }

    /// Read a fixed pool from a file with one domain per line.
    ///
    /// Blank lines and lines starting with `#` are skipped. A file left with
    /// no domains is rejected.
    pub fn from_file(path: impl AsRef<Path>, selection: Selection) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let domains: Vec<LookupKey> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(LookupKey::from)
            .collect();
        if domains.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "domains file {} contains no domains",
                path.display()
            )));
        }
        Ok(Self::from_domains(domains, selection))
    }

    fn pool(&self, samples: usize) -> Vec<LookupKey> {
        match &self.domains {
            Some(domains) => domains.clone(),
            None => generate_domains(samples),
        }
    }
}

impl KeySource for KeyPool {
    fn plan(&self, samples: usize) -> Vec<LookupKey> {
        let pool = self.pool(samples);
        if pool.is_empty() {
            return Vec::new();
        }

        match self.selection {
            Selection::Sequential => pool.iter().cycle().take(samples).cloned().collect(),
            Selection::Random { seed } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                (0..samples)
                    .filter_map(|_| pool.choose(&mut rng).cloned())
                    .collect()
            }
        }
    }
}

impl KeySource for Vec<LookupKey> {
    /// Hands the keys out as given, wrapping around when more are needed.
    fn plan(&self, samples: usize) -> Vec<LookupKey> {
        self.iter().cycle().take(samples).cloned().collect()
    }
}

/// Deterministic pool of `count` domains.
pub fn generate_domains(count: usize) -> Vec<LookupKey> {
    (0..count)
        .map(|i| LookupKey::new(format!("example{i}.com")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn generated_sequential_is_deterministic() {
        let plan = KeyPool::generated(Selection::Sequential).plan(3);
        let keys: Vec<&str> = plan.iter().map(LookupKey::as_str).collect();
        assert_eq!(keys, ["example0.com", "example1.com", "example2.com"]);
    }

    #[test]
    fn zero_samples_yield_empty_plan() {
        assert!(KeyPool::generated(Selection::Sequential).plan(0).is_empty());
        assert!(KeyPool::generated(Selection::Random { seed: None })
            .plan(0)
            .is_empty());
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let pool = KeyPool::generated(Selection::Random { seed: Some(42) });
        let first = pool.plan(50);
        let second = pool.plan(50);

        assert_eq!(first.len(), 50);
        assert_eq!(first, second);

        let domains = generate_domains(50);
        assert!(first.iter().all(|k| domains.contains(k)));
    }

    #[test]
    fn fixed_pool_wraps_around() {
        let pool = KeyPool::from_domains(
            vec!["a.com".into(), "b.com".into()],
            Selection::Sequential,
        );
        let plan: Vec<String> = pool.plan(5).iter().map(ToString::to_string).collect();
        assert_eq!(plan, ["a.com", "b.com", "a.com", "b.com", "a.com"]);
    }

    #[test]
    fn empty_fixed_pool_yields_nothing() {
        let pool = KeyPool::from_domains(vec![], Selection::Random { seed: Some(1) });
        assert!(pool.plan(10).is_empty());
    }

    #[test]
    fn reads_domains_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# reputation targets\ngoogle.com\n\n  github.com  \n").unwrap();

        let pool = KeyPool::from_file(file.path(), Selection::Sequential).unwrap();
        let plan: Vec<String> = pool.plan(2).iter().map(ToString::to_string).collect();
        assert_eq!(plan, ["google.com", "github.com"]);
    }

    #[test]
    fn rejects_domains_file_without_domains() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nothing\n\n   \n").unwrap();

        let err = KeyPool::from_file(file.path(), Selection::Sequential).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)), "{err}");
    }

    #[test]
    fn plan_never_exceeds_samples() {
        let pools = [
            KeyPool::generated(Selection::Sequential),
            KeyPool::generated(Selection::Random { seed: Some(9) }),
            KeyPool::from_domains(vec!["a.com".into()], Selection::Sequential),
            KeyPool::from_domains(vec![], Selection::Sequential),
        ];
        for pool in &pools {
            for samples in [0, 1, 7] {
                assert!(pool.plan(samples).len() <= samples, "{pool:?}");
            }
        }
    }
}
