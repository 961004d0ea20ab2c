//! The per-target decision: skip entirely, run incrementally, or run the
//! full target body. A target is declared up to date only when every
//! correlated output is at least as fresh as every input that feeds it and
//! at least one output exists; a tie in mtimes counts as out of date
//! (filesystem timestamp resolution cannot prove freshness either way, so
//! the conservative answer wins).

use std::path::{Path, PathBuf};

use crate::error::UpToDateError;
use crate::uptodate::timestamp_cache::{Freshness, TimestampCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Every correlated output is newer than every input; nothing to do.
    SkipEntirely,
    /// Inputs and outputs are correlated one-to-one and only a subset is
    /// stale; only the stale pairs need to run.
    IncrementalBuild,
    /// No correlation could be established, or at least one input has no
    /// corresponding output: the whole target body must run.
    FullBuild,
}

/// A single input/output correlation the checker evaluates. `None` as the
/// output means this input has no corresponding output item, which forces
/// `FullBuild` for the whole target (correlation requires a complete,
/// equal-length pairing).
pub struct Correlation {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
}

pub struct UpToDateChecker<'a> {
    cache: &'a mut TimestampCache,
}

impl<'a> UpToDateChecker<'a> {
    pub fn new(cache: &'a mut TimestampCache) -> Self {
        UpToDateChecker { cache }
    }

    pub fn check(&mut self, inputs: &[PathBuf], outputs: &[PathBuf]) -> Result<BuildOutcome, UpToDateError> {
        if inputs.is_empty() {
            // An input list expanding to the empty sequence skips the target
            // entirely, regardless of what outputs are declared.
            return Ok(BuildOutcome::SkipEntirely);
        }
        if outputs.is_empty() {
            // A target declaring no outputs at all can never be proven up to
            // date; the empty-outputs edge case always runs in full.
            return Ok(BuildOutcome::FullBuild);
        }

        let correlated = Self::correlate(inputs, outputs);
        match correlated {
            Some(pairs) => self.check_correlated(&pairs),
            None => Ok(BuildOutcome::FullBuild),
        }
    }

    /// Inputs and outputs correlate positionally when they're equal in
    /// length and non-empty; any other shape (including either side empty
    /// while the other isn't) cannot be correlated.
    fn correlate(inputs: &[PathBuf], outputs: &[PathBuf]) -> Option<Vec<Correlation>> {
        if inputs.is_empty() || outputs.is_empty() || inputs.len() != outputs.len() {
            return None;
        }
        Some(
            inputs
                .iter()
                .zip(outputs.iter())
                .map(|(i, o)| Correlation { input: i.clone(), output: Some(o.clone()) })
                .collect(),
        )
    }

    fn check_correlated(&mut self, pairs: &[Correlation]) -> Result<BuildOutcome, UpToDateError> {
        let mut any_stale = false;
        let mut any_fresh = false;
        for pair in pairs {
            if self.pair_is_stale(pair)? {
                any_stale = true;
            } else {
                any_fresh = true;
            }
        }
        match (any_stale, any_fresh) {
            (false, _) => Ok(BuildOutcome::SkipEntirely),
            (true, true) => Ok(BuildOutcome::IncrementalBuild),
            (true, false) => Ok(BuildOutcome::FullBuild),
        }
    }

    fn pair_is_stale(&mut self, pair: &Correlation) -> Result<bool, UpToDateError> {
        let Some(output) = &pair.output else { return Ok(true) };
        let input_time = self.freshness_time(&pair.input)?;
        let output_time = self.freshness_time(output)?;
        match (input_time, output_time) {
            (Freshness::Missing, _) => Ok(true),
            (Freshness::Present(_), Freshness::Missing) => Ok(true),
            (Freshness::Present(i), Freshness::Present(o)) => Ok(o <= i),
        }
    }

    fn freshness_time(&mut self, path: &Path) -> Result<Freshness, UpToDateError> {
        self.cache.mtime(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn touch(path: &Path, when: SystemTime) {
        std::fs::write(path, b"x").unwrap();
        let file = std::fs::File::open(path).unwrap();
        file.set_modified(when).unwrap();
    }

    #[test]
    fn fresh_output_skips_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.c");
        let output = dir.path().join("out.o");
        let now = SystemTime::now();
        touch(&input, now - Duration::from_secs(10));
        touch(&output, now);

        let mut cache = TimestampCache::new();
        let mut checker = UpToDateChecker::new(&mut cache);
        let outcome = checker.check(&[input], &[output]).unwrap();
        assert_eq!(outcome, BuildOutcome::SkipEntirely);
    }

    #[test]
    fn equal_mtimes_count_as_out_of_date() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.c");
        let output = dir.path().join("out.o");
        let now = SystemTime::now();
        touch(&input, now);
        touch(&output, now);

        let mut cache = TimestampCache::new();
        let mut checker = UpToDateChecker::new(&mut cache);
        let outcome = checker.check(&[input], &[output]).unwrap();
        assert_eq!(outcome, BuildOutcome::FullBuild);
    }

    #[test]
    fn missing_output_forces_full_build() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.c");
        std::fs::write(&input, b"x").unwrap();
        let output = dir.path().join("out.o");

        let mut cache = TimestampCache::new();
        let mut checker = UpToDateChecker::new(&mut cache);
        let outcome = checker.check(&[input], &[output]).unwrap();
        assert_eq!(outcome, BuildOutcome::FullBuild);
    }

    #[test]
    fn no_outputs_declared_always_runs_full() {
        let mut cache = TimestampCache::new();
        let mut checker = UpToDateChecker::new(&mut cache);
        let outcome = checker.check(&[PathBuf::from("/a")], &[]).unwrap();
        assert_eq!(outcome, BuildOutcome::FullBuild);
    }

    #[test]
    fn empty_inputs_skip_entirely_even_with_outputs_declared() {
        let mut cache = TimestampCache::new();
        let mut checker = UpToDateChecker::new(&mut cache);
        let outcome = checker.check(&[], &[PathBuf::from("/out")]).unwrap();
        assert_eq!(outcome, BuildOutcome::SkipEntirely);
    }

    #[test]
    fn mismatched_lengths_cannot_correlate() {
        let mut cache = TimestampCache::new();
        let mut checker = UpToDateChecker::new(&mut cache);
        let outcome = checker.check(&[PathBuf::from("/a"), PathBuf::from("/b")], &[PathBuf::from("/out")]).unwrap();
        assert_eq!(outcome, BuildOutcome::FullBuild);
    }
}
