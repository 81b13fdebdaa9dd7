//! Sentry classification.
//!
//! A node is a sentry when it both receives and issues at least `dSen`
//! certifications, where `dSen = ceil(members_count ^ (1 / step_max))`.

use serde::{Deserialize, Serialize};

use crate::error::{PathfindError, Result};
use crate::graph::WotGraph;

/// Validated network parameters and the degree threshold derived from them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentryThreshold {
    pub members_count: u64,
    pub step_max: u32,
    pub d_sen: u64,
}

impl SentryThreshold {
    /// Validate raw ledger parameters and compute `dSen`.
    ///
    /// A zero member count gives `dSen = 0`, which makes every node a sentry.
    pub fn compute(members_count: i64, step_max: i64) -> Result<Self> {
        let members_count = u64::try_from(members_count).map_err(|_| {
            PathfindError::InvalidParameter(format!(
                "network size must not be negative, got {members_count}"
            ))
        })?;
        let step_max = u32::try_from(step_max)
            .ok()
            .filter(|&s| s > 0)
            .ok_or_else(|| {
                PathfindError::InvalidParameter(format!(
                    "stepMax must be a positive integer, got {step_max}"
                ))
            })?;

        Ok(Self {
            members_count,
            step_max,
            d_sen: ceil_root(members_count, step_max),
        })
    }
}

/// Smallest `d` such that `d^k >= n`, i.e. `ceil(n^(1/k))` without float drift.
pub fn ceil_root(n: u64, k: u32) -> u64 {
    if n == 0 {
        return 0;
    }

    let mut d = (n as f64).powf(1.0 / f64::from(k)).ceil() as u64;
    while d > 1 && pow_reaches(d - 1, k, n) {
        d -= 1;
    }
    while !pow_reaches(d, k, n) {
        d += 1;
    }
    d
}

/// Whether `base^exp >= n`.
fn pow_reaches(base: u64, exp: u32, n: u64) -> bool {
    if base <= 1 {
        return base >= n;
    }
    let mut acc: u128 = 1;
    for _ in 0..exp {
        acc *= u128::from(base);
        if acc >= u128::from(n) {
            return true;
        }
    }
    false
}

/// Recompute every node's sentry flag from scratch. Returns the sentry count.
///
/// Flags are decided from the degrees alone before any is written, so the
/// result does not depend on node order and re-running is a no-op.
pub fn classify(graph: &mut WotGraph, threshold: &SentryThreshold) -> usize {
    let d_sen = threshold.d_sen as usize;
    let flags: Vec<bool> = (0..graph.node_count())
        .map(|i| graph.in_degree(i) >= d_sen && graph.out_degree(i) >= d_sen)
        .collect();

    let mut sentries = 0;
    for (i, is_sentry) in flags.into_iter().enumerate() {
        graph.set_sentry(i, is_sentry);
        if is_sentry {
            sentries += 1;
        }
    }

    tracing::debug!(
        d_sen = threshold.d_sen,
        members_count = threshold.members_count,
        step_max = threshold.step_max,
        sentries,
        "Sentries classified"
    );
    sentries
}

#[cfg(test)]
mod tests {
    use super::*;
    use wot_core::{CertificationRecord, IdentityRecord, Pubkey};

    fn graph(keys: &[&str], edges: &[(&str, &str)]) -> WotGraph {
        let identities = keys
            .iter()
            .map(|k| IdentityRecord::new(k, k, true))
            .collect();
        let certs: Vec<CertificationRecord> = edges
            .iter()
            .map(|(a, b)| CertificationRecord::new(a, b))
            .collect();
        WotGraph::from_records(identities, &certs).0
    }

    fn is_sentry(graph: &WotGraph, key: &str) -> bool {
        graph.node(graph.index_of(&Pubkey::from(key)).unwrap()).is_sentry
    }

    #[test]
    fn test_threshold_values() {
        assert_eq!(SentryThreshold::compute(0, 5).unwrap().d_sen, 0);
        assert_eq!(SentryThreshold::compute(1, 5).unwrap().d_sen, 1);
        assert_eq!(SentryThreshold::compute(8, 3).unwrap().d_sen, 2);
        assert_eq!(SentryThreshold::compute(9, 3).unwrap().d_sen, 3);
        assert_eq!(SentryThreshold::compute(1000, 3).unwrap().d_sen, 10);
        assert_eq!(SentryThreshold::compute(1001, 3).unwrap().d_sen, 11);
        assert_eq!(SentryThreshold::compute(10, 1).unwrap().d_sen, 10);
        // Duniter g1-like parameters.
        assert_eq!(SentryThreshold::compute(5000, 5).unwrap().d_sen, 6);
    }

    #[test]
    fn test_ceil_root_exact_powers() {
        for k in 1..=6u32 {
            for d in 1..=30u64 {
                let n = d.pow(k);
                assert_eq!(ceil_root(n, k), d, "n={n} k={k}");
                assert_eq!(ceil_root(n + 1, k), d + 1, "n={} k={k}", n + 1);
            }
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            SentryThreshold::compute(10, 0),
            Err(PathfindError::InvalidParameter(_))
        ));
        assert!(matches!(
            SentryThreshold::compute(10, -2),
            Err(PathfindError::InvalidParameter(_))
        ));
        assert!(matches!(
            SentryThreshold::compute(-1, 5),
            Err(PathfindError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_requires_both_directions() {
        // A→B, B→C, A→C, A→D, B→D with dSen = 1.
        let mut g = graph(
            &["A", "B", "C", "D"],
            &[("A", "B"), ("B", "C"), ("A", "C"), ("A", "D"), ("B", "D")],
        );
        let threshold = SentryThreshold::compute(1, 1).unwrap();
        assert_eq!(threshold.d_sen, 1);

        let count = classify(&mut g, &threshold);

        // Only B both receives and issues.
        assert_eq!(count, 1);
        assert!(!is_sentry(&g, "A"));
        assert!(is_sentry(&g, "B"));
        assert!(!is_sentry(&g, "C"));
        assert!(!is_sentry(&g, "D"));

        // D starts issuing: it now qualifies.
        g.add_edge(&CertificationRecord::new("D", "A")).unwrap();
        classify(&mut g, &threshold);
        assert!(is_sentry(&g, "D"));
        assert!(is_sentry(&g, "A"));
    }

    #[test]
    fn test_zero_members_marks_everyone() {
        let mut g = graph(&["A", "B", "C"], &[("A", "B")]);
        let threshold = SentryThreshold::compute(0, 5).unwrap();
        assert_eq!(classify(&mut g, &threshold), 3);
        assert!(is_sentry(&g, "C"));
    }

    #[test]
    fn test_classify_is_idempotent() {
        let mut g = graph(
            &["A", "B", "C", "D", "E"],
            &[
                ("A", "B"),
                ("B", "A"),
                ("B", "C"),
                ("C", "B"),
                ("C", "A"),
                ("A", "C"),
                ("D", "E"),
            ],
        );
        let threshold = SentryThreshold::compute(4, 2).unwrap();
        assert_eq!(threshold.d_sen, 2);

        classify(&mut g, &threshold);
        let first: Vec<bool> = g.nodes().iter().map(|n| n.is_sentry).collect();
        let fp = g.fingerprint();

        classify(&mut g, &threshold);
        let second: Vec<bool> = g.nodes().iter().map(|n| n.is_sentry).collect();

        assert_eq!(first, second);
        assert_eq!(fp, g.fingerprint());
        assert_eq!(first, vec![true, true, true, false, false]);
    }

    #[test]
    fn test_classify_clears_stale_flags() {
        let mut g = graph(&["A", "B"], &[("A", "B")]);
        let a = g.index_of(&Pubkey::from("A")).unwrap();
        g.set_sentry(a, true);

        let threshold = SentryThreshold::compute(2, 1).unwrap();
        assert_eq!(classify(&mut g, &threshold), 0);
        assert!(!is_sentry(&g, "A"));
    }
}
