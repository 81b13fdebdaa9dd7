//! Trust-path algorithms: 2-hop shortening paths and all-shortest sentry paths.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::error::{PathfindError, Result};
use crate::graph::WotGraph;
use crate::types::{SentryPath, ShorteningPath};

/// How many traversal steps run between two clock reads.
const CLOCK_STRIDE: u32 = 256;

/// Optional wall-clock budget for a single query.
#[derive(Debug, Clone)]
pub struct Budget {
    started: Instant,
    limit: Option<Duration>,
    steps: u32,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self {
            started: Instant::now(),
            limit: None,
            steps: 0,
        }
    }

    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            limit,
            ..Self::unlimited()
        }
    }

    /// Count one traversal step; fails once the limit is exceeded.
    pub fn tick(&mut self) -> Result<()> {
        let Some(limit) = self.limit else {
            return Ok(());
        };
        self.steps = self.steps.wrapping_add(1);
        if self.steps % CLOCK_STRIDE == 0 && self.started.elapsed() > limit {
            return Err(PathfindError::Timeout {
                max_ms: limit.as_millis() as u64,
            });
        }
        Ok(())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Identities `f2f` with a path `f2f -> x -> target` that do not certify
/// `target` themselves.
///
/// Bounded to exactly two hops backward. Results are ordered by path count
/// descending, then by uid.
pub fn shortening_paths(
    graph: &WotGraph,
    target: usize,
    budget: &mut Budget,
) -> Result<Vec<ShorteningPath>> {
    let direct: HashSet<usize> = graph.neighbors_in(target).collect();

    // f2f -> distinct intermediates. Edges are unique per ordered pair, so
    // each intermediate stands for exactly one path.
    let mut found: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for x in graph.neighbors_in(target) {
        for f2f in graph.neighbors_in(x) {
            budget.tick()?;
            if f2f == target || direct.contains(&f2f) {
                continue;
            }
            found.entry(f2f).or_default().insert(x);
        }
    }

    let mut results: Vec<ShorteningPath> = found
        .into_iter()
        .map(|(f2f, via)| {
            let mut certifiers: Vec<String> =
                via.iter().map(|&x| graph.node(x).uid.clone()).collect();
            certifiers.sort();
            ShorteningPath {
                f2f: graph.node(f2f).uid.clone(),
                path_count: via.len(),
                certifiers,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.path_count
            .cmp(&a.path_count)
            .then_with(|| a.f2f.cmp(&b.f2f))
    });
    Ok(results)
}

/// All shortest outgoing paths from `source` to every reachable sentry.
///
/// One BFS records, for each node, every predecessor lying on a shortest
/// path; the paths to each sentry are then enumerated backward over that
/// predecessor DAG. The source itself is never reported as a destination.
/// Results are ordered by path count descending, then length, then uid.
pub fn sentry_paths(
    graph: &WotGraph,
    source: usize,
    budget: &mut Budget,
) -> Result<Vec<SentryPath>> {
    let n = graph.node_count();
    let mut dist: Vec<Option<usize>> = vec![None; n];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut order = Vec::new();

    dist[source] = Some(0);
    let mut queue = VecDeque::from([source]);

    while let Some(node) = queue.pop_front() {
        order.push(node);
        let next = dist[node].unwrap_or_default() + 1;
        for succ in graph.neighbors_out(node) {
            budget.tick()?;
            match dist[succ] {
                None => {
                    dist[succ] = Some(next);
                    preds[succ].push(node);
                    queue.push_back(succ);
                }
                Some(d) if d == next => preds[succ].push(node),
                Some(_) => {}
            }
        }
    }

    let mut results = Vec::new();
    for &target in order.iter().skip(1) {
        if !graph.node(target).is_sentry {
            continue;
        }

        let mut paths: Vec<Vec<String>> = enumerate_intermediates(&preds, source, target, budget)?
            .into_iter()
            .map(|path| path.into_iter().map(|i| graph.node(i).uid.clone()).collect())
            .collect();
        paths.sort();

        results.push(SentryPath {
            sentry: graph.node(target).uid.clone(),
            count: paths.len() as u64,
            length: dist[target].unwrap_or_default(),
            paths,
        });
    }

    results.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.length.cmp(&b.length))
            .then_with(|| a.sentry.cmp(&b.sentry))
    });
    Ok(results)
}

/// Walk the shortest-path predecessor DAG from `target` back to `source`,
/// collecting the intermediate nodes of every path in forward order.
fn enumerate_intermediates(
    preds: &[Vec<usize>],
    source: usize,
    target: usize,
    budget: &mut Budget,
) -> Result<Vec<Vec<usize>>> {
    let mut paths = Vec::new();
    // (node, intermediates collected so far, nearest-to-target first)
    let mut stack: Vec<(usize, Vec<usize>)> = vec![(target, Vec::new())];

    while let Some((node, trail)) = stack.pop() {
        for &pred in &preds[node] {
            budget.tick()?;
            if pred == source {
                let mut path = trail.clone();
                path.reverse();
                paths.push(path);
            } else {
                let mut next = trail.clone();
                next.push(pred);
                stack.push((pred, next));
            }
        }
    }

    Ok(paths)
}
