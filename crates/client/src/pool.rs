//! Bounded-concurrency batch executor.
//!
//! Runs N independent fetch jobs with at most W in flight, collecting every
//! outcome (success or failure) into a result vector positionally aligned
//! with the input. A worker that hits a slow or failing job stalls only its
//! own slot; the remaining workers keep pulling jobs off the shared counter.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tracing::debug;

use crate::fetch::{FetchOutcome, ResourceFetcher, Target};

/// Execute `jobs` with at most `concurrency` in flight.
///
/// Returns one [`FetchOutcome`] per job, `result[i]` corresponding to
/// `jobs[i]` regardless of completion order. The call itself never fails:
/// each job's error is captured in its own slot.
///
/// `progress(done, total, slot)` is invoked exactly once per job, after that
/// job finishes, from whichever worker ran it. No ordering is guaranteed
/// across invocations beyond completion.
pub async fn run_batch<F>(
    fetcher: &dyn ResourceFetcher,
    jobs: &[Target],
    concurrency: usize,
    progress: F,
) -> Vec<FetchOutcome>
where
    F: Fn(usize, usize, usize) + Sync,
{
    let total = jobs.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = concurrency.clamp(1, total);
    debug!(jobs = total, workers, "running fetch batch");

    // The claim counter is the only cross-worker mutable state; each worker
    // owns every index it claims and records outcomes locally.
    let next = AtomicUsize::new(0);
    let done = AtomicUsize::new(0);

    let worker_outputs = join_all((0..workers).map(|_| {
        let next = &next;
        let done = &done;
        let progress = &progress;
        async move {
            let mut claimed: Vec<(usize, FetchOutcome)> = Vec::new();
            loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                if i >= total {
                    break;
                }
                let outcome = fetcher.fetch_json(&jobs[i]).await;
                claimed.push((i, outcome));
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress(finished, total, i);
            }
            claimed
        }
    }))
    .await;

    // Merge per-worker outputs back into input order. Every index was
    // claimed exactly once, so this is a permutation of 0..total.
    let mut merged: Vec<(usize, FetchOutcome)> =
        worker_outputs.into_iter().flatten().collect();
    merged.sort_by_key(|(i, _)| *i);
    merged.into_iter().map(|(_, outcome)| outcome).collect()
}
