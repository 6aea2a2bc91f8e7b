//! Deadline racing for concurrent work.
//!
//! # Responsibilities
//! - Drive a set of futures until all finish or a deadline passes
//! - Hand back whatever finished, in input order, and drop the rest
//!
//! # Design Decisions
//! - Uses Tokio's timer; dropping unfinished futures is the cancellation
//! - Dropped work cannot write results after the deadline

use std::future::Future;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};

/// Outcome of [`race_all`].
#[derive(Debug)]
pub struct Raced<T> {
    /// One slot per input future, `None` where the deadline won.
    pub outputs: Vec<Option<T>>,
    pub timed_out: bool,
}

/// Poll all `futures` concurrently until they complete or `deadline` elapses.
pub async fn race_all<I, F, T>(futures: I, deadline: Duration) -> Raced<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T>,
{
    let mut pending: FuturesUnordered<_> = futures
        .into_iter()
        .enumerate()
        .map(|(index, fut)| async move { (index, fut.await) })
        .collect();

    let mut outputs: Vec<Option<T>> = (0..pending.len()).map(|_| None).collect();
    let sleep = tokio::time::sleep(deadline);
    tokio::pin!(sleep);

    let mut timed_out = false;
    loop {
        tokio::select! {
            next = pending.next() => match next {
                Some((index, value)) => outputs[index] = Some(value),
                None => break,
            },
            _ = &mut sleep => {
                timed_out = true;
                break;
            }
        }
    }

    Raced { outputs, timed_out }
}
