//! Balanced fork/join parsing for bulk imports.
//!
//! One generic divide-and-conquer utility replaces a per-item-type task
//! hierarchy: it recursively halves the input until batches fall under a
//! threshold, runs the leaves serially, and merges partial results on the
//! way back up. Per-item failures are recorded as `"<item>: <message>"`
//! and never abort the batch; cancellation is polled cooperatively
//! between items, never mid-item.

pub mod files;
pub mod itunes;

use crate::events::ProgressSink;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Accumulated result of a (possibly partitioned) parse.
#[derive(Debug)]
pub struct ParseOutcome<T> {
    pub parsed: Vec<T>,
    pub errors: Vec<String>,
}

impl<T> Default for ParseOutcome<T> {
    fn default() -> Self {
        Self {
            parsed: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> ParseOutcome<T> {
    fn merge(mut self, mut other: Self) -> Self {
        self.parsed.append(&mut other.parsed);
        self.errors.append(&mut other.errors);
        self
    }
}

/// Map `op` over `items` with recursive fork/join fan-out.
///
/// Batches larger than `threshold` are split in half and the halves run
/// as sibling rayon jobs, so huge imports become a balanced task tree
/// instead of one job per item. The result is independent of how the
/// partitioning fell.
pub fn run_parallel<I, T, F, L>(
    items: Vec<I>,
    threshold: usize,
    cancel: &AtomicBool,
    label: &L,
    op: &F,
) -> ParseOutcome<T>
where
    I: Send,
    T: Send,
    F: Fn(&I) -> anyhow::Result<T> + Sync,
    L: Fn(&I) -> String + Sync,
{
    let threshold = threshold.max(1);
    if items.len() > threshold {
        let mut left = items;
        let right = left.split_off(left.len() / 2);
        let (a, b) = rayon::join(
            || run_parallel(left, threshold, cancel, label, op),
            || run_parallel(right, threshold, cancel, label, op),
        );
        return a.merge(b);
    }

    let mut outcome = ParseOutcome::default();
    for item in &items {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        match op(item) {
            Ok(value) => outcome.parsed.push(value),
            Err(e) => outcome.errors.push(format!("{}: {e}", label(item))),
        }
    }
    outcome
}

/// Shared progress counter for parse batches running on many threads.
pub struct ProgressCounter<'a> {
    done: AtomicUsize,
    total: usize,
    sink: &'a dyn ProgressSink,
}

impl<'a> ProgressCounter<'a> {
    pub fn new(total: usize, sink: &'a dyn ProgressSink) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
            sink,
        }
    }

    pub fn tick(&self, message: &str) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let fraction = if self.total == 0 {
            1.0
        } else {
            done as f64 / self.total as f64
        };
        self.sink.progress(fraction, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_numbers(items: Vec<String>, threshold: usize) -> ParseOutcome<i32> {
        let cancel = AtomicBool::new(false);
        run_parallel(
            items,
            threshold,
            &cancel,
            &|s: &String| s.clone(),
            &|s: &String| s.parse::<i32>().map_err(anyhow::Error::from),
        )
    }

    #[test]
    fn test_result_is_partition_invariant() {
        let items: Vec<String> = (0..100)
            .map(|i| {
                if i % 10 == 3 {
                    format!("bad-{i}")
                } else {
                    i.to_string()
                }
            })
            .collect();

        let mut serial = parse_numbers(items.clone(), usize::MAX);
        let mut fine = parse_numbers(items.clone(), 1);
        let mut medium = parse_numbers(items, 7);

        for outcome in [&mut serial, &mut fine, &mut medium] {
            outcome.parsed.sort_unstable();
            outcome.errors.sort();
        }

        assert_eq!(serial.parsed.len(), 90);
        assert_eq!(serial.errors.len(), 10);
        assert_eq!(serial.parsed, fine.parsed);
        assert_eq!(serial.errors, fine.errors);
        assert_eq!(serial.parsed, medium.parsed);
        assert_eq!(serial.errors, medium.errors);
    }

    #[test]
    fn test_error_entries_carry_item_label() {
        let outcome = parse_numbers(vec!["nope".to_string()], 10);
        assert!(outcome.parsed.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("nope: "));
    }

    #[test]
    fn test_cancellation_stops_between_items() {
        let cancel = AtomicBool::new(true);
        let outcome = run_parallel(
            vec![1, 2, 3],
            10,
            &cancel,
            &|i: &i32| i.to_string(),
            &|i: &i32| Ok::<i32, anyhow::Error>(*i),
        );
        assert!(outcome.parsed.is_empty());
        assert!(outcome.errors.is_empty());
    }
}
