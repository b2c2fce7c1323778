//! Loop-control handles and the `take` chunker.

use std::cell::Cell;
use std::time::Instant;

use crate::exception::EvalResult;
use crate::value::{iterate, Value, ValueIter};

/// Observable per-loop handle bound by `as name`.
///
/// Tracks iterations entered, finished, and ignored, plus wall-clock timing
/// for the elapsed/average queries.
pub struct LoopControl {
    count: Cell<u64>,
    finished: Cell<u64>,
    ignored: Cell<u64>,
    remaining_ignore: Cell<u64>,
    started: Instant,
    ended: Cell<Option<Instant>>,
    last_count: Cell<Option<Instant>>,
    running: Cell<bool>,
}

impl Default for LoopControl {
    fn default() -> Self {
        LoopControl::new()
    }
}

impl LoopControl {
    pub fn new() -> Self {
        LoopControl {
            count: Cell::new(0),
            finished: Cell::new(0),
            ignored: Cell::new(0),
            remaining_ignore: Cell::new(0),
            started: Instant::now(),
            ended: Cell::new(None),
            last_count: Cell::new(None),
            running: Cell::new(true),
        }
    }

    // Bookkeeping called by the loop driver.

    pub(crate) fn mark_count(&self) {
        self.count.set(self.count.get() + 1);
        self.last_count.set(Some(Instant::now()));
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.set(self.finished.get() + 1);
    }

    pub(crate) fn mark_ignored(&self) {
        self.ignored.set(self.ignored.get() + 1);
    }

    pub(crate) fn finish(&self) {
        self.running.set(false);
        self.ended.set(Some(Instant::now()));
    }

    // Queries exposed to scripts.

    pub fn count(&self) -> u64 {
        self.count.get()
    }

    pub fn count_finished(&self) -> u64 {
        self.finished.get()
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.get()
    }

    pub fn remaining_ignore(&self) -> u64 {
        self.remaining_ignore.get().saturating_sub(self.ignored.get())
    }

    pub fn ignore_next_iterations(&self, count: u64) {
        self.remaining_ignore
            .set(self.remaining_ignore.get() + count);
    }

    pub fn reset_ignore(&self) {
        self.remaining_ignore.set(self.ignored.get());
    }

    pub fn time_total(&self) -> f64 {
        match self.ended.get() {
            Some(end) => end.duration_since(self.started).as_secs_f64(),
            None => self.started.elapsed().as_secs_f64(),
        }
    }

    pub fn time_average(&self) -> f64 {
        let count = self.count.get();
        if count == 0 {
            return 0.0;
        }
        self.time_total() / count as f64
    }

    pub fn time_of_last_iteration(&self) -> f64 {
        match self.last_count.get() {
            Some(at) => at.duration_since(self.started).as_secs_f64(),
            None => 0.0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn repr(&self) -> String {
        format!(
            "<LoopControl count={}, finished={}>",
            self.count.get(),
            self.finished.get()
        )
    }
}

/// Fixed-size chunker for `for ... in expr take N`.
///
/// Yields consecutive `chunk`-sized tuples, emitting a final short chunk on
/// exhaustion. With multiple unpacking targets each chunk is
/// column-transposed, so the targets receive parallel slices.
pub struct TakeSplitter {
    inner: ValueIter,
    chunk: usize,
    unpack: usize,
    done: bool,
}

impl TakeSplitter {
    pub fn new(inner: ValueIter, chunk: usize, unpack: usize) -> Self {
        TakeSplitter {
            inner,
            chunk: chunk.max(1),
            unpack,
            done: false,
        }
    }

    fn transpose(&self, chunk: Vec<Value>) -> EvalResult<Value> {
        let mut rows: Vec<Vec<Value>> = Vec::with_capacity(chunk.len());
        for item in &chunk {
            rows.push(iterate(item)?.collect());
        }
        let width = rows.iter().map(Vec::len).min().unwrap_or(0);
        let mut columns: Vec<Value> = Vec::with_capacity(width);
        for i in 0..width {
            let column: Vec<Value> = rows.iter().map(|row| row[i].clone()).collect();
            columns.push(Value::tuple(column));
        }
        Ok(Value::tuple(columns))
    }
}

impl Iterator for TakeSplitter {
    type Item = EvalResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut chunk = Vec::with_capacity(self.chunk);
        while chunk.len() < self.chunk {
            match self.inner.next() {
                Some(item) => chunk.push(item),
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if chunk.is_empty() {
            return None;
        }
        if self.unpack >= 2 {
            Some(self.transpose(chunk))
        } else {
            Some(Ok(Value::tuple(chunk)))
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::value::value_repr;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().map(|n| Value::Int(*n)).collect())
    }

    #[test]
    fn chunks_with_final_short_chunk() {
        let iter = iterate(&ints(&[1, 2, 3, 4, 5])).unwrap();
        let chunks: Vec<String> = TakeSplitter::new(iter, 2, 1)
            .map(|c| value_repr(&c.unwrap()))
            .collect();
        assert_eq!(chunks, vec!["(1, 2)", "(3, 4)", "(5,)"]);
    }

    #[test]
    fn transposes_for_multiple_targets() {
        let pairs = Value::list(vec![
            Value::tuple(vec![Value::Int(1), Value::Int(10)]),
            Value::tuple(vec![Value::Int(2), Value::Int(20)]),
        ]);
        let iter = iterate(&pairs).unwrap();
        let chunks: Vec<String> = TakeSplitter::new(iter, 2, 2)
            .map(|c| value_repr(&c.unwrap()))
            .collect();
        assert_eq!(chunks, vec!["((1, 2), (10, 20))"]);
    }

    #[test]
    fn ignore_counters() {
        let control = LoopControl::new();
        control.ignore_next_iterations(2);
        assert_eq!(control.remaining_ignore(), 2);
        control.mark_ignored();
        assert_eq!(control.remaining_ignore(), 1);
        control.mark_ignored();
        assert_eq!(control.remaining_ignore(), 0);
    }
}
