//! Buffered, batched appends to an output sheet
//!
//! Rows are only ever appended. A batch is sent when the buffer reaches
//! `batch_size`, when `flush_interval` has passed since the last send, and at
//! the end of the run. No single append carries more than `batch_size` rows.
//!
//! A chunk that keeps failing is retried one row at a time; rows the sink
//! still refuses are set aside and handed back through `take_rejected`.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::Row;
use crate::sheets::SheetSink;

/// Consecutive failures of the same chunk before it is split row by row
const ISOLATE_AFTER_FAILURES: u32 = 3;

pub struct BatchWriter<S> {
    sink: S,
    label: &'static str,
    buffer: Vec<Row>,
    batch_size: usize,
    flush_interval: Duration,
    last_flush: Instant,
    rows_written: u64,
    batches_written: u64,
    consecutive_failures: u32,
    rejected: Vec<(Row, AppError)>,
}

impl<S: SheetSink> BatchWriter<S> {
    pub fn new(sink: S, label: &'static str, batch_size: usize, flush_interval: Duration) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            label,
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            flush_interval,
            last_flush: Instant::now(),
            rows_written: 0,
            batches_written: 0,
            consecutive_failures: 0,
            rejected: Vec::new(),
        }
    }

    /// Buffer a row, flushing when the batch is full. Returns rows flushed.
    pub async fn push(&mut self, row: Row) -> AppResult<usize> {
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            return self.flush().await;
        }
        Ok(0)
    }

    /// Flush a partial batch once the interval has elapsed
    pub async fn tick(&mut self) -> AppResult<usize> {
        if !self.buffer.is_empty() && self.last_flush.elapsed() >= self.flush_interval {
            debug!("⏱️ {} flush interval elapsed", self.label);
            return self.flush().await;
        }
        Ok(0)
    }

    /// Send everything still buffered
    pub async fn finish(&mut self) -> AppResult<usize> {
        self.flush().await
    }

    /// Send buffered rows in chunks of at most `batch_size`.
    ///
    /// Rows of a failed chunk stay buffered for the next attempt. After
    /// `ISOLATE_AFTER_FAILURES` failures in a row the head chunk is isolated
    /// instead, so one bad row cannot hold back the rest of the buffer.
    pub async fn flush(&mut self) -> AppResult<usize> {
        let mut flushed = 0;
        while !self.buffer.is_empty() {
            let n = self.buffer.len().min(self.batch_size);
            if let Err(e) = self.sink.append_rows(&self.buffer[..n]).await {
                self.consecutive_failures += 1;
                if self.consecutive_failures < ISOLATE_AFTER_FAILURES {
                    warn!(
                        "⚠️ {} append failed, {} rows kept in buffer: {}",
                        self.label,
                        self.buffer.len(),
                        e
                    );
                    return Err(e);
                }
                warn!(
                    "⚠️ {} append failed {} times, retrying {} rows one by one: {}",
                    self.label, self.consecutive_failures, n, e
                );
                flushed += self.isolate(n).await;
                continue;
            }
            self.consecutive_failures = 0;
            self.buffer.drain(..n);
            flushed += n;
            self.rows_written += n as u64;
            self.batches_written += 1;
            debug!("💾 {}: appended {} rows", self.label, n);
        }
        self.last_flush = Instant::now();
        Ok(flushed)
    }

    /// Append the first `n` buffered rows singly; refused rows are set aside
    async fn isolate(&mut self, n: usize) -> usize {
        self.consecutive_failures = 0;
        let mut appended = 0;
        for row in self.buffer.drain(..n).collect::<Vec<_>>() {
            match self.sink.append_rows(std::slice::from_ref(&row)).await {
                Ok(()) => {
                    appended += 1;
                    self.rows_written += 1;
                    self.batches_written += 1;
                }
                Err(e) => {
                    warn!("❌ {} row rejected: {}", self.label, e);
                    self.rejected.push((row, e));
                }
            }
        }
        appended
    }

    /// Rows the sink refused on their own, with the last error for each
    pub fn take_rejected(&mut self) -> Vec<(Row, AppError)> {
        std::mem::take(&mut self.rejected)
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn batches_written(&self) -> u64 {
        self.batches_written
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<Row>>>,
        fail: AtomicBool,
        /// Refuse any batch containing this cell
        poison: Option<&'static str>,
        /// Fail only the call with this 1-based number
        fail_call: Option<usize>,
        calls: AtomicUsize,
    }

    impl SheetSink for RecordingSink {
        async fn append_rows(&self, rows: &[Row]) -> AppResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) || self.fail_call == Some(call) {
                return Err(AppError::sheet_api("quota exceeded"));
            }
            if let Some(cell) = self.poison {
                if rows.iter().any(|r| r.iter().any(|c| c == cell)) {
                    return Err(AppError::sheet_api("invalid value at [RESULT!B7]"));
                }
            }
            self.batches.lock().unwrap().push(rows.to_vec());
            Ok(())
        }
    }

    impl RecordingSink {
        fn sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    fn row(i: usize) -> Row {
        vec![i.to_string()]
    }

    #[tokio::test]
    async fn test_flushes_when_batch_is_full() {
        let mut writer = BatchWriter::new(RecordingSink::default(), "RESULT", 3, Duration::from_secs(60));

        assert_eq!(writer.push(row(1)).await.unwrap(), 0);
        assert_eq!(writer.push(row(2)).await.unwrap(), 0);
        assert_eq!(writer.push(row(3)).await.unwrap(), 3);
        assert_eq!(writer.pending(), 0);

        writer.push(row(4)).await.unwrap();
        assert_eq!(writer.finish().await.unwrap(), 1);

        assert_eq!(writer.sink().sizes(), vec![3, 1]);
        assert_eq!(writer.rows_written(), 4);
        assert_eq!(writer.batches_written(), 2);
    }

    #[tokio::test]
    async fn test_no_batch_exceeds_size() {
        let mut writer = BatchWriter::new(RecordingSink::default(), "RESULT", 4, Duration::from_secs(60));
        for i in 0..23 {
            writer.push(row(i)).await.unwrap();
            assert!(writer.pending() < 4);
        }
        writer.finish().await.unwrap();

        let sizes = writer.sink().sizes();
        assert!(sizes.iter().all(|&n| n <= 4));
        assert_eq!(sizes.iter().sum::<usize>(), 23);
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_rows_and_chunks_on_recovery() {
        let mut writer = BatchWriter::new(RecordingSink::default(), "RESULT", 2, Duration::from_secs(60));
        writer.sink().fail.store(true, Ordering::SeqCst);

        writer.push(row(1)).await.unwrap();
        assert!(writer.push(row(2)).await.is_err());
        assert!(writer.push(row(3)).await.is_err());
        assert_eq!(writer.pending(), 3);

        writer.sink().fail.store(false, Ordering::SeqCst);
        assert_eq!(writer.finish().await.unwrap(), 3);
        assert_eq!(writer.sink().sizes(), vec![2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_flushes_after_interval() {
        let mut writer = BatchWriter::new(RecordingSink::default(), "ERROR", 100, Duration::from_secs(10));
        writer.push(row(1)).await.unwrap();

        assert_eq!(writer.tick().await.unwrap(), 0);
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(writer.tick().await.unwrap(), 1);

        // empty buffer never produces an append
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(writer.tick().await.unwrap(), 0);
        assert_eq!(writer.sink().sizes(), vec![1]);
    }

    #[tokio::test]
    async fn test_persistently_refused_row_is_set_aside() {
        let sink = RecordingSink {
            poison: Some("bad"),
            ..Default::default()
        };
        let mut writer = BatchWriter::new(sink, "RESULT", 3, Duration::from_secs(60));

        writer.push(row(1)).await.unwrap();
        writer.push(vec!["bad".into()]).await.unwrap();
        assert!(writer.push(row(3)).await.is_err());
        assert!(writer.push(row(4)).await.is_err());
        assert_eq!(writer.pending(), 4);

        // third failure of the same chunk splits it, then the rest goes out
        assert_eq!(writer.push(row(5)).await.unwrap(), 4);
        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.rows_written(), 4);
        assert_eq!(writer.finish().await.unwrap(), 0);

        let rejected = writer.take_rejected();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, vec!["bad".to_string()]);
        assert_eq!(rejected[0].1.code_str(), "SHEET_API");
        assert!(writer.take_rejected().is_empty());

        let written: Vec<Row> = writer.sink().batches.lock().unwrap().concat();
        assert_eq!(written, vec![row(1), row(3), row(4), row(5)]);
    }

    #[tokio::test]
    async fn test_partial_final_flush_is_counted() {
        let sink = RecordingSink {
            fail_call: Some(4),
            ..Default::default()
        };
        let mut writer = BatchWriter::new(sink, "RESULT", 2, Duration::from_secs(60));
        writer.sink().fail.store(true, Ordering::SeqCst);
        writer.push(row(1)).await.unwrap();
        writer.push(row(2)).await.unwrap_err();
        writer.push(row(3)).await.unwrap_err();
        writer.sink().fail.store(false, Ordering::SeqCst);

        // first chunk lands, the second is refused
        assert!(writer.finish().await.is_err());
        assert_eq!(writer.rows_written(), 2);
        assert_eq!(writer.pending(), 1);
    }

    #[tokio::test]
    async fn test_finish_on_empty_buffer_is_noop() {
        let mut writer = BatchWriter::new(RecordingSink::default(), "RESULT", 5, Duration::from_secs(1));
        assert_eq!(writer.finish().await.unwrap(), 0);
        assert!(writer.sink().sizes().is_empty());
    }
}
