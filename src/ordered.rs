//! Order-preserving parallel map over a stream of records.
//!
//! The calling thread reads records and numbers them from 1. A fixed pool of workers
//! takes them from a bounded channel and sends results on another bounded channel to a
//! single collector, which restores input order before handing results to `emit`.

use crossbeam_channel::bounded;

use log::warn;

use rustc_hash::FxHashMap;

use std::thread;

use crate::errors::*;

/// A worker result tagged with the id of its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<R> {
    /// 1-based position of the record in the input.
    pub id: u64,
    /// Whether the record had any match.
    pub ok: bool,
    pub payload: R,
}

/// Counts reported by a search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub records: u64,
    /// Records with at least one hit.
    pub matched: u64,
    pub hits: u64,
}

/// Buffers out-of-order results until their predecessors arrive.
pub struct ReorderBuffer<R> {
    next: u64,
    pending: FxHashMap<u64, Envelope<R>>,
}

impl<R> ReorderBuffer<R> {
    pub fn new() -> Self {
        Self {
            next: 1,
            pending: FxHashMap::default(),
        }
    }

    /// Id of the next result to emit.
    pub fn next_id(&self) -> u64 {
        self.next
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Emit `envelope` and every buffered successor if it is the next expected result,
    /// otherwise buffer it.
    pub fn push<E>(&mut self, envelope: Envelope<R>, emit: &mut E) -> Result<()>
    where
        E: FnMut(Envelope<R>) -> Result<()>,
    {
        if envelope.id != self.next {
            self.pending.insert(envelope.id, envelope);
            return Ok(());
        }

        emit(envelope)?;
        self.next += 1;

        while let Some(envelope) = self.pending.remove(&self.next) {
            emit(envelope)?;
            self.next += 1;
        }

        Ok(())
    }

    /// Emit whatever is still buffered, in id order.
    pub fn finish<E>(self, emit: &mut E) -> Result<()>
    where
        E: FnMut(Envelope<R>) -> Result<()>,
    {
        if self.pending.is_empty() {
            return Ok(());
        }

        warn!(
            "{} results were still waiting for result {} at the end of the input",
            self.pending.len(),
            self.next
        );

        let mut rest = self.pending.into_values().collect::<Vec<_>>();
        rest.sort_unstable_by_key(|e| e.id);
        rest.into_iter().try_for_each(emit)
    }
}

impl<R> Default for ReorderBuffer<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `work` to every record on `threads` worker threads and pass the results to
/// `emit` in input order.
///
/// `work` returns whether the record matched along with its payload. The first error
/// from reading, `work`, or `emit` stops the run and is returned. Returns the number of
/// records read.
pub fn run_ordered<T, R, I, F, E>(records: I, threads: usize, work: F, mut emit: E) -> Result<u64>
where
    I: IntoIterator<Item = Result<T>>,
    T: Send,
    R: Send,
    F: Fn(T) -> Result<(bool, R)> + Sync,
    E: FnMut(Envelope<R>) -> Result<()> + Send,
{
    assert!(threads >= 1, "Number of threads must be at least 1");

    thread::scope(|s| {
        let (task_tx, task_rx) = bounded::<(u64, T)>(threads);
        let (result_tx, result_rx) = bounded::<Result<Envelope<R>>>(threads);
        let work = &work;

        for _ in 0..threads {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();

            s.spawn(move || {
                for (id, record) in task_rx {
                    let res = work(record).map(|(ok, payload)| Envelope { id, ok, payload });
                    let failed = res.is_err();

                    // the collector is gone or this worker failed
                    if result_tx.send(res).is_err() || failed {
                        break;
                    }
                }
            });
        }

        drop(task_rx);
        drop(result_tx);

        let collector = s.spawn(move || -> Result<()> {
            let mut buffer = ReorderBuffer::new();

            for res in result_rx {
                buffer.push(res?, &mut emit)?;
            }

            buffer.finish(&mut emit)
        });

        let mut total = 0;
        let mut read_err = None;

        for record in records {
            match record {
                Ok(record) => {
                    total += 1;
                    if task_tx.send((total, record)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    read_err = Some(e);
                    break;
                }
            }
        }

        drop(task_tx);

        collector
            .join()
            .map_err(|_| Error::WorkerPanic("collecting results"))??;

        match read_err {
            Some(e) => Err(e),
            None => Ok(total),
        }
    })
}
