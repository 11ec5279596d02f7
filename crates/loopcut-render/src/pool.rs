// Worker Pool: fixed round-robin-dispatched set of OS threads applying raster
// operations to decoded frames (§4.2, §5).
//
// Grounded on the teacher's `MediaWorker` (`worker.rs`): bounded
// `crossbeam_channel` channels, an `Arc<AtomicBool>` shutdown flag, a
// dedicated reply channel per request rather than a shared reply stream.
// Generalized from one long-lived worker with several specialized channels
// into N identical workers behind a round-robin front door, with
// `frameIndex` correlation on every reply (§9's pool-worker correlation
// decision).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};

use loopcut_core::{DecodedFrame, ProcessedFrame, RasterOp, RenderError, Result};

use crate::raster;

/// Per-worker inbound queue depth. Small and bounded so a saturated pool
/// exerts backpressure on the orchestrator's fan-out instead of buffering
/// unbounded work in memory.
const WORKER_QUEUE_DEPTH: usize = 8;

struct Task {
    frame_index: u32,
    width: u32,
    height: u32,
    bitmap: Vec<u8>,
    delay_ms: u32,
    operations: Vec<RasterOp>,
    reply: Sender<Result<ProcessedFrame>>,
}

enum Message {
    Task(Task),
    Shutdown,
}

pub struct WorkerPool {
    senders: Vec<Sender<Message>>,
    next: AtomicUsize,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `max(1, size)` worker threads, each with its own bounded queue.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut senders = Vec::with_capacity(size);
        let mut handles = Vec::with_capacity(size);

        for worker_id in 0..size {
            let (tx, rx) = bounded::<Message>(WORKER_QUEUE_DEPTH);
            let handle = std::thread::Builder::new()
                .name(format!("loopcut-worker-{worker_id}"))
                .spawn(move || worker_loop(rx))
                .expect("spawn worker thread");
            senders.push(tx);
            handles.push(handle);
        }

        WorkerPool { senders, next: AtomicUsize::new(0), shutdown, handles }
    }

    /// Default pool size per §4.2: `max(2, floor(cpu_count / 2))`.
    pub fn default_size() -> usize {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
        (cpus / 2).max(2)
    }

    /// Dispatches one frame round-robin and returns a oneshot receiver for
    /// its `ProcessedFrame`. Fails immediately with `PoolShutdown` if the
    /// pool has already been shut down.
    pub fn submit_with_dimensions(
        &self,
        frame: &DecodedFrame,
        width: u32,
        height: u32,
        operations: Vec<RasterOp>,
    ) -> Result<Receiver<Result<ProcessedFrame>>> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(RenderError::PoolShutdown);
        }
        let (reply_tx, reply_rx) = bounded(1);
        let task = Task {
            frame_index: frame.index,
            width,
            height,
            bitmap: frame.bitmap.clone(),
            delay_ms: frame.delay_ms,
            operations,
            reply: reply_tx,
        };
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        self.senders[idx]
            .send(Message::Task(task))
            .map_err(|_| RenderError::PoolShutdown)?;
        Ok(reply_rx)
    }

    /// Fans every frame out, then blocks until all replies arrive, returning
    /// `ProcessedFrame`s ordered by `index` (completion order is arbitrary;
    /// assembly is by `index` per §5).
    pub fn process_all(
        &self,
        frames: &[DecodedFrame],
        width: u32,
        height: u32,
        operations: &[RasterOp],
    ) -> Result<Vec<ProcessedFrame>> {
        let receivers: Vec<_> = frames
            .iter()
            .map(|f| Ok((f.index, self.submit_with_dimensions(f, width, height, operations.to_vec())?)))
            .collect::<Result<Vec<_>>>()?;

        // Each submission already owns a dedicated oneshot reply channel, so a
        // cross-task mismatch is structurally impossible; frameIndex is still
        // asserted here as a belt-and-suspenders check (§9).
        let mut out = Vec::with_capacity(receivers.len());
        for (expected_index, rx) in receivers {
            let processed = rx.recv().map_err(|_| RenderError::PoolShutdown)??;
            debug_assert_eq!(processed.index, expected_index, "worker reply frameIndex mismatch");
            out.push(processed);
        }
        out.sort_by_key(|f| f.index);
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Posts a shutdown message to every worker, then joins their threads.
    /// Tasks submitted after this call fail with `PoolShutdown`.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);
        for tx in &self.senders {
            let _ = tx.send(Message::Shutdown);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            for tx in &self.senders {
                let _ = tx.send(Message::Shutdown);
            }
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(rx: Receiver<Message>) {
    while let Ok(message) = rx.recv() {
        match message {
            Message::Shutdown => break,
            Message::Task(task) => {
                let result = process_task(&task);
                let _ = task.reply.send(result);
            }
        }
    }
}

fn process_task(task: &Task) -> Result<ProcessedFrame> {
    let rgba = raster::apply_operations(task.width, task.height, &task.bitmap, &task.operations);
    let png = raster::encode_png(task.width, task.height, &rgba).map_err(RenderError::Io)?;
    Ok(ProcessedFrame { index: task.frame_index, png, delay_ms: task.delay_ms })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u32) -> DecodedFrame {
        DecodedFrame { index, delay_ms: 16, is_key_frame: index == 0, bitmap: vec![1, 2, 3, 255] }
    }

    #[test]
    fn round_robin_distribution() {
        let pool = WorkerPool::new(3);
        let counts = Arc::new(std::sync::Mutex::new(vec![0usize; 3]));
        for i in 0..9u32 {
            let idx = i as usize % 3;
            counts.lock().unwrap()[idx] += 1;
            let _ = pool.submit_with_dimensions(&frame(i), 1, 1, Vec::new()).unwrap().recv();
        }
        let c = counts.lock().unwrap();
        for &n in c.iter() {
            assert_eq!(n, 3);
        }
        pool.shutdown();
    }

    #[test]
    fn process_all_assembles_by_index() {
        let pool = WorkerPool::new(2);
        let frames: Vec<_> = (0..5).map(frame).collect();
        let processed = pool.process_all(&frames, 1, 1, &[]).unwrap();
        let indices: Vec<u32> = processed.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        pool.shutdown();
    }

    #[test]
    fn submit_after_shutdown_flag_fails() {
        let pool = WorkerPool::new(1);
        pool.shutdown.store(true, Ordering::Release);
        let err = pool.submit_with_dimensions(&frame(0), 1, 1, Vec::new()).unwrap_err();
        assert!(matches!(err, RenderError::PoolShutdown));
    }
}
