use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

type Job<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Creates a queue of jobs that run against state owned by one thread.
///
/// Any thread may [`dispatch`](MainQueueHandle::dispatch) through a handle;
/// only the thread driving the [`MainLoop`] ever touches the state. Jobs
/// run in dispatch order.
pub fn main_queue<T>() -> (MainQueueHandle<T>, MainLoop<T>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (MainQueueHandle { tx }, MainLoop { rx })
}

pub struct MainQueueHandle<T> {
    tx: Sender<Job<T>>,
}

// Derive would require `T: Clone`.
impl<T> Clone for MainQueueHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> MainQueueHandle<T> {
    /// Queues `job` for the main loop. Returns `false` if the loop is gone.
    pub fn dispatch(&self, job: impl FnOnce(&mut T) + Send + 'static) -> bool {
        self.tx.send(Box::new(job)).is_ok()
    }
}

pub struct MainLoop<T> {
    rx: Receiver<Job<T>>,
}

impl<T> MainLoop<T> {
    /// Runs every job already queued, without blocking. Returns how many ran.
    pub fn run_pending(&self, state: &mut T) -> usize {
        let mut ran = 0;
        for job in self.rx.try_iter() {
            job(state);
            ran += 1;
        }
        ran
    }

    /// Runs jobs as they arrive until `deadline` passes or every handle is
    /// dropped.
    pub fn run_until(&self, state: &mut T, deadline: Instant) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.recv_deadline(deadline) {
                Ok(job) => {
                    job(state);
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        ran
    }

    /// Runs jobs until every handle is dropped.
    pub fn run(&self, state: &mut T) -> usize {
        let mut ran = 0;
        for job in self.rx.iter() {
            job(state);
            ran += 1;
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
