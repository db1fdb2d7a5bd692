use std::{
    io,
    thread::{self, JoinHandle},
};

use log::{debug, warn};

/// Runs each connection on a thread of its own.
///
/// Finished threads are joined by [`Supervisor::reap`]. Dropping the supervisor reaps once more
/// and detaches whatever is still running; those connections end when their peer leaves.
#[derive(Debug, Default)]
pub struct Supervisor {
    workers: Vec<Worker>,
    next_id: usize,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, f: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        let thread = thread::Builder::new()
            .name(format!("hl7-connection-{id}"))
            .spawn(move || {
                debug!("worker {id} handling a connection!");
                f();
                debug!("worker {id} finished!");
            })?;

        self.workers.push(Worker { id, thread });
        Ok(())
    }

    /// Join every worker whose connection has already ended.
    pub fn reap(&mut self) {
        let (finished, running) = self
            .workers
            .drain(..)
            .partition::<Vec<_>, _>(|w| w.thread.is_finished());
        self.workers = running;

        for worker in finished {
            worker.join();
        }
    }

    /// Workers not yet reaped.
    pub fn active(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.reap();

        for worker in self.workers.drain(..) {
            debug!("detaching worker {}", worker.id);
        }
    }
}

#[derive(Debug)]
struct Worker {
    id: usize,
    thread: JoinHandle<()>,
}

impl Worker {
    fn join(self) {
        if self.thread.join().is_err() {
            warn!("worker {} panicked while handling a connection", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
            mpsc,
        },
        time::{Duration, Instant},
    };

    use super::*;

    #[test]
    fn drop_detaches_running_workers() {
        let done = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel::<()>();
        let mut supervisor = Supervisor::new();

        let finished = Arc::clone(&done);
        supervisor
            .spawn(move || {
                let _ = rx.recv();
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(supervisor.active(), 1);

        // returns while the worker is still blocked
        drop(supervisor);
        assert_eq!(done.load(Ordering::SeqCst), 0);

        tx.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while done.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reap_keeps_running_workers() {
        let mut supervisor = Supervisor::new();
        let (tx, rx) = mpsc::channel::<()>();

        supervisor.spawn(|| {}).unwrap();
        supervisor
            .spawn(move || {
                let _ = rx.recv();
            })
            .unwrap();

        while supervisor.active() > 1 {
            thread::sleep(Duration::from_millis(5));
            supervisor.reap();
        }
        assert_eq!(supervisor.active(), 1);

        tx.send(()).unwrap();
    }

    #[test]
    fn panicking_worker_is_contained() {
        let mut supervisor = Supervisor::new();
        supervisor.spawn(|| panic!("connection failed")).unwrap();

        while supervisor.active() > 0 {
            thread::sleep(Duration::from_millis(5));
            supervisor.reap();
        }
    }
}
