use std::{
    sync::{Arc, Mutex, mpsc},
    thread,
};

use log::debug;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of threads draining jobs off a shared channel.
///
/// Dropping the pool closes the channel: each thread finishes whatever job it
/// is running, then exits once `recv` disconnects. Threads are detached and
/// never joined, so tearing the pool down does not wait for in-flight work.
#[derive(Debug)]
pub struct ThreadPool {
    sender: Option<mpsc::Sender<Job>>,
}

impl ThreadPool {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "pool size must be positive");

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        for id in 0..size {
            let receiver = Arc::clone(&receiver);
            thread::spawn(move || {
                loop {
                    let msg = receiver.lock().unwrap().recv();
                    match msg {
                        Ok(job) => {
                            debug!("worker {id} picked up a job");
                            job();
                        }
                        Err(_) => {
                            debug!("worker {id} shutting down");
                            break;
                        }
                    }
                }
            });
        }

        Self {
            sender: Some(sender),
        }
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Box::new(f));
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        drop(self.sender.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_runs_submitted_jobs() {
        let pool = ThreadPool::new(2);
        let (tx, rx) = mpsc::channel();

        for n in 0..4 {
            let tx = tx.clone();
            pool.execute(move || tx.send(n).unwrap());
        }

        let mut seen: Vec<i32> = rx.iter().take(4).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn dropping_the_pool_disconnects_idle_workers() {
        let pool = ThreadPool::new(1);
        let (tx, rx) = mpsc::channel();

        pool.execute(move || tx.send(()).unwrap());
        rx.recv().unwrap();

        drop(pool);
    }
}
