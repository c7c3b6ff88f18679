//! Run a sink on its own thread behind a bounded frame queue.
//!
//! The render loop hands over owned frame buffers and only blocks once
//! `capacity` frames are waiting. A failure inside the worker is reported on
//! the next write or on close.

use super::{FrameSink, SinkError};
use crossbeam_channel::{bounded, Sender};
use std::thread::{self, JoinHandle};

type Job = (usize, Vec<u8>);

pub struct ThreadedSink {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<Result<usize, SinkError>>>,
    queued: usize,
}

impl ThreadedSink {
    /// Start a worker that builds its sink with `factory` and then drains the
    /// queue into it. Construction errors are returned here.
    pub fn spawn<S, F>(capacity: usize, factory: F) -> Result<Self, SinkError>
    where
        S: FrameSink + 'static,
        F: FnOnce() -> Result<S, SinkError> + Send + 'static,
    {
        let (sender, receiver) = bounded::<Job>(capacity.max(1));
        let (ready_tx, ready_rx) = bounded::<Result<(), SinkError>>(1);

        let worker = thread::Builder::new()
            .name("frame-sink".into())
            .spawn(move || {
                let mut sink = match factory() {
                    Ok(sink) => {
                        let _ = ready_tx.send(Ok(()));
                        sink
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return Ok(0);
                    }
                };

                let mut written = 0;
                for (index, frame) in receiver.iter() {
                    if let Err(e) = sink.write_frame(&frame) {
                        log::error!("Frame {index} could not be written: {e}");
                        if let Err(close_err) = sink.close() {
                            log::warn!("Closing sink after failure also failed: {close_err}");
                        }
                        return Err(e);
                    }
                    written += 1;
                }
                sink.close()?;
                Ok(written)
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                sender: Some(sender),
                worker: Some(worker),
                queued: 0,
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(SinkError::Worker("sink worker exited during setup".into()))
            }
        }
    }

    /// Frames handed to the worker so far.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Queue an owned buffer without copying it.
    pub fn send(&mut self, frame: Vec<u8>) -> Result<(), SinkError> {
        let sender = self.sender.as_ref().ok_or(SinkError::Closed)?;
        if sender.send((self.queued, frame)).is_err() {
            // The worker hung up, which only happens after a failure.
            self.sender = None;
            return Err(self.join_worker()?.map_or(
                SinkError::Worker("sink worker stopped unexpectedly".into()),
                |_| SinkError::Closed,
            ));
        }
        self.queued += 1;
        Ok(())
    }

    /// Join the worker, returning its frame count if it was still running.
    fn join_worker(&mut self) -> Result<Option<usize>, SinkError> {
        let Some(worker) = self.worker.take() else {
            return Ok(None);
        };
        match worker.join() {
            Ok(result) => result.map(Some),
            Err(_) => Err(SinkError::Worker("sink worker panicked".into())),
        }
    }
}

impl FrameSink for ThreadedSink {
    fn write_frame(&mut self, rgb: &[u8]) -> Result<(), SinkError> {
        self.send(rgb.to_vec())
    }

    fn write_owned(&mut self, rgb: Vec<u8>) -> Result<(), SinkError> {
        self.send(rgb)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.sender = None;
        if let Some(written) = self.join_worker()? {
            log::debug!("Sink worker finished, {written} frames written");
        }
        Ok(())
    }
}

impl Drop for ThreadedSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Sink worker failed while shutting down: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        frames: Vec<Vec<u8>>,
        closed: usize,
    }

    struct SharedSink {
        log: Arc<Mutex<Log>>,
        fail_at: Option<usize>,
    }

    impl FrameSink for SharedSink {
        fn write_frame(&mut self, rgb: &[u8]) -> Result<(), SinkError> {
            let mut log = self.log.lock().unwrap();
            if Some(log.frames.len()) == self.fail_at {
                return Err(SinkError::Io(std::io::Error::other("disk full")));
            }
            log.frames.push(rgb.to_vec());
            Ok(())
        }

        fn close(&mut self) -> Result<(), SinkError> {
            self.log.lock().unwrap().closed += 1;
            Ok(())
        }
    }

    fn spawn_shared(fail_at: Option<usize>) -> (ThreadedSink, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let worker_log = Arc::clone(&log);
        let sink = ThreadedSink::spawn(2, move || {
            Ok(SharedSink {
                log: worker_log,
                fail_at,
            })
        })
        .unwrap();
        (sink, log)
    }

    #[test]
    fn test_frames_arrive_in_order_and_sink_is_closed() {
        let (mut sink, log) = spawn_shared(None);
        for i in 0..10u8 {
            sink.write_frame(&[i; 3]).unwrap();
        }
        sink.close().unwrap();
        sink.close().unwrap();

        let log = log.lock().unwrap();
        let firsts: Vec<u8> = log.frames.iter().map(|f| f[0]).collect();
        assert_eq!(firsts, (0..10).collect::<Vec<u8>>());
        assert_eq!(log.closed, 1);
    }

    #[test]
    fn test_worker_failure_surfaces_and_closes() {
        let (mut sink, log) = spawn_shared(Some(3));
        let mut first_error = None;
        for i in 0..50u8 {
            if let Err(e) = sink.write_frame(&[i; 3]) {
                first_error = Some(e);
                break;
            }
        }
        // Either a later write or close reports the failure
        let error = match first_error {
            Some(e) => e,
            None => sink.close().unwrap_err(),
        };
        assert!(matches!(error, SinkError::Io(_)));
        assert_eq!(log.lock().unwrap().frames.len(), 3);
        assert_eq!(log.lock().unwrap().closed, 1);
    }

    #[test]
    fn test_factory_error_returned_from_spawn() {
        let result = ThreadedSink::spawn(1, || -> Result<SharedSink, SinkError> {
            Err(SinkError::Worker("no encoder".into()))
        });
        assert!(matches!(result, Err(SinkError::Worker(msg)) if msg == "no encoder"));
    }

    #[test]
    fn test_writes_after_close_rejected() {
        let (mut sink, _log) = spawn_shared(None);
        sink.close().unwrap();
        assert!(matches!(sink.write_frame(&[0; 3]), Err(SinkError::Closed)));
    }
}
