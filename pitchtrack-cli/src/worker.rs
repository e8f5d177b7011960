//! Live analysis worker.
//!
//! The capture callback hands `i16` chunks to a dedicated thread that owns the
//! [`Analyzer`]; every finished frame goes back to the main thread as a
//! [`PitchReading`]. The analyzer is only ever touched from that one thread.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use pitchtrack_core::{Analyzer, PitchReading};
use tracing::{debug, error, info, warn};

/// A running capture source that can be halted before it is dropped.
pub trait CaptureStream {
    fn halt(&self);
}

impl CaptureStream for cpal::Stream {
    fn halt(&self) {
        if let Err(e) = self.pause() {
            error!("Error pausing stream: {}", e);
        }
        // Let the backend finish its last callback before the stream is dropped.
        thread::sleep(Duration::from_millis(50));
    }
}

/// Handle to the running capture-and-analysis thread.
pub struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: JoinHandle<Result<Analyzer>>,
}

impl AudioWorker {
    /// Spawns the worker and waits until `start_capture` has run on it.
    ///
    /// `start_capture` receives the chunk sender and the analyzer's sample
    /// rate. If it fails, its error is returned here and no worker is left
    /// running. Readings are sent through `readings_tx` until
    /// [`stop`](Self::stop) is called or the capture source goes away.
    pub fn spawn<F, S>(analyzer: Analyzer, readings_tx: Sender<PitchReading>, start_capture: F) -> Result<Self>
    where
        F: FnOnce(Sender<Vec<i16>>, u32) -> pitchtrack_core::Result<S> + Send + 'static,
        S: CaptureStream,
    {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let thread_handle = thread::Builder::new()
            .name("analysis".into())
            .spawn(move || {
                let (raw_audio_tx, raw_audio_rx) = crossbeam_channel::bounded::<Vec<i16>>(64);
                let sample_rate = analyzer.config().sample_rate as u32;

                let stream = match start_capture(raw_audio_tx, sample_rate) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(anyhow!(e).context("failed to start audio capture")));
                        return Err(anyhow!("audio capture never started"));
                    }
                };
                let _ = ready_tx.send(Ok(()));
                run(analyzer, stream, raw_audio_rx, readings_tx, shutdown_rx)
            })
            .context("failed to spawn analysis thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { shutdown_tx, thread_handle }),
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(anyhow!("analysis thread exited during startup"))
            }
        }
    }

    /// Signals shutdown and returns the analyzer for history export.
    pub fn stop(self) -> Result<Analyzer> {
        // The worker may already have exited when its source closed.
        let _ = self.shutdown_tx.send(());
        self.thread_handle
            .join()
            .map_err(|_| anyhow!("analysis thread panicked"))?
    }
}

fn run<S: CaptureStream>(
    mut analyzer: Analyzer,
    stream: S,
    raw_audio_rx: Receiver<Vec<i16>>,
    readings_tx: Sender<PitchReading>,
    shutdown_rx: Receiver<()>,
) -> Result<Analyzer> {
    info!("Capture running; press Enter to stop");

    loop {
        crossbeam_channel::select! {
            recv(raw_audio_rx) -> msg => match msg {
                Ok(chunk) => {
                    for &sample in &chunk {
                        let before = analyzer.total_analyze_count();
                        analyzer.add_data(sample);
                        if analyzer.total_analyze_count() != before
                            && readings_tx.send(PitchReading::from_analyzer(&analyzer)).is_err()
                        {
                            debug!("Reading receiver dropped");
                            return Ok(shut_down(stream, analyzer));
                        }
                    }
                }
                Err(_) => {
                    warn!("Audio channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => {
                debug!("Received shutdown signal");
                break;
            },
        }
    }

    Ok(shut_down(stream, analyzer))
}

fn shut_down<S: CaptureStream>(stream: S, analyzer: Analyzer) -> Analyzer {
    stream.halt();
    drop(stream);
    info!(frames = analyzer.total_analyze_count(), "Capture stopped");
    analyzer
}
