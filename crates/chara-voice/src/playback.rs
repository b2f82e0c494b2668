//! Audio output behind a narrow trait.
//!
//! `RodioPlayer` owns the real output device on a dedicated thread, because
//! `rodio::OutputStream` is not `Send` on some platforms. `SilentPlayer` keeps
//! the rest of the pipeline fully testable without audio hardware. Completion
//! is signalled by the source itself: `TapSource` fires its oneshot when the
//! decoded stream runs dry, which is what "playback naturally ended" means.

use crate::error::{VoiceError, VoiceResult};
use crate::lip_sync::AnalyserTap;
use rodio::{OutputStream, Sink, Source};
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// Output collaborator for decoded audio. Implementations queue the source and
/// return immediately; the source reports its own end.
pub trait AudioPlayer: Send + Sync {
    fn append(&self, source: Box<dyn Source<Item = f32> + Send>) -> VoiceResult<()>;
}

/// Tee source: yields samples to the output sink while copying them into the
/// analyser tap. When the inner source is exhausted it flushes a window of
/// silence into the tap (so the mouth closes) and fires the completion signal.
pub struct TapSource<S> {
    inner: S,
    tap: AnalyserTap,
    done: Option<oneshot::Sender<()>>,
}

impl<S> TapSource<S>
where
    S: Source<Item = f32>,
{
    pub fn new(inner: S, tap: AnalyserTap, done: oneshot::Sender<()>) -> Self {
        Self {
            inner,
            tap,
            done: Some(done),
        }
    }
}

impl<S> Iterator for TapSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        match self.inner.next() {
            Some(sample) => {
                self.tap.push(sample);
                Some(sample)
            }
            None => {
                if let Some(done) = self.done.take() {
                    self.tap.flush_silence();
                    let _ = done.send(());
                }
                None
            }
        }
    }
}

impl<S> Source for TapSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

enum PlayerCommand {
    Append(Box<dyn Source<Item = f32> + Send>),
}

/// Real audio output. A dedicated thread owns the `OutputStream` and `Sink`;
/// the handle only holds a command channel and is freely shareable.
pub struct RodioPlayer {
    cmd_tx: mpsc::UnboundedSender<PlayerCommand>,
}

impl RodioPlayer {
    /// Open the default output device. Fails if the audio thread cannot
    /// initialise its stream.
    pub fn new() -> VoiceResult<Self> {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<PlayerCommand>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<VoiceResult<()>>();

        thread::spawn(move || {
            let (stream, stream_handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    let _ = ready_tx.send(Err(VoiceError::Playback(e.to_string())));
                    return;
                }
            };
            let sink = match Sink::try_new(&stream_handle) {
                Ok(sink) => sink,
                Err(e) => {
                    let _ = ready_tx.send(Err(VoiceError::Playback(e.to_string())));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            info!("audio output ready");

            while let Some(PlayerCommand::Append(source)) = cmd_rx.blocking_recv() {
                sink.append(source);
            }
            // Keep the stream alive until the command channel closes.
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { cmd_tx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(VoiceError::Playback(
                "audio thread exited during init".to_string(),
            )),
        }
    }
}

impl AudioPlayer for RodioPlayer {
    fn append(&self, source: Box<dyn Source<Item = f32> + Send>) -> VoiceResult<()> {
        self.cmd_tx
            .send(PlayerCommand::Append(source))
            .map_err(|_| VoiceError::Playback("audio thread not running".to_string()))
    }
}

/// Headless output: drains the source immediately, which feeds the tap and
/// fires the completion signal without producing sound. For tests and CI.
#[derive(Debug, Default)]
pub struct SilentPlayer;

impl AudioPlayer for SilentPlayer {
    fn append(&self, source: Box<dyn Source<Item = f32> + Send>) -> VoiceResult<()> {
        for _ in source {}
        Ok(())
    }
}

/// Test output with a playback delay: the source is drained only after
/// `duration` elapses, so "playback in progress" is observable.
pub struct TimedPlayer {
    duration: Duration,
}

impl TimedPlayer {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl AudioPlayer for TimedPlayer {
    fn append(&self, source: Box<dyn Source<Item = f32> + Send>) -> VoiceResult<()> {
        let duration = self.duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            for _ in source {}
        });
        Ok(())
    }
}
