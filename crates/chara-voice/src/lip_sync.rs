//! Live amplitude sampling for mouth movement.
//!
//! The `AnalyserTap` is a fixed-size time-domain window that playback feeds
//! and the frame loop reads, standing in for a Web-Audio-style analyser node.
//! `sample()` reduces the window to one smoothed loudness value per frame:
//! peak over the window, a logistic squash, then a noise gate.

use crate::error::{VoiceError, VoiceResult};
use crate::playback::{AudioPlayer, TapSource};
use rodio::{Decoder, Source};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Samples kept in the analysis window.
pub const TIME_DOMAIN_WINDOW: usize = 2048;

/// Noise gate: squashed volumes below this are reported as silence.
const VOLUME_GATE: f32 = 0.1;

/// Shared time-domain window between playback (writer) and the frame loop
/// (reader). Cloning the tap clones the handle, not the buffer.
#[derive(Clone, Default)]
pub struct AnalyserTap {
    window: Arc<Mutex<VecDeque<f32>>>,
}

impl AnalyserTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample, evicting the oldest once the window is full.
    pub fn push(&self, sample: f32) {
        let mut window = self.window.lock().unwrap();
        window.push_back(sample);
        if window.len() > TIME_DOMAIN_WINDOW {
            window.pop_front();
        }
    }

    /// Overwrite the window with silence. Called when a source is exhausted so
    /// the mouth does not stay frozen on the last played window.
    pub fn flush_silence(&self) {
        let mut window = self.window.lock().unwrap();
        window.clear();
        window.extend(std::iter::repeat(0.0).take(TIME_DOMAIN_WINDOW));
    }

    /// Maximum absolute sample value over the current window.
    pub fn peak(&self) -> f32 {
        let window = self.window.lock().unwrap();
        window.iter().fold(0.0f32, |max, s| max.max(s.abs()))
    }
}

/// One frame's worth of lip-sync signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LipSyncFrame {
    /// Smoothed loudness in [0, 1].
    pub volume: f32,
}

/// Resolves when a queued playback naturally ends. If the player is torn down
/// first, the handle resolves as well; nothing is left waiting forever.
#[derive(Debug)]
pub struct PlaybackHandle {
    done: oneshot::Receiver<()>,
}

impl PlaybackHandle {
    pub(crate) fn new(done: oneshot::Receiver<()>) -> Self {
        Self { done }
    }

    pub async fn finished(self) {
        let _ = self.done.await;
    }
}

/// Amplitude sampler plus the playback entry point that feeds it.
#[derive(Clone)]
pub struct LipSync {
    tap: AnalyserTap,
    player: Arc<dyn AudioPlayer>,
}

impl LipSync {
    pub fn new(player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            tap: AnalyserTap::new(),
            player,
        }
    }

    pub fn tap(&self) -> &AnalyserTap {
        &self.tap
    }

    /// Sample the current window: peak → `1 / (1 + e^(-45·v + 5))` → gate.
    pub fn sample(&self) -> LipSyncFrame {
        let peak = self.tap.peak();
        let mut volume = 1.0 / (1.0 + (-45.0 * peak + 5.0).exp());
        if volume < VOLUME_GATE {
            volume = 0.0;
        }
        LipSyncFrame { volume }
    }

    /// Decode audio bytes and start playback, wiring the decoded stream to the
    /// output and to the analyser tap at the same time. Decode failure is fatal
    /// for this call only; the returned handle resolves when playback ends.
    pub fn play_bytes(&self, bytes: Vec<u8>) -> VoiceResult<PlaybackHandle> {
        let decoder =
            Decoder::new(Cursor::new(bytes)).map_err(|e| VoiceError::Decode(e.to_string()))?;
        let (done_tx, done_rx) = oneshot::channel();
        let source = TapSource::new(decoder.convert_samples::<f32>(), self.tap.clone(), done_tx);
        self.player.append(Box::new(source))?;
        Ok(PlaybackHandle::new(done_rx))
    }

    /// Fetch audio from a URL and play it.
    pub async fn play_from_url(&self, url: &str) -> VoiceResult<PlaybackHandle> {
        let res = reqwest::get(url)
            .await
            .map_err(|e| VoiceError::Http(e.to_string()))?;
        if !res.status().is_success() {
            return Err(VoiceError::Http(format!(
                "audio fetch failed with status {}",
                res.status()
            )));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| VoiceError::Http(e.to_string()))?;
        self.play_bytes(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::SilentPlayer;

    fn lip_sync() -> LipSync {
        LipSync::new(Arc::new(SilentPlayer))
    }

    #[test]
    fn empty_window_is_silent() {
        assert_eq!(lip_sync().sample().volume, 0.0);
    }

    #[test]
    fn quiet_peak_is_gated_to_zero() {
        let ls = lip_sync();
        ls.tap().push(0.02);
        assert_eq!(ls.sample().volume, 0.0);
    }

    #[test]
    fn loud_peak_approaches_one() {
        let ls = lip_sync();
        ls.tap().push(0.9);
        let volume = ls.sample().volume;
        assert!(volume > 0.9 && volume <= 1.0);
    }

    #[test]
    fn peak_uses_absolute_value() {
        let ls = lip_sync();
        ls.tap().push(-0.8);
        assert!(ls.sample().volume > 0.9);
    }

    #[test]
    fn window_evicts_old_samples() {
        let tap = AnalyserTap::new();
        tap.push(0.9);
        for _ in 0..TIME_DOMAIN_WINDOW {
            tap.push(0.1);
        }
        assert!((tap.peak() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn flush_silence_closes_the_mouth() {
        let ls = lip_sync();
        ls.tap().push(0.9);
        ls.tap().flush_silence();
        assert_eq!(ls.sample().volume, 0.0);
    }

    #[test]
    fn undecodable_bytes_are_a_decode_error() {
        let err = lip_sync().play_bytes(vec![1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, VoiceError::Decode(_)));
    }
}
