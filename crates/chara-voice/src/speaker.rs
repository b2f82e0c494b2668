//! Ordered, rate-limited speech queue.
//!
//! Two single-consumer worker loops joined by FIFO channels: a **fetch
//! worker** that holds at most one synthesis request in flight and enforces a
//! cooldown measured from the previous fetch's completion, and a **play
//! worker** that plays fetched segments strictly in submission order. Fetching segment *i+1*
//! overlaps playback of segment *i*; playback *i+1* cannot start before *i*
//! settles because there is a single consumer.
//!
//! There is no per-segment cancellation and no fetch timeout: a stalled fetch
//! stalls every later entry. Dropping the `Speaker` closes the intake and
//! lets in-flight work finish harmlessly.

use crate::character::Character;
use crate::error::{VoiceError, VoiceResult};
use crate::screenplay::Screenplay;
use crate::tts::TtsBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

/// Per-segment UI hook, fired from the play worker.
pub type SpeakHook = Box<dyn FnOnce() + Send + 'static>;

/// One queued segment with its optional UI hooks.
pub struct SpeakRequest {
    pub screenplay: Screenplay,
    pub on_start: Option<SpeakHook>,
    pub on_complete: Option<SpeakHook>,
}

#[derive(Debug, Clone)]
pub struct SpeakerConfig {
    /// Minimum gap between the previous fetch completing and the next fetch
    /// starting (default 1000 ms).
    pub fetch_cooldown: Duration,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            fetch_cooldown: Duration::from_millis(1000),
        }
    }
}

/// The speech queue coordinator. `speak` never blocks; segments play in
/// exactly the order they were queued.
pub struct Speaker {
    request_tx: mpsc::UnboundedSender<SpeakRequest>,
    fetch_task: JoinHandle<()>,
    play_task: JoinHandle<()>,
}

impl Speaker {
    /// Start the fetch and play workers for `character`, fetching audio
    /// through `tts`.
    pub fn spawn(
        tts: Arc<dyn TtsBackend>,
        character: Character,
        config: SpeakerConfig,
    ) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<SpeakRequest>();
        let (fetched_tx, mut fetched_rx) =
            mpsc::unbounded_channel::<(SpeakRequest, Option<Vec<u8>>)>();

        let cooldown = config.fetch_cooldown;
        let fetch_task = tokio::spawn(async move {
            let mut last_fetch_done: Option<Instant> = None;
            while let Some(request) = request_rx.recv().await {
                if let Some(done_at) = last_fetch_done {
                    let since = done_at.elapsed();
                    if since < cooldown {
                        time::sleep(cooldown - since).await;
                    }
                }

                let audio = match tts.synthesize(&request.screenplay.talk).await {
                    Ok(bytes) if !bytes.is_empty() => Some(bytes),
                    Ok(_) => {
                        debug!("synthesis returned no audio, segment will be silent");
                        None
                    }
                    Err(e) => {
                        warn!("synthesis failed, segment will be silent: {}", e);
                        None
                    }
                };
                last_fetch_done = Some(Instant::now());

                if fetched_tx.send((request, audio)).is_err() {
                    break;
                }
            }
        });

        let play_task = tokio::spawn(async move {
            while let Some((request, audio)) = fetched_rx.recv().await {
                if let Some(on_start) = request.on_start {
                    on_start();
                }

                if let Some(bytes) = audio {
                    if let Err(e) = character.speak(bytes, &request.screenplay).await {
                        // Undecodable audio is downgraded to a silent segment
                        // so one bad response cannot wedge the queue.
                        warn!("playback failed, skipping segment: {}", e);
                    }
                }

                if let Some(on_complete) = request.on_complete {
                    on_complete();
                }
            }
        });

        Self {
            request_tx,
            fetch_task,
            play_task,
        }
    }

    /// Queue one segment. Call order is playback order.
    pub fn speak(
        &self,
        screenplay: Screenplay,
        on_start: Option<SpeakHook>,
        on_complete: Option<SpeakHook>,
    ) -> VoiceResult<()> {
        self.request_tx
            .send(SpeakRequest {
                screenplay,
                on_start,
                on_complete,
            })
            .map_err(|_| VoiceError::ChannelSend("speaker is shut down".to_string()))
    }

    /// Queue a whole reply, segments in order, without hooks.
    pub fn speak_all(&self, screenplays: Vec<Screenplay>) -> VoiceResult<()> {
        for screenplay in screenplays {
            self.speak(screenplay, None, None)?;
        }
        Ok(())
    }

    /// Close the intake and wait until every queued segment has finished.
    pub async fn shutdown(self) {
        drop(self.request_tx);
        let _ = self.fetch_task.await;
        let _ = self.play_task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionChannel, WeightTable};
    use crate::playback::SilentPlayer;
    use crate::screenplay::{text_to_screenplay, Talk, VoiceParam};
    use crate::tts::PlaceholderTts;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Minimal mono 16-bit PCM WAV, decodable by rodio.
    fn wav_bytes(samples: &[i16]) -> Vec<u8> {
        let sample_rate: u32 = 44_100;
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    /// TTS that records fetch start/end instants and can fail per index.
    struct ScriptedTts {
        fail_indices: Vec<usize>,
        calls: Mutex<Vec<(Instant, Instant)>>,
    }

    impl ScriptedTts {
        fn new(fail_indices: Vec<usize>) -> Self {
            Self {
                fail_indices,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TtsBackend for ScriptedTts {
        async fn synthesize(&self, _talk: &Talk) -> VoiceResult<Vec<u8>> {
            let index = self.calls.lock().unwrap().len();
            let started = Instant::now();
            time::sleep(Duration::from_millis(50)).await;
            self.calls.lock().unwrap().push((started, Instant::now()));
            if self.fail_indices.contains(&index) {
                Err(VoiceError::Tts("scripted failure".to_string()))
            } else {
                Ok(wav_bytes(&[8000; 256]))
            }
        }
    }

    fn character() -> (Character, Arc<WeightTable>) {
        let table = Arc::new(WeightTable::default());
        (Character::new(Arc::new(SilentPlayer), table.clone()), table)
    }

    fn hooked(
        speaker: &Speaker,
        screenplay: Screenplay,
        index: usize,
        log: &Arc<Mutex<Vec<String>>>,
    ) {
        let start_log = Arc::clone(log);
        let complete_log = Arc::clone(log);
        speaker
            .speak(
                screenplay,
                Some(Box::new(move || {
                    start_log.lock().unwrap().push(format!("start {index}"))
                })),
                Some(Box::new(move || {
                    complete_log.lock().unwrap().push(format!("complete {index}"))
                })),
            )
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn hooks_fire_in_submission_order() {
        let (character, _) = character();
        let tts = Arc::new(ScriptedTts::new(Vec::new()));
        let speaker = Speaker::spawn(tts, character, SpeakerConfig::default());

        let log = Arc::new(Mutex::new(Vec::new()));
        let plays = text_to_screenplay("一。二。三。", &VoiceParam::default());
        for (i, play) in plays.into_iter().enumerate() {
            hooked(&speaker, play, i, &log);
        }
        speaker.shutdown().await;

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                "start 0", "complete 0", "start 1", "complete 1", "start 2", "complete 2",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_fetches_respect_the_cooldown() {
        let (character, _) = character();
        let tts = Arc::new(ScriptedTts::new(Vec::new()));
        let speaker = Speaker::spawn(tts.clone(), character, SpeakerConfig::default());

        speaker
            .speak_all(text_to_screenplay("一。二。三。", &VoiceParam::default()))
            .unwrap();
        speaker.shutdown().await;

        let calls = tts.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            let gap = pair[1].0 - pair[0].1;
            assert!(
                gap >= Duration::from_millis(1000),
                "fetch gap was only {gap:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_stays_silent_but_keeps_the_queue_moving() {
        let (character, table) = character();
        let tts = Arc::new(ScriptedTts::new(vec![0]));
        let speaker = Speaker::spawn(tts, character, SpeakerConfig::default());

        let log = Arc::new(Mutex::new(Vec::new()));
        let plays = text_to_screenplay("[happy]一。[neutral]二。", &VoiceParam::default());
        for (i, play) in plays.into_iter().enumerate() {
            hooked(&speaker, play, i, &log);
        }
        speaker.shutdown().await;

        let log = log.lock().unwrap();
        assert_eq!(*log, vec!["start 0", "complete 0", "start 1", "complete 1"]);
        // The failed happy segment never reached the expression channel.
        assert_eq!(table.get(ExpressionChannel::Happy), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_audio_does_not_wedge_the_queue() {
        struct GarbageTts;

        #[async_trait]
        impl TtsBackend for GarbageTts {
            async fn synthesize(&self, _talk: &Talk) -> VoiceResult<Vec<u8>> {
                Ok(vec![0xde, 0xad, 0xbe, 0xef])
            }
        }

        let (character, _) = character();
        let speaker = Speaker::spawn(Arc::new(GarbageTts), character, SpeakerConfig::default());

        let log = Arc::new(Mutex::new(Vec::new()));
        let plays = text_to_screenplay("一。二。", &VoiceParam::default());
        for (i, play) in plays.into_iter().enumerate() {
            hooked(&speaker, play, i, &log);
        }
        speaker.shutdown().await;

        let log = log.lock().unwrap();
        assert_eq!(*log, vec!["start 0", "complete 0", "start 1", "complete 1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_synthesis_skips_playback_but_fires_hooks() {
        let (character, table) = character();
        let speaker = Speaker::spawn(Arc::new(PlaceholderTts), character, SpeakerConfig::default());

        let log = Arc::new(Mutex::new(Vec::new()));
        let play = text_to_screenplay("[sad]一。", &VoiceParam::default()).remove(0);
        hooked(&speaker, play, 0, &log);
        speaker.shutdown().await;

        assert_eq!(*log.lock().unwrap(), vec!["start 0", "complete 0"]);
        assert_eq!(table.get(ExpressionChannel::Sad), 0.0);
    }
}
