//! # chara-voice: speech and expression pipeline for a talking character
//!
//! Turns a generated reply into ordered speech segments, fetches synthesized
//! audio for each under a rate limit, plays them back in strict submission
//! order, and derives per-frame facial weights (blink, emotion, mouth) from
//! the live audio amplitude.
//!
//! ## Architecture
//!
//! ```text
//! reply text ──→ screenplay ──→ Speaker ──fetch (≤1 in flight, cooldown)──→ TtsBackend
//!                                  │
//!                                  │ play (FIFO)
//!                                  ▼
//!                              Character ──→ AudioPlayer ──→ output device
//!                                  │               │
//!                                  │               └──→ AnalyserTap
//!                                  ▼
//! frame tick ──→ Character::update ──→ EmoteController ──→ ExpressionSink (renderer)
//! ```
//!
//! Rendering, model loading, and microphone capture stay outside, behind the
//! [`ExpressionSink`] and [`AudioPlayer`] traits; everything here runs
//! headless on tokio.

pub mod blink;
pub mod character;
pub mod error;
pub mod expression;
pub mod frame;
pub mod lip_sync;
pub mod playback;
pub mod screenplay;
pub mod speaker;
pub mod tts;

pub use blink::{AutoBlink, BLINK_CLOSE_MAX, BLINK_OPEN_MAX};
pub use character::Character;
pub use error::{VoiceError, VoiceResult};
pub use expression::{EmoteController, ExpressionChannel, ExpressionSink, WeightTable};
pub use frame::{FrameConfig, FrameDriver};
pub use lip_sync::{AnalyserTap, LipSync, LipSyncFrame, PlaybackHandle, TIME_DOMAIN_WINDOW};
pub use playback::{AudioPlayer, RodioPlayer, SilentPlayer, TapSource, TimedPlayer};
pub use screenplay::{
    split_sentences, text_to_screenplay, texts_to_screenplay, Emotion, Screenplay, Talk,
    TalkStyle, VoiceParam,
};
pub use speaker::{SpeakHook, SpeakRequest, Speaker, SpeakerConfig};
pub use tts::{KoeiromapTts, PlaceholderTts, TtsBackend};
