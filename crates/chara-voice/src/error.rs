//! Error types for the speech pipeline.

use thiserror::Error;

/// Result type alias for speech pipeline operations.
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while fetching, decoding, or playing speech.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("TTS error: {0}")]
    Tts(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Audio decode error: {0}")]
    Decode(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
