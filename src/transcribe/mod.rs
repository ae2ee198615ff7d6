//! Speech-to-text transcription module
//!
//! Local whisper.cpp inference via the whisper-rs crate. The model loads
//! once at daemon startup and is reused for every gesture; loading takes
//! seconds, transcribing takes fractions of one.

pub mod whisper;

use crate::config::WhisperConfig;
use crate::error::TranscribeError;
use crate::recorder::AudioArtifact;

/// One recognised piece of text. Never empty: whitespace-only recognition
/// produces zero segments instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSegment {
    pub text: String,
}

/// Trait for speech-to-text implementations
pub trait Transcriber: Send + Sync {
    /// Transcribe a finished recording. An empty utterance is Ok(vec![]),
    /// not an error; unreadable audio is.
    fn transcribe(&self, artifact: &AudioArtifact) -> Result<Vec<TranscriptSegment>, TranscribeError>;
}

/// Factory function to create the configured transcriber
pub fn create_transcriber(config: &WhisperConfig) -> Result<Box<dyn Transcriber>, TranscribeError> {
    Ok(Box::new(whisper::WhisperTranscriber::new(config)?))
}

/// Trim raw backend output into segments, dropping whatever trims to nothing.
pub fn clean_segments<I>(raw: I) -> Vec<TranscriptSegment>
where
    I: IntoIterator<Item = String>,
{
    raw.into_iter()
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(TranscriptSegment {
                    text: trimmed.to_string(),
                })
            }
        })
        .collect()
}
