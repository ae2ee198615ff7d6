//! Whisper-based speech-to-text transcription
//!
//! Uses whisper.cpp via the whisper-rs crate for fast, local, offline
//! transcription. Input is the WAV artifact the recorder produced; output
//! is trimmed text segments.

use super::{clean_segments, Transcriber, TranscriptSegment};
use crate::config::{ComputeDevice, Config, WhisperConfig};
use crate::error::TranscribeError;
use crate::recorder::AudioArtifact;
use std::path::{Path, PathBuf};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Whisper-based transcriber
pub struct WhisperTranscriber {
    /// Whisper context (holds the model)
    ctx: WhisperContext,
    /// Language for transcription, "auto" enables detection
    language: String,
    /// Number of threads to use
    threads: usize,
}

impl WhisperTranscriber {
    /// Load the model once. Called at daemon startup, never per gesture.
    pub fn new(config: &WhisperConfig) -> Result<Self, TranscribeError> {
        let model_path = resolve_model_path(&config.model)?;
        let use_gpu = resolve_compute_device(config.device, accelerator_compiled_in())?;

        tracing::info!(
            "Loading whisper model from {:?} ({})",
            model_path,
            if use_gpu { "accelerated" } else { "cpu" }
        );
        let start = std::time::Instant::now();

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(use_gpu);

        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| TranscribeError::ModelNotFound("Invalid path".to_string()))?,
            ctx_params,
        )
        .map_err(|e| TranscribeError::InitFailed(e.to_string()))?;

        tracing::info!("Model loaded in {:.2}s", start.elapsed().as_secs_f32());

        let threads = config.threads.unwrap_or_else(|| num_cpus::get().min(4));

        Ok(Self {
            ctx,
            language: config.language.clone(),
            threads,
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, artifact: &AudioArtifact) -> Result<Vec<TranscriptSegment>, TranscribeError> {
        let samples = load_wav_mono(&artifact.path)?;

        let duration_secs = samples.len() as f32 / 16000.0;
        tracing::debug!(
            "Transcribing {:.2}s of audio ({} samples)",
            duration_secs,
            samples.len()
        );

        let start = std::time::Instant::now();

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if self.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.language));
        }

        params.set_n_threads(self.threads as i32);

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params.set_suppress_blank(true);

        // Utterances are key-hold sized; one segment keeps latency down
        if duration_secs < 30.0 {
            params.set_single_segment(true);
        }

        state
            .full(params, &samples)
            .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?;

        let mut raw = Vec::new();
        for segment in state.as_iter() {
            raw.push(
                segment
                    .to_str()
                    .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?
                    .to_string(),
            );
        }

        let segments = clean_segments(raw);

        tracing::info!(
            "Transcription completed in {:.2}s ({} segment(s))",
            start.elapsed().as_secs_f32(),
            segments.len()
        );

        Ok(segments)
    }
}

/// Whether this binary was built with any whisper.cpp GPU backend
pub fn accelerator_compiled_in() -> bool {
    cfg!(any(
        feature = "gpu-vulkan",
        feature = "gpu-cuda",
        feature = "gpu-metal",
        feature = "gpu-hipblas"
    ))
}

/// Map the configured device policy onto the use_gpu flag.
///
/// "auto" degrades silently; "accelerated" refuses to start without an
/// accelerator so a misconfigured box fails loudly instead of quietly
/// burning CPU.
pub fn resolve_compute_device(
    policy: ComputeDevice,
    accelerator: bool,
) -> Result<bool, TranscribeError> {
    match policy {
        ComputeDevice::Cpu => Ok(false),
        ComputeDevice::Auto => {
            if !accelerator {
                tracing::info!("No accelerator in this build, using CPU");
            }
            Ok(accelerator)
        }
        ComputeDevice::Accelerated => {
            if accelerator {
                Ok(true)
            } else {
                Err(TranscribeError::AcceleratorUnavailable)
            }
        }
    }
}

/// Load a WAV file as f32 mono samples.
///
/// The recorder writes 16 kHz mono S16_LE, but files handed to
/// `holdtype transcribe` come from anywhere: integer widths are scaled,
/// multi-channel audio is downmixed by averaging.
pub fn load_wav_mono(path: &Path) -> Result<Vec<f32>, TranscribeError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| TranscribeError::AudioFormat(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();

    if spec.sample_rate != 16000 {
        tracing::warn!(
            "Audio sample rate {} != 16000, transcription quality will suffer",
            spec.sample_rate
        );
    }

    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
        hound::SampleFormat::Float => reader.into_samples::<f32>().filter_map(|s| s.ok()).collect(),
    };

    let mono: Vec<f32> = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        samples
    };

    if mono.is_empty() {
        return Err(TranscribeError::AudioFormat(format!(
            "{}: no audio samples",
            path.display()
        )));
    }

    Ok(mono)
}

/// Resolve model name to file path
fn resolve_model_path(model: &str) -> Result<PathBuf, TranscribeError> {
    // Absolute paths are used directly
    let path = PathBuf::from(model);
    if path.is_absolute() {
        if path.exists() {
            return Ok(path);
        }
        return Err(TranscribeError::ModelNotFound(format!(
            "{} does not exist",
            path.display()
        )));
    }

    let model_filename = match model {
        "tiny" => "ggml-tiny.bin".to_string(),
        "tiny.en" => "ggml-tiny.en.bin".to_string(),
        "base" => "ggml-base.bin".to_string(),
        "base.en" => "ggml-base.en.bin".to_string(),
        "small" => "ggml-small.bin".to_string(),
        "small.en" => "ggml-small.en.bin".to_string(),
        "medium" => "ggml-medium.bin".to_string(),
        "medium.en" => "ggml-medium.en.bin".to_string(),
        "large-v3" => "ggml-large-v3.bin".to_string(),
        "large-v3-turbo" => "ggml-large-v3-turbo.bin".to_string(),
        other if other.ends_with(".bin") => other.to_string(),
        other => {
            return Err(TranscribeError::ModelNotFound(format!(
                "Unknown model: '{}'. Valid models: tiny, base, small, medium, large-v3, large-v3-turbo",
                other
            )));
        }
    };

    let candidates = [
        Config::models_dir().join(&model_filename),
        PathBuf::from("models").join(&model_filename),
        PathBuf::from(&model_filename),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.clone());
        }
    }

    Err(TranscribeError::ModelNotFound(format!(
        "Model '{}' not found. Looked in:\n  - {}\n  - {}\n  - {}\n\nDownload from: https://huggingface.co/ggerganov/whisper.cpp/tree/main",
        model,
        candidates[0].display(),
        candidates[1].display(),
        candidates[2].display()
    )))
}
