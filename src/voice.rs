//! Voice capture: record one utterance from the microphone and turn it into
//! text with a Whisper-compatible transcription endpoint.
//!
//! A capture session ends when the caller cancels it, when the speaker falls
//! silent after talking, or after `max_seconds`. Each session yields exactly
//! one [`VoiceOutcome`]; partial transcripts are never reported.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use reqwest::multipart;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::audio::{self, Endpointer, TARGET_SAMPLE_RATE};
use crate::config::VoiceConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    /// Covers a missing device and denied microphone access alike.
    #[error("microphone unavailable: {0}")]
    Device(String),
    #[error("audio stream failed: {0}")]
    Stream(String),
    #[error("transcription failed: {0}")]
    Transcription(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    Transcript(String),
    /// Nothing was said, or the service heard nothing.
    Empty,
    Failed(VoiceError),
}

/// Client for a Whisper-compatible `/audio/transcriptions` endpoint.
#[derive(Debug, Clone)]
pub struct Transcriber {
    endpoint: String,
    model: String,
    language: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl Transcriber {
    pub fn new(endpoint: &str, config: &VoiceConfig) -> Self {
        Transcriber {
            endpoint: endpoint.to_string(),
            model: config.stt_model.clone(),
            language: config.language.clone(),
            api_key: config.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Transcribe 16 kHz mono audio.
    pub async fn transcribe(&self, samples: &[f32]) -> Result<String, VoiceError> {
        let wav = audio::encode_wav(samples, TARGET_SAMPLE_RATE);
        debug!(bytes = wav.len(), endpoint = %self.endpoint, "Sending audio for transcription");

        let file_part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .part("file", file_part);

        let mut req = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(VoiceError::Transcription(format!("status {}", resp.status())));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;

        Ok(json["text"].as_str().unwrap_or("").trim().to_string())
    }
}

struct Recording {
    samples: Vec<f32>,
    heard_speech: bool,
}

#[derive(Debug, Clone)]
struct RecordSettings {
    device: Option<String>,
    max_duration: Duration,
    silence_ms: u64,
    energy_threshold: f32,
}

/// Present only when speech capture can work on this host.
#[derive(Debug, Clone)]
pub struct VoiceCapture {
    settings: RecordSettings,
    transcriber: Transcriber,
}

impl VoiceCapture {
    pub fn detect(config: &VoiceConfig) -> Option<Self> {
        if !config.enabled {
            info!("Voice input disabled in config");
            return None;
        }
        let Some(endpoint) = config.stt_endpoint.as_deref().filter(|e| !e.is_empty()) else {
            info!("No speech-to-text endpoint configured; voice input disabled");
            return None;
        };
        if let Err(e) = resolve_device(config.device.as_deref()) {
            warn!("Voice input unavailable: {}", e);
            return None;
        }

        Some(VoiceCapture {
            settings: RecordSettings {
                device: config.device.clone(),
                max_duration: Duration::from_secs(config.max_seconds),
                silence_ms: config.silence_ms,
                energy_threshold: config.energy_threshold,
            },
            transcriber: Transcriber::new(endpoint, config),
        })
    }

    /// Runs one capture session. Cancelling `stop` ends recording early; what
    /// was recorded so far is still transcribed.
    pub fn listen(&self, stop: CancellationToken) -> impl Future<Output = VoiceOutcome> + Send + 'static {
        let settings = self.settings.clone();
        let transcriber = self.transcriber.clone();

        async move {
            let recorded = tokio::task::spawn_blocking(move || record(&settings, &stop)).await;

            let recording = match recorded {
                Ok(Ok(recording)) => recording,
                Ok(Err(e)) => return VoiceOutcome::Failed(e),
                Err(e) => return VoiceOutcome::Failed(VoiceError::Stream(e.to_string())),
            };

            if !recording.heard_speech || recording.samples.is_empty() {
                debug!("No speech detected");
                return VoiceOutcome::Empty;
            }

            match transcriber.transcribe(&recording.samples).await {
                Ok(text) if text.is_empty() => VoiceOutcome::Empty,
                Ok(text) => VoiceOutcome::Transcript(text),
                Err(e) => VoiceOutcome::Failed(e),
            }
        }
    }
}

fn resolve_device(device_name: Option<&str>) -> Result<(cpal::Device, StreamConfig), VoiceError> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| VoiceError::Device(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| VoiceError::Device(format!("input device not found: {name}")))?,
        None => host
            .default_input_device()
            .ok_or_else(|| VoiceError::Device("no default input device".to_string()))?,
    };

    let config = device
        .default_input_config()
        .map_err(|e| VoiceError::Device(e.to_string()))?
        .config();

    Ok((device, config))
}

/// Blocking: the cpal stream is not `Send`, so it lives and dies on this thread.
fn record(settings: &RecordSettings, stop: &CancellationToken) -> Result<Recording, VoiceError> {
    let (device, config) = resolve_device(settings.device.as_deref())?;
    let native_rate = config.sample_rate.0;
    let channels = config.channels;
    info!(device = %device.name().unwrap_or_else(|_| "unknown".into()), native_rate, channels, "Recording");

    // Mono at the device rate; resampled once when recording ends.
    let buffer: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
    let stream_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let writer = buffer.clone();
    let error_slot = stream_error.clone();
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = audio::to_mono(data, channels);
                if let Ok(mut buf) = writer.lock() {
                    buf.extend_from_slice(&mono);
                }
            },
            move |err| {
                error!("Audio input stream error: {}", err);
                if let Ok(mut slot) = error_slot.lock() {
                    slot.get_or_insert(err.to_string());
                }
            },
            None,
        )
        .map_err(|e| VoiceError::Device(e.to_string()))?;

    stream.play().map_err(|e| VoiceError::Device(e.to_string()))?;

    let started = Instant::now();
    let mut endpointer = Endpointer::new(settings.energy_threshold, settings.silence_ms);
    let mut consumed = 0;

    loop {
        std::thread::sleep(POLL_INTERVAL);

        if stop.is_cancelled() {
            debug!("Capture stopped by user");
            break;
        }
        if started.elapsed() >= settings.max_duration {
            debug!("Capture reached maximum duration");
            break;
        }
        if let Some(err) = stream_error.lock().ok().and_then(|slot| slot.clone()) {
            return Err(VoiceError::Stream(err));
        }

        let ended = match buffer.lock() {
            Ok(buf) => {
                let fresh = audio::resample_linear(&buf[consumed..], native_rate, TARGET_SAMPLE_RATE);
                let ended = endpointer.push(&fresh);
                consumed = buf.len();
                ended
            }
            Err(_) => return Err(VoiceError::Stream("capture buffer poisoned".to_string())),
        };
        if ended {
            debug!("End of speech detected");
            break;
        }
    }

    drop(stream);

    let native = buffer
        .lock()
        .map(|mut buf| std::mem::take(&mut *buf))
        .map_err(|_| VoiceError::Stream("capture buffer poisoned".to_string()))?;

    endpointer.push(&audio::resample_linear(&native[consumed..], native_rate, TARGET_SAMPLE_RATE));
    let samples = audio::resample_linear(&native, native_rate, TARGET_SAMPLE_RATE);
    let heard_speech = endpointer.heard_speech();
    info!(seconds = samples.len() as f32 / TARGET_SAMPLE_RATE as f32, heard_speech, "Recording finished");

    Ok(Recording { samples, heard_speech })
}
