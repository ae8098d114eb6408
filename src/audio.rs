//! Sample conversion and end-of-speech detection for voice capture.

/// Sample rate sent to the transcription service.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Down-mix interleaved multi-channel audio to mono by averaging.
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear resampler for mono audio.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (input.len() as f64 / ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let s0 = input.get(idx).copied().unwrap_or(0.0);
            let s1 = input.get(idx + 1).copied().unwrap_or(s0);
            s0 + frac * (s1 - s0)
        })
        .collect()
}

/// Mean absolute amplitude.
pub fn energy(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    chunk.iter().map(|s| s.abs()).sum::<f32>() / chunk.len() as f32
}

/// 16-bit PCM mono WAV.
pub fn encode_wav(audio: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_size = audio.len() as u32 * 2;
    let mut buf = Vec::with_capacity(44 + data_size as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_size).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&1u16.to_le_bytes()); // mono
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&16u16.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in audio {
        let pcm = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        buf.extend_from_slice(&pcm.to_le_bytes());
    }

    buf
}

/// Frame length used for energy decisions (20 ms at 16 kHz).
const FRAME_SAMPLES: usize = 320;

/// Decides when an utterance is over: some speech followed by a run of
/// silence at least `silence_samples` long.
#[derive(Debug)]
pub struct Endpointer {
    threshold: f32,
    silence_samples: usize,
    heard_speech: bool,
    silent_run: usize,
    pending: Vec<f32>,
}

impl Endpointer {
    pub fn new(threshold: f32, silence_ms: u64) -> Self {
        Endpointer {
            threshold,
            silence_samples: (TARGET_SAMPLE_RATE as u64 * silence_ms / 1000) as usize,
            heard_speech: false,
            silent_run: 0,
            pending: Vec::with_capacity(FRAME_SAMPLES),
        }
    }

    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }

    /// Feeds 16 kHz mono samples. Returns true once the utterance has ended.
    pub fn push(&mut self, samples: &[f32]) -> bool {
        self.pending.extend_from_slice(samples);
        let whole = self.pending.len() / FRAME_SAMPLES * FRAME_SAMPLES;
        let frames: Vec<f32> = self.pending.drain(..whole).collect();

        for frame in frames.chunks_exact(FRAME_SAMPLES) {
            if energy(frame) >= self.threshold {
                self.heard_speech = true;
                self.silent_run = 0;
            } else if self.heard_speech {
                self.silent_run += FRAME_SAMPLES;
            }
        }

        self.heard_speech && self.silent_run >= self.silence_samples
    }
}
