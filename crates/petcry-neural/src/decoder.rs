//! Audio decoder using Symphonia
//!
//! Supports WAV, FLAC, OGG/Vorbis, MP3 and AAC/ALAC in MP4. Input arrives as
//! an in-memory byte buffer; multi-channel audio is downmixed to mono and then
//! resampled to the pipeline's target rate.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::resampler::{resample, RESAMPLE_LOOKAHEAD};
use crate::NeuralError;

/// Decoded audio buffer at its native sample rate
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels in the source
    pub channels: u16,
    /// Length of the whole stream, including audio past a decode limit
    pub duration_secs: f32,
}

/// Mono waveform at the pipeline's target rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// A recording brought to the pipeline rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// The decoded head of the recording (all of it when no limit was set)
    pub waveform: Waveform,
    /// Duration of the full source recording
    pub duration_secs: f32,
}

/// Decode a byte buffer and resample it to `target_rate`.
///
/// With `max_secs`, decoding stops once that much audio (plus the resampler's
/// lookahead) is in hand; the reported duration still covers the whole
/// stream. A buffer that parses but carries no samples decodes to an empty
/// waveform; rejecting it is the feature extractor's job.
pub fn decode_to_rate(
    bytes: &[u8],
    target_rate: u32,
    max_secs: Option<u32>,
) -> Result<DecodedAudio, NeuralError> {
    let buffer = decode_bytes(bytes, None, max_secs)?;
    let samples = resample(&buffer.samples, buffer.sample_rate, target_rate)?;
    tracing::debug!(
        "Decoded {} samples @ {} Hz ({} ch, {:.2}s total) -> {} samples @ {} Hz",
        buffer.samples.len(),
        buffer.sample_rate,
        buffer.channels,
        buffer.duration_secs,
        samples.len(),
        target_rate
    );
    Ok(DecodedAudio {
        waveform: Waveform::new(samples, target_rate),
        duration_secs: buffer.duration_secs,
    })
}

/// Decode an in-memory audio buffer to mono f32 samples.
///
/// `extension` is an optional container hint such as `"wav"`. `max_secs`
/// caps how much audio is kept; packets past the cap are only counted.
pub fn decode_bytes(
    bytes: &[u8],
    extension: Option<&str>,
    max_secs: Option<u32>,
) -> Result<AudioBuffer, NeuralError> {
    if bytes.is_empty() {
        return Err(NeuralError::Decoder("Empty audio buffer".into()));
    }
    let source = Cursor::new(bytes.to_vec());
    decode_source(Box::new(source), extension, max_secs)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
    max_secs: Option<u32>,
) -> Result<AudioBuffer, NeuralError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| NeuralError::Decoder(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| NeuralError::Decoder("No audio track found".into()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| NeuralError::Decoder("Unknown sample rate".into()))?;
    if sample_rate == 0 {
        return Err(NeuralError::Decoder("Sample rate is zero".into()));
    }

    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);

    let track_id = track.id;
    let known_frames = track.codec_params.n_frames;
    let time_base = track.codec_params.time_base;
    let max_frames =
        max_secs.map(|secs| secs as usize * sample_rate as usize + RESAMPLE_LOOKAHEAD);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| NeuralError::Decoder(format!("Failed to create decoder: {}", e)))?;

    let mut all_samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    // Once the cap is reached with no frame count in the header, the rest of
    // the stream is walked packet by packet and only its timestamps summed.
    let mut counting_only = false;
    let mut skipped_ts: u64 = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(NeuralError::Decoder(format!("Packet decode error: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        if counting_only {
            skipped_ts = skipped_ts.saturating_add(packet.dur);
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Decode error (skipping packet): {}", e);
                continue;
            }
            Err(e) => {
                return Err(NeuralError::Decoder(format!("Fatal decode error: {}", e)));
            }
        };

        let spec = *decoded.spec();
        channels = spec.channels.count() as u16;

        let needs_alloc = match &sample_buf {
            Some(buf) => buf.capacity() < decoded.capacity(),
            None => true,
        };
        if needs_alloc {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            all_samples.extend_from_slice(buf.samples());
        }

        if let Some(limit) = max_frames {
            if all_samples.len() / channels.max(1) as usize >= limit {
                if known_frames.is_some() {
                    break;
                }
                counting_only = true;
            }
        }
    }

    let mut mono_samples = if channels > 1 {
        downmix_to_mono(&all_samples, channels as usize)
    } else {
        all_samples
    };

    let decoded_secs = mono_samples.len() as f64 / sample_rate as f64;
    let duration_secs = match known_frames {
        Some(frames) => frames as f64 / sample_rate as f64,
        None => {
            let tail_secs = match time_base {
                Some(tb) => {
                    let time = tb.calc_time(skipped_ts);
                    time.seconds as f64 + time.frac
                }
                None => skipped_ts as f64 / sample_rate as f64,
            };
            decoded_secs + tail_secs
        }
    };

    if let Some(limit) = max_frames {
        mono_samples.truncate(limit);
    }

    Ok(AudioBuffer {
        samples: mono_samples,
        sample_rate,
        channels,
        duration_secs: duration_secs as f32,
    })
}

/// Downmix interleaved multi-channel audio to mono
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    let scale = 1.0 / channels as f32;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}
