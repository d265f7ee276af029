//! Audio decoding and mono downmix

use crate::sample::AudioSample;
use crate::{Result, SnrError};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded multi-channel audio
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Sample data per channel
    pub channels: Vec<Vec<f64>>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of samples per channel
    pub num_samples: usize,

    /// Where the audio came from (path or label)
    pub source: String,
}

impl AudioData {
    /// Wrap an already-decoded matrix stored per channel
    pub fn from_channels(channels: Vec<Vec<f64>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SnrError::Decode("sample rate must be positive".into()));
        }
        if channels.is_empty() {
            return Err(SnrError::Decode("audio has no channels".into()));
        }

        let num_samples = channels[0].len();
        if let Some(ragged) = channels.iter().position(|ch| ch.len() != num_samples) {
            return Err(SnrError::Decode(format!(
                "channel {} has {} samples, expected {}",
                ragged,
                channels[ragged].len(),
                num_samples
            )));
        }

        Ok(Self {
            channels,
            sample_rate,
            num_samples,
            source: "memory".into(),
        })
    }

    /// Wrap interleaved samples (`[L0, R0, L1, R1, ...]`)
    pub fn from_interleaved(samples: &[f64], num_channels: usize, sample_rate: u32) -> Result<Self> {
        if num_channels == 0 {
            return Err(SnrError::Decode("audio has no channels".into()));
        }
        if samples.len() % num_channels != 0 {
            return Err(SnrError::Decode(format!(
                "{} interleaved samples do not divide into {} channels",
                samples.len(),
                num_channels
            )));
        }

        Self::from_channels(deinterleave(samples, num_channels), sample_rate)
    }

    /// Load audio from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        log::debug!("Loading audio: {}", path_str);

        let extension = path.extension().and_then(|e| e.to_str());

        // hound keeps 32-bit float WAV bit-exact
        let data = if extension.is_some_and(|ext| ext.eq_ignore_ascii_case("wav")) {
            Self::load_wav(path, &path_str)?
        } else {
            let file = std::fs::File::open(path)?;
            Self::decode_symphonia(Box::new(file), extension, &path_str)?
        };

        log::debug!(
            "Loaded {}: {} ch, {} samples @ {} Hz",
            path_str,
            data.num_channels(),
            data.num_samples,
            data.sample_rate
        );
        Ok(data)
    }

    /// Decode an in-memory encoded file (e.g. an upload)
    pub fn from_bytes(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<Self> {
        log::debug!("Decoding {} bytes from memory", bytes.len());
        Self::decode_symphonia(Box::new(Cursor::new(bytes)), extension_hint, "memory")
    }

    /// Load WAV file using hound
    fn load_wav(path: &Path, path_str: &str) -> Result<Self> {
        let reader = hound::WavReader::open(path).map_err(|e| match e {
            hound::Error::IoError(io) => SnrError::Io(io),
            other => SnrError::Decode(format!("{}: {}", path_str, other)),
        })?;

        let spec = reader.spec();
        let num_channels = spec.channels as usize;

        let samples: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| v as f64))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| SnrError::Decode(format!("{}: {}", path_str, e)))?,
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f64 / max_val))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| SnrError::Decode(format!("{}: {}", path_str, e)))?
            }
        };

        let mut data = Self::from_interleaved(&samples, num_channels, spec.sample_rate)
            .map_err(|e| SnrError::Decode(format!("{}: {}", path_str, e)))?;
        data.source = path_str.to_string();
        Ok(data)
    }

    /// Decode any format symphonia supports
    fn decode_symphonia(
        source: Box<dyn MediaSource>,
        extension: Option<&str>,
        label: &str,
    ) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| SnrError::Decode(format!("{}: {}", label, e)))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| SnrError::Decode(format!("{}: no audio track", label)))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| SnrError::Decode(format!("{}: unknown sample rate", label)))?;

        let num_channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| SnrError::Decode(format!("{}: unknown channels", label)))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| SnrError::Decode(format!("{}: {}", label, e)))?;

        let track_id = track.id;
        let mut channels = vec![Vec::new(); num_channels];

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(SnrError::Decode(format!("{}: {}", label, e))),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => copy_samples(&decoded, &mut channels),
                // Corrupt packet: drop it and keep decoding
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("{}: skipping undecodable packet: {}", label, e);
                }
                Err(e) => return Err(SnrError::Decode(format!("{}: {}", label, e))),
            }
        }

        let mut data = Self::from_channels(channels, sample_rate)
            .map_err(|e| SnrError::Decode(format!("{}: {}", label, e)))?;
        data.source = label.to_string();
        Ok(data)
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.num_samples as f64 / self.sample_rate as f64
    }

    /// Downmix to mono by the arithmetic mean across channels
    pub fn to_mono(&self) -> Vec<f64> {
        if self.channels.len() == 1 {
            return self.channels[0].clone();
        }

        let scale = 1.0 / self.channels.len() as f64;
        (0..self.num_samples)
            .map(|i| self.channels.iter().map(|ch| ch[i]).sum::<f64>() * scale)
            .collect()
    }

    /// Downmix into an [`AudioSample`]
    pub fn into_sample(self) -> Result<AudioSample> {
        if self.num_samples == 0 {
            return Err(SnrError::EmptyAudio(format!("{}: no samples", self.source)));
        }
        AudioSample::new(self.to_mono(), self.sample_rate)
    }
}

/// Load a file straight into a mono [`AudioSample`]
pub fn load_sample<P: AsRef<Path>>(path: P) -> Result<AudioSample> {
    AudioData::load(path)?.into_sample()
}

/// Write a mono sample sequence as a 32-bit float WAV file
pub fn save_wav<P: AsRef<Path>>(samples: &[f64], sample_rate: u32, path: P) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path.as_ref(), spec)
        .map_err(|e| SnrError::Encode(e.to_string()))?;

    for &sample in samples {
        writer
            .write_sample(sample as f32)
            .map_err(|e| SnrError::Encode(e.to_string()))?;
    }

    writer
        .finalize()
        .map_err(|e| SnrError::Encode(e.to_string()))
}

fn deinterleave(samples: &[f64], num_channels: usize) -> Vec<Vec<f64>> {
    let num_samples = samples.len() / num_channels;
    let mut channels = vec![Vec::with_capacity(num_samples); num_channels];

    for (i, &sample) in samples.iter().enumerate() {
        channels[i % num_channels].push(sample);
    }
    channels
}

/// Append one decoded buffer to the per-channel vectors, normalized to [-1, 1)
fn copy_samples(buffer: &AudioBufferRef, channels: &mut [Vec<f64>]) {
    match buffer {
        AudioBufferRef::F32(buf) => copy_planes(&**buf, channels, |s| s as f64),
        AudioBufferRef::F64(buf) => copy_planes(&**buf, channels, |s| s),
        AudioBufferRef::S8(buf) => copy_planes(&**buf, channels, |s| s as f64 / 128.0),
        AudioBufferRef::S16(buf) => copy_planes(&**buf, channels, |s| s as f64 / 32768.0),
        AudioBufferRef::S24(buf) => {
            copy_planes(&**buf, channels, |s| s.inner() as f64 / 8388608.0)
        }
        AudioBufferRef::S32(buf) => {
            copy_planes(&**buf, channels, |s| s as f64 / 2147483648.0)
        }
        AudioBufferRef::U8(buf) => {
            copy_planes(&**buf, channels, |s| (s as f64 - 128.0) / 128.0)
        }
        AudioBufferRef::U16(buf) => {
            copy_planes(&**buf, channels, |s| (s as f64 - 32768.0) / 32768.0)
        }
        AudioBufferRef::U24(buf) => copy_planes(&**buf, channels, |s| {
            (s.inner() as f64 - 8388608.0) / 8388608.0
        }),
        AudioBufferRef::U32(buf) => copy_planes(&**buf, channels, |s| {
            (s as f64 - 2147483648.0) / 2147483648.0
        }),
    }
}

fn copy_planes<S, F>(
    buf: &symphonia::core::audio::AudioBuffer<S>,
    channels: &mut [Vec<f64>],
    convert: F,
) where
    S: symphonia::core::sample::Sample,
    F: Fn(S) -> f64,
{
    let available = buf.spec().channels.count();
    for (ch_idx, channel) in channels.iter_mut().enumerate().take(available) {
        channel.extend(buf.chan(ch_idx).iter().map(|&s| convert(s)));
    }
}
