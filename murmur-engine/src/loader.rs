//! Manifest and asset fetching.
//!
//! The player only sees the [`AssetLoader`] trait. [`FsLoader`] reads an
//! asset directory produced by the generation pipeline; [`MemoryLoader`]
//! serves bundled or synthetic assets.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use tracing::debug;

use crate::error::{EngineError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Interleaved stereo f32 audio.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl DecodedBuffer {
    /// Wrap interleaved stereo samples. A trailing odd sample is dropped.
    pub fn stereo(sample_rate: u32, mut samples: Vec<f32>) -> Self {
        samples.truncate(samples.len() & !1);
        Self { sample_rate, channels: 2, samples }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / f64::from(self.sample_rate)
        }
    }

    /// `(left, right)` at `frame`.
    #[inline]
    pub fn frame(&self, frame: usize) -> (f32, f32) {
        let i = frame * 2;
        (self.samples[i], self.samples[i + 1])
    }

    /// Linear-interpolated copy at `rate`.
    pub fn resampled(&self, rate: u32) -> DecodedBuffer {
        let frames = self.frames();
        if rate == self.sample_rate || rate == 0 || frames == 0 {
            return self.clone();
        }
        let ratio = f64::from(self.sample_rate) / f64::from(rate);
        let out_frames = ((frames as f64 / ratio).round() as usize).max(1);
        let mut out = Vec::with_capacity(out_frames * 2);
        for i in 0..out_frames {
            let pos = i as f64 * ratio;
            let i0 = (pos.floor() as usize).min(frames - 1);
            let i1 = (i0 + 1).min(frames - 1);
            let t = (pos - i0 as f64) as f32;
            let (l0, r0) = self.frame(i0);
            let (l1, r1) = self.frame(i1);
            out.push(l0 + (l1 - l0) * t);
            out.push(r0 + (r1 - r0) * t);
        }
        DecodedBuffer::stereo(rate, out)
    }
}

/// Source of the manifest text and of decoded assets.
pub trait AssetLoader: Send {
    fn load_manifest(&mut self) -> Result<String>;
    /// `path` is the manifest-relative asset path.
    fn load_asset(&mut self, path: &str) -> Result<DecodedBuffer>;
}

/// Reads `<root>/manifest.json` and WAV files below `root`.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
    manifest_path: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let manifest_path = root.join(MANIFEST_FILE);
        Self { root, manifest_path }
    }

    pub fn with_manifest(mut self, manifest_path: impl Into<PathBuf>) -> Self {
        self.manifest_path = manifest_path.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetLoader for FsLoader {
    fn load_manifest(&mut self) -> Result<String> {
        if !self.manifest_path.exists() {
            return Err(EngineError::NotFound { path: self.manifest_path.clone() });
        }
        Ok(fs::read_to_string(&self.manifest_path)?)
    }

    fn load_asset(&mut self, path: &str) -> Result<DecodedBuffer> {
        let full = self.root.join(path);
        if !full.is_file() {
            return Err(EngineError::NotFound { path: full });
        }
        debug!(path = %full.display(), "decoding asset");
        decode_wav(&full)
    }
}

/// Decode any PCM WAV hound understands into interleaved stereo f32.
/// Mono is duplicated; channels past the second are discarded.
pub fn decode_wav(path: &Path) -> Result<DecodedBuffer> {
    let decode_err = |reason: String| EngineError::Decode { path: path.display().to_string(), reason };

    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    if channels == 0 {
        return Err(decode_err("zero channels".into()));
    }

    let raw: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = 1.0 / (1_i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
        (fmt, bits) => return Err(decode_err(format!("unsupported sample format {fmt:?}/{bits}"))),
    };

    let frames = raw.len() / channels;
    if frames == 0 {
        return Err(decode_err("no audio frames".into()));
    }
    let mut samples = Vec::with_capacity(frames * 2);
    for f in raw.chunks_exact(channels) {
        let l = f[0];
        let r = if channels > 1 { f[1] } else { l };
        samples.push(l);
        samples.push(r);
    }
    Ok(DecodedBuffer::stereo(spec.sample_rate, samples))
}

/// Loader over in-memory assets.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    pub manifest: Option<String>,
    pub assets: HashMap<String, DecodedBuffer>,
    /// Paths that fail to decode.
    pub broken: HashSet<String>,
    /// Every `load_asset` call, in order.
    pub requests: Vec<String>,
}

impl MemoryLoader {
    pub fn new(manifest: impl Into<String>) -> Self {
        Self { manifest: Some(manifest.into()), ..Self::default() }
    }

    pub fn with_asset(mut self, path: impl Into<String>, buffer: DecodedBuffer) -> Self {
        self.assets.insert(path.into(), buffer);
        self
    }

    pub fn with_broken(mut self, path: impl Into<String>) -> Self {
        self.broken.insert(path.into());
        self
    }
}

impl AssetLoader for MemoryLoader {
    fn load_manifest(&mut self) -> Result<String> {
        self.manifest.clone().ok_or_else(|| EngineError::NotFound { path: PathBuf::from(MANIFEST_FILE) })
    }

    fn load_asset(&mut self, path: &str) -> Result<DecodedBuffer> {
        self.requests.push(path.to_string());
        if self.broken.contains(path) {
            return Err(EngineError::Decode { path: path.to_string(), reason: "corrupt".into() });
        }
        self.assets.get(path).cloned().ok_or_else(|| EngineError::NotFound { path: PathBuf::from(path) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, rate: u32, frames: &[i16]) {
        let spec = WavSpec { channels, sample_rate: rate, bits_per_sample: 16, sample_format: SampleFormat::Int };
        let mut w = WavWriter::create(path, spec).unwrap();
        for &s in frames {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn mono_is_duplicated_to_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("m.wav");
        write_wav(&p, 1, 8000, &[16384, -16384, 0]);
        let b = decode_wav(&p).unwrap();
        assert_eq!(b.channels, 2);
        assert_eq!(b.frames(), 3);
        assert_abs_diff_eq!(b.samples[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(b.samples[1], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(b.samples[2], -0.5, epsilon = 1e-6);
    }

    #[test]
    fn fs_loader_reports_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = FsLoader::new(dir.path());
        assert!(matches!(l.load_manifest(), Err(EngineError::NotFound { .. })));
        assert!(matches!(l.load_asset("nope.wav"), Err(EngineError::NotFound { .. })));

        fs::write(dir.path().join("bad.wav"), b"RIFF....garbage").unwrap();
        let err = l.load_asset("bad.wav").unwrap_err();
        assert!(matches!(err, EngineError::Wav(_) | EngineError::Decode { .. }), "{err}");
    }

    #[test]
    fn resample_preserves_duration() {
        let b = DecodedBuffer::stereo(24_000, vec![0.25; 2 * 2400]);
        let r = b.resampled(48_000);
        assert_eq!(r.sample_rate, 48_000);
        assert_eq!(r.frames(), 4800);
        assert_abs_diff_eq!(r.duration_secs(), b.duration_secs(), epsilon = 1e-9);
        assert!(r.samples.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn memory_loader_records_requests() {
        let mut l = MemoryLoader::new("{}")
            .with_asset("a.wav", DecodedBuffer::stereo(48_000, vec![0.0; 4]))
            .with_broken("b.wav");
        assert!(l.load_asset("a.wav").is_ok());
        assert!(matches!(l.load_asset("b.wav"), Err(EngineError::Decode { .. })));
        assert_eq!(l.requests, vec!["a.wav", "b.wav"]);
    }
}
