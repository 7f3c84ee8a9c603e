//! Offline asset generation: synthesize every layer of the selected profiles,
//! write 16-bit stereo WAVs and merge their entries into `manifest.json`.

use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use murmur_core::rng::{seed_for_asset, Mulberry32};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::loader::MANIFEST_FILE;
use crate::manifest::{parse_manifest, AudioAsset, FeatureScores, Manifest};
use crate::profiles::{LayerDef, Profile, SynthSpec};

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub out_dir: PathBuf,
    /// `None` builds every profile.
    pub profile: Option<Profile>,
    pub spec: SynthSpec,
}

impl GenerateOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into(), profile: None, spec: SynthSpec::default() }
    }
}

#[derive(Debug, Default, Clone)]
pub struct GenerateReport {
    pub profiles: Vec<Profile>,
    /// Paths of the WAVs written, relative to the output directory.
    pub written: Vec<String>,
    /// Previous entries replaced by this run.
    pub replaced: usize,
    /// Size of the manifest after the merge.
    pub manifest_tracks: usize,
}

/// Build assets and rewrite the manifest under `opts.out_dir`.
///
/// Entries belonging to other profiles are kept. An unreadable existing
/// manifest is replaced.
pub fn generate(opts: &GenerateOptions) -> Result<GenerateReport> {
    fs::create_dir_all(&opts.out_dir)?;
    let manifest_path = opts.out_dir.join(MANIFEST_FILE);
    let mut manifest = load_existing(&manifest_path);

    let profiles: Vec<Profile> = match opts.profile {
        Some(p) => vec![p],
        None => Profile::ALL.to_vec(),
    };

    let mut report = GenerateReport { profiles: profiles.clone(), ..Default::default() };
    for profile in profiles {
        report.replaced += manifest.remove_by_prefix(&format!("{}_", profile.name()));
        info!(profile = %profile, "generating");
        for def in profile.layers() {
            for variant in 1..=def.variants {
                let entry = build_asset(&opts.out_dir, profile, def, variant, &opts.spec)?;
                debug!(id = %entry.id, path = %entry.path, "wrote asset");
                report.written.push(entry.path.clone());
                manifest.tracks.push(entry);
            }
        }
    }

    fs::write(&manifest_path, manifest.to_json_pretty()?)?;
    report.manifest_tracks = manifest.len();
    info!(written = report.written.len(), tracks = report.manifest_tracks, "manifest updated");
    Ok(report)
}

fn load_existing(path: &Path) -> Manifest {
    let Ok(text) = fs::read_to_string(path) else {
        return Manifest::default();
    };
    let parsed = parse_manifest(&text);
    if parsed.dropped() > 0 {
        warn!(dropped = parsed.dropped(), "existing manifest had invalid entries");
    }
    parsed.into_manifest().unwrap_or_else(|| {
        warn!(path = %path.display(), "existing manifest unreadable, starting fresh");
        Manifest::default()
    })
}

/// Synthesize, write and describe one asset. `variant` counts from 1.
fn build_asset(out_dir: &Path, profile: Profile, def: &LayerDef, variant: u32, spec: &SynthSpec) -> Result<AudioAsset> {
    let id = profile.asset_id(def.layer, variant);
    let rel = profile.asset_path(def.layer, variant);
    let mut rng = seed_for_asset(&id, variant);

    let samples = profile.synthesize(def.layer, variant - 1, &mut rng, spec).unwrap_or_default();
    let full = out_dir.join(&rel);
    if let Some(dir) = full.parent() {
        fs::create_dir_all(dir)?;
    }
    write_wav_16(&full, spec.sample_rate, &samples)?;

    Ok(AudioAsset {
        id,
        category: profile.category(),
        layer: Some(def.layer),
        path: rel,
        duration_seconds: Some(f64::from(spec.duration_secs)),
        integrated_loudness: Some(def.lufs + jitter(&mut rng, 0.5)),
        tags: vec![profile.name().to_string(), def.layer.to_string()],
        features: FeatureScores {
            brightness: Some(def.brightness + jitter(&mut rng, 0.005)),
            density: Some((def.density + jitter(&mut rng, 0.002)).min(1.0)),
            movement: Some(def.movement + jitter(&mut rng, 0.004)),
        },
    })
}

/// Uniform in [-span/2, span/2).
fn jitter(rng: &mut Mulberry32, span: f64) -> f64 {
    (rng.next_f64() - 0.5) * span
}

/// Interleaved stereo to 16-bit PCM. Samples clamp to [-1, 1] and scale by 32767.
pub fn write_wav_16(path: &Path, sample_rate: u32, stereo: &[f32]) -> Result<()> {
    let spec = WavSpec { channels: 2, sample_rate, bits_per_sample: 16, sample_format: SampleFormat::Int };
    let mut writer = WavWriter::create(path, spec)?;
    for &s in stereo {
        writer.write_sample((s.clamp(-1.0, 1.0) * 32767.0).round() as i16)?;
    }
    writer.finalize()?;
    Ok(())
}
