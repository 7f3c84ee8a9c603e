use std::fs;
use std::path::Path;

use murmur_engine::loader::decode_wav;
use murmur_engine::manifest::{parse_manifest, ManifestParse};
use murmur_engine::{generate, GenerateOptions, Layer, Manifest, Profile, SynthSpec};

fn opts(dir: &Path, profile: Option<Profile>) -> GenerateOptions {
    GenerateOptions { out_dir: dir.to_path_buf(), profile, spec: SynthSpec { sample_rate: 16_000, duration_secs: 2.0 } }
}

fn read_manifest(dir: &Path) -> Manifest {
    let text = fs::read_to_string(dir.join("manifest.json")).unwrap();
    assert!(text.ends_with('\n'));
    match parse_manifest(&text) {
        ManifestParse::Ok(m) => m,
        other => panic!("manifest did not parse cleanly: {other:?}"),
    }
}

#[test]
fn deep_hum_writes_every_variant() {
    let dir = tempfile::tempdir().unwrap();
    let report = generate(&opts(dir.path(), Some(Profile::DeepHum))).unwrap();
    assert_eq!(report.written.len(), 4 + 4 + 3);
    assert_eq!(report.replaced, 0);

    let m = read_manifest(dir.path());
    assert_eq!(m.len(), 11);
    assert!(m.tracks.iter().all(|t| t.layer != Some(Layer::Room)));
    let first = m.get("deep_hum_low_bed_01").unwrap();
    assert_eq!(first.path, "drone/deep_hum/low_bed/deep_hum_low_bed_01_v1.wav");
    assert_eq!(first.duration_seconds, Some(2.0));
    let lufs = first.integrated_loudness.unwrap();
    assert!((lufs + 31.0).abs() <= 0.25, "{lufs}");
    assert!(first.features.density.unwrap() <= 1.0);

    for t in &m.tracks {
        let path = dir.path().join(&t.path);
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 44 + 32_000 * 4, "{}", t.path);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[36..40], b"data");
        assert!(decode_wav(&path).is_ok());
    }
}

#[test]
fn regeneration_is_byte_identical() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    generate(&opts(a.path(), Some(Profile::RainGentle))).unwrap();
    generate(&opts(b.path(), Some(Profile::RainGentle))).unwrap();

    let ma = fs::read(a.path().join("manifest.json")).unwrap();
    let mb = fs::read(b.path().join("manifest.json")).unwrap();
    assert_eq!(ma, mb);
    for t in read_manifest(a.path()).tracks {
        let wa = fs::read(a.path().join(&t.path)).unwrap();
        let wb = fs::read(b.path().join(&t.path)).unwrap();
        assert!(wa == wb, "{} differs between runs", t.id);
    }
}

#[test]
fn peaks_sit_at_the_layer_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    generate(&opts(dir.path(), Some(Profile::FocusWarm))).unwrap();
    let m = read_manifest(dir.path());

    let ceiling = |layer| match layer {
        Some(Layer::LowBed) => 0.65,
        Some(Layer::MidTexture) => 0.5,
        Some(Layer::Air) => 0.22,
        Some(Layer::Room) => 0.15,
        None => unreachable!(),
    };
    for t in &m.tracks {
        let buf = decode_wav(&dir.path().join(&t.path)).unwrap();
        let peak = buf.samples.iter().fold(0.0_f32, |p, s| p.max(s.abs()));
        let want: f32 = ceiling(t.layer);
        assert!((peak - want).abs() < 2e-3, "{}: peak {peak}, want {want}", t.id);
    }
}

#[test]
fn regeneration_replaces_only_its_own_entries() {
    let dir = tempfile::tempdir().unwrap();
    generate(&opts(dir.path(), Some(Profile::DeepHum))).unwrap();
    generate(&opts(dir.path(), Some(Profile::NatureAir))).unwrap();
    assert_eq!(read_manifest(dir.path()).len(), 11 + 14);

    let report = generate(&opts(dir.path(), Some(Profile::DeepHum))).unwrap();
    assert_eq!(report.replaced, 11);
    let m = read_manifest(dir.path());
    assert_eq!(m.len(), 25);
    let ids: Vec<_> = m.tracks.iter().map(|t| t.id.as_str()).collect();
    assert!(ids[..14].iter().all(|id| id.starts_with("nature_air_")));
    assert!(ids[14..].iter().all(|id| id.starts_with("deep_hum_")));
}

#[test]
fn corrupt_manifest_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("manifest.json"), "{ not json").unwrap();
    generate(&opts(dir.path(), Some(Profile::CafeMurmur))).unwrap();
    assert_eq!(read_manifest(dir.path()).len(), 14);
}
