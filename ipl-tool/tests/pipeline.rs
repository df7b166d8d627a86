use ipl_convert::ConversionMode;
use ipl_formats::PixelFormat;
use ipl_image::Image;
use ipl_imops::{BinningMode, Mirror, RotationAngle};
use ipl_tool::{Pipeline, PipelineConfig, Step};

const YAML: &str = r#"
mode: fast
steps:
  - op: binning
    x: 2
    y: 2
    mode: sum
  - op: convert
    format: RGB8
  - op: mirror
    axis: left-right
  - op: rotate
    angle: 270
"#;

const TOML: &str = r#"
mode = "fast"

[[steps]]
op = "binning"
x = 2
y = 2
mode = "sum"

[[steps]]
op = "convert"
format = "RGB8"

[[steps]]
op = "mirror"
axis = "left-right"

[[steps]]
op = "rotate"
angle = 270
"#;

fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test_log::test]
fn yaml_and_toml_agree() {
    let dir = tempfile::tempdir().unwrap();
    let from_yaml = PipelineConfig::from_path(write(&dir, "p.yaml", YAML)).unwrap();
    let from_toml = PipelineConfig::from_path(write(&dir, "p.toml", TOML)).unwrap();
    assert_eq!(from_yaml, from_toml);
    assert_eq!(from_yaml.mode, ConversionMode::Fast);
    match &from_yaml.steps[0] {
        Step::Binning(c) => assert_eq!((c.x, c.y, c.mode), (2, 2, BinningMode::Sum)),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        from_yaml.steps[2],
        Step::Mirror {
            axis: Mirror::LeftRight
        }
    );
    assert_eq!(
        from_yaml.steps[3],
        Step::Rotate {
            angle: RotationAngle::Degree270
        }
    );
}

#[test_log::test]
fn unknown_extension_rejected() {
    let dir = tempfile::tempdir().unwrap();
    assert!(PipelineConfig::from_path(write(&dir, "p.json", "{}")).is_err());
}

#[test_log::test]
fn invalid_step_rejected_before_running() {
    let cfg: PipelineConfig = serde_yaml::from_str("steps:\n  - op: gamma\n    value: 7.5\n").unwrap();
    let err = Pipeline::new(&cfg).err().unwrap();
    assert!(format!("{err:?}").contains("step 1"), "{err:?}");
}

#[test_log::test]
fn runs_steps_in_order() {
    let cfg: PipelineConfig = serde_yaml::from_str(YAML).unwrap();
    let mut pipeline = Pipeline::new(&cfg).unwrap();
    assert_eq!(pipeline.len(), 4);

    // 8x4 Mono8, left half 10, right half 20
    let mut data = vec![10u8; 32];
    for row in data.chunks_exact_mut(8) {
        row[4..].fill(20);
    }
    let input = Image::from_vec(8, 4, PixelFormat::Mono8, data).unwrap();
    let out = pipeline.run(&input).unwrap();

    // binning 2x2 sum gives 4x2 [40 40 80 80], mirroring swaps the halves
    // and rotating clockwise turns it into a 2x4 column image.
    assert_eq!(out.pixel_format(), PixelFormat::RGB8);
    assert_eq!((out.width(), out.height()), (2, 4));
    let d = out.data();
    let first_rows: Vec<u8> = d[..6].iter().step_by(3).copied().collect();
    let last_rows: Vec<u8> = d[18..].iter().step_by(3).copied().collect();
    assert_eq!(first_rows, vec![80, 80]);
    assert_eq!(last_rows, vec![40, 40]);
    // input untouched
    assert_eq!(input.data()[0], 10);
}

#[test]
fn example_config_roundtrips_through_yaml() {
    let example = PipelineConfig::example();
    let text = serde_yaml::to_string(&example).unwrap();
    let back: PipelineConfig = serde_yaml::from_str(&text).unwrap();
    assert_eq!(back, example);
    Pipeline::new(&back).unwrap();
}
