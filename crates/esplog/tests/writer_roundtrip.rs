//! Logs written by `LogWriter` decode back through `decode_log`.

use esplog::motion::MotionGenerator;
use esplog::{decode_log, LogWriter, MotionConfig, RecorderConfig};
use esplog_core::container::MAGIC;
use esplog_core::{FixedQuat, PrecisionProfile, RotationVector};

fn max_angle_error(a: FixedQuat, b: FixedQuat) -> f64 {
    a.delta_to(b)
        .to_rotation_vector()
        .to_array()
        .iter()
        .map(|c| c.to_num::<f64>().abs())
        .fold(0.0, f64::max)
}

fn config(samples_per_block: u16, jitter: f64) -> RecorderConfig {
    RecorderConfig {
        samples_per_block,
        accel_every: 4,
        motion: MotionConfig {
            jitter,
            seed: 3,
            ..MotionConfig::default()
        },
        ..RecorderConfig::default()
    }
}

#[test]
fn recorded_motion_decodes() {
    let config = config(64, 0.001);
    let mut writer = LogWriter::new(Vec::new(), &config).unwrap();
    let mut motion = MotionGenerator::new(&config.motion);
    let mut expected = Vec::new();
    let mut expected_accel = Vec::new();

    for i in 0..1000u32 {
        if i % config.accel_every == 0 {
            let sample = motion.accel(config.accel_range);
            expected_accel.push(sample);
            writer.push_accel(sample).unwrap();
        }
        let q = motion.next().unwrap();
        expected.push(q);
        writer.push_gyro(q, i * 10_000).unwrap();
    }
    let (bytes, stats) = writer.finish().unwrap();

    assert_eq!(&bytes[..7], MAGIC);
    assert_eq!(stats.total_bytes, bytes.len() as u64);
    assert_eq!(stats.gyro_samples, 1000);
    assert_eq!(stats.gyro_blocks, 16);
    assert_eq!(stats.keyframes, 1);
    assert_eq!(stats.dropped_blocks, 0);
    assert!(stats.gyro_ratio() < 0.5, "ratio {}", stats.gyro_ratio());

    let log = decode_log(&bytes).unwrap();
    assert_eq!(log.gyro_revision, Some(1));
    assert_eq!(log.samples_per_block, Some(64));
    assert_eq!(log.accel_range, Some(config.accel_range));
    assert_eq!(log.accel, expected_accel);
    assert_eq!(log.orientations.len(), expected.len());
    assert_eq!(log.gyro_blocks.len(), 16);
    assert_eq!(log.gyro_blocks[1].elapsed_us, Some(640_000));
    assert_eq!(log.gyro_blocks[15].samples, 1000 - 15 * 64);
    assert_eq!(log.gyro_blocks[15].first_sample, 15 * 64);

    let worst = log.gyro_blocks.iter().map(|b| b.shift).max().unwrap();
    let quantum = PrecisionProfile::new(worst).unwrap().quantum();
    for (actual, decoded) in expected.iter().zip(&log.orientations) {
        assert!(max_angle_error(*actual, *decoded) <= quantum);
    }
}

#[test]
fn dropped_block_is_followed_by_keyframe() {
    let config = config(20, 0.0);
    let mut writer = LogWriter::new(Vec::new(), &config).unwrap();
    let step = FixedQuat::from_rotation_vector(RotationVector::from_f64(0.01, 0.0, 0.0));

    let mut q = FixedQuat::IDENTITY;
    let mut kept = Vec::new();
    for i in 0..60u32 {
        // A half-radian jerk halfway through the second batch overflows
        // every profile.
        let spin = if i == 30 {
            FixedQuat::from_rotation_vector(RotationVector::from_f64(0.0, 0.5, 0.0))
        } else {
            step
        };
        q = (q * spin).normalized();
        if !(20..40).contains(&i) {
            kept.push(q);
        }
        writer.push_gyro(q, i * 1000).unwrap();
    }
    let (bytes, stats) = writer.finish().unwrap();

    assert_eq!(stats.gyro_blocks, 2);
    assert_eq!(stats.dropped_blocks, 1);
    assert_eq!(stats.dropped_samples, 20);
    assert_eq!(stats.keyframes, 2);

    let log = decode_log(&bytes).unwrap();
    assert_eq!(log.orientations.len(), 40);
    assert_eq!(log.gyro_blocks[1].elapsed_us, Some(40_000));
    assert_eq!(log.orientations[20], kept[20], "resync keyframe is exact");
    for (actual, decoded) in kept.iter().zip(&log.orientations) {
        assert!(max_angle_error(*actual, *decoded) <= PrecisionProfile::FALLBACK.quantum());
    }
}

#[test]
fn decoded_log_serializes_to_json() {
    let config = config(10, 0.0);
    let mut writer = LogWriter::new(Vec::new(), &config).unwrap();
    let mut motion = MotionGenerator::new(&config.motion);
    for i in 0..25 {
        writer.push_gyro(motion.next().unwrap(), i * 100).unwrap();
    }
    let (bytes, _) = writer.finish().unwrap();

    let log = decode_log(&bytes).unwrap();
    let json: serde_json::Value = serde_json::to_value(&log).unwrap();
    assert_eq!(json["gyro_blocks"].as_array().unwrap().len(), 3);
    assert_eq!(json["orientations"].as_array().unwrap().len(), 25);
    assert_eq!(json["orientations"][0][0].as_f64().unwrap(), 1.0);
}

#[test]
fn corrupt_log_is_reported() {
    assert!(decode_log(b"NotALog").is_err());

    let config = config(10, 0.0);
    let mut writer = LogWriter::new(Vec::new(), &config).unwrap();
    let mut motion = MotionGenerator::new(&config.motion);
    for i in 0..10 {
        writer.push_gyro(motion.next().unwrap(), i).unwrap();
    }
    let (mut bytes, _) = writer.finish().unwrap();
    bytes.truncate(bytes.len() - 3);
    assert!(decode_log(&bytes).is_err());
}
