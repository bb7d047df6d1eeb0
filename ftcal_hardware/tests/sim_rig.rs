use std::time::Duration;

use ftcal_hardware::{HwError, SimulatedRig};
use ftcal_traits::{RawLineSource, ReferenceSensor};
use rstest::rstest;

#[test]
fn channels_report_the_load_of_the_last_frame() {
    let rig = SimulatedRig::new();
    let mut reference = rig.reference();
    let mut channels = rig.channels();
    for seq in 1..=20 {
        reference.read_frame(Duration::from_millis(2)).unwrap();
        let line = channels.read_line(Duration::from_millis(2)).unwrap();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(tokens.len(), 11);
        assert_eq!(tokens[1], seq.to_string());
        let raw: Vec<i32> = tokens[3..].iter().map(|t| t.parse().unwrap()).collect();
        assert_eq!(raw, rig.counts().to_vec());
    }
}

#[test]
fn custom_offsets_grow_the_frame() {
    let rig = SimulatedRig::new().with_frame_offsets([0, 4, 8, 12, 16, 40]);
    let frame = rig.reference().read_frame(Duration::ZERO).unwrap();
    assert_eq!(frame.len(), 44);
    let fx = f32::from_le_bytes(frame[0..4].try_into().unwrap());
    assert!((f64::from(fx) - rig.load()[0]).abs() < 1e-6);
}

// Core maps trait-boundary errors by message when it cannot downcast; keep the
// wording of the timeout variant recognizable.
#[rstest]
#[case(HwError::Timeout, true)]
#[case(HwError::Disconnected, false)]
#[case(HwError::Serial("no such device".into()), false)]
fn timeout_message(#[case] err: HwError, #[case] is_timeout: bool) {
    assert_eq!(err.to_string().to_lowercase().contains("timeout"), is_timeout);
}
