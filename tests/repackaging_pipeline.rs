//! NAL 重打包与编码会话集成测试

use encapp::codec::nal::{self, NalUnit, NalUnitType};
use encapp::codec::reference::ReferenceEncoder;
use encapp::codec::repackager::{extract_headers, repackage_frame, slice_payload_len};
use encapp::codec::{
    EncodeSession, EncoderParam, FrameDescriptor, NalClass, OutputMode, SessionState,
};

const W: u32 = 32;
const H: u32 = 16;
const FRAME: usize = (W * H * 3 / 2) as usize;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn open_session(params: &[(&str, &str)], mode: OutputMode) -> EncodeSession {
    let params: Vec<EncoderParam> = params
        .iter()
        .map(|(k, v)| EncoderParam::new(*k, *v))
        .collect();
    EncodeSession::open(ReferenceEncoder::open_boxed, &params, W, H, 0, 8, mode)
        .expect("打开参考编码会话失败")
}

/// 简单线性同余发生器, 保证用例可复现
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// 随机 NAL 序列, 每个单元的负载字节等于其序号, 便于追踪
fn random_sequence(rng: &mut Lcg) -> Vec<NalUnit> {
    let count = rng.below(12) as usize;
    (0..count)
        .map(|i| {
            let type_id = rng.below(24) as u8;
            let len = 1 + rng.below(40) as usize;
            NalUnit::new(NalUnitType::from_type_id(type_id), vec![i as u8; len])
        })
        .collect()
}

// ============================================================
// 重打包性质
// ============================================================

#[test]
fn test_classification_partitions_every_sequence() {
    let mut rng = Lcg(0x5EED);
    for _ in 0..200 {
        let nals = random_sequence(&mut rng);
        let headers = extract_headers(&nals);
        let mut out = vec![0u8; 4096];
        let outcome = repackage_frame(&nals, &mut out, OutputMode::AnnexB);

        let header_total: usize = nals
            .iter()
            .filter(|n| n.class() == NalClass::Header)
            .map(NalUnit::len)
            .sum();
        let total: usize = nals.iter().map(NalUnit::len).sum();
        assert_eq!(headers.len(), header_total);
        assert_eq!(headers.len() + outcome.bytes_written, total);

        // 切片按原顺序首尾相接
        let expected: Vec<u8> = nals
            .iter()
            .filter(|n| n.class() == NalClass::Slice)
            .flat_map(|n| n.payload.iter().copied())
            .collect();
        assert_eq!(&out[..outcome.bytes_written], &expected[..]);
    }
}

#[test]
fn test_prefixed_offset_invariant() {
    let mut rng = Lcg(42);
    for _ in 0..200 {
        let nals = random_sequence(&mut rng);
        let mut out = vec![0xFFu8; 4096];
        let outcome = repackage_frame(&nals, &mut out, OutputMode::Prefixed);
        assert_eq!(&out[..2], &[0, 0]);
        assert_eq!(outcome.bytes_written, 2 + slice_payload_len(&nals));
        assert!(!outcome.is_truncated());
    }
}

#[test]
fn test_capacity_safety() {
    let mut rng = Lcg(7);
    for _ in 0..300 {
        let nals = random_sequence(&mut rng);
        let capacity = rng.below(64) as usize;
        for mode in [OutputMode::Prefixed, OutputMode::AnnexB] {
            // 多分配的尾部作为哨兵, 检测越界写入
            let mut out = vec![0xCCu8; capacity + 16];
            let outcome = repackage_frame(&nals, &mut out[..capacity], mode);
            assert!(outcome.bytes_written <= capacity);
            assert!(out[capacity..].iter().all(|&b| b == 0xCC));

            let needed = mode.prefix_len() + slice_payload_len(&nals);
            assert_eq!(outcome.is_truncated(), needed > capacity);
        }
    }
}

#[test]
fn test_undersized_output_scenario() {
    let nals = vec![NalUnit::new(NalUnitType::Slice, vec![0x41; 10])];
    let mut out = [0u8; 1];
    let outcome = repackage_frame(&nals, &mut out, OutputMode::Prefixed);
    assert!(outcome.is_truncated());
    assert!(outcome.bytes_written <= 1);
}

// ============================================================
// 会话场景
// ============================================================

#[test]
fn test_i_frame_only_session() {
    init_logger();
    let mut session = open_session(&[("bframes", "0")], OutputMode::Prefixed);
    let header = session.get_header().unwrap();
    let sets = nal::split_parameter_sets(&header).unwrap();
    assert_eq!(sets.sps[4], 0x67);
    assert_eq!(sets.pps[4], 0x68);

    let input = vec![10u8; FRAME];
    let mut output = vec![0u8; 4096];
    let mut info = FrameDescriptor::new(0);
    let report = session.encode(&input, &mut output, &mut info).unwrap();
    assert!(report.is_produced());
    assert_eq!(session.delayed_frame_count(), 0);
    assert!(info.is_keyframe);
    assert!(nal::contains_idr(&output[2..info.size]));
    // 关键帧前的重复头部不会出现在逐帧输出中
    let units = nal::split_annex_b(&output[2..info.size]);
    assert!(units.iter().all(|n| !n.nal_type.is_header()));
    session.close();
}

#[test]
fn test_two_frame_delay_session() {
    init_logger();
    let mut session = open_session(&[("bframes", "2")], OutputMode::AnnexB);
    let mut output = vec![0u8; 4096];
    let mut results = Vec::new();

    for pts in [1000i64, 2000, 3000] {
        let input = vec![pts as u8; FRAME];
        let mut info = FrameDescriptor::new(pts);
        let report = session.encode(&input, &mut output, &mut info).unwrap();
        results.push((report.is_produced(), info.pts));
    }
    assert_eq!(results, vec![(false, 0), (false, 0), (true, 1000)]);

    let mut info = FrameDescriptor::default();
    assert!(session.flush(&mut output, &mut info).unwrap().is_produced());
    assert_eq!(info.pts, 2000);
    assert!(session.flush(&mut output, &mut info).unwrap().is_produced());
    assert_eq!(info.pts, 3000);
    assert!(session.flush(&mut output, &mut info).unwrap().is_drained());
    assert_eq!(session.state(), SessionState::Drained);
}

#[test]
fn test_buffering_round_trip() {
    init_logger();
    let n = 20i64;
    let duration = 33_333i64;
    let mut session = open_session(&[("bframes", "3"), ("keyint", "5")], OutputMode::Prefixed);
    let mut output = vec![0u8; 4096];
    let mut emitted = Vec::new();

    for i in 0..n {
        let pts = i * duration;
        let input = vec![i as u8; FRAME];
        let mut info = FrameDescriptor::new(pts);
        if session.encode(&input, &mut output, &mut info).unwrap().is_produced() {
            emitted.push(info);
        }
    }
    assert_eq!(session.delayed_frame_count(), 3);

    loop {
        let mut info = FrameDescriptor::default();
        let report = session.flush(&mut output, &mut info).unwrap();
        if report.is_drained() {
            break;
        }
        assert!(report.is_produced());
        emitted.push(info);
    }

    let pts: Vec<i64> = emitted.iter().map(|f| f.pts).collect();
    let expected: Vec<i64> = (0..n).map(|i| i * duration).collect();
    assert_eq!(pts, expected, "每帧恰好输出一次");
    assert!(emitted.windows(2).all(|w| w[0].dts <= w[1].dts));
    assert!(emitted.iter().all(|f| f.dts <= f.pts));
    let keyframes: Vec<i64> = emitted
        .iter()
        .filter(|f| f.is_keyframe)
        .map(|f| f.pts / duration)
        .collect();
    assert_eq!(keyframes, vec![0, 5, 10, 15]);
}

#[test]
fn test_params_loaded_from_json() {
    let json = r#"[
        {"key": "preset", "value": "veryfast"},
        {"key": "bitrate", "value": "4000000"},
        {"key": "bitrate_mode", "value": "cbr"},
        {"key": "i_frame_interval", "value": "1"},
        {"key": "aud", "value": "1"}
    ]"#;
    let params: Vec<EncoderParam> = serde_json::from_str(json).unwrap();
    let session = EncodeSession::open(
        ReferenceEncoder::open_boxed,
        &params,
        W,
        H,
        2,
        8,
        OutputMode::Prefixed,
    )
    .unwrap();

    let settings = session.all_settings();
    let get = |key: &str| {
        settings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(get("rc.i_bitrate"), Some("4000"));
    assert_eq!(get("rc.i_rc_method"), Some("crf"));
    assert_eq!(get("i_keyint_max"), Some("30"));
    assert_eq!(get("b_aud"), Some("1"));
    assert_eq!(session.config().preset.as_deref(), Some("veryfast"));
}

#[test]
fn test_update_settings_changes_keyint() {
    let mut session = open_session(&[("keyint", "100")], OutputMode::AnnexB);
    let mut output = vec![0u8; 4096];
    let input = vec![0u8; FRAME];
    let mut info = FrameDescriptor::new(0);
    session.encode(&input, &mut output, &mut info).unwrap();
    assert!(info.is_keyframe);

    session
        .update_settings(&[EncoderParam::new("keyint", "1")])
        .unwrap();
    let mut info = FrameDescriptor::new(1);
    session.encode(&input, &mut output, &mut info).unwrap();
    assert!(info.is_keyframe);
}
