//! 原始帧读取集成测试

use std::io::Write;

use encapp::codec::reference::ReferenceEncoder;
use encapp::codec::{EncodeSession, FrameDescriptor, OutputMode};
use encapp::core::ColorFormat;
use encapp::io::RawFileReader;

#[test]
fn test_encode_frames_read_from_file() {
    let (w, h) = (8u32, 8u32);
    let frame_size = ColorFormat::Nv21.frame_size(w, h, 8).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..3u8 {
        file.write_all(&vec![i; frame_size]).unwrap();
    }
    // 末尾残余不足一帧
    file.write_all(&[0xFF; 5]).unwrap();
    file.flush().unwrap();

    let mut session =
        EncodeSession::open(ReferenceEncoder::open_boxed, &[], w, h, 3, 8, OutputMode::Prefixed)
            .unwrap();
    assert_eq!(session.input_frame_size().unwrap(), frame_size);

    let mut reader = RawFileReader::open(file.path()).unwrap();
    let mut output = vec![0u8; 1024];
    let mut produced = 0;
    let mut pts = 0;
    while let Some(frame) = reader.read_frame(frame_size).unwrap() {
        let mut info = FrameDescriptor::new(pts);
        let report = session.encode(&frame, &mut output, &mut info).unwrap();
        assert!(report.is_produced());
        assert_eq!(&output[..2], &[0, 0]);
        produced += 1;
        pts += 1;
    }
    assert_eq!(produced, 3);
    assert_eq!(reader.total_read(), (frame_size * 3 + 5) as u64);
    reader.close();
    session.close();
}

#[test]
fn test_fill_reports_short_read() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[1u8; 100]).unwrap();
    file.flush().unwrap();

    let mut reader = RawFileReader::open(file.path()).unwrap();
    let mut buf = vec![0u8; 64];
    assert_eq!(reader.fill(&mut buf, 64).unwrap(), 64);
    assert_eq!(reader.fill(&mut buf, 64).unwrap(), 36);
    assert_eq!(reader.fill(&mut buf, 64).unwrap(), 0);
}
