//! C FFI 导出层集成测试
//!
//! 按 C 调用方的方式驱动整个流程: 打开, 取头部, 编码, 排空, 关闭.

use std::ffi::{CStr, CString};
use std::io::Write;

use encapp::codec::nal;
use encapp_ffi::encoder::{
    encapp_encoder_close, encapp_encoder_delayed_frames, encapp_encoder_encode,
    encapp_encoder_flush, encapp_encoder_free, encapp_encoder_get_header, encapp_encoder_new,
    encapp_encoder_open,
};
use encapp_ffi::raw_reader::{
    encapp_raw_reader_close, encapp_raw_reader_fill, encapp_raw_reader_open,
};
use encapp_ffi::{
    ENCAPP_ERR_INVALID_STATE, ENCAPP_OK, EncappFrameInfo, EncappParam, encapp_error_string,
    encapp_init,
};

const W: i32 = 16;
const H: i32 = 16;
const FRAME: usize = (W * H * 3 / 2) as usize;

#[test]
fn test_file_to_stream_pipeline() {
    encapp_init();

    // 4 帧原始 I420
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..4u8 {
        file.write_all(&vec![i * 10; FRAME]).unwrap();
    }
    file.flush().unwrap();
    let path = CString::new(file.path().to_str().unwrap()).unwrap();

    let keys = [c"bframes", c"i_frame_interval"];
    let values = [c"2", c"1"];
    let params: Vec<EncappParam> = keys
        .iter()
        .zip(values.iter())
        .map(|(k, v)| EncappParam {
            key: k.as_ptr(),
            value: v.as_ptr(),
        })
        .collect();

    unsafe {
        let reader = encapp_raw_reader_open(path.as_ptr());
        assert!(!reader.is_null());
        let enc = encapp_encoder_new(1);
        assert_eq!(
            encapp_encoder_open(enc, params.as_ptr(), params.len(), W, H, 0, 8),
            ENCAPP_OK
        );

        let mut header = vec![0u8; 512];
        let n = encapp_encoder_get_header(enc, header.as_mut_ptr(), header.len());
        assert!(n > 0);
        let sets = nal::split_parameter_sets(&header[..n as usize]).unwrap();
        assert_eq!(sets.sps[4] & 0x1F, 7);

        let mut input = vec![0u8; FRAME];
        let mut out = vec![0u8; 4096];
        let mut stream = Vec::new();
        let mut pts_out = Vec::new();
        let mut pts = 0i64;

        loop {
            let got = encapp_raw_reader_fill(reader, input.as_mut_ptr(), FRAME);
            assert!(got >= 0);
            if (got as usize) < FRAME {
                break;
            }
            let mut info = EncappFrameInfo {
                pts,
                ..Default::default()
            };
            let rc = encapp_encoder_encode(
                enc,
                input.as_ptr(),
                input.len(),
                out.as_mut_ptr(),
                out.len(),
                &mut info,
            );
            assert!(rc >= 0);
            if rc > 0 {
                stream.extend_from_slice(&out[..rc as usize]);
                pts_out.push(info.pts);
            }
            pts += 1;
        }
        assert_eq!(encapp_encoder_delayed_frames(enc), 2);

        loop {
            let mut info = EncappFrameInfo::default();
            let rc = encapp_encoder_flush(enc, out.as_mut_ptr(), out.len(), &mut info);
            assert!(rc >= 0);
            if rc == 0 {
                break;
            }
            stream.extend_from_slice(&out[..rc as usize]);
            pts_out.push(info.pts);
        }
        assert_eq!(pts_out, vec![0, 1, 2, 3]);

        let mut info = EncappFrameInfo::default();
        assert_eq!(
            encapp_encoder_encode(
                enc,
                input.as_ptr(),
                input.len(),
                out.as_mut_ptr(),
                out.len(),
                &mut info
            ),
            ENCAPP_ERR_INVALID_STATE
        );

        // Annex B 模式下拼接的码流只含切片, 且首帧为 IDR
        let units = nal::split_annex_b(&stream);
        assert_eq!(units.len(), 4);
        assert!(units.iter().all(|u| !u.nal_type.is_header()));
        assert!(units[0].nal_type.is_idr());

        assert_eq!(encapp_encoder_close(enc), ENCAPP_OK);
        encapp_encoder_free(enc);
        encapp_raw_reader_close(reader);
    }
}

#[test]
fn test_error_string_for_every_code() {
    for code in -10..=0 {
        let msg = unsafe { CStr::from_ptr(encapp_error_string(code)) };
        assert!(!msg.to_bytes().is_empty());
    }
}
