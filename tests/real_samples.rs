//! 真实 Ogg Vorbis 样本的解码测试 (symphonia 合成后端).
//!
//! 样本位于 `$VORBIS_DEC_DATA_DIR/samples/audio/*.ogg` (默认 `data`),
//! 缺失时测试直接跳过.

use std::fs;
use std::path::PathBuf;

use vorbis_dec::{DecodeError, Session};

fn audio_samples_dir() -> PathBuf {
    let base_dir = std::env::var("VORBIS_DEC_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    PathBuf::from(base_dir).join("samples").join("audio")
}

fn sample_files() -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(audio_samples_dir()) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "ogg"))
        .collect();
    files.sort();
    files
}

fn decode_file(data: &[u8], chunk: usize) -> (Vec<u8>, u8) {
    let mut session = Session::new();
    let setup = session.setup(data).expect("setup 失败");
    let mut pcm = Vec::new();
    let rest = &data[setup.consumed..];
    if rest.is_empty() {
        pcm.extend(session.decode(&[]).expect("decode 失败"));
    }
    for piece in rest.chunks(chunk) {
        pcm.extend(session.decode(piece).expect("decode 失败"));
        if !session.is_ready() {
            break;
        }
    }
    (pcm, setup.channels)
}

#[test]
fn test_真实样本解码长度对齐() {
    let _ = env_logger::builder().is_test(true).try_init();
    let files = sample_files();
    if files.is_empty() {
        println!("跳过: 未找到样本目录 {:?}", audio_samples_dir());
        return;
    }

    for path in files {
        let data = fs::read(&path).unwrap();
        let mut session = Session::new();
        match session.setup(&data) {
            Ok(_) => {}
            // 非 Vorbis 的 Ogg (如 Opus/FLAC) 不参与
            Err(DecodeError::NotCodecAudio(_)) => continue,
            Err(e) => panic!("{}: setup 失败: {e}", path.display()),
        }

        let (pcm, channels) = decode_file(&data, 64 * 1024);
        assert!(!pcm.is_empty(), "{}: 没有输出", path.display());
        assert_eq!(
            pcm.len() % (usize::from(channels) * 2),
            0,
            "{}: 输出未按帧对齐",
            path.display()
        );
    }
}

#[test]
fn test_真实样本切分方式不影响输出() {
    let files = sample_files();
    let Some(path) = files.into_iter().find(|p| {
        fs::read(p)
            .ok()
            .is_some_and(|d| Session::new().setup(&d).is_ok())
    }) else {
        println!("跳过: 未找到可用的 Vorbis 样本");
        return;
    };

    let data = fs::read(&path).unwrap();
    let (whole, _) = decode_file(&data, usize::MAX);
    let (pieces, _) = decode_file(&data, 1777);
    assert_eq!(whole, pieces, "{}: 切分解码结果不一致", path.display());
}
