//! 词库文件的宽字符（UTF-16）编解码
//!
//! 写出时带 BOM（小端）；读入时按 BOM 判断字节序。
//! 非空内容缺少 BOM 视为无法解析，这样旧的 UTF-8 词库会落到迁移加载器。

use std::io;
use std::path::Path;

const BOM_LE: [u8; 2] = [0xFF, 0xFE];
const BOM_BE: [u8; 2] = [0xFE, 0xFF];

pub fn encode(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + text.len() * 2);
    bytes.extend_from_slice(&BOM_LE);
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

/// 缺少 BOM、字节数为奇数或含孤立代理项时返回 InvalidData
pub fn decode(bytes: &[u8]) -> io::Result<String> {
    let (body, big_endian) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (rest, false),
        [0xFE, 0xFF, rest @ ..] => (rest, true),
        [] => return Ok(String::new()),
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "UTF-16 data has no byte order mark",
            ))
        }
    };
    if body.len() % 2 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("UTF-16 data has odd length {}", body.len()),
        ));
    }

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();

    String::from_utf16(&units).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn read(path: &Path) -> io::Result<String> {
    decode(&std::fs::read(path)?)
}

pub fn write(path: &Path, text: &str) -> io::Result<()> {
    std::fs::write(path, encode(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encode_has_little_endian_bom() {
        let bytes = encode("hi");
        assert_eq!(bytes, vec![0xFF, 0xFE, b'h', 0, b'i', 0]);
        assert_eq!(&bytes[..2], &BOM_LE);
    }

    #[test]
    fn test_decode_handles_both_byte_orders() {
        assert_eq!(decode(&encode("año 🐝")).unwrap(), "año 🐝");

        let mut big = BOM_BE.to_vec();
        for unit in "ñu".encode_utf16() {
            big.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode(&big).unwrap(), "ñu");

        assert_eq!(decode(&[]).unwrap(), "");
    }

    #[test]
    fn test_decode_rejects_invalid_data() {
        let err = decode(&[0xFF, 0xFE, b'a']).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = decode("{\"a\": []}".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        // 孤立的高位代理项
        let err = decode(&[0xFF, 0xFE, 0x00, 0xD8]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");
        write(&path, "{\"a b\": [\"c\"]}").unwrap();
        assert_eq!(read(&path).unwrap(), "{\"a b\": [\"c\"]}");
    }
}
