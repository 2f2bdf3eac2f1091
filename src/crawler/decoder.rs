use std::sync::LazyLock;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use regex::bytes::Regex;
use tracing::debug;

use crate::error::Error;

const SNIFF_LIMIT: usize = 1024;

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#).expect("无法创建 charset 正则")
});

/// 按 BOM、Content-Type、`<meta>`、统计猜测的顺序确定编码
pub fn sniff(raw: &[u8], content_type: Option<&str>) -> (&'static Encoding, usize) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(raw) {
        return (encoding, bom_len);
    }

    if let Some(encoding) = content_type.and_then(header_charset) {
        return (encoding, 0);
    }

    let head = &raw[..raw.len().min(SNIFF_LIMIT)];
    if let Some(encoding) = META_CHARSET
        .captures(head)
        .and_then(|caps| Encoding::for_label(&caps[1]))
    {
        // 页面内声明的 UTF-16 实际按 UTF-8 处理
        return (encoding.output_encoding(), 0);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(raw, true);
    (detector.guess(None, true), 0)
}

fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Encoding::for_label(value.trim().trim_matches(['"', '\'']).as_bytes())
    })
}

/// 严格解码，遇到非法字节序列即失败
pub fn decode(url: &str, raw: &[u8], content_type: Option<&str>) -> Result<String, Error> {
    let (encoding, bom_len) = sniff(raw, content_type);
    debug!("{} 使用编码 {}", url, encoding.name());
    encoding
        .decode_without_bom_handling_and_without_replacement(&raw[bom_len..])
        .map(|text| text.into_owned())
        .ok_or_else(|| Error::Decode {
            url: url.to_owned(),
            encoding: encoding.name(),
        })
}
