use linkify::{LinkFinder, LinkKind};
use scraper::Html;

use super::{DIVISION, Matcher, collect_text, widest_subtree};

const INDENT: &str = "    ";

/// 正文文本不跨越嵌套的 div，也不含脚本与样式
const CONTENT_AVOID: Matcher = Matcher::Tags(&["div", "script", "style"]);

/// 取文本量最大的 `<div>` 作为正文，并整理成段落
pub fn extract_content(document: &Html) -> String {
    let text = widest_subtree(
        document.root_element(),
        DIVISION,
        |div| collect_text(div, CONTENT_AVOID).join("\n"),
        String::len,
    )
    .unwrap_or_default();
    normalize(&text)
}

fn is_padding(c: char) -> bool {
    c.is_whitespace() || c == '\u{a0}' || c == '\u{3000}'
}

/// 逐行去掉首尾空白与链接，丢弃空行，每行加缩进
pub fn normalize(text: &str) -> String {
    let mut finder = LinkFinder::new();
    finder.url_must_have_scheme(false);
    finder.kinds(&[LinkKind::Url]);

    let mut paragraphs = String::new();
    for line in text.lines() {
        let line = line.trim_matches(is_padding);

        let mut stripped = String::with_capacity(line.len());
        let mut last = 0;
        for link in finder.links(line) {
            stripped.push_str(&line[last..link.start()]);
            last = link.end();
        }
        stripped.push_str(&line[last..]);

        let stripped = stripped.trim_matches(is_padding);
        if stripped.is_empty() {
            continue;
        }
        paragraphs.push_str(INDENT);
        paragraphs.push_str(stripped);
        paragraphs.push('\n');
    }
    paragraphs
}
