use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, instrument};

use crate::novel::catalogue::Catalogue;

static PROLOGUE: &str = "本文件由 novel-fetch 自动生成，文本版权归原作者所有。\n";

/// 未能抓取的章节以此占位，保证章节顺序与编号不变
pub static MISSING_CONTENT: &str = "    本章内容暂缺\n";

#[derive(Debug, Clone)]
pub struct NovelInfo {
    pub name: String,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TextWriter {
    output_dir: PathBuf,
}

impl TextWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn render(&self, catalogue: &Catalogue, info: &NovelInfo) -> String {
        let mut novel = String::new();

        novel.push_str(PROLOGUE);
        novel.push_str(&format!("书名：{}\n", info.name));
        if let Some(author) = &info.author {
            novel.push_str(&format!("作者：{}\n", author));
        }
        novel.push_str(&format!(
            "生成日期：{}\n",
            chrono::Local::now().format("%Y-%m-%d")
        ));

        for chapter in catalogue.chapters() {
            novel.push('\n');
            novel.push_str(&chapter.name);
            novel.push('\n');
            if chapter.fetched {
                novel.push_str(&chapter.content);
            } else {
                novel.push_str(MISSING_CONTENT);
            }
        }
        novel
    }

    #[instrument(skip_all)]
    pub async fn write(&self, catalogue: &Catalogue, info: &NovelInfo) -> Result<PathBuf> {
        info!("正在写入小说: {}", info.name);
        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("创建输出目录失败: {}", self.output_dir.display()))?;

        let path = self.output_dir.join(format!("{}.txt", safe_file_name(&info.name)));
        fs::write(&path, self.render(catalogue, info))
            .await
            .with_context(|| format!("写入文件失败: {}", path.display()))?;

        info!("小说已保存到: {}", path.display());
        Ok(path)
    }
}

fn safe_file_name(name: &str) -> String {
    let name = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
        .collect::<String>();
    if name.is_empty() { "novel".to_owned() } else { name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::novel::Chapter;

    fn info() -> NovelInfo {
        NovelInfo {
            name: "测试小说".into(),
            author: Some("佚名".into()),
        }
    }

    #[test]
    fn unfetched_chapters_render_a_placeholder() {
        let mut first = Chapter::new("第一章", "http://a.test/1");
        first.fill("    天色已晚。\n".into());
        let second = Chapter::new("第二章", "http://a.test/2");
        let catalogue = Catalogue::new("http://a.test/", vec![first, second]);

        let text = TextWriter::new(PathBuf::from(".")).render(&catalogue, &info());

        assert!(text.contains("作者：佚名"));
        let first_at = text.find("第一章").unwrap();
        let second_at = text.find("第二章").unwrap();
        assert!(first_at < second_at);
        assert!(text[first_at..second_at].contains("天色已晚"));
        assert!(text[second_at..].contains(MISSING_CONTENT));
    }

    #[tokio::test]
    async fn write_creates_the_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let catalogue = Catalogue::new("http://a.test/", vec![Chapter::new("序", "http://a.test/0")]);
        let info = NovelInfo {
            name: "a/b".into(),
            author: None,
        };

        let path = TextWriter::new(dir.path().join("out"))
            .write(&catalogue, &info)
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "a_b.txt");
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("书名：a/b"));
        assert!(!written.contains("作者："));
    }
}
