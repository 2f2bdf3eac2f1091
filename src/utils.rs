use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NovelRequest {
    pub name: String,
    pub author: Option<String>,
    /// 目录页链接，最可信的在前
    pub sources: Vec<String>,
}

#[instrument]
pub fn get_user_input() -> Result<NovelRequest> {
    read_request(&mut io::stdin().lock())
}

fn prompt(input: &mut impl BufRead, message: &str) -> Result<String> {
    println!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

pub fn read_request(input: &mut impl BufRead) -> Result<NovelRequest> {
    let name = prompt(input, "请输入小说名: ")?;
    if name.is_empty() {
        anyhow::bail!("小说名不能为空");
    }
    let author = prompt(input, "请输入作者(可留空): ")?;
    let sources = prompt(input, "请输入目录页链接(以空格分割): ")?;
    debug!("用户输入: {} {} {}", name, author, sources);

    let sources: Vec<String> = sources.split_whitespace().map(|s| s.to_owned()).collect();
    if sources.is_empty() {
        anyhow::bail!("至少需要一个目录页链接");
    }
    Ok(NovelRequest {
        name,
        author: (!author.is_empty()).then_some(author),
        sources,
    })
}

pub fn format_elapsed(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    if total_ms >= 60000 {
        // 超过1分钟：显示分秒
        let mins = total_ms / 60000;
        let secs = (total_ms % 60000) / 1000;
        let ms_remaining = total_ms % 1000;
        if ms_remaining > 0 {
            format!("{}分{}秒{}毫秒", mins, secs, ms_remaining)
        } else {
            format!("{}分{}秒", mins, secs)
        }
    } else if total_ms >= 1000 {
        let secs = total_ms / 1000;
        let ms_remaining = total_ms % 1000;
        if ms_remaining > 0 {
            format!("{}秒{}毫秒", secs, ms_remaining)
        } else {
            format!("{}秒", secs)
        }
    } else {
        format!("{}毫秒", total_ms)
    }
}

#[instrument]
pub fn display_elapsed_time(duration: Duration) {
    info!("✅ 抓取完成！耗时: {}", format_elapsed(duration));
}
