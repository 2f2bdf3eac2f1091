#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub name: String,    // 章节名，去重与合并的依据
    pub url: String,     // 章节页面的绝对链接
    pub content: String, // 抓取前为空
    pub fetched: bool,
}

impl Chapter {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            content: String::new(),
            fetched: false,
        }
    }

    /// 写入正文，仅在抓取成功时调用一次
    pub fn fill(&mut self, content: String) {
        self.content = content;
        self.fetched = true;
    }
}
