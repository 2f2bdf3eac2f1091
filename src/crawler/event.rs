/// 抓取过程中的进度事件，通过可选的 mpsc 通道发送给调用方
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// 批次中第 `index` 个链接处理完毕
    PageFetched { index: usize, url: String, ok: bool },
    CatalogueExtracted { url: String, chapters: usize },
    CatalogueRejected { url: String, reason: String },
    /// 第 `turn` 轮正文抓取开始，`pending` 为待抓取章节数
    TurnStarted { turn: u32, pending: usize },
    Reconciled { sources: usize, chapters: usize },
}
