use tower::BoxError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("无效的链接: {0}")]
    InvalidUrl(String),

    #[error("请求 {url} 失败: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("请求 {url} 返回状态码 {status}")]
    Status { url: String, status: u16 },

    #[error("无法以 {encoding} 解码 {url} 的页面")]
    Decode { url: String, encoding: &'static str },

    #[error("{url} 重试 {attempts} 次后仍然失败")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("{url} 中未找到有效目录")]
    InvalidSource { url: String },

    #[error("{url} 中未提取到正文")]
    EmptyContent { url: String },

    #[error("下载任务异常终止: {0}")]
    Task(String),

    #[error("没有可用的目录")]
    NoUsableCatalogue,
}

impl Error {
    /// 网络、状态码、解码错误可以在下一轮重试
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport { .. }
            | Error::Status { .. }
            | Error::Decode { .. }
            | Error::EmptyContent { .. }
            | Error::Task(_) => true,
            Error::Exhausted { source, .. } => source.is_transient(),
            Error::InvalidUrl(_) | Error::InvalidSource { .. } | Error::NoUsableCatalogue => false,
        }
    }
}
