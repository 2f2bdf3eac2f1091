use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

static CONFIG_FILE: &str = "config";
static ENV_PREFIX: &str = "NOVEL_FETCH";

/// 全部配置，缺省文件或字段时使用默认值
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    pub crawl: CrawlConfig,
    pub reconcile: ReconcileConfig,
    pub output: OutputConfig,
}

impl Settings {
    /// 读取 `config.toml`（可选），再用 `NOVEL_FETCH__段__键` 环境变量覆盖
    pub fn load() -> Result<Self> {
        config::Config::builder()
            .add_source(
                config::File::with_name(CONFIG_FILE)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()
            .map_err(|e| anyhow::anyhow!("配置文件反序列化失败: {}", e))?
            .validate()
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Self>()
            .map_err(|e| anyhow::anyhow!("配置文件反序列化失败: {}", e))?
            .validate()
    }

    fn validate(self) -> Result<Self> {
        let ratio = self.reconcile.distance_ratio;
        if !(ratio.is_finite() && ratio > 0.0) {
            anyhow::bail!("reconcile.distance_ratio 必须是正数，当前为 {}", ratio);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub retry_pause_ms: u64,
    pub concurrency_limit: usize,
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub use_cookie: bool,
    /// 缺省时随机生成浏览器 UA
    pub user_agent: Option<String>,
    pub rate_limit: Option<RateLimit>,
    /// 站点 -> (名称 -> 值)，启动时写入 cookie jar
    pub cookies: HashMap<String, HashMap<String, String>>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_pause_ms: 5000,
            concurrency_limit: 5,
            timeout_secs: 30,
            max_redirects: 8,
            use_cookie: false,
            user_agent: None,
            rate_limit: None,
            cookies: HashMap::new(),
        }
    }
}

impl FetchConfig {
    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub num: u64,
    pub secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub max_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(".cache/html"),
            max_size_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub max_turns: u32,
    pub turn_pause_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_turns: 5,
            turn_pause_ms: 5000,
        }
    }
}

impl CrawlConfig {
    pub fn turn_pause(&self) -> Duration {
        Duration::from_millis(self.turn_pause_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// 编辑距离不超过较短目录长度的这个比例时视为同一部小说，必须大于 0
    pub distance_ratio: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            distance_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}
