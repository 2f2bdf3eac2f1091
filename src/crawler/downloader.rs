use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use tokio::sync::{mpsc, oneshot};
use tower::limit::RateLimitLayer;
use tower::util::BoxCloneService;
use tower::{BoxError, ServiceBuilder, ServiceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::config::FetchConfig;
use crate::crawler::cache::PageCache;
use crate::crawler::decoder;
use crate::crawler::event::Event;
use crate::crawler::task::TaskManager;
use crate::error::Error;

type HttpService = BoxCloneService<reqwest::Request, Fetched, BoxError>;

/// 读完正文的响应
struct Fetched {
    status: StatusCode,
    content_type: Option<String>,
    body: Bytes,
}

// 正文读取在闸门内完成，并发槽位一直占用到响应体读完
async fn read_body(response: reqwest::Response) -> Result<Fetched, reqwest::Error> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let body = response.bytes().await?;
    Ok(Fetched {
        status,
        content_type,
        body,
    })
}

const BUFFER_SIZE: usize = 1024;

static SCRIPT_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.location(?:\.href)?\s*=\s*(?:"([^"]+)"|'([^']+)')"#)
        .expect("无法创建跳转脚本正则")
});

static META_REFRESH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s[^>]*content\s*=\s*["']\s*\d+\s*;\s*url\s*=\s*['"]?([^"'>\s]+)"#)
        .expect("无法创建 refresh 正则")
});

/// 补全协议，缺省为 `http://`
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_owned()
    } else {
        format!("http://{}", url)
    }
}

/// 页面中的脚本跳转或 meta refresh 目标
pub fn redirect_target(html: &str) -> Option<&str> {
    if let Some(caps) = SCRIPT_REDIRECT.captures(html) {
        return caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
    }
    META_REFRESH
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// 跳过缓存直接请求
    pub refresh: bool,
    /// 跟随页面内的脚本跳转
    pub redirect: bool,
    /// 先请求一次获取 cookie，再带着 cookie 请求
    pub use_cookie: bool,
    pub events: Option<mpsc::UnboundedSender<Event>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 跳转结束后的实际地址
    pub location: String,
    pub html: String,
}

#[derive(Debug)]
pub struct FetchResult {
    /// 调用方传入的原始链接
    pub url: String,
    pub body: Result<Page, Error>,
}

impl FetchResult {
    pub fn is_ok(&self) -> bool {
        self.body.is_ok()
    }

    pub fn error(&self) -> Option<&Error> {
        self.body.as_ref().err()
    }
}

/// 本批次发起的缓存写入，每个网络成功的页面一个
#[derive(Debug, Default)]
pub struct CacheWrites(Vec<oneshot::Receiver<()>>);

impl CacheWrites {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub async fn wait(self) {
        for write in self.0 {
            let _ = write.await;
        }
    }
}

#[derive(Debug)]
pub struct FetchBatch {
    /// 与请求顺序一致
    pub results: Vec<FetchResult>,
    pub writes: CacheWrites,
}

/// 带缓存、重试与并发限制的页面下载器，克隆共享同一个准入闸门与缓存
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    gate: Arc<Mutex<HttpService>>,
    cache: PageCache,
    max_attempts: u32,
    retry_pause: Duration,
    max_redirects: usize,
}

impl Downloader {
    pub async fn new(config: &FetchConfig, cache: PageCache) -> Result<Self> {
        let jar = Jar::default();
        for (site, cookies) in &config.cookies {
            let url = Url::parse(&normalize_url(site))
                .with_context(|| format!("cookie 站点地址无效: {}", site))?;
            for (name, value) in cookies {
                jar.add_cookie_str(&format!("{}={}", name, value), &url);
            }
        }

        let user_agent = match &config.user_agent {
            Some(ua) => ua.clone(),
            None => ua_generator::ua::spoof_ua().to_owned(),
        };
        debug!("User-Agent: {}", user_agent);

        let client = Client::builder()
            .cookie_provider(Arc::new(jar))
            .user_agent(user_agent)
            .timeout(config.timeout())
            .build()
            .context("创建 HTTP 客户端失败")?;

        let gate = ServiceBuilder::new()
            .boxed_clone()
            .buffer(BUFFER_SIZE)
            .option_layer(
                config
                    .rate_limit
                    .map(|r| RateLimitLayer::new(r.num, Duration::from_secs(r.secs))),
            )
            .concurrency_limit(config.concurrency_limit.max(1))
            .service(client.clone().and_then(read_body));

        Ok(Self {
            client,
            gate: Arc::new(Mutex::new(gate)),
            cache,
            max_attempts: config.max_attempts.max(1),
            retry_pause: config.retry_pause(),
            max_redirects: config.max_redirects,
        })
    }

    /// 每个请求都经过同一个闸门
    async fn send(&self, url: &str) -> Result<Fetched, Error> {
        let request = self.client.get(url).build().map_err(|e| Error::Transport {
            url: url.to_owned(),
            source: e.into(),
        })?;
        let service = self
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        service.oneshot(request).await.map_err(|source| Error::Transport {
            url: url.to_owned(),
            source,
        })
    }

    async fn fetch_once(&self, url: &str, use_cookie: bool) -> Result<String, Error> {
        if use_cookie {
            // 只为拿到 cookie
            self.send(url).await?;
        }

        let fetched = self.send(url).await?;
        if !fetched.status.is_success() {
            return Err(Error::Status {
                url: url.to_owned(),
                status: fetched.status.as_u16(),
            });
        }
        decoder::decode(url, &fetched.body, fetched.content_type.as_deref())
    }

    async fn fetch_with_retry(&self, url: &str, use_cookie: bool) -> Result<String, Error> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url, use_cookie).await {
                Ok(html) => return Ok(html),
                Err(e) if attempt >= self.max_attempts || !e.is_transient() => {
                    error!("{} 重试 {} 次后仍然失败: {}", url, attempt, e);
                    return Err(Error::Exhausted {
                        url: url.to_owned(),
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(
                        "第 {} 次请求 {} 失败: {}，{} 毫秒后重试",
                        attempt,
                        url,
                        e,
                        self.retry_pause.as_millis()
                    );
                    tokio::time::sleep(self.retry_pause).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn follow_redirects(
        &self,
        mut location: Url,
        mut html: String,
        use_cookie: bool,
    ) -> Result<Page, Error> {
        let mut hops = 0;
        while let Some(target) = redirect_target(&html) {
            let Ok(next) = location.join(target) else {
                debug!("{} 中的跳转目标无法解析: {}", location, target);
                break;
            };
            if next == location {
                break;
            }
            if hops == self.max_redirects {
                warn!("{} 跳转次数超过 {}，停止跟随", location, self.max_redirects);
                break;
            }
            debug!("跳转: {} -> {}", location, next);
            html = self.fetch_with_retry(next.as_str(), use_cookie).await?;
            location = next;
            hops += 1;
        }
        Ok(Page {
            location: location.to_string(),
            html,
        })
    }

    /// 下载单个页面，网络成功时同时返回缓存写入的回执
    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> (Result<Page, Error>, Option<oneshot::Receiver<()>>) {
        let normalized = normalize_url(url);
        let location = match Url::parse(&normalized) {
            Ok(location) => location,
            Err(_) => return (Err(Error::InvalidUrl(url.to_owned())), None),
        };

        if !options.refresh {
            if let Some(html) = self.cache.get(&normalized).await {
                let page = Page {
                    location: location.to_string(),
                    html,
                };
                return (Ok(page), None);
            }
        }

        let page = match self.fetch_with_retry(location.as_str(), options.use_cookie).await {
            Ok(html) if options.redirect => {
                self.follow_redirects(location, html, options.use_cookie)
                    .await
            }
            Ok(html) => Ok(Page {
                location: location.to_string(),
                html,
            }),
            Err(e) => Err(e),
        };

        match page {
            Ok(page) => {
                let write = self.cache.put(&normalized, page.html.clone());
                (Ok(page), Some(write))
            }
            Err(e) => (Err(e), None),
        }
    }

    /// 并发下载一批页面，单个失败不影响其他页面
    #[instrument(skip_all)]
    pub async fn fetch_many(&self, urls: &[String], options: &FetchOptions) -> FetchBatch {
        info!("开始下载 {} 个页面", urls.len());
        let mut tasks = TaskManager::new();
        for (index, url) in urls.iter().enumerate() {
            let downloader = self.clone();
            let options = options.clone();
            let url = url.clone();
            tasks.spawn(async move {
                let (body, write) = downloader.fetch(&url, &options).await;
                if let Some(events) = &options.events {
                    let _ = events.send(Event::PageFetched {
                        index,
                        url: url.clone(),
                        ok: body.is_ok(),
                    });
                }
                (FetchResult { url, body }, write)
            });
        }

        let mut results = Vec::with_capacity(urls.len());
        let mut writes = Vec::new();
        for (url, joined) in urls.iter().zip(tasks.wait().await) {
            match joined {
                Ok((result, write)) => {
                    results.push(result);
                    writes.extend(write);
                }
                Err(e) => results.push(FetchResult {
                    url: url.clone(),
                    body: Err(e),
                }),
            }
        }

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!("下载完成，成功 {} 个，失败 {} 个", results.len() - failed, failed);
        FetchBatch {
            results,
            writes: CacheWrites(writes),
        }
    }

    /// 等待进程内所有缓存写入结束
    pub async fn flush(&self) {
        self.cache.flush().await;
    }
}
