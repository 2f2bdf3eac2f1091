pub mod cache;
pub mod decoder;
pub mod downloader;
pub mod event;
pub mod parser;
pub mod task;

pub use cache::PageCache;
pub use downloader::{CacheWrites, Downloader, FetchBatch, FetchOptions, FetchResult, Page};
pub use event::Event;
pub use parser::Parser;
pub use task::TaskManager;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::error::Error;
use crate::novel::Catalogue;
use crate::reconcile::Reconciler;

pub struct NovelCrawler {
    parser: Parser,
    downloader: Downloader,
    reconciler: Reconciler,
    use_cookie: bool,
    max_turns: u32,
    turn_pause: Duration,
    events: Option<UnboundedSender<Event>>,
}

impl NovelCrawler {
    pub async fn new(settings: &Settings) -> Result<Self> {
        let cache = if settings.cache.enabled {
            PageCache::open(&settings.cache.dir, settings.cache.max_size_bytes).await
        } else {
            PageCache::disabled()
        };

        Ok(Self {
            parser: Parser,
            downloader: Downloader::new(&settings.fetch, cache).await?,
            reconciler: Reconciler::new(settings.reconcile.distance_ratio),
            use_cookie: settings.fetch.use_cookie,
            max_turns: settings.crawl.max_turns,
            turn_pause: settings.crawl.turn_pause(),
            events: None,
        })
    }

    pub fn with_events(mut self, events: UnboundedSender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn options(&self, refresh: bool) -> FetchOptions {
        FetchOptions {
            refresh,
            redirect: true,
            use_cookie: self.use_cookie,
            events: self.events.clone(),
        }
    }

    /// 目录页总是重新下载，每个链接独立成败
    #[instrument(skip_all)]
    pub async fn catalogues(&self, urls: &[String]) -> Vec<Result<Catalogue, Error>> {
        info!("正在获取 {} 个目录页", urls.len());
        let batch = self.downloader.fetch_many(urls, &self.options(true)).await;
        batch.writes.wait().await;

        batch
            .results
            .into_iter()
            .map(|result| {
                let catalogue = result
                    .body
                    .and_then(|page| self.parser.catalogue(&page.html, &page.location));
                match &catalogue {
                    Ok(catalogue) => self.emit(Event::CatalogueExtracted {
                        url: result.url,
                        chapters: catalogue.len(),
                    }),
                    Err(e) => {
                        warn!("目录 {} 不可用: {}", result.url, e);
                        self.emit(Event::CatalogueRejected {
                            url: result.url,
                            reason: e.to_string(),
                        });
                    }
                }
                catalogue
            })
            .collect()
    }

    /// 分轮抓取所有未抓取的章节，返回实际进行的轮数。
    ///
    /// 第一轮可以使用缓存，之后的轮次都重新下载。
    #[instrument(skip_all)]
    pub async fn fill_contents(&self, catalogues: &mut [Catalogue]) -> u32 {
        let mut turns = 0;
        for turn in 1..=self.max_turns {
            let pending: Vec<(usize, usize)> = catalogues
                .iter()
                .enumerate()
                .flat_map(|(c, catalogue)| {
                    catalogue
                        .chapters()
                        .iter()
                        .enumerate()
                        .filter(|(_, chapter)| !chapter.fetched)
                        .map(move |(i, _)| (c, i))
                })
                .collect();
            if pending.is_empty() {
                break;
            }
            if turn > 1 {
                tokio::time::sleep(self.turn_pause).await;
            }

            turns = turn;
            info!("第 {} 轮抓取，待抓取章节 {} 个", turn, pending.len());
            self.emit(Event::TurnStarted {
                turn,
                pending: pending.len(),
            });

            let urls: Vec<String> = pending
                .iter()
                .map(|&(c, i)| catalogues[c].chapters()[i].url.clone())
                .collect();
            let batch = self.downloader.fetch_many(&urls, &self.options(turn > 1)).await;

            let mut failed = 0;
            for (&(c, i), result) in pending.iter().zip(batch.results) {
                let content = result
                    .body
                    .and_then(|page| self.parser.chapter_content(&page.html, &result.url));
                match content {
                    Ok(content) => catalogues[c].chapters_mut()[i].fill(content),
                    Err(e) => {
                        failed += 1;
                        debug!("章节 {} 抓取失败: {}", result.url, e);
                    }
                }
            }
            batch.writes.wait().await;
            info!("第 {} 轮结束，失败 {} 个", turn, failed);
        }

        let missing: usize = catalogues.iter().map(Catalogue::pending).sum();
        if missing > 0 {
            warn!("{} 轮后仍有 {} 个章节未抓取成功", turns, missing);
        }
        turns
    }

    /// 目录 -> 校验 -> 正文 -> 合并
    #[instrument(skip_all)]
    pub async fn harvest(&self, urls: &[String]) -> Result<Catalogue, Error> {
        let catalogues: Vec<Catalogue> = self
            .catalogues(urls)
            .await
            .into_iter()
            .filter_map(Result::ok)
            .collect();
        info!("{} 个目录页中 {} 个可用", urls.len(), catalogues.len());

        let mut catalogues = self.reconciler.validate(catalogues);
        self.fill_contents(&mut catalogues).await;

        let sources = catalogues.len();
        let merged = self.reconciler.merge_all(catalogues)?;
        self.emit(Event::Reconciled {
            sources,
            chapters: merged.len(),
        });
        Ok(merged)
    }

    /// 退出前等待缓存写入完成
    pub async fn shutdown(&self) {
        self.downloader.flush().await;
    }
}
