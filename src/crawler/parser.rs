use scraper::Html;
use tracing::{info, instrument};
use url::Url;

use crate::error::Error;
use crate::extractor::{extract_catalogue, extract_content};
use crate::novel::Catalogue;

#[derive(Debug, Clone, Copy, Default)]
pub struct Parser;

impl Parser {
    /// 目录页解析，`location` 为页面的实际地址，相对链接据此补全
    #[instrument(skip_all)]
    pub fn catalogue(&self, html: &str, location: &str) -> Result<Catalogue, Error> {
        let base_url = Url::parse(location).map_err(|_| Error::InvalidUrl(location.to_owned()))?;
        let document = Html::parse_document(html);
        let catalogue = extract_catalogue(&document, &base_url).ok_or_else(|| Error::InvalidSource {
            url: location.to_owned(),
        })?;
        info!("{} 的目录包含 {} 章", location, catalogue.len());
        Ok(catalogue)
    }

    /// 章节正文，提取不到任何文字视为失败
    pub fn chapter_content(&self, html: &str, url: &str) -> Result<String, Error> {
        let content = extract_content(&Html::parse_document(html));
        if content.is_empty() {
            return Err(Error::EmptyContent { url: url.to_owned() });
        }
        Ok(content)
    }
}
