use std::collections::HashMap;

use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

use super::{ANCHOR, DIVISION, Matcher, collect_under, inner_text, widest_subtree};
use crate::novel::{Catalogue, Chapter};

const DEFINITION_LIST: Matcher = Matcher::Tags(&["dl"]);
const UNORDERED_LIST: Matcher = Matcher::Tags(&["ul"]);

/// 目录定位策略，按 `CHAIN` 的顺序尝试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `<dl>` 下的链接
    DefinitionList,
    /// `<ul>` 下的链接
    UnorderedList,
    /// 直接包含链接最多的 `<div>`
    WidestDivision,
}

impl Strategy {
    pub const CHAIN: [Strategy; 3] = [
        Strategy::DefinitionList,
        Strategy::UnorderedList,
        Strategy::WidestDivision,
    ];

    pub fn anchors<'a>(self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        match self {
            Strategy::DefinitionList => anchors_within(root, DEFINITION_LIST),
            Strategy::UnorderedList => anchors_within(root, UNORDERED_LIST),
            Strategy::WidestDivision => widest_subtree(
                root,
                DIVISION,
                |div| collect_under(div, ANCHOR, DIVISION),
                Vec::len,
            )
            .unwrap_or_default(),
        }
    }

    /// 该策略下带 href 的链接
    pub fn links(self, root: ElementRef) -> Vec<Link> {
        self.anchors(root).into_iter().filter_map(Link::parse).collect()
    }
}

/// 有某个 `container` 祖先的链接，即选择器 `container a`
fn anchors_within<'a>(root: ElementRef<'a>, container: Matcher) -> Vec<ElementRef<'a>> {
    collect_under(root, ANCHOR, Matcher::Nothing)
        .into_iter()
        .filter(|a| {
            a.ancestors()
                .filter_map(ElementRef::wrap)
                .any(|e| container.matches(e))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub href: String,
}

impl Link {
    fn parse(anchor: ElementRef) -> Option<Self> {
        let href = anchor.value().attr("href")?.trim();
        if href.is_empty() {
            return None;
        }
        Some(Self {
            text: inner_text(anchor).trim().to_owned(),
            href: href.to_owned(),
        })
    }
}

/// 依次尝试各策略，取第一个有结果的，再解析成去重后的目录
pub fn extract_catalogue(document: &Html, base_url: &Url) -> Option<Catalogue> {
    let root = document.root_element();
    let (strategy, links) = Strategy::CHAIN
        .into_iter()
        .map(|strategy| (strategy, strategy.links(root)))
        .find(|(_, links)| !links.is_empty())?;
    debug!("目录策略 {:?} 命中 {} 个链接", strategy, links.len());

    let raw = links
        .into_iter()
        .filter(|link| !link.text.is_empty())
        .filter_map(|link| {
            let url = base_url.join(&link.href).ok()?;
            Some(Chapter::new(link.text, url.to_string()))
        })
        .collect();

    let chapters = dedup(raw);
    if chapters.is_empty() {
        return None;
    }
    Some(Catalogue::new(base_url.as_str(), chapters))
}

/// 只保留恰好出现一次的章节名。
///
/// 镜像站常在目录前重复“最新章节”，末尾也可能重复，出现多次的名字全部丢弃。
pub fn dedup(raw: Vec<Chapter>) -> Vec<Chapter> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for chapter in &raw {
        *counts.entry(chapter.name.as_str()).or_default() += 1;
    }
    let keep: Vec<bool> = raw.iter().map(|c| counts[c.name.as_str()] == 1).collect();

    raw.into_iter()
        .zip(keep)
        .filter_map(|(chapter, keep)| keep.then_some(chapter))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Option<Catalogue> {
        let base = Url::parse("http://book.test/novel/").unwrap();
        extract_catalogue(&Html::parse_document(html), &base)
    }

    fn pairs(catalogue: &Catalogue) -> Vec<(&str, &str)> {
        catalogue
            .chapters()
            .iter()
            .map(|c| (c.name.as_str(), c.url.as_str()))
            .collect()
    }

    #[test]
    fn definition_list_drops_every_repeated_name() {
        let catalogue = extract(
            r#"<dl>
                <dd><a href="/c1">Ch1</a></dd>
                <dd><a href="/c2">Ch2</a></dd>
                <dd><a href="/c1">Ch1</a></dd>
            </dl>"#,
        )
        .unwrap();
        assert_eq!(pairs(&catalogue), vec![("Ch2", "http://book.test/c2")]);
        assert_eq!(catalogue.source, "http://book.test/novel/");
    }

    #[test]
    fn latest_chapter_banner_is_removed() {
        let catalogue = extract(
            r#"<dl>
                <dt>最新章节</dt>
                <dd><a href="3.html">第三章</a></dd>
                <dt>正文</dt>
                <dd><a href="1.html"> 第一章 </a></dd>
                <dd><a href="2.html">第二章</a></dd>
                <dd><a href="3.html">第三章</a></dd>
            </dl>"#,
        )
        .unwrap();
        assert_eq!(
            pairs(&catalogue),
            vec![
                ("第一章", "http://book.test/novel/1.html"),
                ("第二章", "http://book.test/novel/2.html"),
            ]
        );
    }

    #[test]
    fn unordered_list_is_the_second_choice() {
        let catalogue = extract(
            r#"<div><a href="/home">首页</a></div>
               <ul><li><a href="a">A</a></li><li><a href="b">B</a></li></ul>"#,
        )
        .unwrap();
        assert_eq!(catalogue.names(), vec!["A", "B"]);
    }

    #[test]
    fn definition_list_wins_over_unordered_list() {
        let catalogue = extract(
            r#"<ul><li><a href="/nav">导航</a></li></ul>
               <dl><dd><a href="x">X</a></dd></dl>"#,
        )
        .unwrap();
        assert_eq!(catalogue.names(), vec!["X"]);
    }

    #[test]
    fn falls_back_to_the_widest_division() {
        let catalogue = extract(
            r#"<div class="nav"><a href="/">首页</a><a href="/top">排行</a></div>
               <div class="list">
                 <p><a href="1">一</a></p><p><a href="2">二</a></p><p><a href="3">三</a></p>
                 <div class="ad"><a href="/ad">广告</a></div>
               </div>"#,
        )
        .unwrap();
        assert_eq!(catalogue.names(), vec!["一", "二", "三"]);
    }

    #[test]
    fn links_without_text_or_href_are_dropped() {
        let catalogue = extract(
            r#"<dl>
                <dd><a href="1">第一章</a></dd>
                <dd><a href="">空链接</a></dd>
                <dd><a>无链接</a></dd>
                <dd><a href="4"><img src="x.png"></a></dd>
                <dd><a href="http://[::1">坏链接</a></dd>
            </dl>"#,
        )
        .unwrap();
        assert_eq!(catalogue.names(), vec!["第一章"]);
    }

    #[test]
    fn page_without_links_is_invalid() {
        assert!(extract("<html><body><p>空</p></body></html>").is_none());
    }

    #[test]
    fn page_with_only_duplicates_is_invalid() {
        assert!(extract(r#"<dl><a href="1">A</a><a href="1">A</a></dl>"#).is_none());
    }

    #[test]
    fn dedup_law() {
        let raw = vec![
            Chapter::new("一", "http://a.test/1"),
            Chapter::new("二", "http://a.test/2"),
            Chapter::new("一", "http://a.test/other"),
            Chapter::new("三", "http://a.test/3"),
        ];
        let names: Vec<String> = dedup(raw).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["二", "三"]);
    }
}
