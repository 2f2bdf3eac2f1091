use std::collections::HashSet;

use crate::novel::chapter::Chapter;

/// 单个来源的目录，章节顺序即阅读顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalogue {
    pub source: String,
    chapters: Vec<Chapter>,
}

impl Catalogue {
    /// 调用方保证章节名互不重复
    pub fn new(source: impl Into<String>, chapters: Vec<Chapter>) -> Self {
        debug_assert!(
            {
                let mut seen = HashSet::new();
                chapters.iter().all(|c| seen.insert(c.name.as_str()))
            },
            "目录中存在重复章节名"
        );
        Self {
            source: source.into(),
            chapters,
        }
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapters_mut(&mut self) -> &mut [Chapter] {
        &mut self.chapters
    }

    pub fn names(&self) -> Vec<&str> {
        self.chapters.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// 尚未抓取成功的章节数
    pub fn pending(&self) -> usize {
        self.chapters.iter().filter(|c| !c.fetched).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_counts_unfetched_chapters() {
        let mut catalogue = Catalogue::new(
            "http://a.test/book/",
            vec![
                Chapter::new("第一章", "http://a.test/book/1.html"),
                Chapter::new("第二章", "http://a.test/book/2.html"),
            ],
        );
        assert_eq!(catalogue.pending(), 2);

        catalogue.chapters_mut()[0].fill("    正文\n".into());
        assert_eq!(catalogue.pending(), 1);
        assert_eq!(catalogue.names(), vec!["第一章", "第二章"]);
    }
}
