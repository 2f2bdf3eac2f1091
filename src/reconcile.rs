//! 多个镜像目录的校验与合并。
//!
//! 先按章节名序列的编辑距离把目录分组，只留下成员最多的一组；
//! 抓取正文后再沿编辑脚本的对齐顺序合并，同名章节按正文质量取舍。

pub mod diff;

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, instrument};

use crate::error::Error;
use crate::novel::{Catalogue, Chapter};

const LENGTH_RATIO: f64 = 0.8;
const SHORT_LINE_CHARS: usize = 10;
const NOISE_SYMBOLS: [&str; 17] = [
    "&", ";", "(", ")", "~", "@", "#", "%", "^", "*", "-", "+", "http", ":", "/", "<", ">",
];

/// 相似目录组成的簇
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// 成员在输入中的下标，按加入顺序
    pub members: Vec<usize>,
    /// 成员章节数之和
    pub chapters: usize,
}

/// 按输入顺序贪心分簇：与簇内每个成员的距离都不超过
/// `min(两者长度) × ratio` 时加入该簇，否则新建一个簇
pub fn partition(sequences: &[Vec<&str>], ratio: f64) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for (i, sequence) in sequences.iter().enumerate() {
        let similar = |j: &usize| {
            let other = &sequences[*j];
            let limit = sequence.len().min(other.len()) as f64 * ratio;
            diff::distance(sequence, other) as f64 <= limit
        };
        match clusters.iter_mut().find(|c| c.members.iter().all(similar)) {
            Some(cluster) => {
                cluster.members.push(i);
                cluster.chapters += sequence.len();
            }
            None => clusters.push(Cluster {
                members: vec![i],
                chapters: sequence.len(),
            }),
        }
    }
    clusters
}

/// 比较两个同名章节的正文，返回质量更好的一方，无法区分时返回 `u`
pub fn content_quality_over<'a>(u: &'a Chapter, v: &'a Chapter) -> &'a Chapter {
    // 长度
    let (u_len, v_len) = (u.content.chars().count() as f64, v.content.chars().count() as f64);
    if u_len < v_len * LENGTH_RATIO {
        return v;
    }
    if v_len < u_len * LENGTH_RATIO {
        return u;
    }

    // 短行
    let short_lines = |s: &str| {
        s.lines()
            .filter(|line| line.chars().count() < SHORT_LINE_CHARS)
            .count()
    };
    let (u_short, v_short) = (short_lines(&u.content), short_lines(&v.content));
    if u_short != v_short {
        return if u_short < v_short { u } else { v };
    }

    // 杂乱符号
    let noise = |s: &str| NOISE_SYMBOLS.iter().map(|sym| s.matches(sym).count()).sum::<usize>();
    let (u_noise, v_noise) = (noise(&u.content), noise(&v.content));
    if v_noise < u_noise {
        return v;
    }
    u
}

#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    ratio: f64,
}

impl Reconciler {
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    /// 只保留成员最多的簇，数量相同时取章节总数多的，再相同时取先建立的
    #[instrument(skip_all)]
    pub fn validate(&self, catalogues: Vec<Catalogue>) -> Vec<Catalogue> {
        if catalogues.len() <= 1 {
            return catalogues;
        }

        let sequences: Vec<Vec<&str>> = catalogues.iter().map(Catalogue::names).collect();
        let clusters = partition(&sequences, self.ratio);
        debug!("{} 个目录分为 {} 组", catalogues.len(), clusters.len());

        let mut best = &clusters[0];
        for cluster in &clusters[1..] {
            if (cluster.members.len(), cluster.chapters) > (best.members.len(), best.chapters) {
                best = cluster;
            }
        }
        let keep: HashSet<usize> = best.members.iter().copied().collect();
        info!("采用 {} 个相互一致的目录", keep.len());

        catalogues
            .into_iter()
            .enumerate()
            .filter_map(|(i, catalogue)| keep.contains(&i).then_some(catalogue))
            .collect()
    }

    /// 沿编辑脚本对齐两个目录，单侧章节直接保留，同名章节取正文质量高者
    pub fn merge(&self, a: &Catalogue, b: &Catalogue) -> Catalogue {
        let (a_names, b_names) = (a.names(), b.names());
        debug!(
            "合并 {} 与 {}，共有章节 {} 个",
            a.source,
            b.source,
            diff::common(&a_names, &b_names).len()
        );

        let a_map: HashMap<&str, &Chapter> =
            a.chapters().iter().map(|c| (c.name.as_str(), c)).collect();
        let b_map: HashMap<&str, &Chapter> =
            b.chapters().iter().map(|c| (c.name.as_str(), c)).collect();

        let mut emitted = HashSet::new();
        let mut chapters = Vec::with_capacity(a.len().max(b.len()));
        for name in diff::integrate(&a_names, &b_names) {
            // 顺序调换过的章节会被对齐两次，只取第一次
            if !emitted.insert(name) {
                continue;
            }
            let chosen = match (a_map.get(name), b_map.get(name)) {
                (Some(u), Some(v)) => content_quality_over(u, v),
                (Some(c), None) | (None, Some(c)) => *c,
                (None, None) => continue,
            };
            chapters.push(chosen.clone());
        }
        Catalogue::new(a.source.clone(), chapters)
    }

    #[instrument(skip_all)]
    pub fn merge_all(&self, catalogues: Vec<Catalogue>) -> Result<Catalogue, Error> {
        let mut catalogues = catalogues.into_iter();
        let first = catalogues.next().ok_or(Error::NoUsableCatalogue)?;
        let merged = catalogues.fold(first, |acc, next| self.merge(&acc, &next));
        if merged.is_empty() {
            return Err(Error::NoUsableCatalogue);
        }
        info!("合并后共 {} 章，{} 章缺少正文", merged.len(), merged.pending());
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue(source: &str, names: &[&str]) -> Catalogue {
        let chapters = names
            .iter()
            .map(|name| Chapter::new(*name, format!("{source}{name}")))
            .collect();
        Catalogue::new(source, chapters)
    }

    fn chapter(name: &str, content: &str) -> Chapter {
        let mut chapter = Chapter::new(name, "http://a.test/x");
        chapter.fill(content.to_owned());
        chapter
    }

    #[test]
    fn dissimilar_catalogues_form_singletons_and_the_first_wins() {
        let reconciler = Reconciler::new(0.5);
        let kept = reconciler.validate(vec![
            catalogue("http://a.test/", &["A", "B", "C"]),
            catalogue("http://b.test/", &["A", "B", "D"]),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source, "http://a.test/");
    }

    #[test]
    fn the_largest_cluster_survives() {
        let names: Vec<String> = (1..=10).map(|i| format!("第{i}章")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let outlier = catalogue("http://spam.test/", &["首页", "排行", "登录"]);
        let mirror_a = catalogue("http://a.test/", &names);
        let mirror_b = catalogue("http://b.test/", &names[..9]);

        let kept = Reconciler::new(0.5).validate(vec![outlier, mirror_a, mirror_b]);
        let sources: Vec<&str> = kept.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["http://a.test/", "http://b.test/"]);
    }

    #[test]
    fn equal_sized_clusters_prefer_more_chapters() {
        let kept = Reconciler::new(0.5).validate(vec![
            catalogue("http://a.test/", &["A", "B"]),
            catalogue("http://b.test/", &["X", "Y", "Z"]),
        ]);
        assert_eq!(kept[0].source, "http://b.test/");
    }

    #[test]
    fn tight_ratio_only_groups_identical_sequences() {
        let clusters = partition(&[vec!["A", "B"], vec!["A", "B"], vec!["A", "C"]], 0.1);
        assert_eq!(clusters[0].members, vec![0, 1]);
        assert_eq!(clusters[1].members, vec![2]);
    }

    #[test]
    fn single_catalogue_is_returned_unchanged() {
        let only = catalogue("http://a.test/", &["A", "B"]);
        assert_eq!(Reconciler::new(0.5).validate(vec![only.clone()]), vec![only]);
        assert!(Reconciler::new(0.5).validate(Vec::new()).is_empty());
    }

    #[test]
    fn longer_content_wins() {
        let long = chapter("A", &"字".repeat(500));
        let short = chapter("A", &"字".repeat(100));
        assert_eq!(content_quality_over(&short, &long).content, long.content);
        assert_eq!(content_quality_over(&long, &short).content, long.content);

        let a = Catalogue::new("http://a.test/", vec![short]);
        let b = Catalogue::new("http://b.test/", vec![long.clone()]);
        let merged = Reconciler::new(0.5).merge(&a, &b);
        assert_eq!(merged.chapters()[0].content, long.content);
        assert_eq!(merged.source, "http://a.test/");
    }

    #[test]
    fn fewer_short_lines_win() {
        let choppy = chapter("A", "    一二三\n    四五六\n    七八九十一二三四五六七八\n");
        let smooth = chapter("A", "    一二三四五六七八九十一二\n    三四五六七八九十一二三\n");
        assert_eq!(content_quality_over(&choppy, &smooth), &smooth);
    }

    #[test]
    fn fewer_noise_symbols_win() {
        let noisy = chapter("A", "    天色已晚(广告)请收藏\n");
        let clean = chapter("A", "    天色已晚，广告，请收藏\n");
        assert_eq!(content_quality_over(&noisy, &clean), &clean);
        assert_eq!(content_quality_over(&clean, &noisy), &clean);
    }

    #[test]
    fn indistinguishable_content_keeps_the_first() {
        let u = chapter("A", "    同样的正文内容同样的\n");
        let v = chapter("A", "    相同的正文内容相同的\n");
        assert!(std::ptr::eq(content_quality_over(&u, &v), &u));
        assert!(std::ptr::eq(content_quality_over(&u, &u), &u));

        let empty = Chapter::new("A", "http://a.test/x");
        assert!(std::ptr::eq(content_quality_over(&empty, &empty.clone()), &empty));
    }

    #[test]
    fn merge_with_itself_is_identity() {
        let mut a = catalogue("http://a.test/", &["序", "第一章", "第二章"]);
        a.chapters_mut()[1].fill("    正文\n".into());
        let merged = Reconciler::new(0.5).merge(&a, &a);
        assert_eq!(merged, a);
    }

    #[test]
    fn merge_interleaves_one_sided_chapters() {
        let a = catalogue("http://a.test/", &["a", "b", "c", "f", "g", "h"]);
        let b = catalogue("http://b.test/", &["c", "d", "e", "f", "h"]);
        let merged = Reconciler::new(0.5).merge(&a, &b);
        assert_eq!(merged.names(), vec!["a", "b", "c", "d", "e", "f", "g", "h"]);
        assert_eq!(merged.chapters()[3].url, "http://b.test/d");
        assert_eq!(merged.chapters()[2].url, "http://a.test/c");
    }

    #[test]
    fn reordered_chapters_are_emitted_once() {
        let a = catalogue("http://a.test/", &["1", "2", "3"]);
        let b = catalogue("http://b.test/", &["1", "3", "2"]);
        let merged = Reconciler::new(0.5).merge(&a, &b);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.names()[0], "1");
    }

    #[test]
    fn merge_all_rejects_empty_input() {
        let reconciler = Reconciler::new(0.5);
        assert!(matches!(reconciler.merge_all(Vec::new()), Err(Error::NoUsableCatalogue)));
        assert!(matches!(
            reconciler.merge_all(vec![Catalogue::new("http://a.test/", Vec::new())]),
            Err(Error::NoUsableCatalogue)
        ));

        let merged = reconciler
            .merge_all(vec![
                catalogue("http://a.test/", &["1", "2"]),
                catalogue("http://b.test/", &["2", "3"]),
                catalogue("http://c.test/", &["3", "4"]),
            ])
            .unwrap();
        assert_eq!(merged.names(), vec!["1", "2", "3", "4"]);
    }
}
