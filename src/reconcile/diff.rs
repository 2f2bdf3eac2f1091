//! 基于 Myers 算法的最短编辑脚本，以整个元素（章节名）为粒度。

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// 两侧对齐的元素
    Keep,
    /// 仅出现在 `dst` 中
    Insert,
    /// 仅出现在 `src` 中
    Delete,
}

/// 把 `src` 变换为 `dst` 的最短插入/删除序列
pub fn shortest_edit_script<T: PartialEq>(src: &[T], dst: &[T]) -> Vec<Edit> {
    let n = src.len() as isize;
    let m = dst.len() as isize;
    let max = n + m;
    let offset = max + 1;
    let at = |k: isize| (k + offset) as usize;

    let mut v = vec![0isize; 2 * max as usize + 3];
    let mut trace = Vec::new();

    'search: for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
                v[at(k + 1)]
            } else {
                v[at(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && src[x as usize] == dst[y as usize] {
                x += 1;
                y += 1;
            }
            v[at(k)] = x;
            if x >= n && y >= m {
                break 'search;
            }
            k += 2;
        }
    }

    // 回溯
    let mut script = Vec::with_capacity(max as usize);
    let (mut x, mut y) = (n, m);
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let prev_k = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[at(prev_k)];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            script.push(Edit::Keep);
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            script.push(if x == prev_x { Edit::Insert } else { Edit::Delete });
        }
        x = prev_x;
        y = prev_y;
    }

    script.reverse();
    script
}

/// 插入与删除的总数
pub fn distance<T: PartialEq>(src: &[T], dst: &[T]) -> usize {
    shortest_edit_script(src, dst)
        .into_iter()
        .filter(|edit| *edit != Edit::Keep)
        .count()
}

/// 按对齐顺序合并两侧，两侧共有的元素只出现一次
pub fn integrate<T: Clone + PartialEq>(src: &[T], dst: &[T]) -> Vec<T> {
    let (mut i, mut j) = (0, 0);
    let mut merged = Vec::with_capacity(src.len().max(dst.len()));
    for edit in shortest_edit_script(src, dst) {
        match edit {
            Edit::Keep => {
                merged.push(src[i].clone());
                i += 1;
                j += 1;
            }
            Edit::Insert => {
                merged.push(dst[j].clone());
                j += 1;
            }
            Edit::Delete => {
                merged.push(src[i].clone());
                i += 1;
            }
        }
    }
    merged
}

/// 两侧对齐的元素
pub fn common<T: Clone + PartialEq>(src: &[T], dst: &[T]) -> Vec<T> {
    let mut i = 0;
    let mut kept = Vec::new();
    for edit in shortest_edit_script(src, dst) {
        match edit {
            Edit::Keep => {
                kept.push(src[i].clone());
                i += 1;
            }
            Edit::Delete => i += 1,
            Edit::Insert => {}
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    #[test]
    fn distance_counts_insertions_and_deletions() {
        let cases = [
            ("a b c e", "b c d e", 2),
            ("a c e", "b c d e", 3),
            ("a b c f g h", "c d e f h", 5),
            ("", "a b", 2),
            ("a b", "", 2),
            ("", "", 0),
        ];
        for (src, dst, expected) in cases {
            assert_eq!(distance(&seq(src), &seq(dst)), expected, "{src} -> {dst}");
        }
    }

    #[test]
    fn distance_is_zero_on_itself_and_symmetric() {
        let a = seq("序 第一章 第二章 第三章 番外");
        let b = seq("第一章 第三章 第四章 番外 后记");
        assert_eq!(distance(&a, &a), 0);
        assert_eq!(distance(&a, &b), distance(&b, &a));
    }

    #[test]
    fn integrate_keeps_relative_order_of_both_sides() {
        let cases = [
            ("a b c e", "b c d e", "a b c d e"),
            ("a c e", "b c d e", "a b c d e"),
            ("a b c f g h", "c d e f h", "a b c d e f g h"),
        ];
        for (src, dst, expected) in cases {
            assert_eq!(integrate(&seq(src), &seq(dst)), seq(expected), "{src} + {dst}");
        }
    }

    #[test]
    fn common_returns_aligned_elements() {
        let cases = [
            ("a b c e", "b c d e", "b c e"),
            ("a c e", "b c d e", "c e"),
            ("a b c f g h", "c d e f h", "c f h"),
        ];
        for (src, dst, expected) in cases {
            assert_eq!(common(&seq(src), &seq(dst)), seq(expected), "{src} & {dst}");
        }
    }

    #[test]
    fn script_replays_src_into_dst() {
        let src = seq("a b c a b b a");
        let dst = seq("c b a b a c");
        let script = shortest_edit_script(&src, &dst);
        assert_eq!(script.iter().filter(|e| **e == Edit::Keep).count(), 4);

        let (mut i, mut j) = (0, 0);
        let mut replay = Vec::new();
        for edit in script {
            match edit {
                Edit::Keep => {
                    replay.push(src[i]);
                    i += 1;
                    j += 1;
                }
                Edit::Insert => {
                    replay.push(dst[j]);
                    j += 1;
                }
                Edit::Delete => i += 1,
            }
        }
        assert_eq!(replay, dst);
    }
}
