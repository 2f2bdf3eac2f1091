//! 与站点无关的启发式提取。
//!
//! 目录与正文都基于两种遍历：`collect_under` 在子树中按谓词收集节点并跳过
//! 需要回避的子树，`widest_subtree` 在所有候选容器中选出收获最多的一个。
//! 遍历均使用显式栈，深层嵌套的页面不会耗尽调用栈。

pub mod catalogue;
pub mod content;

use scraper::{ElementRef, Node};

pub use catalogue::{Strategy, extract_catalogue};
pub use content::{extract_content, normalize};

/// 按标签名匹配元素的谓词
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Nothing,
    Tags(&'static [&'static str]),
}

pub const ANCHOR: Matcher = Matcher::Tags(&["a"]);
pub const DIVISION: Matcher = Matcher::Tags(&["div"]);
pub const NON_TEXT: Matcher = Matcher::Tags(&["script", "style"]);

impl Matcher {
    pub fn matches(self, element: ElementRef) -> bool {
        match self {
            Matcher::Nothing => false,
            Matcher::Tags(names) => names.contains(&element.value().name()),
        }
    }
}

/// 先序遍历，跳过根以下命中 `avoid` 的整棵子树（根本身总会被访问）
fn walk<'a>(
    root: ElementRef<'a>,
    avoid: Matcher,
    mut visit: impl FnMut(&'a Node, Option<ElementRef<'a>>),
) {
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        visit(node.value(), ElementRef::wrap(node));

        let children: Vec<_> = node
            .children()
            .filter(|child| !ElementRef::wrap(*child).is_some_and(|e| avoid.matches(e)))
            .collect();
        // 逆序压栈，出栈顺序即文档顺序
        stack.extend(children.into_iter().rev());
    }
}

/// 收集 `root` 下所有命中 `select` 的元素
pub fn collect_under<'a>(
    root: ElementRef<'a>,
    select: Matcher,
    avoid: Matcher,
) -> Vec<ElementRef<'a>> {
    let mut found = Vec::new();
    walk(root, avoid, |_, element| {
        if let Some(element) = element.filter(|e| select.matches(*e)) {
            found.push(element);
        }
    });
    found
}

/// 收集 `root` 下的文本节点
pub fn collect_text<'a>(root: ElementRef<'a>, avoid: Matcher) -> Vec<&'a str> {
    let mut texts = Vec::new();
    walk(root, avoid, |node, _| {
        if let Some(text) = node.as_text() {
            texts.push(&**text);
        }
    });
    texts
}

/// 对每个命中 `container` 的元素独立收获，返回权重最大的结果，相同时保留先出现者
pub fn widest_subtree<'a, T>(
    root: ElementRef<'a>,
    container: Matcher,
    mut harvest: impl FnMut(ElementRef<'a>) -> T,
    weight: impl Fn(&T) -> usize,
) -> Option<T> {
    let mut best: Option<(usize, T)> = None;
    for candidate in collect_under(root, container, Matcher::Nothing) {
        let result = harvest(candidate);
        let w = weight(&result);
        if best.as_ref().is_none_or(|(max, _)| w > *max) {
            best = Some((w, result));
        }
    }
    best.map(|(_, result)| result)
}

/// 元素内可见文本，不含 script 与 style
pub fn inner_text(element: ElementRef) -> String {
    collect_text(element, NON_TEXT).concat()
}
