//! 文本清洗
//!
//! 在分块之前把章节文本整理成适合朗读的形式：
//! 1. 统一弯引号、破折号、省略号
//! 2. 去掉 Markdown 残留的标记字符
//! 3. 展开常见英文缩写（只匹配完整单词）
//! 4. 段落（空行分隔）保留为 `\n\n`，段落内部空白折叠为单个空格

/// 缩写展开表
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Mrs.", "Missus"),
    ("Mr.", "Mister"),
    ("Ms.", "Miss"),
    ("Dr.", "Doctor"),
    ("Prof.", "Professor"),
    ("St.", "Saint"),
    ("Jr.", "Junior"),
    ("Sr.", "Senior"),
    ("vs.", "versus"),
    ("etc.", "et cetera"),
    ("e.g.", "for example"),
    ("i.e.", "that is"),
];

/// 需要删除的标记字符
#[inline]
fn is_markup_char(ch: char) -> bool {
    matches!(ch, '*' | '_' | '#' | '~' | '`' | '[' | ']' | '(' | ')' | '<' | '>')
}

/// 清洗章节文本
pub fn clean_text(text: &str) -> String {
    let normalized = normalize_characters(text);
    split_paragraphs(&normalized)
        .into_iter()
        .map(|p| expand_abbreviations(&p))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 统一标点并删除标记字符
fn normalize_characters(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => out.push('"'),
            '\u{2018}' | '\u{2019}' | '\u{201A}' => out.push('\''),
            '\u{2014}' | '\u{2013}' => out.push_str(" - "),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\t' => out.push(' '),
            '\r' => {}
            c if is_markup_char(c) => {}
            c => out.push(c),
        }
    }
    out
}

/// 按空行切分段落，段落内空白折叠
///
/// 空段落会被丢弃
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(collapse_whitespace(&current.join(" ")));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(collapse_whitespace(&current.join(" ")));
    }

    paragraphs.retain(|p| !p.is_empty());
    paragraphs
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 展开缩写，要求缩写前面不是字母或数字
fn expand_abbreviations(paragraph: &str) -> String {
    let mut result = paragraph.to_string();
    for (abbr, expansion) in ABBREVIATIONS {
        result = replace_word(&result, abbr, expansion);
    }
    result
}

fn replace_word(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(from) {
        let preceded_by_word = rest[..pos]
            .chars()
            .next_back()
            .or_else(|| out.chars().next_back())
            .map(|c| c.is_alphanumeric())
            .unwrap_or(false);

        out.push_str(&rest[..pos]);
        if preceded_by_word {
            out.push_str(from);
        } else {
            out.push_str(to);
        }
        rest = &rest[pos + from.len()..];
    }
    out.push_str(rest);
    out
}
