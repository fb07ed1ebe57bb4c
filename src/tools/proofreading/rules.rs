//! Rule-based checks for Japanese prose.
//!
//! Positions and lengths count characters, not bytes, so they line up with
//! JavaScript string offsets in the browser.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Highlight color, which doubles as the severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// Typos and duplicated words.
    Red,
    /// Grammar and style consistency.
    Blue,
    /// Readability.
    Yellow,
}

impl std::str::FromStr for Color {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Color::Red),
            "blue" => Ok(Color::Blue),
            "yellow" => Ok(Color::Yellow),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub position: usize,
    pub length: usize,
    pub suggestion: String,
    pub reason: String,
    pub color: Color,
}

impl Suggestion {
    fn new(position: usize, length: usize, suggestion: impl Into<String>, reason: impl Into<String>, color: Color) -> Self {
        Self {
            position,
            length,
            suggestion: suggestion.into(),
            reason: reason.into(),
            color,
        }
    }
}

const LONG_SENTENCE: usize = 100;
const COMMA_SENTENCE: usize = 50;
const STYLE_SPAN: usize = 50;
/// A conjunction used more often than this is flagged.
const CONJUNCTION_LIMIT: usize = 3;

/// Conjunctions and their suggested alternatives.
const CONJUNCTIONS: &[(&str, &str)] = &[
    ("しかし", "ですが、けれども、一方"),
    ("そして", "また、それから、加えて"),
    ("だから", "それゆえ、したがって、そのため"),
    ("ただし", "ただ、もっとも、とはいえ"),
    ("それから", "その後、続いて、そして"),
    ("ところで", "さて、そういえば、話は変わるが"),
    ("たとえば", "例えば、一例として、具体的には"),
    ("すなわち", "つまり、要するに、言い換えれば"),
    ("また", "さらに、加えて、それから"),
    ("なお", "ちなみに、ところで、さらに"),
];

/// Connective particles after which a comma reads naturally.
const CONNECTIVES: &[&str] = &["けれども", "けれど", "ので", "のに", "ため"];

/// Words usually written in kanji.
const KANJI_WORDS: &[(&str, &str)] = &[
    ("わたし", "私"),
    ("おおきい", "大きい"),
    ("ちいさい", "小さい"),
    ("すこし", "少し"),
    ("たくさん", "沢山"),
    ("とき", "時"),
    ("ひと", "人"),
    ("もの", "物"),
    ("ところ", "所"),
    ("こと", "事"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Kanji,
    Hiragana,
    Katakana,
    Word,
    Space,
    Punct,
}

fn script_of(c: char) -> Script {
    match c {
        c if c.is_whitespace() => Script::Space,
        '\u{3041}'..='\u{309F}' => Script::Hiragana,
        '\u{30A0}'..='\u{30FF}' | '\u{FF66}'..='\u{FF9F}' => Script::Katakana,
        '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '々' => Script::Kanji,
        c if c.is_alphanumeric() => Script::Word,
        _ => Script::Punct,
    }
}

/// A run of characters of one script.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    start: usize,
    text: String,
    script: Script,
}

impl Token {
    fn len(&self) -> usize {
        self.text.chars().count()
    }
}

fn tokenize(chars: &[char]) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    for (i, &c) in chars.iter().enumerate() {
        let script = script_of(c);
        match tokens.last_mut() {
            Some(last) if last.script == script && script != Script::Punct => last.text.push(c),
            _ => tokens.push(Token {
                start: i,
                text: c.to_string(),
                script,
            }),
        }
    }
    tokens
}

/// A sentence as a character range, terminator included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sentence {
    start: usize,
    end: usize,
}

impl Sentence {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

fn sentences(chars: &[char]) -> Vec<Sentence> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '。' | '！' | '？' | '!' | '?' | '\n') {
            out.push(Sentence { start, end: i + 1 });
            start = i + 1;
        }
    }
    if start < chars.len() {
        out.push(Sentence {
            start,
            end: chars.len(),
        });
    }
    out.into_iter()
        .filter(|s| chars[s.start..s.end].iter().any(|c| !c.is_whitespace()))
        .collect()
}

fn slice(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect()
}

/// Character offsets of every occurrence of `needle`.
fn find_all(chars: &[char], needle: &str) -> Vec<usize> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() || needle.len() > chars.len() {
        return Vec::new();
    }
    (0..=chars.len() - needle.len())
        .filter(|&i| chars[i..i + needle.len()] == needle[..])
        .collect()
}

fn is_boundary(chars: &[char], index: usize) -> bool {
    index == 0
        || matches!(
            chars[index - 1],
            '。' | '、' | '！' | '？' | '!' | '?' | '\n' | ' ' | '　' | '「' | '（'
        )
}

/// Occurrences of each conjunction at a phrase boundary. Longer
/// conjunctions claim their span first.
fn conjunction_uses(chars: &[char]) -> Vec<(usize, &'static str)> {
    let mut taken = vec![false; chars.len()];
    let mut uses = Vec::new();

    let mut by_length: Vec<&str> = CONJUNCTIONS.iter().map(|(c, _)| *c).collect();
    by_length.sort_by_key(|c| std::cmp::Reverse(c.chars().count()));

    for conj in by_length {
        let len = conj.chars().count();
        for start in find_all(chars, conj) {
            if is_boundary(chars, start) && !taken[start..start + len].iter().any(|t| *t) {
                taken[start..start + len].iter_mut().for_each(|t| *t = true);
                uses.push((start, conj));
            }
        }
    }

    uses.sort();
    uses
}

pub fn alternative_conjunction(conj: &str) -> &'static str {
    CONJUNCTIONS
        .iter()
        .find(|(c, _)| *c == conj)
        .map(|(_, alt)| *alt)
        .unwrap_or("別の接続詞")
}

fn check_spaces_before_punctuation(chars: &[char], out: &mut Vec<Suggestion>) {
    for (i, &c) in chars.iter().enumerate().skip(1) {
        if matches!(c, '、' | '。') && chars[i - 1] == ' ' {
            out.push(Suggestion::new(
                i - 1,
                2,
                c.to_string(),
                "句読点の前にスペースは不要です",
                Color::Blue,
            ));
        }
    }
}

fn check_repeated_words(tokens: &[Token], out: &mut Vec<Suggestion>) {
    let words: Vec<&Token> = tokens
        .iter()
        .filter(|t| !matches!(t.script, Script::Space | Script::Punct))
        .collect();

    for pair in words.windows(2) {
        if pair[0].text == pair[1].text {
            out.push(Suggestion::new(
                pair[0].start,
                pair[0].len() * 2,
                pair[0].text.clone(),
                "単語が重複しています",
                Color::Red,
            ));
        }
    }

    // Doubled runs like 確認確認.
    for token in &words {
        let chars: Vec<char> = token.text.chars().collect();
        let half = chars.len() / 2;
        if chars.len() % 2 == 0 && half >= 2 && chars[..half] == chars[half..] {
            out.push(Suggestion::new(
                token.start,
                chars.len(),
                slice(&chars, 0, half),
                "単語が重複しています",
                Color::Red,
            ));
        }
    }
}

fn check_long_sentences(chars: &[char], sents: &[Sentence], out: &mut Vec<Suggestion>) {
    for s in sents.iter().filter(|s| s.len() > LONG_SENTENCE) {
        out.push(Suggestion::new(
            s.start,
            s.len(),
            slice(chars, s.start, s.end),
            "文が長すぎます。複数の短い文に分けることを検討してください",
            Color::Yellow,
        ));
    }
}

fn check_conjunction_overuse(chars: &[char], out: &mut Vec<Suggestion>) {
    let uses = conjunction_uses(chars);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, conj) in &uses {
        *counts.entry(*conj).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (position, conj) in uses {
        let nth = seen.entry(conj).or_default();
        *nth += 1;
        if counts[conj] > CONJUNCTION_LIMIT && *nth >= 3 {
            out.push(Suggestion::new(
                position,
                conj.chars().count(),
                format!("別の表現（例：「{}」）", alternative_conjunction(conj)),
                format!("「{}」が多用されています", conj),
                Color::Yellow,
            ));
        }
    }
}

fn check_mixed_style(text: &str, chars: &[char], out: &mut Vec<Suggestion>) {
    let polite = text.contains("です") || text.contains("ます");
    let plain = text.contains("である")
        || ["だ。", "だ、", "だった。", "だ\n"].iter().any(|p| text.contains(p))
        || text.trim_end().ends_with('だ');

    if polite && plain {
        let span = chars.len().min(STYLE_SPAN);
        out.push(Suggestion::new(
            0,
            span,
            slice(chars, 0, span),
            "デス・マス調とダ・デアル調が混在しています。文体を統一してください",
            Color::Blue,
        ));
    }
}

fn check_kanji_usage(chars: &[char], out: &mut Vec<Suggestion>) {
    for (word, kanji) in KANJI_WORDS {
        let len = word.chars().count();
        for index in find_all(chars, word) {
            let before = index > 0 && chars[index - 1].is_alphabetic();
            let after = index + len < chars.len() && chars[index + len].is_alphabetic();
            if !before && !after {
                out.push(Suggestion::new(
                    index,
                    len,
                    *kanji,
                    format!("一般的には「{}」より漢字の「{}」を使います", word, kanji),
                    Color::Yellow,
                ));
            }
        }
    }
}

fn check_comma_usage(chars: &[char], sents: &[Sentence], out: &mut Vec<Suggestion>) {
    let conjunctions = conjunction_uses(chars);

    for s in sents.iter().filter(|s| s.len() > COMMA_SENTENCE) {
        if chars[s.start..s.end].contains(&'、') {
            continue;
        }

        let mut candidates: Vec<usize> = conjunctions
            .iter()
            .filter(|(pos, _)| *pos >= s.start && *pos < s.end)
            .map(|(pos, conj)| pos + conj.chars().count())
            .collect();
        for connective in CONNECTIVES {
            let sentence = &chars[s.start..s.end];
            candidates.extend(
                find_all(sentence, connective)
                    .into_iter()
                    .map(|i| s.start + i + connective.chars().count()),
            );
        }

        // Not at the very end of the sentence.
        if let Some(position) = candidates.into_iter().filter(|p| *p < s.end - 1).min() {
            out.push(Suggestion::new(
                position,
                0,
                "、",
                "長い文では読点を使うと読みやすくなります",
                Color::Yellow,
            ));
        }
    }
}

/// Runs every rule over `text`.
pub fn check(text: &str) -> Vec<Suggestion> {
    let chars: Vec<char> = text.chars().collect();
    let tokens = tokenize(&chars);
    let sents = sentences(&chars);

    let mut out = Vec::new();
    check_spaces_before_punctuation(&chars, &mut out);
    check_repeated_words(&tokens, &mut out);
    check_long_sentences(&chars, &sents, &mut out);
    check_conjunction_overuse(&chars, &mut out);
    check_mixed_style(text, &chars, &mut out);
    check_kanji_usage(&chars, &mut out);
    check_comma_usage(&chars, &sents, &mut out);
    out
}
