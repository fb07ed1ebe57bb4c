//! Second-opinion review and outline generation through the LLM.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::rules::{Color, Suggestion};
use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::utils::extract_json_array;

/// Characters of input sent for review.
pub const MAX_REVIEW_CHARS: usize = 30_000;

/// Two suggestions closer than this with the same text are duplicates.
const DUPLICATE_DISTANCE: usize = 5;

const REVIEW_PROMPT: &str = r#"あなたは日本語文章校正の専門家です。
以下の文章を日本語の観点から校正し、次の点に注意してください：

1. 誤字脱字
2. 文法的な誤り（助詞の使い方など）
3. 不自然な表現や冗長な表現
4. 敬語・丁寧語の適切な使用
5. 文体の一貫性
6. 読点と句点の適切な配置
7. 同じ言葉の不必要な繰り返し

入力文章:
{text}

レスポンスは必ず以下のJSON形式で返してください:
[
  {
    "position": 0,
    "length": 1,
    "suggestion": "修正後の文字列",
    "reason": "修正理由",
    "color": "red"
  }
]

注意事項：
・必ずJSON配列を返してください
・配列が空の場合は [] を返してください
・説明文やマークダウン記法は使用しないでください
・positionは0から始まる整数値です
・lengthは1以上の整数値です
・colorは "red"（誤字脱字）、"blue"（文法ミス）、"yellow"（表現改善）のいずれかです"#;

const SIMPLE_STRUCTURE_PROMPT: &str = r#"以下のテーマについて簡潔な文章構成を作成してください。

テーマ: {prompt}

以下の形式で回答してください：
1. はじめに
2. 本論（3〜5つの主要ポイント）
3. 結論

各セクションの内容を簡潔に箇条書きで示してください。"#;

const DETAILED_STRUCTURE_PROMPT: &str = r#"以下のテーマについて詳細な文章構成を作成してください。

テーマ: {prompt}

以下の形式で回答してください：
1. はじめに
   - 背景
   - 目的
   - 概要

2. 本論（複数の章に分けて）
   - 各章のタイトル
   - 各章で扱うべき重要なポイント（箇条書き）
   - 引用すべき情報や事例の提案

3. 結論
   - まとめ
   - 今後の展望

できるだけ具体的で、読者が理解しやすい構成にしてください。"#;

/// Outline flavour for `/generate-structure`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureKind {
    #[default]
    Detailed,
    Simple,
}

impl StructureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureKind::Detailed => "detailed",
            StructureKind::Simple => "simple",
        }
    }

    fn prompt(&self, topic: &str) -> String {
        let template = match self {
            StructureKind::Detailed => DETAILED_STRUCTURE_PROMPT,
            StructureKind::Simple => SIMPLE_STRUCTURE_PROMPT,
        };
        template.replace("{prompt}", topic)
    }
}

fn as_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Checks one reviewer item and converts it.
///
/// Requires every key, `position >= 0`, `length >= 1`, string texts and a
/// known color. Numeric strings are accepted for the counts.
pub fn validate_item(item: &Value) -> Option<Suggestion> {
    let obj = item.as_object()?;
    let position = as_count(obj.get("position")?)?;
    let length = as_count(obj.get("length")?)?;
    if position < 0 || length < 1 {
        return None;
    }

    Some(Suggestion {
        position: position as usize,
        length: length as usize,
        suggestion: obj.get("suggestion")?.as_str()?.to_string(),
        reason: obj.get("reason")?.as_str()?.to_string(),
        color: obj.get("color")?.as_str()?.parse::<Color>().ok()?,
    })
}

/// Valid items of a reviewer response. Invalid items are dropped.
pub fn parse_review(content: &str) -> Result<Vec<Suggestion>, LlmError> {
    let array = extract_json_array(content).map_err(|e| LlmError::ParseError(e.to_string()))?;
    let items: Vec<Value> =
        serde_json::from_str(&array).map_err(|e| LlmError::ParseError(e.to_string()))?;

    let total = items.len();
    let valid: Vec<Suggestion> = items.iter().filter_map(validate_item).collect();
    if valid.len() < total {
        tracing::debug!(dropped = total - valid.len(), "Dropped malformed review items");
    }
    Ok(valid)
}

/// Appends reviewer suggestions that do not duplicate existing ones.
pub fn merge(existing: &mut Vec<Suggestion>, incoming: Vec<Suggestion>) -> usize {
    let mut added = 0;
    for candidate in incoming {
        let duplicate = existing.iter().any(|s| {
            s.position.abs_diff(candidate.position) < DUPLICATE_DISTANCE
                && s.suggestion == candidate.suggestion
        });
        if !duplicate {
            existing.push(candidate);
            added += 1;
        }
    }
    added
}

/// Asks the model for suggestions on the first [`MAX_REVIEW_CHARS`] characters.
pub async fn review(provider: &dyn LlmProvider, text: &str) -> Result<Vec<Suggestion>, LlmError> {
    let truncated: String = text.chars().take(MAX_REVIEW_CHARS).collect();
    if truncated.len() < text.len() {
        tracing::info!(chars = MAX_REVIEW_CHARS, "Review input truncated");
    }

    let request = GenerationRequest::new(
        "",
        vec![Message::user(REVIEW_PROMPT.replace("{text}", &truncated))],
    )
    .with_temperature(0.1)
    .with_max_tokens(2048)
    .with_top_p(0.95);

    let response = provider.generate(request).await?;
    let content = response.first_content().ok_or(LlmError::EmptyResponse)?;
    parse_review(content)
}

/// Generates a document outline for `topic`.
pub async fn generate_structure(
    provider: &dyn LlmProvider,
    topic: &str,
    max_tokens: u32,
    kind: StructureKind,
) -> Result<String, LlmError> {
    let request = GenerationRequest::new("", vec![Message::user(kind.prompt(topic))])
        .with_temperature(0.7)
        .with_max_tokens(max_tokens);

    let response = provider.generate(request).await?;
    response
        .first_content()
        .map(|c| c.trim().to_string())
        .ok_or(LlmError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Choice, GenerationResponse, Usage};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedProvider {
        reply: String,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl CannedProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            self.seen.lock().unwrap().push(request);
            Ok(GenerationResponse {
                id: "test".into(),
                model: "canned".into(),
                choices: vec![Choice {
                    index: 0,
                    message: Message {
                        role: "assistant".into(),
                        content: self.reply.clone(),
                    },
                    finish_reason: "stop".into(),
                }],
                usage: Usage::default(),
            })
        }
    }

    fn suggestion(position: usize, text: &str) -> Suggestion {
        Suggestion {
            position,
            length: 1,
            suggestion: text.into(),
            reason: "r".into(),
            color: Color::Red,
        }
    }

    #[test]
    fn test_validate_item() {
        let ok = json!({"position": "3", "length": 2, "suggestion": "は", "reason": "助詞", "color": "blue"});
        let s = validate_item(&ok).unwrap();
        assert_eq!((s.position, s.length, s.color), (3, 2, Color::Blue));

        for bad in [
            json!({"position": -1, "length": 1, "suggestion": "a", "reason": "b", "color": "red"}),
            json!({"position": 0, "length": 0, "suggestion": "a", "reason": "b", "color": "red"}),
            json!({"position": 0, "length": 1, "suggestion": "a", "reason": "b", "color": "green"}),
            json!({"position": 0, "length": 1, "reason": "b", "color": "red"}),
            json!({"position": 0, "length": 1, "suggestion": 5, "reason": "b", "color": "red"}),
            json!("not an object"),
        ] {
            assert!(validate_item(&bad).is_none(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_parse_review_from_fenced_block() {
        let content = "以下です。\n```json\n[{\"position\": 1, \"length\": 1, \"suggestion\": \"が\", \"reason\": \"助詞\", \"color\": \"yellow\"}, {\"position\": 1}]\n```";
        let parsed = parse_review(content).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].suggestion, "が");
    }

    #[test]
    fn test_parse_review_without_array() {
        assert!(matches!(parse_review("問題ありません"), Err(LlmError::ParseError(_))));
    }

    #[test]
    fn test_merge_skips_near_duplicates() {
        let mut existing = vec![suggestion(10, "私")];
        let added = merge(
            &mut existing,
            vec![suggestion(13, "私"), suggestion(15, "私"), suggestion(11, "人")],
        );
        assert_eq!(added, 2);
        assert_eq!(existing.len(), 3);
        assert_eq!(existing[1].position, 15);
    }

    #[tokio::test]
    async fn test_review_truncates_and_parses() {
        let provider = CannedProvider::new(
            r#"[{"position": 0, "length": 2, "suggestion": "今日", "reason": "誤字", "color": "red"}]"#,
        );
        let text = "あ".repeat(MAX_REVIEW_CHARS + 10);
        let found = review(&provider, &text).await.unwrap();
        assert_eq!(found.len(), 1);

        let seen = provider.seen.lock().unwrap();
        let prompt = &seen[0].messages[0].content;
        assert!(prompt.contains(&"あ".repeat(MAX_REVIEW_CHARS)));
        assert!(!prompt.contains(&"あ".repeat(MAX_REVIEW_CHARS + 1)));
        assert_eq!(seen[0].temperature, Some(0.1));
        assert_eq!(seen[0].top_p, Some(0.95));
        assert_eq!(seen[0].max_tokens, Some(2048));
    }

    #[tokio::test]
    async fn test_generate_structure_uses_kind_prompt() {
        let provider = CannedProvider::new("1. はじめに\n2. 本論\n3. 結論\n");
        let outline = generate_structure(&provider, "リモートワーク", 800, StructureKind::Simple)
            .await
            .unwrap();
        assert_eq!(outline, "1. はじめに\n2. 本論\n3. 結論");

        let seen = provider.seen.lock().unwrap();
        assert!(seen[0].messages[0].content.contains("簡潔な文章構成"));
        assert!(seen[0].messages[0].content.contains("テーマ: リモートワーク"));
        assert_eq!(seen[0].max_tokens, Some(800));
    }
}
