//! 评分服务响应解析
//!
//! 响应是自由文本，其中"应该"包含一个 JSON 结果数组。
//! 解析器按顺序尝试每个 `[`，取第一个非空、且每个元素都是合法结果对象的数组；
//! 若响应中有 ```json 代码块，优先在代码块内查找。

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::ParseFailure;
use crate::models::RecordId;
use crate::utils::logging::truncate_text;

/// 响应中的一条原始结果（尚未校验）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawScore {
    #[serde(alias = "ID", alias = "Id")]
    pub id: RecordId,
    #[serde(
        alias = "Score",
        alias = "Puntuación",
        alias = "puntuación",
        alias = "puntuacion",
        alias = "Puntuacion"
    )]
    pub score: i64,
    #[serde(
        default,
        alias = "Rationale",
        alias = "criteria",
        alias = "Criterios",
        alias = "criterios"
    )]
    pub rationale: String,
}

/// 从响应文本中提取结果列表
pub fn parse_scores(response: &str) -> Result<Vec<RawScore>, ParseFailure> {
    let mut candidates = 0;

    for segment in fenced_blocks(response)
        .into_iter()
        .chain(std::iter::once(response))
    {
        for (pos, _) in segment.match_indices('[') {
            candidates += 1;
            if let Some(scores) = try_parse_list_at(&segment[pos..]) {
                return Ok(scores);
            }
        }
    }

    let preview = truncate_text(response, 120);
    if candidates == 0 {
        Err(ParseFailure::NoList { preview })
    } else {
        Err(ParseFailure::NoWellFormedList {
            candidates,
            preview,
        })
    }
}

/// 从 `text` 开头解析一个结果数组，忽略其后的任何内容
fn try_parse_list_at(text: &str) -> Option<Vec<RawScore>> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Vec<RawScore>>();
    match stream.next() {
        Some(Ok(scores)) if !scores.is_empty() => Some(scores),
        _ => None,
    }
}

/// Markdown 代码块，捕获组 1 为代码块内容
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[A-Za-z]*[ \t]*\r?\n?([\s\S]*?)```").expect("代码块正则表达式是常量")
});

/// 提取 Markdown 代码块内容
fn fenced_blocks(text: &str) -> Vec<&str> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_list() {
        let scores = parse_scores(r#"[{"ID": 1, "score": 7, "rationale": "ok"}]"#).unwrap();
        assert_eq!(
            scores,
            vec![RawScore {
                id: RecordId::Int(1),
                score: 7,
                rationale: "ok".to_string()
            }]
        );
    }

    #[test]
    fn test_list_surrounded_by_prose() {
        let response = r#"Claro, aquí están las puntuaciones:
[{"ID": 1, "Puntuación": 8, "Criterios": "sólido"}, {"ID": "2", "score": 3}]
Espero que sea útil."#;

        let scores = parse_scores(response).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].score, 8);
        assert_eq!(scores[0].rationale, "sólido");
        assert_eq!(scores[1].id, RecordId::from("2"));
        assert_eq!(scores[1].rationale, "");
    }

    #[test]
    fn test_skips_bracketed_prose_before_list() {
        let response = r#"结果如下 [见下表] 以及 [1, 2]：
[{"id": 5, "score": 9, "rationale": "好"}]"#;

        let scores = parse_scores(response).unwrap();
        assert_eq!(scores[0].id, RecordId::Int(5));
    }

    #[test]
    fn test_prefers_fenced_block() {
        let response = r#"示例格式: [{"ID": 0, "score": 1}]
```json
[{"ID": 9, "score": 4, "rationale": "real"}]
```"#;

        let scores = parse_scores(response).unwrap();
        assert_eq!(scores[0].id, RecordId::Int(9));
    }

    #[test]
    fn test_fenced_blocks_found_across_calls() {
        let response = "```text\n无关说明\n```\n中间文字\n```json\n[1]\n```";

        assert_eq!(fenced_blocks(response), vec!["无关说明\n", "[1]\n"]);
        assert_eq!(fenced_blocks(response).len(), 2);
        assert!(fenced_blocks("没有代码块").is_empty());
    }

    #[test]
    fn test_no_list_is_parse_failure() {
        let err = parse_scores("抱歉，我无法完成这个请求。").unwrap_err();
        assert!(matches!(err, ParseFailure::NoList { .. }));
    }

    #[test]
    fn test_malformed_entries_are_parse_failure() {
        // score 为字符串、缺少 id、空数组都不算合法结果
        for response in [
            r#"[{"ID": 1, "score": "8"}]"#,
            r#"[{"score": 8}]"#,
            "[]",
            r#"[{"ID": 1, "score": 8"#,
        ] {
            let err = parse_scores(response).unwrap_err();
            assert!(
                matches!(err, ParseFailure::NoWellFormedList { .. }),
                "response {:?} gave {:?}",
                response,
                err
            );
        }
    }

    #[test]
    fn test_fractional_score_rejected() {
        assert!(parse_scores(r#"[{"ID": 1, "score": 7.5}]"#).is_err());
    }
}
