//! 답변 생성기 - 컨텍스트 프롬프트 구성 및 언어 모델 호출
//!
//! 검색된 세그먼트를 검색 순서대로 프롬프트에 삽입하고
//! 모델 제한을 넘으면 하위 랭크 세그먼트부터 제외합니다.

use std::sync::Arc;

use crate::completion::CompletionProvider;
use crate::error::Result;

use super::index::ScoredSegment;

/// 기본 프롬프트 길이 예산 (문자 수)
pub const DEFAULT_MAX_PROMPT_CHARACTERS: usize = 12_000;

/// 컨텍스트가 있을 때의 지시문
const ANSWER_INSTRUCTION: &str = "You are a helpful assistant answering questions about an \
uploaded PDF document.\nAnswer using only the numbered context passages below. If the passages \
do not contain the answer, say so.\n";

/// 컨텍스트가 없을 때의 지시문
///
/// 빈 컨텍스트도 생성은 시도하되, 뒷받침 근거가 없었음을 답변에 밝히게 합니다.
const NO_CONTEXT_INSTRUCTION: &str = "You are a helpful assistant answering questions about an \
uploaded PDF document.\nNo supporting passage was found in the document for this question. \
State that the document provides no supporting context, then give your best-effort answer.\n";

// ============================================================================
// AnswerGenerator
// ============================================================================

/// 답변 생성기
pub struct AnswerGenerator {
    provider: Arc<dyn CompletionProvider>,
    max_prompt_characters: usize,
}

impl AnswerGenerator {
    /// 완성 프로바이더로 생성 (기본 프롬프트 예산)
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            max_prompt_characters: DEFAULT_MAX_PROMPT_CHARACTERS,
        }
    }

    /// 프롬프트 길이 예산 지정
    pub fn with_max_prompt_characters(mut self, max_prompt_characters: usize) -> Self {
        self.max_prompt_characters = max_prompt_characters;
        self
    }

    /// 질의와 컨텍스트로 답변 생성
    ///
    /// 컨텍스트가 비어도 크래시하지 않고 질의만으로 생성을 시도합니다.
    /// 프로바이더 실패는 [`QaError::Generation`](crate::error::QaError::Generation)으로
    /// 전파되며, 세션은 재시도하지 않습니다.
    pub async fn generate(&self, query: &str, context: &[ScoredSegment]) -> Result<String> {
        let (prompt, used) = self.build_prompt(query, context);

        if used < context.len() {
            tracing::debug!(
                dropped = context.len() - used,
                "Dropped lowest-ranked segments to fit prompt budget"
            );
        }

        let answer = self.provider.complete(&prompt).await?;
        tracing::debug!(answer_chars = answer.chars().count(), "Generated answer");

        Ok(answer)
    }

    /// 프롬프트 구성
    ///
    /// 검색 순서(유사도 내림차순)대로 세그먼트를 넣되, 예산을 넘는 순간
    /// 그 뒤의 세그먼트를 모두 제외합니다. 사용된 세그먼트 수를 함께 반환합니다.
    fn build_prompt(&self, query: &str, context: &[ScoredSegment]) -> (String, usize) {
        let question_part = format!("\nQuestion: {}\nAnswer:", query);

        let mut passages = String::new();
        let mut used = 0;

        if !context.is_empty() {
            let base_len = ANSWER_INSTRUCTION.chars().count()
                + "\nContext:\n".chars().count()
                + question_part.chars().count();
            let mut context_len = 0;

            for (i, scored) in context.iter().enumerate() {
                let passage = format_passage(i, scored);
                let passage_len = passage.chars().count();

                if base_len + context_len + passage_len > self.max_prompt_characters {
                    break;
                }

                passages.push_str(&passage);
                context_len += passage_len;
                used += 1;
            }
        }

        let prompt = if used == 0 {
            format!("{}{}", NO_CONTEXT_INSTRUCTION, question_part)
        } else {
            format!(
                "{}\nContext:\n{}{}",
                ANSWER_INSTRUCTION, passages, question_part
            )
        };

        (prompt, used)
    }
}

/// 컨텍스트 한 항목 포맷
fn format_passage(rank: usize, scored: &ScoredSegment) -> String {
    let segment = &scored.segment;
    let pages = if segment.first_page == segment.last_page {
        format!("page {}", segment.first_page)
    } else {
        format!("pages {}-{}", segment.first_page, segment.last_page)
    };
    format!("[{}] ({}) {}\n", rank + 1, pages, segment.text)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QaError;
    use crate::qa::chunker::Segment;
    use crate::qa::testing::{EchoCompletion, FailingCompletion};

    fn scored(id: usize, text: &str, score: f32) -> ScoredSegment {
        ScoredSegment {
            segment: Segment {
                id,
                text: text.to_string(),
                first_page: id + 1,
                last_page: id + 1,
            },
            score,
        }
    }

    #[tokio::test]
    async fn test_generate_includes_context_in_order() {
        let generator = AnswerGenerator::new(Arc::new(EchoCompletion));
        let context = vec![
            scored(0, "The sky is blue.", 0.9),
            scored(1, "Grass is green.", 0.5),
        ];

        let answer = generator.generate("What color is the sky?", &context).await.unwrap();

        assert!(answer.contains("blue"));
        assert!(answer.contains("What color is the sky?"));
        let blue_pos = answer.find("blue").unwrap();
        let green_pos = answer.find("green").unwrap();
        assert!(blue_pos < green_pos);
    }

    #[tokio::test]
    async fn test_generate_empty_context_returns_nonempty_answer() {
        let generator = AnswerGenerator::new(Arc::new(EchoCompletion));

        let answer = generator.generate("What is this about?", &[]).await.unwrap();

        assert!(!answer.trim().is_empty());
        assert!(answer.contains("no supporting context"));
    }

    #[tokio::test]
    async fn test_generate_drops_lowest_ranked_over_budget() {
        let generator =
            AnswerGenerator::new(Arc::new(EchoCompletion)).with_max_prompt_characters(400);

        let context = vec![
            scored(0, &"first ".repeat(20), 0.9),
            scored(1, &"second ".repeat(20), 0.8),
            scored(2, &"third ".repeat(20), 0.7),
        ];

        let answer = generator.generate("question", &context).await.unwrap();

        // 예산 내에서 상위 랭크만 유지, 끝에서부터 제외
        assert!(answer.contains("first"));
        assert!(!answer.contains("third"));
    }

    #[tokio::test]
    async fn test_generate_provider_failure_propagates() {
        let generator = AnswerGenerator::new(Arc::new(FailingCompletion));

        let result = generator.generate("question", &[]).await;
        assert!(matches!(result, Err(QaError::Generation(_))));
    }

    #[test]
    fn test_build_prompt_counts_used_segments() {
        let generator =
            AnswerGenerator::new(Arc::new(EchoCompletion)).with_max_prompt_characters(100_000);
        let context = vec![scored(0, "a", 0.9), scored(1, "b", 0.8)];

        let (prompt, used) = generator.build_prompt("q", &context);
        assert_eq!(used, 2);
        assert!(prompt.contains("[1] (page 1) a"));
        assert!(prompt.contains("[2] (page 2) b"));
    }
}
