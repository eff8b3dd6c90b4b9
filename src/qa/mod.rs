//! QA 모듈 - 검색 증강 질의응답 코어
//!
//! - Chunker: 페이지 텍스트를 오버랩 세그먼트로 분할
//! - VectorIndex: 인메모리 코사인 유사도 검색
//! - Retriever: 질의 임베딩 + 인덱스 조회
//! - AnswerGenerator: 컨텍스트 프롬프트 구성 + 언어 모델 호출
//! - QaSession: 문서당 인덱스 하나를 소유하는 오케스트레이터

mod chunker;
mod generator;
mod index;
mod retriever;
mod session;

// Re-exports
pub use chunker::{chunk, ChunkConfig, Segment};
pub use generator::{AnswerGenerator, DEFAULT_MAX_PROMPT_CHARACTERS};
pub use index::{cosine_similarity, ScoredSegment, VectorIndex};
pub use retriever::Retriever;
pub use session::{QaConfig, QaSession, QueryResult, SessionState};

// ============================================================================
// Test Providers
// ============================================================================

/// 테스트용 결정적 프로바이더 스텁
#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;

    use crate::completion::CompletionProvider;
    use crate::embedding::EmbeddingProvider;
    use crate::error::{QaError, Result};

    /// 단어 해싱 기반 결정적 임베딩 (bag-of-words)
    ///
    /// 어휘가 겹칠수록 코사인 유사도가 높아지므로
    /// 검색 랭킹 테스트에 사용할 수 있습니다.
    pub struct HashEmbedding {
        pub dimension: usize,
    }

    impl Default for HashEmbedding {
        fn default() -> Self {
            Self { dimension: 64 }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for HashEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.trim().is_empty() {
                return Err(QaError::Embedding("empty input text".to_string()));
            }

            let mut vector = vec![0.0f32; self.dimension];
            for word in text
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
            {
                let bucket = word.bytes().map(|b| b as usize).sum::<usize>() % self.dimension;
                vector[bucket] += 1.0;
            }
            Ok(vector)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn name(&self) -> &str {
            "hash-test"
        }
    }

    /// 임베딩마다 지연을 삽입하는 스텁
    ///
    /// 인덱스 빌드가 진행 중인 구간을 테스트에서 관찰할 수 있게 합니다.
    pub struct SlowEmbedding {
        inner: HashEmbedding,
        delay: std::time::Duration,
    }

    impl Default for SlowEmbedding {
        fn default() -> Self {
            Self {
                inner: HashEmbedding::default(),
                delay: std::time::Duration::from_millis(200),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(self.delay).await;
            self.inner.embed(text).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn name(&self) -> &str {
            "slow-test"
        }
    }

    /// 항상 실패하는 임베딩 (빌드/질의 실패 시뮬레이션)
    pub struct FailingEmbedding;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(QaError::Embedding("provider unreachable".to_string()))
        }

        fn dimension(&self) -> usize {
            64
        }

        fn name(&self) -> &str {
            "failing-test"
        }
    }

    /// 프롬프트를 그대로 되돌려주는 완성 스텁
    ///
    /// 답변에 컨텍스트가 어떤 순서로 들어갔는지 검증할 수 있습니다.
    pub struct EchoCompletion;

    #[async_trait]
    impl CompletionProvider for EchoCompletion {
        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(format!("ANSWER\n{}", prompt))
        }

        fn name(&self) -> &str {
            "echo-test"
        }
    }

    /// 항상 실패하는 완성 스텁
    pub struct FailingCompletion;

    #[async_trait]
    impl CompletionProvider for FailingCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(QaError::Generation("provider unreachable".to_string()))
        }

        fn name(&self) -> &str {
            "failing-test"
        }
    }
}
