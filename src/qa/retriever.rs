//! 검색기 - 질의 임베딩 + 인덱스 조회
//!
//! 질의 텍스트를 임베딩 프로바이더로 벡터화한 뒤 벡터 인덱스에
//! 최근접 이웃 검색을 위임합니다.

use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

use super::index::{ScoredSegment, VectorIndex};

/// 질의 검색기
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    /// 임베딩 프로바이더로 검색기 생성
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }

    /// 질의와 가장 유사한 세그먼트 상위 k개 검색
    ///
    /// 프로바이더가 질의를 거부하거나(빈 문자열 등) 연결에 실패하면
    /// [`QaError::Embedding`](crate::error::QaError::Embedding)으로 실패합니다.
    /// 해당 질의만 실패하며 인덱스는 계속 사용 가능합니다.
    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredSegment>> {
        let query_embedding = self.embedder.embed(query).await?;
        let results = index.query(&query_embedding, k);

        tracing::debug!(
            result_count = results.len(),
            top_score = results.first().map(|r| r.score),
            "Retrieved segments for query"
        );

        Ok(results)
    }
}

// ============================================================================
// Tests
// ============================================================================
