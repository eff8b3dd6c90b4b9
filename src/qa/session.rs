//! QA 세션 - 문서 인덱싱과 질의 오케스트레이션
//!
//! 세션 하나가 인덱스 슬롯 하나를 소유합니다. 전역 상태 없이
//! 세션 객체를 핸들로 전달하므로 여러 세션이 안전하게 공존할 수 있습니다.
//!
//! 상태 전이: Uninitialized → (load_document) → Building → Ready
//! 빌드 실패 시 Uninitialized로 복귀하고, 재업로드는 기존 인덱스를 폐기합니다.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::completion::CompletionProvider;
use crate::embedding::EmbeddingProvider;
use crate::error::{QaError, Result};
use crate::extractor::Document;

use super::chunker::{chunk, ChunkConfig};
use super::generator::{AnswerGenerator, DEFAULT_MAX_PROMPT_CHARACTERS};
use super::index::{ScoredSegment, VectorIndex};
use super::retriever::Retriever;

// ============================================================================
// Configuration
// ============================================================================

/// QA 세션 설정
#[derive(Debug, Clone)]
pub struct QaConfig {
    /// 질의당 검색할 세그먼트 수
    pub top_k: usize,
    /// 청킹 설정
    pub chunk: ChunkConfig,
    /// 프롬프트 길이 예산 (문자 수)
    pub max_prompt_characters: usize,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            chunk: ChunkConfig::default(),
            max_prompt_characters: DEFAULT_MAX_PROMPT_CHARACTERS,
        }
    }
}

// ============================================================================
// Types
// ============================================================================

/// 질의 한 건의 결과
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// 질문 텍스트
    pub question: String,
    /// 검색된 세그먼트 (유사도 내림차순)
    pub segments: Vec<ScoredSegment>,
    /// 생성된 답변
    pub answer: String,
}

/// 세션 상태 (외부 관측용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 인덱스 없음
    Uninitialized,
    /// 인덱스 빌드 진행 중
    Building,
    /// 질의 가능
    Ready,
}

/// 인덱스 슬롯
///
/// Ready의 인덱스는 읽기 전용이므로 동시 질의가 안전합니다.
enum IndexSlot {
    Empty,
    Building,
    Ready(VectorIndex),
}

// ============================================================================
// QaSession
// ============================================================================

/// QA 세션
///
/// 문서 하나당 인덱스 하나를 유지하며, 질의마다
/// 검색(Retriever) → 생성(AnswerGenerator)을 순차 실행합니다.
pub struct QaSession {
    config: QaConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: Retriever,
    generator: AnswerGenerator,
    slot: RwLock<IndexSlot>,
}

impl QaSession {
    /// 프로바이더와 설정으로 세션 생성
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
        config: QaConfig,
    ) -> Self {
        let retriever = Retriever::new(Arc::clone(&embedder));
        let generator =
            AnswerGenerator::new(completer).with_max_prompt_characters(config.max_prompt_characters);

        Self {
            config,
            embedder,
            retriever,
            generator,
            slot: RwLock::new(IndexSlot::Empty),
        }
    }

    /// 현재 세션 상태
    pub async fn state(&self) -> SessionState {
        match &*self.slot.read().await {
            IndexSlot::Empty => SessionState::Uninitialized,
            IndexSlot::Building => SessionState::Building,
            IndexSlot::Ready(_) => SessionState::Ready,
        }
    }

    /// 문서 인덱싱 (청킹 → 임베딩 → 인덱스 빌드)
    ///
    /// 기존 인덱스는 즉시 폐기되고 전체 재빌드됩니다. 빌드 중 질의는
    /// [`QaError::IndexBuilding`]으로 실패하며, 빌드가 실패하면
    /// 세션은 Uninitialized로 돌아갑니다. 인덱싱된 세그먼트 수를 반환합니다.
    pub async fn load_document(&self, document: &Document) -> Result<usize> {
        {
            let mut slot = self.slot.write().await;
            *slot = IndexSlot::Building;
        }

        // 임베딩 호출 동안 락을 잡지 않음
        match self.build_index(document).await {
            Ok(index) => {
                let segment_count = index.len();
                tracing::info!(
                    pages = document.page_count(),
                    segments = segment_count,
                    "Document indexed"
                );
                *self.slot.write().await = IndexSlot::Ready(index);
                Ok(segment_count)
            }
            Err(e) => {
                tracing::warn!("Index build failed: {}", e);
                *self.slot.write().await = IndexSlot::Empty;
                Err(e)
            }
        }
    }

    async fn build_index(&self, document: &Document) -> Result<VectorIndex> {
        let segments = chunk(document.pages(), &self.config.chunk);

        if segments.is_empty() {
            // 텍스트 없는 문서 - 모든 질의가 빈 컨텍스트를 받는 퇴화 인덱스
            tracing::warn!("Document produced no segments (no extractable text)");
            return Ok(VectorIndex::empty());
        }

        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        VectorIndex::build(segments, embeddings)
    }

    /// 질문에 답변 (검색 → 생성)
    ///
    /// 인덱스가 없으면 [`QaError::NotReady`], 빌드 중이면
    /// [`QaError::IndexBuilding`]으로 실패합니다. 질의 도중의 프로바이더
    /// 실패는 해당 질의만 실패시키고 인덱스는 Ready로 유지됩니다.
    pub async fn ask(&self, question: &str) -> Result<QueryResult> {
        // 읽기 가드를 질의가 끝날 때까지 유지 (질의 중 재빌드 차단)
        let slot = self.slot.read().await;
        let index = match &*slot {
            IndexSlot::Empty => return Err(QaError::NotReady),
            IndexSlot::Building => return Err(QaError::IndexBuilding),
            IndexSlot::Ready(index) => index,
        };

        let segments = self
            .retriever
            .retrieve(index, question, self.config.top_k)
            .await?;
        let answer = self.generator.generate(question, &segments).await?;

        Ok(QueryResult {
            question: question.to_string(),
            segments,
            answer,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Page;
    use crate::qa::testing::{EchoCompletion, FailingEmbedding, HashEmbedding, SlowEmbedding};

    fn test_session() -> QaSession {
        QaSession::new(
            Arc::new(HashEmbedding::default()),
            Arc::new(EchoCompletion),
            QaConfig::default(),
        )
    }

    fn document(texts: &[&str]) -> Document {
        Document::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| Page {
                    number: i + 1,
                    text: text.to_string(),
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_ask_before_load_fails_not_ready() {
        let session = test_session();
        assert_eq!(session.state().await, SessionState::Uninitialized);

        let result = session.ask("anything?").await;
        assert!(matches!(result, Err(QaError::NotReady)));
    }

    #[tokio::test]
    async fn test_ask_answers_from_indexed_document() {
        let session = test_session();
        let doc = document(&["The sky is blue.", "Grass is green."]);

        let segment_count = session.load_document(&doc).await.unwrap();
        assert_eq!(segment_count, 2);
        assert_eq!(session.state().await, SessionState::Ready);

        let result = session.ask("What color is the sky?").await.unwrap();

        // 1페이지 세그먼트가 최상위로 검색되고 답변에 반영되어야 함
        assert_eq!(result.segments[0].segment.first_page, 1);
        assert!(result.answer.contains("blue"));
        assert_eq!(result.question, "What color is the sky?");
    }

    #[tokio::test]
    async fn test_ask_k_larger_than_segment_count() {
        let session = QaSession::new(
            Arc::new(HashEmbedding::default()),
            Arc::new(EchoCompletion),
            QaConfig {
                top_k: 10,
                ..QaConfig::default()
            },
        );
        let doc = document(&["alpha text", "beta text", "gamma text"]);

        session.load_document(&doc).await.unwrap();
        let result = session.ask("alpha").await.unwrap();

        assert_eq!(result.segments.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_document_builds_degenerate_index() {
        let session = test_session();
        let doc = document(&["", "   "]);

        let segment_count = session.load_document(&doc).await.unwrap();
        assert_eq!(segment_count, 0);
        assert_eq!(session.state().await, SessionState::Ready);

        // 빈 컨텍스트여도 질의는 성공하고 답변은 비어있지 않음
        let result = session.ask("What is this about?").await.unwrap();
        assert!(result.segments.is_empty());
        assert!(!result.answer.trim().is_empty());
    }

    #[tokio::test]
    async fn test_ask_during_build_fails_index_building() {
        let session = Arc::new(QaSession::new(
            Arc::new(SlowEmbedding::default()),
            Arc::new(EchoCompletion),
            QaConfig::default(),
        ));
        let doc = document(&["The sky is blue."]);

        let build = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.load_document(&doc).await })
        };

        // 빌드 태스크가 Building을 게시할 때까지 대기
        loop {
            match session.state().await {
                SessionState::Uninitialized => {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                }
                state => {
                    assert_eq!(state, SessionState::Building);
                    break;
                }
            }
        }

        // 빌드 중 질의는 IndexBuilding으로 거부
        let result = session.ask("anything?").await;
        assert!(matches!(result, Err(QaError::IndexBuilding)));

        // 빌드가 끝나면 질의 가능
        build.await.unwrap().unwrap();
        assert_eq!(session.state().await, SessionState::Ready);
        assert!(session.ask("sky?").await.is_ok());
    }

    #[tokio::test]
    async fn test_build_failure_reverts_to_uninitialized() {
        let session = QaSession::new(
            Arc::new(FailingEmbedding),
            Arc::new(EchoCompletion),
            QaConfig::default(),
        );
        let doc = document(&["some text"]);

        let result = session.load_document(&doc).await;
        assert!(matches!(result, Err(QaError::Embedding(_))));
        assert_eq!(session.state().await, SessionState::Uninitialized);

        // 빌드 실패 후의 질의는 Embedding이 아니라 NotReady로 실패
        let result = session.ask("anything?").await;
        assert!(matches!(result, Err(QaError::NotReady)));
    }

    #[tokio::test]
    async fn test_reload_replaces_index() {
        let session = test_session();

        session
            .load_document(&document(&["The sky is blue."]))
            .await
            .unwrap();
        let first = session.ask("sky color?").await.unwrap();
        assert!(first.answer.contains("blue"));

        // 재업로드는 이전 인덱스를 완전히 교체
        session
            .load_document(&document(&["Grass is green."]))
            .await
            .unwrap();
        let second = session.ask("sky color?").await.unwrap();
        assert!(!second.answer.contains("blue"));
        assert!(second.answer.contains("green"));
    }

    #[tokio::test]
    async fn test_failed_query_keeps_index_ready() {
        let session = test_session();
        session
            .load_document(&document(&["The sky is blue."]))
            .await
            .unwrap();

        // 빈 질의는 임베딩 단계에서 거부됨
        let result = session.ask("").await;
        assert!(matches!(result, Err(QaError::Embedding(_))));

        // 인덱스는 그대로 Ready
        assert_eq!(session.state().await, SessionState::Ready);
        assert!(session.ask("sky?").await.is_ok());
    }
}
