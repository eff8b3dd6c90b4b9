//! paperpal - PDF 질의응답 RAG 시스템
//!
//! PDF 문서를 페이지 단위로 추출하고 오버랩 세그먼트로 청킹한 뒤
//! 임베딩하여 인메모리 벡터 인덱스를 만들고, 질문마다
//! 유사 세그먼트를 검색해 언어 모델로 답변을 생성합니다.
//! 성공한 대화는 SQLite 로그에 기록됩니다.

pub mod cli;
pub mod completion;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod history;
pub mod qa;

// Re-exports
pub use completion::{CompletionProvider, GeminiCompletion};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use error::QaError;
pub use extractor::{load_pdf_bytes, load_pdf_file, Document, Page};
pub use history::{get_data_dir, Interaction, InteractionLog};
pub use qa::{
    chunk, AnswerGenerator, ChunkConfig, QaConfig, QaSession, QueryResult, Retriever,
    ScoredSegment, Segment, SessionState, VectorIndex,
};
