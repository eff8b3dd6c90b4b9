//! 에러 타입 정의
//!
//! QA 파이프라인 단계별 에러 분류입니다.
//! 모든 에러는 호출자에게 그대로 전파되며, 재시도는 프로바이더 어댑터 내부에서만 수행합니다.

use thiserror::Error;

/// QA 파이프라인 에러
///
/// 어느 단계(load / embed / generate)에서 실패했는지 식별 가능하도록 분류합니다.
/// 에러 메시지에 API 키 등 자격 증명은 포함하지 않습니다.
#[derive(Debug, Error)]
pub enum QaError {
    /// 문서 파싱/추출 실패 (손상된 파일, 지원하지 않는 인코딩 등)
    ///
    /// 업로드 시도 자체가 실패한 것이므로 인덱스는 생성되지 않습니다.
    #[error("Failed to load document: {0}")]
    Load(String),

    /// 임베딩 프로바이더 실패 (연결 불가 또는 입력 거부)
    ///
    /// 빌드 중이면 인덱스가 생성되지 않고, 질의 중이면 해당 질의만 실패합니다.
    #[error("Embedding provider error: {0}")]
    Embedding(String),

    /// 언어 모델 호출 실패 (네트워크, rate limit, 잘못된 자격 증명)
    ///
    /// 해당 질의만 실패하며, 실패한 질의는 대화 로그에 기록하지 않습니다.
    #[error("Completion provider error: {0}")]
    Generation(String),

    /// 인덱스가 없는 상태에서 질의 시도
    #[error("No document has been indexed yet")]
    NotReady,

    /// 인덱스 빌드 진행 중에 질의 시도
    #[error("Index build is in progress, try again shortly")]
    IndexBuilding,
}

/// QA 연산용 Result 별칭
pub type Result<T> = std::result::Result<T, QaError>;
