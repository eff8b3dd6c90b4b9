//! 문서 로더 모듈
//!
//! PDF 바이트에서 페이지 단위 텍스트를 추출합니다.
//! 추출 품질(텍스트 순서, 컬럼 처리 등)은 pdf-extract 크레이트에 위임합니다.

mod pdf;

pub use pdf::{load_pdf_bytes, load_pdf_file};

// ============================================================================
// Types
// ============================================================================

/// 추출된 한 페이지
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 페이지 번호 (1부터 시작)
    pub number: usize,
    /// 추출된 원본 텍스트 (이미지 전용 페이지는 빈 문자열)
    pub text: String,
}

/// 로드된 문서 - 페이지의 순서 있는 시퀀스
///
/// 로드 이후에는 변경되지 않습니다.
#[derive(Debug, Clone)]
pub struct Document {
    pages: Vec<Page>,
}

impl Document {
    /// 페이지 목록으로 문서 생성
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// 페이지 시퀀스
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// 페이지 수
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 모든 페이지가 비어있는지 여부 (스캔본 PDF 등)
    pub fn is_text_empty(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================
