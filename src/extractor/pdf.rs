//! PDF 텍스트 추출
//!
//! pdf-extract 크레이트로 PDF 바이트에서 텍스트를 추출하고
//! 폼피드/페이지 구분자 기준으로 페이지를 분리합니다.

use std::path::Path;

use crate::error::{QaError, Result};

use super::{Document, Page};

/// PDF 바이트에서 문서 로드
///
/// 추출된 텍스트를 페이지 단위로 분리하여 [`Document`]를 반환합니다.
/// 텍스트가 전혀 없는 PDF(스캔본 등)는 빈 페이지 하나짜리 문서가 됩니다.
pub fn load_pdf_bytes(bytes: &[u8]) -> Result<Document> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| QaError::Load(format!("PDF text extraction failed: {}", e)))?;

    if text.trim().is_empty() {
        tracing::warn!("No text extracted from PDF. It might be a scanned document.");
        return Ok(Document::new(vec![Page {
            number: 1,
            text: String::new(),
        }]));
    }

    let pages = split_pdf_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page { number: i + 1, text })
        .collect();

    Ok(Document::new(pages))
}

/// 파일 경로에서 PDF 문서 로드
pub fn load_pdf_file(path: &Path) -> Result<Document> {
    let bytes = std::fs::read(path)
        .map_err(|e| QaError::Load(format!("Failed to read PDF {:?}: {}", path, e)))?;
    load_pdf_bytes(&bytes)
}

/// PDF 텍스트를 페이지별로 분리
fn split_pdf_pages(text: &str) -> Vec<String> {
    // 폼피드 문자 (\x0c)로 페이지 분리 시도
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    // 페이지 구분자 패턴으로 시도 (일부 PDF에서 사용)
    // 예: "--- Page 1 ---" 또는 "=== 2 ==="
    let page_pattern = regex::Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
        .expect("Invalid regex");

    if page_pattern.is_match(text) {
        let pages: Vec<String> = page_pattern
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    // 분리 실패 - 전체를 하나의 페이지로
    vec![text.to_string()]
}

// ============================================================================
// Tests
// ============================================================================
