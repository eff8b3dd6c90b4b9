//! 텍스트 청킹 모듈
//!
//! 페이지 텍스트를 임베딩에 적합한 크기의 오버랩 세그먼트로 분할합니다.
//! 같은 입력은 항상 같은 세그먼트 경계를 생성합니다 (결정적).

use crate::extractor::Page;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 세그먼트 크기 (문자 수)
    pub max_characters: usize,
    /// 연속 세그먼트 간 공유 문맥 크기 (문자 수)
    pub overlap_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_characters: 1000,
            overlap_characters: 100,
        }
    }
}

impl ChunkConfig {
    /// 윈도우 이동 간격
    ///
    /// 오버랩이 최대 크기 이상으로 설정되어도 최소 1문자씩은 전진하여
    /// 무한 루프를 방지합니다.
    fn step(&self) -> usize {
        self.max_characters
            .saturating_sub(self.overlap_characters)
            .max(1)
    }
}

// ============================================================================
// Segment
// ============================================================================

/// 검색 단위가 되는 문서 텍스트 구간
///
/// 청킹 시점에 id와 페이지 범위가 확정되며, 임베딩은 인덱스 빌드 시
/// 한 번만 부여됩니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// 순차 인덱스 (0부터, 문서 내 유일)
    pub id: usize,
    /// 세그먼트 텍스트 (max_characters 이하)
    pub text: String,
    /// 출처 페이지 범위 시작 (1부터)
    pub first_page: usize,
    /// 출처 페이지 범위 끝
    pub last_page: usize,
}

// ============================================================================
// Chunking
// ============================================================================

/// 페이지 시퀀스를 세그먼트로 분할
///
/// 페이지 경계를 메타데이터로 보존하기 위해 페이지별로 윈도우를 적용합니다.
/// 빈 페이지는 세그먼트를 생성하지 않으며, 모든 페이지가 비어있으면
/// 빈 목록을 반환합니다 (유효한 퇴화 인덱스).
pub fn chunk(pages: &[Page], config: &ChunkConfig) -> Vec<Segment> {
    let mut segments = Vec::new();

    for page in pages {
        let text = page.text.trim();
        if text.is_empty() {
            continue;
        }

        for window in split_windows(text, config) {
            segments.push(Segment {
                id: segments.len(),
                text: window,
                first_page: page.number,
                last_page: page.number,
            });
        }
    }

    segments
}

/// 텍스트를 문자 단위 슬라이딩 윈도우로 분할
///
/// 문자 수 기준으로 동작하며 UTF-8 경계를 깨지 않습니다.
fn split_windows(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();

    if chars.len() <= config.max_characters {
        return vec![text.to_string()];
    }

    let step = config.step();
    let mut windows = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.max_characters).min(chars.len());
        let window: String = chars[start..end].iter().collect();

        let trimmed = window.trim();
        if !trimmed.is_empty() {
            windows.push(trimmed.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start += step;
    }

    windows
}

// ============================================================================
// Tests
// ============================================================================
