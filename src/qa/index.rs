//! 벡터 인덱스 - 인메모리 코사인 유사도 검색
//!
//! (세그먼트, 임베딩) 쌍을 메모리에 보관하고 선형 스캔으로
//! 최근접 이웃을 찾습니다. 빌드 이후에는 읽기 전용입니다.
//! 동일 인터페이스로 영속 인덱스를 교체할 수 있도록 빌드/질의만 노출합니다.

use crate::error::{QaError, Result};

use super::chunker::Segment;

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 - 세그먼트와 유사도 스코어
///
/// 스코어는 랭킹 내부 용도지만 관측/테스트를 위해 유지합니다.
#[derive(Debug, Clone)]
pub struct ScoredSegment {
    /// 검색된 세그먼트
    pub segment: Segment,
    /// 코사인 유사도 (-1.0 ~ 1.0, 높을수록 유사)
    pub score: f32,
}

/// 인덱스 내부 엔트리
///
/// 임베딩은 빌드 시 한 번 부여되며 이후 변경되지 않습니다.
#[derive(Debug, Clone)]
struct IndexEntry {
    segment: Segment,
    embedding: Vec<f32>,
}

// ============================================================================
// VectorIndex
// ============================================================================

/// 한 문서의 모든 세그먼트를 소유하는 인메모리 벡터 인덱스
///
/// 단일 벌크 연산으로 빌드되며 증분 삽입/삭제는 지원하지 않습니다.
/// 새 문서 업로드 시 인덱스 전체가 교체됩니다.
#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
}

impl VectorIndex {
    /// 세그먼트와 임베딩으로 인덱스 빌드
    ///
    /// 모든 임베딩의 차원이 같아야 합니다. 개수나 차원이 맞지 않으면
    /// 프로바이더 출력 불변식 위반이므로 빌드가 실패합니다.
    pub fn build(segments: Vec<Segment>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if segments.len() != embeddings.len() {
            return Err(QaError::Embedding(format!(
                "Embedding count mismatch: {} segments, {} embeddings",
                segments.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);

        if !embeddings.is_empty() && dimension == 0 {
            return Err(QaError::Embedding(
                "Provider returned zero-dimension embeddings".to_string(),
            ));
        }

        for (segment, embedding) in segments.iter().zip(embeddings.iter()) {
            if embedding.len() != dimension {
                return Err(QaError::Embedding(format!(
                    "Dimension mismatch for segment {}: expected {}, got {}",
                    segment.id,
                    dimension,
                    embedding.len()
                )));
            }
        }

        let entries = segments
            .into_iter()
            .zip(embeddings)
            .map(|(segment, embedding)| IndexEntry { segment, embedding })
            .collect();

        Ok(Self { entries, dimension })
    }

    /// 세그먼트가 하나도 없는 퇴화 인덱스
    ///
    /// 모든 질의가 빈 컨텍스트를 반환하지만 유효한 인덱스입니다.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            dimension: 0,
        }
    }

    /// 질의 벡터와 가장 유사한 세그먼트 상위 k개
    ///
    /// 스코어 내림차순 정렬, 동점은 세그먼트 id 오름차순 (결정적).
    /// k가 세그먼트 수보다 커도 에러 없이 전체를 반환합니다.
    pub fn query(&self, vector: &[f32], k: usize) -> Vec<ScoredSegment> {
        let mut scored: Vec<ScoredSegment> = self
            .entries
            .iter()
            .map(|entry| ScoredSegment {
                segment: entry.segment.clone(),
                score: cosine_similarity(&entry.embedding, vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.segment.id.cmp(&b.segment.id))
        });
        scored.truncate(k);
        scored
    }

    /// 세그먼트 개수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 빈 인덱스 여부
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 임베딩 차원 (빈 인덱스는 0)
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 길이가 다르거나 영벡터가 포함되면 0.0을 반환합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
