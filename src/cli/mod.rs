//! CLI 모듈
//!
//! paperpal CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::completion::GeminiCompletion;
use crate::embedding::{has_api_key, GeminiEmbedding};
use crate::extractor::load_pdf_file;
use crate::history::{get_data_dir, InteractionLog};
use crate::qa::{ChunkConfig, QaConfig, QaSession, QueryResult};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "paperpal")]
#[command(version, about = "PDF 질의응답 RAG 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// chat/ask 공통 옵션
#[derive(Args)]
pub struct QaOptions {
    /// 질의할 PDF 파일 경로
    #[arg(short, long)]
    pub file: PathBuf,

    /// 대화 로그에 기록할 사용자 이름
    #[arg(short, long, default_value = "anonymous")]
    pub user: String,

    /// 질의당 검색할 세그먼트 수
    #[arg(long, default_value = "4")]
    pub top_k: usize,

    /// 최대 세그먼트 크기 (문자 수)
    #[arg(long, default_value = "1000")]
    pub chunk_size: usize,

    /// 세그먼트 간 오버랩 (문자 수)
    #[arg(long, default_value = "100")]
    pub overlap: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// PDF를 인덱싱하고 대화형으로 질문
    Chat {
        #[command(flatten)]
        options: QaOptions,
    },

    /// PDF에 질문 하나를 던지고 종료
    Ask {
        /// 질문
        question: String,

        #[command(flatten)]
        options: QaOptions,
    },

    /// 기록된 대화 조회
    History {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// 사용자 이름 필터
        #[arg(short, long)]
        user: Option<String>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Chat { options } => cmd_chat(options).await,
        Commands::Ask { question, options } => cmd_ask(&question, options).await,
        Commands::History { limit, user } => cmd_history(limit, user.as_deref()),
        Commands::Status => cmd_status(),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// PDF 로드 + 인덱싱까지 마친 세션 준비
async fn prepare_session(options: &QaOptions) -> Result<QaSession> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    let config = QaConfig {
        top_k: options.top_k,
        chunk: ChunkConfig {
            max_characters: options.chunk_size,
            overlap_characters: options.overlap,
        },
        ..QaConfig::default()
    };

    let embedder = GeminiEmbedding::from_env().context("임베딩 프로바이더 초기화 실패")?;
    let completer = GeminiCompletion::from_env().context("완성 프로바이더 초기화 실패")?;
    let session = QaSession::new(Arc::new(embedder), Arc::new(completer), config);

    println!("[*] PDF 로드 중: {}", options.file.display());
    let document = load_pdf_file(&options.file).context("PDF 로드 실패")?;
    println!("    {} 페이지 추출됨", document.page_count());

    if document.is_text_empty() {
        println!("[!] 추출된 텍스트가 없습니다 (스캔본 PDF일 수 있음). 질의는 컨텍스트 없이 동작합니다.");
    }

    println!("[*] 인덱스 빌드 중 (청킹 + 임베딩)...");
    let segment_count = session
        .load_document(&document)
        .await
        .context("인덱스 빌드 실패")?;
    println!("[OK] 인덱스 준비 완료 ({} 세그먼트)\n", segment_count);

    Ok(session)
}

/// 대화형 질의 명령어 (chat)
async fn cmd_chat(options: QaOptions) -> Result<()> {
    let session = prepare_session(&options).await?;
    let log = InteractionLog::open_default().context("대화 로그 열기 실패")?;

    println!("질문을 입력하세요 (빈 줄 또는 exit로 종료):");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let question = line.trim();
        if question.is_empty() || question == "exit" || question == "quit" {
            break;
        }

        // 질의 실패는 해당 질문만 실패시키고 루프는 계속 (인덱스는 Ready 유지)
        match session.ask(question).await {
            Ok(result) => {
                print_result(&result);
                save_interaction(&log, &options.user, &result);
            }
            Err(e) => {
                println!("[!] 질의 실패: {}\n", e);
            }
        }
    }

    println!("[OK] 종료합니다.");
    Ok(())
}

/// 단발 질의 명령어 (ask)
async fn cmd_ask(question: &str, options: QaOptions) -> Result<()> {
    let session = prepare_session(&options).await?;

    let result = session.ask(question).await.context("질의 실패")?;
    print_result(&result);

    let log = InteractionLog::open_default().context("대화 로그 열기 실패")?;
    save_interaction(&log, &options.user, &result);

    Ok(())
}

/// 대화 기록 명령어 (history)
fn cmd_history(limit: usize, user: Option<&str>) -> Result<()> {
    let log = InteractionLog::open_default().context("대화 로그 열기 실패")?;

    let interactions = log.recent(limit, user).context("대화 기록 조회 실패")?;

    if interactions.is_empty() {
        println!("[!] 기록된 대화가 없습니다.");
        return Ok(());
    }

    println!("[OK] 기록된 대화 ({} 건):\n", interactions.len());

    for interaction in interactions {
        println!(
            "  #{:<4} [{}] {}",
            interaction.id,
            interaction.username,
            interaction.timestamp.format("%Y-%m-%d %H:%M")
        );
        println!("        Q: {}", truncate_text(&interaction.question, 80));
        println!("        A: {}", truncate_text(&interaction.answer, 80));
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status() -> Result<()> {
    println!("paperpal v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let data_dir = get_data_dir();
    println!("[*] 데이터 디렉토리: {}", data_dir.display());

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    match InteractionLog::open_default() {
        Ok(log) => match log.count() {
            Ok(count) => println!("[OK] 기록된 대화: {} 건", count),
            Err(e) => println!("[!] 대화 수 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 대화 로그 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 질의 결과 출력
fn print_result(result: &QueryResult) {
    println!("\n{}\n", result.answer.trim());

    if !result.segments.is_empty() {
        println!("참고한 구간:");
        for (i, scored) in result.segments.iter().enumerate() {
            let segment = &scored.segment;
            let pages = if segment.first_page == segment.last_page {
                format!("p.{}", segment.first_page)
            } else {
                format!("p.{}-{}", segment.first_page, segment.last_page)
            };
            println!(
                "  {}. [{}] [점수: {:.4}] {}",
                i + 1,
                pages,
                scored.score,
                truncate_text(&segment.text, 100)
            );
        }
        println!();
    }
}

/// 성공한 질의만 로그에 기록 (실패한 질의는 기록하지 않음)
fn save_interaction(log: &InteractionLog, username: &str, result: &QueryResult) {
    if let Err(e) = log.append(username, &result.question, &result.answer) {
        tracing::warn!("Failed to log interaction: {}", e);
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
