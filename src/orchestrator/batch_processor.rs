//! 命令行宿主 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：启动日志、创建分析服务客户端、展示层和结果缓存
//! 2. **加载候选文件**：把命令行路径转换成 `CandidateFile`
//! 3. **提交与重试**：按配置的方式提交，存在失败文件时按配置自动重试
//! 4. **保存结果**：按配置把成功的结果提交到保存接口
//! 5. **全局统计**：输出成功 / 失败数量

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::clients::AnalysisClient;
use crate::config::Config;
use crate::models::CandidateFile;
use crate::orchestrator::submission::{Orchestrator, SubmissionOptions, SubmissionOutcome};
use crate::services::{ConsolePresenter, FileStore, MemoryStore, ResultMirror};
use crate::utils::logging::{log_candidates_loaded, log_startup, print_final_stats};
use crate::workflow::AggregateView;

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: Orchestrator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let client = AnalysisClient::new(&config).context("创建分析服务客户端失败")?;
        let presenter = Arc::new(ConsolePresenter::new(config.verbose_logging));
        let mirror = ResultMirror::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FileStore::new(config.result_cache_dir.clone())),
        );

        let orchestrator = Orchestrator::new(
            Arc::new(client),
            presenter,
            SubmissionOptions::from(&config),
        )
        .with_mirror(mirror);

        Ok(Self {
            config,
            orchestrator,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self, paths: &[PathBuf]) -> Result<()> {
        let candidates = load_candidates(paths).await;

        let outcome = self
            .orchestrator
            .submit(&candidates)
            .await
            .context("提交失败")?;

        let view = match outcome {
            SubmissionOutcome::Batch(view) => view,
            SubmissionOutcome::Session(mut ctx) => {
                if let Some(message) = ctx.interrupted() {
                    bail!("会话 {} 跟踪中断: {}", ctx.session_id(), message);
                }

                let mut round = 0;
                while ctx.is_retryable() && round < self.config.auto_retry_rounds {
                    round += 1;
                    info!(
                        "\n🔁 自动重试第 {}/{} 轮",
                        round, self.config.auto_retry_rounds
                    );
                    if let Err(e) = self.orchestrator.retry_failed(Some(&mut ctx)).await {
                        warn!("⚠️ 自动重试中止: {}", e);
                        break;
                    }
                }
                ctx.view()
            }
        };

        print_final_stats(view.succeeded_count(), view.failed_count(), view.len());
        self.save_if_enabled(&view).await
    }

    async fn save_if_enabled(&self, view: &AggregateView) -> Result<()> {
        if !self.config.save_results {
            return Ok(());
        }
        if view.succeeded_count() == 0 {
            warn!("⚠️ 没有成功的结果，跳过保存");
            return Ok(());
        }

        self.orchestrator
            .save_results(view)
            .await
            .context("保存结果失败")?;
        Ok(())
    }
}

/// 加载候选文件，无法读取的路径跳过
async fn load_candidates(paths: &[PathBuf]) -> Vec<CandidateFile> {
    info!("\n📁 正在读取待提交的文件...");
    let mut candidates = Vec::with_capacity(paths.len());
    let mut skipped = 0;

    for path in paths {
        match CandidateFile::from_path(path).await {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => {
                warn!("⚠️ 跳过 {}: {}", path.display(), e);
                skipped += 1;
            }
        }
    }

    log_candidates_loaded(candidates.len(), skipped);
    candidates
}
