use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// 單一策略嘗試的結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Succeeded(T),
    /// 策略執行了但失敗，交給下一層
    Failed(String),
    /// 前置條件不成立 (工具不存在等)，未實際執行
    Unavailable(String),
}

/// 依序嘗試的一層策略。回傳 Err 代表致命錯誤，整條鏈立即中止
#[async_trait]
pub trait Strategy<C, T>: Send + Sync
where
    C: Sync + ?Sized,
    T: Send,
{
    fn name(&self) -> &str;

    async fn attempt(&self, ctx: &C) -> Result<Attempt<T>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Succeeded,
    Failed,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub strategy: String,
    pub status: AttemptStatus,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct ChainOutcome<T> {
    pub winner: Option<(String, T)>,
    pub attempts: Vec<AttemptRecord>,
}

impl<T> ChainOutcome<T> {
    pub fn succeeded(&self) -> bool {
        self.winner.is_some()
    }

    /// 所有失敗層的原因，供警告或手動指令使用
    pub fn failure_reasons(&self) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| a.status != AttemptStatus::Succeeded)
            .map(|a| {
                format!(
                    "{}: {}",
                    a.strategy,
                    a.reason.as_deref().unwrap_or("no reason given")
                )
            })
            .collect()
    }
}

/// 有序的後備策略清單：第一個成功的策略結束整條鏈
pub struct FallbackChain<C: Sync + ?Sized, T: Send> {
    label: String,
    strategies: Vec<Box<dyn Strategy<C, T>>>,
}

impl<C: Sync + ?Sized, T: Send> FallbackChain<C, T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, strategy: impl Strategy<C, T> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, ctx: &C) -> Result<ChainOutcome<T>> {
        let mut attempts = Vec::new();
        tracing::debug!("[{}] order: {}", self.label, self.strategy_names().join(" -> "));

        for strategy in &self.strategies {
            let name = strategy.name().to_string();
            tracing::debug!("[{}] trying {}", self.label, name);

            match strategy.attempt(ctx).await? {
                Attempt::Succeeded(value) => {
                    tracing::info!("✅ [{}] {} succeeded", self.label, name);
                    attempts.push(AttemptRecord {
                        strategy: name.clone(),
                        status: AttemptStatus::Succeeded,
                        reason: None,
                    });
                    return Ok(ChainOutcome {
                        winner: Some((name, value)),
                        attempts,
                    });
                }
                Attempt::Failed(reason) => {
                    tracing::warn!("⚠️ [{}] {} failed: {}", self.label, name, reason);
                    attempts.push(AttemptRecord {
                        strategy: name,
                        status: AttemptStatus::Failed,
                        reason: Some(reason),
                    });
                }
                Attempt::Unavailable(reason) => {
                    tracing::info!("⏭️ [{}] skipping {} ({})", self.label, name, reason);
                    attempts.push(AttemptRecord {
                        strategy: name,
                        status: AttemptStatus::Unavailable,
                        reason: Some(reason),
                    });
                }
            }
        }

        tracing::warn!("[{}] all {} strategies exhausted", self.label, attempts.len());
        Ok(ChainOutcome {
            winner: None,
            attempts,
        })
    }
}
