use crate::domain::model::{CommandOutput, Invocation};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// 外部工具的執行介面。`run` 只在程式無法啟動時回傳 Err，
/// 非零退出碼屬於正常結果，由呼叫端依 `CommandOutput` 判斷
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// 在 PATH 中尋找程式；每次呼叫都重新探測，不快取
    fn resolve(&self, program: &str) -> Option<PathBuf>;

    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    fn is_available(&self, program: &str) -> bool {
        self.resolve(program).is_some()
    }
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// 下載到 `dest`，回傳寫入的位元組數
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}
