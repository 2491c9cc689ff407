//! 基础设施错误
//!
//! 共享层只关心启动阶段的失败（配置、数据库连接、可观测性初始化），
//! 业务错误由各服务自行定义。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedError {
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("可观测性初始化失败: {0}")]
    Observability(String),
}

pub type Result<T> = std::result::Result<T, SharedError>;

impl SharedError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::Observability(_) => "OBSERVABILITY_ERROR",
        }
    }
}
