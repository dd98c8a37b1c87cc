use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 进程运行模式
///
/// 测试模式下不自动启动轮询投递器，测试通过 `drain_once` 手动驱动。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
    Test,
}

impl RunMode {
    pub const ENV: &'static str = "OUTBOX_ENV";

    /// 读取 `OUTBOX_ENV`；未设置或无法识别时回落为 `Development`
    pub fn from_env() -> Self {
        std::env::var(Self::ENV)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn is_test(self) -> bool {
        self == RunMode::Test
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(RunMode::Development),
            "production" | "prod" => Ok(RunMode::Production),
            "test" => Ok(RunMode::Test),
            other => Err(format!("unknown run mode: {other}")),
        }
    }
}
