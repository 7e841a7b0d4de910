use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::ScoreBounds;

/// 重试间隔策略
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// 每次等待相同时间
    Fixed,
    /// 每次等待时间翻倍，不超过上限
    Exponential,
}

impl FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Backoff::Fixed),
            "exponential" | "exp" => Ok(Backoff::Exponential),
            other => Err(format!("未知的退避策略: {}", other)),
        }
    }
}

/// 单个分块的重试策略
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（包含第一次）
    pub max_retries: usize,
    /// 基础等待时间
    pub retry_delay: Duration,
    pub backoff: Backoff,
    /// 指数退避的等待上限
    pub max_retry_delay: Duration,
}

impl RetryPolicy {
    /// 第 `attempt` 次（从 1 开始）失败后应等待的时间
    pub fn delay_after(&self, attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.retry_delay,
            Backoff::Exponential => {
                let shift = attempt.saturating_sub(1).min(16) as u32;
                self.retry_delay
                    .saturating_mul(1u32 << shift)
                    .min(self.max_retry_delay)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.backoff == Backoff::Exponential && self.max_retry_delay < self.retry_delay {
            return Err(ConfigError::InvalidBackoff {
                reason: format!(
                    "指数退避上限 {:?} 小于基础等待时间 {:?}",
                    self.max_retry_delay, self.retry_delay
                ),
            });
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            backoff: Backoff::Fixed,
            max_retry_delay: Duration::from_secs(60),
        }
    }
}

/// 程序配置
///
/// 所有参数都显式传入各组件，不存在全局可变状态。
#[derive(Clone, Debug)]
pub struct Config {
    /// 每个分块的记录数
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    /// 同时处理的分块数量
    pub max_concurrent_chunks: usize,
    /// 单个分块（包含全部重试）的超时时间
    pub chunk_timeout: Duration,
    pub score_bounds: ScoreBounds,
    /// 记录 ID 字段名
    pub id_field: String,
    // --- 文件路径 ---
    pub records_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub output_path: PathBuf,
    pub unresolved_path: PathBuf,
    /// 任务描述文件，未设置时使用 `task_description`
    pub task_file: Option<PathBuf>,
    pub task_description: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: 20,
            retry: RetryPolicy::default(),
            max_concurrent_chunks: 4,
            chunk_timeout: Duration::from_secs(300),
            score_bounds: ScoreBounds::default(),
            id_field: "ID".to_string(),
            records_path: PathBuf::from("records.json"),
            checkpoint_path: PathBuf::from("checkpoint.jsonl"),
            output_path: PathBuf::from("scores.json"),
            unresolved_path: PathBuf::from("unresolved.txt"),
            task_file: None,
            task_description: None,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_temperature: 0.3,
            llm_max_tokens: 4096,
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置的项使用默认值
    ///
    /// 设置了但无法解析的值会返回错误，而不是静默回退。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从任意键值来源读取配置（便于测试）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let default = Self::default();
        let retry = RetryPolicy {
            max_retries: parse_or(&lookup, "MAX_RETRIES", default.retry.max_retries)?,
            retry_delay: Duration::from_millis(parse_or(
                &lookup,
                "RETRY_DELAY_MS",
                default.retry.retry_delay.as_millis() as u64,
            )?),
            backoff: parse_or(&lookup, "RETRY_BACKOFF", default.retry.backoff)?,
            max_retry_delay: Duration::from_millis(parse_or(
                &lookup,
                "MAX_RETRY_DELAY_MS",
                default.retry.max_retry_delay.as_millis() as u64,
            )?),
        };

        Ok(Self {
            chunk_size: parse_or(&lookup, "CHUNK_SIZE", default.chunk_size)?,
            retry,
            max_concurrent_chunks: parse_or(
                &lookup,
                "MAX_CONCURRENT_CHUNKS",
                default.max_concurrent_chunks,
            )?,
            chunk_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CHUNK_TIMEOUT_SECS",
                default.chunk_timeout.as_secs(),
            )?),
            score_bounds: ScoreBounds::new(
                parse_or(&lookup, "SCORE_MIN", default.score_bounds.min)?,
                parse_or(&lookup, "SCORE_MAX", default.score_bounds.max)?,
            ),
            id_field: lookup("ID_FIELD").unwrap_or(default.id_field),
            records_path: lookup("RECORDS_PATH").map(PathBuf::from).unwrap_or(default.records_path),
            checkpoint_path: lookup("CHECKPOINT_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.checkpoint_path),
            output_path: lookup("OUTPUT_PATH").map(PathBuf::from).unwrap_or(default.output_path),
            unresolved_path: lookup("UNRESOLVED_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.unresolved_path),
            task_file: lookup("TASK_FILE").map(PathBuf::from),
            task_description: lookup("TASK_DESCRIPTION"),
            verbose_logging: parse_or(&lookup, "VERBOSE_LOGGING", default.verbose_logging)?,
            llm_api_key: lookup("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: lookup("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: lookup("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_temperature: parse_or(&lookup, "LLM_TEMPERATURE", default.llm_temperature)?,
            llm_max_tokens: parse_or(&lookup, "LLM_MAX_TOKENS", default.llm_max_tokens)?,
        })
    }

    /// 校验编排参数，任何一项不合法都会中止运行
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::NonPositiveChunkSize);
        }
        if self.max_concurrent_chunks == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.chunk_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.score_bounds.min > self.score_bounds.max {
            return Err(ConfigError::InvalidScoreBounds {
                min: self.score_bounds.min,
                max: self.score_bounds.max,
            });
        }
        self.retry.validate()
    }

    /// 校验真实评分服务所需的配置
    pub fn validate_backend(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::MissingSetting {
                name: "LLM_API_KEY".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var_name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match lookup(var_name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 20);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.retry_delay, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_has_no_embedded_api_key() {
        let config = Config::default();
        assert!(matches!(
            config.validate_backend(),
            Err(ConfigError::MissingSetting { .. })
        ));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("CHUNK_SIZE", "15"),
            ("RETRY_BACKOFF", "exponential"),
            ("RETRY_DELAY_MS", "250"),
            ("SCORE_MAX", "5"),
            ("ID_FIELD", "nit"),
        ]))
        .unwrap();

        assert_eq!(config.chunk_size, 15);
        assert_eq!(config.retry.backoff, Backoff::Exponential);
        assert_eq!(config.retry.retry_delay, Duration::from_millis(250));
        assert_eq!(config.score_bounds, ScoreBounds::new(1, 5));
        assert_eq!(config.id_field, "nit");
    }

    #[test]
    fn test_negative_chunk_size_is_parse_error() {
        let err = Config::from_lookup(lookup_from(&[("CHUNK_SIZE", "-3")])).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarParseFailed { var_name, .. } if var_name == "CHUNK_SIZE"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.chunk_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositiveChunkSize)));

        let mut config = Config::default();
        config.retry.max_retries = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRetries)));

        let mut config = Config::default();
        config.score_bounds = ScoreBounds::new(10, 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidScoreBounds { .. })
        ));

        let mut config = Config::default();
        config.retry.backoff = Backoff::Exponential;
        config.retry.max_retry_delay = Duration::from_secs(1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackoff { .. })
        ));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: 6,
            retry_delay: Duration::from_secs(5),
            backoff: Backoff::Exponential,
            max_retry_delay: Duration::from_secs(30),
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(2), Duration::from_secs(10));
        assert_eq!(policy.delay_after(3), Duration::from_secs(20));
        assert_eq!(policy.delay_after(4), Duration::from_secs(30));
    }

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), policy.delay_after(3));
    }
}
