//! 评分服务后端 - 基础设施层
//!
//! 持有唯一的网络客户端，只暴露"发送一次请求、拿回一段文本"的能力
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ScoringError;
use crate::models::RecordId;

/// 发送给评分服务的一次请求
#[derive(Debug, Clone)]
pub struct ScoringRequest {
    /// 分块序号（仅用于日志）
    pub chunk_index: usize,
    /// 本次请求包含的记录 ID
    pub record_ids: Vec<RecordId>,
    pub system_message: String,
    /// 已嵌入任务描述和序列化记录的用户消息
    pub user_message: String,
}

/// 外部评分服务
///
/// 职责：
/// - 一次调用对应一次网络请求
/// - 返回原始文本，不做解析
/// - 不认识分块 / 检查点
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn complete(&self, request: &ScoringRequest) -> Result<String, ScoringError>;
}

/// 基于 OpenAI 兼容接口的评分服务
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiBackend {
    /// 创建新的后端，凭据全部来自传入的配置
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl ScoringService for OpenAiBackend {
    async fn complete(&self, request: &ScoringRequest) -> Result<String, ScoringError> {
        debug!(
            "[分块 {}] 调用评分服务，模型: {}，消息长度: {} 字符",
            request.chunk_index + 1,
            self.model_name,
            request.user_message.len()
        );

        let to_transport = |e: OpenAIError| ScoringError::transport(&self.model_name, e);

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_message.as_str())
            .build()
            .map_err(to_transport)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user_message.as_str())
            .build()
            .map_err(to_transport)?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(to_transport)?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            warn!("[分块 {}] 评分服务调用失败: {}", request.chunk_index + 1, e);
            to_transport(e)
        })?;

        debug!("[分块 {}] 评分服务调用成功", request.chunk_index + 1);

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ScoringError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试真实评分服务连通性
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_live_completion -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_live_completion() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env().unwrap_or_default();
        let backend = OpenAiBackend::new(&config);
        let request = ScoringRequest {
            chunk_index: 0,
            record_ids: vec![RecordId::Int(1)],
            system_message: "你是一个简洁的助手，只输出 JSON。".to_string(),
            user_message: r#"为记录 {"ID":1,"empresa":"Acme"} 打 1-10 分，返回 [{"ID":1,"score":分数,"rationale":"理由"}]"#.to_string(),
        };

        match backend.complete(&request).await {
            Ok(response) => {
                println!("\n========== 评分服务响应 ==========");
                println!("{}", response);
                println!("==================================\n");
                assert!(!response.is_empty());
            }
            Err(e) => panic!("评分服务调用失败: {}", e),
        }
    }
}
