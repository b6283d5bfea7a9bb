pub mod providers;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// LLM provider types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LLMProvider {
    OpenRouter,
    OpenAI,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Retry budget for failed generation requests
    pub max_retries: u32,
    /// Optional attribution headers (OpenRouter's HTTP-Referer / X-Title)
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenRouter,
            api_key: None,
            model: "deepseek/deepseek-chat-v3-0324:free".to_string(),
            max_tokens: 2048,
            temperature: 0.4,
            timeout_seconds: 120,
            max_retries: 1,
            site_url: None,
            site_name: None,
        }
    }
}

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse>;
    fn provider_type(&self) -> LLMProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>> {
    match config.provider {
        LLMProvider::OpenRouter => Ok(Box::new(providers::OpenRouterProvider::new(
            config.clone(),
        )?)),
        LLMProvider::OpenAI => Ok(Box::new(providers::OpenAIProvider::new(config.clone())?)),
    }
}

/// Build the instructional prompt handed to the text-generation service.
///
/// The response format requested here is what the highlight parser expects:
/// an `Interesting_Moments:` fenced block of numbered Title / Start_Time /
/// End_Time / Why_Interesting records. Cut points are requested too but are
/// not consumed downstream.
pub fn highlight_prompt(transcript: &str) -> String {
    format!(
        r#"I am providing you with the transcript of a video. Your task is to analyze the full transcript and extract structured insights. This output will be used in a further processing phase, so **strictly follow the format** provided below and ensure **consistency and machine-readability**.

---

### Your tasks:

#### 1. Identify the **most interesting moments** in the video:
These can be engaging conversations, funny remarks, insightful commentary, or high-energy moments. For each moment, provide:
- **Title**: A short, descriptive title.
- **Start_Time**: The beginning timestamp `hh:mm:ss`.
- **End_Time**: The ending timestamp `hh:mm:ss`.
- **Why_Interesting**: 1-2 concise sentences explaining the appeal.

#### 2. Suggest **good cut points**:
These are natural transitions or breaks (e.g., topic shifts, pauses). For each cut point, provide:
- **Cut_Timestamp**: The timestamp `hh:mm:ss`.
- **Reason**: A short justification for the cut.

---

### REQUIRED OUTPUT FORMAT (strictly follow this markdown structure):

#### Interesting_Moments:
```
1.
Title: [Title]
Start_Time: hh:mm:ss
End_Time: hh:mm:ss
Why_Interesting: [Explanation]

2.
Title: [Title]
Start_Time: hh:mm:ss
End_Time: hh:mm:ss
Why_Interesting: [Explanation]
```

#### Suggested_Cut_Points:
```
1.
Cut_Timestamp: hh:mm:ss
Reason: [Explanation]

2.
Cut_Timestamp: hh:mm:ss
Reason: [Explanation]
```
---

Please output only in the exact format above. Here is the transcript:

{transcript}
"#,
        transcript = transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_transcript_and_format() {
        let prompt = highlight_prompt("[00:00:01] hello there");
        assert!(prompt.contains("[00:00:01] hello there"));
        assert!(prompt.contains("Interesting_Moments:"));
        assert!(prompt.contains("Start_Time: hh:mm:ss"));
        // The template's own fenced examples must survive formatting.
        assert!(prompt.matches("```").count() >= 4);
    }

    #[test]
    fn test_create_llm_requires_api_key() {
        let config = LLMConfig::default();
        assert!(create_llm(&config).is_err());

        let config = LLMConfig {
            api_key: Some("sk-test".to_string()),
            ..LLMConfig::default()
        };
        assert!(create_llm(&config).is_ok());
    }
}
