//! Optional LLM-written narrative summaries for insight reports.
//!
//! When `insights.narrative.enabled` is set, the insights endpoint asks a chat
//! model to turn the computed scores into two or three sentences an account
//! manager can paste into a check-in note. Any failure here degrades the
//! report to scores-only; it never fails the request.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use tracing::{instrument, warn};

use crate::analytics::{ChurnRisk, SpenderTier};
use crate::config::NarrativeConfig;

/// The computed scores a narrative is written from.
#[derive(Debug, Clone)]
pub struct NarrativeInputs {
    pub display_name: String,
    pub spender_score: f64,
    pub spender_tier: SpenderTier,
    pub churn_score: f64,
    pub churn_risk: ChurnRisk,
}

/// Generate a short narrative for the given scores, or `None` when narrative
/// generation is disabled or the upstream call fails.
#[instrument(skip_all, fields(customer = %inputs.display_name))]
pub async fn generate(config: &NarrativeConfig, inputs: &NarrativeInputs) -> Option<String> {
    if !config.enabled {
        return None;
    }
    let model = config.model.as_deref()?;

    let mut openai_config = OpenAIConfig::new();
    if let Some(api_key) = &config.api_key {
        openai_config = openai_config.with_api_key(api_key);
    }
    let client = Client::with_config(openai_config);

    let prompt = format!(
        "Customer: {}\nSpender score: {:.0}/100 ({:?})\nChurn score: {:.0}/100 ({:?})",
        inputs.display_name, inputs.spender_score, inputs.spender_tier, inputs.churn_score, inputs.churn_risk,
    );

    let request = match CreateChatCompletionRequestArgs::default()
        .model(model)
        .max_tokens(160_u32)
        .messages([
            ChatCompletionRequestSystemMessageArgs::default()
                .content(
                    "You summarize customer health metrics for an account manager. \
                     Two or three plain sentences, no markdown, no advice beyond the numbers.",
                )
                .build()
                .ok()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default().content(prompt).build().ok()?.into(),
        ])
        .build()
    {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to build narrative request: {}", e);
            return None;
        }
    };

    match client.chat().create(request).await {
        Ok(response) => response.choices.into_iter().next().and_then(|choice| choice.message.content),
        Err(e) => {
            warn!("Narrative generation failed, returning scores only: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> NarrativeInputs {
        NarrativeInputs {
            display_name: "Test Customer".to_string(),
            spender_score: 40.0,
            spender_tier: SpenderTier::Regular,
            churn_score: 20.0,
            churn_risk: ChurnRisk::Low,
        }
    }

    #[tokio::test]
    async fn test_disabled_narrative_is_none() {
        let config = NarrativeConfig::default();
        assert!(!config.enabled);
        assert_eq!(generate(&config, &inputs()).await, None);
    }

    #[tokio::test]
    async fn test_enabled_without_model_is_none() {
        let config = NarrativeConfig {
            enabled: true,
            model: None,
            api_key: None,
        };
        assert_eq!(generate(&config, &inputs()).await, None);
    }
}
