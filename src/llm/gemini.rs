use std::time::Duration;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::CONFIG;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, thiserror::Error)]
#[error("Translation failed: {0}")]
pub struct TranslationError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("Image generation failed: {0}")]
pub struct ImageGenerationError(pub String);

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

const GEMINI_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

fn redact_gemini_api_key(text: &str) -> String {
    let key = CONFIG.gemini_api_key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn build_safety_settings() -> Vec<Value> {
    let threshold = match CONFIG.gemini_safety_settings.as_str() {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        _ => "OFF",
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_text_from_response(response: GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            if let Some(parts) = content.parts {
                for part in parts {
                    if let GeminiPart::Text { text } = part {
                        if !text.trim().is_empty() {
                            text_parts.push(text);
                        }
                    }
                }
            }
        }
    }
    text_parts.join("\n")
}

fn extract_images_from_response(response: GeminiResponse) -> Vec<Vec<u8>> {
    let mut images = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            if let Some(parts) = content.parts {
                for part in parts {
                    if let GeminiPart::InlineData { inline_data } = part {
                        if inline_data.mime_type.starts_with("image/") {
                            if let Ok(bytes) = general_purpose::STANDARD.decode(inline_data.data) {
                                images.push(bytes);
                            }
                        }
                    }
                }
            }
        }
    }
    images
}

async fn call_gemini_api(model: &str, payload: Value) -> Result<GeminiResponse> {
    let client = get_http_client();
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
        model, CONFIG.gemini_api_key
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        debug!(target: "llm.gemini", model = model, payload = %truncate_for_log(&payload.to_string(), 2000));
    }

    let response = client
        .post(&url)
        .timeout(GEMINI_REQUEST_TIMEOUT)
        .json(&payload)
        .send()
        .await
        .map_err(|err| anyhow!("Gemini request failed: {}", redact_gemini_api_key(&err.to_string())))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, body_summary) = summarize_error_body(&body);
        warn!("Gemini API error: status={}, body={}", status, body_summary);
        let detail = message.unwrap_or(body_summary);
        return Err(anyhow!(
            "Gemini request failed with status {}: {}",
            status,
            detail
        ));
    }

    Ok(response.json::<GeminiResponse>().await?)
}

fn build_translation_instruction(target_language: &str) -> String {
    format!(
        "You translate image generation prompts into {target_language}. \
         Reply with the translated prompt only, no quotes and no commentary. \
         If the prompt is already in {target_language}, reply with it unchanged."
    )
}

fn compose_translation_content(prompt: &str, language_hint: Option<&str>) -> String {
    let mut content = prompt.to_string();
    if let Some(hint) = language_hint {
        content.push_str(&format!("\n\n(The prompt appears to be written in {hint}.)"));
    }
    content
}

fn build_translation_payload(prompt: &str, language_hint: Option<&str>) -> Value {
    let content = compose_translation_content(prompt, language_hint);

    json!({
        "systemInstruction": {
            "parts": [{ "text": build_translation_instruction(&CONFIG.target_language) }]
        },
        "contents": [{ "role": "user", "parts": [{ "text": content }] }],
        "generationConfig": {
            "temperature": CONFIG.gemini_temperature,
            "topK": CONFIG.gemini_top_k,
            "topP": CONFIG.gemini_top_p,
            "maxOutputTokens": CONFIG.gemini_max_output_tokens,
        },
        "safetySettings": build_safety_settings(),
    })
}

/// Translates a user prompt into the configured generation language. The
/// optional `language_hint` names the language the prompt was detected in.
pub async fn translate_prompt(
    prompt: &str,
    language_hint: Option<&str>,
) -> Result<String, TranslationError> {
    let payload = build_translation_payload(prompt, language_hint);
    let model = CONFIG.gemini_model.as_str();

    let translated = log_llm_timing("gemini", model, "translate_prompt", || async {
        let response = call_gemini_api(model, payload).await?;
        Ok(extract_text_from_response(response))
    })
    .await
    .map_err(|err| TranslationError(err.to_string()))?;

    let translated = translated.trim().to_string();
    if translated.is_empty() {
        return Err(TranslationError(format!(
            "Empty translation response (model: {model})"
        )));
    }
    Ok(translated)
}

/// Generates images for an already-translated prompt. Every returned buffer
/// is a complete encoded image.
pub async fn generate_image(prompt: &str) -> Result<Vec<Vec<u8>>, ImageGenerationError> {
    let payload = json!({
        "systemInstruction": {
            "parts": [{ "text": "Generate an image based on the prompt. CRITICAL: respond with an image, NOT TEXT." }]
        },
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"]
        },
        "safetySettings": build_safety_settings(),
    });

    let model = CONFIG.gemini_image_model.as_str();
    let images = log_llm_timing("gemini", model, "generate_image", || async {
        let response = call_gemini_api(model, payload).await?;
        Ok(extract_images_from_response(response))
    })
    .await
    .map_err(|err| ImageGenerationError(err.to_string()))?;

    if images.is_empty() {
        return Err(ImageGenerationError(format!(
            "No images returned (model: {model})"
        )));
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_response(raw: Value) -> GeminiResponse {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn extracts_and_joins_text_parts() {
        let response = parse_response(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "a cat" },
                        { "text": "  " },
                        { "text": "on a roof" }
                    ]
                }
            }]
        }));
        assert_eq!(extract_text_from_response(response), "a cat\non a roof");
    }

    #[test]
    fn empty_candidates_yield_empty_text() {
        let response = parse_response(json!({ "candidates": [] }));
        assert_eq!(extract_text_from_response(response), "");

        let response = parse_response(json!({}));
        assert_eq!(extract_text_from_response(response), "");
    }

    #[test]
    fn extracts_only_inline_image_parts() {
        let encoded = general_purpose::STANDARD.encode(b"fake-png-bytes");
        let response = parse_response(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "here is your image" },
                        { "inlineData": { "mimeType": "image/png", "data": encoded } },
                        { "inlineData": { "mimeType": "audio/mp3", "data": "AAAA" } }
                    ]
                }
            }]
        }));

        let images = extract_images_from_response(response);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0], b"fake-png-bytes");
    }

    #[test]
    fn error_body_summary_prefers_nested_message() {
        let (message, _) =
            summarize_error_body(r#"{"error": {"message": "quota exceeded", "code": 429}}"#);
        assert_eq!(message.as_deref(), Some("quota exceeded"));

        let (message, summary) = summarize_error_body("plain text failure");
        assert_eq!(message, None);
        assert_eq!(summary, "plain text failure");

        let (message, summary) = summarize_error_body("   ");
        assert_eq!(message, None);
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn translation_content_carries_the_language_hint() {
        let content = compose_translation_content("нарисуй кота", Some("Russian"));
        assert!(content.starts_with("нарисуй кота"));
        assert!(content.contains("written in Russian"));

        let content = compose_translation_content("draw a cat", None);
        assert_eq!(content, "draw a cat");
    }

    #[test]
    fn translation_instruction_names_the_target_language() {
        let instruction = build_translation_instruction("English");
        assert!(instruction.contains("into English"));
        assert!(instruction.contains("unchanged"));
    }
}
