//! Prompts and schemas for caption generation calls.

/// System instruction shared by every provider.
pub const CAPTION_SYSTEM_PROMPT: &str = "You are an image captioning assistant. \
Always respond with valid JSON only, no markdown formatting or code blocks.";

/// JSON schema for the structured caption output.
pub fn caption_set_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "short": {
                "type": "string",
                "description": "A few words naming the main subject"
            },
            "medium": {
                "type": "string",
                "description": "One sentence describing the scene"
            },
            "detailed": {
                "type": "string",
                "description": "An accessibility-oriented description suitable as alt text for a screen reader user"
            }
        },
        "required": ["short", "medium", "detailed"],
        "additionalProperties": false
    })
}

/// Build the user prompt sent alongside the image.
pub fn build_caption_prompt() -> String {
    r#"Describe this image at three levels of detail.

Return a JSON object with exactly these fields:
- "short": a caption of at most 8 words naming the main subject.
- "medium": one sentence (at most 25 words) describing the subject and setting.
- "detailed": an accessibility-oriented description of 2-4 sentences for someone who cannot see the image. Mention people, objects, colours, text visible in the image, and the overall mood. Do not start with "This image shows".

Rules:
- Describe only what is visible. Do not guess names of people.
- Every field must be a non-empty string.
- Respond with the JSON object only."#
        .to_string()
}
