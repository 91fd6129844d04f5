use once_cell::sync::Lazy;
use serde_json::{json, Value};

/// Instruction sent with every capture. The model is told to answer with a
/// single JSON object carrying the detected language plus both texts.
pub const TRANSLATE_PROMPT: &str = r#"
    Role: Professional Image Text Recognizer and Translator

    Languages:
      - Image Text: Automatically detect (Japanese or English)
      - Translation: Translate to the other language (English or Japanese)

    Instructions:
    1. Accurately transcribe the text in the image, detecting whether it's in Japanese or English.
    2. Preserve the original text format and structure:
        - Maintain bullet points, numbered lists, and other formatting elements.
        - Keep line breaks and paragraph structures intact.
        - Preserve any special characters or symbols used for formatting.
    3. Refine the transcription:
        - Retain all meaningful punctuation.
        - Accurately capture any emphasis (bold, italic, underline) if discernible.
    4. Translate the transcribed text to the other language (Japanese to English or English to Japanese).
    5. In the translation:
        - Maintain the original formatting, including lists and line breaks.
        - Preserve the tone, style, and intent of the original text.
        - Adapt idiomatic expressions and cultural nuances appropriately.
    6. Ensure both the transcription and translation accurately reflect the original image text in content and format.
    7. Always provide both the original text and its translation, regardless of the detected language.
    8. Output the result in the following JSON format:
        ```json
        {
            "detected_language": "The detected language (either 'ja' or 'en')",
            "ja": "The Japanese text (either transcription or translation)",
            "en": "The English text (either transcription or translation)"
        }
        ```
"#;

/// Response schema passed to the generation config so the API constrains its
/// own output to the translation shape.
pub static RESPONSE_JSON_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "OBJECT",
        "properties": {
            "detected_language": { "type": "STRING", "enum": ["ja", "en"] },
            "ja": { "type": "STRING" },
            "en": { "type": "STRING" },
        },
        "required": ["detected_language", "ja", "en"],
    })
});
