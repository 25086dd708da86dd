//! Prompt builder for the two text-completion calls.
//!
//! [`PromptBuilder`] constructs `(system_msg, user_msg)` pairs:
//! * **Passage** (`passage_chat`): a short Argentinian Spanish text that
//!   must use every vocabulary entry.
//! * **Analysis** (`analysis_chat`): per-word vocabulary matching, a
//!   tokenized English translation and the word-to-token alignment, returned
//!   as one JSON object.
//!
//! The analysis input is built separately by
//! [`analysis_request`](PromptBuilder::analysis_request) so callers can keep
//! the exact JSON that was sent.

use serde_json::{json, Value};

use crate::analysis::{ALIGNMENT_FIELD, SOURCE_WORDS_FIELD, TARGET_TOKENS_FIELD};
use crate::llm::vocabulary::VocabularyItem;
use crate::timing::IndexedWordSegment;

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

const PASSAGE_SYSTEM_INSTRUCTION: &str = "\
You are an AI assistant helping a Russian person living in Argentina learn Spanish. They are fluent in English.
Generate a short, cohesive story or conversational text in Argentinian Spanish (using 'vos' conjugation, local slang where appropriate and natural).
The text MUST incorporate the vocabulary words/phrases provided by the user.
Output ONLY the generated Spanish text, with no other formatting, labels, or explanation.";

/// Schema and instructions.  `{source}`, `{target}` and `{alignment}` are
/// replaced by the wire field names.
const ANALYSIS_SYSTEM_TEMPLATE: &str = r#"You are an AI assistant specialized in aligning Spanish and English text and identifying vocabulary usage.
Your task is to analyze a sequence of indexed Spanish word segments ("indexed_word_segments") based on provided vocabulary ("vocabulary").
You MUST provide the analysis in the JSON format specified below, focusing ONLY on original words, vocabulary matching, English tokenization, and alignment.

Input Format: The user will provide a JSON object:
{
  "indexed_word_segments": [ { "index": <number>, "word": "<string>" } ],
  "vocabulary": [ { "id": <vocab_id>, "text": "<string>" } ]
}

Output JSON Schema:
{
  "{source}": {
    "<input_index_as_string>": {
      "text": "<input word>",
      "vocabulary_id": <matching vocab id or null>
    }
  },
  "{target}": [ "<English word or punctuation>" ],
  "{alignment}": {
    "<input_index_as_string>": [<english_token_index>, ...]
  }
}

Instructions:
1. Create the "{source}" object. For EVERY segment in "indexed_word_segments", create an entry keyed by the segment's "index" (as a string) with ONLY the "text" (original word) and "vocabulary_id" fields.
2. Find where items of "vocabulary" are used in the Spanish text. Assign the matched item's "id" to "vocabulary_id" for every word that belongs to it, including each word of a multi-word item. Use null when there is no match.
3. Write the full English translation and TOKENIZE it (punctuation marks are separate tokens) into the "{target}" array of strings.
4. Create the "{alignment}" object. For EVERY Spanish index (as a string key), give the array of 0-based positions in "{target}" that correspond to it. Use [] when a Spanish word has no direct English equivalent. Every Spanish index MUST be a key.
5. The ENTIRE output must be a single valid JSON object using exactly these key names. Do NOT include any other fields, explanations, or code fences."#;

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds the passage and analysis prompts.
///
/// # Example
/// ```rust
/// use aligned_reader::llm::{vocabulary_from_words, PromptBuilder};
///
/// let vocabulary = vocabulary_from_words(&["che", "laburo"]);
/// let (system, user) = PromptBuilder::new().passage_chat(&vocabulary);
/// assert!(system.contains("Argentinian Spanish"));
/// assert!(user.ends_with("che, laburo"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    analysis_system: String,
}

impl PromptBuilder {
    pub fn new() -> Self {
        let analysis_system = ANALYSIS_SYSTEM_TEMPLATE
            .replace("{source}", SOURCE_WORDS_FIELD)
            .replace("{target}", TARGET_TOKENS_FIELD)
            .replace("{alignment}", ALIGNMENT_FIELD);
        Self { analysis_system }
    }

    /// `(system_msg, user_msg)` for passage generation.
    pub fn passage_chat(&self, vocabulary: &[VocabularyItem]) -> (String, String) {
        let words: Vec<&str> = vocabulary.iter().map(|v| v.word.as_str()).collect();
        let user_msg = format!(
            "Generate a text incorporating the following vocabulary: {}",
            words.join(", ")
        );
        (PASSAGE_SYSTEM_INSTRUCTION.to_string(), user_msg)
    }

    /// The JSON object embedded in the analysis prompt.
    pub fn analysis_request(
        &self,
        segments: &[IndexedWordSegment],
        vocabulary: &[VocabularyItem],
    ) -> Value {
        let segments: Vec<Value> = segments
            .iter()
            .map(|s| json!({ "index": s.index, "word": s.word() }))
            .collect();
        json!({
            "indexed_word_segments": segments,
            "vocabulary": vocabulary,
        })
    }

    /// `(system_msg, user_msg)` for the analysis call, embedding `request`
    /// as pretty JSON in a fenced block.
    pub fn analysis_chat(&self, request: &Value) -> (String, String) {
        let pretty = serde_json::to_string_pretty(request).unwrap_or_else(|_| request.to_string());
        let user_msg = format!(
            "Analyze the following indexed Spanish word segments, considering the provided \
             vocabulary, and provide the full English translation and analysis according to \
             the specified JSON schema:\n\n```json\n{pretty}\n```\n"
        );
        (self.analysis_system.clone(), user_msg)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-string record of a chat prompt, as stored with a passage.
pub fn prompt_transcript(system_msg: &str, user_msg: &str) -> String {
    format!("{system_msg}\n\nUSER INPUT: {user_msg}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::vocabulary::{vocabulary_from_words, VocabularyId};
    use crate::timing::{index_segments, WordTiming};

    fn segments(words: &[&str]) -> Vec<IndexedWordSegment> {
        let timings: Vec<WordTiming> = words
            .iter()
            .enumerate()
            .map(|(i, w)| WordTiming {
                word: (*w).into(),
                start: i as f64 * 0.5,
                end: i as f64 * 0.5 + 0.4,
                confidence: 1.0,
            })
            .collect();
        index_segments(&timings)
    }

    #[test]
    fn passage_system_sets_persona_and_register() {
        let (system, _) = PromptBuilder::new().passage_chat(&vocabulary_from_words(&["che"]));

        assert!(system.contains("Russian person living in Argentina"));
        assert!(system.contains("fluent in English"));
        assert!(system.contains("'vos'"), "must ask for voseo");
        assert!(system.contains("MUST incorporate the vocabulary"));
        assert!(system.contains("Output ONLY the generated Spanish text"));
    }

    #[test]
    fn passage_user_lists_every_word() {
        let vocabulary = vocabulary_from_words(&["che", "re copado", "laburo"]);
        let (_, user) = PromptBuilder::new().passage_chat(&vocabulary);
        assert_eq!(
            user,
            "Generate a text incorporating the following vocabulary: che, re copado, laburo"
        );
    }

    #[test]
    fn analysis_request_has_index_word_pairs_and_ids() {
        let builder = PromptBuilder::new();
        let request = builder.analysis_request(
            &segments(&["Che,", "boludo"]),
            &vocabulary_from_words(&["boludo"]),
        );

        assert_eq!(
            request,
            json!({
                "indexed_word_segments": [
                    {"index": 0, "word": "Che,"},
                    {"index": 1, "word": "boludo"}
                ],
                "vocabulary": [{"id": 0, "text": "boludo"}]
            })
        );
    }

    #[test]
    fn analysis_request_keeps_string_ids() {
        let vocabulary = vec![VocabularyItem {
            id: VocabularyId::Text("abc".into()),
            word: "mate".into(),
        }];
        let request = PromptBuilder::new().analysis_request(&segments(&["mate"]), &vocabulary);
        assert_eq!(request["vocabulary"][0]["id"], json!("abc"));
    }

    #[test]
    fn analysis_system_names_all_wire_fields() {
        let builder = PromptBuilder::new();
        let (system, _) = builder.analysis_chat(&json!({}));

        assert!(system.contains(SOURCE_WORDS_FIELD));
        assert!(system.contains(TARGET_TOKENS_FIELD));
        assert!(system.contains(ALIGNMENT_FIELD));
        assert!(!system.contains("{source}"), "placeholders must be substituted");
        assert!(system.contains("multi-word"));
        assert!(system.contains("Use []"));
    }

    #[test]
    fn analysis_user_embeds_fenced_request() {
        let builder = PromptBuilder::new();
        let request = builder.analysis_request(&segments(&["hola"]), &[]);
        let (_, user) = builder.analysis_chat(&request);

        assert!(user.contains("```json\n{"));
        assert!(user.contains("\"word\": \"hola\""));
        assert!(user.trim_end().ends_with("```"));
    }

    #[test]
    fn transcript_joins_system_and_user() {
        assert_eq!(prompt_transcript("sys", "usr"), "sys\n\nUSER INPUT: usr");
    }
}
