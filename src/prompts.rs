//! System prompt catalogue.
//!
//! Every prompt has a built-in text. A Markdown file with the same name in a
//! `prompts/` directory overrides it, so prompts can be tuned without a
//! rebuild.

use std::path::PathBuf;

use tracing::debug;

use crate::normalize::RELATIONSHIP_VOCABULARY;
use crate::{Error, Result};

/// Available prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Graph extraction with entity resolution rules.
    Extraction,
    /// Rewrite a follow-up question into a standalone one.
    Contextualize,
    /// Comma-separated entity names mentioned in a question.
    EntityList,
    /// Answer strictly from graph context. Template with `{context}` and `{question}`.
    Answer,
}

const EXTRACTION_PROMPT: &str = r#"You are an expert Knowledge Graph Engineer.
Your goal is to extract structured data and enforce strict entity resolution.

CRITICAL RULES FOR DEDUPLICATION:
1. Normalize Names (Companies/People):
   - "Microsoft Corp", "MSFT" -> "Microsoft"
   - "Sam Altman", "Samuel Altman" -> "Sam Altman"
   - "Nvidia Corp" -> "Nvidia"
   - Drop legal suffixes (Corp, Inc, Ltd, LLC, PLC) and prefer the short common name.

2. Standardize Product Names:
   - ALWAYS use the format: [Brand/Series] [Model]
   - "B200 Blackwell" -> "Blackwell B200"
   - "Blackwell B200 GPU" -> "Blackwell B200"
   - "Gemini 2.0" -> "Gemini 2"
   - "Llama 4 model" -> "Llama 4"

3. Standardize Relationships (Verbs):
   - "Fired", "Dismissed", "Removed", "Ousted" -> "FIRED"
   - "Hired", "Appointed", "Recruited", "Joined" -> "HIRED"
   - "Sued", "Filed Lawsuit" -> "SUED"
   - "Invested", "Bought stake" -> "INVESTED_IN"
   - "Launched", "Released", "Unveiled" -> "LAUNCHED"
   - "Partnered" -> "PARTNERED_WITH"
   - "Acquired", "Bought", "Purchased" -> "ACQUIRED"
   - "Criticized", "Slammed" -> "CRITICIZED"
   - "Competes with", "Rivals" -> "COMPETES_WITH"
   - If an action does not fit one of these, leave the edge out. Never invent a new verb.

Node types are coarse categories: Company, Person, Product.
Edge sentiment is exactly one of: Positive, Negative, Neutral.
Every edge source and target must be the id of a node you return.

Return JSON with 'nodes' and 'edges'."#;

const CONTEXTUALIZE_PROMPT: &str = r#"Given a chat history and the latest user question which might reference context in the chat history,
formulate a standalone question which can be understood without the chat history.
DO NOT answer the question, just reformulate it if needed and otherwise return it as is."#;

const ENTITY_LIST_PROMPT: &str = r#"You are a precise Entity Extractor API.
Your ONLY job is to extract entity names from the user's question.
RULES:
1. Return ONLY a comma-separated list of names (e.g. "Microsoft, Sam Altman").
2. If no specific Company, Person, or Product is named, return exactly the word "None".
3. DO NOT output any explanation. JUST the names."#;

const ANSWER_PROMPT: &str = r#"You are a Data Analyst. Answer strictly based on the database context.
Do not invent facts that are not in the context.

Context:
{context}

User Question: {question}

Answer (Max 3 sentences):"#;

impl Prompt {
    /// Override file name (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::Extraction => "extraction.md",
            Prompt::Contextualize => "contextualize.md",
            Prompt::EntityList => "entity_list.md",
            Prompt::Answer => "answer.md",
        }
    }

    /// Built-in prompt text.
    pub fn builtin(&self) -> &'static str {
        match self {
            Prompt::Extraction => EXTRACTION_PROMPT,
            Prompt::Contextualize => CONTEXTUALIZE_PROMPT,
            Prompt::EntityList => ENTITY_LIST_PROMPT,
            Prompt::Answer => ANSWER_PROMPT,
        }
    }

    /// Override from `prompts/` if present, otherwise the built-in text.
    pub fn load(&self) -> String {
        match load_prompt(self.filename()) {
            Ok(text) => {
                debug!(prompt = self.filename(), "Using prompt override");
                text
            }
            Err(_) => self.builtin().to_string(),
        }
    }
}

/// Load a prompt file by name from the prompts directory.
pub fn load_prompt(filename: &str) -> Result<String> {
    let path = prompts_dir().join(filename);
    std::fs::read_to_string(&path)
        .map_err(|e| Error::InvalidArgument(format!("Failed to load prompt {}: {}", filename, e)))
}

/// Prompt directory, searched relative to the working directory.
pub fn prompts_dir() -> PathBuf {
    let candidates = [
        PathBuf::from("prompts"),
        PathBuf::from("../prompts"),
        PathBuf::from("../../prompts"),
    ];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("prompts")
}

/// Fill the answer template.
pub fn render_answer(template: &str, context: &str, question: &str) -> String {
    template
        .replace("{context}", context)
        .replace("{question}", question)
}

/// All prompts.
pub fn list_prompts() -> Vec<Prompt> {
    vec![
        Prompt::Extraction,
        Prompt::Contextualize,
        Prompt::EntityList,
        Prompt::Answer,
    ]
}
