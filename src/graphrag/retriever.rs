use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::QaConfig;
use crate::integrations::{LanguageModel, LlmRequest};
use crate::metrics;
use crate::models::{ChatTurn, Triple};
use crate::normalize::{canonical_entity, canonical_product, clean_name};
use crate::prompts::{render_answer, Prompt};
use crate::store::GraphStore;
use crate::Result;

/// Entity marker reported when the question names nobody.
pub const GLOBAL_CONTEXT: &str = "Global Context";
/// Answer when the global sample finds no edges at all.
pub const EMPTY_GRAPH_MESSAGE: &str = "The graph is currently empty.";
/// Context reported when named entities have no records.
pub const NO_DATA_CONTEXT: &str = "No data";

/// Terminal state of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QaOutcome {
    /// Answered from the neighborhood of named entities.
    Entity,
    /// Answered from a global sample.
    Global,
    /// Named entities have no records; nothing generated.
    NoData,
    /// Nothing in the graph; nothing generated.
    EmptyGraph,
}

impl QaOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            QaOutcome::Entity => "entity",
            QaOutcome::Global => "global",
            QaOutcome::NoData => "no_data",
            QaOutcome::EmptyGraph => "empty_graph",
        }
    }
}

/// Answer with the evidence it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaAnswer {
    pub entities: Vec<String>,
    pub context: String,
    pub answer: String,
    pub outcome: QaOutcome,
}

impl QaAnswer {
    /// Entity list rendered as a single string, e.g. `['Microsoft', 'OpenAI']`.
    pub fn entity_label(&self) -> String {
        let quoted: Vec<String> = self.entities.iter().map(|e| format!("'{}'", e)).collect();
        format!("[{}]", quoted.join(", "))
    }
}

/// Question answering over the graph.
///
/// `Received -> Contextualized -> EntitiesResolved -> {Entity | Global | NoData} -> Answered`
#[derive(Clone)]
pub struct QaPipeline {
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn GraphStore>,
    neighborhood_limit: usize,
    global_sample_limit: usize,
    contextualize_prompt: String,
    entity_prompt: String,
    answer_template: String,
}

impl QaPipeline {
    pub fn new(model: Arc<dyn LanguageModel>, store: Arc<dyn GraphStore>, config: &QaConfig) -> Self {
        Self {
            model,
            store,
            neighborhood_limit: config.neighborhood_limit,
            global_sample_limit: config.global_sample_limit,
            contextualize_prompt: Prompt::Contextualize.load(),
            entity_prompt: Prompt::EntityList.load(),
            answer_template: Prompt::Answer.load(),
        }
    }

    /// Answer `question` given prior turns. Gateway and store errors propagate.
    pub async fn answer(&self, question: &str, history: &[ChatTurn]) -> Result<QaAnswer> {
        let started = Instant::now();
        let result = self.answer_inner(question, history).await;
        let label = match &result {
            Ok(answer) => answer.outcome.as_str(),
            Err(_) => "error",
        };
        metrics::record_qa(label, started.elapsed());
        result
    }

    async fn answer_inner(&self, question: &str, history: &[ChatTurn]) -> Result<QaAnswer> {
        let standalone = self.contextualize(question, history).await?;
        let entities = self.resolve_entities(&standalone).await?;

        if entities.is_empty() {
            info!("🌍 General question");
            let triples = self.store.query_global_sample(self.global_sample_limit).await?;
            if triples.is_empty() {
                return Ok(QaAnswer {
                    entities: vec![GLOBAL_CONTEXT.to_string()],
                    context: EMPTY_GRAPH_MESSAGE.to_string(),
                    answer: EMPTY_GRAPH_MESSAGE.to_string(),
                    outcome: QaOutcome::EmptyGraph,
                });
            }

            let context = render_context(&triples);
            let answer = self.generate(&context, &standalone).await?;
            return Ok(QaAnswer {
                entities: vec![GLOBAL_CONTEXT.to_string()],
                context,
                answer,
                outcome: QaOutcome::Global,
            });
        }

        info!(entities = ?entities, "🔍 Looking up entities");
        let triples = self
            .store
            .query_neighborhood(&lookup_names(&entities), self.neighborhood_limit)
            .await?;

        if triples.is_empty() {
            return Ok(QaAnswer {
                answer: format!(
                    "I couldn't find records for {} in the database.",
                    entities.join(", ")
                ),
                entities,
                context: NO_DATA_CONTEXT.to_string(),
                outcome: QaOutcome::NoData,
            });
        }

        let context = render_context(&triples);
        let answer = self.generate(&context, &standalone).await?;
        Ok(QaAnswer {
            entities,
            context,
            answer,
            outcome: QaOutcome::Entity,
        })
    }

    /// Rewrite a follow-up into a standalone question. Empty history passes
    /// the question through untouched.
    pub async fn contextualize(&self, question: &str, history: &[ChatTurn]) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let transcript = history
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.text))
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!(
            "Chat History:\n{}\n\nLatest Question: {}",
            transcript, question
        );

        let rewritten = self
            .model
            .complete(&LlmRequest::text(&self.contextualize_prompt, user))
            .await?;
        debug!("🔄 Rephrased: '{}' -> '{}'", question, rewritten);
        Ok(rewritten)
    }

    /// Names of entities mentioned in a standalone question.
    pub async fn resolve_entities(&self, question: &str) -> Result<Vec<String>> {
        let raw = self
            .model
            .complete(&LlmRequest::text(&self.entity_prompt, question))
            .await?;
        let entities = parse_entity_list(&raw);
        debug!(raw = %raw, parsed = ?entities, "Entity list");
        Ok(entities)
    }

    async fn generate(&self, context: &str, question: &str) -> Result<String> {
        let prompt = render_answer(&self.answer_template, context, question);
        self.model
            .complete(&LlmRequest::text(prompt, question))
            .await
    }
}

/// Parse the entity extractor's reply: a comma-separated list or `None`.
///
/// A label prefix ("Entities: X, Y") is cut at the last colon and quoting or
/// bold markers are removed.
pub fn parse_entity_list(raw: &str) -> Vec<String> {
    let payload = match raw.rfind(':') {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    };
    let cleaned = payload.replace("**", "").replace(['"', '\''], "");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("none") {
        return Vec::new();
    }

    let mut entities: Vec<String> = Vec::new();
    for name in cleaned.split(',').map(clean_name) {
        if !name.is_empty() && !name.eq_ignore_ascii_case("none") && !entities.contains(&name) {
            entities.push(name);
        }
    }
    entities
}

/// Names to look up for the given entities: each as written plus its
/// canonical entity and product forms.
fn lookup_names(entities: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for entity in entities {
        for candidate in [
            entity.clone(),
            canonical_entity(entity),
            canonical_product(entity),
        ] {
            if !candidate.is_empty() && !names.contains(&candidate) {
                names.push(candidate);
            }
        }
    }
    names
}

fn render_context(triples: &[Triple]) -> String {
    triples
        .iter()
        .map(Triple::render)
        .collect::<Vec<_>>()
        .join("\n")
}
