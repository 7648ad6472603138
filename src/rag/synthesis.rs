//! Grounded answer synthesis.
//!
//! Retrieved passages are packed into a prompt under a token budget and sent
//! to the completion model with the configured system prompt.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::llm::LLMClient;
use crate::rag::chunker::estimate_tokens;
use crate::types::{AppError, Answer, Result, RetrievalResult};
use crate::utils::retry::{ProviderKind, RetryPolicy};
use crate::utils::toml_config::SynthesisConfig;

const CONTEXT_INTRO: &str = "Below are some paragraphs to consider from various documents on \
    ocean policy, including drafts of agreements, reports on negotiations and statements by \
    various parties:";

pub struct AnswerSynthesizer {
    llm: Arc<dyn LLMClient>,
    retry: RetryPolicy,
    max_context_tokens: usize,
    system_prompt: String,
    no_context_answer: String,
}

/// Passages chosen for the prompt, highest score first.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub included: Vec<RetrievalResult>,
    pub text: String,
    /// Excludes the question.
    pub tokens: usize,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LLMClient>, retry: RetryPolicy, config: &SynthesisConfig) -> Self {
        Self {
            llm,
            retry,
            max_context_tokens: config.max_context_tokens,
            system_prompt: config.system_prompt.clone(),
            no_context_answer: config.no_context_answer.clone(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Deduplicated passages, highest score first, until the rendered prompt
    /// would exceed the budget. An oversized top passage is cut to fit.
    pub fn build_context(&self, retrieved: &[RetrievalResult]) -> PromptContext {
        let mut seen = HashSet::new();
        let mut ranked: Vec<&RetrievalResult> = retrieved
            .iter()
            .filter(|r| seen.insert(r.chunk_id.as_str()))
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let overhead = template_tokens();
        let mut included: Vec<RetrievalResult> = Vec::new();
        for passage in ranked {
            included.push(passage.clone());
            let cost = overhead + estimate_tokens(&render_passages(&included));
            if cost <= self.max_context_tokens {
                continue;
            }
            included.pop();
            if included.is_empty() {
                included.extend(self.truncate_to_fit(passage, overhead));
            }
            break;
        }

        let text = render_passages(&included);
        let tokens = overhead + estimate_tokens(&text);
        PromptContext {
            included,
            text,
            tokens,
        }
    }

    /// Longest word prefix of `passage` that fits the budget alone.
    fn truncate_to_fit(
        &self,
        passage: &RetrievalResult,
        overhead: usize,
    ) -> Option<RetrievalResult> {
        let words: Vec<&str> = passage.text_span.split_whitespace().collect();
        let cut = |n: usize| {
            let mut shortened = passage.clone();
            shortened.text_span = words[..n].join(" ");
            shortened
        };
        let fits = |n: usize| {
            overhead + estimate_tokens(&render_passages(std::slice::from_ref(&cut(n))))
                <= self.max_context_tokens
        };

        // `lo` fits (or is zero), `hi` does not
        let (mut lo, mut hi) = (0, words.len());
        while lo + 1 < hi {
            let mid = (lo + hi) / 2;
            if fits(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        if lo == 0 {
            debug!(chunk_id = %passage.chunk_id, "Top passage does not fit the context budget");
            return None;
        }
        debug!(chunk_id = %passage.chunk_id, kept = lo, of = words.len(), "Truncated top passage");
        Some(cut(lo))
    }

    /// Without any usable passage the model is not called.
    #[instrument(skip(self, question, retrieved), fields(passages = retrieved.len(), model = self.llm.model_name()))]
    pub async fn answer(&self, question: &str, retrieved: &[RetrievalResult]) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(AppError::Validation("question must not be empty".into()));
        }

        let context = self.build_context(retrieved);
        if context.included.is_empty() {
            debug!("No passages to ground the answer");
            return Ok(Answer {
                text: self.no_context_answer.clone(),
                citations: Vec::new(),
                confidence: 0.0,
                grounded: false,
                passages_used: 0,
            });
        }

        let prompt = build_prompt(question, &context.text);
        let text = self
            .retry
            .run(ProviderKind::Synthesis, "generate", || {
                self.llm.generate_with_system(&self.system_prompt, &prompt)
            })
            .await?;

        let mut citations: Vec<String> = Vec::new();
        for passage in &context.included {
            if !citations.contains(&passage.source_uri) {
                citations.push(passage.source_uri.clone());
            }
        }
        let mean = context.included.iter().map(|p| p.score).sum::<f32>()
            / context.included.len() as f32;

        debug!(
            context_tokens = context.tokens,
            citations = citations.len(),
            "Synthesized answer"
        );
        Ok(Answer {
            text: text.trim().to_string(),
            citations,
            confidence: mean.clamp(0.0, 1.0),
            grounded: true,
            passages_used: context.included.len(),
        })
    }
}

pub fn build_prompt(question: &str, passages: &str) -> String {
    format!(
        "{}\n\n{}\n###\nFrom information in the preceding paragraphs, please try to answer the \
         following question. If the paragraphs do not contain the answer, say so.\n\n\
         Question: {}\n\nAnswer:",
        CONTEXT_INTRO, passages, question
    )
}

fn template_tokens() -> usize {
    estimate_tokens(&build_prompt("", ""))
}

/// Render passages in the given order. A run of passages from one document
/// shares its title line, and `...` marks a jump inside one section.
fn render_passages(passages: &[RetrievalResult]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut previous: Option<&RetrievalResult> = None;

    for passage in passages {
        let same_document = previous.is_some_and(|p| p.document_id == passage.document_id);
        if !same_document {
            if previous.is_some() {
                lines.push(String::new());
            }
            lines.push(format!(
                "From document \"{}\":",
                passage.document_title.to_uppercase()
            ));
        }

        match previous {
            Some(p) if same_document && p.header == passage.header => {
                if passage.sequence_index != p.sequence_index + 1 {
                    lines.push("...".to_string());
                }
            }
            _ => {
                if let Some(h) = passage.header.as_deref().filter(|h| !h.is_empty()) {
                    lines.push(format!("{}:", h));
                }
            }
        }

        lines.push(passage.text_span.clone());
        previous = Some(passage);
    }

    lines.join("\n")
}
