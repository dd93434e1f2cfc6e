//! Conversational retrieval chain

use async_trait::async_trait;
use std::sync::Arc;

use scribe_core::{
    AnswerGenerator, ChainConfig, Error, GenerationConfig, LLMProvider, Result, SearchConfig,
    Turn, VectorDocument, VectorStore,
};

/// Answers questions about the indexed transcript, using prior turns to
/// resolve follow-up questions.
///
/// With history, the follow-up question is first rewritten by the LLM into a
/// standalone question. That question drives both retrieval and the final
/// answer prompt.
pub struct ConversationalRetrievalChain<L: LLMProvider, V: VectorStore> {
    llm: Arc<L>,
    vector_store: Arc<V>,
    config: ChainConfig,
}

impl<L: LLMProvider, V: VectorStore> ConversationalRetrievalChain<L, V> {
    pub fn new(llm: Arc<L>, vector_store: Arc<V>) -> Self {
        Self::with_config(llm, vector_store, ChainConfig::default())
    }

    pub fn with_config(llm: Arc<L>, vector_store: Arc<V>, config: ChainConfig) -> Self {
        Self {
            llm,
            vector_store,
            config,
        }
    }

    /// Render prior turns as alternating Human/Assistant lines
    pub fn format_history(history: &[Turn]) -> String {
        history
            .iter()
            .map(|turn| format!("Human: {}\nAssistant: {}", turn.question, turn.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn condense_prompt(question: &str, history: &[Turn]) -> String {
        format!(
            "Given the conversation below and a follow-up question, rewrite the follow-up \
             question as a standalone question in its original language.\n\
             \n\
             Chat history:\n\
             {}\n\
             \n\
             Follow-up question: {}\n\
             Standalone question:",
            Self::format_history(history),
            question
        )
    }

    pub fn answer_prompt(question: &str, context: &str) -> String {
        format!(
            "Use the transcript excerpts below to answer the question at the end. If the \
             excerpts do not contain the answer, say that you don't know instead of making \
             one up.\n\
             \n\
             Transcript excerpts:\n\
             {}\n\
             \n\
             Question: {}\n\
             Helpful answer:",
            context, question
        )
    }

    /// Join retrieved chunks into one context block
    pub fn build_context(documents: &[VectorDocument]) -> String {
        documents
            .iter()
            .map(|doc| doc.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            model_id: self.llm.model_id().to_string(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            timeout: self.config.timeout,
            ..Default::default()
        }
    }

    async fn standalone_question(&self, question: &str, history: &[Turn]) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = Self::condense_prompt(question, history);
        let result = self
            .llm
            .generate_with_config(&prompt, &self.generation_config())
            .await?;

        let condensed = result.text.trim();
        if condensed.is_empty() {
            return Ok(question.to_string());
        }

        tracing::debug!(
            original = %question,
            condensed = %condensed,
            "condensed follow-up question"
        );
        Ok(condensed.to_string())
    }
}

#[async_trait]
impl<L: LLMProvider + 'static, V: VectorStore + 'static> AnswerGenerator
    for ConversationalRetrievalChain<L, V>
{
    async fn answer(&self, question: &str, history: &[Turn]) -> Result<String> {
        let standalone = self.standalone_question(question, history).await?;

        let search_config = SearchConfig {
            top_k: self.config.top_k,
            score_threshold: None,
        };
        let retrieved = self.vector_store.search(&standalone, &search_config).await?;
        tracing::debug!(chunks = retrieved.total, "retrieved transcript context");

        let context = Self::build_context(&retrieved.documents);
        let prompt = Self::answer_prompt(&standalone, &context);
        let result = self
            .llm
            .generate_with_config(&prompt, &self.generation_config())
            .await?;

        let answer = result.text.trim();
        if answer.is_empty() {
            return Err(Error::LLMProvider("model returned an empty answer".to_string()));
        }

        Ok(answer.to_string())
    }
}
