//! Template chaining and conversational memory.
//!
//! - [`template`]: `{var}` prompt templates and role-tagged chat prompts
//! - [`history`]: per-session turn storage
//!
//! A chain formats a template, hands the result to a text-generation
//! pipeline and optionally cleans the output with [`StrOutputParser`].

pub mod history;
pub mod template;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::pipeline::{GenerationParams, Pipeline, Prediction};
use self::history::{SessionStore, Turn};
use self::template::{ChatPromptTemplate, PromptTemplate};

/// Turns a pipeline prediction into a clean string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrOutputParser;

impl StrOutputParser {
    pub fn parse(&self, prediction: &Prediction) -> String {
        match prediction {
            Prediction::Generated { text } => text.trim().to_string(),
            Prediction::Classified(s) => format!("{} ({:.4})", s.label, s.score),
        }
    }
}

/// template → pipeline → optional parser.
pub struct LlmChain {
    prompt: PromptTemplate,
    llm: Arc<dyn Pipeline>,
    params: GenerationParams,
    parser: Option<StrOutputParser>,
}

impl LlmChain {
    pub fn new(prompt: PromptTemplate, llm: Arc<dyn Pipeline>, params: GenerationParams) -> Self {
        Self {
            prompt,
            llm,
            params,
            parser: None,
        }
    }

    pub fn with_parser(mut self, parser: StrOutputParser) -> Self {
        self.parser = Some(parser);
        self
    }

    pub async fn invoke(&self, vars: &HashMap<String, String>) -> Result<String> {
        let prompt = self.prompt.format(vars)?;
        let prediction = self.llm.predict(&prompt, &self.params).await?;
        Ok(match (&self.parser, prediction) {
            (Some(parser), prediction) => parser.parse(&prediction),
            (None, Prediction::Generated { text }) => text,
            (None, Prediction::Classified(s)) => s.label,
        })
    }
}

/// Result of one conversational turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    /// History length after this turn was recorded.
    pub turns: usize,
}

/// Chat prompt with a history slot, backed by a [`SessionStore`].
pub struct ConversationChain {
    prompt: ChatPromptTemplate,
    store: Arc<SessionStore>,
    params: GenerationParams,
    parser: StrOutputParser,
}

impl ConversationChain {
    pub fn new(store: Arc<SessionStore>, system_prompt: &str, max_new_tokens: usize) -> Self {
        Self {
            prompt: ChatPromptTemplate::with_history(system_prompt),
            store,
            params: GenerationParams {
                max_new_tokens,
                seed: None,
                return_full_text: false,
            },
            parser: StrOutputParser,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Generate a reply conditioned on the session's prior turns, then record
    /// the human input and the reply.
    pub async fn invoke(
        &self,
        llm: &dyn Pipeline,
        session_id: &str,
        input: &str,
    ) -> Result<ChatReply> {
        let history = self.store.history(session_id).await;
        let vars = HashMap::from([("input".to_string(), input.to_string())]);
        let prompt = self.prompt.render(&vars, &history)?;
        debug!(session_id, prior_turns = history.len(), "Rendered chat prompt");

        let prediction = llm.predict(&prompt, &self.params).await?;
        let text = self.parser.parse(&prediction);

        let turns = self
            .store
            .append(session_id, [Turn::human(input), Turn::ai(text.clone())])
            .await;
        Ok(ChatReply { text, turns })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::pipeline::{Sentiment, Task};

    /// Records prompts and echoes a fixed reply.
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Pipeline for Recorder {
        fn task(&self) -> Task {
            Task::TextGeneration
        }

        fn model(&self) -> &str {
            "recorder"
        }

        async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if params.return_full_text {
                Ok(format!("{prompt} reply "))
            } else {
                Ok("  reply \n".to_string())
            }
        }

        async fn classify(&self, _text: &str) -> Result<Sentiment> {
            unreachable!()
        }
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder {
            prompts: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_llm_chain_raw_and_parsed() {
        let llm = recorder();
        let prompt = PromptTemplate::from_template("Concept: {topic}");
        let vars = HashMap::from([("topic".to_string(), "Docker".to_string())]);

        let raw = LlmChain::new(prompt.clone(), llm.clone(), GenerationParams::default());
        assert_eq!(raw.invoke(&vars).await.unwrap(), "Concept: Docker reply ");

        let parsed = LlmChain::new(prompt, llm, GenerationParams::default())
            .with_parser(StrOutputParser);
        assert_eq!(parsed.invoke(&vars).await.unwrap(), "Concept: Docker reply");
    }

    #[tokio::test]
    async fn test_conversation_accumulates_history() {
        let llm = recorder();
        let store = Arc::new(SessionStore::new());
        let chain = ConversationChain::new(store.clone(), "You are a helpful AI assistant.", 50);

        let first = chain
            .invoke(llm.as_ref(), "user_123", "Hi, my name is Dave.")
            .await
            .unwrap();
        assert_eq!(
            first,
            ChatReply {
                text: "reply".to_string(),
                turns: 2
            }
        );

        let second = chain
            .invoke(llm.as_ref(), "user_123", "What is my name?")
            .await
            .unwrap();
        assert_eq!(second.turns, 4);

        let prompts = llm.prompts.lock().unwrap().clone();
        assert!(prompts[1]
            .contains("Human: Hi, my name is Dave.\nAI: reply\nHuman: What is my name?"));

        let history = store.history("user_123").await;
        assert_eq!(history[0], Turn::human("Hi, my name is Dave."));
        assert_eq!(history[3], Turn::ai("reply"));
    }

    #[test]
    fn test_parser_formats_classification() {
        let p = Prediction::Classified(Sentiment {
            label: "POSITIVE".to_string(),
            score: 0.99987,
        });
        assert_eq!(StrOutputParser.parse(&p), "POSITIVE (0.9999)");
    }
}
