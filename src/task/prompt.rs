//! Tasks whose execute phase is a model call.

use async_trait::async_trait;
use std::sync::Arc;

use super::Task;
use crate::contract::ContractViolation;
use crate::llm::{ChatMessage, ChatRequest, LlmClient, DEFAULT_TEMPERATURE};
use crate::{ExecutionContext, Result, RetryPolicy, Station};

type Validator<L, I> = Box<dyn Fn(&L) -> std::result::Result<I, ContractViolation> + Send + Sync>;
type Prompter<I> = Box<dyn Fn(&I) -> Vec<ChatMessage> + Send + Sync>;
type Deliverer<C, L, I> = Box<dyn Fn(Station<C, L>, I, String) -> Result<Station<C, L>> + Send + Sync>;

/// A task that turns its input into chat messages, sends them to a model
/// and delivers the reply text.
///
/// The model call is retried with [`RetryPolicy::default`] unless configured
/// otherwise. Token usage reported by the client is added to the run's
/// metrics and every reply is recorded as a `"response"` artifact.
pub struct PromptTask<C, L, I> {
    name: String,
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    retry: Option<RetryPolicy>,
    validate: Validator<L, I>,
    prompt: Prompter<I>,
    deliver: Deliverer<C, L, I>,
}

impl<C, L, I> PromptTask<C, L, I> {
    /// Create a prompt task.
    ///
    /// - `validate`: extracts the typed input from the change.
    /// - `prompt`: builds the conversation for one input.
    /// - `deliver`: merges the reply text into the station.
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        validate: impl Fn(&L) -> std::result::Result<I, ContractViolation> + Send + Sync + 'static,
        prompt: impl Fn(&I) -> Vec<ChatMessage> + Send + Sync + 'static,
        deliver: impl Fn(Station<C, L>, I, String) -> Result<Station<C, L>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            retry: Some(RetryPolicy::default()),
            validate: Box::new(validate),
            prompt: Box::new(prompt),
            deliver: Box::new(deliver),
        }
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Retry the model call under `policy`.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Call the model exactly once.
    #[must_use]
    pub fn without_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// The model identifier sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, input: &I) -> ChatRequest {
        ChatRequest::new(self.model.clone(), (self.prompt)(input)).with_temperature(self.temperature)
    }
}

#[async_trait]
impl<C, L, I> Task for PromptTask<C, L, I>
where
    C: Send + Sync + 'static,
    L: Send + 'static,
    I: Send + Sync + 'static,
{
    type Capital = C;
    type Change = L;
    type Input = I;
    type Output = String;

    fn validate(&self, change: &L) -> std::result::Result<I, ContractViolation> {
        (self.validate)(change)
    }

    async fn execute(&self, ctx: &ExecutionContext, input: &I) -> Result<String> {
        let request = self.request(input);
        tracing::debug!(task = %self.name, model = %self.model, client = self.client.name(), "sending prompt");

        let response = self.client.send(&request).await?;
        if let Some(usage) = response.usage {
            ctx.record_tokens(usage.prompt_tokens, usage.completion_tokens);
        }
        ctx.emit_artifact(&self.name, "response", &response.content);
        Ok(response.content)
    }

    fn deliver(&self, station: Station<C, L>, input: I, output: String) -> Result<Station<C, L>> {
        (self.deliver)(station, input, output)
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, ChatRole, TokenUsage};
    use crate::{contract, Error, Phase, TaskExt, WorkflowEvent};
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned replies in order and records every request.
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<ChatResponse>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<ChatResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::transient("no scripted reply left")))
        }
    }

    #[derive(Debug, Default)]
    struct VcFirm {
        portfolio: Mutex<Vec<String>>,
        rejected: Mutex<Vec<String>>,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    struct PitchDeck {
        startup_name: String,
        idea: String,
        #[serde(default)]
        analysis: String,
    }

    fn analyst(client: Arc<dyn LlmClient>) -> PromptTask<VcFirm, serde_json::Value, PitchDeck> {
        PromptTask::new(
            "MarketAnalyst",
            client,
            "z-ai/glm-4.6",
            contract::conform::<PitchDeck>,
            |deck: &PitchDeck| {
                vec![
                    ChatMessage::system("You are a cynical VC analyst. Find 3 fatal flaws in this idea. Be brief."),
                    ChatMessage::user(format!("Idea: {}", deck.idea)),
                ]
            },
            |mut station: Station<VcFirm, serde_json::Value>, _deck: PitchDeck, analysis: String| {
                station.change_mut()["analysis"] = serde_json::Value::String(analysis);
                Ok(station)
            },
        )
        .with_retry(RetryPolicy::new(2, Duration::ZERO))
    }

    fn investor(client: Arc<dyn LlmClient>) -> PromptTask<VcFirm, serde_json::Value, PitchDeck> {
        PromptTask::new(
            "AngelInvestor",
            client,
            "z-ai/glm-4.6",
            |change: &serde_json::Value| {
                let deck: PitchDeck = contract::conform(change)?;
                if deck.analysis.is_empty() {
                    return Err(ContractViolation::missing("analysis"));
                }
                Ok(deck)
            },
            |deck: &PitchDeck| {
                vec![
                    ChatMessage::system("You are a VC. Based on the analysis, output ONLY 'FUND' or 'PASS'."),
                    ChatMessage::user(format!(
                        "Idea: {}\n\nAnalyst Report: {}",
                        deck.idea, deck.analysis
                    )),
                ]
            },
            |mut station: Station<VcFirm, serde_json::Value>, deck: PitchDeck, decision: String| {
                let ledger = if decision.to_uppercase().contains("FUND") {
                    &station.capital().portfolio
                } else {
                    &station.capital().rejected
                };
                ledger.lock().unwrap().push(deck.startup_name.clone());
                station.change_mut()["decision"] = serde_json::Value::String(decision);
                Ok(station)
            },
        )
        .without_retry()
    }

    fn pitch(name: &str, idea: &str) -> serde_json::Value {
        serde_json::json!({ "startup_name": name, "idea": idea })
    }

    #[tokio::test]
    async fn test_execute_records_usage_and_artifact() {
        let client = ScriptedClient::new(vec![Ok(ChatResponse {
            content: "Cats cannot reach the pedals.".to_string(),
            usage: Some(TokenUsage {
                prompt_tokens: 30,
                completion_tokens: 7,
            }),
        })]);
        let task = analyst(client.clone()).with_temperature(0.2);
        let ctx = ExecutionContext::new();
        let deck = PitchDeck {
            startup_name: "UberForCats".to_string(),
            idea: "Cats drive the cars".to_string(),
            analysis: String::new(),
        };

        let reply = task.execute(&ctx, &deck).await.unwrap();

        assert_eq!(reply, "Cats cannot reach the pedals.");
        assert_eq!(ctx.snapshot().total_tokens(), 37);
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].temperature, 0.2);
        assert_eq!(seen[0].messages[0].role, ChatRole::System);
        assert_eq!(seen[0].messages[1].content, "Idea: Cats drive the cars");
        assert!(ctx.events().iter().any(|e| matches!(
            e,
            WorkflowEvent::Artifact { key, .. } if key == "response"
        )));
    }

    #[tokio::test]
    async fn test_pitch_pipeline_funds_after_retry() {
        let client = ScriptedClient::new(vec![
            Err(Error::transient("429 Too Many Requests")),
            Ok(ChatResponse::text("1. Cats. 2. Cars. 3. Liability.")),
            Ok(ChatResponse::text("FUND")),
        ]);
        let pipeline = analyst(client.clone())
            .then(investor(client.clone()))
            .with_name("vc");
        let station = Station::new(VcFirm::default(), pitch("UberForCats", "Cats drive the cars"));

        let (station, metrics) = pipeline.run(station).await.unwrap();

        assert_eq!(*station.capital().portfolio.lock().unwrap(), vec!["UberForCats".to_string()]);
        assert!(station.capital().rejected.lock().unwrap().is_empty());
        assert_eq!(station.change()["decision"], "FUND");
        assert_eq!(station.change()["analysis"], "1. Cats. 2. Cars. 3. Liability.");
        assert_eq!(metrics.retries, 1);
        assert_eq!(metrics.tasks_completed, 2);
        assert_eq!(client.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_shared_firm_across_pitches() {
        let client = ScriptedClient::new(vec![
            Ok(ChatResponse::text("flaws")),
            Ok(ChatResponse::text("PASS")),
            Ok(ChatResponse::text("flaws")),
            Ok(ChatResponse::text("fund it")),
        ]);
        let pipeline = analyst(client.clone()).then(investor(client.clone()));
        let firm = Arc::new(VcFirm::default());

        let first = Station::with_shared_capital(Arc::clone(&firm), pitch("UberForCats", "Cats drive"));
        pipeline.run(first).await.unwrap();
        let second = Station::with_shared_capital(Arc::clone(&firm), pitch("CureAI", "Quantum baldness cure"));
        pipeline.run(second).await.unwrap();

        assert_eq!(*firm.rejected.lock().unwrap(), vec!["UberForCats".to_string()]);
        assert_eq!(*firm.portfolio.lock().unwrap(), vec!["CureAI".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_idea_never_reaches_the_model() {
        let client = ScriptedClient::new(vec![]);
        let pipeline = analyst(client.clone()).then(investor(client.clone()));
        let station = Station::new(VcFirm::default(), serde_json::json!({ "startup_name": "Ghost" }));

        let err = pipeline.run(station).await.unwrap_err();

        assert_eq!(err.task_name(), Some("MarketAnalyst"));
        assert_eq!(err.phase(), Some(Phase::Validate));
        assert!(matches!(err.last_failure(), Error::ContractViolation(v) if v.names("idea")));
        assert!(client.seen.lock().unwrap().is_empty());
    }
}
