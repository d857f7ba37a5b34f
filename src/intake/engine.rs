//! ConversationEngine — the intake state machine.
//!
//! Owns the `ConversationState` of one session. Every mutation goes through
//! `submit`, `reset`, `update_contact` or `submit_lead`, and each one is
//! written through to the store before returning.
//!
//! A turn is computed on a copy of the state and committed only once the
//! advance policy has resolved, so an observer never sees a half-applied
//! transition.

use std::sync::Arc;

use serde::Serialize;

use super::catalog::{
    CLOSING_MESSAGE, FALLBACK_MESSAGE, PLAN_OPTIONS, RISK_NOTICE, Step,
    StepCatalog,
};
use super::gate::InputGate;
use super::model::{AnswerSet, ContactDraft, ConversationState, Message, Phase};
use super::persistence::Persistence;
use super::policy::{Decision, StepAdvancePolicy, Turn};
use super::risk::{KeywordRiskDetector, RiskDetector};
use super::summary::{self, SummaryView};
use crate::error::IntakeError;
use crate::lead::{LeadPayload, LeadReceipt, LeadSubmitter};

/// Shared, session-independent collaborators of an engine.
#[derive(Clone)]
pub struct EngineDeps {
    pub catalog: Arc<StepCatalog>,
    pub policy: Arc<dyn StepAdvancePolicy>,
    pub gate: InputGate,
    pub risk: Arc<dyn RiskDetector>,
}

impl EngineDeps {
    /// Default gate and keyword risk detector.
    pub fn new(catalog: Arc<StepCatalog>, policy: Arc<dyn StepAdvancePolicy>) -> Self {
        Self {
            catalog,
            policy,
            gate: InputGate::default(),
            risk: Arc::new(KeywordRiskDetector::default()),
        }
    }

    pub fn with_gate(mut self, gate: InputGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_risk_detector(mut self, risk: Arc<dyn RiskDetector>) -> Self {
        self.risk = risk;
        self
    }
}

/// Outcome of `ConversationEngine::submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionResult {
    /// Blank input; nothing happened.
    Ignored,
    /// Low-signal input; nothing recorded.
    Rejected,
    /// Answer recorded, same step asked again or its follow-up asked.
    FollowUpRequested,
    /// Answer recorded and the next step's prompt appended.
    StepAdvanced { step_index: usize },
    /// Last step answered; contact collection begins.
    InterviewComplete,
    /// Answer recorded, but the next-question service failed. Same step.
    Fallback,
    /// The interview is over; input is not routed through step logic.
    NotInterviewing,
}

/// Everything a UI needs to render one session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeView {
    pub session_id: String,
    pub phase: Phase,
    pub messages: Vec<Message>,
    pub step_count: usize,
    pub answered: usize,
    pub progress_percent: u8,
    pub quick_replies: Vec<String>,
    pub risk_flag: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_notice: Option<&'static str>,
    pub answers: AnswerSet,
    pub contact: ContactDraft,
    pub plan_options: &'static [&'static str],
    /// Present once the interview is complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryView>,
}

pub struct ConversationEngine {
    deps: EngineDeps,
    persistence: Persistence,
    state: ConversationState,
}

impl ConversationEngine {
    /// Restore the session from the store, or start fresh.
    pub async fn start(deps: EngineDeps, persistence: Persistence) -> Self {
        let state = match persistence.load(&deps.catalog).await {
            Some(state) => {
                tracing::debug!(
                    session = %persistence.session_id(),
                    step = state.current_step_index,
                    "Restored conversation"
                );
                state
            }
            None => ConversationState::fresh(&deps.catalog),
        };
        let engine = Self {
            deps,
            persistence,
            state,
        };
        engine.persist().await;
        engine
    }

    pub fn session_id(&self) -> &str {
        self.persistence.session_id()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn step_count(&self) -> usize {
        self.deps.catalog.len()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase(self.step_count())
    }

    /// The step awaiting an answer, if the interview is still running.
    pub fn current_step(&self) -> Option<&Step> {
        match self.phase() {
            Phase::Interviewing { step_index } | Phase::AwaitingFollowUp { step_index } => {
                self.deps.catalog.get(step_index)
            }
            Phase::CollectingContact | Phase::Submitted => None,
        }
    }

    /// Chips for the current step. None while a follow-up is pending.
    pub fn quick_replies(&self) -> &[String] {
        match (self.phase(), self.current_step()) {
            (Phase::Interviewing { .. }, Some(step)) => step.quick_replies.as_slice(),
            _ => &[],
        }
    }

    pub fn risk_notice(&self) -> Option<&'static str> {
        self.state.risk_flag.then_some(RISK_NOTICE)
    }

    pub fn summary(&self) -> SummaryView {
        summary::project(&self.state.answers)
    }

    pub fn view(&self) -> IntakeView {
        let step_count = self.step_count();
        let interview_done = matches!(
            self.phase(),
            Phase::CollectingContact | Phase::Submitted
        );
        IntakeView {
            session_id: self.session_id().to_string(),
            phase: self.phase(),
            messages: self.state.messages.clone(),
            step_count,
            answered: self.state.current_step_index.min(step_count),
            progress_percent: self.state.progress_percent(step_count),
            quick_replies: self.quick_replies().to_vec(),
            risk_flag: self.state.risk_flag,
            risk_notice: self.risk_notice(),
            answers: self.state.answers.clone(),
            contact: self.state.contact.clone(),
            plan_options: &PLAN_OPTIONS,
            summary: interview_done.then(|| self.summary()),
        }
    }

    /// Process one user reply.
    pub async fn submit(&mut self, raw: &str) -> TransitionResult {
        let text = raw.trim();
        if text.is_empty() {
            return TransitionResult::Ignored;
        }

        let catalog = Arc::clone(&self.deps.catalog);
        let step = match self.phase() {
            Phase::Interviewing { step_index } | Phase::AwaitingFollowUp { step_index } => {
                match catalog.get(step_index) {
                    Some(step) => step,
                    None => return TransitionResult::NotInterviewing,
                }
            }
            Phase::CollectingContact | Phase::Submitted => {
                return TransitionResult::NotInterviewing;
            }
        };

        if !self.deps.gate.accepts(text) {
            tracing::debug!(session = %self.session_id(), step = %step.id, "Low-signal input rejected");
            return TransitionResult::Rejected;
        }

        let mut next = self.state.clone();
        next.messages.push(Message::user(text));
        let key = self.deps.policy.answer_key(step, &next);
        next.answers.insert(key, text);
        if self.deps.risk.is_risk_signal(text) {
            if !next.risk_flag {
                tracing::info!(session = %self.session_id(), step = %step.id, "Risk signal detected");
            }
            next.risk_flag = true;
        }

        let turn = Turn {
            step,
            user_text: text,
            state: &next,
        };
        let decision = self.deps.policy.decide(turn).await;

        let result = match decision {
            Ok(Decision::FollowUp { reply, awaiting }) => {
                next.messages.push(Message::assistant(reply));
                if awaiting.is_some() {
                    next.awaiting_follow_up = awaiting;
                }
                TransitionResult::FollowUpRequested
            }
            Ok(Decision::Advance { reply }) => {
                if let Some(reply) = reply {
                    next.messages.push(Message::assistant(reply));
                }
                next.awaiting_follow_up = None;
                next.current_step_index += 1;
                match catalog.get(next.current_step_index) {
                    Some(following) => {
                        next.messages.push(Message::assistant(following.prompt.clone()));
                        TransitionResult::StepAdvanced {
                            step_index: next.current_step_index,
                        }
                    }
                    None => {
                        next.messages.push(Message::assistant(CLOSING_MESSAGE));
                        TransitionResult::InterviewComplete
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    session = %self.session_id(),
                    step = %step.id,
                    policy = self.deps.policy.name(),
                    error = %e,
                    "Advance decision failed, asking again"
                );
                next.messages.push(Message::assistant(FALLBACK_MESSAGE));
                TransitionResult::Fallback
            }
        };

        self.state = next;
        self.persist().await;
        result
    }

    /// Back to step 0 with only the opening messages. Idempotent.
    pub async fn reset(&mut self) {
        self.state = ConversationState::fresh(&self.deps.catalog);
        self.persist().await;
    }

    /// Replace the contact draft. Not validated until submission.
    pub async fn update_contact(&mut self, contact: ContactDraft) -> Result<(), IntakeError> {
        if self.state.submitted {
            return Err(IntakeError::AlreadySubmitted);
        }
        self.state.contact = contact;
        self.persist().await;
        Ok(())
    }

    /// Validate the contact and hand the lead to `submitter`.
    ///
    /// Validation runs before any call, so an incomplete draft never reaches
    /// the network. On success the state is kept and marked submitted.
    pub async fn submit_lead(
        &mut self,
        submitter: &dyn LeadSubmitter,
    ) -> Result<LeadReceipt, IntakeError> {
        match self.phase() {
            Phase::CollectingContact => {}
            Phase::Submitted => return Err(IntakeError::AlreadySubmitted),
            Phase::Interviewing { .. } | Phase::AwaitingFollowUp { .. } => {
                return Err(IntakeError::NotCollectingContact);
            }
        }
        self.state.contact.validate()?;

        let payload = LeadPayload::from_state(&self.state);
        let receipt = submitter.submit(&payload).await.inspect_err(|e| {
            tracing::warn!(session = %self.session_id(), error = %e, "Lead submission failed");
        })?;

        self.state.submitted = true;
        self.persist().await;
        tracing::info!(session = %self.session_id(), risk = self.state.risk_flag, "Lead submitted");
        Ok(receipt)
    }

    async fn persist(&self) {
        if let Err(e) = self.persistence.save(&self.state).await {
            tracing::warn!(session = %self.session_id(), error = %e, "Failed to save conversation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::intake::model::Sender;
    use crate::intake::persistence::DEFAULT_NAMESPACE;
    use crate::intake::policy::{AdaptivePolicy, FixedCatalogPolicy};
    use crate::question::{NextQuestion, NextQuestionRequest, NextQuestionService};
    use crate::store::{MemoryStore, Store};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubService {
        reply: Option<&'static str>,
        calls: Mutex<Vec<NextQuestionRequest>>,
    }

    impl StubService {
        fn replying(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn down() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl NextQuestionService for StubService {
        async fn next_question(
            &self,
            request: &NextQuestionRequest,
        ) -> Result<NextQuestion, IntakeError> {
            self.calls.lock().unwrap().push(request.clone());
            match self.reply {
                Some(reply) => Ok(NextQuestion::from_reply(reply)),
                None => Err(IntakeError::UpstreamUnavailable {
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct CountingSubmitter {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LeadSubmitter for CountingSubmitter {
        async fn submit(&self, _payload: &LeadPayload) -> Result<LeadReceipt, IntakeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(IntakeError::DeliveryFailed {
                    reason: "HTTP 502".into(),
                })
            } else {
                Ok(LeadReceipt::delivered())
            }
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl Store for BrokenStore {
        async fn get_setting(
            &self,
            _scope: &str,
            _key: &str,
        ) -> Result<Option<serde_json::Value>, StoreError> {
            Err(StoreError::Query("disk gone".into()))
        }

        async fn set_setting(
            &self,
            _scope: &str,
            _key: &str,
            _value: &serde_json::Value,
        ) -> Result<(), StoreError> {
            Err(StoreError::Query("disk gone".into()))
        }

        async fn delete_setting(&self, _scope: &str, _key: &str) -> Result<bool, StoreError> {
            Err(StoreError::Query("disk gone".into()))
        }
    }

    fn two_steps() -> StepCatalog {
        StepCatalog::new(vec![
            Step::new("goal", "Qual seu objetivo principal?"),
            Step::new("location", "Onde vai treinar?").with_follow_up("Quanto espaco livre voce tem?"),
        ])
        .unwrap()
    }

    async fn engine(
        catalog: StepCatalog,
        policy: Arc<dyn StepAdvancePolicy>,
        store: Arc<dyn Store>,
    ) -> ConversationEngine {
        let deps = EngineDeps::new(Arc::new(catalog), policy);
        ConversationEngine::start(deps, Persistence::new(store, DEFAULT_NAMESPACE, "s1")).await
    }

    async fn fixed(catalog: StepCatalog) -> ConversationEngine {
        engine(catalog, Arc::new(FixedCatalogPolicy), Arc::new(MemoryStore::new())).await
    }

    async fn adaptive(catalog: StepCatalog, service: Arc<StubService>) -> ConversationEngine {
        engine(
            catalog,
            Arc::new(AdaptivePolicy::new(service)),
            Arc::new(MemoryStore::new()),
        )
        .await
    }

    fn complete_contact(consent: bool) -> ContactDraft {
        ContactDraft {
            name: "Ana Souza".into(),
            email: "ana@example.com".into(),
            phone: "+55 11 99999-0000".into(),
            consent_given: consent,
            ..ContactDraft::default()
        }
    }

    async fn finished(catalog: StepCatalog) -> ConversationEngine {
        let mut engine = fixed(catalog).await;
        while engine.current_step().is_some() {
            engine.submit("resposta com detalhes suficientes").await;
        }
        engine
    }

    #[tokio::test]
    async fn starts_with_opening_messages() {
        let engine = fixed(StepCatalog::standard()).await;
        let state = engine.state();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].text, StepCatalog::standard().get(0).unwrap().prompt);
        assert_eq!(engine.phase(), Phase::Interviewing { step_index: 0 });
        assert_eq!(engine.quick_replies()[0], "Hipertrofia");
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let mut engine = fixed(StepCatalog::standard()).await;
        let before = engine.state().clone();
        assert_eq!(engine.submit("   ").await, TransitionResult::Ignored);
        assert_eq!(engine.state(), &before);
    }

    #[tokio::test]
    async fn filler_is_rejected_without_mutation() {
        let mut engine = fixed(StepCatalog::standard()).await;
        let before = engine.state().clone();
        let result = engine.submit("ok").await;
        assert_eq!(result, TransitionResult::Rejected);
        assert_eq!(engine.state(), &before);
    }

    #[tokio::test]
    async fn fixed_answer_advances_to_next_step() {
        let catalog = StepCatalog::standard();
        let second_prompt = catalog.get(1).unwrap().prompt.clone();
        let mut engine = fixed(catalog).await;

        let result = engine.submit("hipertrofia de pernas, 3x por semana").await;
        assert_eq!(result, TransitionResult::StepAdvanced { step_index: 1 });

        let state = engine.state();
        assert_eq!(state.answers.get("goal"), Some("hipertrofia de pernas, 3x por semana"));
        assert!(!state.risk_flag);
        assert_eq!(state.current_step_index, 1);
        assert_eq!(state.messages.last().unwrap().text, second_prompt);
    }

    #[tokio::test]
    async fn adaptive_answer_queries_service_then_advances() {
        let service = StubService::replying("Otimo, anotado.");
        let mut engine = adaptive(StepCatalog::standard(), service.clone()).await;

        let result = engine.submit("hipertrofia de pernas, 3x por semana").await;
        assert_eq!(result, TransitionResult::StepAdvanced { step_index: 1 });
        assert_eq!(service.call_count(), 1);

        let calls = service.calls.lock().unwrap();
        assert_eq!(calls[0].step_id.as_deref(), Some("goal"));
        assert_eq!(
            calls[0].answers.get("goal"),
            Some("hipertrofia de pernas, 3x por semana")
        );

        let texts: Vec<&str> = engine.state().messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts.len(), 5);
        assert_eq!(texts[3], "Otimo, anotado.");
    }

    #[tokio::test]
    async fn risk_flag_is_sticky() {
        let mut engine = fixed(StepCatalog::standard()).await;
        engine.submit("sinto dor lombar há 2 semanas").await;
        assert!(engine.state().risk_flag);
        assert_eq!(engine.state().answers.get("goal"), Some("sinto dor lombar há 2 semanas"));
        assert_eq!(engine.risk_notice(), Some(RISK_NOTICE));

        engine.submit("quero treinar com consistencia").await;
        assert!(engine.state().risk_flag);
    }

    #[tokio::test]
    async fn uppercase_risk_terms_are_detected() {
        let mut engine = fixed(StepCatalog::standard()).await;
        engine.submit("FIZ CIRURGIA NO JOELHO").await;
        assert!(engine.state().risk_flag);
    }

    #[tokio::test]
    async fn custom_gate_and_detector_are_used() {
        let deps = EngineDeps::new(Arc::new(StepCatalog::standard()), Arc::new(FixedCatalogPolicy))
            .with_gate(InputGate::with_min_chars(3))
            .with_risk_detector(Arc::new(KeywordRiskDetector::with_terms(["joelho"])));
        let persistence = Persistence::new(Arc::new(MemoryStore::new()), DEFAULT_NAMESPACE, "s1");
        let mut engine = ConversationEngine::start(deps, persistence).await;

        assert_eq!(
            engine.submit("forca").await,
            TransitionResult::StepAdvanced { step_index: 1 }
        );
        assert!(!engine.state().risk_flag);
        engine.submit("dor no joelho").await;
        assert!(engine.state().risk_flag);
    }

    #[tokio::test]
    async fn question_reply_keeps_step() {
        let service = StubService::replying("Pode detalhar a frequência?");
        let mut engine = adaptive(StepCatalog::standard(), service.clone()).await;

        let result = engine.submit("treino as vezes").await;
        assert_eq!(result, TransitionResult::FollowUpRequested);
        assert_eq!(engine.state().current_step_index, 0);
        assert_eq!(
            engine.state().messages.last().unwrap().text,
            "Pode detalhar a frequência?"
        );

        engine.submit("treino 3x por semana, 40 min").await;
        assert_eq!(engine.state().current_step_index, 0);
        assert_eq!(service.call_count(), 2);
        let calls = service.calls.lock().unwrap();
        assert_eq!(calls[1].step_id.as_deref(), Some("goal"));
        assert_eq!(engine.state().answers.get("goal"), Some("treino 3x por semana, 40 min"));
    }

    #[tokio::test]
    async fn service_failure_appends_fallback_and_stays() {
        let mut engine = adaptive(StepCatalog::standard(), StubService::down()).await;

        let result = engine.submit("hipertrofia de pernas").await;
        assert_eq!(result, TransitionResult::Fallback);

        let state = engine.state();
        assert_eq!(state.current_step_index, 0);
        assert!(state.awaiting_follow_up.is_none());
        let last = state.messages.last().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.text, FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn fixed_follow_up_records_detail_answer() {
        let mut engine = fixed(two_steps()).await;
        engine.submit("forca e condicionamento").await;

        let result = engine.submit("academia perto de casa").await;
        assert_eq!(result, TransitionResult::FollowUpRequested);
        assert_eq!(engine.phase(), Phase::AwaitingFollowUp { step_index: 1 });
        assert!(engine.quick_replies().is_empty());
        assert_eq!(
            engine.state().messages.last().unwrap().text,
            "Quanto espaco livre voce tem?"
        );

        let result = engine.submit("uns 2x2 m na sala").await;
        assert_eq!(result, TransitionResult::InterviewComplete);

        let state = engine.state();
        assert_eq!(state.answers.get("location"), Some("academia perto de casa"));
        assert_eq!(state.answers.get("locationDetail"), Some("uns 2x2 m na sala"));
        assert!(state.awaiting_follow_up.is_none());
        assert_eq!(state.messages.last().unwrap().text, CLOSING_MESSAGE);
    }

    #[tokio::test]
    async fn complete_interview_ignores_further_input() {
        let mut engine = finished(two_steps()).await;
        assert_eq!(engine.phase(), Phase::CollectingContact);
        assert_eq!(engine.state().current_step_index, 2);
        assert_eq!(engine.view().progress_percent, 100);
        assert!(engine.view().summary.is_some());

        let before = engine.state().clone();
        assert_eq!(
            engine.submit("mais uma resposta qualquer").await,
            TransitionResult::NotInterviewing
        );
        assert_eq!(engine.state(), &before);
    }

    #[tokio::test]
    async fn reset_twice_equals_reset_once() {
        let mut engine = fixed(StepCatalog::standard()).await;
        engine.submit("sinto dor lombar há 2 semanas").await;

        engine.reset().await;
        let once = engine.state().clone();
        engine.reset().await;
        assert_eq!(engine.state(), &once);
        assert_eq!(once, ConversationState::fresh(&StepCatalog::standard()));
    }

    #[tokio::test]
    async fn state_survives_restart() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut first = engine(two_steps(), Arc::new(FixedCatalogPolicy), store.clone()).await;
        first.submit("forca e condicionamento").await;
        first.submit("academia perto de casa").await;
        first
            .update_contact(ContactDraft {
                name: "Ana".into(),
                ..ContactDraft::default()
            })
            .await
            .unwrap();

        let second = engine(two_steps(), Arc::new(FixedCatalogPolicy), store).await;
        assert_eq!(second.state(), first.state());
        assert_eq!(second.phase(), Phase::AwaitingFollowUp { step_index: 1 });
    }

    #[tokio::test]
    async fn store_failure_does_not_block_transition() {
        let mut engine = engine(
            StepCatalog::standard(),
            Arc::new(FixedCatalogPolicy),
            Arc::new(BrokenStore),
        )
        .await;
        let result = engine.submit("hipertrofia de pernas").await;
        assert_eq!(result, TransitionResult::StepAdvanced { step_index: 1 });
    }

    #[tokio::test]
    async fn lead_without_consent_makes_no_call() {
        let mut engine = finished(two_steps()).await;
        engine.update_contact(complete_contact(false)).await.unwrap();

        let submitter = CountingSubmitter::default();
        match engine.submit_lead(&submitter).await {
            Err(IntakeError::ValidationFailed { missing }) => assert_eq!(missing, vec!["consent"]),
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
        assert!(!engine.state().submitted);
    }

    #[tokio::test]
    async fn lead_before_interview_ends_is_refused() {
        let mut engine = fixed(two_steps()).await;
        engine.update_contact(complete_contact(true)).await.unwrap();
        let submitter = CountingSubmitter::default();
        assert!(matches!(
            engine.submit_lead(&submitter).await,
            Err(IntakeError::NotCollectingContact)
        ));
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_lead_marks_submitted() {
        let mut engine = finished(two_steps()).await;
        engine.update_contact(complete_contact(true)).await.unwrap();
        let before_messages = engine.state().messages.clone();

        let submitter = CountingSubmitter::default();
        let receipt = engine.submit_lead(&submitter).await.unwrap();
        assert_eq!(receipt, LeadReceipt::delivered());
        assert_eq!(engine.phase(), Phase::Submitted);
        assert_eq!(engine.state().messages, before_messages);

        assert!(matches!(
            engine.submit_lead(&submitter).await,
            Err(IntakeError::AlreadySubmitted)
        ));
        assert!(matches!(
            engine.update_contact(ContactDraft::default()).await,
            Err(IntakeError::AlreadySubmitted)
        ));
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_delivery_can_be_retried() {
        let mut engine = finished(two_steps()).await;
        engine.update_contact(complete_contact(true)).await.unwrap();

        let failing = CountingSubmitter {
            fail: true,
            ..CountingSubmitter::default()
        };
        assert!(matches!(
            engine.submit_lead(&failing).await,
            Err(IntakeError::DeliveryFailed { .. })
        ));
        assert_eq!(engine.phase(), Phase::CollectingContact);

        let working = CountingSubmitter::default();
        assert!(engine.submit_lead(&working).await.is_ok());
    }

    #[tokio::test]
    async fn view_reports_progress() {
        let mut engine = fixed(StepCatalog::standard()).await;
        engine.submit("hipertrofia de pernas").await;
        engine.submit("caber na roupa do casamento").await;
        engine.submit("sinto dor no joelho esquerdo").await;

        let view = engine.view();
        assert_eq!(view.step_count, 12);
        assert_eq!(view.answered, 2);
        assert_eq!(view.progress_percent, 17);
        assert_eq!(view.risk_notice, Some(RISK_NOTICE));
        assert!(view.summary.is_none());
        assert_eq!(view.plan_options.len(), 6);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["phase"]["phase"], "awaiting_follow_up");
        assert_eq!(json["sessionId"], "s1");
    }
}
