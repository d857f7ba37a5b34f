//! Step-advance policies.
//!
//! After an accepted answer has been recorded the engine asks its policy
//! whether to stay on the current step (a follow-up or clarifying re-ask)
//! or move on. Two implementations exist and one is chosen at startup via
//! `AdvancePolicyKind`:
//!
//! - `FixedCatalogPolicy` asks each step's static follow-up once.
//! - `AdaptivePolicy` lets the next-question service decide.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::catalog::Step;
use super::model::{AnswerSet, ConversationState};
use crate::config::AdvancePolicyKind;
use crate::error::IntakeError;
use crate::question::{NextQuestionRequest, NextQuestionService};

/// One accepted answer, as seen by a policy.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    pub step: &'a Step,
    pub user_text: &'a str,
    /// State with the answer, transcript line and risk flag already applied.
    pub state: &'a ConversationState,
}

/// What the engine should do with the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Stay on the current step and show `reply`.
    FollowUp {
        reply: String,
        /// Step id to mark as awaiting its follow-up answer.
        awaiting: Option<String>,
    },
    /// Move past the current step, showing `reply` first if present.
    Advance { reply: Option<String> },
}

#[async_trait]
pub trait StepAdvancePolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Key the answer is recorded under.
    fn answer_key(&self, step: &Step, state: &ConversationState) -> String {
        match state.awaiting_follow_up {
            Some(ref awaiting) if *awaiting == step.id => AnswerSet::detail_key(&step.id),
            _ => step.id.clone(),
        }
    }

    /// Decide the turn. An error means the decision could not be made; the
    /// engine keeps the step where it is.
    async fn decide(&self, turn: Turn<'_>) -> Result<Decision, IntakeError>;
}

/// Follows the catalog: one mandatory follow-up per step that declares one.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedCatalogPolicy;

#[async_trait]
impl StepAdvancePolicy for FixedCatalogPolicy {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn decide(&self, turn: Turn<'_>) -> Result<Decision, IntakeError> {
        let first_answer = turn.state.awaiting_follow_up.as_deref() != Some(turn.step.id.as_str());
        match turn.step.follow_up_prompt {
            Some(ref prompt) if first_answer => Ok(Decision::FollowUp {
                reply: prompt.clone(),
                awaiting: Some(turn.step.id.clone()),
            }),
            _ => Ok(Decision::Advance { reply: None }),
        }
    }
}

/// Delegates the advance decision to a `NextQuestionService`.
pub struct AdaptivePolicy {
    service: Arc<dyn NextQuestionService>,
    timeout: Option<Duration>,
}

impl AdaptivePolicy {
    pub fn new(service: Arc<dyn NextQuestionService>) -> Self {
        Self {
            service,
            timeout: None,
        }
    }

    /// Bound each service call; an elapsed call counts as unavailable.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl StepAdvancePolicy for AdaptivePolicy {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    async fn decide(&self, turn: Turn<'_>) -> Result<Decision, IntakeError> {
        let request = NextQuestionRequest {
            user_text: turn.user_text.to_string(),
            step_id: Some(turn.step.id.clone()),
            current_prompt: Some(turn.step.prompt.clone()),
            answers: turn.state.answers.clone(),
            risk_flag: turn.state.risk_flag,
            transcript: turn.state.messages.clone(),
        };

        let call = self.service.next_question(&request);
        let next = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                IntakeError::UpstreamUnavailable {
                    reason: format!("no reply within {}s", limit.as_secs_f32()),
                }
            })??,
            None => call.await?,
        };

        if next.needs_more_detail {
            Ok(Decision::FollowUp {
                reply: next.reply,
                awaiting: None,
            })
        } else {
            Ok(Decision::Advance {
                reply: Some(next.reply),
            })
        }
    }
}

/// Build the configured policy. `service` is only used by the adaptive one.
pub fn build_policy(
    kind: AdvancePolicyKind,
    service: Arc<dyn NextQuestionService>,
    timeout: Duration,
) -> Arc<dyn StepAdvancePolicy> {
    match kind {
        AdvancePolicyKind::Fixed => Arc::new(FixedCatalogPolicy),
        AdvancePolicyKind::Adaptive => Arc::new(AdaptivePolicy::new(service).with_timeout(timeout)),
    }
}
