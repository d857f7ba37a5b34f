//! Conversation data models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::{PLAN_OPTIONS, StepCatalog};
use crate::error::IntakeError;

/// Who authored a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Assistant,
    User,
}

/// One line of the transcript. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

impl Message {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }
}

/// Collected answers keyed by step id (or `<stepId>Detail` for follow-ups).
///
/// Ordered so that snapshots and prompts are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet(BTreeMap<String, String>);

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key used for the follow-up answer of `step_id`.
    pub fn detail_key(step_id: &str) -> String {
        format!("{step_id}Detail")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Non-empty value for `key`, if any.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// Last write wins.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Contact details filled in after the interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(alias = "plan")]
    pub plan_choice: String,
    #[serde(alias = "consent")]
    pub consent_given: bool,
}

impl Default for ContactDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            plan_choice: PLAN_OPTIONS[0].to_string(),
            consent_given: false,
        }
    }
}

impl ContactDraft {
    /// Names of the required fields that are missing, in form order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if self.phone.trim().is_empty() {
            missing.push("phone");
        }
        if self.plan_choice.trim().is_empty() {
            missing.push("planChoice");
        }
        if !self.consent_given {
            missing.push("consent");
        }
        missing
    }

    /// Submission-time validation. Edits are never validated.
    pub fn validate(&self) -> Result<(), IntakeError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IntakeError::ValidationFailed { missing })
        }
    }
}

/// Where the conversation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Interviewing { step_index: usize },
    AwaitingFollowUp { step_index: usize },
    CollectingContact,
    Submitted,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interviewing { step_index } => write!(f, "interviewing({step_index})"),
            Self::AwaitingFollowUp { step_index } => write!(f, "awaiting_follow_up({step_index})"),
            Self::CollectingContact => write!(f, "collecting_contact"),
            Self::Submitted => write!(f, "submitted"),
        }
    }
}

/// Full conversation state. Owned by the engine and persisted as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub messages: Vec<Message>,
    /// In `[0, step_count]`; equal to `step_count` once the interview is done.
    pub current_step_index: usize,
    #[serde(default)]
    pub answers: AnswerSet,
    /// Sticky until a full reset.
    #[serde(default)]
    pub risk_flag: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awaiting_follow_up: Option<String>,
    #[serde(default)]
    pub contact: ContactDraft,
    #[serde(default)]
    pub submitted: bool,
}

impl ConversationState {
    /// Fresh state seeded with the opening messages for `catalog`.
    pub fn fresh(catalog: &StepCatalog) -> Self {
        Self {
            messages: catalog.opening_messages(),
            current_step_index: 0,
            answers: AnswerSet::new(),
            risk_flag: false,
            awaiting_follow_up: None,
            contact: ContactDraft::default(),
            submitted: false,
        }
    }

    pub fn phase(&self, step_count: usize) -> Phase {
        if self.submitted {
            Phase::Submitted
        } else if self.current_step_index >= step_count {
            Phase::CollectingContact
        } else if self.awaiting_follow_up.is_some() {
            Phase::AwaitingFollowUp {
                step_index: self.current_step_index,
            }
        } else {
            Phase::Interviewing {
                step_index: self.current_step_index,
            }
        }
    }

    /// `round(min(index, count) / count * 100)`.
    pub fn progress_percent(&self, step_count: usize) -> u8 {
        if step_count == 0 {
            return 100;
        }
        let answered = self.current_step_index.min(step_count) as f64;
        (answered / step_count as f64 * 100.0).round() as u8
    }
}
