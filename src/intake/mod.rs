//! Intake conversation — the guided anamnesis a prospective client walks
//! through before a human reviews their answers.
//!
//! The engine drives a fixed catalog of topics. Each reply passes the input
//! gate, is scanned for risk terms and recorded, and the configured advance
//! policy decides whether to ask a follow-up or move on. State is written
//! through to an injected store after every change.

pub mod catalog;
pub mod engine;
pub mod gate;
pub mod model;
pub mod persistence;
pub mod policy;
pub mod risk;
pub mod summary;

pub use catalog::{Step, StepCatalog};
pub use engine::{ConversationEngine, EngineDeps, IntakeView, TransitionResult};
pub use gate::InputGate;
pub use model::{AnswerSet, ContactDraft, ConversationState, Message, Phase, Sender};
pub use persistence::Persistence;
pub use policy::{AdaptivePolicy, FixedCatalogPolicy, StepAdvancePolicy, build_policy};
pub use risk::{KeywordRiskDetector, RiskDetector};
pub use summary::SummaryView;
