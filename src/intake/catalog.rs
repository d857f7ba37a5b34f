//! Step catalog — the fixed, ordered list of interview topics — plus the
//! assistant copy that frames the interview.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::model::Message;
use crate::error::ConfigError;

/// Greeting shown before the first question.
pub const OPENING_MESSAGE: &str =
    "Oi! Sou o assistente da Paloma. Vamos fazer uma anamnese rapida e precisa. 1 pergunta por vez.";

/// Shown after the last step, when contact collection begins.
pub const CLOSING_MESSAGE: &str = "Obrigado! Agora preciso de seus contatos e plano escolhido.";

/// Appended when the next-question service fails.
pub const FALLBACK_MESSAGE: &str =
    "Nao entendi bem. Pode detalhar um pouco mais? (tente novamente se persistir)";

/// Inline hint for low-signal input. Never appended to the transcript.
pub const REJECTION_MESSAGE: &str = "Preciso de mais detalhes concretos.";

/// Advisory displayed while the risk flag is set.
pub const RISK_NOTICE: &str =
    "Indicou risco/lesao. Fale com a Paloma antes de treinar se dor persistir.";

/// Plans a lead can pick. The first one is the default choice.
pub const PLAN_OPTIONS: [&str; 6] = [
    "Impulso - 1 mes",
    "Transformacao - 3 meses",
    "Ano de Resultados - 12 meses",
    "Mentoria Premium - 12 meses",
    "Treino de viagem (14 dias)",
    "Sessao extra ao vivo (20 min)",
];

/// One interview topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
    /// Mandatory clarifying question asked once after the primary answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_prompt: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            quick_replies: Vec::new(),
            follow_up_prompt: None,
        }
    }

    pub fn with_quick_replies(mut self, replies: &[&str]) -> Self {
        self.quick_replies = replies.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_follow_up(mut self, prompt: impl Into<String>) -> Self {
        self.follow_up_prompt = Some(prompt.into());
        self
    }
}

/// Ordered, immutable list of steps. Insertion order is interview order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCatalog {
    steps: Vec<Step>,
}

impl StepCatalog {
    /// Build a catalog, rejecting empty catalogs and blank or duplicate ids.
    pub fn new(steps: Vec<Step>) -> Result<Self, ConfigError> {
        if steps.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "steps".to_string(),
                message: "catalog must contain at least one step".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for step in &steps {
            if step.id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "steps".to_string(),
                    message: "step id must not be blank".to_string(),
                });
            }
            if !seen.insert(step.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "steps".to_string(),
                    message: format!("duplicate step id '{}'", step.id),
                });
            }
        }
        Ok(Self { steps })
    }

    /// Load a catalog from a JSON array of steps.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let steps: Vec<Step> = serde_json::from_str(json).map_err(|e| ConfigError::InvalidValue {
            key: "steps".to_string(),
            message: e.to_string(),
        })?;
        Self::new(steps)
    }

    /// The personal-training anamnesis.
    pub fn standard() -> Self {
        let steps = vec![
            Step::new(
                "goal",
                "Qual seu objetivo principal? (ex.: forca, hipertrofia, dor lombar, emagrecimento)",
            )
            .with_quick_replies(&["Hipertrofia", "Emagrecimento", "Forca", "Dor lombar"]),
            Step::new(
                "success",
                "O que e sucesso pra voce nesse objetivo? (ex.: roupa, prova, dor zero)",
            ),
            Step::new(
                "history",
                "Historico de treino e lesoes? Alguma dor atual ou cirurgia?",
            )
            .with_follow_up("Se houver dor ou lesao: onde, ha quanto tempo e o que piora?"),
            Step::new(
                "availability",
                "Dias/semana e minutos por sessao que voce tem? (ex.: 3x/sem, 30-40 min)",
            )
            .with_quick_replies(&["3x/sem, 30 min", "4x/sem, 45 min", "5x/sem, 60 min"]),
            Step::new(
                "location",
                "Onde vai treinar? (academia, casa, condominio, viagem) e o espaco disponivel?",
            )
            .with_quick_replies(&["Academia", "Casa", "Condominio", "Viagem"])
            .with_follow_up("Quanto espaco livre voce tem? (ex.: 2x2 m na sala, garagem)"),
            Step::new(
                "equipment",
                "Quais equipamentos? (halteres, elastico, barra, anilhas, banco, peso corporal)",
            )
            .with_quick_replies(&["Halteres", "Elastico", "Peso corporal"])
            .with_follow_up("Quais cargas voce tem disponiveis? (ex.: halteres de 2 a 10 kg)"),
            Step::new(
                "effort",
                "Como reage a cargas/intensidade? Ja passou mal em treino intenso?",
            ),
            Step::new(
                "recovery",
                "Sono e estresse: quantas horas, acorda descansado? Usa medicacao?",
            ),
            Step::new(
                "nutrition",
                "Alimentacao/hidratacao: regular, restricoes? Bebe quanta agua/dia?",
            ),
            Step::new(
                "work",
                "Rotina de trabalho/estudos: turnos, deslocamentos, dias mais cansativos?",
            ),
            Step::new(
                "obstacles",
                "O que mais faz voce faltar? (tempo, sono, logistica, motivacao, dor)",
            )
            .with_quick_replies(&["Tempo", "Sono", "Logistica", "Motivacao"]),
            Step::new(
                "preferences",
                "Preferencias/restricoes de movimentos? Algo que evita ou gosta de fazer?",
            ),
        ];
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.id.as_str())
    }

    /// Greeting followed by the first prompt.
    pub fn opening_messages(&self) -> Vec<Message> {
        let mut messages = vec![Message::assistant(OPENING_MESSAGE)];
        if let Some(first) = self.steps.first() {
            messages.push(Message::assistant(first.prompt.clone()));
        }
        messages
    }
}
