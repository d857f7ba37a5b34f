//! Prompt construction for the LLM-backed next-question service.

use super::NextQuestionRequest;
use crate::intake::model::{AnswerSet, Sender};

/// Used when the model returns an empty completion.
pub const EMPTY_REPLY_FALLBACK: &str = "Pode detalhar um pouco mais?";

/// Persona and rules for the intake assistant.
pub const SYSTEM_PROMPT: &str = "\
Voce e a assistente de anamnese tecnica do Metodo 30, apoiando o trabalho da Paloma Priebe.
Voce nao e a Paloma e nao fala em nome dela. Voce e a interface inicial para novos alunos.

Seu papel e compreender a pessoa antes de qualquer prescricao, para que as decisoes da equipe \
sejam seguras e alinhadas a realidade do aluno.

Regras de comunicacao:
- Uma pergunta por mensagem, mensagens curtas.
- Tom empatico, educado e seguro. Sem listas, sem aulas, sem julgamento.
- Cada pergunta nasce da resposta anterior. Se a pessoa sair do tema, reconheca e redirecione.
- Se a resposta for vaga, peca um detalhe concreto. Se for suficiente, apenas confirme o que \
entendeu, sem perguntar.

Ao longo da conversa, entenda: contexto fisiologico (sexo, idade, peso/altura se souber), rotina \
real e nivel de cansaco, historico com treino e abandono, sabotadores recorrentes (tudo-ou-nada, \
falta de energia, expectativas irreais, dores ignoradas) e a capacidade real de adesao.

Parta sempre de intensidade relativa, seguranca antes de performance e adesao antes de volume. \
Nao venda o metodo, nao antecipe treino e nao faca promessas. Ao encerrar, agradeca e explique \
que a equipe usara as informacoes para orientar os proximos passos.";

/// Topics from `topic_ids` that have no answer yet, in interview order.
pub fn missing_topics<'a>(topic_ids: &'a [String], answers: &AnswerSet) -> Vec<&'a str> {
    topic_ids
        .iter()
        .map(String::as_str)
        .filter(|id| answers.non_empty(id).is_none())
        .collect()
}

/// Build the user-turn message describing the conversation so far.
pub fn build_user_message(request: &NextQuestionRequest, missing: &[&str]) -> String {
    let summary: Vec<String> = request
        .answers
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| format!("{k}: {v}"))
        .collect();
    let summary = if summary.is_empty() {
        "ainda sem dados relevantes".to_string()
    } else {
        summary.join("; ")
    };

    let history = if request.transcript.is_empty() {
        "Sem historico previo.".to_string()
    } else {
        request
            .transcript
            .iter()
            .map(|m| {
                let who = match m.sender {
                    Sender::Assistant => "ai",
                    Sender::User => "user",
                };
                format!("{who}: {}", m.text)
            })
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let mut lines = Vec::new();
    if request.risk_flag {
        lines.push("Flag de risco: SIM".to_string());
    }
    lines.push(format!("Resumo coletado: {summary}"));
    lines.push(format!("Lacunas prioritarias: {}", missing.join(", ")));
    if let Some(ref prompt) = request.current_prompt {
        match request.step_id {
            Some(ref step) => lines.push(format!("Pergunta atual ({step}): {prompt}")),
            None => lines.push(format!("Pergunta atual: {prompt}")),
        }
    }
    lines.push(format!("Historico do chat: {history}"));
    lines.push(format!("Ultima fala do aluno: \"{}\"", request.user_text));
    if !request.answers.is_empty() {
        let raw = serde_json::to_string(&request.answers).unwrap_or_default();
        lines.push(format!("Contexto bruto: {raw}"));
    }
    lines.join("\n")
}
