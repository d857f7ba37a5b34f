//! Summary projector — display-only guidance derived from collected answers.

use serde::{Deserialize, Serialize};

use super::model::AnswerSet;

/// Human-readable guidance lines shown to the lead and sent to the reviewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryView {
    pub systems: String,
    pub intensity: String,
    pub density: String,
    pub volume: String,
    pub technique: String,
    pub equipment: String,
}

impl SummaryView {
    /// Lines in display order, skipping empty ones.
    pub fn lines(&self) -> Vec<String> {
        [
            self.systems.clone(),
            self.intensity.clone(),
            self.density.clone(),
            self.volume.clone(),
            self.technique.clone(),
            format!("Local/equipamentos: {}", self.equipment),
        ]
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect()
    }
}

/// Project `answers` onto the summary templates.
pub fn project(answers: &AnswerSet) -> SummaryView {
    let systems = answers
        .non_empty("goal")
        .map(|goal| {
            format!("Foco em {goal}; estimular sistemas neuromuscular/cardio conforme tolerancia.")
        })
        .unwrap_or_default();

    let intensity = if answers.non_empty("effort").is_some() {
        "Intensidade relativa calibrada; se reacao ruim, densidade mais baixa.".to_string()
    } else {
        String::new()
    };

    let density = match answers.non_empty("availability") {
        Some(availability) if availability.contains("30") => {
            "Sessoes compactas, densidade alta e descanso curto."
        }
        _ => "Organizar blocos para maximizar trabalho/tempo.",
    }
    .to_string();

    let equipment = ["equipment", "location", "locationDetail", "equipmentDetail"]
        .iter()
        .find_map(|key| answers.non_empty(key))
        .unwrap_or("a definir")
        .to_string();

    SummaryView {
        systems,
        intensity,
        density,
        volume: "Volume minimo eficaz, progredindo quando tecnica e recuperacao estiverem solidas."
            .to_string(),
        technique: "Checkpoints tecnicos e evitar compensacoes, especialmente com historico de lesao."
            .to_string(),
        equipment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_answers_use_defaults() {
        let summary = project(&AnswerSet::new());
        assert!(summary.systems.is_empty());
        assert!(summary.intensity.is_empty());
        assert_eq!(summary.density, "Organizar blocos para maximizar trabalho/tempo.");
        assert_eq!(summary.equipment, "a definir");
        assert!(summary.volume.starts_with("Volume minimo eficaz"));
        assert!(summary.technique.starts_with("Checkpoints tecnicos"));
    }

    #[test]
    fn goal_feeds_systems_line() {
        let answers: AnswerSet = [("goal", "hipertrofia de pernas")].into_iter().collect();
        let summary = project(&answers);
        assert_eq!(
            summary.systems,
            "Foco em hipertrofia de pernas; estimular sistemas neuromuscular/cardio conforme tolerancia."
        );
    }

    #[test]
    fn thirty_minutes_switches_density() {
        let compact: AnswerSet = [("availability", "3x/sem, 30-40 min")].into_iter().collect();
        assert_eq!(
            project(&compact).density,
            "Sessoes compactas, densidade alta e descanso curto."
        );

        let long: AnswerSet = [("availability", "4x/sem, 60 min")].into_iter().collect();
        assert_eq!(
            project(&long).density,
            "Organizar blocos para maximizar trabalho/tempo."
        );
    }

    #[test]
    fn effort_enables_intensity_line() {
        let answers: AnswerSet = [("effort", "tolero bem cargas altas")].into_iter().collect();
        assert!(project(&answers).intensity.starts_with("Intensidade relativa"));
    }

    #[test]
    fn equipment_falls_back_through_related_answers() {
        let answers: AnswerSet = [("locationDetail", "sala 2x2 m")].into_iter().collect();
        assert_eq!(project(&answers).equipment, "sala 2x2 m");

        let answers: AnswerSet = [("location", "academia do predio"), ("locationDetail", "sala")]
            .into_iter()
            .collect();
        assert_eq!(project(&answers).equipment, "academia do predio");

        let answers: AnswerSet = [("equipment", "halteres e elastico"), ("location", "casa")]
            .into_iter()
            .collect();
        assert_eq!(project(&answers).equipment, "halteres e elastico");
    }

    #[test]
    fn lines_skip_empty_entries() {
        let lines = project(&AnswerSet::new()).lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.last().unwrap(), "Local/equipamentos: a definir");
    }
}
