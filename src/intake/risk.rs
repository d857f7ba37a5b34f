//! Risk detection — flags health or injury signals in free text.

/// Anything that can classify a reply as a health-risk signal.
pub trait RiskDetector: Send + Sync {
    fn is_risk_signal(&self, text: &str) -> bool;
}

/// Default vocabulary. Accented and unaccented spellings are both listed
/// because input is not normalized for diacritics, and gendered or plural
/// forms whose stem differs from the singular are listed separately.
pub const DEFAULT_RISK_TERMS: &[&str] = &[
    "dor",
    "lesao",
    "lesão",
    "lesoes",
    "lesões",
    "cirurgia",
    "fratura",
    "inflamacao",
    "inflamação",
    "inflamacoes",
    "inflamações",
    "cardiac",
    "cardíac",
    "pressao alta",
    "pressão alta",
    "hipertensao",
    "hipertensão",
];

/// Case-insensitive substring match against a fixed term list.
///
/// Low precision: "dor" also matches "dormir" or "adoro".
#[derive(Debug, Clone)]
pub struct KeywordRiskDetector {
    terms: Vec<String>,
}

impl Default for KeywordRiskDetector {
    fn default() -> Self {
        Self::with_terms(DEFAULT_RISK_TERMS.iter().copied())
    }
}

impl KeywordRiskDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

impl RiskDetector for KeywordRiskDetector {
    fn is_risk_signal(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.terms.iter().any(|term| lowered.contains(term.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pain_in_any_case() {
        let detector = KeywordRiskDetector::new();
        assert!(detector.is_risk_signal("sinto dor lombar há 2 semanas"));
        assert!(detector.is_risk_signal("DOR no joelho"));
    }

    #[test]
    fn detects_accented_and_unaccented_spellings() {
        let detector = KeywordRiskDetector::new();
        for text in [
            "tive uma lesao no ombro",
            "tive uma lesão no ombro",
            "problema cardiaco na familia",
            "problema cardíaco na familia",
            "inflamacao no tendao",
            "INFLAMAÇÃO no tendao",
            "tenho pressão alta",
            "tenho pressao alta",
            "hipertensão controlada",
            "tenho doença cardíaca",
            "doenca cardiaca na familia",
            "tive duas lesões no joelho",
            "tive lesoes no ombro",
            "inflamações recorrentes",
            "inflamacoes no tendao",
        ] {
            assert!(detector.is_risk_signal(text), "{text:?} should be a risk signal");
        }
    }

    #[test]
    fn detects_surgery_and_fracture() {
        let detector = KeywordRiskDetector::new();
        assert!(detector.is_risk_signal("fiz cirurgia no joelho"));
        assert!(detector.is_risk_signal("Fratura no punho ano passado"));
    }

    #[test]
    fn ignores_neutral_text() {
        let detector = KeywordRiskDetector::new();
        assert!(!detector.is_risk_signal("hipertrofia de pernas, 3x por semana"));
        assert!(!detector.is_risk_signal("academia perto de casa"));
    }

    #[test]
    fn substring_matching_is_preserved() {
        // Known false positive of keyword matching.
        let detector = KeywordRiskDetector::new();
        assert!(detector.is_risk_signal("durmo mal, vou dormir tarde"));
    }

    #[test]
    fn custom_terms_are_lowercased() {
        let detector = KeywordRiskDetector::with_terms(["Hernia", ""]);
        assert_eq!(detector.terms(), ["hernia"]);
        assert!(detector.is_risk_signal("tenho HERNIA de disco"));
        assert!(!detector.is_risk_signal("sinto dor"));
    }
}
