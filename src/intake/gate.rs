//! Input gate — rejects low-signal replies before they reach the transcript.

/// Minimum length (in characters, after trimming) for replies without digits.
pub const MIN_CHARS: usize = 7;

/// Replies that carry no information on their own.
const FILLERS: &[&str] = &[
    "oi",
    "oii",
    "ola",
    "olá",
    "ok",
    "okay",
    "sim",
    "nao",
    "não",
    "blz",
    "beleza",
    "tudo bem",
    "bom",
    "boa",
    "certo",
    "entendi",
    "obrigado",
    "obrigada",
    "valeu",
    "perfeito",
    "teste",
];

/// Pure predicate deciding whether a reply is worth recording.
#[derive(Debug, Clone)]
pub struct InputGate {
    min_chars: usize,
}

impl Default for InputGate {
    fn default() -> Self {
        Self {
            min_chars: MIN_CHARS,
        }
    }
}

impl InputGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_chars(min_chars: usize) -> Self {
        Self { min_chars }
    }

    /// `true` if `text` should be recorded as an answer.
    ///
    /// Fillers are always rejected. Anything containing a digit is accepted
    /// regardless of length ("3x", "2/sem"). Otherwise the reply must reach
    /// the minimum length.
    pub fn accepts(&self, text: &str) -> bool {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return false;
        }
        if FILLERS.contains(&normalized.as_str()) {
            return false;
        }
        if normalized.chars().any(|c| c.is_ascii_digit()) {
            return true;
        }
        normalized.chars().count() >= self.min_chars
    }
}
