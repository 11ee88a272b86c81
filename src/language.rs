//! Decides whether a message is already in the target language.

use whatlang::Lang;

/// ISO 639-1 code of the language every relayed message is translated into.
pub const TARGET_LANGUAGE: &str = "en";

pub trait LanguageGate: Send + Sync {
    /// `true` when `text` needs no translation.
    fn is_target_language(&self, text: &str) -> bool;
}

/// Statistical trigram detection via `whatlang`.
///
/// No confidence threshold is applied, so very short text is classified by
/// whatever the detector guesses. Text it cannot classify at all is treated
/// as foreign and gets translated.
#[derive(Debug, Clone, Copy)]
pub struct WhatlangGate {
    target: Lang,
}

impl WhatlangGate {
    pub fn new(target: Lang) -> Self {
        Self { target }
    }
}

impl Default for WhatlangGate {
    fn default() -> Self {
        Self::new(Lang::Eng)
    }
}

impl LanguageGate for WhatlangGate {
    fn is_target_language(&self, text: &str) -> bool {
        whatlang::detect(text).is_some_and(|info| info.lang() == self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_sentence_is_target() {
        let gate = WhatlangGate::default();
        assert!(gate.is_target_language(
            "The weather today is really nice and I think we should go for a walk in the park."
        ));
    }

    #[test]
    fn test_spanish_sentence_is_not_target() {
        let gate = WhatlangGate::default();
        assert!(!gate.is_target_language(
            "Hola a todos, hoy vamos a hablar sobre el proyecto que empezamos la semana pasada."
        ));
    }

    #[test]
    fn test_japanese_sentence_is_not_target() {
        let gate = WhatlangGate::default();
        assert!(!gate.is_target_language("今日はとても良い天気ですね。散歩に行きましょう。"));
    }

    #[test]
    fn test_undetectable_text_is_not_target() {
        let gate = WhatlangGate::default();
        assert!(!gate.is_target_language(""));
        assert!(!gate.is_target_language("12345 !!!"));
    }

    #[test]
    fn test_custom_target() {
        let gate = WhatlangGate::new(Lang::Spa);
        assert!(gate.is_target_language(
            "Hola a todos, hoy vamos a hablar sobre el proyecto que empezamos la semana pasada."
        ));
    }

    #[test]
    fn test_gate_is_deterministic() {
        let gate = WhatlangGate::default();
        let text = "Bonjour tout le monde, comment allez-vous aujourd'hui ?";
        let first = gate.is_target_language(text);
        for _ in 0..5 {
            assert_eq!(gate.is_target_language(text), first);
        }
    }
}
