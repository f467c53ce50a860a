//! Linear eight-level questionnaire collected before the market analysis runs.
//!
//! The state is a level index plus the answers given so far. It is carried by
//! the client (see [`crate::client_state`]) and re-validated on every request.

use crate::error::{Result, UpsellerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of questions before the analysis is triggered
pub const LEVEL_COUNT: u8 = 8;

/// Level reached once every question has been answered
pub const ANALYSIS_LEVEL: u8 = LEVEL_COUNT + 1;

/// Longest accepted answer, in characters
pub const MAX_ANSWER_CHARS: usize = 2000;

/// One fixed question of the questionnaire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub level: u8,
    pub title: &'static str,
    pub prompt: &'static str,
    pub placeholder: &'static str,
}

pub static QUESTIONS: [Question; LEVEL_COUNT as usize] = [
    Question {
        level: 1,
        title: "Produkt",
        prompt: "Was möchtest du verkaufen? Nenne Marke, Modell und die wichtigsten Eckdaten.",
        placeholder: "z.B. Rennrad Canyon Ultimate CF SL, Rahmengröße M, Baujahr 2021",
    },
    Question {
        level: 2,
        title: "Zustand",
        prompt: "In welchem Zustand ist der Artikel?",
        placeholder: "z.B. neuwertig, kaum benutzt, regelmäßig gewartet",
    },
    Question {
        level: 3,
        title: "Zielgruppe",
        prompt: "Wen möchtest du mit der Anzeige ansprechen?",
        placeholder: "z.B. ambitionierte Hobbysportler, Studierende, Sammler",
    },
    Question {
        level: 4,
        title: "Preis",
        prompt: "Welchen Preis stellst du dir vor, und was ist deine Schmerzgrenze?",
        placeholder: "z.B. 1.450 € VB, nicht unter 1.200 €",
    },
    Question {
        level: 5,
        title: "Plattform",
        prompt: "Auf welcher Plattform soll der Artikel angeboten werden?",
        placeholder: "z.B. eBay, Kleinanzeigen, Vinted, eigener Shop",
    },
    Question {
        level: 6,
        title: "Besonderheiten",
        prompt: "Was macht deinen Artikel besonders? Zubehör, Upgrades, Rechnung, Garantie?",
        placeholder: "z.B. Originalrechnung, neue Reifen, Carbon-Laufräder",
    },
    Question {
        level: 7,
        title: "Mängel",
        prompt: "Gibt es Mängel oder Gebrauchsspuren, die Käufer kennen sollten?",
        placeholder: "z.B. kleiner Kratzer am Oberrohr, sonst keine",
    },
    Question {
        level: 8,
        title: "Übergabe",
        prompt: "Wie kommt der Artikel zum Käufer? Versand, Abholung, Besichtigung?",
        placeholder: "z.B. nur Abholung in Köln, Probefahrt möglich",
    },
];

/// Look up the question for a level (1-based)
pub fn question(level: u8) -> Option<&'static Question> {
    if level == 0 {
        return None;
    }
    QUESTIONS.get(usize::from(level - 1))
}

/// What the client should see next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Asking(&'static Question),
    Analysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireState {
    level: u8,
    #[serde(default)]
    answers: BTreeMap<u8, String>,
}

impl Default for QuestionnaireState {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionnaireState {
    pub fn new() -> Self {
        Self {
            level: 1,
            answers: BTreeMap::new(),
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn answers(&self) -> &BTreeMap<u8, String> {
        &self.answers
    }

    pub fn is_complete(&self) -> bool {
        self.level == ANALYSIS_LEVEL
    }

    pub fn stage(&self) -> Stage {
        match question(self.level) {
            Some(q) => Stage::Asking(q),
            None => Stage::Analysis,
        }
    }

    /// Record the answer for the current level and advance by one
    pub fn answer(&mut self, text: &str) -> Result<Stage> {
        if self.is_complete() {
            return Err(UpsellerError::InvalidState(
                "questionnaire is already complete".to_string(),
            ));
        }

        let answer = normalize_answer(text)?;
        self.answers.insert(self.level, answer);
        self.level += 1;

        tracing::debug!(level = self.level, "Questionnaire advanced");
        Ok(self.stage())
    }

    /// Check a state that came back from the client
    pub fn validate(&self) -> Result<()> {
        if !(1..=ANALYSIS_LEVEL).contains(&self.level) {
            return Err(UpsellerError::InvalidState(format!(
                "level {} is outside 1..={}",
                self.level, ANALYSIS_LEVEL
            )));
        }

        let expected: Vec<u8> = (1..self.level).collect();
        let actual: Vec<u8> = self.answers.keys().copied().collect();
        if expected != actual {
            return Err(UpsellerError::InvalidState(format!(
                "answers {:?} do not match level {}",
                actual, self.level
            )));
        }

        for (level, answer) in &self.answers {
            if answer.trim().is_empty() || answer.chars().count() > MAX_ANSWER_CHARS {
                return Err(UpsellerError::InvalidState(format!(
                    "answer for level {} is empty or too long",
                    level
                )));
            }
        }

        Ok(())
    }

    /// Answered questions in level order
    pub fn answers_in_order(&self) -> impl Iterator<Item = (&'static Question, &str)> + '_ {
        self.answers
            .iter()
            .filter_map(|(level, answer)| question(*level).map(|q| (q, answer.as_str())))
    }
}

fn normalize_answer(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(UpsellerError::Validation(
            "Bitte gib eine Antwort ein.".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_ANSWER_CHARS {
        return Err(UpsellerError::Validation(format!(
            "Die Antwort ist zu lang (maximal {} Zeichen).",
            MAX_ANSWER_CHARS
        )));
    }
    Ok(trimmed.to_string())
}
