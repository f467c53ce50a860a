//! Prompt texts for the optimizer and the council.

use crate::meta_extract::{ANALYSIS_END, ANALYSIS_START, VERIFY_END, VERIFY_START};
use upseller_core::QuestionnaireState;

pub const OPTIMIZER_SYSTEM_PROMPT: &str = "Du bist UPSELLER PRO, ein Profi für Verkaufspsychologie und Konversion. \
Deine Aufgabe: Optimiere Texte für Kleinanzeigen, eBay, Vinted, Immobilien, Dienstleistungen usw. \
Ziele: mehr Vertrauen, höherer Preis, klarer Nutzen für den Kunden. \
Sprache: deutsch, locker-professionell. \
Maximiere den wahrgenommenen Wert, aber bleib ehrlich – keine Lügen.";

pub const OPINION_SYSTEM_PROMPT: &str = "Du bist ein erfahrener Marktanalyst für den Wiederverkauf von Waren \
auf Plattformen wie eBay, Kleinanzeigen und Vinted. \
Bewerte das beschriebene Angebot nüchtern: realistischer Marktpreis, Nachfrage, Zielgruppe, \
Stärken, Schwächen und konkrete Tipps für eine bessere Anzeige. \
Antworte auf Deutsch, strukturiert und ohne Floskeln. Erfinde keine Fakten über den Artikel.";

/// User message for the rewrite.
///
/// The first turn carries the original text; later turns are instructions
/// that refer to the previous answer in the history.
pub fn optimizer_user_prompt(text: &str, is_follow_up: bool) -> String {
    if is_follow_up {
        format!(
            "Überarbeite deinen letzten Vorschlag nach dieser Anweisung. \
             Gib mir wieder NUR den optimierten Text zurück, keine Erklärungen.\n\n{}",
            text
        )
    } else {
        format!(
            "Hier ist der Originaltext, den du optimieren sollst. \
             Gib mir NUR den optimierten Text zurück, keine Erklärungen.\n\n{}",
            text
        )
    }
}

/// Product brief built from a completed questionnaire
pub fn questionnaire_brief(state: &QuestionnaireState) -> String {
    state
        .answers_in_order()
        .map(|(question, answer)| format!("{}: {}", question.title, answer))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn opinion_user_prompt(brief: &str, has_image: bool) -> String {
    let image_note = if has_image {
        "\n\nEin Produktfoto liegt bei. Beziehe sichtbaren Zustand und Details in deine Bewertung ein."
    } else {
        ""
    };
    format!(
        "Analysiere dieses Verkaufsangebot.\n\n{}{}",
        brief.trim(),
        image_note
    )
}

/// Note for members that cannot look at the uploaded image
pub const IMAGE_UNSUPPORTED_NOTE: &str =
    "\n\n(Ein Produktfoto wurde hochgeladen, kann von diesem Modell aber nicht ausgewertet werden.)";

pub fn meta_system_prompt() -> String {
    format!(
        "Du bist der Vorsitzende eines Gremiums aus mehreren KI-Analysten. \
         Du erhältst die Einschätzungen aller Analysten zu einem Verkaufsangebot. \
         Führe sie zu einer einzigen, widerspruchsfreien Marktanalyse zusammen: \
         Preisempfehlung mit Spanne, Zielgruppe, Nachfrage, Risiken und die drei wichtigsten \
         Verbesserungen für die Anzeige. Benenne Punkte, in denen die Analysten uneinig sind.\n\n\
         Formuliere danach einen Prompt, mit dem der Nutzer das Ergebnis bei einer anderen KI \
         gegenprüfen lassen kann.\n\n\
         Halte dich exakt an dieses Format:\n\
         {}\n<Marktanalyse>\n{}\n{}\n<Verifikations-Prompt>\n{}",
        ANALYSIS_START, ANALYSIS_END, VERIFY_START, VERIFY_END
    )
}

/// Meta prompt listing every successful opinion under its provider label
pub fn meta_user_prompt(brief: &str, opinions: &[(&str, &str)]) -> String {
    let mut prompt = format!("Angebot:\n{}\n\n", brief.trim());
    for (label, opinion) in opinions {
        prompt.push_str(&format!("=== Einschätzung von {} ===\n{}\n\n", label, opinion.trim()));
    }
    prompt.push_str("Erstelle jetzt die zusammengeführte Analyse im vorgegebenen Format.");
    prompt
}
