//! HTML rendering for the three flows.
//!
//! Every piece of user or model text goes through [`format_text`] or
//! [`escape_html`] before it is placed in markup.

use upseller_ai::{CouncilReport, ExtractionMethod};
use upseller_core::{Question, QuestionnaireState, LEVEL_COUNT};

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; max-width: 750px; margin: 40px auto; padding: 0 10px; }
textarea { width: 100%; padding: 10px; font-size: 15px; box-sizing: border-box; }
button { padding: 10px 20px; font-size: 16px; cursor: pointer; }
button.secondary { background: none; border: 1px solid #999; font-size: 14px; }
nav { margin-bottom: 25px; }
nav a { margin-right: 15px; color: #333; }
nav a.active { font-weight: bold; text-decoration: none; }
.box { margin-top: 20px; padding: 15px; background: #f2f2f2; border-radius: 8px; }
.box.error { background: #fdecea; }
.box.verify { background: #eef5ff; }
.hint { margin-top: 10px; font-size: 13px; color: #777; }
.notice { margin: 15px 0; padding: 10px; background: #fff4ce; border-radius: 6px; }
.progress { font-size: 13px; color: #777; }
.opinion { margin-top: 12px; }
.opinion .model { font-size: 12px; color: #777; }
"#;

/// Navigation entry that is highlighted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Optimize,
    Questionnaire,
    Analyze,
    None,
}

/// Escape text for use in element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape, then turn line breaks into `<br>`
pub fn format_text(text: &str) -> String {
    escape_html(text)
        .replace("\r\n", "\n")
        .replace('\n', "<br>")
}

fn nav(active: Nav) -> String {
    [
        (Nav::Optimize, "/", "Text optimieren"),
        (Nav::Questionnaire, "/questionnaire", "Fragebogen"),
        (Nav::Analyze, "/analyze", "Marktanalyse"),
    ]
    .iter()
    .map(|(entry, href, label)| {
        if *entry == active {
            format!(r#"<a class="active" href="{}">{}</a>"#, href, label)
        } else {
            format!(r#"<a href="{}">{}</a>"#, href, label)
        }
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// Page shell shared by every view
pub fn layout(active: Nav, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="de">
<head>
    <meta charset="utf-8">
    <title>Upseller PRO</title>
    <style>{}</style>
</head>
<body>
    <h1>Upseller PRO – Test Dashboard</h1>
    <nav>
{}
    </nav>
{}
</body>
</html>
"#,
        STYLE,
        nav(active),
        body
    )
}

fn hidden(name: &str, value: &str) -> String {
    format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        name,
        escape_html(value)
    )
}

pub fn notice(message: &str) -> String {
    format!(r#"<div class="notice">{}</div>"#, format_text(message))
}

fn optional_notice(message: Option<&str>) -> String {
    message.map(notice).unwrap_or_default()
}

/// Result box of the optimizer
pub fn answer_box(text: &str) -> String {
    format!(
        "<div class='box'><b>Upseller-PRO Antwort:</b><br>{}</div>",
        format_text(text)
    )
}

/// Failure of a provider call, shown in place of the answer
pub fn ai_error_box(error: &str) -> String {
    format!(
        "<div class='box error'>{}</div>",
        format_text(&format!("Fehler bei der KI-Anfrage: {}", error))
    )
}

pub struct OptimizeView<'a> {
    pub input: &'a str,
    pub history_token: &'a str,
    pub turns: usize,
    pub result_html: &'a str,
    pub notice: Option<&'a str>,
}

pub fn optimize_page(view: &OptimizeView<'_>) -> String {
    let conversation = if view.turns > 0 {
        format!(
            r#"<div class="hint">Verlauf: {} Nachrichten. Schreib eine Anweisung wie „kürzer“ oder „förmlicher“, um weiterzuarbeiten.
        <button class="secondary" type="submit" name="reset" value="1">Neues Gespräch</button></div>"#,
            view.turns
        )
    } else {
        String::new()
    };

    let body = format!(
        r#"    <p>Gib einen Text ein (z.B. deine eBay-Anzeige, Produktbeschreibung, Nachricht an Kunden).</p>
    {notice}
    <form method="post" action="/">
        {history}
        <textarea name="text" rows="8">{input}</textarea><br/><br/>
        <button type="submit">Mit KI optimieren</button>
        {conversation}
    </form>

    <div class="hint">
        Die KI arbeitet wie dein geheimer Verkaufsprofi: Sie macht Texte knackiger, klarer und verkaufsstärker –
        ohne deinen Stil komplett zu zerstören.
    </div>

    {result}
"#,
        notice = optional_notice(view.notice),
        history = hidden("history", view.history_token),
        input = escape_html(view.input),
        conversation = conversation,
        result = view.result_html,
    );

    layout(Nav::Optimize, &body)
}

pub fn questionnaire_page(
    question: &Question,
    state_token: &str,
    answer: &str,
    notice: Option<&str>,
) -> String {
    let body = format!(
        r#"    <p class="progress">Frage {level} von {total}</p>
    <h2>{title}</h2>
    <p>{prompt}</p>
    {notice}
    <form method="post" action="/questionnaire">
        {state}
        <textarea name="answer" rows="4" placeholder="{placeholder}">{answer}</textarea><br/><br/>
        <button type="submit">Weiter</button>
        <button class="secondary" type="submit" name="restart" value="1">Neu starten</button>
    </form>
"#,
        level = question.level,
        total = LEVEL_COUNT,
        title = escape_html(question.title),
        prompt = escape_html(question.prompt),
        notice = optional_notice(notice),
        state = hidden("state", state_token),
        placeholder = escape_html(question.placeholder),
        answer = escape_html(answer),
    );

    layout(Nav::Questionnaire, &body)
}

/// Final page of the questionnaire: the answers and the analysis result
pub fn questionnaire_result_page(
    state: &QuestionnaireState,
    state_token: &str,
    result_html: &str,
) -> String {
    let answers = state
        .answers_in_order()
        .map(|(question, answer)| {
            format!(
                "<li><b>{}:</b> {}</li>",
                escape_html(question.title),
                format_text(answer)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let body = format!(
        r#"    <h2>Deine Angaben</h2>
    <ul>
{answers}
    </ul>
    <form method="post" action="/questionnaire">
        {state}
        <button type="submit">Analyse erneut ausführen</button>
        <button class="secondary" type="submit" name="restart" value="1">Neu starten</button>
    </form>
    {result}
"#,
        answers = answers,
        state = hidden("state", state_token),
        result = result_html,
    );

    layout(Nav::Questionnaire, &body)
}

pub fn analyze_page(text: &str, result_html: &str, notice: Option<&str>) -> String {
    let body = format!(
        r#"    <p>Beschreibe deinen Artikel. Optional kannst du ein Produktfoto hochladen (PNG, JPEG, GIF oder WebP).</p>
    {notice}
    <form method="post" action="/analyze" enctype="multipart/form-data">
        <textarea name="text" rows="8">{text}</textarea><br/><br/>
        <input type="file" name="image" accept="image/png,image/jpeg,image/gif,image/webp"><br/><br/>
        <button type="submit">Marktanalyse starten</button>
    </form>
    <div class="hint">Mehrere KIs bewerten dein Angebot, danach fasst eine Meta-Analyse alles zusammen.</div>
    {result}
"#,
        notice = optional_notice(notice),
        text = escape_html(text),
        result = result_html,
    );

    layout(Nav::Analyze, &body)
}

/// Meta analysis, verification prompt and the individual opinions
pub fn council_result(report: &CouncilReport) -> String {
    let mut html = String::new();

    match (&report.meta, &report.meta_error) {
        (Some(meta), _) => {
            html.push_str(&format!(
                "<div class='box'><b>Marktanalyse ({}):</b><br>{}</div>",
                escape_html(&report.meta_label),
                format_text(&meta.market_analysis)
            ));
            if let Some(prompt) = &meta.verification_prompt {
                html.push_str(&format!(
                    "<div class='box verify'><b>Prompt zur Gegenprüfung durch eine andere KI:</b><br>{}</div>",
                    format_text(prompt)
                ));
            }
            if meta.method == ExtractionMethod::Raw {
                html.push_str(
                    r#"<div class="hint">Die Meta-Analyse kam ohne die erwartete Gliederung zurück und wird vollständig angezeigt.</div>"#,
                );
            }
        }
        (None, Some(error)) => {
            html.push_str(&notice(&format!(
                "Die Meta-Analyse ist fehlgeschlagen ({}). Hier sind die einzelnen Einschätzungen.",
                error
            )));
        }
        (None, None) => {}
    }

    html.push_str("<h2>Einzelne Einschätzungen</h2>\n");
    for opinion in &report.opinions {
        let content = match &opinion.outcome {
            Ok(text) => format_text(text),
            Err(error) => format!(
                "<i>{}</i>",
                format_text(&format!("Fehler bei der KI-Anfrage: {}", error))
            ),
        };
        html.push_str(&format!(
            "<div class='opinion box'><b>{}</b> <span class='model'>{}</span><br>{}</div>\n",
            escape_html(&opinion.label),
            escape_html(&opinion.model),
            content
        ));
    }

    html
}

pub fn error_page(title: &str, message: &str) -> String {
    let body = format!(
        r#"    <div class="box error"><b>{}</b><br>{}</div>
    <p><a href="/">Zurück zur Startseite</a></p>
"#,
        escape_html(title),
        format_text(message)
    );
    layout(Nav::None, &body)
}
