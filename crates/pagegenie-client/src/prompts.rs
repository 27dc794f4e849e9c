//! Prompt templates for the on-device prompt model.

use pagegenie_core::defaults;
use pagegenie_core::{Operation, Persona};

/// Wrap `text` between the delimiter lines every template ends with.
fn delimited(instruction: &str, text: &str) -> String {
    format!("{instruction}\n\n---\n{text}\n---")
}

/// Build the prompt for one operation.
///
/// `translate` interpolates `target_lang`, defaulting to `en` when blank.
pub fn build_prompt(operation: Operation, text: &str, target_lang: &str) -> String {
    match operation {
        Operation::Summarize => delimited(
            "Summarize the following text concisely in bullet points.\nReturn only the summary.",
            text,
        ),
        Operation::Explain => delimited(
            "Explain the following text for a general audience.\nBe clear and concise. Return only the explanation.",
            text,
        ),
        Operation::Rewrite => delimited(
            "Rewrite the following text to improve clarity and flow without changing meaning.\nReturn only the rewritten text.",
            text,
        ),
        Operation::Proofread => delimited(
            "Proofread and correct grammar and spelling.\nKeep the original meaning and voice. Return only the corrected text.",
            text,
        ),
        Operation::Translate => {
            let lang = match target_lang.trim() {
                "" => defaults::TARGET_LANG,
                lang => lang,
            };
            delimited(
                &format!(
                    "Translate the following text to {lang}.\nReturn only the translation (no notes or explanations)."
                ),
                text,
            )
        }
        Operation::CommentCode => delimited(
            "Add clear, explanatory comments to this code using appropriate line comment syntax for the language (e.g., //, #, --). Do not change behavior. Do not wrap in Markdown fences. Return only the full commented code.",
            text,
        ),
        Operation::QuizGenerate | Operation::CompareConcept => {
            delimited("Process the following and return only the result:", text)
        }
    }
}

/// Audience line for `summarize`/`explain`.
pub fn persona_context(persona: Persona, operation: Operation) -> &'static str {
    match (operation, persona) {
        (Operation::Summarize, Persona::Researcher) => {
            "Summarize for a researcher: be precise, avoid hype, highlight evidence and key figures."
        }
        (Operation::Summarize, Persona::Student) => {
            "Summarize for a student: simple language, key points, one short example if useful."
        }
        (Operation::Summarize, Persona::Editor) => {
            "Summarize for an editor: very concise, clear, actionable takeaways."
        }
        (Operation::Summarize, Persona::General) => "Summarize clearly for a general audience.",
        (Operation::Explain, Persona::Researcher) => {
            "Explain for a researcher: be precise, avoid hype, note assumptions and limitations."
        }
        (Operation::Explain, Persona::Student) => {
            "Explain for a student: simple language, step-by-step, one short example."
        }
        (Operation::Explain, Persona::Editor) => {
            "Explain for an editor: prioritize clarity and structure; remove jargon."
        }
        (Operation::Explain, Persona::General) => "Explain clearly for a general audience.",
        _ => "Be clear and concise.",
    }
}

/// [`build_prompt`] with the persona line prepended for `summarize`/`explain`.
///
/// No persona, or `general`, yields the plain template.
pub fn build_prompt_for(
    operation: Operation,
    text: &str,
    target_lang: &str,
    persona: Option<Persona>,
) -> String {
    let prompt = build_prompt(operation, text, target_lang);
    match persona {
        Some(p) if p != Persona::General && operation.prefers_structured() => {
            format!("{}\n{}", persona_context(p, operation), prompt)
        }
        _ => prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_template() {
        assert_eq!(
            build_prompt(Operation::Summarize, "hello", "en"),
            "Summarize the following text concisely in bullet points.\nReturn only the summary.\n\n---\nhello\n---"
        );
    }

    #[test]
    fn test_translate_interpolates_language() {
        let prompt = build_prompt(Operation::Translate, "hola", "de");
        assert!(prompt.starts_with("Translate the following text to de.\n"));
        assert!(prompt.ends_with("\n\n---\nhola\n---"));
    }

    #[test]
    fn test_translate_defaults_to_en() {
        let prompt = build_prompt(Operation::Translate, "hola", "  ");
        assert!(prompt.starts_with("Translate the following text to en.\n"));
    }

    #[test]
    fn test_every_template_delimits_text() {
        for op in Operation::ALL {
            let prompt = build_prompt(op, "BODY", "fr");
            assert!(prompt.ends_with("\n\n---\nBODY\n---"), "{op}");
        }
    }

    #[test]
    fn test_non_ai_operations_use_generic_template() {
        assert_eq!(
            build_prompt(Operation::QuizGenerate, "x", "en"),
            "Process the following and return only the result:\n\n---\nx\n---"
        );
    }

    #[test]
    fn test_persona_prefix_only_for_summarize_and_explain() {
        let p = build_prompt_for(Operation::Summarize, "t", "en", Some(Persona::Student));
        assert!(p.starts_with("Summarize for a student:"));

        let plain = build_prompt_for(Operation::Rewrite, "t", "en", Some(Persona::Editor));
        assert_eq!(plain, build_prompt(Operation::Rewrite, "t", "en"));

        let general = build_prompt_for(Operation::Explain, "t", "en", Some(Persona::General));
        assert_eq!(general, build_prompt(Operation::Explain, "t", "en"));
    }

    #[test]
    fn test_persona_context_fallback() {
        assert_eq!(
            persona_context(Persona::Researcher, Operation::Translate),
            "Be clear and concise."
        );
    }
}
