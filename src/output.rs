//! Output types: what each task returns and the stats of a run.
//!
//! Field names are French because they are the wire contract shared with the
//! front-end and with the prompt templates in [`crate::prompts`].
//!
//! Decoding is lenient on purpose. A model that forgets a key or writes
//! `"numero_page": "5"` still produces a usable result; every missing field
//! falls back to its empty value. The `Default` of each type is exactly the
//! fallback shape returned when no JSON can be recovered at all.

use crate::format::DocumentFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Tasks ────────────────────────────────────────────────────────────────

/// The three study aids the service can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// Summary, question lists and revision cards.
    StudyMaterial,
    /// Basic quiz: a flat list of questions.
    Quiz,
    /// Multiple-choice quiz with graded, justified answers.
    GradedQuiz,
}

impl Task {
    pub fn name(self) -> &'static str {
        match self {
            Task::StudyMaterial => "study-material",
            Task::Quiz => "quiz",
            Task::GradedQuiz => "graded-quiz",
        }
    }
}

/// A decoded task result.
///
/// `Default` must be the task's fallback shape.
pub trait TaskResult: Serialize + for<'de> Deserialize<'de> + Default + Send + 'static {
    const TASK: Task;

    /// Top-level keys of the task's JSON object; a decoded object must carry
    /// at least one of them.
    const KEYS: &'static [&'static str];

    /// Enforce invariants the model may have broken; returns how many items
    /// were discarded.
    fn sanitize(&mut self) -> usize {
        0
    }
}

// ── Study material ───────────────────────────────────────────────────────

/// Summary-mode output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyMaterial {
    /// HTML summary (`<p>…</p>`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub resume: String,
    #[serde(default)]
    pub questions: QuestionLists,
    /// Revision cards.
    #[serde(default)]
    pub fiche: Vec<RevisionCard>,
}

/// The two numbered question lists, each a single `"1. …\n2. …"` string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionLists {
    #[serde(default, deserialize_with = "lenient_string")]
    pub generales: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub detaillees: String,
}

/// One revision card (`fiche`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionCard {
    #[serde(default, deserialize_with = "lenient_string")]
    pub titre: String,
    /// HTML summary of the part.
    #[serde(default, deserialize_with = "lenient_string")]
    pub resume: String,
    /// Numbered key points, `"1. …\n2. …"`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub points: String,
    #[serde(default, deserialize_with = "lenient_page")]
    pub numero_page: i64,
}

impl TaskResult for StudyMaterial {
    const TASK: Task = Task::StudyMaterial;
    const KEYS: &'static [&'static str] = &["resume", "questions", "fiche"];
}

// ── Basic quiz ───────────────────────────────────────────────────────────

/// Basic quiz (legacy shape).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicQuiz {
    #[serde(default)]
    pub questions: Vec<QuizEntry>,
}

/// A basic-quiz entry: normally a string, kept verbatim when the model
/// emits a question/answer object instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuizEntry {
    Text(String),
    Structured(Value),
}

impl TaskResult for BasicQuiz {
    const TASK: Task = Task::Quiz;
    const KEYS: &'static [&'static str] = &["questions"];
}

// ── Graded quiz ──────────────────────────────────────────────────────────

/// Number of answers each graded question must offer.
pub const ANSWERS_PER_QUESTION: usize = 3;

/// Multiple-choice quiz.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradedQuiz {
    /// Entries that are not question objects decode as an empty question,
    /// which [`TaskResult::sanitize`] then drops and counts.
    #[serde(default, deserialize_with = "lenient_questions")]
    pub questions: Vec<GradedQuestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradedQuestion {
    #[serde(default, deserialize_with = "lenient_string")]
    pub question: String,
    #[serde(default)]
    pub reponses: Vec<Answer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default, deserialize_with = "lenient_string")]
    pub texte: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub correct: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub explication: String,
}

impl GradedQuestion {
    /// Non-empty question text, three answers, exactly one correct, and an
    /// explanation for every answer.
    pub fn is_well_formed(&self) -> bool {
        !self.question.trim().is_empty()
            && self.reponses.len() == ANSWERS_PER_QUESTION
            && self.reponses.iter().filter(|a| a.correct).count() == 1
            && self.reponses.iter().all(|a| !a.explication.trim().is_empty())
    }
}

impl TaskResult for GradedQuiz {
    const TASK: Task = Task::GradedQuiz;
    const KEYS: &'static [&'static str] = &["questions"];

    fn sanitize(&mut self) -> usize {
        let before = self.questions.len();
        self.questions.retain(GradedQuestion::is_well_formed);
        before - self.questions.len()
    }
}

// ── Run output ───────────────────────────────────────────────────────────

/// How the parser obtained the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseOutcome {
    /// The whole response was valid JSON.
    Strict,
    /// JSON was recovered from surrounding prose or code fences.
    Embedded,
    /// Nothing decodable; the empty shape was returned.
    Fallback,
}

/// Result of one task run plus its stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput<T> {
    pub result: T,
    pub stats: RunStats,
}

/// Per-run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub task: Task,
    pub format: DocumentFormat,
    /// Segments sent to the model.
    pub segments: usize,
    /// Pages or slides in the source; `None` for DOCX.
    pub source_units: Option<u32>,
    /// Pages or slides dropped for lack of text.
    pub skipped_units: Vec<u32>,
    pub document_chars: usize,
    pub prompt_chars: usize,
    pub parse_outcome: ParseOutcome,
    /// Items removed by [`TaskResult::sanitize`].
    pub discarded_items: usize,
    pub model_attempts: u32,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub extract_duration_ms: u64,
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}

// ── Numbered lists ───────────────────────────────────────────────────────

static RE_NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\s*[.)]\s*(.*)$").unwrap());

/// Split a numbered-list string (`"1. a\n2. b"`) into its items.
///
/// Lines without a number continue the previous item; blank lines are
/// ignored. Text before the first numbered line is treated as an item.
pub fn numbered_items(list: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for line in list.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match RE_NUMBERED_ITEM.captures(line) {
            Some(caps) => items.push(caps[1].trim().to_string()),
            None => match items.last_mut() {
                Some(last) => {
                    last.push(' ');
                    last.push_str(line);
                }
                None => items.push(line.to_string()),
            },
        }
    }
    items
}

// ── Lenient decoding ─────────────────────────────────────────────────────

/// Accept a string, a number or a bool as text; `null` and anything else
/// become empty. Arrays of strings are joined as a numbered list.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    })
}

/// Decode each graded question on its own; an entry that is not a question
/// object becomes [`GradedQuestion::default`] instead of failing the list.
/// A non-array value yields no questions.
fn lenient_questions<'de, D>(deserializer: D) -> Result<Vec<GradedQuestion>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}

/// Accept a bool or `"true"`/`"vrai"` (any case); anything else is `false`.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "vrai"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}

/// Accept an integer or a numeric string; anything else becomes `0`.
fn lenient_page<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn study_material_default_is_fallback_shape() {
        let v = serde_json::to_value(StudyMaterial::default()).unwrap();
        assert_eq!(
            v,
            json!({"resume": "", "questions": {"generales": "", "detaillees": ""}, "fiche": []})
        );
    }

    #[test]
    fn quiz_defaults_serialise_to_empty_questions() {
        assert_eq!(
            serde_json::to_string(&BasicQuiz::default()).unwrap(),
            r#"{"questions":[]}"#
        );
        assert_eq!(
            serde_json::to_string(&GradedQuiz::default()).unwrap(),
            r#"{"questions":[]}"#
        );
    }

    #[test]
    fn revision_card_page_accepts_strings_and_junk() {
        let cards: Vec<RevisionCard> = serde_json::from_value(json!([
            {"titre": "A", "numero_page": 5},
            {"titre": "B", "numero_page": "7"},
            {"titre": "C", "numero_page": null},
            {"titre": "D"}
        ]))
        .unwrap();
        let pages: Vec<i64> = cards.iter().map(|c| c.numero_page).collect();
        assert_eq!(pages, vec![5, 7, 0, 0]);
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let m: StudyMaterial = serde_json::from_value(json!({"resume": "<p>R</p>"})).unwrap();
        assert_eq!(m.resume, "<p>R</p>");
        assert_eq!(m.questions, QuestionLists::default());
        assert!(m.fiche.is_empty());
    }

    #[test]
    fn list_valued_points_become_numbered_string() {
        let card: RevisionCard =
            serde_json::from_value(json!({"points": ["Mitose", "Méiose"]})).unwrap();
        assert_eq!(card.points, "1. Mitose\n2. Méiose");
    }

    #[test]
    fn basic_quiz_keeps_structured_entries() {
        let q: BasicQuiz = serde_json::from_value(json!({
            "questions": ["Qu'est-ce qu'une cellule ?", {"question": "ADN ?", "reponse": "Acide"}]
        }))
        .unwrap();
        assert_eq!(q.questions.len(), 2);
        assert!(matches!(q.questions[0], QuizEntry::Text(_)));
        assert!(matches!(q.questions[1], QuizEntry::Structured(_)));
        // Round-trips transparently.
        let back = serde_json::to_value(&q).unwrap();
        assert_eq!(back["questions"][1]["reponse"], "Acide");
    }

    fn answer(correct: bool) -> Answer {
        Answer {
            texte: "t".into(),
            correct,
            explication: "e".into(),
        }
    }

    #[test]
    fn graded_sanitize_drops_malformed_questions() {
        let mut quiz = GradedQuiz {
            questions: vec![
                GradedQuestion {
                    question: "ok".into(),
                    reponses: vec![answer(true), answer(false), answer(false)],
                },
                GradedQuestion {
                    question: "two correct".into(),
                    reponses: vec![answer(true), answer(true), answer(false)],
                },
                GradedQuestion {
                    question: "only two".into(),
                    reponses: vec![answer(true), answer(false)],
                },
                GradedQuestion {
                    question: " ".into(),
                    reponses: vec![answer(true), answer(false), answer(false)],
                },
            ],
        };
        assert_eq!(quiz.sanitize(), 3);
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].question, "ok");
    }

    #[test]
    fn graded_question_needs_every_explanation() {
        let mut missing = answer(false);
        missing.explication = "  ".into();
        let mut quiz = GradedQuiz {
            questions: vec![GradedQuestion {
                question: "sans justification".into(),
                reponses: vec![answer(true), missing, answer(false)],
            }],
        };
        assert!(!quiz.questions[0].is_well_formed());
        assert_eq!(quiz.sanitize(), 1);
        assert!(quiz.questions.is_empty());
    }

    #[test]
    fn non_object_graded_entries_are_dropped_not_fatal() {
        let full = json!({"question": "Q", "reponses": [
            {"texte": "a", "correct": true, "explication": "x"},
            {"texte": "b", "correct": false, "explication": "y"},
            {"texte": "c", "correct": false, "explication": "z"}
        ]});
        let mut quiz: GradedQuiz = serde_json::from_value(json!({
            "questions": ["Note : trois questions seulement.", full, 42, {"question": "Q2", "reponses": "aucune"}]
        }))
        .unwrap();
        assert_eq!(quiz.questions.len(), 4);
        assert_eq!(quiz.sanitize(), 3);
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].question, "Q");

        let quiz: GradedQuiz = serde_json::from_value(json!({"questions": "aucune"})).unwrap();
        assert!(quiz.questions.is_empty());
    }

    #[test]
    fn answer_correct_flag_is_lenient() {
        let answers: Vec<Answer> = serde_json::from_value(json!([
            {"texte": "a", "correct": true},
            {"texte": "b", "correct": "Vrai"},
            {"texte": "c", "correct": "false"},
            {"texte": "d"}
        ]))
        .unwrap();
        let flags: Vec<bool> = answers.iter().map(|a| a.correct).collect();
        assert_eq!(flags, vec![true, true, false, false]);
    }

    #[test]
    fn numbered_items_splits_lines() {
        assert_eq!(
            numbered_items("1. Première\n2. Deuxième\n3) Troisième"),
            vec!["Première", "Deuxième", "Troisième"]
        );
    }

    #[test]
    fn numbered_items_joins_continuations() {
        assert_eq!(
            numbered_items("1. Début\nsuite de la ligne\n\n2. Fin"),
            vec!["Début suite de la ligne", "Fin"]
        );
        assert!(numbered_items("").is_empty());
    }
}
