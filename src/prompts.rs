//! Prompt templates for the three study tasks.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: the JSON contract each template encodes is
//!    mirrored by the types in [`crate::output`]; changing one without the
//!    other is a bug, and keeping both in two files makes that easy to review.
//!
//! 2. **Testability**: unit tests can import and inspect prompts directly
//!    without calling a model, making prompt regressions easy to catch.
//!
//! Templates are written in French: the service targets French-speaking
//! students and the output keys (`resume`, `fiche`, `reponses`…) are part of
//! the wire contract with the front-end.
//!
//! The builder never truncates the document. Token limits belong to the model
//! service; [`crate::output::RunStats::prompt_chars`] reports the size sent.

use crate::output::Task;

/// Study material: summary, two numbered question lists, revision cards.
///
/// List-valued text fields (`generales`, `detaillees`, `points`) are single
/// strings of literal numbered lines, `"1. ...\n2. ...\n3. ..."`. Front-ends
/// split them by convention, so the example below must keep that exact form.
pub const STUDY_MATERIAL_PROMPT: &str = r#"
Tu es un assistant pédagogique expert.
Je vais te fournir un document complet, page par page.
Ta tâche est de générer trois sections distinctes à partir du document :

1. "resume" : Résumé clair et concis du document (<p>)
2. "questions" : Questions sous deux catégories, numérotées, avec HTML
    - "generales" : questions de type général (1., 2., 3., ...)
    - "detaillees" : questions plus spécifiques (1., 2., 3., ...)
3. "fiche" : Tableau JSON de parties de révision :
    - Chaque objet du tableau doit avoir :
        - "titre": titre de la partie
        - "resume": résumé de la partie (<p>)
        - "points": liste des points clés, numérotés de la même façon que les questions (1., 2., 3., ...)
        - "numero_page": numéro de la page correspondant

⚠️ Réponds uniquement en JSON valide avec ces clés :
{
  "resume": "<p>Résumé ici</p>",
  "questions": {
       "generales": "1. Question 1 ...\n2. Question 2 ...",
       "detaillees": "1. Question détaillée 1 ...\n2. Question détaillée 2 ..."
  },
  "fiche": [
      {
        "titre": "Titre de la partie",
        "resume": "<p>Résumé de la partie</p>",
        "points": "1. Point 1 ...\n2. Point 2 ...\n3. Point 3 ...",
        "numero_page": 5
      }
  ]
}

Document (page par page) :
"#;

/// Basic quiz: a list of detailed questions, answers when available.
pub const QUIZ_PROMPT: &str = r#"
Tu es un assistant pédagogique expert.
Génère un quiz à partir du document fourni (page par page).
Répond uniquement en JSON avec une liste de questions détaillées et leur réponse si possible, sous la forme :
{
  "questions": [ ... ]
}

"#;

/// Graded quiz: three answers per question, exactly one correct, each
/// justified from the document.
pub const GRADED_QUIZ_PROMPT: &str = r#"
Tu es un assistant pédagogique expert.
Génère un quiz à choix multiples à partir du document fourni (page par page).

Règles strictes pour chaque question :
- exactement 3 réponses proposées ;
- exactement UNE réponse correcte ("correct": true) et DEUX réponses incorrectes ("correct": false) ;
- chaque réponse possède une "explication" précise qui s'appuie sur le contenu du document
  (cite la notion, la définition ou la page concernée) ; les justifications génériques
  comme "c'est la bonne réponse" ou "cette réponse est fausse" sont interdites.

⚠️ Réponds uniquement en JSON valide avec cette structure :
{
  "questions": [
    {
      "question": "Texte de la question ?",
      "reponses": [
        { "texte": "Réponse A", "correct": true, "explication": "Pourquoi A est correcte, d'après le document." },
        { "texte": "Réponse B", "correct": false, "explication": "Pourquoi B est incorrecte, d'après le document." },
        { "texte": "Réponse C", "correct": false, "explication": "Pourquoi C est incorrecte, d'après le document." }
      ]
    }
  ]
}

Document (page par page) :
"#;

/// Instruction template for a task.
pub fn template(task: Task) -> &'static str {
    match task {
        Task::StudyMaterial => STUDY_MATERIAL_PROMPT,
        Task::Quiz => QUIZ_PROMPT,
        Task::GradedQuiz => GRADED_QUIZ_PROMPT,
    }
}

/// Embed the assembled document into the task's template.
///
/// The document is appended verbatim after the template.
pub fn build_prompt(task: Task, document: &str) -> String {
    let template = template(task);
    let mut prompt = String::with_capacity(template.len() + document.len() + 1);
    prompt.push_str(template);
    prompt.push_str(document);
    prompt.push('\n');
    prompt
}
