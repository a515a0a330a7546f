//! Task intent inference.

use flowforge_core::dataset::TaskIntent;
use flowforge_core::schema::SchemaSnapshot;

/// Intents used when the description matches no keyword.
pub const FALLBACK_INTENTS: [TaskIntent; 2] = [TaskIntent::Query, TaskIntent::Analytics];

/// Infer the intents a task description asks for.
///
/// An intent is included when one of its keywords appears as a word of the
/// description. A description that matches nothing but names a schema term is
/// treated as a lookup; anything else falls back to [`FALLBACK_INTENTS`].
/// Intents come back in canonical vocabulary order, without duplicates.
#[must_use]
pub fn infer_intents(task_description: &str, schema: &SchemaSnapshot) -> Vec<TaskIntent> {
    let words = words(task_description);

    let intents: Vec<TaskIntent> = TaskIntent::ALL
        .into_iter()
        .filter(|intent| {
            intent
                .keywords()
                .iter()
                .any(|keyword| words.iter().any(|word| word == keyword))
        })
        .collect();

    if !intents.is_empty() {
        return intents;
    }

    let terms = schema.terms();
    if words.iter().any(|word| terms.contains(word)) {
        tracing::debug!("No intent keyword matched; description names schema terms");
        return vec![TaskIntent::Query];
    }

    tracing::debug!("No intent keyword matched; using fallback intents");
    FALLBACK_INTENTS.to_vec()
}

/// Lowercased words of `text`, split on anything that is not alphanumeric or `_`.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}
