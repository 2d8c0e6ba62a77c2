//! Prompt text built from recalled interactions.

use how_core::Interaction;

const MEMORY_HEADER: &str = "Here are commands this user has run before for similar questions. \
Consider these patterns when answering:";

/// A prompt block listing recalled interactions, or an empty string if there
/// are none.
pub fn format_memory_context(interactions: &[Interaction]) -> String {
    if interactions.is_empty() {
        return String::new();
    }

    let mut message = format!("{}\n", MEMORY_HEADER);
    for interaction in interactions {
        message.push_str(&format!("- Q: {} → {}", interaction.question, interaction.command));
        if interaction.is_repeat() {
            message.push_str(&format!(" (used {} times)", interaction.use_count));
        }
        message.push('\n');
    }
    message
}
