use crate::models::Chunk;

pub const JUSTIFICATION_HEADER: &str = "Based on these document chunks:";
const BULLET: &str = "\n- ";

/// The text handed to the synthesizer for one question, plus the
/// justification echoing exactly that text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
    pub context: String,
    pub justification: String,
    pub positions: Vec<usize>,
    pub truncated: bool,
}

/// Concatenates `selected` (best first) with newlines, stopping before the
/// chunk that would push the total past `max_words`. A first chunk that is
/// alone over budget is cut to `max_words` words.
pub fn assemble_context(selected: &[&Chunk], max_words: usize) -> AssembledContext {
    let mut parts: Vec<String> = Vec::with_capacity(selected.len());
    let mut positions = Vec::with_capacity(selected.len());
    let mut used = 0usize;
    let mut truncated = false;

    for chunk in selected {
        if used + chunk.word_count <= max_words {
            used += chunk.word_count;
            parts.push(chunk.text.clone());
            positions.push(chunk.index);
            continue;
        }

        truncated = true;
        if parts.is_empty() && max_words > 0 {
            parts.push(chunk.words().take(max_words).collect::<Vec<_>>().join(" "));
            positions.push(chunk.index);
        }
        break;
    }

    AssembledContext {
        context: parts.join("\n"),
        justification: justification(&parts),
        positions,
        truncated,
    }
}

pub fn justification<S: AsRef<str>>(chunks: &[S]) -> String {
    let mut rendered = JUSTIFICATION_HEADER.to_string();
    for chunk in chunks {
        rendered.push_str(BULLET);
        rendered.push_str(chunk.as_ref());
    }
    rendered
}
