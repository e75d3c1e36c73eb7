//! Prompt assembly: the pure transformation from (policy, retrieved context,
//! history) to the message sequence sent to the model.

use laudo_core::{ConversationTurn, ScoredChunk};
use laudo_llm::{AssembledPrompt, Content};

/// Separator between retrieved chunk texts inside the context block.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

const CONTEXT_HEADER: &str = "## CONTEXTO DA BASE DE CONHECIMENTO PARA ESTA PERGUNTA ##\n\
    Use o contexto a seguir quando for relevante para a pergunta do Perito. \
    Seja explícito quando o contexto não contiver a informação necessária.";

const EMPTY_CONTEXT_NOTE: &str =
    "(nenhum contexto da base de conhecimento disponível para esta pergunta)";

/// Deterministic, side-effect-free prompt builder.
///
/// Only the retrieved context is subject to the character budget; the
/// conversation history is never truncated, reordered or dropped.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    context_budget: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self {
            context_budget: 8000,
        }
    }
}

impl PromptAssembler {
    pub fn new(context_budget: usize) -> Self {
        Self { context_budget }
    }

    pub fn assemble(
        &self,
        policy_text: &str,
        retrieved: &[ScoredChunk],
        history: &[ConversationTurn],
    ) -> AssembledPrompt {
        let context = self.context_block(retrieved);

        let mut system_instruction =
            String::with_capacity(policy_text.len() + context.len() + 256);
        system_instruction.push_str(policy_text);
        system_instruction.push_str("\n\n");
        system_instruction.push_str(CONTEXT_HEADER);
        system_instruction.push_str("\n\n");
        if context.is_empty() {
            system_instruction.push_str(EMPTY_CONTEXT_NOTE);
        } else {
            system_instruction.push_str(&context);
        }

        let contents = history
            .iter()
            .map(|turn| Content {
                role: turn.role,
                parts: turn.parts.clone(),
            })
            .collect();

        AssembledPrompt {
            system_instruction,
            contents,
        }
    }

    /// Join chunk texts most-relevant-first, keeping exactly the longest
    /// prefix of the ranking that fits the budget. Chunks are dropped whole,
    /// never cut mid-text, so the model never sees a truncated sentence.
    fn context_block(&self, retrieved: &[ScoredChunk]) -> String {
        let separator_len = CONTEXT_SEPARATOR.chars().count();
        let mut block = String::new();
        let mut used = 0usize;

        for scored in retrieved {
            let chunk_len = scored.chunk.text.chars().count();
            let needed = if block.is_empty() {
                chunk_len
            } else {
                separator_len + chunk_len
            };
            if used + needed > self.context_budget {
                break;
            }
            if !block.is_empty() {
                block.push_str(CONTEXT_SEPARATOR);
            }
            block.push_str(&scored.chunk.text);
            used += needed;
        }
        block
    }
}
