use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::embedder::Embedder;
use crate::llm::{construct_prompt, render_context, LLM};
use crate::retriever::Retriever;

pub const NO_CONTEXT_ANSWER: &str = "[Error: No relevant context found in the knowledge base]";

/// One completed question/answer cycle.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub context: String,
}

/// Append-only record of the turns in this session.
#[derive(Debug, Default)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn push(&mut self, turn: ChatTurn) -> &ChatTurn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    /// Newest turn first.
    pub fn recent_first(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter().rev()
    }

    pub fn render(&self, show_context: bool) -> String {
        self.recent_first()
            .map(|turn| render_turn(turn, show_context))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn render_turn(turn: &ChatTurn, show_context: bool) -> String {
    let mut out = format!("Q: {}\nA:\n{}\n", turn.question, turn.answer);
    if show_context && !turn.context.is_empty() {
        out.push_str("--- Context ---\n");
        out.push_str(&turn.context);
        out.push('\n');
    }
    out
}

/// Runs one retrieval + generation cycle and appends the result. Failures
/// become the turn's answer; blank questions are ignored and return `None`.
pub async fn ask<'h, E: Embedder>(
    history: &'h mut ChatHistory,
    retriever: &Retriever<'_, E>,
    llm: &LLM,
    question: &str,
    top_k: usize,
) -> Option<&'h ChatTurn> {
    let question = question.trim();
    if question.is_empty() {
        return None;
    }

    let id = Uuid::new_v4();
    let span = info_span!("turn", %id);
    let (answer, context) = answer_question(retriever, llm, question, top_k)
        .instrument(span)
        .await;

    Some(history.push(ChatTurn {
        id,
        question: question.to_string(),
        answer,
        context,
    }))
}

async fn answer_question<E: Embedder>(
    retriever: &Retriever<'_, E>,
    llm: &LLM,
    question: &str,
    top_k: usize,
) -> (String, String) {
    let ranked = match retriever.retrieve(question, top_k) {
        Ok(ranked) => ranked,
        Err(e) => {
            warn!(error = %e, "retrieval failed");
            return (format!("[Error: {e}]"), String::new());
        }
    };
    if ranked.is_empty() {
        warn!("no chunks retrieved, skipping generation");
        return (NO_CONTEXT_ANSWER.to_string(), String::new());
    }

    info!(
        retrieved = ranked.len(),
        top_score = ranked[0].score,
        "context assembled"
    );
    let context = render_context(&ranked);
    let prompt = construct_prompt(question, &context);
    let answer = match llm.generate_response(&prompt).await {
        Ok(answer) => answer,
        Err(e) => e.to_string(),
    };
    (answer, context)
}
