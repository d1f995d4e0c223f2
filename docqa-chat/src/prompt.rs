//! Prompt assembly for grounded answers.

use std::fmt::Write as _;

use docqa_rag::SearchResult;

use crate::history::ConversationTurn;

/// Instruction telling the model to attribute facts to documents.
pub const CITATION_INSTRUCTION: &str = "When answering, if information comes from a specific \
     document, please mention which document it comes from.";

/// Instruction telling the model to admit when the documents are silent.
pub const UNANSWERABLE_INSTRUCTION: &str = "If the question cannot be answered based on the \
     provided documents, please state that clearly.";

/// Builds the single prompt sent to the model for one question.
///
/// Layout: numbered context passages in ranking order, then prior turns
/// (oldest first), then the question and instructions.
#[derive(Debug, Clone)]
pub struct AnswerPrompt<'a> {
    question: &'a str,
    context: &'a [SearchResult],
    history: &'a [ConversationTurn],
    cite_documents: bool,
}

impl<'a> AnswerPrompt<'a> {
    pub fn new(question: &'a str) -> Self {
        Self { question, context: &[], history: &[], cite_documents: false }
    }

    /// Retrieved passages, best first.
    pub fn context(mut self, context: &'a [SearchResult]) -> Self {
        self.context = context;
        self
    }

    /// Prior turns to include, oldest first.
    pub fn history(mut self, history: &'a [ConversationTurn]) -> Self {
        self.history = history;
        self
    }

    /// Ask the model to name the source document of each fact.
    pub fn cite_documents(mut self, cite: bool) -> Self {
        self.cite_documents = cite;
        self
    }

    pub fn build(&self) -> String {
        let mut prompt = String::from("Context:\n");
        for (i, result) in self.context.iter().enumerate() {
            let _ = write!(
                prompt,
                "[{}] Source: {}\n{}\n\n",
                i + 1,
                result.chunk.document_id,
                result.chunk.text.trim_end()
            );
        }

        if !self.history.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for turn in self.history {
                let _ = write!(prompt, "User: {}\nAssistant: {}\n", turn.question, turn.answer);
            }
            prompt.push('\n');
        }

        prompt.push_str(
            "Based on the information provided in the documents above, \
             please answer this question thoroughly:\n\n",
        );
        let _ = write!(prompt, "Question: {}\n\n", self.question);
        if self.cite_documents {
            prompt.push_str(CITATION_INSTRUCTION);
            prompt.push('\n');
        }
        prompt.push_str(UNANSWERABLE_INSTRUCTION);
        prompt.push_str("\n\nAnswer:\n");
        prompt
    }
}
