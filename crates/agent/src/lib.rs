//! Answer workflow - LLM-driven question answering over the retail dataset
//!
//! This crate is the "brain" of the retaily system - the workflow that:
//! - Decides whether a question is answerable from the dataset schema
//! - Generates a SQL query for answerable questions
//! - Executes the query through the tabular store
//! - Renders a conversational answer (or a polite decline)
//!
//! # Architecture
//!
//! The workflow is a fixed directed graph with one branch point:
//! 1. **Router** (`check_if_can_answer`) - structured answerability verdict
//! 2. **Query writer** (`write_query`) - NL plan → bare SQL string
//! 3. **Executor** (`execute_query`) - SQL → rendered rows, errors become data
//! 4. **Answer writer** (`write_answer` / `explain_no_answer`) - final text
//!
//! # Key Types
//!
//! - `AnswerWorkflow` - Main orchestrator (see `workflow` module)
//! - `CompletionClient` - Pluggable trait for OpenAI/Anthropic/Ollama
//! - `PromptSet` - Embedded prompt templates plus the dataset description
//!
//! # Safety Principle
//!
//! The model never sees a question the router has already judged
//! unanswerable; a knowingly-unanswerable question would otherwise yield a
//! plausible-looking but meaningless query.

pub mod llm;
pub mod prompts;
pub mod workflow;

pub use llm::{CompletionClient, CompletionError, HttpCompletionClient, Prompt};
pub use prompts::PromptSet;
pub use workflow::{AnswerWorkflow, WorkflowError};
