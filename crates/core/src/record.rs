use serde::{Deserialize, Serialize};

/// Per-invocation state threaded through the answer workflow.
///
/// Created with only `question` set; each step fills in its own fields and
/// never touches fields owned by earlier steps. The record lives for one
/// invocation and is dropped once `answer` has been read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question: String,
    pub plan: Option<String>,
    pub can_answer: Option<bool>,
    pub sql_query: Option<String>,
    pub sql_result: Option<String>,
    pub answer: Option<String>,
}

impl QuestionRecord {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            plan: None,
            can_answer: None,
            sql_query: None,
            sql_result: None,
            answer: None,
        }
    }

    /// True once a terminal step has produced the user-facing answer.
    pub fn is_answered(&self) -> bool {
        self.answer.as_ref().map(|answer| !answer.is_empty()).unwrap_or(false)
    }
}

/// Outcome of the router step deciding whether the dataset can answer the
/// question. The plan text doubles as the problem statement on the decline
/// branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouterVerdict {
    Answerable { plan: String },
    Unanswerable { plan: String },
}

impl RouterVerdict {
    pub fn plan(&self) -> &str {
        match self {
            Self::Answerable { plan } | Self::Unanswerable { plan } => plan,
        }
    }

    pub fn can_answer(&self) -> bool {
        matches!(self, Self::Answerable { .. })
    }
}

/// Nodes of the answer workflow graph. `CheckIfCanAnswer` is the entry;
/// `WriteAnswer` and `ExplainNoAnswer` are the terminals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStep {
    CheckIfCanAnswer,
    WriteQuery,
    ExecuteQuery,
    WriteAnswer,
    ExplainNoAnswer,
}

impl WorkflowStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckIfCanAnswer => "check_if_can_answer",
            Self::WriteQuery => "write_query",
            Self::ExecuteQuery => "execute_query",
            Self::WriteAnswer => "write_answer",
            Self::ExplainNoAnswer => "explain_no_answer",
        }
    }
}
