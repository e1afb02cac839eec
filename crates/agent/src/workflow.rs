use retaily_core::record::{QuestionRecord, RouterVerdict, WorkflowStep};
use retaily_core::store::TabularStore;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::{parse_structured, CompletionClient};
use crate::prompts::PromptSet;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Completion(#[from] crate::llm::CompletionError),
    #[error("prompt rendering failed: {0}")]
    Template(#[from] tera::Error),
}

/// Structured payload requested from the router completion.
#[derive(Debug, Deserialize)]
struct CanAnswerPayload {
    reasoning: String,
    can_answer: bool,
}

/// The answer workflow: a fixed graph of steps over one mutable
/// `QuestionRecord`. Entry is the router; execution ends when a step has no
/// outgoing edge. The single branch keeps unanswerable questions away from
/// the query writer.
pub struct AnswerWorkflow<C, S> {
    completions: C,
    store: S,
    prompts: PromptSet,
}

impl<C, S> AnswerWorkflow<C, S>
where
    C: CompletionClient,
    S: TabularStore,
{
    pub fn new(completions: C, store: S) -> Result<Self, WorkflowError> {
        Ok(Self { completions, store, prompts: PromptSet::new()? })
    }

    /// Run one invocation: a record containing only the question in, a
    /// record containing the answer out.
    pub async fn run(&self, question: &str) -> Result<QuestionRecord, WorkflowError> {
        let mut record = QuestionRecord::new(question);
        let mut next = Some(WorkflowStep::CheckIfCanAnswer);

        while let Some(step) = next {
            next = self.execute_step(step, &mut record).await?;
            info!(
                event_name = "workflow.step_completed",
                step = step.name(),
                "workflow step completed"
            );
        }

        Ok(record)
    }

    async fn execute_step(
        &self,
        step: WorkflowStep,
        record: &mut QuestionRecord,
    ) -> Result<Option<WorkflowStep>, WorkflowError> {
        match step {
            WorkflowStep::CheckIfCanAnswer => {
                let verdict = self.check_if_can_answer(&record.question).await?;
                record.plan = Some(verdict.plan().to_string());
                record.can_answer = Some(verdict.can_answer());
                Ok(Some(match verdict {
                    RouterVerdict::Answerable { .. } => WorkflowStep::WriteQuery,
                    RouterVerdict::Unanswerable { .. } => WorkflowStep::ExplainNoAnswer,
                }))
            }
            WorkflowStep::WriteQuery => {
                let plan = record.plan.clone().unwrap_or_default();
                let prompt = self.prompts.write_query(&record.question, &plan)?;
                let completion = self.completions.complete(&prompt).await?;
                record.sql_query = Some(completion.trim().to_string());
                Ok(Some(WorkflowStep::ExecuteQuery))
            }
            WorkflowStep::ExecuteQuery => {
                let query = record.sql_query.clone().unwrap_or_default();
                record.sql_result = Some(self.execute_query(&query).await);
                Ok(Some(WorkflowStep::WriteAnswer))
            }
            WorkflowStep::WriteAnswer => {
                let plan = record.plan.clone().unwrap_or_default();
                let sql_query = record.sql_query.clone().unwrap_or_default();
                let sql_result = record.sql_result.clone().unwrap_or_default();
                let prompt =
                    self.prompts.write_answer(&record.question, &plan, &sql_query, &sql_result)?;
                record.answer = Some(self.completions.complete(&prompt).await?);
                Ok(None)
            }
            WorkflowStep::ExplainNoAnswer => {
                let problem = record.plan.clone().unwrap_or_default();
                let prompt = self.prompts.cannot_answer(&record.question, &problem)?;
                record.answer = Some(self.completions.complete(&prompt).await?);
                Ok(None)
            }
        }
    }

    async fn check_if_can_answer(&self, question: &str) -> Result<RouterVerdict, WorkflowError> {
        let prompt = self.prompts.can_answer(question)?;
        let completion = self.completions.complete(&prompt).await?;
        let payload: CanAnswerPayload = parse_structured(&completion)?;

        Ok(if payload.can_answer {
            RouterVerdict::Answerable { plan: payload.reasoning }
        } else {
            RouterVerdict::Unanswerable { plan: payload.reasoning }
        })
    }

    /// Execute the generated query. Every store failure becomes result
    /// text - the downstream answer step explains it conversationally
    /// instead of the whole request crashing.
    async fn execute_query(&self, query: &str) -> String {
        match self.store.run_query(query).await {
            Ok(table) => table.to_markdown(),
            Err(error) => {
                warn!(
                    event_name = "workflow.query_failed",
                    error = %error,
                    "query execution failed; error text absorbed into the record"
                );
                error.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use retaily_core::record::QuestionRecord;
    use retaily_core::store::{ResultTable, StoreError, TabularStore};

    use super::{AnswerWorkflow, WorkflowError};
    use crate::llm::{CompletionClient, CompletionError, Prompt};

    /// Replays canned completions in order, recording every prompt it saw.
    struct ScriptedCompletions {
        responses: Mutex<VecDeque<String>>,
        seen_prompts: Mutex<Vec<Prompt>>,
    }

    impl ScriptedCompletions {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(
                    responses.iter().map(|response| response.to_string()).collect(),
                ),
                seen_prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<Prompt> {
            self.seen_prompts.lock().expect("prompt lock").clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletions {
        async fn complete(&self, prompt: &Prompt) -> Result<String, CompletionError> {
            self.seen_prompts.lock().expect("prompt lock").push(prompt.clone());
            self.responses
                .lock()
                .expect("response lock")
                .pop_front()
                .ok_or(CompletionError::MissingContent)
        }
    }

    /// Fixed store behavior, recording the queries it receives.
    struct StubStore {
        outcome: Result<ResultTable, StoreError>,
        seen_queries: Mutex<Vec<String>>,
    }

    impl StubStore {
        fn returning(table: ResultTable) -> Self {
            Self { outcome: Ok(table), seen_queries: Mutex::new(Vec::new()) }
        }

        fn failing(error: StoreError) -> Self {
            Self { outcome: Err(error), seen_queries: Mutex::new(Vec::new()) }
        }

        fn queries(&self) -> Vec<String> {
            self.seen_queries.lock().expect("query lock").clone()
        }
    }

    #[async_trait]
    impl TabularStore for StubStore {
        async fn run_query(&self, sql: &str) -> Result<ResultTable, StoreError> {
            self.seen_queries.lock().expect("query lock").push(sql.to_string());
            self.outcome.clone()
        }
    }

    fn average_table() -> ResultTable {
        ResultTable::new(vec!["avg_spent".to_string()], vec![vec!["443.75".to_string()]])
    }

    const ROUTER_YES: &str = r#"{"reasoning": "I can average the Total_Spent column in the retail table filtered by State = 'CA'", "can_answer": true}"#;
    const ROUTER_NO: &str = r#"{"reasoning": "The retail table doesn't contain churn information", "can_answer": false}"#;

    #[tokio::test]
    async fn unanswerable_question_takes_the_decline_branch() {
        let completions =
            ScriptedCompletions::new(&[ROUTER_NO, "I'm sorry, the dataset has no churn data."]);
        let store = StubStore::returning(average_table());
        let workflow = AnswerWorkflow::new(completions, store).expect("build workflow");

        let record = workflow
            .run("How many customers will churn next year?")
            .await
            .expect("workflow should complete");

        assert_eq!(record.can_answer, Some(false));
        assert_eq!(
            record.plan.as_deref(),
            Some("The retail table doesn't contain churn information")
        );
        assert!(record.sql_query.is_none());
        assert!(record.sql_result.is_none());
        assert_eq!(record.answer.as_deref(), Some("I'm sorry, the dataset has no churn data."));
        assert!(workflow.store.queries().is_empty(), "store must not be touched when declining");
    }

    #[tokio::test]
    async fn answerable_question_runs_the_query_pipeline_in_order() {
        let completions = ScriptedCompletions::new(&[
            ROUTER_YES,
            "SELECT AVG(Total_Spent) AS avg_spent FROM retail WHERE State = 'CA'",
            "Customers in California spent an average of $443.75.",
        ]);
        let store = StubStore::returning(average_table());
        let workflow = AnswerWorkflow::new(completions, store).expect("build workflow");

        let record = workflow
            .run("What is the average amount spent by customers in California?")
            .await
            .expect("workflow should complete");

        assert_eq!(record.can_answer, Some(true));
        assert_eq!(
            record.sql_query.as_deref(),
            Some("SELECT AVG(Total_Spent) AS avg_spent FROM retail WHERE State = 'CA'")
        );
        assert_eq!(record.sql_result.as_deref(), Some(average_table().to_markdown().as_str()));
        let answer = record.answer.as_deref().expect("answer should be set");
        assert!(answer.contains("average"));

        let queries = workflow.store.queries();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("State = 'CA'"));
        assert!(queries[0].contains("Total_Spent"));
    }

    #[tokio::test]
    async fn generated_query_is_trimmed_before_execution() {
        let completions = ScriptedCompletions::new(&[
            ROUTER_YES,
            "\nSELECT Name FROM retail LIMIT 1\n",
            "The first customer is Alice Nguyen.",
        ]);
        let store = StubStore::returning(ResultTable::new(
            vec!["Name".to_string()],
            vec![vec!["Alice Nguyen".to_string()]],
        ));
        let workflow = AnswerWorkflow::new(completions, store).expect("build workflow");

        let record = workflow.run("Who is a customer?").await.expect("workflow should complete");

        assert_eq!(record.sql_query.as_deref(), Some("SELECT Name FROM retail LIMIT 1"));
        assert_eq!(workflow.store.queries(), vec!["SELECT Name FROM retail LIMIT 1".to_string()]);
    }

    #[tokio::test]
    async fn query_failure_is_absorbed_into_result_text() {
        let completions = ScriptedCompletions::new(&[
            ROUTER_YES,
            "SELECT Churn FROM retail",
            "I could not run that query: the retail table has no Churn column.",
        ]);
        let store = StubStore::failing(StoreError::Query("no such column: Churn".to_string()));
        let workflow = AnswerWorkflow::new(completions, store).expect("build workflow");

        let record =
            workflow.run("How much churn was there?").await.expect("workflow must not fail");

        assert_eq!(
            record.sql_result.as_deref(),
            Some("query execution failed: no such column: Churn")
        );
        assert!(record.is_answered(), "the answer step must still run after a query failure");
    }

    #[tokio::test]
    async fn connection_failure_is_also_absorbed() {
        // The catch is deliberately total: failures unrelated to the query
        // text still become result text rather than workflow errors.
        let completions = ScriptedCompletions::new(&[
            ROUTER_YES,
            "SELECT Name FROM retail",
            "Something went wrong talking to the database.",
        ]);
        let store = StubStore::failing(StoreError::Connection("pool timed out".to_string()));
        let workflow = AnswerWorkflow::new(completions, store).expect("build workflow");

        let record = workflow.run("List customers").await.expect("workflow must not fail");

        assert_eq!(
            record.sql_result.as_deref(),
            Some("database connection failed: pool timed out")
        );
        assert!(record.is_answered());
    }

    #[tokio::test]
    async fn plan_is_unchanged_by_downstream_steps() {
        let completions = ScriptedCompletions::new(&[
            ROUTER_YES,
            "SELECT AVG(Total_Spent) AS avg_spent FROM retail WHERE State = 'CA'",
            "Customers in California spent an average of $443.75.",
        ]);
        let store = StubStore::returning(average_table());
        let workflow = AnswerWorkflow::new(completions, store).expect("build workflow");

        let record = workflow
            .run("What is the average amount spent by customers in California?")
            .await
            .expect("workflow should complete");

        assert_eq!(
            record.plan.as_deref(),
            Some("I can average the Total_Spent column in the retail table filtered by State = 'CA'")
        );
    }

    #[tokio::test]
    async fn later_prompts_reuse_the_routers_plan_verbatim() {
        let completions = ScriptedCompletions::new(&[
            ROUTER_YES,
            "SELECT AVG(Total_Spent) AS avg_spent FROM retail WHERE State = 'CA'",
            "Customers in California spent an average of $443.75.",
        ]);
        let store = StubStore::returning(average_table());
        let workflow = AnswerWorkflow::new(completions, store).expect("build workflow");

        workflow
            .run("What is the average amount spent by customers in California?")
            .await
            .expect("workflow should complete");

        let prompts = workflow.completions.prompts();
        assert_eq!(prompts.len(), 3, "router, query writer, answer writer");
        let plan = "I can average the Total_Spent column in the retail table filtered by State = 'CA'";
        assert!(prompts[1].system.contains(plan));
        assert!(prompts[2].system.contains(plan));
        assert!(prompts[2].system.contains("443.75"));
    }

    #[tokio::test]
    async fn malformed_router_completion_propagates() {
        let completions = ScriptedCompletions::new(&["I think so, yes."]);
        let store = StubStore::returning(average_table());
        let workflow = AnswerWorkflow::new(completions, store).expect("build workflow");

        let error = workflow
            .run("What is the average amount spent by customers in California?")
            .await
            .expect_err("prose verdict must fail the workflow");

        assert!(matches!(
            error,
            WorkflowError::Completion(CompletionError::Schema { .. })
        ));
    }

    #[tokio::test]
    async fn completion_transport_failure_propagates() {
        // An exhausted script stands in for a dead completion endpoint.
        let completions = ScriptedCompletions::new(&[ROUTER_YES]);
        let store = StubStore::returning(average_table());
        let workflow = AnswerWorkflow::new(completions, store).expect("build workflow");

        let error = workflow
            .run("What is the average amount spent by customers in California?")
            .await
            .expect_err("missing completion must fail the workflow");

        assert!(matches!(error, WorkflowError::Completion(_)));
    }

    #[tokio::test]
    async fn record_starts_from_the_raw_question() {
        let completions = ScriptedCompletions::new(&[ROUTER_NO, "Sorry, I cannot answer that."]);
        let store = StubStore::returning(ResultTable::default());
        let workflow = AnswerWorkflow::new(completions, store).expect("build workflow");

        let record = workflow.run("  any churn?  ").await.expect("workflow should complete");

        // The question is carried verbatim; only generated SQL is trimmed.
        assert_eq!(record.question, "  any churn?  ");
        assert_eq!(record, QuestionRecord {
            question: "  any churn?  ".to_string(),
            plan: Some("The retail table doesn't contain churn information".to_string()),
            can_answer: Some(false),
            sql_query: None,
            sql_result: None,
            answer: Some("Sorry, I cannot answer that.".to_string()),
        });
    }
}
