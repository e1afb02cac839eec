use crate::commands::CommandResult;
use retaily_agent::{AnswerWorkflow, HttpCompletionClient};
use retaily_core::config::{AppConfig, LoadOptions};
use retaily_db::{connect_with_settings, RetailStore};

/// Shown when the question is blank, mirroring the web surface.
const EMPTY_QUESTION_MESSAGE: &str = "Please enter a question.";

pub fn run(question: &str) -> CommandResult {
    if question.trim().is_empty() {
        return CommandResult { exit_code: 0, output: EMPTY_QUESTION_MESSAGE.to_string() };
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let completions = match HttpCompletionClient::from_config(&config.llm) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "completion_client",
                format!("completion client issue: {error}"),
                3,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let store = RetailStore::new(pool);
        let workflow = AnswerWorkflow::new(completions, store)
            .map_err(|error| ("workflow_init", error.to_string(), 5u8))?;

        let record = workflow
            .run(question)
            .await
            .map_err(|error| ("workflow", error.to_string(), 5u8))?;

        Ok::<String, (&'static str, String, u8)>(
            record.answer.unwrap_or_else(|| "No answer was produced.".to_string()),
        )
    });

    match result {
        Ok(answer) => CommandResult { exit_code: 0, output: answer },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{run, EMPTY_QUESTION_MESSAGE};

    #[test]
    fn blank_question_returns_the_static_prompt_message() {
        let result = run("   ");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, EMPTY_QUESTION_MESSAGE);
    }
}
