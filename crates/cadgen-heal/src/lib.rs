//! LLM-backed repair of failed CAD scripts.
//!
//! Each attempt sends the broken script and the most recent failure to
//! the model and asks for a complete replacement file. Older failures
//! are not accumulated; a stale diagnostic tends to steer the model
//! toward re-fixing problems that no longer exist.

use anyhow::{Result, anyhow};
use cadgen_exec::ErrorCategory;
use cadgen_llm::{CompletionRequest, TextCompletion, normalize_completion};

/// The failure a repair attempt is asked to address.
#[derive(Debug, Clone)]
pub struct Failure {
    pub category: ErrorCategory,
    pub message: String,
}

pub struct Repairer<'a> {
    client: &'a dyn TextCompletion,
    model: &'a str,
}

impl<'a> Repairer<'a> {
    pub fn new(client: &'a dyn TextCompletion, model: &'a str) -> Self {
        Repairer { client, model }
    }

    /// Ask the model for a repaired script. Returns the full
    /// replacement source with any code fence stripped.
    pub fn repair(&self, code: &str, failure: &Failure, attempt: u32) -> Result<String> {
        let request = CompletionRequest {
            prompt: build_repair_prompt(code, failure),
            request_id: format!("repair-{attempt}"),
        };
        let raw = self.client.complete(&request, self.model)?;
        let repaired = normalize_completion(&raw)
            .map_err(|err| anyhow!("repair attempt {attempt} produced no code: {err}"))?;
        Ok(repaired)
    }
}

pub fn build_repair_prompt(code: &str, failure: &Failure) -> String {
    format!(
        "Repair this CadQuery Python script so it runs successfully.\n\
Return ONLY complete Python source for the full file, no markdown, no prose.\n\
Preserve the modeled geometry and parameter values as much as possible.\n\
The script must end by exporting `result` to output/model.stl and output/model.step.\n\
Failure class: {}\n\
Error:\n{}\n\
SOURCE START\n{}\n\
SOURCE END",
        failure.category, failure.message, code
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadgen_llm::CompletionError;
    use std::cell::RefCell;

    struct ScriptedClient {
        replies: RefCell<Vec<String>>,
        prompts: RefCell<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: &[&str]) -> Self {
            ScriptedClient {
                replies: RefCell::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl TextCompletion for ScriptedClient {
        fn complete(&self, req: &CompletionRequest, _model: &str) -> Result<String> {
            self.prompts.borrow_mut().push(req.prompt.clone());
            self.replies
                .borrow_mut()
                .pop()
                .ok_or_else(|| anyhow!("no scripted reply left"))
        }
    }

    fn parameter_failure() -> Failure {
        Failure {
            category: ErrorCategory::Parameter,
            message: "NameError: name 'lenght' is not defined".to_string(),
        }
    }

    #[test]
    fn repair_strips_the_code_fence() {
        let client = ScriptedClient::new(&["```python\nresult = box(10)\n```"]);
        let repairer = Repairer::new(&client, "test-model");
        let repaired = repairer
            .repair("result = box(lenght)", &parameter_failure(), 1)
            .unwrap();
        assert_eq!(repaired, "result = box(10)");
    }

    #[test]
    fn prompt_carries_script_and_latest_error_only() {
        let client = ScriptedClient::new(&["result = box(10)"]);
        let repairer = Repairer::new(&client, "test-model");
        repairer
            .repair("result = box(lenght)", &parameter_failure(), 1)
            .unwrap();

        let prompts = client.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("SOURCE START\nresult = box(lenght)\nSOURCE END"));
        assert!(prompts[0].contains("NameError: name 'lenght'"));
        assert!(prompts[0].contains("Failure class: parameter"));
    }

    #[test]
    fn empty_model_output_is_an_error() {
        let client = ScriptedClient::new(&["```python\n```"]);
        let repairer = Repairer::new(&client, "test-model");
        let err = repairer
            .repair("result = box()", &parameter_failure(), 2)
            .unwrap_err();
        assert!(err.to_string().contains("repair attempt 2"));
        assert!(
            err.to_string()
                .contains(&CompletionError::EmptyFenced.to_string())
        );
    }

    #[test]
    fn snapshot_repair_prompt() {
        let prompt = build_repair_prompt(
            "result = box()",
            &Failure {
                category: ErrorCategory::Geometry,
                message: "BRep_API: command not done".to_string(),
            },
        );
        insta::assert_snapshot!(prompt, @r#"
        Repair this CadQuery Python script so it runs successfully.
        Return ONLY complete Python source for the full file, no markdown, no prose.
        Preserve the modeled geometry and parameter values as much as possible.
        The script must end by exporting `result` to output/model.stl and output/model.step.
        Failure class: geometry
        Error:
        BRep_API: command not done
        SOURCE START
        result = box()
        SOURCE END
        "#);
    }
}
