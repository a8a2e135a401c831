//! Three-stage chain-of-thought generation for free-form requests.
//!
//! Requests that no template covers go through three sequential model
//! calls: a design analysis of the part, a concrete modeling plan, and
//! finally code synthesis. Each stage receives the verbatim output of
//! the stages before it. An empty stage aborts the chain immediately;
//! there is no point synthesizing code from a blank plan.

use std::fmt;

use anyhow::Result;
use cadgen_llm::{CompletionRequest, TextCompletion, normalize_completion};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analysis,
    Plan,
    Synthesis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analysis => "analysis",
            Stage::Plan => "plan",
            Stage::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain stage '{0}' returned empty output")]
    EmptyStage(Stage),
}

#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub analysis: String,
    pub plan: String,
    pub code: String,
}

pub struct Chain<'a> {
    client: &'a dyn TextCompletion,
    model: &'a str,
}

impl<'a> Chain<'a> {
    pub fn new(client: &'a dyn TextCompletion, model: &'a str) -> Self {
        Chain { client, model }
    }

    /// Run all three stages. `observer` is called as each stage starts,
    /// so callers can surface progress.
    pub fn run(&self, description: &str, mut observer: impl FnMut(Stage)) -> Result<ChainOutput> {
        observer(Stage::Analysis);
        let analysis = self.stage(Stage::Analysis, &analysis_prompt(description))?;

        observer(Stage::Plan);
        let plan = self.stage(Stage::Plan, &plan_prompt(description, &analysis))?;

        observer(Stage::Synthesis);
        let raw = self.stage(Stage::Synthesis, &synthesis_prompt(description, &analysis, &plan))?;
        let code = normalize_completion(&raw)
            .map_err(|_| ChainError::EmptyStage(Stage::Synthesis))?;

        Ok(ChainOutput {
            analysis,
            plan,
            code,
        })
    }

    fn stage(&self, stage: Stage, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            prompt: prompt.to_string(),
            request_id: format!("cot-{stage}"),
        };
        let output = self.client.complete(&request, self.model)?;
        if output.trim().is_empty() {
            return Err(ChainError::EmptyStage(stage).into());
        }
        Ok(output.trim().to_string())
    }
}

fn analysis_prompt(description: &str) -> String {
    format!(
        "You are a mechanical design engineer. Analyze this part request.\n\
Identify the part family, its functional requirements, critical dimensions\n\
with units, and any manufacturing constraints implied by the wording.\n\
Answer in short plain-text bullet points.\n\
Request: {description}"
    )
}

fn plan_prompt(description: &str, analysis: &str) -> String {
    format!(
        "You are a CAD programmer. Turn this design analysis into a concrete\n\
modeling plan: an ordered list of CadQuery operations (sketch, extrude,\n\
revolve, shell, pattern, fillet) with explicit numeric values for every\n\
dimension. Plain text only, no code yet.\n\
Request: {description}\n\
Design analysis:\n{analysis}"
    )
}

fn synthesis_prompt(description: &str, analysis: &str, plan: &str) -> String {
    format!(
        "Write a complete CadQuery Python script that implements this modeling\n\
plan. Return ONLY Python source, no markdown, no prose. Assign the final\n\
solid to a variable named `result` and end the script with:\n\
cq.exporters.export(result, \"output/model.stl\")\n\
cq.exporters.export(result, \"output/model.step\")\n\
Request: {description}\n\
Design analysis:\n{analysis}\n\
Modeling plan:\n{plan}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
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

    #[test]
    fn stages_run_in_order_and_feed_forward() {
        let client = ScriptedClient::new(&[
            "- bracket, steel, M6 holes",
            "1. sketch base plate 60x40",
            "```python\nresult = plate()\n```",
        ]);
        let chain = Chain::new(&client, "test-model");

        let mut seen = Vec::new();
        let output = chain
            .run("an L bracket with two M6 holes", |s| seen.push(s))
            .unwrap();

        assert_eq!(seen, vec![Stage::Analysis, Stage::Plan, Stage::Synthesis]);
        assert_eq!(output.analysis, "- bracket, steel, M6 holes");
        assert_eq!(output.code, "result = plate()");

        let prompts = client.prompts.borrow();
        // The plan stage sees the verbatim analysis, the synthesis
        // stage sees both predecessors.
        assert!(prompts[1].contains("- bracket, steel, M6 holes"));
        assert!(prompts[2].contains("- bracket, steel, M6 holes"));
        assert!(prompts[2].contains("1. sketch base plate 60x40"));
    }

    #[test]
    fn empty_analysis_aborts_before_the_plan_stage() {
        let client = ScriptedClient::new(&["   \n", "unreachable", "unreachable"]);
        let chain = Chain::new(&client, "test-model");

        let err = chain.run("a bracket", |_| {}).unwrap_err();
        assert_eq!(
            err.to_string(),
            ChainError::EmptyStage(Stage::Analysis).to_string()
        );
        assert_eq!(client.prompts.borrow().len(), 1);
    }

    #[test]
    fn fenced_but_empty_synthesis_is_an_empty_stage() {
        let client = ScriptedClient::new(&["analysis", "plan", "```python\n```"]);
        let chain = Chain::new(&client, "test-model");

        let err = chain.run("a bracket", |_| {}).unwrap_err();
        assert!(err.to_string().contains("'synthesis'"));
    }
}
