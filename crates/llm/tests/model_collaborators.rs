use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use llm::{Completion, CompletionModel, CompletionRequest, ModelCollaborators};
use pipeline::{
    CollaboratorError, ContentPlan, Draft, DraftSection, Fixer, GenerationRequest,
    GenerationUsage, IssueSeverity, PhaseName, PlannedSection, Planner, RequiredElement,
    ResearchBrief, ReviewIssue, Reviewer, SectionBrief, SectionHeadline, SectionWriter, TokenCost,
    TokenCount,
};

/// Answers with scripted texts and records every request.
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    fn replying(replies: Vec<Result<&str, CollaboratorError>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn last_request(&self) -> CompletionRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CollaboratorError> {
        self.requests.lock().unwrap().push(request.clone());
        let text = self.replies.lock().unwrap().pop_front().unwrap()?;
        Ok(Completion {
            text,
            usage: GenerationUsage {
                tokens: TokenCount::new(120),
                cost: TokenCost::new(0.01).unwrap(),
            },
        })
    }
}

fn plan() -> ContentPlan {
    ContentPlan {
        title: "Field Guide".into(),
        sections: vec![PlannedSection {
            headline: SectionHeadline::new("Abilities").unwrap(),
            goal: "Explain the core abilities".into(),
            research_queries: vec![],
            must_cover: vec![RequiredElement::new("Fuse").unwrap()],
        }],
        required_elements: vec![RequiredElement::new("Fuse").unwrap()],
    }
}

#[tokio::test]
async fn planner_parses_fenced_plan() {
    let model = ScriptedModel::replying(vec![Ok(
        "Here is the plan:\n```json\n{\"title\": \"Field Guide\", \"sections\": [{\"headline\": \"Abilities\"}]}\n```",
    )]);
    let collaborators = ModelCollaborators::new(model);

    let generated = collaborators
        .plan(
            &GenerationRequest::new("Tears of the Kingdom"),
            &ResearchBrief::default(),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(generated.value.sections.len(), 1);
    assert_eq!(generated.usage.tokens, TokenCount::new(120));
}

#[tokio::test]
async fn plan_feedback_reaches_the_prompt() {
    let model = Arc::new(ScriptedModel::replying(vec![Ok(r#"{"title": "T", "sections": []}"#)]));
    let collaborators = ModelCollaborators::new(model.clone());
    let feedback =
        [ReviewIssue::new(IssueSeverity::Major, "Fuse is never explained").in_section("Abilities")];

    collaborators
        .plan(&GenerationRequest::new("Topic"), &ResearchBrief::default(), &feedback)
        .await
        .unwrap();

    let request = model.last_request();
    assert_eq!(request.phase, PhaseName::Editor);
    assert!(request.prompt.contains("- [major] (Abilities) Fuse is never explained"));
}

#[tokio::test]
async fn section_prompt_carries_coverage_blocks() {
    let model = Arc::new(ScriptedModel::replying(vec![Ok(
        "## Abilities\n\nUse **Fuse** on a stick.",
    )]));
    let collaborators = ModelCollaborators::new(model.clone());
    let request = GenerationRequest::new("Tears of the Kingdom");
    let research = ResearchBrief::default();
    let plan = plan();
    let brief = SectionBrief {
        request: &request,
        research: &research,
        plan: &plan,
        section: &plan.sections[0],
        index: 1,
        cross_reference: "ALREADY COVERED IN PREVIOUS SECTIONS:\n- Section 1 \"Intro\": Hyrule",
        required_reminder: "REQUIRED ELEMENTS NOT YET COVERED:\n- Fuse",
    };

    let generated = collaborators.write_section(&brief).await.unwrap();

    assert_eq!(generated.value, "Use **Fuse** on a stick.");
    let prompt = model.last_request().prompt;
    assert!(prompt.contains("Write section 1 of 1: \"Abilities\""));
    assert!(prompt.contains("ALREADY COVERED IN PREVIOUS SECTIONS"));
    assert!(prompt.contains("REQUIRED ELEMENTS NOT YET COVERED:\n- Fuse"));
}

#[tokio::test]
async fn malformed_review_is_an_invalid_payload() {
    let model = ScriptedModel::replying(vec![Ok("Looks great to me!")]);
    let collaborators = ModelCollaborators::new(model);

    let err = collaborators
        .review(&Draft::default(), &plan())
        .await
        .unwrap_err();

    assert!(matches!(err, CollaboratorError::InvalidPayload { .. }));
}

#[tokio::test]
async fn model_errors_pass_through_unchanged() {
    let model = ScriptedModel::replying(vec![Err(CollaboratorError::transient("429"))]);
    let collaborators = ModelCollaborators::new(model);
    let draft = Draft {
        title: "Guide".into(),
        sections: vec![DraftSection {
            headline: "Abilities".into(),
            body: "Text".into(),
        }],
    };

    let err = collaborators.fix(&draft, &[]).await.unwrap_err();

    assert_eq!(err, CollaboratorError::transient("429"));
}
