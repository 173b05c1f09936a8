//! Draft validation phase.
//!
//! Runs before every review. Findings are reported as review issues so they
//! flow through the same repair loop as the reviewer's own.

use std::collections::HashSet;

use pipeline::{
    required_elements_missing_from, ContentPlan, Draft, IssueSeverity, RequiredElement,
    ReviewIssue,
};

/// Every element the plan requires: the document-level list followed by each
/// section's `must_cover`, without case-insensitive duplicates.
pub fn plan_required_elements(plan: &ContentPlan) -> Vec<RequiredElement> {
    let mut seen = HashSet::new();
    plan.required_elements
        .iter()
        .chain(plan.sections.iter().flat_map(|s| s.must_cover.iter()))
        .filter(|element| seen.insert(element.normalized()))
        .cloned()
        .collect()
}

/// Checks `draft` against `plan`: empty sections and required elements absent
/// from the whole document are `Major` issues.
pub fn validate_draft(draft: &Draft, plan: &ContentPlan) -> Vec<ReviewIssue> {
    let mut issues: Vec<ReviewIssue> = draft
        .sections
        .iter()
        .filter(|section| section.body.trim().is_empty())
        .map(|section| {
            ReviewIssue::new(IssueSeverity::Major, "Section has no content")
                .in_section(section.headline.clone())
        })
        .collect();

    let markdown = draft.to_markdown();
    issues.extend(
        required_elements_missing_from(&markdown, &plan_required_elements(plan))
            .into_iter()
            .map(|element| {
                ReviewIssue::new(
                    IssueSeverity::Major,
                    format!("Required element '{element}' is not covered anywhere in the draft"),
                )
            }),
    );
    issues
}

#[cfg(test)]
mod tests {
    use pipeline::{DraftSection, PlannedSection, SectionHeadline};

    use super::*;

    fn element(label: &str) -> RequiredElement {
        RequiredElement::new(label).expect("non-blank")
    }

    fn plan() -> ContentPlan {
        ContentPlan {
            title: "Guide".into(),
            sections: vec![PlannedSection {
                headline: SectionHeadline::new("Abilities").expect("non-blank"),
                goal: String::new(),
                research_queries: vec![],
                must_cover: vec![element("fuse"), element("Recall")],
            }],
            required_elements: vec![element("Ultrahand"), element("Fuse")],
        }
    }

    #[test]
    fn required_elements_are_merged_case_insensitively() {
        let labels: Vec<String> = plan_required_elements(&plan())
            .iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(labels, vec!["Ultrahand", "Fuse", "Recall"]);
    }

    #[test]
    fn missing_elements_and_empty_sections_are_major_issues() {
        let draft = Draft {
            title: "Guide".into(),
            sections: vec![
                DraftSection {
                    headline: "Abilities".into(),
                    body: "Use **Ultrahand** and fuse things.".into(),
                },
                DraftSection {
                    headline: "Shrines".into(),
                    body: "  ".into(),
                },
            ],
        };
        let issues = validate_draft(&draft, &plan());
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == IssueSeverity::Major));
        assert_eq!(issues[0].section.as_deref(), Some("Shrines"));
        assert!(issues[1].description.contains("'Recall'"));
    }
}
