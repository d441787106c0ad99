//! Prompt construction for the generative tools.
//!
//! Each generative invocation becomes a [`PromptPlan`]: a system message, the
//! request payload the model must see in full, optional static analysis of
//! the submitted code, and the text reference sections are ranked against.

use crate::args::{
    AnalyzeRpgArgs, ConvertRpgArgs, CreateArtifactArgs, ExplainCodeArgs, ExplanationLevel,
    GenerateCodeArgs, ReviewCodeArgs, ReviewLevel, ToolInvocation,
};
use rpgforge_context::analyzer::{analyze_quality, analyze_rpg};

const BASE_SYSTEM: &str = "You are an expert IBM i developer specialising in DB2 for i SQL and ILE RPG. \
Follow the company standards quoted in the reference material whenever they apply. \
If the references contradict general practice, the references win.";

#[derive(Debug, Clone)]
pub struct PromptPlan {
    pub system: String,
    /// The user's request, rank 0 in the budget.
    pub payload: String,
    /// Findings from the pattern analyzers, rank 1.
    pub analysis: Option<String>,
    /// Text used to rank reference sections.
    pub query: String,
    /// Whether reference sections are offered at all.
    pub with_references: bool,
}

fn system(task: &str) -> String {
    format!("{BASE_SYSTEM}\n\n{task}")
}

fn fenced(code: &str) -> String {
    format!("```\n{}\n```", code.trim_end())
}

fn generate(a: &GenerateCodeArgs) -> PromptPlan {
    let comments = if a.include_comments {
        "Include detailed comments explaining each step."
    } else {
        "Keep comments to a minimum."
    };
    PromptPlan {
        system: system(
            "Generate production-ready code. Answer with the code in a single fenced block followed by a short note on assumptions.",
        ),
        payload: format!(
            "Generate {} code.\nStyle guide: {}\n{comments}\n\nRequirements:\n{}",
            a.code_type.as_str().to_uppercase(),
            a.style_guide,
            a.requirements.trim()
        ),
        analysis: None,
        query: format!("{} {}", a.code_type.as_str(), a.requirements),
        with_references: true,
    }
}

fn review(a: &ReviewCodeArgs) -> PromptPlan {
    let depth = match a.review_level {
        ReviewLevel::Basic => "List only defects that would break the program or violate a standard.",
        ReviewLevel::Detailed => "List defects, standard violations and maintainability concerns, each with a fix.",
        ReviewLevel::Comprehensive => {
            "Review defects, standards, performance, error handling, security and naming. Give a fix for each finding and a rewritten version where useful."
        }
    };
    let report = analyze_quality(&a.code, a.code_type.as_str());
    PromptPlan {
        system: system("Review code against the standards and best practices provided."),
        payload: format!(
            "Review this {} code. {depth}\n\n{}",
            a.code_type.as_str().to_uppercase(),
            fenced(&a.code)
        ),
        analysis: Some(report.to_prompt_notes()),
        query: format!("{} {}", a.code_type.as_str(), a.code),
        with_references: true,
    }
}

fn explain(a: &ExplainCodeArgs) -> PromptPlan {
    let audience = match a.explanation_level {
        ExplanationLevel::Beginner => "a developer new to IBM i; define every term",
        ExplanationLevel::Intermediate => "a developer familiar with IBM i basics",
        ExplanationLevel::Advanced => "a senior IBM i developer; focus on subtleties and performance",
    };
    let citing = if a.include_references {
        "Cite the reference documents you relied on by filename."
    } else {
        "Do not cite sources."
    };
    PromptPlan {
        system: system("Explain code clearly and accurately."),
        payload: format!("Explain this code for {audience}. {citing}\n\n{}", fenced(&a.code)),
        analysis: None,
        query: a.code.clone(),
        with_references: a.include_references,
    }
}

fn create_artifact(a: &CreateArtifactArgs) -> PromptPlan {
    let docs = if a.include_documentation {
        "Start with a documentation header describing purpose, parameters and usage."
    } else {
        "Do not add a documentation header."
    };
    let kind = a.artifact_type.label();
    PromptPlan {
        system: system(
            "Produce a complete, compilable source artifact. Answer with the artifact only, no surrounding commentary.",
        ),
        payload: format!("Create a {kind}. {docs}\n\nSpecifications:\n{}", a.specifications.trim()),
        analysis: None,
        query: format!("{kind} {}", a.specifications),
        with_references: true,
    }
}

fn convert(a: &ConvertRpgArgs) -> PromptPlan {
    let comments = if a.preserve_comments {
        "Carry every comment over, rewritten as // comments."
    } else {
        "Comments may be dropped."
    };
    let profile = analyze_rpg(&a.code);
    PromptPlan {
        system: system(
            "Convert RPG to fully free-form (**FREE) ILE RPG. Replace legacy opcodes with their modern equivalents and keep the program's behaviour identical.",
        ),
        payload: format!(
            "Convert this RPG source to **FREE form. {comments}\n\n{}",
            fenced(&a.code)
        ),
        analysis: Some(profile.to_prompt_notes()),
        query: format!("free-form conversion {}", profile.opcodes.iter().cloned().collect::<Vec<_>>().join(" ")),
        with_references: true,
    }
}

fn analyze(a: &AnalyzeRpgArgs) -> PromptPlan {
    let focus = a
        .focus
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| format!(" Concentrate on: {f}."))
        .unwrap_or_default();
    let profile = analyze_rpg(&a.code);
    PromptPlan {
        system: system("Analyze RPG source structure and identify modernization opportunities."),
        payload: format!(
            "Analyze the syntax and structure of this RPG source.{focus}\n\n{}",
            fenced(&a.code)
        ),
        analysis: Some(profile.to_prompt_notes()),
        query: format!("{} {}", a.focus.as_deref().unwrap_or_default(), a.code),
        with_references: true,
    }
}

impl PromptPlan {
    /// The plan for a generative invocation; `None` for local tools.
    pub fn for_invocation(invocation: &ToolInvocation) -> Option<Self> {
        match invocation {
            ToolInvocation::GenerateCode(a) => Some(generate(a)),
            ToolInvocation::ReviewCode(a) => Some(review(a)),
            ToolInvocation::ExplainCode(a) => Some(explain(a)),
            ToolInvocation::CreateArtifact(a) => Some(create_artifact(a)),
            ToolInvocation::ConvertRpgToFreeform(a) => Some(convert(a)),
            ToolInvocation::AnalyzeRpgSyntax(a) => Some(analyze(a)),
            _ => None,
        }
    }
}
