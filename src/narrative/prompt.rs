//! Prompt construction for the narrative provider

use super::TopicContext;
use crate::models::HistoryType;
use std::fmt::Write;

fn update_note(update: HistoryType) -> &'static str {
    match update {
        HistoryType::MajorUpdate => {
            "The story has moved on substantially. Lead with the newest development."
        }
        HistoryType::SourceExpansion => {
            "New outlets are now covering the story. Reflect the wider range of perspectives."
        }
        HistoryType::ConfidenceShift => {
            "The reliability of the reporting has changed. Reassess how certain the facts are."
        }
        _ => "Refresh the narrative so it matches the current coverage.",
    }
}

/// Render the prompt for a first title or a regeneration
pub fn build_prompt(context: &TopicContext) -> String {
    let mut prompt = String::new();

    match context.update {
        None => prompt.push_str(
            "Write a plain, specific news headline and synopsis for the story covered by the articles below.\n\n",
        ),
        Some(update) => {
            prompt.push_str("You are updating an ongoing news story that has changed since it was last summarized.\n");
            let _ = writeln!(prompt, "{}\n", update_note(update));
        }
    }

    let _ = writeln!(prompt, "Category: {}", context.category.to_uppercase());
    let _ = writeln!(prompt, "Number of articles: {}", context.article_count);
    if !context.sources.is_empty() {
        let _ = writeln!(prompt, "Sources: {}", context.sources.join(", "));
    }
    if let Some(update) = context.update {
        let _ = writeln!(prompt, "Update type: {}", update);
    }

    prompt.push_str("\nArticles:\n");
    let digests: Vec<String> = context
        .articles
        .iter()
        .map(|a| {
            format!(
                "Title: {}\nSource: {}\nDate: {}\nSummary: {}\n",
                a.title,
                a.source,
                a.published_at.format("%Y-%m-%d"),
                a.description.as_deref().unwrap_or("No description available")
            )
        })
        .collect();
    prompt.push_str(&digests.join("\n---\n"));

    prompt.push_str(
        "\nRespond with a single JSON object and nothing else:\n\
         - title: headline of at most 10 words naming who did what\n\
         - summary: 2-3 sentences on what happened and why it matters\n\
         - key_insights: 3-5 short concrete takeaways\n\
         - confidence_score: integer 0-100 for how well-sourced the facts are\n",
    );
    if context.update.is_some() {
        prompt.push_str("- development_note: one sentence on what changed since the last update\n");
    }

    prompt
}
