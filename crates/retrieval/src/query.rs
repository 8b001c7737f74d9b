//! Query rewriting
//!
//! Generic intent phrases ("summarize this document") describe the task,
//! not the content, and embed poorly as similarity queries. Rewriting maps
//! the known intent families to queries that target what the matching
//! passages actually say.

/// Ordered rewrite table; the first matching rule wins.
const REWRITE_RULES: &[(&[&str], &str)] = &[
    (
        &["summarize", "summary", "what is this document about"],
        "main topic content objective document",
    ),
    (&["conclus"], "conclusion final result summary"),
    (
        &["introduc", "beginning", "start"],
        "introduction premise initial context",
    ),
];

/// Rewrite a user message into a more retrievable search query.
///
/// Matching is case-insensitive on the trimmed message. Specific queries
/// pass through unchanged.
pub fn rewrite_query(message: &str) -> String {
    let lower = message.trim().to_lowercase();

    for (keywords, rewritten) in REWRITE_RULES {
        if keywords.iter().any(|keyword| lower.contains(keyword)) {
            return (*rewritten).to_string();
        }
    }

    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_intent() {
        assert_eq!(
            rewrite_query("Can you summarize this document?"),
            "main topic content objective document"
        );
        assert_eq!(
            rewrite_query("give me a SUMMARY"),
            "main topic content objective document"
        );
        assert_eq!(
            rewrite_query("What is this document about?"),
            "main topic content objective document"
        );
    }

    #[test]
    fn test_conclusion_intent() {
        assert_eq!(
            rewrite_query("what are the conclusions?"),
            "conclusion final result summary"
        );
    }

    #[test]
    fn test_introduction_intent() {
        assert_eq!(
            rewrite_query("How does the introduction frame the problem?"),
            "introduction premise initial context"
        );
        assert_eq!(
            rewrite_query("what's at the beginning?"),
            "introduction premise initial context"
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // Mentions both a summary and a conclusion; the summary family
        // is listed first
        assert_eq!(
            rewrite_query("summarize the conclusion"),
            "main topic content objective document"
        );
    }

    #[test]
    fn test_specific_queries_pass_through() {
        let query = "Which vendors are named in section 4?";
        assert_eq!(rewrite_query(query), query);
    }

    #[test]
    fn test_rewriting_is_pure() {
        let a = rewrite_query("  Summarize this  ");
        let b = rewrite_query("summarize this");
        assert_eq!(a, b);
    }
}
