//! Plain-terminal rendering of view state.

use crate::preview::PreviewState;
use crate::registry::{QueryResponse, ThemeResponse, UploadResult, UploadStatus};
use crate::workspace::{
    AnswerView, DocumentEntry, LocalAvailability, Notice, NoticeLevel, SelectionState,
};
use console::style;
use std::fmt::Write as _;

/// Longest text preview printed inline.
const MAX_TEXT_PREVIEW: usize = 4_000;

pub fn notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => format!("{}", style(&notice.message).dim()),
        NoticeLevel::Success => format!("{} {}", style("ok").green(), notice.message),
        NoticeLevel::Error => format!("{} {}", style("error").red().bold(), notice.message),
    }
}

pub fn documents(entries: &[DocumentEntry], selection: &SelectionState) -> String {
    if entries.is_empty() {
        return "No documents uploaded.".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let record = &entry.record;
        let mark = if selection.is_selected(&record.doc_id) { "[x]" } else { "[ ]" };
        let local = match entry.local {
            LocalAvailability::InMemory => "memory",
            LocalAvailability::Cached => "cached",
            LocalAvailability::Missing => "-",
        };
        let _ = write!(
            out,
            "{mark} {:<14} {:<32} {:<5} {} {}",
            record.doc_id,
            record.filename,
            record.doc_type,
            record.upload_date.format("%Y-%m-%d %H:%M"),
            local,
        );
        if let Some(author) = &record.author {
            let _ = write!(out, " by {author}");
        }
        if entry.provisional {
            let _ = write!(out, " {}", style("(pending)").dim());
        }
        out.push('\n');
    }
    out
}

pub fn upload_results(results: &[UploadResult]) -> String {
    let mut out = String::new();
    for r in results {
        let status = match r.status {
            UploadStatus::Indexed => style("indexed").green(),
            UploadStatus::Error => style("error").red(),
            UploadStatus::Skipped => style("skipped").yellow(),
        };
        let _ = write!(out, "{} {}", status, r.filename);
        if let Some(id) = &r.doc_id {
            let _ = write!(out, " -> {id}");
        }
        if let Some(detail) = &r.detail {
            let _ = write!(out, " ({detail})");
        }
        out.push('\n');
    }
    out
}

pub fn answers(response: &QueryResponse) -> String {
    if response.individual_answers.is_empty() {
        return "No answers found.".to_string();
    }
    let mut out = String::new();
    for doc in &response.individual_answers {
        let _ = writeln!(out, "{}", style(&doc.doc_id).bold());
        for answer in &doc.answers {
            let _ = writeln!(out, "  {}", answer.text);
            let _ = writeln!(out, "    {}", style(&answer.citation).dim());
        }
    }
    out
}

pub fn themes(response: &ThemeResponse) -> String {
    if response.themes.is_empty() {
        return "No themes identified.".to_string();
    }
    let mut out = String::new();
    for theme in &response.themes {
        let _ = writeln!(out, "{}", style(&theme.theme_name).bold());
        let _ = writeln!(out, "  {}", theme.summary);
        for citation in &theme.citations {
            let _ = writeln!(out, "    - {citation}");
        }
    }
    out
}

pub fn answer_view<T>(view: &AnswerView<T>, ready: impl Fn(&T) -> String) -> String {
    match view {
        AnswerView::Idle => String::new(),
        AnswerView::Loading => "Processing...".to_string(),
        AnswerView::Ready(output) => ready(output),
        AnswerView::Failed(message) => format!("{} {message}", style("error").red().bold()),
    }
}

pub fn preview(state: &PreviewState) -> String {
    match state {
        PreviewState::Closed => "Preview closed.".to_string(),
        PreviewState::Opening { doc_id, kind } => format!("Opening {doc_id} as {kind}..."),
        PreviewState::Failed {
            doc_id, message, ..
        } => format!("{} preview of {doc_id}: {message}", style("error").red().bold()),
        PreviewState::Ready(session) => {
            let mut out = format!(
                "{} [{}] {}\n",
                style(&session.filename).bold(),
                session.kind,
                session.uri()
            );
            if let Some(text) = session.text() {
                let shown: String = text.chars().take(MAX_TEXT_PREVIEW).collect();
                out.push_str(&shown);
                if shown.len() < text.len() {
                    out.push_str("\n...");
                }
                out.push('\n');
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AnswerSnippet, DocumentAnswer, DocumentRecord, ThemeItem};
    use chrono::{TimeZone, Utc};

    #[test]
    fn document_rows_mark_selection_and_locality() {
        let entries = vec![DocumentEntry {
            record: DocumentRecord {
                doc_id: "doc_ab12cd34".into(),
                filename: "a.pdf".into(),
                doc_type: "pdf".into(),
                author: Some("Ada".into()),
                doc_date: None,
                upload_date: Utc.with_ymd_and_hms(2025, 5, 30, 9, 5, 0).unwrap(),
            },
            provisional: false,
            local: LocalAvailability::Cached,
        }];
        let selection = SelectionState::default()
            .reduce(crate::workspace::SelectionAction::Toggle("doc_ab12cd34".into()));

        let out = documents(&entries, &selection);

        assert!(out.starts_with("[x] doc_ab12cd34"));
        assert!(out.contains("2025-05-30 09:05"));
        assert!(out.contains("cached"));
        assert!(out.contains("by Ada"));
    }

    #[test]
    fn document_rows_have_no_trailing_padding() {
        let entries = vec![DocumentEntry {
            record: DocumentRecord {
                doc_id: "d1".into(),
                filename: "a.txt".into(),
                doc_type: "txt".into(),
                author: None,
                doc_date: None,
                upload_date: Utc.with_ymd_and_hms(2025, 5, 30, 9, 5, 0).unwrap(),
            },
            provisional: false,
            local: LocalAvailability::Missing,
        }];

        let out = documents(&entries, &SelectionState::default());

        assert!(out.lines().all(|line| line == line.trim_end()), "{out:?}");
        assert!(out.trim_end().ends_with(" -"));
    }

    #[test]
    fn empty_states_have_messages() {
        assert_eq!(documents(&[], &SelectionState::default()), "No documents uploaded.");
        assert_eq!(answers(&QueryResponse::default()), "No answers found.");
        assert_eq!(themes(&ThemeResponse::default()), "No themes identified.");
    }

    #[test]
    fn answers_list_citations_under_each_document() {
        let out = answers(&QueryResponse {
            individual_answers: vec![DocumentAnswer {
                doc_id: "d1".into(),
                answers: vec![AnswerSnippet {
                    text: "Late filings".into(),
                    citation: "DocID: d1, Page: 4, Para: 2".into(),
                }],
            }],
        });
        assert!(out.contains("Late filings"));
        assert!(out.contains("DocID: d1, Page: 4, Para: 2"));
    }

    #[test]
    fn themes_list_citations() {
        let out = themes(&ThemeResponse {
            themes: vec![ThemeItem {
                theme_name: "Theme 1 - Delays".into(),
                summary: "Shipments slipped.".into(),
                citations: vec!["d1, Page 2".into()],
            }],
        });
        assert!(out.contains("Shipments slipped."));
        assert!(out.contains("- d1, Page 2"));
    }
}
