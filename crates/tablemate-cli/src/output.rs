//! Rendering command outcomes as text or JSON

use crate::commands::Outcome;
use crate::{CliError, Result};
use std::fmt::Write;
use tablemate_social::RequestView;

/// Render `outcome` for the terminal.
pub fn render(outcome: &Outcome, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(outcome)
            .map_err(|e| CliError::Serialization(format!("Failed to format JSON: {}", e)));
    }
    Ok(render_text(outcome))
}

fn render_text(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Friends { friends } if friends.is_empty() => "no friends yet".to_string(),
        Outcome::Friends { friends } => friends.join("\n"),
        Outcome::Requests { requests } if requests.is_empty() => "no requests".to_string(),
        Outcome::Requests { requests } => requests
            .iter()
            .map(request_line)
            .collect::<Vec<_>>()
            .join("\n"),
        Outcome::RequestSent { to, id } => format!("request {} sent to {}", id, to),
        Outcome::RequestWithdrawn { to } => format!("request to {} withdrawn", to),
        Outcome::RequestAccepted { from } => format!("you and {} are now friends", from),
        Outcome::RequestRejected { from } => format!("request from {} rejected", from),
        Outcome::Unfriended { handle } => format!("you and {} are no longer friends", handle),
        Outcome::Forgotten { handle, summary } => format!(
            "forgot {}: {} requests and {} friendships removed",
            handle, summary.requests_removed, summary.edges_removed
        ),
    }
}

fn request_line(request: &RequestView) -> String {
    let mut line = String::new();
    let _ = write!(
        line,
        "{:<9} {} -> {}  ({})",
        request.status.as_str(),
        request.from,
        request.to,
        request.created_at.format("%Y-%m-%d %H:%M")
    );
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablemate_social::{PurgeSummary, RequestId, RequestStatus};

    fn view(from: &str, to: &str) -> RequestView {
        RequestView {
            id: RequestId::new(),
            from: from.to_string(),
            to: to.to_string(),
            status: RequestStatus::Pending,
            created_at: "2024-03-01T12:30:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_text_lists_requests() {
        let outcome = Outcome::Requests {
            requests: vec![view("alice", "bob"), view("carol", "bob")],
        };
        let text = render(&outcome, false).unwrap();

        assert_eq!(
            text,
            "pending   alice -> bob  (2024-03-01 12:30)\npending   carol -> bob  (2024-03-01 12:30)"
        );
    }

    #[test]
    fn test_text_for_empty_lists() {
        let friends = Outcome::Friends { friends: vec![] };
        assert_eq!(render(&friends, false).unwrap(), "no friends yet");
    }

    #[test]
    fn test_json_is_tagged() {
        let outcome = Outcome::Forgotten {
            handle: "alice".to_string(),
            summary: PurgeSummary {
                requests_removed: 2,
                edges_removed: 1,
            },
        };
        let value: serde_json::Value =
            serde_json::from_str(&render(&outcome, true).unwrap()).unwrap();

        assert_eq!(value["outcome"], "forgotten");
        assert_eq!(value["summary"]["edges_removed"], 1);
    }
}
