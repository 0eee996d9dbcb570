use taskbridge_domain::{ItemCategory, RemoteItem};

pub(crate) fn task_title(item: &RemoteItem) -> String {
    let prefix = match item.category {
        ItemCategory::PrReview => "Review",
        ItemCategory::PrCreated => "PR",
        ItemCategory::IssueAssigned => "Issue",
        ItemCategory::IssueCreated => "My Issue",
    };
    let short_repo = item.repo.rsplit('/').next().unwrap_or(item.repo.as_str());
    format!("{prefix}: {} ({short_repo})", item.title)
}

pub(crate) fn task_notes(item: &RemoteItem) -> String {
    format!("{}\n\nRepo: {}\n#{}", item.url, item.repo, item.number)
}

pub(crate) fn task_tags(item: &RemoteItem) -> String {
    let mut tags = vec!["github"];
    tags.push(if item.category.is_pull_request() {
        "pr"
    } else {
        "issue"
    });
    if item.category == ItemCategory::PrReview {
        tags.push("review");
    }
    tags.join(",")
}

/// Escapes a value for use inside an AppleScript string literal.
pub(crate) fn applescript_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            _ => escaped.push(ch),
        }
    }
    escaped.push('"');
    escaped
}

pub(crate) fn create_script(project: &str, title: &str, notes: &str, tags: &str) -> String {
    format!(
        "tell application \"Things3\"\n\
         \tset newToDo to make new to do with properties {{name:{}, notes:{}, tag names:{}}}\n\
         \tmove newToDo to project {}\n\
         \tschedule newToDo for (current date)\n\
         \treturn id of newToDo\n\
         end tell",
        applescript_literal(title),
        applescript_literal(notes),
        applescript_literal(tags),
        applescript_literal(project),
    )
}

/// Builds a `things:///{command}` URL with percent-encoded query values.
pub(crate) fn things_url(command: &str, params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("things:///{command}?{query}")
}
