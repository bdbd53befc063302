//! Branch discovery: record the branches a repository has.

use crate::entity::project;
use crate::platform::{RepoRef, RepositoryClient};
use crate::queue::JobError;
use crate::repository::branches;

use super::context::SyncContext;
use super::types::DiscoverReport;

/// Longest accepted branch name, in bytes.
const MAX_BRANCH_NAME_LEN: usize = 255;

/// Whether `name` is a branch name git would accept.
pub fn is_valid_branch_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_BRANCH_NAME_LEN
        && name != "@"
        && !name.starts_with(['-', '/', '.'])
        && !name.ends_with(['/', '.'])
        && !name.ends_with(".lock")
        && !name.contains("..")
        && !name.contains("//")
        && !name.contains("@{")
        && !name.contains("/.")
        && !name
            .chars()
            .any(|c| c.is_control() || c == ' ' || "~^:?*[\\".contains(c))
}

/// Move `default` to the front of `names`, keeping the others in order.
pub(crate) fn default_first(names: &mut Vec<String>, default: Option<&str>) {
    if let Some(default) = default
        && let Some(position) = names.iter().position(|name| name == default)
    {
        let name = names.remove(position);
        names.insert(0, name);
    }
}

/// List the repository's branches and insert the unknown ones.
///
/// The default branch is created first and the rest in the order the code
/// host lists them, so the poller's oldest-first cap favours the default
/// branch. An unavailable code host yields an empty report.
pub async fn discover_branches(
    ctx: &SyncContext,
    client: &dyn RepositoryClient,
    project: &project::Model,
) -> Result<DiscoverReport, JobError> {
    let Some(repo) = project.repository().and_then(|r| r.parse::<RepoRef>().ok()) else {
        tracing::warn!(project_id = %project.id, "Project has no valid repository");
        return Ok(DiscoverReport::default());
    };

    let listed = match client.list_branches(&repo).await {
        Ok(listed) => listed,
        Err(e) => {
            tracing::warn!(project_id = %project.id, %repo, error = %e, "Repository unavailable, skipping discovery");
            return Ok(DiscoverReport::default());
        }
    };

    let mut report = DiscoverReport {
        listed: listed.len(),
        ..Default::default()
    };

    let mut names = Vec::with_capacity(listed.len());
    for remote in listed {
        if is_valid_branch_name(&remote.name) {
            names.push(remote.name);
        } else {
            report.invalid += 1;
            tracing::warn!(project_id = %project.id, branch = %remote.name, "Skipping invalid branch name");
        }
    }

    let default = match client.default_branch(&repo).await {
        Ok(default) => default,
        Err(e) => {
            tracing::warn!(project_id = %project.id, %repo, error = %e, "Default branch unknown, keeping listing order");
            None
        }
    };
    default_first(&mut names, default.as_deref());

    report.created =
        branches::insert_missing(&ctx.db, project.id, &names, &ctx.config.ingest.retry).await?;

    tracing::info!(
        project_id = %project.id,
        %repo,
        listed = report.listed,
        created = report.created,
        "Discovered branches"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_branch_names() {
        for name in ["main", "feature/login-page", "release-1.2", "user/bob_fix", "v2.0.x"] {
            assert!(is_valid_branch_name(name), "{name} should be valid");
        }
    }

    #[test]
    fn default_branch_moves_to_front() {
        let mut names: Vec<String> = ["alpha", "develop", "trunk"].map(String::from).to_vec();
        default_first(&mut names, Some("trunk"));
        assert_eq!(names, ["trunk", "alpha", "develop"]);

        default_first(&mut names, Some("missing"));
        default_first(&mut names, None);
        assert_eq!(names, ["trunk", "alpha", "develop"]);
    }

    #[test]
    fn rejects_names_git_refuses() {
        let long = "a".repeat(MAX_BRANCH_NAME_LEN + 1);
        for name in [
            "",
            "-rf",
            "a..b",
            "a b",
            "topic.lock",
            "trailing/",
            "/leading",
            "a//b",
            "a@{1}",
            "what?",
            "tab\tname",
            "x/.hidden",
            "@",
            long.as_str(),
        ] {
            assert!(!is_valid_branch_name(name), "{name:?} should be invalid");
        }
    }
}
