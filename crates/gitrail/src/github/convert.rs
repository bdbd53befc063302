//! Conversion from GitHub wire types to platform types.

use crate::platform::{
    CommitAuthor, CommitDetail, DiffStats, FileChange, FullCommit, RemoteBranch, ShallowCommit,
};

use super::types::{GitHubBranch, GitHubCommit, GitHubFile};

pub fn to_remote_branch(branch: GitHubBranch) -> RemoteBranch {
    RemoteBranch {
        name: branch.name,
        head_sha: branch.commit.map(|c| c.sha),
    }
}

pub fn to_shallow_commit(commit: GitHubCommit) -> ShallowCommit {
    ShallowCommit {
        sha: commit.sha.unwrap_or_default(),
        author_login: commit.author.and_then(|a| a.login),
        commit: commit.commit.map(|detail| CommitDetail {
            message: detail.message.unwrap_or_default(),
            author: detail.author.map(|a| CommitAuthor {
                name: a.name,
                email: a.email,
                date: a.date,
            }),
        }),
    }
}

fn to_file_change(file: GitHubFile) -> FileChange {
    FileChange {
        filename: file.filename,
        status: file.status.unwrap_or_else(|| "modified".to_string()),
        additions: file.additions,
        deletions: file.deletions,
        patch: file.patch,
    }
}

pub fn to_full_commit(mut commit: GitHubCommit) -> FullCommit {
    let stats = commit.stats.take().map(|s| DiffStats {
        additions: s.additions,
        deletions: s.deletions,
    });
    let files = commit
        .files
        .take()
        .unwrap_or_default()
        .into_iter()
        .map(to_file_change)
        .collect();

    FullCommit {
        summary: to_shallow_commit(commit),
        stats,
        files,
    }
}
