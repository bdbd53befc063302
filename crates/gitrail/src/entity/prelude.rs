//! Common re-exports for convenient entity usage.

pub use super::agreement::{
    ActiveModel as AgreementActiveModel, Column as AgreementColumn, Entity as Agreement,
    Model as AgreementModel,
};
pub use super::agreement_status::AgreementStatus;
pub use super::branch::{
    ActiveModel as BranchActiveModel, Column as BranchColumn, Entity as Branch,
    Model as BranchModel,
};
pub use super::branch_commit::{
    ActiveModel as BranchCommitActiveModel, Column as BranchCommitColumn, Entity as BranchCommit,
    Model as BranchCommitModel,
};
pub use super::commit::{
    ActiveModel as CommitActiveModel, ChangedFile, Column as CommitColumn, Entity as Commit,
    Model as CommitModel,
};
pub use super::contributor::Contributor;
pub use super::job_lock::{
    ActiveModel as JobLockActiveModel, Column as JobLockColumn, Entity as JobLock,
    Model as JobLockModel,
};
pub use super::project::{
    ActiveModel as ProjectActiveModel, Column as ProjectColumn, Entity as Project,
    Model as ProjectModel,
};
pub use super::user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as User, Model as UserModel,
};
