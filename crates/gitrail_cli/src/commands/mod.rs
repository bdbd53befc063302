pub(crate) mod discover;
pub(crate) mod enrich;
pub(crate) mod ingest;
pub(crate) mod limits;
pub(crate) mod migrate;
pub(crate) mod poll;
pub(crate) mod run;
pub(crate) mod shared;
