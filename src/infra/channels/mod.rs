pub mod github_mirror;
pub mod json_store;

pub use github_mirror::GithubMirror;
pub use json_store::JsonChannelStore;
