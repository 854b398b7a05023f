pub mod vcs_history;
