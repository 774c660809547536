#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod scope;
pub mod subject;

pub use scope::{AND_OPERATOR, Scope, ScopeFilter, merge_scopes};
pub use subject::{ANONYMOUS_SUBJECT_ID, Subject, SubjectBuilder};
