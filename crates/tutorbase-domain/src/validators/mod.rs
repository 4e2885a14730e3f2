//! One pure validator per record kind, built on [`crate::validation::RecordCheck`].
//!
//! Errors reject the record; warnings annotate statistically unusual but
//! syntactically valid data and never block persistence.

pub mod feedback;
pub mod session;
pub mod tutor;
