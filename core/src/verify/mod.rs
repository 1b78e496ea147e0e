//! Verification Services (spec §2/§4.8): lint and type-check adapters, plus
//! the missing-import scanner and the plain-language error translator.

pub mod adapters;
pub mod translate;

pub use adapters::{LintAdapter, MockLintAdapter, MockTypeCheckAdapter, NpmLintAdapter, TscTypeCheckAdapter, TypeCheckAdapter, VerifyError};
pub use translate::translate_errors;
