//! Access-checker composition.
//!
//! Checkers gate field values (field checkers) or whole objects of a type
//! (type checkers, used primarily for `Node`). A checker failure never fails
//! the operation: it degrades exactly the fields it guards.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use fnv::FnvHashMap;

use crate::{
    ast::Name,
    executor::FieldError,
    resolver::{Arguments, EngineObjectData, ResolverContext},
    rss::RequiredSelectionSet,
};

/// Which plane a checker is being executed on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CheckerKind {
    /// Gating one specific field value.
    Field,

    /// Gating every object of a type.
    Type,
}

/// What a checker decided.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum CheckerResult {
    Success,
    Error(CheckerError),
}

impl CheckerResult {
    /// Folds another checker's result into this one.
    ///
    /// Success is the identity; two errors combine into one that remembers
    /// both.
    pub fn combine(self, other: CheckerResult) -> CheckerResult {
        match (self, other) {
            (Self::Success, other) => other,
            (err, Self::Success) => err,
            (Self::Error(a), Self::Error(b)) => Self::Error(a.combine(b)),
        }
    }

    /// The error to fail the guarded field with, if this result is decisive
    /// for the provided context.
    pub fn error_for(&self, ctx: &CheckerResultContext<'_>) -> Option<FieldError> {
        match self {
            Self::Success => None,
            Self::Error(e) => e.error_for(ctx),
        }
    }
}

/// The execution the checker verdict is being applied to.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckerResultContext<'a> {
    /// The guarded field coordinate, when gating a field read.
    pub field: Option<(&'a str, &'a str)>,
}

type AppliesFn = dyn Fn(&CheckerResultContext<'_>) -> bool + Send + Sync;

/// A checker failure.
///
/// Knows whether it fails the guarded field for a given context and how to
/// combine with further failures of a checker chain. Combination keeps every
/// part; the first part decisive for a context supplies the surfaced error.
#[derive(Clone)]
pub struct CheckerError {
    parts: Vec<CheckerErrorPart>,
}

#[derive(Clone)]
struct CheckerErrorPart {
    error: FieldError,
    applies: Option<Arc<AppliesFn>>,
}

impl fmt::Debug for CheckerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckerError")
            .field("parts", &self.parts.len())
            .finish()
    }
}

impl CheckerError {
    /// A failure applying to every guarded execution.
    pub fn new(error: FieldError) -> Self {
        Self {
            parts: vec![CheckerErrorPart {
                error,
                applies: None,
            }],
        }
    }

    /// A failure applying only where `applies` says so.
    pub fn conditional(
        error: FieldError,
        applies: impl Fn(&CheckerResultContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            parts: vec![CheckerErrorPart {
                error,
                applies: Some(Arc::new(applies)),
            }],
        }
    }

    /// Indicates whether this failure fails the guarded field for `ctx`.
    pub fn is_error_for_resolver(&self, ctx: &CheckerResultContext<'_>) -> bool {
        self.parts
            .iter()
            .any(|p| p.applies.as_ref().map_or(true, |f| f(ctx)))
    }

    /// Combines with another failure, keeping both verdicts.
    pub fn combine(mut self, other: CheckerError) -> CheckerError {
        self.parts.extend(other.parts);
        self
    }

    /// The first error decisive for `ctx`, if any.
    pub fn error_for(&self, ctx: &CheckerResultContext<'_>) -> Option<FieldError> {
        self.parts
            .iter()
            .find(|p| p.applies.as_ref().map_or(true, |f| f(ctx)))
            .map(|p| p.error.clone())
    }
}

/// An access checker, with the selection sets it needs materialised before
/// it runs.
#[async_trait]
pub trait CheckerExecutor: Send + Sync {
    /// The selection sets this checker needs, keyed by the name its
    /// `execute` looks the materialised data up under.
    fn required_selection_sets(&self) -> &FnvHashMap<Name, Option<RequiredSelectionSet>>;

    /// Runs the check against the materialised data.
    async fn execute(
        &self,
        arguments: &Arguments,
        object_data_map: &FnvHashMap<Name, EngineObjectData>,
        ctx: &ResolverContext,
        kind: CheckerKind,
    ) -> CheckerResult;
}

#[cfg(test)]
mod tests {
    use crate::executor::FieldError;

    use super::{CheckerError, CheckerResult, CheckerResultContext};

    #[test]
    fn success_is_identity_under_combine() {
        let err = CheckerResult::Error(CheckerError::new(FieldError::new("denied")));

        let combined = CheckerResult::Success.combine(err.clone());
        assert!(matches!(combined, CheckerResult::Error(_)));

        let combined = err.combine(CheckerResult::Success);
        assert!(matches!(combined, CheckerResult::Error(_)));

        let combined = CheckerResult::Success.combine(CheckerResult::Success);
        assert!(matches!(combined, CheckerResult::Success));
    }

    #[test]
    fn first_decisive_part_supplies_the_error() {
        let ctx = CheckerResultContext {
            field: Some(("Query", "secret")),
        };

        let conditional = CheckerError::conditional(FieldError::new("only elsewhere"), |ctx| {
            ctx.field.is_some_and(|(_, f)| f == "other")
        });
        let always = CheckerError::new(FieldError::new("no access"));

        let combined = conditional.combine(always);
        assert!(combined.is_error_for_resolver(&ctx));
        assert_eq!(combined.error_for(&ctx).unwrap().message(), "no access");
    }

    #[test]
    fn non_applying_error_is_not_decisive() {
        let ctx = CheckerResultContext { field: None };
        let conditional =
            CheckerError::conditional(FieldError::new("field only"), |ctx| ctx.field.is_some());

        assert!(!conditional.is_error_for_resolver(&ctx));
        assert_eq!(conditional.error_for(&ctx), None);
    }
}
