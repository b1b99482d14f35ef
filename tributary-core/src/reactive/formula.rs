//! Formula Definitions
//!
//! A Formula is a named, memoized pure computation over zero or more
//! upstream ids. The engine resolves the upstream values, in the order they
//! were declared, and hands them to the computation as a slice.
//!
//! # Kinds
//!
//! - **Extractor**: reads a fixed path out of the root state. Its only
//!   upstream is `state`.
//! - **Transformer**: an arbitrary pure function of other formulas.
//!
//! Computations must be pure: the evaluator may call them again at any time
//! with the same inputs and relies on getting the same output.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::graph::{FormulaId, Upstreams};
use crate::value::{get_in, PathSegment, Value};

/// Shared computation function. Receives upstream values positionally.
pub type ComputeFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Which constructor produced a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaKind {
    /// Structural path lookup into the root state.
    Extractor(Vec<PathSegment>),
    /// Arbitrary function of its upstreams.
    Transformer,
}

/// A registered derivation.
#[derive(Clone)]
pub struct Formula {
    kind: FormulaKind,
    upstreams: Upstreams,
    compute: ComputeFn,
}

impl Formula {
    /// A formula reading `path` out of the root state.
    pub fn extractor<I>(path: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PathSegment>,
    {
        let path: Vec<PathSegment> = path.into_iter().map(Into::into).collect();
        let lookup = path.clone();
        Self {
            kind: FormulaKind::Extractor(path),
            upstreams: Upstreams::from_elem(FormulaId::root(), 1),
            compute: Arc::new(move |args: &[Value]| {
                Ok(args.first().map(|state| get_in(state, &lookup)).unwrap_or_default())
            }),
        }
    }

    /// A formula computed from `upstreams` by an infallible function.
    pub fn transformer<I, F>(upstreams: I, compute: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FormulaId>,
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self::try_transformer(upstreams, move |args: &[Value]| Ok(compute(args)))
    }

    /// A formula computed from `upstreams` by a function that may fail.
    ///
    /// The error reaches whoever triggered the computation (a `read`, a
    /// `reset`, or the dispatch that replaced the state).
    pub fn try_transformer<I, F>(upstreams: I, compute: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FormulaId>,
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            kind: FormulaKind::Transformer,
            upstreams: upstreams.into_iter().map(Into::into).collect(),
            compute: Arc::new(compute),
        }
    }

    pub fn kind(&self) -> &FormulaKind {
        &self.kind
    }

    pub fn upstreams(&self) -> &Upstreams {
        &self.upstreams
    }

    /// Run the computation over already-resolved upstream values.
    pub fn compute(&self, args: &[Value]) -> Result<Value> {
        (self.compute)(args)
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formula")
            .field("kind", &self.kind)
            .field("upstreams", &self.upstreams)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use serde_json::json;

    #[test]
    fn extractor_reads_from_root() {
        let formula = Formula::extractor(["user", "name"]);
        assert_eq!(formula.upstreams().as_slice(), &[FormulaId::root()]);

        let state = json!({"user": {"name": "ada"}});
        assert_eq!(formula.compute(&[state]).unwrap(), json!("ada"));
    }

    #[test]
    fn transformer_receives_positional_args() {
        let formula = Formula::transformer(["a", "b"], |args| {
            json!(args[0].as_i64().unwrap_or(0) - args[1].as_i64().unwrap_or(0))
        });
        assert_eq!(formula.kind(), &FormulaKind::Transformer);
        assert_eq!(formula.compute(&[json!(10), json!(3)]).unwrap(), json!(7));
    }

    #[test]
    fn try_transformer_surfaces_errors() {
        let formula = Formula::try_transformer(["a"], |_| Err(EngineError::failed("nope")));
        assert_eq!(formula.compute(&[json!(1)]), Err(EngineError::failed("nope")));
    }
}
