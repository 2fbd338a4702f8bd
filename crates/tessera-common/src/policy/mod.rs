//! Authorization decisions over permission rules and bearer tokens.

pub mod engine;
pub mod evaluator;
pub mod value;

pub use engine::{NoOpPolicyTracer, PolicyEngine, PolicyTracer};
pub use evaluator::{bearer_token, RequestContext, RuleEvaluator, ScopeEvaluator, ValidEvaluator};
pub use value::{Outcome, PolicyValue};
