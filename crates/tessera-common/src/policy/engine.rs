//! Rule dispatcher that implements a Policy Decision Point (PDP).

use tracing::debug;

use crate::rule::PermissionRule;

use super::{
    evaluator::{RequestContext, RuleEvaluator, ScopeEvaluator, ValidEvaluator},
    value::{Outcome, PolicyValue},
};

/// The state of the policy engine.
///
/// Contains the registered rule evaluators, in the order they are consulted.
#[derive(Default)]
pub struct PolicyEngine {
    evaluators: Vec<Box<dyn RuleEvaluator>>,
}

/// A tracer used to collect debugging information from the policy engine
#[allow(unused)]
pub trait PolicyTracer {
    /// Reports the outcome of one evaluator
    fn report_outcome(&mut self, evaluator: &'static str, outcome: Outcome) {}

    /// Reports that no evaluator handled the rule, so it was denied
    fn report_unhandled(&mut self, rule: &PermissionRule) {}
}

/// A [PolicyTracer] that does nothing.
pub struct NoOpPolicyTracer;

impl PolicyTracer for NoOpPolicyTracer {}

impl PolicyEngine {
    /// An engine with the built-in `scope` and `valid` evaluators registered.
    pub fn standard() -> Self {
        let mut engine = Self::default();
        engine.add_evaluator(ScopeEvaluator);
        engine.add_evaluator(ValidEvaluator);
        engine
    }

    /// Adds a new evaluator to the engine, consulted after the existing ones.
    pub fn add_evaluator(&mut self, evaluator: impl RuleEvaluator + 'static) {
        self.evaluators.push(Box::new(evaluator));
    }

    /// Get the number of evaluators currently in the engine.
    pub fn get_evaluator_count(&self) -> usize {
        self.evaluators.len()
    }

    /// Decide whether `request` satisfies `rule`.
    ///
    /// The first evaluator that does not pass decides. When all of them pass, the rule is denied.
    pub fn eval(
        &self,
        rule: &PermissionRule,
        request: &RequestContext<'_>,
        tracer: &mut impl PolicyTracer,
    ) -> PolicyValue {
        for evaluator in &self.evaluators {
            let outcome = evaluator.evaluate(rule, request);
            tracer.report_outcome(evaluator.name(), outcome);

            if let Some(value) = outcome.value() {
                return value;
            }
        }

        debug!(%rule, "no evaluator handled rule");
        tracer.report_unhandled(rule);

        PolicyValue::Deny
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.evaluators.iter().map(|evaluator| evaluator.name()))
            .finish()
    }
}
