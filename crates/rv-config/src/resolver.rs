// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rule and provider lookup.

use rv_error::{ErrorCode, RvError};
use std::sync::Arc;

use crate::{Provider, ResolvedConfig, Rule, Service};

/// Read-only lookups over a shared [`ResolvedConfig`].
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    config: Arc<ResolvedConfig>,
}

impl ConfigResolver {
    /// Wrap a shared configuration.
    pub fn new(config: Arc<ResolvedConfig>) -> Self {
        Self { config }
    }

    /// The underlying configuration.
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The active rule serving `scenario`, or, without a scenario, the
    /// first active rule. `None` when nothing matches.
    pub fn resolve_rule(&self, scenario: Option<&str>) -> Option<&Rule> {
        let mut active = self.config.rules.iter().filter(|r| r.active);
        match scenario {
            Some(s) => active.find(|r| r.scenario == s),
            None => active.next(),
        }
    }

    /// Like [`resolve_rule`](Self::resolve_rule) but falls back to any
    /// active rule when the scenario has none.
    pub fn resolve_rule_or_any(&self, scenario: &str) -> Option<&Rule> {
        self.resolve_rule(Some(scenario))
            .or_else(|| self.resolve_rule(None))
    }

    /// First active rule whose `request_model` equals `request_model`.
    pub fn resolve_rule_by_model(&self, request_model: &str) -> Option<&Rule> {
        self.config
            .rules
            .iter()
            .find(|r| r.active && r.request_model == request_model)
    }

    /// Provider by uuid.
    pub fn resolve_provider(&self, uuid: &str) -> Option<&Provider> {
        self.config.providers.iter().find(|p| p.uuid == uuid)
    }

    /// First active service of `rule` whose provider is known, with that
    /// provider.
    pub fn resolve_backend<'a>(&'a self, rule: &'a Rule) -> Result<(&'a Provider, &'a Service), RvError> {
        if !rule.active {
            return Err(RvError::new(
                ErrorCode::ConfigRuleUnresolved,
                format!("rule '{}' is inactive", rule.label()),
            )
            .with_context("rule", &rule.uuid));
        }
        let mut active = 0usize;
        for service in rule.active_services() {
            active += 1;
            if let Some(provider) = self.resolve_provider(&service.provider) {
                return Ok((provider, service));
            }
        }
        let message = if active == 0 {
            "no active service".to_string()
        } else {
            format!("none of {active} active service(s) reference a known provider")
        };
        Err(RvError::new(ErrorCode::ConfigProviderUnresolved, message).with_context("rule", &rule.uuid))
    }

    /// Active rules that have a usable backend, in document order.
    pub fn usable_rules(&self) -> Vec<&Rule> {
        self.config
            .rules
            .iter()
            .filter(|r| self.resolve_backend(r).is_ok())
            .collect()
    }

    /// Active rules routing to the provider with `uuid`.
    pub fn rules_for_provider(&self, uuid: &str) -> Vec<&Rule> {
        self.config
            .rules
            .iter()
            .filter(|r| r.active && r.active_services().any(|s| s.provider == uuid))
            .collect()
    }

    /// Distinct scenarios of active rules, in first-seen order.
    pub fn scenarios(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for r in self.config.rules.iter().filter(|r| r.active) {
            if !r.scenario.is_empty() && !out.contains(&r.scenario.as_str()) {
                out.push(&r.scenario);
            }
        }
        out
    }
}
