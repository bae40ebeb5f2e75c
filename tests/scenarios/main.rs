//! Scenario-based tests for pipeline-runner

mod helpers;

mod failure_handling;
mod secret_redaction;
mod success_chain;
mod trigger_filtering;
mod variable_substitution;
