//! Testing utilities for the Vanity workspace
//!
//! Shared fixtures, request builders and header helpers.

#![allow(missing_docs)]

use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, Method, Request};
use vanity_core::{ExperimentHandle, Playground, PlaygroundConfig};
use vanity_experiment::{ExperimentDefinition, MetricDefinition};

pub const PIE_OR_CAKE: &str = "pie_or_cake";
pub const SUGAR_HIGH: &str = "sugar_high";

/// Test-mode playground with `sugar_high` and `pie_or_cake` registered
pub fn pie_or_cake_playground() -> Playground {
    let playground = Playground::new(PlaygroundConfig::new().with_test_mode(true));
    playground.use_test_store();
    playground.register_metric(MetricDefinition::new(SUGAR_HIGH).with_name("Sugar high"));
    playground
        .register_experiment(pie_or_cake_definition())
        .unwrap();
    playground
}

pub fn pie_or_cake_definition() -> ExperimentDefinition {
    ExperimentDefinition::new(PIE_OR_CAKE)
        .with_name("Pie or cake")
        .with_alternatives(["pie", "cake"])
        .with_metrics([SUGAR_HIGH])
}

pub fn pie_or_cake(playground: &Playground) -> ExperimentHandle {
    playground.experiment(PIE_OR_CAKE).unwrap()
}

/// Override token selecting alternative `index` of `experiment`
pub fn fingerprint(experiment: &ExperimentHandle, index: usize) -> String {
    let alternative = &experiment.alternatives()[index];
    experiment.experiment().fingerprint(alternative).to_string()
}

pub fn request(method: Method, uri: &str) -> Request<()> {
    Request::builder().method(method).uri(uri).body(()).unwrap()
}

pub fn get(uri: &str) -> Request<()> {
    request(Method::GET, uri)
}

pub fn post(uri: &str) -> Request<()> {
    request(Method::POST, uri)
}

/// Attach `vanity_id=<identity>` to a request
pub fn with_vanity_cookie<B>(mut request: Request<B>, identity: &str) -> Request<B> {
    let value = format!("vanity_id={identity}").parse().unwrap();
    request.headers_mut().append(COOKIE, value);
    request
}

/// All `Set-Cookie` values in a header map
pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}
