//! Identity resolution and `_vanity` overrides through the request filter

use chrono::{Months, NaiveDateTime, Utc};
use pretty_assertions::assert_eq;
use regex::Regex;
use vanity_experiment::Identity;
use vanity_test_utils::{
    fingerprint, get, pie_or_cake, pie_or_cake_playground, post, request, set_cookies,
    with_vanity_cookie,
};
use vanity_web::{
    FilterError, FilterOutcome, IdentityResolver, IdentitySource, IdentityStrategy, RequestContext,
    VanityFilter,
};

#[derive(Debug, Clone)]
struct CurrentUser {
    id: u64,
}

fn identity_of(outcome: &FilterOutcome, ctx: &dyn RequestContext) -> Identity {
    outcome.session().identity(ctx).clone()
}

#[tokio::test]
async fn fresh_visitor_gets_hex_identity_and_month_cookie() {
    let filter = VanityFilter::new(pie_or_cake_playground());
    let request = get("/");
    let outcome = filter.before(&request).await.unwrap();
    assert!(!outcome.is_redirect());

    let identity = identity_of(&outcome, &request);
    let token = Regex::new("^[0-9a-f]{32}$").unwrap();
    assert!(token.is_match(identity.as_str()));

    let mut headers = http::HeaderMap::new();
    outcome.session().apply_to(&mut headers).unwrap();
    let cookies = set_cookies(&headers);
    assert_eq!(cookies.len(), 1);

    let wire = Regex::new("^vanity_id=([0-9a-f]{32}); expires=([^;]+); path=/$").unwrap();
    let captures = wire.captures(&cookies[0]).unwrap();
    assert_eq!(&captures[1], identity.as_str());

    let expires = NaiveDateTime::parse_from_str(&captures[2], "%a, %d %b %Y %H:%M:%S GMT")
        .unwrap()
        .and_utc();
    let expected = Utc::now().checked_add_months(Months::new(1)).unwrap();
    assert!((expected - expires).num_seconds().abs() < 60, "expires {expires}");
}

#[tokio::test]
async fn existing_cookie_is_kept_without_new_cookie() {
    let filter = VanityFilter::new(pie_or_cake_playground());
    let request = with_vanity_cookie(get("/"), "from_last_time");
    let outcome = filter.before(&request).await.unwrap();

    let resolved = outcome.session().resolve(&request);
    assert_eq!(resolved.identity.as_str(), "from_last_time");
    assert_eq!(resolved.source, IdentitySource::Cookie);

    let mut headers = http::HeaderMap::new();
    outcome.session().apply_to(&mut headers).unwrap();
    assert!(set_cookies(&headers).is_empty());
}

#[tokio::test]
async fn current_user_overrides_cookie() {
    let resolver = IdentityResolver::new(IdentityStrategy::user_model(|ctx| {
        ctx.extensions()?.get::<CurrentUser>().map(|user| user.id)
    }));
    let filter = VanityFilter::new(pie_or_cake_playground()).with_resolver(resolver);

    let mut request = with_vanity_cookie(get("/"), "from_last_time");
    request.extensions_mut().insert(CurrentUser { id: 999 });
    let outcome = filter.before(&request).await.unwrap();

    assert_eq!(identity_of(&outcome, &request).as_str(), "999");
    assert!(outcome.session().pending_cookie().is_none());
}

#[tokio::test]
async fn callback_identity_takes_precedence() {
    let resolver = IdentityResolver::new(IdentityStrategy::callback(|ctx| {
        ctx.query().map(|q| format!("q:{q}"))
    }));
    let filter = VanityFilter::new(pie_or_cake_playground()).with_resolver(resolver);
    let request = with_vanity_cookie(get("/?page=2"), "from_last_time");
    let outcome = filter.before(&request).await.unwrap();
    assert_eq!(identity_of(&outcome, &request).as_str(), "q:page=2");
}

#[tokio::test]
async fn get_with_override_redirects_without_parameter() {
    let filter = VanityFilter::new(pie_or_cake_playground());
    let request = with_vanity_cookie(get("/foo?foo=bar&_vanity=567"), "visitor");
    let outcome = filter.before(&request).await.unwrap();

    assert!(outcome.is_redirect());
    assert_eq!(outcome.location(), Some("/foo?foo=bar"));

    let response = outcome.redirect_response::<()>().unwrap().unwrap();
    assert_eq!(response.status(), http::StatusCode::FOUND);
    assert_eq!(response.headers()[http::header::LOCATION], "/foo?foo=bar");
}

#[tokio::test]
async fn redirect_for_new_visitor_carries_cookie() {
    let playground = pie_or_cake_playground();
    let token = fingerprint(&pie_or_cake(&playground), 1);
    let filter = VanityFilter::new(playground.clone());
    let request = get(&format!("/?_vanity={token}"));
    let outcome = filter.before(&request).await.unwrap();

    assert_eq!(outcome.location(), Some("/"));
    let response = outcome.redirect_response::<()>().unwrap().unwrap();
    assert_eq!(set_cookies(response.headers()).len(), 1);

    let experiment = pie_or_cake(&playground);
    let identity = identity_of(&outcome, &request);
    let cake = experiment.alternatives()[1].clone();
    assert!(experiment.showing(&identity, &cake).await.unwrap());
}

#[tokio::test]
async fn post_with_override_is_ignored() {
    let playground = pie_or_cake_playground();
    let experiment = pie_or_cake(&playground);
    let visitor = Identity::new("poster");
    let before = experiment.choose(&visitor).await.unwrap();
    let other = 1 - before.index();

    let filter = VanityFilter::new(playground.clone());
    let uri = format!("/orders?_vanity={}", fingerprint(&experiment, other));
    let request = with_vanity_cookie(post(&uri), "poster");
    let outcome = filter.before(&request).await.unwrap();

    assert!(!outcome.is_redirect());
    assert!(outcome.redirect_response::<()>().unwrap().is_none());
    let after = experiment.choose(&visitor).await.unwrap();
    assert_eq!(after.index(), before.index());
    assert!(!after.is_fresh());
}

#[tokio::test]
async fn post_with_override_leaves_fresh_visitor_unassigned() {
    let playground = pie_or_cake_playground();
    let experiment = pie_or_cake(&playground);
    let filter = VanityFilter::new(playground.clone());
    let uri = format!("/orders?_vanity={}", fingerprint(&experiment, 1));
    let request = with_vanity_cookie(post(&uri), "first_post");
    let outcome = filter.before(&request).await.unwrap();
    assert!(!outcome.is_redirect());

    let visitor = Identity::new("first_post");
    for alternative in experiment.alternatives() {
        assert!(!experiment.showing(&visitor, alternative).await.unwrap());
    }
}

#[tokio::test]
async fn protocol_relative_path_redirects_on_this_origin() {
    let playground = pie_or_cake_playground();
    let experiment = pie_or_cake(&playground);
    let filter = VanityFilter::new(playground.clone());
    let uri = format!("//evil.example/phish?_vanity={}", fingerprint(&experiment, 0));
    let request = with_vanity_cookie(get(&uri), "wanderer");

    let outcome = filter.before(&request).await.unwrap();
    assert_eq!(outcome.location(), Some("/evil.example/phish"));
    let response = outcome.redirect_response::<()>().unwrap().unwrap();
    assert_eq!(response.headers()[http::header::LOCATION], "/evil.example/phish");
}

#[tokio::test]
async fn override_sticks_across_requests() {
    let playground = pie_or_cake_playground();
    let experiment = pie_or_cake(&playground);
    let pie = experiment.alternatives()[0].clone();
    let uri = format!("/?_vanity={}", fingerprint(&experiment, 0));
    let filter = VanityFilter::new(playground.clone());
    let visitor = Identity::new("sweet_tooth");

    for _ in 0..10 {
        let request = with_vanity_cookie(get(&uri), visitor.as_str());
        let outcome = filter.before(&request).await.unwrap();
        assert!(outcome.is_redirect());

        assert!(experiment.showing(&visitor, &pie).await.unwrap());
        let choice = experiment.choose(&visitor).await.unwrap();
        assert!(!choice.is_fresh());
        assert_eq!(choice.alternative(), &pie);
    }
}

#[tokio::test]
async fn head_is_treated_as_safe() {
    let filter = VanityFilter::new(pie_or_cake_playground());
    let request = request(http::Method::HEAD, "/a?_vanity=x&z=1&b=2");
    let outcome = filter.before(&request).await.unwrap();
    assert_eq!(outcome.location(), Some("/a?b=2&z=1"));
}

#[tokio::test]
async fn unknown_token_changes_nothing() {
    let playground = pie_or_cake_playground();
    let experiment = pie_or_cake(&playground);
    let visitor = Identity::new("curious");

    let filter = VanityFilter::new(playground.clone());
    let request = with_vanity_cookie(get("/?_vanity=garbage"), visitor.as_str());
    let outcome = filter.before(&request).await.unwrap();

    assert_eq!(outcome.location(), Some("/"));
    for alternative in experiment.alternatives() {
        assert!(!experiment.showing(&visitor, alternative).await.unwrap());
    }
}

#[tokio::test]
async fn store_failure_during_override_is_surfaced() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let playground = pie_or_cake_playground();
    let token = fingerprint(&pie_or_cake(&playground), 0);
    playground
        .configure_store(&format!("127.0.0.1:{port}"))
        .unwrap();

    let filter = VanityFilter::new(playground);
    let request = get(&format!("/?_vanity={token}"));
    match filter.before(&request).await {
        Err(FilterError::Vanity(e)) => assert!(e.is_retryable(), "unexpected error: {e}"),
        other => panic!("expected store failure, got {other:?}"),
    }
}
