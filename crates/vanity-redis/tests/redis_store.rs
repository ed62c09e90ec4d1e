//! RedisStore against an in-process RESP server

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use vanity_config::StoreEndpoint;
use vanity_experiment::{
    Experiment, ExperimentDefinition, Identity, Store, StoreError, StoreKind,
};
use vanity_redis::{RedisStore, RespValue};

#[derive(Debug, Clone)]
enum Entry {
    Text(Vec<u8>),
    Set(HashSet<Vec<u8>>),
}

type Db = Arc<Mutex<HashMap<Vec<u8>, Entry>>>;

/// Minimal server for the commands RedisStore issues
async fn fake_redis() -> (StoreEndpoint, Db) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let db: Db = Arc::default();
    let shared = Arc::clone(&db);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve(socket, Arc::clone(&shared)));
        }
    });
    (StoreEndpoint::new("127.0.0.1", port), db)
}

async fn serve(mut socket: TcpStream, db: Db) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        while let Ok(Some((request, used))) = RespValue::decode(&buffer) {
            buffer.drain(..used);
            let reply = execute(&db, &request);
            if socket.write_all(&reply.encode()).await.is_err() {
                return;
            }
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
}

fn execute(db: &Db, request: &RespValue) -> RespValue {
    let RespValue::Array(Some(items)) = request else {
        return RespValue::Error("ERR expected array".to_string());
    };
    let args: Vec<Vec<u8>> = items
        .iter()
        .filter_map(|item| item.as_bytes().map(<[u8]>::to_vec))
        .collect();
    let mut db = db.lock().unwrap();
    let name = String::from_utf8_lossy(&args[0]).to_uppercase();

    match name.as_str() {
        "GET" => match db.get(&args[1]) {
            Some(Entry::Text(value)) => RespValue::BulkString(Some(value.clone())),
            Some(Entry::Set(_)) => RespValue::Error("WRONGTYPE".to_string()),
            None => RespValue::BulkString(None),
        },
        "SET" => {
            let nx = args.get(3).is_some_and(|flag| flag.eq_ignore_ascii_case(b"NX"));
            if nx && db.contains_key(&args[1]) {
                return RespValue::BulkString(None);
            }
            db.insert(args[1].clone(), Entry::Text(args[2].clone()));
            RespValue::SimpleString("OK".to_string())
        }
        "SADD" => {
            let entry = db
                .entry(args[1].clone())
                .or_insert_with(|| Entry::Set(HashSet::new()));
            match entry {
                Entry::Set(members) => {
                    RespValue::Integer(i64::from(members.insert(args[2].clone())))
                }
                Entry::Text(_) => RespValue::Error("WRONGTYPE".to_string()),
            }
        }
        "SCARD" => match db.get(&args[1]) {
            Some(Entry::Set(members)) => RespValue::Integer(members.len() as i64),
            _ => RespValue::Integer(0),
        },
        "INCRBY" => {
            let by: i64 = String::from_utf8_lossy(&args[2]).parse().unwrap();
            let current = match db.get(&args[1]) {
                Some(Entry::Text(value)) => String::from_utf8_lossy(value).parse().unwrap(),
                _ => 0i64,
            };
            let next = current + by;
            db.insert(args[1].clone(), Entry::Text(next.to_string().into_bytes()));
            RespValue::Integer(next)
        }
        "SCAN" => {
            let cursor: usize = String::from_utf8_lossy(&args[1]).parse().unwrap();
            let pattern = &args[3];
            let count: usize = String::from_utf8_lossy(&args[5]).parse().unwrap();
            let mut all: Vec<&Vec<u8>> = db.keys().collect();
            all.sort();
            let end = (cursor + count).min(all.len());
            let keys = all[cursor.min(end)..end]
                .iter()
                .filter(|key| glob_match(pattern, key))
                .map(|key| RespValue::BulkString(Some((*key).clone())))
                .collect();
            let next = if end == all.len() { 0 } else { end };
            RespValue::Array(Some(vec![
                RespValue::BulkString(Some(next.to_string().into_bytes())),
                RespValue::Array(Some(keys)),
            ]))
        }
        "DEL" => {
            let removed = args[1..].iter().filter(|key| db.remove(*key).is_some()).count();
            RespValue::Integer(removed as i64)
        }
        other => RespValue::Error(format!("ERR unknown command '{other}'")),
    }
}

/// Glob supporting `*` and backslash escapes
fn glob_match(pattern: &[u8], input: &[u8]) -> bool {
    match pattern.split_first() {
        None => input.is_empty(),
        Some((b'*', rest)) => (0..=input.len()).any(|skip| glob_match(rest, &input[skip..])),
        Some((b'\\', rest)) if !rest.is_empty() => {
            input.first() == Some(&rest[0]) && glob_match(&rest[1..], &input[1..])
        }
        Some((c, rest)) => input.first() == Some(c) && glob_match(rest, &input[1..]),
    }
}

fn pie_or_cake() -> Experiment {
    Experiment::from_definition(
        ExperimentDefinition::new("pie_or_cake")
            .with_alternatives(["pie", "cake"])
            .with_metrics(["sugar_high"]),
    )
    .unwrap()
}

#[tokio::test]
async fn first_assignment_wins() {
    let (endpoint, _db) = fake_redis().await;
    let store = RedisStore::new(endpoint);
    let visitor = Identity::new("visitor-1");

    let first = store.assign_if_absent("pie_or_cake", &visitor, 1).await.unwrap();
    assert!(first.created);
    assert_eq!(first.alternative, 1);

    let second = store.assign_if_absent("pie_or_cake", &visitor, 0).await.unwrap();
    assert!(!second.created);
    assert_eq!(second.alternative, 1);
    assert_eq!(store.assignment("pie_or_cake", &visitor).await.unwrap(), Some(1));
}

#[tokio::test]
async fn keys_follow_namespace_layout() {
    let (endpoint, db) = fake_redis().await;
    let store = RedisStore::new(endpoint);
    let visitor = Identity::new("abc");

    store.set_assignment("pie_or_cake", &visitor, 0).await.unwrap();
    store.add_participant("pie_or_cake", 0, &visitor).await.unwrap();

    let db = db.lock().unwrap();
    assert!(db.contains_key(b"vanity:pie_or_cake:participant:abc:show".as_slice()));
    assert!(db.contains_key(b"vanity:pie_or_cake:alts:0:participants".as_slice()));
}

#[tokio::test]
async fn experiment_choice_is_sticky_over_redis() {
    let (endpoint, _db) = fake_redis().await;
    let store = RedisStore::new(endpoint);
    let experiment = pie_or_cake();
    let visitor = Identity::new("sticky");

    let first = experiment.choose(&store, &visitor).await.unwrap();
    assert!(first.is_fresh());
    for _ in 0..5 {
        let again = experiment.choose(&store, &visitor).await.unwrap();
        assert!(!again.is_fresh());
        assert_eq!(again.index(), first.index());
    }

    let counts = store.alternative_counts("pie_or_cake", first.index()).await.unwrap();
    assert_eq!(counts.participants, 1);
}

#[tokio::test]
async fn conversions_and_metrics_accumulate() {
    let (endpoint, _db) = fake_redis().await;
    let store = RedisStore::new(endpoint);
    let visitor = Identity::new("hungry");
    let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

    store.add_conversion("pie_or_cake", 1, &visitor, 2).await.unwrap();
    store.add_conversion("pie_or_cake", 1, &visitor, 3).await.unwrap();
    store.track_metric("sugar_high", day, 4).await.unwrap();
    store.track_metric("sugar_high", day, 1).await.unwrap();

    let counts = store.alternative_counts("pie_or_cake", 1).await.unwrap();
    assert_eq!(counts.converted, 1);
    assert_eq!(counts.conversions, 5);
    assert_eq!(store.metric_total("sugar_high", day).await.unwrap(), 5);
    assert_eq!(
        store
            .metric_total("sugar_high", day.succ_opt().unwrap())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn destroy_removes_only_that_experiment() {
    let (endpoint, db) = fake_redis().await;
    let store = RedisStore::new(endpoint);
    let visitor = Identity::new("v");

    store.set_assignment("pie_or_cake", &visitor, 0).await.unwrap();
    store.set_assignment("null_abc", &visitor, 1).await.unwrap();
    store.destroy_experiment("pie_or_cake").await.unwrap();

    assert_eq!(store.assignment("pie_or_cake", &visitor).await.unwrap(), None);
    assert_eq!(store.assignment("null_abc", &visitor).await.unwrap(), Some(1));

    store.flush().await.unwrap();
    assert!(db.lock().unwrap().is_empty());
}

#[tokio::test]
async fn destroy_walks_every_scan_page() {
    let (endpoint, db) = fake_redis().await;
    let store = RedisStore::new(endpoint);

    for n in 0..250 {
        let visitor = Identity::new(format!("visitor-{n}"));
        store.set_assignment("pie_or_cake", &visitor, n % 2).await.unwrap();
    }
    store.set_assignment("null_abc", &Identity::new("v"), 0).await.unwrap();
    store.destroy_experiment("pie_or_cake").await.unwrap();

    let db = db.lock().unwrap();
    assert_eq!(db.len(), 1);
    assert!(db.contains_key(b"vanity:null_abc:participant:v:show".as_slice()));
}

#[tokio::test]
async fn destroying_experiment_named_metrics_keeps_metric_totals() {
    let (endpoint, _db) = fake_redis().await;
    let store = RedisStore::new(endpoint);
    let visitor = Identity::new("v");
    let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

    store.track_metric("sugar_high", day, 7).await.unwrap();
    store.set_assignment("metrics", &visitor, 1).await.unwrap();
    store.add_participant("metrics", 1, &visitor).await.unwrap();
    store.destroy_experiment("metrics").await.unwrap();

    assert_eq!(store.assignment("metrics", &visitor).await.unwrap(), None);
    assert_eq!(store.alternative_counts("metrics", 1).await.unwrap().participants, 0);
    assert_eq!(store.metric_total("sugar_high", day).await.unwrap(), 7);
}

#[tokio::test]
async fn namespaces_are_isolated() {
    let (endpoint, _db) = fake_redis().await;
    let ours = RedisStore::with_options(endpoint.clone(), "ours", Duration::from_secs(1));
    let theirs = RedisStore::with_options(endpoint, "theirs", Duration::from_secs(1));
    let visitor = Identity::new("v");

    ours.set_assignment("pie_or_cake", &visitor, 1).await.unwrap();
    theirs.flush().await.unwrap();

    assert_eq!(ours.assignment("pie_or_cake", &visitor).await.unwrap(), Some(1));
    assert_eq!(theirs.assignment("pie_or_cake", &visitor).await.unwrap(), None);
}

#[tokio::test]
async fn unreachable_server_is_connectivity_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let store = RedisStore::with_options(
        StoreEndpoint::new("127.0.0.1", port),
        "vanity",
        Duration::from_millis(500),
    );
    assert_eq!(store.kind(), StoreKind::Redis);

    let err = store
        .assignment("pie_or_cake", &Identity::new("v"))
        .await
        .unwrap_err();
    assert!(err.is_connectivity(), "unexpected error: {err:?}");
    assert!(!matches!(err, StoreError::Protocol(_)));
}
