//! End-to-end executions: nested fields resolved through batched loaders.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context};
use serde_json::json;
use syncload_exec::{Args, ExecError, Executor, PathSegment, Resolve, Resolved, Selection};
use syncload_loader::{DrainError, LoaderContext, LoaderOptions, SyncDataLoader};

// ---------------------------------------------------------------------------
// Test schema: Query -> Company <-> Location
// ---------------------------------------------------------------------------

type Calls = Rc<RefCell<Vec<Vec<String>>>>;

struct Loaders {
    ids: SyncDataLoader<String, String>,
    companies: SyncDataLoader<String, String>,
    locations: SyncDataLoader<String, String>,
}

struct Recorded {
    ids: Calls,
    companies: Calls,
    locations: Calls,
}

/// Identity loader that records calls and fails the keys listed in `missing`.
fn loader(
    ctx: &LoaderContext,
    name: &str,
    missing: &'static [&'static str],
) -> (SyncDataLoader<String, String>, Calls) {
    let calls: Calls = Rc::new(RefCell::new(Vec::new()));
    let seen = calls.clone();
    let loader = SyncDataLoader::from_fn(
        ctx,
        move |keys: &[String]| {
            seen.borrow_mut().push(keys.to_vec());
            Ok(keys
                .iter()
                .map(|key| {
                    if missing.contains(&key.as_str()) {
                        Err(anyhow!("{key} not found"))
                    } else {
                        Ok(key.clone())
                    }
                })
                .collect())
        },
        LoaderOptions::builder().name(name).build(),
    );
    (loader, calls)
}

fn setup(missing: &'static [&'static str]) -> (Executor, Query, Recorded) {
    setup_in(LoaderContext::new(), missing)
}

fn setup_in(ctx: LoaderContext, missing: &'static [&'static str]) -> (Executor, Query, Recorded) {
    let (ids, id_calls) = loader(&ctx, "ids", missing);
    let (companies, company_calls) = loader(&ctx, "companies", missing);
    let (locations, location_calls) = loader(&ctx, "locations", missing);

    let query = Query {
        loaders: Rc::new(Loaders {
            ids,
            companies,
            locations,
        }),
    };
    let recorded = Recorded {
        ids: id_calls,
        companies: company_calls,
        locations: location_calls,
    };
    (Executor::new(ctx), query, recorded)
}

fn string_arg(args: &Args, name: &str) -> anyhow::Result<String> {
    args.get(name)
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .with_context(|| format!("missing argument {name}"))
}

struct Query {
    loaders: Rc<Loaders>,
}

impl Resolve for Query {
    fn resolve(&self, field: &str, args: &Args) -> anyhow::Result<Resolved> {
        match field {
            "hello" => Ok(Resolved::value("world")),
            "getId" => {
                let id = self.loaders.ids.load(string_arg(args, "id")?);
                Ok(Resolved::from_deferred(&id, Resolved::value))
            }
            "getIdTwice" => {
                let ids = self.loaders.ids.clone();
                let twice = ids
                    .load(string_arg(args, "id")?)
                    .and_then(move |id| ids.load(format!("{id}-again")));
                Ok(Resolved::from_deferred(&twice, Resolved::value))
            }
            "getCompany" => {
                let company = self.loaders.companies.load(string_arg(args, "id")?);
                Ok(company_from(&self.loaders, &company))
            }
            "getCompanies" => {
                let ids = args
                    .get("ids")
                    .and_then(|ids| ids.as_array())
                    .context("missing argument ids")?;
                let companies = ids
                    .iter()
                    .filter_map(|id| id.as_str())
                    .map(|id| company_from(&self.loaders, &self.loaders.companies.load(id.into())))
                    .collect();
                Ok(Resolved::List(companies))
            }
            other => bail!("Unknown field {other} on Query"),
        }
    }
}

fn company_from(loaders: &Rc<Loaders>, loaded: &syncload_deferred::Deferred<String>) -> Resolved {
    let loaders = loaders.clone();
    Resolved::from_deferred(loaded, move |id| Resolved::object(Company { id, loaders }))
}

struct Company {
    id: String,
    loaders: Rc<Loaders>,
}

impl Resolve for Company {
    fn resolve(&self, field: &str, _args: &Args) -> anyhow::Result<Resolved> {
        match field {
            "id" => Ok(Resolved::value(self.id.clone())),
            "location" => {
                let location = self.loaders.locations.load(format!("location-{}", self.id));
                let (loaders, company_key) = (self.loaders.clone(), self.id.clone());
                Ok(Resolved::from_deferred(&location, move |id| {
                    Resolved::object(Location {
                        id,
                        company_key,
                        loaders,
                    })
                }))
            }
            other => bail!("Unknown field {other} on Company"),
        }
    }
}

struct Location {
    id: String,
    company_key: String,
    loaders: Rc<Loaders>,
}

impl Resolve for Location {
    fn resolve(&self, field: &str, _args: &Args) -> anyhow::Result<Resolved> {
        match field {
            "id" => Ok(Resolved::value(self.id.clone())),
            "company" => {
                let company = self.loaders.companies.load(self.company_key.clone());
                Ok(company_from(&self.loaders, &company))
            }
            other => bail!("Unknown field {other} on Location"),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn company_with_location(alias: &str, id: &str) -> Selection {
    Selection::field("getCompany")
        .alias(alias)
        .arg("id", id)
        .select([
            Selection::field("id"),
            Selection::field("location").select([Selection::field("id")]),
        ])
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn sibling_fields_share_one_batch() {
    let (executor, query, recorded) = setup(&[]);

    let result = executor
        .execute(
            &query,
            &[
                Selection::field("getId").alias("id1").arg("id", "1"),
                Selection::field("getId").alias("id2").arg("id", "2"),
            ],
        )
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(*recorded.ids.borrow(), vec![strings(&["1", "2"])]);
    assert_eq!(result.data, json!({"id1": "1", "id2": "2"}));
}

#[test]
fn plain_and_deferred_fields_mix() {
    let (executor, query, recorded) = setup(&[]);

    let result = executor
        .execute(
            &query,
            &[
                Selection::field("hello"),
                Selection::field("getId").alias("id1").arg("id", "1"),
                Selection::field("getId").alias("id2").arg("id", "2"),
            ],
        )
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(result.data, json!({"hello": "world", "id1": "1", "id2": "2"}));
    let keys: Vec<_> = result.data.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, strings(&["hello", "id1", "id2"]));
    assert_eq!(*recorded.ids.borrow(), vec![strings(&["1", "2"])]);
}

#[test]
fn plain_only_selection_dispatches_nothing() {
    let (executor, query, _) = setup(&[]);

    let result = executor
        .execute(&query, &[Selection::field("hello")])
        .unwrap();

    assert_eq!(result.data, json!({"hello": "world"}));
    assert!(executor.context().stats().iter().all(|s| s.batches == 0));
}

#[test]
fn each_loader_batches_its_own_level() {
    let (executor, query, recorded) = setup(&[]);

    let result = executor
        .execute(
            &query,
            &[
                company_with_location("company1", "1"),
                company_with_location("company2", "2"),
            ],
        )
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(
        result.data,
        json!({
            "company1": {"id": "1", "location": {"id": "location-1"}},
            "company2": {"id": "2", "location": {"id": "location-2"}},
        })
    );
    assert_eq!(*recorded.companies.borrow(), vec![strings(&["1", "2"])]);
    assert_eq!(
        *recorded.locations.borrow(),
        vec![strings(&["location-1", "location-2"])]
    );
}

#[test]
fn cyclic_levels_are_served_from_cache() {
    let (executor, query, recorded) = setup(&[]);

    let nested = |alias: &str, id: &str| {
        Selection::field("getCompany").alias(alias).arg("id", id).select([
            Selection::field("id"),
            Selection::field("location").select([
                Selection::field("id"),
                Selection::field("company").select([
                    Selection::field("id"),
                    Selection::field("location").select([Selection::field("id")]),
                ]),
            ]),
        ])
    };

    let result = executor
        .execute(&query, &[nested("company1", "1"), nested("company2", "2")])
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(
        result.data,
        json!({
            "company1": {
                "id": "1",
                "location": {
                    "id": "location-1",
                    "company": {"id": "1", "location": {"id": "location-1"}},
                },
            },
            "company2": {
                "id": "2",
                "location": {
                    "id": "location-2",
                    "company": {"id": "2", "location": {"id": "location-2"}},
                },
            },
        })
    );
    assert_eq!(*recorded.companies.borrow(), vec![strings(&["1", "2"])]);
    assert_eq!(
        *recorded.locations.borrow(),
        vec![strings(&["location-1", "location-2"])]
    );
}

#[test]
fn list_of_deferred_items_completes_in_order() {
    let (executor, query, recorded) = setup(&[]);

    let result = executor
        .execute(
            &query,
            &[Selection::field("getCompanies")
                .arg("ids", json!(["3", "1", "2"]))
                .select([Selection::field("id")])],
        )
        .unwrap();

    assert_eq!(
        result.data,
        json!({"getCompanies": [{"id": "3"}, {"id": "1"}, {"id": "2"}]})
    );
    assert_eq!(*recorded.companies.borrow(), vec![strings(&["3", "1", "2"])]);
}

#[test]
fn per_item_failure_nulls_only_that_field() {
    let (executor, query, _) = setup(&["location-2"]);

    let result = executor
        .execute(
            &query,
            &[
                company_with_location("company1", "1"),
                company_with_location("company2", "2"),
            ],
        )
        .unwrap();

    assert_eq!(
        result.data,
        json!({
            "company1": {"id": "1", "location": {"id": "location-1"}},
            "company2": {"id": "2", "location": null},
        })
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].message, "location-2 not found");
    assert_eq!(
        result.errors[0].path,
        vec![
            PathSegment::Field("company2".into()),
            PathSegment::Field("location".into()),
        ]
    );
}

#[test]
fn failed_list_item_reports_its_index() {
    let (executor, query, _) = setup(&["1"]);

    let result = executor
        .execute(
            &query,
            &[Selection::field("getCompanies")
                .arg("ids", json!(["3", "1"]))
                .select([Selection::field("id")])],
        )
        .unwrap();

    assert_eq!(result.data, json!({"getCompanies": [{"id": "3"}, null]}));
    assert_eq!(
        serde_json::to_value(&result.errors).unwrap(),
        json!([{"message": "1 not found", "path": ["getCompanies", 1]}])
    );
}

#[test]
fn resolver_error_is_reported_with_its_path() {
    let (executor, query, _) = setup(&[]);

    let result = executor
        .execute(
            &query,
            &[Selection::field("hello"), Selection::field("nope")],
        )
        .unwrap();

    assert_eq!(result.data, json!({"hello": "world", "nope": null}));
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({
            "data": {"hello": "world", "nope": null},
            "errors": [{"message": "Unknown field nope on Query", "path": ["nope"]}],
        })
    );
}

#[test]
fn successful_result_omits_errors_when_serialized() {
    let (executor, query, _) = setup(&[]);

    let result = executor
        .execute(&query, &[Selection::field("getId").arg("id", "7")])
        .unwrap();

    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"data": {"getId": "7"}})
    );
}

#[test]
fn failed_drain_does_not_leak_errors_into_the_next_execution() {
    let (executor, query, _) = setup_in(LoaderContext::with_max_passes(Some(1)), &[]);

    let failed = executor.execute(
        &query,
        &[
            Selection::field("nope"),
            Selection::field("getIdTwice").arg("id", "1"),
        ],
    );
    assert!(matches!(
        failed,
        Err(ExecError::Drain(DrainError::PassLimitExceeded { limit: 1 }))
    ));

    let result = executor
        .execute(&query, &[Selection::field("hello")])
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(result.data, json!({"hello": "world"}));
}
