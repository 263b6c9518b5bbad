//! In-memory companies and locations, served through batched loaders.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context};
use syncload_deferred::Deferred;
use syncload_exec::{Args, Resolve, Resolved};
use syncload_loader::{LoaderConfig, LoaderContext, SyncDataLoader};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CompanyRecord {
    pub id: String,
    pub name: String,
    pub location_id: String,
}

#[derive(Debug, Clone)]
pub struct LocationRecord {
    pub id: String,
    pub city: String,
    pub company_id: String,
}

pub struct Dataset {
    companies: HashMap<String, CompanyRecord>,
    locations: HashMap<String, LocationRecord>,
}

impl Dataset {
    pub fn sample() -> Self {
        let rows = [
            ("1", "Acme Tools", "Minneapolis"),
            ("2", "Borealis Coffee", "Duluth"),
            ("3", "Cedar Print Shop", "St. Paul"),
        ];

        let mut companies = HashMap::new();
        let mut locations = HashMap::new();
        for (id, name, city) in rows {
            let location_id = format!("location-{id}");
            companies.insert(
                id.to_string(),
                CompanyRecord {
                    id: id.to_string(),
                    name: name.to_string(),
                    location_id: location_id.clone(),
                },
            );
            locations.insert(
                location_id.clone(),
                LocationRecord {
                    id: location_id,
                    city: city.to_string(),
                    company_id: id.to_string(),
                },
            );
        }
        Self {
            companies,
            locations,
        }
    }
}

fn lookup<V: Clone>(
    table: &HashMap<String, V>,
    kind: &str,
    keys: &[String],
) -> Vec<anyhow::Result<V>> {
    keys.iter()
        .map(|key| {
            table
                .get(key)
                .cloned()
                .ok_or_else(|| anyhow!("{kind} {key} not found"))
        })
        .collect()
}

pub struct Loaders {
    companies: SyncDataLoader<String, CompanyRecord>,
    locations: SyncDataLoader<String, LocationRecord>,
}

impl Loaders {
    pub fn new(ctx: &LoaderContext, config: &LoaderConfig, dataset: Rc<Dataset>) -> Rc<Self> {
        let data = dataset.clone();
        let companies = SyncDataLoader::from_fn(
            ctx,
            move |keys: &[String]| {
                debug!(?keys, "loading companies");
                Ok(lookup(&data.companies, "company", keys))
            },
            config.options("companies"),
        );
        let locations = SyncDataLoader::from_fn(
            ctx,
            move |keys: &[String]| {
                debug!(?keys, "loading locations");
                Ok(lookup(&dataset.locations, "location", keys))
            },
            config.options("locations"),
        );
        Rc::new(Self {
            companies,
            locations,
        })
    }

    fn company(self: &Rc<Self>, id: String) -> Resolved {
        company_from(&self.companies.load(id), self.clone())
    }

    fn location(self: &Rc<Self>, id: String) -> Resolved {
        let loaders = self.clone();
        Resolved::from_deferred(&self.locations.load(id), move |record| {
            Resolved::object(Location { record, loaders })
        })
    }
}

fn company_from(loaded: &Deferred<CompanyRecord>, loaders: Rc<Loaders>) -> Resolved {
    Resolved::from_deferred(loaded, move |record| {
        Resolved::object(Company { record, loaders })
    })
}

pub struct Query {
    pub loaders: Rc<Loaders>,
}

impl Resolve for Query {
    fn resolve(&self, field: &str, args: &Args) -> anyhow::Result<Resolved> {
        match field {
            "company" => {
                let id = args
                    .get("id")
                    .and_then(|id| id.as_str())
                    .context("company requires an id argument")?;
                Ok(self.loaders.company(id.to_string()))
            }
            "companies" => {
                let ids = args
                    .get("ids")
                    .and_then(|ids| ids.as_array())
                    .context("companies requires an ids argument")?;
                Ok(Resolved::List(
                    ids.iter()
                        .filter_map(|id| id.as_str())
                        .map(|id| self.loaders.company(id.to_string()))
                        .collect(),
                ))
            }
            other => bail!("Unknown field {other} on Query"),
        }
    }
}

struct Company {
    record: CompanyRecord,
    loaders: Rc<Loaders>,
}

impl Resolve for Company {
    fn resolve(&self, field: &str, _args: &Args) -> anyhow::Result<Resolved> {
        match field {
            "id" => Ok(Resolved::value(self.record.id.clone())),
            "name" => Ok(Resolved::value(self.record.name.clone())),
            "location" => Ok(self.loaders.location(self.record.location_id.clone())),
            other => bail!("Unknown field {other} on Company"),
        }
    }
}

struct Location {
    record: LocationRecord,
    loaders: Rc<Loaders>,
}

impl Resolve for Location {
    fn resolve(&self, field: &str, _args: &Args) -> anyhow::Result<Resolved> {
        match field {
            "id" => Ok(Resolved::value(self.record.id.clone())),
            "city" => Ok(Resolved::value(self.record.city.clone())),
            "company" => Ok(self.loaders.company(self.record.company_id.clone())),
            other => bail!("Unknown field {other} on Location"),
        }
    }
}
