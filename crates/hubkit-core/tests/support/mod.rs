// Fixture connectors shared by the integration tests.
//
// `DataPlatform` is a thin adapter over a wiremock-served REST API
// (query-only data sets). `Registry` keeps its records in memory and
// supports the full protocol, an incremental event and inbound pushes.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hubkit_api::{Credentials, RestClient};
use hubkit_core::{
    Args, Collection, Connector, Context, CoreError, Cursor, Entity, EntitySet, Event,
    EventRecord, Events, FieldSchema, Filters, Memo, Options, PageRequest, Path, Properties,
    Protocol, RemotePage, Result, SimpleProperty,
};
use serde_json::{Value, json};
use url::Url;

// ── REST-backed connector ───────────────────────────────────────────

pub fn rest_client(base: &str) -> RestClient {
    RestClient::with_client(
        reqwest::Client::new(),
        Url::parse(base).unwrap(),
        Credentials::basic("jdoe", "1234".to_owned()),
    )
}

pub struct DataPlatform {
    client: RestClient,
}

impl DataPlatform {
    pub fn new(client: RestClient) -> Arc<Self> {
        Arc::new(Self { client })
    }
}

#[async_trait]
impl Entity for DataPlatform {
    fn path(&self) -> Path {
        Path::root()
    }

    async fn label(&self, _ctx: &Context) -> Result<String> {
        Ok("Data platform".into())
    }

    async fn properties(&self, _ctx: &Context) -> Result<Properties> {
        let mut props = Properties::new();
        props.insert(
            "dataSets".into(),
            Collection::new(DataSets {
                client: self.client.clone(),
            })
            .into(),
        );
        Ok(props)
    }
}

#[async_trait]
impl Connector for DataPlatform {
    fn id(&self) -> &str {
        "platform"
    }

    fn kind(&self) -> &str {
        "data_platform"
    }
}

struct DataSets {
    client: RestClient,
}

#[async_trait]
impl EntitySet for DataSets {
    fn path(&self) -> Path {
        Path::new(["dataSets"])
    }

    async fn label(&self, _ctx: &Context) -> Result<String> {
        Ok("Data sets".into())
    }

    fn protocol(&self) -> Protocol {
        Protocol::query_only()
    }

    async fn query(&self, _filters: &Filters, page: PageRequest, ctx: &Context) -> Result<RemotePage> {
        let body = self
            .client
            .authorized(ctx.principal())
            .await?
            .get_query(
                "api/dataSets",
                &[("page", page.number.to_string()), ("pageSize", page.size.to_string())],
            )
            .await?;

        let items = body["dataSets"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|data| DataSet::listed(self.client.clone(), data) as Arc<dyn Entity>)
            .collect();
        Ok(RemotePage {
            items,
            total: body["pager"]["total"].as_u64(),
        })
    }

    async fn find_entity(&self, id: &str, _ctx: &Context) -> Result<Arc<dyn Entity>> {
        Ok(DataSet::lazy(self.client.clone(), id))
    }
}

struct DataSet {
    client: RestClient,
    id: String,
    data: Memo<Value>,
}

impl DataSet {
    fn listed(client: RestClient, data: Value) -> Arc<Self> {
        let id = match &data["id"] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Arc::new(Self {
            client,
            id,
            data: Memo::loaded(data),
        })
    }

    fn lazy(client: RestClient, id: &str) -> Arc<Self> {
        Arc::new(Self {
            client,
            id: id.to_owned(),
            data: Memo::new(),
        })
    }

    async fn data(&self, ctx: &Context) -> Result<&Value> {
        self.data
            .get_or_try_load(|| async {
                let body = self
                    .client
                    .authorized(ctx.principal())
                    .await?
                    .get(&format!("api/dataSets/{}", self.id))
                    .await?;
                Ok::<_, CoreError>(body)
            })
            .await
    }
}

#[async_trait]
impl Entity for DataSet {
    fn path(&self) -> Path {
        Path::new(["dataSets", self.id.as_str()])
    }

    async fn label(&self, ctx: &Context) -> Result<String> {
        Ok(self.data(ctx).await?["name"]
            .as_str()
            .unwrap_or_default()
            .to_owned())
    }

    async fn properties(&self, ctx: &Context) -> Result<Properties> {
        let data = self.data(ctx).await?;
        let mut props = Properties::new();
        props.insert("id".into(), SimpleProperty::id(data["id"].clone()).into());
        props.insert("name".into(), SimpleProperty::name(data["name"].clone()).into());
        Ok(props)
    }
}

// ── In-memory connector ─────────────────────────────────────────────

/// Shared state behind the `Registry` connector.
#[derive(Default)]
pub struct RegistryState {
    pub sites: Mutex<Vec<Value>>,
    /// `(key, record)` pairs served by the `new_site` event.
    pub submissions: Mutex<Vec<(i64, Value)>>,
    pub fail_update_of: Mutex<Option<i64>>,
    pub fail_delete_of: Mutex<Option<i64>>,
    pub remote_calls: AtomicUsize,
}

impl RegistryState {
    pub fn with_sites(count: i64) -> Arc<Self> {
        let state = Self::default();
        *state.sites.lock().unwrap() = (1..=count)
            .map(|id| json!({"id": id, "name": format!("Site {id}"), "beds": id % 7}))
            .collect();
        Arc::new(state)
    }

    pub fn site_ids(&self) -> Vec<i64> {
        self.sites
            .lock()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_i64().unwrap())
            .collect()
    }

    pub fn submit(&self, key: i64, record: Value) {
        self.submissions.lock().unwrap().push((key, record));
    }

    pub fn calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Registry {
    id: String,
    state: Arc<RegistryState>,
    protocol: Protocol,
}

impl Registry {
    pub fn new(id: &str, state: Arc<RegistryState>) -> Arc<Self> {
        Self::with_protocol(id, state, Protocol::all())
    }

    pub fn with_protocol(id: &str, state: Arc<RegistryState>, protocol: Protocol) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_owned(),
            state,
            protocol,
        })
    }

    pub fn sites(&self) -> Collection {
        Collection::new(Sites {
            state: Arc::clone(&self.state),
            protocol: self.protocol,
        })
    }
}

#[async_trait]
impl Entity for Registry {
    fn path(&self) -> Path {
        Path::root()
    }

    async fn label(&self, _ctx: &Context) -> Result<String> {
        Ok(format!("Registry {}", self.id))
    }

    async fn properties(&self, _ctx: &Context) -> Result<Properties> {
        let mut props = Properties::new();
        props.insert("sites".into(), self.sites().into());
        Ok(props)
    }
}

#[async_trait]
impl Connector for Registry {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "registry"
    }

    fn accepts_push(&self) -> bool {
        true
    }

    async fn route_push(&self, event_key: &str, _payload: &Value, _ctx: &Context) -> Result<Vec<Path>> {
        match event_key {
            "site_created" => Ok(vec![Path::parse("sites/$events/new_site")]),
            other => Err(CoreError::NotFound {
                path: other.to_owned(),
            }),
        }
    }
}

struct Sites {
    state: Arc<RegistryState>,
    protocol: Protocol,
}

#[async_trait]
impl EntitySet for Sites {
    fn path(&self) -> Path {
        Path::new(["sites"])
    }

    async fn label(&self, _ctx: &Context) -> Result<String> {
        Ok("Sites".into())
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn required_fields(&self) -> Vec<String> {
        vec!["name".into()]
    }

    async fn entity_properties(&self, _ctx: &Context) -> Result<Args> {
        let mut args = Args::new();
        args.insert("id".into(), FieldSchema::integer("Id"));
        args.insert("name".into(), FieldSchema::string("Name"));
        args.insert("beds".into(), FieldSchema::integer("Beds"));
        Ok(args)
    }

    async fn query(&self, _filters: &Filters, page: PageRequest, _ctx: &Context) -> Result<RemotePage> {
        self.state.touch();
        let sites = self.state.sites.lock().unwrap().clone();
        let offset = usize::try_from(page.offset()).unwrap();
        let size = usize::try_from(page.size).unwrap();
        let items = sites
            .iter()
            .skip(offset)
            .take(size)
            .map(|s| Site::new(s.clone()) as Arc<dyn Entity>)
            .collect();
        Ok(RemotePage {
            items,
            total: Some(u64::try_from(sites.len()).unwrap()),
        })
    }

    async fn find_entity(&self, id: &str, _ctx: &Context) -> Result<Arc<dyn Entity>> {
        self.state.touch();
        let found = self
            .state
            .sites
            .lock()
            .unwrap()
            .iter()
            .find(|s| s["id"].as_i64().is_some() && s["id"].as_i64() == id.parse::<i64>().ok())
            .cloned();
        found
            .map(|s| Site::new(s) as Arc<dyn Entity>)
            .ok_or_else(|| CoreError::NotFound {
                path: format!("sites/{id}"),
            })
    }

    async fn insert(&self, properties: Options, _ctx: &Context) -> Result<Value> {
        self.state.touch();
        let mut sites = self.state.sites.lock().unwrap();
        let id = sites.iter().filter_map(|s| s["id"].as_i64()).max().unwrap_or(0) + 1;
        let mut record = properties;
        record.insert("id".into(), json!(id));
        sites.push(Value::Object(record));
        Ok(json!({ "id": id }))
    }

    async fn update_entity(&self, id: &str, properties: &Options, _ctx: &Context) -> Result<()> {
        self.state.touch();
        if *self.state.fail_update_of.lock().unwrap() == id.parse::<i64>().ok() {
            return Err(CoreError::Remote {
                status: Some(500),
                body: "update rejected".into(),
            });
        }
        let mut sites = self.state.sites.lock().unwrap();
        let site = sites
            .iter_mut()
            .find(|s| s["id"].as_i64().is_some() && s["id"].as_i64() == id.parse::<i64>().ok())
            .ok_or_else(|| CoreError::NotFound { path: id.to_owned() })?;
        for (k, v) in properties {
            site[k] = v.clone();
        }
        Ok(())
    }

    async fn delete_entity(&self, id: &str, _ctx: &Context) -> Result<()> {
        self.state.touch();
        if *self.state.fail_delete_of.lock().unwrap() == id.parse::<i64>().ok() {
            return Err(CoreError::Remote {
                status: Some(500),
                body: "delete rejected".into(),
            });
        }
        self.state
            .sites
            .lock()
            .unwrap()
            .retain(|s| s["id"].to_string() != id);
        Ok(())
    }

    async fn events(&self, _ctx: &Context) -> Result<Events> {
        let mut events = Events::new();
        events.insert(
            "new_site".into(),
            Arc::new(NewSite {
                state: Arc::clone(&self.state),
            }),
        );
        Ok(events)
    }
}

struct Site {
    data: Value,
}

impl Site {
    fn new(data: Value) -> Arc<Self> {
        Arc::new(Self { data })
    }
}

#[async_trait]
impl Entity for Site {
    fn path(&self) -> Path {
        Path::new(["sites".to_owned(), self.data["id"].to_string()])
    }

    async fn label(&self, _ctx: &Context) -> Result<String> {
        Ok(self.data["name"].as_str().unwrap_or_default().to_owned())
    }

    async fn properties(&self, _ctx: &Context) -> Result<Properties> {
        let mut props = Properties::new();
        props.insert("id".into(), SimpleProperty::id(self.data["id"].clone()).into());
        props.insert("name".into(), SimpleProperty::name(self.data["name"].clone()).into());
        props.insert(
            "beds".into(),
            SimpleProperty::integer("Beds", self.data.get("beds").cloned()).into(),
        );
        Ok(props)
    }

    async fn events(&self, _ctx: &Context) -> Result<Events> {
        let mut events = Events::new();
        events.insert(
            "bed_change".into(),
            Arc::new(BedChange {
                site: self.path(),
            }),
        );
        Ok(events)
    }
}

/// Per-site event with nothing to report yet.
struct BedChange {
    site: Path,
}

#[async_trait]
impl Event for BedChange {
    fn path(&self) -> Path {
        self.site.event("bed_change")
    }

    fn label(&self) -> String {
        "Bed change".into()
    }

    async fn fetch(&self, _since: Option<Cursor>, _ctx: &Context) -> Result<Vec<EventRecord>> {
        Ok(Vec::new())
    }
}

struct NewSite {
    state: Arc<RegistryState>,
}

#[async_trait]
impl Event for NewSite {
    fn path(&self) -> Path {
        Path::new(["sites"]).event("new_site")
    }

    fn label(&self) -> String {
        "New site".into()
    }

    async fn args(&self, _ctx: &Context) -> Result<Args> {
        let mut args = Args::new();
        args.insert("name".into(), FieldSchema::string("Name"));
        Ok(args)
    }

    async fn fetch(&self, _since: Option<Cursor>, _ctx: &Context) -> Result<Vec<EventRecord>> {
        self.state.touch();
        Ok(self
            .state
            .submissions
            .lock()
            .unwrap()
            .iter()
            .map(|(key, record)| EventRecord::new(*key, record.clone()))
            .collect())
    }
}
