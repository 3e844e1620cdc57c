//! Example Galen server: an in-memory Patient store with all six
//! interactions registered.
//!
//! Run it, then try:
//!
//! ```text
//! curl -X POST localhost:8080/Patient -d '{"resourceType":"Patient","name":"Ada Lovelace"}'
//! curl localhost:8080/Patient/<id>
//! curl 'localhost:8080/Patient?_id=<id>&_pretty=true'
//! curl localhost:8080/metadata
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use galen::prelude::*;

/// A minimal Patient resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Patient {
    resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    birth_date: Option<String>,
}

impl FhirResource for Patient {
    const TYPE: &'static str = "Patient";

    fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }
}

/// In-memory resource store, shared with handlers through the container.
#[derive(Debug, Default)]
struct PatientStore {
    patients: RwLock<HashMap<String, Patient>>,
}

impl PatientStore {
    async fn get(&self, id: &Id) -> Option<Patient> {
        self.patients.read().await.get(id.as_str()).cloned()
    }

    async fn put(&self, patient: Patient) -> Result<(), FhirError> {
        let id = patient
            .id
            .as_ref()
            .ok_or_else(|| FhirError::internal("stored patient has no id"))?;
        self.patients
            .write()
            .await
            .insert(id.as_str().to_string(), patient);
        Ok(())
    }

    async fn remove(&self, id: &Id) -> bool {
        self.patients.write().await.remove(id.as_str()).is_some()
    }

    async fn all(&self) -> Vec<Patient> {
        let mut patients: Vec<Patient> = self.patients.read().await.values().cloned().collect();
        patients.sort_by(|a, b| {
            let a = a.id.as_ref().map(Id::as_str);
            let b = b.id.as_ref().map(Id::as_str);
            a.cmp(&b)
        });
        patients
    }
}

fn store(ctx: &InteractionContext) -> Result<Arc<PatientStore>, FhirError> {
    ctx.dependencies()
        .resolve::<PatientStore>()
        .ok_or_else(|| FhirError::internal("patient store not registered"))
}

async fn patient_create(ctx: InteractionContext, mut patient: Patient) -> Result<Patient, FhirError> {
    let id = Id::new(Uuid::now_v7().to_string())
        .map_err(|e| FhirError::internal(format!("generated id rejected: {e}")))?;
    patient.id = Some(id);
    store(&ctx)?.put(patient.clone()).await?;
    Ok(patient)
}

async fn patient_read(ctx: InteractionContext, id: Id) -> Result<Patient, FhirError> {
    store(&ctx)?
        .get(&id)
        .await
        .ok_or_else(|| FhirError::not_found("Patient", Some(id.as_str())))
}

async fn patient_update(
    ctx: InteractionContext,
    id: Id,
    mut patient: Patient,
) -> Result<Patient, FhirError> {
    if let Some(body_id) = &patient.id {
        if *body_id != id {
            return Err(FhirError::invalid(format!(
                "resource id '{body_id}' does not match path id '{id}'"
            )));
        }
    }
    let store = store(&ctx)?;
    if store.get(&id).await.is_none() {
        return Err(FhirError::not_found("Patient", Some(id.as_str())));
    }
    patient.id = Some(id);
    store.put(patient.clone()).await?;
    Ok(patient)
}

async fn patient_patch(
    ctx: InteractionContext,
    id: Id,
    patch: JsonPatch,
) -> Result<Patient, FhirError> {
    let store = store(&ctx)?;
    let patient = store
        .get(&id)
        .await
        .ok_or_else(|| FhirError::not_found("Patient", Some(id.as_str())))?;

    let mut document = serde_json::to_value(&patient)
        .map_err(|e| FhirError::internal(format!("serialization failed: {e}")))?;
    apply_patch(&mut document, &patch)?;

    let mut patched: Patient = serde_json::from_value(document).map_err(|e| {
        FhirError::unprocessable(
            IssueCode::Structure,
            format!("patched resource is not a Patient: {e}"),
        )
    })?;
    patched.id = Some(id);
    store.put(patched.clone()).await?;
    Ok(patched)
}

async fn patient_delete(ctx: InteractionContext, id: Id) -> Result<(), FhirError> {
    // Delete is idempotent: removing an absent resource still succeeds.
    store(&ctx)?.remove(&id).await;
    Ok(())
}

async fn patient_search(ctx: InteractionContext, args: SearchArgs) -> Result<Bundle, FhirError> {
    let store = store(&ctx)?;
    let mut patients = store.all().await;

    if let Some(wanted) = args.get("_id") {
        patients.retain(|p| p.id.as_ref().is_some_and(|id| id.as_str() == wanted));
    }
    if let Some(count) = args.get("_count") {
        let count: usize = count
            .parse()
            .map_err(|_| FhirError::invalid(format!("_count value '{count}' is not a number")))?;
        patients.truncate(count);
    }

    let total = patients.len() as u64;
    Ok(Bundle::searchset_of(patients).with_total(total))
}

/// Applies a validated patch document to a JSON value.
fn apply_patch(document: &mut serde_json::Value, patch: &JsonPatch) -> Result<(), FhirError> {
    use galen::core::PatchOp;

    for op in patch.operations() {
        match op.op {
            PatchOp::Add | PatchOp::Replace => {
                let value = op
                    .value
                    .clone()
                    .ok_or_else(|| FhirError::invalid("patch operation is missing a value"))?;
                set_pointer(document, &op.path, value)?;
            }
            PatchOp::Remove => {
                remove_pointer(document, &op.path)?;
            }
            PatchOp::Test => {
                let expected = op
                    .value
                    .as_ref()
                    .ok_or_else(|| FhirError::invalid("patch test is missing a value"))?;
                let actual = document.pointer(&op.path);
                if actual != Some(expected) {
                    return Err(FhirError::unprocessable(
                        IssueCode::Value,
                        format!("patch test failed at '{}'", op.path),
                    ));
                }
            }
            PatchOp::Move | PatchOp::Copy => {
                let from = op
                    .from
                    .as_ref()
                    .ok_or_else(|| FhirError::invalid("patch operation is missing 'from'"))?;
                let value = document
                    .pointer(from)
                    .cloned()
                    .ok_or_else(|| {
                        FhirError::unprocessable(
                            IssueCode::Processing,
                            format!("no value at patch source '{from}'"),
                        )
                    })?;
                if op.op == PatchOp::Move {
                    remove_pointer(document, from)?;
                }
                set_pointer(document, &op.path, value)?;
            }
        }
    }
    Ok(())
}

fn set_pointer(
    document: &mut serde_json::Value,
    pointer: &str,
    value: serde_json::Value,
) -> Result<(), FhirError> {
    let (parent, key) = split_pointer(pointer)?;
    let target = document
        .pointer_mut(parent)
        .and_then(serde_json::Value::as_object_mut)
        .ok_or_else(|| {
            FhirError::unprocessable(
                IssueCode::Processing,
                format!("patch target '{pointer}' is not an object field"),
            )
        })?;
    target.insert(key.to_string(), value);
    Ok(())
}

fn remove_pointer(document: &mut serde_json::Value, pointer: &str) -> Result<(), FhirError> {
    let (parent, key) = split_pointer(pointer)?;
    let target = document
        .pointer_mut(parent)
        .and_then(serde_json::Value::as_object_mut)
        .ok_or_else(|| {
            FhirError::unprocessable(
                IssueCode::Processing,
                format!("patch target '{pointer}' is not an object field"),
            )
        })?;
    target.remove(key);
    Ok(())
}

fn split_pointer(pointer: &str) -> Result<(&str, &str), FhirError> {
    pointer
        .rsplit_once('/')
        .ok_or_else(|| FhirError::invalid(format!("'{pointer}' is not a JSON Pointer")))
}

struct Args {
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"patient-server - example Galen FHIR server

USAGE:
    patient-server [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information

ENVIRONMENT VARIABLES:
    GALEN__SERVER__HTTP_ADDR              Bind address (default: 0.0.0.0:8080)
    GALEN__FHIR__VERSION                  FHIR version: R4, R4B, or R5
    GALEN__CAPABILITY_STATEMENT__PUBLISHER Publisher shown in /metadata
"
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "patient_server=info,galen_server=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = args.config {
        info!("Loading configuration from {:?}", path);
        loader = match loader.with_file(&path) {
            Ok(loader) => loader,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        };
    }
    let config = match loader.with_env_prefix("GALEN").load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut provider = FhirProvider::new();
    provider
        .register_create::<Patient, _, _>(patient_create)
        .register_read::<Patient, _, _>(patient_read)
        .register_update::<Patient, _, _>(patient_update)
        .register_patch::<Patient, _, _>(patient_patch)
        .register_delete::<Patient, _, _>(patient_delete)
        .register_search::<Patient, _, _>(patient_search);

    let server = match GalenServer::builder()
        .config(config)
        .add_provider(provider)
        .dependency(Arc::new(PatientStore::default()))
        .build()
    {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to assemble server: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting patient-server on {}", server.config().http_addr());

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
