use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use xydra_core::authorisation::{
    access_read, access_write, all_actors, MemoryAuthorisationManager, MemoryGroupDatabase,
};
use xydra_core::config::{MapperKind, SyncConfig};
use xydra_core::model::{CommandResult, Intent, ModelSnapshot, XAddress, XCommand, XId};
use xydra_core::sync::remote::Persistence;
use xydra_core::sync::{
    CommandCallback, MemoryPersistence, PersistenceRemoteStore, Replica, SyncReport, Syncer,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON file with a `SyncConfig`; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    actor: Option<String>,

    #[arg(long, default_value_t = 2)]
    rounds: u32,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long, value_enum)]
    mapper: Option<MapperKind>,
}

impl Args {
    fn sync_config(&self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SyncConfig::default(),
        };
        if let Some(actor) = &self.actor {
            config.actor = actor.clone();
        }
        if let Some(timeout) = self.timeout_ms {
            config.round_timeout_ms = timeout;
        }
        if let Some(mapper) = self.mapper {
            config.mapper = mapper;
        }
        Ok(config)
    }
}

/// Prints how each submitted command ended.
struct PrintOutcome(String);

impl CommandCallback for PrintOutcome {
    fn on_success(&self, result: CommandResult) {
        println!("  [{}] -> {:?}", self.0, result);
    }

    fn on_failure(&self) {
        println!("  [{}] -> FAILED (conflict)", self.0);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.sync_config()?;

    println!("[MAIN] actor={} mapper={:?} timeout={}ms", config.actor, config.mapper, config.round_timeout_ms);

    let model: XAddress = "/demo/notes".parse()?;
    let access = access_demo(&model, &config.actor)?;

    let persistence = Arc::new(MemoryPersistence::new());
    persistence.create_model(model.clone())?;
    let remote = Arc::new(PersistenceRemoteStore::new(persistence.clone()).with_access_control(access));

    let other = SyncConfig {
        actor: "bob".to_string(),
        ..config.clone()
    };
    let mine = syncer(&remote, &persistence, &model, &config)?;
    let theirs = syncer(&remote, &persistence, &model, &other)?;

    let (todo, title) = (XId::new("todo")?, XId::new("title")?);
    let todo_address = model.child(todo.clone()).context("object address")?;
    let title_address = todo_address.child(title.clone()).context("field address")?;

    let t0 = Instant::now();
    submit(&mine, XCommand::add_object(&model, todo.clone()), "add todo")?;
    submit(&mine, XCommand::add_field(&todo_address, title.clone()), "add title")?;
    submit(&theirs, XCommand::add_object(&model, todo.clone()), "bob: add todo")?;

    for round in 1..=args.rounds {
        println!("\n[MAIN] round {}", round);

        let field_revision = theirs
            .replica()
            .read(|m| m.snapshot().field(&todo, &title).map(|f| f.revision));
        if let Some(revision) = field_revision {
            // both race for the same field revision; the later one conflicts
            let value = json!(format!("written in round {}", round));
            let guarded = XCommand::set_value(&title_address, Some(value)).with_intent(Intent::Safe(revision));
            submit(&mine, guarded.clone(), "guarded set")?;
            submit(&theirs, guarded, "bob: guarded set")?;
        }

        print_report(&config.actor, mine.synchronize().await?);
        print_report("bob", theirs.synchronize().await?);
    }
    print_report(&config.actor, mine.synchronize().await?);

    let server = persistence
        .get_model_snapshot(&model)
        .context("model vanished from the store")?;
    println!("\n[MAIN] done in {:?}", t0.elapsed());
    println!("[MAIN] converged: {}", mine.replica().snapshot() == server && theirs.replica().snapshot() == server);
    println!("{}", serde_json::to_string_pretty(&server)?);
    Ok(())
}

fn syncer(
    remote: &Arc<PersistenceRemoteStore<MemoryPersistence>>,
    persistence: &MemoryPersistence,
    model: &XAddress,
    config: &SyncConfig,
) -> Result<Syncer<PersistenceRemoteStore<MemoryPersistence>>> {
    let snapshot = match persistence.get_model_snapshot(model) {
        Some(snapshot) => snapshot,
        None => ModelSnapshot::new(model.clone())?,
    };
    Ok(Syncer::new(remote.clone(), Replica::new(snapshot), config.mapper.build(), config)?)
}

fn submit<R: xydra_core::sync::RemoteStore>(syncer: &Syncer<R>, command: XCommand, label: &str) -> Result<()> {
    let callback = Arc::new(PrintOutcome(label.to_string()));
    let actor = syncer.actor().clone();
    let local = syncer.replica().execute_command(&actor, command, Some(callback))?;
    println!("  [{}] local: {:?}", label, local);
    Ok(())
}

fn print_report(actor: &str, report: SyncReport) {
    println!(
        "  {} synced to r{}: applied={} no_change={} failed={} events={} lost={}",
        actor,
        report.synchronized_revision,
        report.applied,
        report.no_change,
        report.failed,
        report.server_events,
        report.sync_lost
    );
}

/// Everybody reads, `actor` and bob write, and a denied sub-tree shows the resolver at work.
fn access_demo(model: &XAddress, actor: &str) -> Result<Arc<MemoryAuthorisationManager>> {
    let groups = Arc::new(MemoryGroupDatabase::new());
    let writers = XId::new("writers")?;
    groups.add_to_group(XId::new(actor)?, writers.clone());
    groups.add_to_group(XId::new("bob")?, writers.clone());

    let manager = Arc::new(MemoryAuthorisationManager::new(groups));
    manager.set_access(&all_actors(), model, &access_read(), true);
    manager.set_access(&writers, model, &access_write(), true);

    let secret = model.child(XId::new("secret")?).context("object address")?;
    manager.set_access(&all_actors(), &secret, &access_read(), false);

    for who in [actor, "bob", "eve"] {
        let id = XId::new(who)?;
        println!(
            "[AUTH] {}: read {} write {} secret {}",
            who,
            manager.has_access(&id, model, &access_read()),
            manager.has_access(&id, model, &access_write()),
            manager.has_access(&id, &secret, &access_read()),
        );
    }
    Ok(manager)
}
