//! Startup wiring demo
//!
//! Registers a small account service graph, resolves it and prints the
//! container report. Run with `RUST_LOG=keystone_core=debug` to see the
//! container's own logging.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use keystone_core::container::{Container, Lifecycle, Resolution, Shape};
use keystone_core::{ContainerConfig, CoreError, Injectable};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug)]
struct Settings {
    default_balance: i64,
}

trait AccountRepository: Send + Sync {
    fn open(&self, owner: &str, balance: i64);
    fn balance(&self, owner: &str) -> Option<i64>;
}

#[derive(Debug, Default)]
struct AccountRepositoryImpl {
    balances: RwLock<HashMap<String, i64>>,
}

impl AccountRepository for AccountRepositoryImpl {
    fn open(&self, owner: &str, balance: i64) {
        if let Ok(mut balances) = self.balances.write() {
            balances.insert(owner.to_string(), balance);
        }
    }

    fn balance(&self, owner: &str) -> Option<i64> {
        self.balances.read().ok()?.get(owner).copied()
    }
}

#[derive(Debug)]
struct AuditLog;

#[derive(Debug)]
struct ClockImpl;

struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    settings: Arc<Settings>,
    audit: Option<Arc<AuditLog>>,
}

impl Injectable for AccountService {
    fn shape() -> Shape<Self> {
        Shape::new(|wiring| {
            Ok(AccountService {
                accounts: wiring.get("accounts")?,
                settings: wiring.get("settings")?,
                audit: wiring.get("audit")?,
            })
        })
        .inject("accounts", "AccountRepository")
        .inject("settings", "Settings")
        .inject_optional("audit", "AuditLog")
    }
}

impl AccountService {
    fn open(&self, owner: &str) -> i64 {
        self.accounts.open(owner, self.settings.default_balance);
        self.settings.default_balance
    }
}

fn main() -> Result<(), CoreError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let container = Container::with_config(ContainerConfig::from_env()?);

    container.register_instance("Settings", Settings { default_balance: 100 })?;
    container.register_interface("AccountRepository", Lifecycle::Singleton, |_: &Resolution<'_>| {
        Ok::<Arc<dyn AccountRepository>, CoreError>(Arc::new(AccountRepositoryImpl::default()))
    })?;
    let clock = container.register_typed(Lifecycle::Transient, || {
        Ok::<_, CoreError>(ClockImpl)
    })?;
    let service = container.register_injectable::<AccountService>(Lifecycle::Transient)?;
    container.register_with("Greeting", Lifecycle::Transient, |cx: &Resolution<'_>| {
        let settings = cx.resolve_typed::<Settings>("Settings")?;
        Ok::<_, CoreError>(format!("Welcome! New accounts start at {}", settings.default_balance))
    })?;

    if let Err(errors) = container.validate() {
        for error in &errors {
            tracing::error!("{}", error);
        }
    }

    let accounts = container.must_resolve_typed::<AccountService>(&service);
    let opened = accounts.open("ada");
    tracing::info!("Opened account for ada with balance {}", opened);
    tracing::info!("Audit log attached: {}", accounts.audit.is_some());

    let repo = container.resolve_typed::<dyn AccountRepository>("AccountRepository")?;
    tracing::info!("Repository sees balance {:?}", repo.balance("ada"));
    tracing::info!("{}", container.resolve_typed::<String>("Greeting")?);
    tracing::info!("Clock registered as '{}': {}", clock, container.is_registered("Clock"));

    println!("{}", container.report()?);
    Ok(())
}
