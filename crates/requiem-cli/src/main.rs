#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "test assertions favor directness over propagation"
    )
)]
// crates/requiem-cli/src/main.rs
// ============================================================================
// Module: Requiem CLI Entry Point
// Description: Composition root wiring the registry, ledger, and RPC server
//              into a single stdio-served process.
// Purpose: Own spec §6's environment-variable resolution and exit-code
//          contract for ops tooling invoking the core.
// Dependencies: clap, requiem_core, requiem_ledger, requiem_registry,
//               requiem_rpc, requiem_tenant, tokio
// ============================================================================

//! ## Overview
//! `requiem serve` resolves `REQUIEM_TENANT_ID`/`REQUIEM_API_KEY` into a
//! single [`requiem_core::context::InvocationContext`] once at startup, wires
//! a fresh in-process [`requiem_registry::registry::ToolRegistry`],
//! [`requiem_registry::budget::BudgetAccountant`],
//! [`requiem_ledger::InMemoryLedger`], and
//! [`requiem_ledger::FilePolicySnapshotSource`] behind an
//! [`requiem_registry::gate::InvocationGate`], and runs the stdio JSON-RPC
//! loop over real stdin/stdout until EOF. Registering tool handlers is a
//! host/embedder concern left to whatever links this binary against a
//! concrete set of handlers; this process ships the runtime, not example
//! tools.
//!
//! Exit codes follow spec §6's ops-tooling contract: `0` success, `2`
//! user/input error (bad environment configuration or failed credential
//! resolution), `3` invariant or determinism violation, `4` system error.
//! Code `3` is never produced by `serve`: every integrity-class failure the
//! gate can raise is already returned to the RPC caller as a per-call
//! JSON-RPC error, and the wire's error-code table (spec §4.11) deliberately
//! collapses every integrity kind to the same generic code as an ordinary
//! resource error, so this process has no wire-observable signal of its own
//! to escalate into a process exit.

mod auth;
mod config;
mod context;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use requiem_core::budget::BudgetLimit;
use requiem_core::context::Environment;
use requiem_core::identifiers::RequestId;
use requiem_core::identifiers::TraceId;
use requiem_core::time::Clock;
use requiem_core::time::SystemClock;
use requiem_ledger::DivergenceSentinel;
use requiem_ledger::FilePolicySnapshotSource;
use requiem_ledger::InMemoryCas;
use requiem_ledger::InMemoryLedger;
use requiem_registry::budget::BudgetAccountant;
use requiem_registry::gate::DivergenceRecorder;
use requiem_registry::gate::InvocationGate;
use requiem_registry::gate::LedgerSink;
use requiem_registry::gate::PolicySnapshotSource;
use requiem_registry::gate::ReplayStore;
use requiem_registry::registry::ToolRegistry;
use requiem_rpc::RpcServer;
use requiem_tenant::resolve_from_cli;

use crate::auth::EnvApiKeyVerifier;
use crate::config::ENTERPRISE_MAX_COST_UNITS;
use crate::config::RuntimeConfig;
use crate::context::CliRequestContextFactory;

/// Cost units a tenant may spend per window with no `REQUIEM_ENTERPRISE`
/// override.
const DEFAULT_FREE_TIER_MAX_COST_UNITS: u64 = 1_000;

/// Budget window length applied to both tiers.
const BUDGET_WINDOW_SECONDS: u64 = 60;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "requiem", disable_help_subcommand = true, arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the stdio JSON-RPC tool-execution server.
    Serve,
}

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve => command_serve().await,
    }
}

/// Executes the `serve` command: resolves identity, wires the runtime, and
/// drives the stdio JSON-RPC loop to completion.
async fn command_serve() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(err) => return fail_user_error(&err.to_string()),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let verifier = EnvApiKeyVerifier::new(config.tenant_id.clone(), config.api_key.clone());
    let startup_ctx = match resolve_from_cli(
        &config.tenant_id,
        &config.api_key,
        &verifier,
        RequestId::new("requiem-cli-startup"),
        TraceId::new("requiem-cli-startup"),
        Environment::Production,
        clock.now_millis(),
    ) {
        Ok(ctx) => ctx,
        Err(err) => return fail_user_error(&err.into_envelope(clock.now_millis()).message),
    };

    if config.assertions_enabled {
        warn_assertions_enabled();
    }

    let registry = Arc::new(ToolRegistry::new());
    let ledger: Arc<dyn LedgerSink> = Arc::new(InMemoryLedger::new());
    let policy: Arc<dyn PolicySnapshotSource> = Arc::new(FilePolicySnapshotSource::new());
    let cas: Arc<dyn ReplayStore> = Arc::new(InMemoryCas::new());
    let sentinel: Arc<dyn DivergenceRecorder> = Arc::new(DivergenceSentinel::with_noop_observer());
    let budget_limit = budget_limit_for(&config);
    let budget = Arc::new(BudgetAccountant::new(budget_limit));
    let gate = Arc::new(InvocationGate::new(
        registry.clone(),
        budget,
        ledger.clone(),
        policy,
        cas,
        sentinel,
        clock.clone(),
        config.tool_output_max_bytes,
    ));
    let context_factory = Arc::new(CliRequestContextFactory::new(
        startup_ctx.tenant_id,
        startup_ctx.user_id,
        startup_ctx.role,
        startup_ctx.environment,
        clock.clone(),
    ));
    let server = RpcServer::new(registry, gate, ledger, clock, context_factory, config.trigger_data_max_bytes);

    server.run(tokio::io::BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await;
    ExitCode::from(0)
}

/// Chooses the tenant's budget ceiling for the window, per
/// `REQUIEM_ENTERPRISE`.
fn budget_limit_for(config: &RuntimeConfig) -> BudgetLimit {
    let max_cost_units =
        if config.enterprise { ENTERPRISE_MAX_COST_UNITS } else { DEFAULT_FREE_TIER_MAX_COST_UNITS };
    BudgetLimit { max_cost_units, window_seconds: BUDGET_WINDOW_SECONDS }
}

/// Writes a sanitized error message to stderr and returns exit code `2`
/// (user/input error).
fn fail_user_error(message: &str) -> ExitCode {
    #[allow(clippy::print_stderr, reason = "startup failures must be visible to the operator")]
    {
        eprintln!("[requiem] {message}");
    }
    ExitCode::from(2)
}

/// Notes that invariant assertions are enabled; informational only, never
/// gates behavior elsewhere in this process.
fn warn_assertions_enabled() {
    #[allow(clippy::print_stderr, reason = "REQUIEM_ASSERTIONS opts into operator-visible diagnostics")]
    {
        eprintln!("[requiem] runtime invariant assertions enabled (REQUIEM_ASSERTIONS=true)");
    }
}
