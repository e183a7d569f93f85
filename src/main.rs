//! bridgewallet - Operator CLI
//!
//! Run modes:
//!   bridgewallet derive                  - Show wallet id and Ethereum address
//!   bridgewallet generate                - Create a new mnemonic
//!   bridgewallet descriptors             - Print the four account descriptors
//!   bridgewallet reconcile               - Import descriptors into the node
//!   bridgewallet bridge ...              - Build (and optionally send) a bridge transaction
//!   bridgewallet consolidate             - Sweep small UTXOs
//!   bridgewallet resume | status | clear - Manage consolidation progress
//!   bridgewallet monitor                 - Follow chain and rescan progress

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use bitcoin::Amount;
use bridgewallet::bridge::{BridgeConfig, BridgeRequest, BridgeTxBuilder};
use bridgewallet::common::{init_from_config, EngineConfig, EngineError, Result};
use bridgewallet::consolidation::{ConsolidationStore, ConsolidatorConfig, UtxoConsolidator};
use bridgewallet::descriptors::{
    derive_descriptors, DescriptorReconciler, ReconcileObserver, ReconcileState,
    ReconcilerConfig, ScanProgress, SyncMonitor, SyncObserver, SyncStatus,
};
use bridgewallet::keys::{derive_wallet_keys, generate_wallet, DEFAULT_WORD_COUNT};
use bridgewallet::rpc::{ensure_wallet_loaded, JsonRpcClient, RpcError, WalletRpc};
use bridgewallet::storage::{IdentityCache, KeyValueStore, MemoryKvStore, SqliteKvStore};
use bridgewallet::units;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(2);
        }
    };

    if let Err(e) = init_from_config(&config) {
        eprintln!("Warning: {}", e);
    }

    let rest = &args[2..];
    let result = match args[1].as_str() {
        "derive" => run_derive(&config, rest),
        "generate" => run_generate(rest),
        "descriptors" => run_descriptors(&config),
        "reconcile" => run_reconcile(&config).await,
        "bridge" => run_bridge(&config, rest).await,
        "consolidate" => run_consolidate(&config, rest).await,
        "resume" => run_resume(&config).await,
        "status" => run_status(&config).await,
        "clear" => run_clear(&config).await,
        "monitor" => run_monitor(&config, rest).await,
        "config" => {
            config.print_summary();
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        if let EngineError::Bridge(bridge_err) = &e {
            eprintln!("  {}", bridge_err.remediation());
        }
        process::exit(1);
    }
}

fn print_usage() {
    println!("bridgewallet - Deterministic Bridge Wallet Engine");
    println!();
    println!("Usage:");
    println!("  bridgewallet derive [--json]                       Show wallet id and Ethereum address");
    println!("  bridgewallet generate [--words <n>]                Create a new mnemonic (default: 24 words)");
    println!("  bridgewallet descriptors                           Print the account descriptors");
    println!("  bridgewallet reconcile                             Import descriptors into the node wallet");
    println!("  bridgewallet bridge <dest> <amount> <return-addr> [--broadcast]");
    println!("                                                     Build a bridge transaction");
    println!("  bridgewallet consolidate [--max-inputs <n>]        Consolidate UTXOs (default: 900 per tx)");
    println!("  bridgewallet resume                                Resume an interrupted consolidation");
    println!("  bridgewallet status                                Show consolidation progress");
    println!("  bridgewallet clear                                 Forget consolidation progress");
    println!("  bridgewallet monitor [--interval <secs>]           Follow chain sync and rescans");
    println!("  bridgewallet config                                Print the loaded configuration");
    println!();
    println!("Amounts are in BTC, or in satoshis with a 'sat' suffix (e.g. 250000sat).");
    println!();
    println!("Environment Variables:");
    println!("  BRIDGEWALLET_MNEMONIC       Wallet mnemonic");
    println!("  BRIDGEWALLET_NETWORK        mainnet | testnet | regtest (default: regtest)");
    println!("  BRIDGEWALLET_RPC_URL        Node RPC endpoint");
    println!("  BRIDGEWALLET_RPC_USER       Node RPC user");
    println!("  BRIDGEWALLET_RPC_PASSWORD   Node RPC password");
    println!("  BRIDGEWALLET_WALLET_NAME    Node wallet (default: bridge)");
    println!("  BRIDGEWALLET_DB_PATH        SQLite state file (default: in-memory)");
    println!("  BRIDGEWALLET_LOG_LEVEL      trace | debug | info | warn | error");
}

/// Value following `flag`, if present
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i].starts_with("--") {
            // --broadcast and --json take no value
            i += if matches!(args[i].as_str(), "--broadcast" | "--json") { 1 } else { 2 };
        } else {
            out.push(args[i].as_str());
            i += 1;
        }
    }
    out
}

fn node_client(config: &EngineConfig) -> Result<Arc<dyn WalletRpc>> {
    Ok(Arc::new(JsonRpcClient::from_settings(&config.rpc)?))
}

fn open_store(config: &EngineConfig) -> Result<Arc<dyn KeyValueStore>> {
    match &config.db_path {
        Some(path) => Ok(Arc::new(SqliteKvStore::new(path)?)),
        None => Ok(Arc::new(MemoryKvStore::new())),
    }
}

fn run_derive(config: &EngineConfig, args: &[String]) -> Result<()> {
    let keys = derive_wallet_keys(config.require_mnemonic()?)?;

    if has_flag(args, "--json") {
        let json = serde_json::to_string_pretty(&keys.identity)
            .map_err(|e| EngineError::validation(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    println!("Wallet ID:          {}", keys.identity.wallet_id);
    println!("Ethereum Address:   {}", keys.identity.eth_address);
    println!("Master Fingerprint: {}", keys.master.fingerprint());
    println!("Master Public Key:  {}", hex::encode(keys.master.public_key_bytes()));
    Ok(())
}

fn run_generate(args: &[String]) -> Result<()> {
    let words = match flag_value(args, "--words") {
        Some(raw) => raw
            .parse()
            .map_err(|_| EngineError::validation(format!("invalid word count '{}'", raw)))?,
        None => DEFAULT_WORD_COUNT,
    };

    let keys = generate_wallet(words)?;

    println!("Mnemonic:         {}", keys.mnemonic);
    println!("Wallet ID:        {}", keys.identity.wallet_id);
    println!("Ethereum Address: {}", keys.identity.eth_address);
    println!();
    println!("Store the mnemonic offline. It is the only backup of this wallet.");
    Ok(())
}

fn run_descriptors(config: &EngineConfig) -> Result<()> {
    let keys = derive_wallet_keys(config.require_mnemonic()?)?;
    let descriptors = derive_descriptors(&keys.master)?;

    let json = serde_json::to_string_pretty(&descriptors)
        .map_err(|e| EngineError::validation(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

/// Prints reconciler progress to the terminal
struct ConsoleProgress;

impl ReconcileObserver for ConsoleProgress {
    fn on_state(&self, state: ReconcileState) {
        println!("  state: {:?}", state);
    }

    fn on_progress(&self, progress: &ScanProgress) {
        println!(
            "  node busy: {:.1}% ({} / {} blocks, {}s)",
            progress.progress * 100.0,
            progress.blocks,
            progress.headers,
            progress.elapsed.as_secs()
        );
    }
}

async fn run_reconcile(config: &EngineConfig) -> Result<()> {
    let keys = derive_wallet_keys(config.require_mnemonic()?)?;
    let rpc = node_client(config)?;

    if ensure_wallet_loaded(rpc.as_ref(), &config.rpc.wallet_name).await? {
        println!("Created wallet '{}'", config.rpc.wallet_name);
    }

    let reconciler = DescriptorReconciler::new(
        rpc,
        ReconcilerConfig {
            max_retries: config.reconcile_max_retries,
            retry_backoff: config.reconcile_backoff,
            poll_interval: config.scan_poll_interval,
            ..Default::default()
        },
    )
    .with_observer(Arc::new(ConsoleProgress));

    println!("=== Descriptor Reconciliation ===");
    let report = reconciler.reconcile_master(&keys.master).await?;

    println!();
    println!("Imported:    {}", report.imported);
    println!("Deactivated: {}", report.deactivated);
    println!("Retries:     {}", report.retries);
    Ok(())
}

async fn run_bridge(config: &EngineConfig, args: &[String]) -> Result<()> {
    let operands = positional(args);
    let [destination, amount, return_address] = operands[..] else {
        return Err(EngineError::validation(
            "usage: bridge <destination> <amount> <return-address> [--broadcast]",
        ));
    };

    let amount = units::parse_amount(amount)
        .ok_or_else(|| EngineError::validation(format!("invalid amount '{}'", amount)))?;

    let mnemonic = config.require_mnemonic()?;
    let identity = IdentityCache::new(open_store(config)?)
        .resolve(&config.rpc.wallet_name, mnemonic)
        .await?;

    let builder = BridgeTxBuilder::new(
        node_client(config)?,
        identity.wallet_id,
        BridgeConfig {
            fee: Amount::from_sat(config.bridge_fee_sats),
            ..Default::default()
        },
    );

    let request = BridgeRequest {
        destination: destination.to_string(),
        amount,
        return_address: return_address.to_string(),
    };

    let tx = builder.build(&request).await?;

    println!("=== Bridge Transaction ===");
    println!("Amount:  {}", units::amount_to_display(amount));
    println!("Fee:     {}", units::amount_to_display(tx.fee));
    match tx.change {
        Some(change) => println!("Change:  {}", units::amount_to_display(change)),
        None => println!("Change:  none (absorbed into fee)"),
    }
    println!("Inputs:  {}", tx.inputs.len());
    println!("Payload: {}", tx.payload_hex);
    println!();

    if has_flag(args, "--broadcast") {
        let txid = builder.broadcast(&tx).await?;
        println!("Broadcast: {}", txid);
    } else {
        println!("{}", tx.hex);
    }
    Ok(())
}

fn consolidator(config: &EngineConfig) -> Result<UtxoConsolidator> {
    Ok(UtxoConsolidator::new(
        node_client(config)?,
        ConsolidationStore::new(open_store(config)?),
        config.rpc.wallet_name.clone(),
        ConsolidatorConfig {
            fee_rate: config.consolidation_fee_rate,
            delay: config.consolidation_delay,
            ..Default::default()
        },
    ))
}

async fn run_consolidate(config: &EngineConfig, args: &[String]) -> Result<()> {
    let max_inputs = match flag_value(args, "--max-inputs") {
        Some(raw) => raw
            .parse()
            .map_err(|_| EngineError::validation(format!("invalid input count '{}'", raw)))?,
        None => config.consolidation_max_inputs,
    };

    let sent = consolidator(config)?.consolidate_all(max_inputs).await?;
    println!("Consolidation transactions sent: {}", sent);
    Ok(())
}

async fn run_resume(config: &EngineConfig) -> Result<()> {
    match consolidator(config)?.resume().await? {
        Some(sent) => println!("Resumed consolidation, transactions sent: {}", sent),
        None => println!("No unfinished consolidation for '{}'", config.rpc.wallet_name),
    }
    Ok(())
}

async fn run_status(config: &EngineConfig) -> Result<()> {
    match consolidator(config)?.status().await? {
        Some(state) => {
            println!("Wallet:       {}", state.wallet_name);
            println!("Transactions: {}", state.consolidation_count);
            println!("Inputs/tx:    {}", state.max_inputs_per_tx);
            println!("Complete:     {}", state.is_complete);
        }
        None => println!("No consolidation recorded for '{}'", config.rpc.wallet_name),
    }
    Ok(())
}

async fn run_clear(config: &EngineConfig) -> Result<()> {
    if consolidator(config)?.clear().await? {
        println!("Cleared consolidation state for '{}'", config.rpc.wallet_name);
    } else {
        println!("Nothing to clear");
    }
    Ok(())
}

/// Prints sync status to the terminal
struct ConsoleSync;

impl SyncObserver for ConsoleSync {
    fn on_status(&self, status: &SyncStatus) {
        match status.wallet_scan_progress {
            Some(progress) => println!(
                "blocks {}/{}  rescanning {:.1}%",
                status.blocks,
                status.headers,
                progress * 100.0
            ),
            None => println!(
                "blocks {}/{}  verification {:.2}%{}",
                status.blocks,
                status.headers,
                status.verification_progress * 100.0,
                if status.is_caught_up() { "  (synced)" } else { "" }
            ),
        }
    }

    fn on_error(&self, error: &RpcError) {
        eprintln!("poll failed: {}", error);
    }
}

async fn run_monitor(config: &EngineConfig, args: &[String]) -> Result<()> {
    let interval = match flag_value(args, "--interval") {
        Some(raw) => Duration::from_secs(
            raw.parse()
                .map_err(|_| EngineError::validation(format!("invalid interval '{}'", raw)))?,
        ),
        None => config.sync_interval,
    };

    let monitor = SyncMonitor::new(node_client(config)?, interval);
    monitor.subscribe(Arc::new(ConsoleSync)).await;
    monitor.start();

    println!("Monitoring '{}' every {}s, Ctrl+C to stop", config.rpc.wallet_name, interval.as_secs());
    tokio::signal::ctrl_c().await?;

    monitor.stop();
    Ok(())
}
