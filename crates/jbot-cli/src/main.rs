//! Process entry point (spec §4.13): strict startup order — parse argv, load
//! config, load persisted channel/counter state, register transports per
//! config, start the scheduler, then run supervised per-transport receive
//! loops until a shutdown signal arrives. Grounded in
//! `original_source/jbot.go::main`'s ordering (`getopts` -> `parseConfig` ->
//! `createCommands` -> `readSavedData` -> signal registration -> launch
//! transports -> block forever).

mod cli;
mod lifecycle;
mod special_commands;

use std::path::PathBuf;
use std::sync::Arc;

use jbot_core::types::{ChatType, Recipient};
use jbot_core::{ChannelState, ChannelStore, Counters, JbotConfig};
use jbot_dispatch::pipeline::DispatchKernel;
use jbot_dispatch::{builtin_commands, commands::CommandRegistry};
use jbot_rtm::{ProfileCache, RtmAdapter};
use jbot_scheduler::{CveCache, SchedulerEngine};
use jbot_transport::manager::TransportManager;
use jbot_transport::types::{Event, MessageEvent};
use jbot_xmpp::XmppAdapter;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info, warn};

/// Slack-style DM channel ids begin with `D` (spec §4.5 step 3).
const DM_PREFIX: &str = "D";
const SLACK_API_BASE: &str = "https://slack.com/api";

fn main() {
    std::env::set_var("PATH", "/bin:/usr/bin:/sbin:/usr/sbin:/usr/local/bin");

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match cli::parse(&argv) {
        cli::Outcome::Run(args) => args,
        cli::Outcome::Exit(code) => std::process::exit(code),
    };

    init_tracing(args.debug, args.verbosity);

    let config = match JbotConfig::load(&args.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("jbot: failed to load config {}: {e}", args.config_path.display());
            std::process::exit(1);
        }
    };
    info!(config = %config.redacted_summary(), "configuration loaded");

    let rt = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    rt.block_on(run(config));
}

fn init_tracing(debug: bool, verbosity: u8) {
    let level = if debug || verbosity >= 3 {
        "debug"
    } else if verbosity > 0 {
        "info"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: JbotConfig) {
    let channels_path = PathBuf::from(&config.channels_file);
    let counters_path = PathBuf::from(&config.counters_file);

    let store = match ChannelStore::load(&channels_path) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to load channel store from {}: {e}", channels_path.display());
            std::process::exit(1);
        }
    };
    let counters = match Counters::load(&counters_path) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load counters from {}: {e}", counters_path.display());
            std::process::exit(1);
        }
    };
    info!(channels = store.len(), "saved data loaded");

    let store = Arc::new(Mutex::new(store));
    let counters = Arc::new(Mutex::new(counters));

    let registry = CommandRegistry::new(builtin_commands::registry_commands());
    let mention_name = config.mention_name.clone().unwrap_or_default();
    // Self-echo/addressing detection for the legacy transport; the modern
    // transport's adapter already drops its own frames using the id handed
    // back by `rtm.connect` (see `jbot-rtm::adapter::translate`), so this
    // only needs to carry the legacy bare JID.
    let bot_user_id = config.hc_jabber_id.clone().unwrap_or_default();
    let kernel = Arc::new(DispatchKernel::new(registry, bot_user_id, mention_name.clone(), DM_PREFIX.to_string()));

    let mut transports = TransportManager::new();
    if let Some(jid) = config.hc_jabber_id.clone() {
        let password = config
            .hc_password
            .clone()
            .or_else(|| config.hc_oauth_token.clone())
            .unwrap_or_default();
        let rooms: Vec<String> = config.hc_control_channel.clone().into_iter().collect();
        transports.register(Box::new(XmppAdapter::new(jid, password, mention_name.clone(), rooms)));
    }

    let rtm_profiles: Option<Arc<ProfileCache>> = if let Some(token) = config.slack_token.clone() {
        let adapter = RtmAdapter::new(token, SLACK_API_BASE.to_string());
        let profiles = adapter.profiles();
        transports.register(Box::new(adapter));
        Some(profiles)
    } else {
        None
    };

    transports.connect_all().await;
    let transports = Arc::new(Mutex::new(transports));

    let (outbound_tx, outbound_rx) = mpsc::channel::<(Recipient, String)>(256);
    let scheduler = SchedulerEngine::new(Arc::clone(&store), outbound_tx);
    let cve_cache = scheduler.cve_cache();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(scheduler.run(shutdown_rx.clone()));
    tokio::spawn(drain_scheduler_alerts(Arc::clone(&transports), outbound_rx));

    for name in ["xmpp", "rtm"] {
        let registered = transports.lock().await.get(name).is_some();
        if !registered {
            continue;
        }
        spawn_receive_loop(
            name.to_string(),
            Arc::clone(&transports),
            Arc::clone(&store),
            Arc::clone(&counters),
            Arc::clone(&kernel),
            cve_cache.clone(),
            rtm_profiles.clone(),
        );
    }

    let flush_store = Arc::clone(&store);
    let flush_counters = Arc::clone(&counters);
    let flush = move || {
        // `try_lock` rather than an async lock: this closure runs
        // synchronously from the signal handler, which cannot await. The
        // receive loops drop their locks between messages, so an uncontended
        // try_lock here is the overwhelmingly common case.
        match flush_store.try_lock() {
            Ok(guard) => {
                if let Err(e) = guard.save(&channels_path) {
                    error!("failed to persist channel store on shutdown: {e}");
                }
            }
            Err(_) => error!("channel store busy, skipped persisting it on shutdown"),
        }
        match flush_counters.try_lock() {
            Ok(guard) => {
                if let Err(e) = guard.save(&counters_path) {
                    error!("failed to persist counters on shutdown: {e}");
                }
            }
            Err(_) => error!("counters busy, skipped persisting them on shutdown"),
        }
        let _ = shutdown_tx.send(true);
    };

    lifecycle::wait_for_shutdown_signal_and_exit(flush).await;
}

/// Relays alerts the scheduler produced (spec §4.10) out through whichever
/// transport owns the target recipient's chat type.
async fn drain_scheduler_alerts(transports: Arc<Mutex<TransportManager>>, mut outbound_rx: mpsc::Receiver<(Recipient, String)>) {
    while let Some((recipient, text)) = outbound_rx.recv().await {
        let transport_name = match recipient.chat_type {
            ChatType::Xmpp => "xmpp",
            ChatType::Rtm => "rtm",
        };
        let guard = transports.lock().await;
        if let Some(transport) = guard.get(transport_name) {
            if let Err(e) = transport.say(&recipient.reply_to, &text, None).await {
                warn!(transport = transport_name, error = %e, "failed to deliver scheduled alert");
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_receive_loop(
    name: String,
    transports: Arc<Mutex<TransportManager>>,
    store: Arc<Mutex<ChannelStore>>,
    counters: Arc<Mutex<Counters>>,
    kernel: Arc<DispatchKernel>,
    cve_cache: CveCache,
    rtm_profiles: Option<Arc<ProfileCache>>,
) {
    tokio::spawn(async move {
        let supervised_name = name.clone();
        lifecycle::supervise(&supervised_name, move || {
            let transports = Arc::clone(&transports);
            let store = Arc::clone(&store);
            let counters = Arc::clone(&counters);
            let kernel = Arc::clone(&kernel);
            let cve_cache = cve_cache.clone();
            let rtm_profiles = rtm_profiles.clone();
            let name = name.clone();
            async move {
                receive_loop(name, transports, store, counters, kernel, cve_cache, rtm_profiles).await;
            }
        })
        .await;
    });
}

/// Drains one transport's event stream until it ends, routing messages
/// through the dispatch kernel and applying the handful of channel-roster
/// side effects the other [`Event`] variants carry.
#[allow(clippy::too_many_arguments)]
async fn receive_loop(
    name: String,
    transports: Arc<Mutex<TransportManager>>,
    store: Arc<Mutex<ChannelStore>>,
    counters: Arc<Mutex<Counters>>,
    kernel: Arc<DispatchKernel>,
    cve_cache: CveCache,
    rtm_profiles: Option<Arc<ProfileCache>>,
) {
    let mut events_rx = {
        let mut guard = transports.lock().await;
        match guard.get_mut(&name).and_then(|t| t.take_events()) {
            Some(rx) => rx,
            None => {
                warn!(transport = %name, "no event receiver available, ending receive loop");
                return;
            }
        }
    };

    while let Some(event) = events_rx.recv().await {
        match event {
            Event::Message(msg) => {
                if let Err(e) =
                    handle_message_event(&name, &transports, &store, &counters, &kernel, &cve_cache, &rtm_profiles, msg).await
                {
                    error!(transport = %name, error = %e, "error handling inbound message");
                }
            }
            Event::ChannelJoined(joined) => {
                let chat_type = if name == "xmpp" { ChatType::Xmpp } else { ChatType::Rtm };
                let mut store = store.lock().await;
                if store.get_by_id(&joined.channel_id).is_none() {
                    let mut ch = ChannelState::new(joined.name.clone(), joined.channel_id.clone(), chat_type);
                    ch.inviter = joined.inviter.unwrap_or_default();
                    store.insert(ch);
                    info!(transport = %name, channel = %joined.channel_id, "joined new channel");
                }
            }
            Event::ChannelRename(renamed) => {
                let mut store = store.lock().await;
                if let Some(old_name) = store.get_by_id(&renamed.channel_id).map(|ch| ch.name.clone()) {
                    if let Some(mut ch) = store.remove_by_name(&old_name) {
                        ch.name = renamed.new_name.clone();
                        store.insert(ch);
                    }
                }
            }
            Event::UserChange(change) => {
                if let Some(profiles) = &rtm_profiles {
                    profiles.invalidate(&change.user_id);
                }
            }
            Event::RateLimit(rl) => {
                warn!(transport = %name, retry_after_secs = rl.retry_after_secs, "transport rate limited, backing off");
            }
            Event::AuthError(err) => {
                error!(transport = %name, reason = %err.reason, "transport authentication error");
            }
            Event::Invite(invite) => {
                info!(transport = %name, from = %invite.from, channel = %invite.channel_id, "received room invite");
            }
        }
    }

    warn!(transport = %name, "event stream ended");
}

async fn handle_message_event(
    name: &str,
    transports: &Arc<Mutex<TransportManager>>,
    store: &Arc<Mutex<ChannelStore>>,
    counters: &Arc<Mutex<Counters>>,
    kernel: &Arc<DispatchKernel>,
    cve_cache: &CveCache,
    rtm_profiles: &Option<Arc<ProfileCache>>,
    msg: MessageEvent,
) -> anyhow::Result<()> {
    let recipient = resolve_recipient(name, rtm_profiles, &msg).await?;
    let Some(recipient) = recipient else {
        // `message_changed` unfurl echo, already filtered by the adapter,
        // or a transport we don't know how to resolve a sender for.
        return Ok(());
    };

    if let Some(reply) = maybe_special_command(&msg.text, &recipient.mention_name, counters, cve_cache).await {
        let guard = transports.lock().await;
        if let Some(transport) = guard.get(name) {
            transport.say(&msg.channel, &reply, None).await?;
        }
        return Ok(());
    }

    let mut store_guard = store.lock().await;
    let mut counters_guard = counters.lock().await;
    let transports_guard = transports.lock().await;
    let Some(transport) = transports_guard.get(name) else {
        return Ok(());
    };
    kernel
        .handle_message(transport, &mut store_guard, &mut counters_guard, &recipient, &msg.channel, &msg.text)
        .await?;
    Ok(())
}

/// Builds the [`Recipient`] for an inbound message. The modern transport
/// needs an async profile lookup (real name, mention name); the legacy
/// transport's JID resolution already happened inside the adapter, so this
/// just rebuilds the already-resolved identity from the event fields.
async fn resolve_recipient(
    name: &str,
    rtm_profiles: &Option<Arc<ProfileCache>>,
    msg: &MessageEvent,
) -> anyhow::Result<Option<Recipient>> {
    if name == "rtm" {
        let Some(profiles) = rtm_profiles else {
            return Ok(None);
        };
        let profile = profiles.lookup(&msg.from_user).await?;
        Ok(Some(jbot_rtm::resolver::resolve(&profile, &msg.channel, &msg.ts, &msg.thread_ts)))
    } else {
        Ok(Some(Recipient {
            chat_type: ChatType::Xmpp,
            user_id: msg.from_user.clone(),
            mention_name: String::new(),
            real_name: String::new(),
            reply_to: msg.channel.clone(),
            thread_ts: msg.thread_ts.clone(),
        }))
    }
}

/// `!top`/`!cve`: intercepted here, ahead of [`DispatchKernel::handle_message`],
/// because they need state (`Counters`, the scheduler's CVE cache) that
/// doesn't fit [`jbot_core::types::CommandFn`]'s per-channel signature (see
/// `special_commands` and DESIGN.md). Only the literal `!` prefix form is
/// recognized — matching the bang-command grammar, not bare-mention chatter.
async fn maybe_special_command(text: &str, mention_name: &str, counters: &Arc<Mutex<Counters>>, cve_cache: &CveCache) -> Option<String> {
    let line = text.strip_prefix('!')?;
    let parsed = jbot_core::args::parse_command(line, mention_name)?;
    match parsed.name.as_str() {
        "top" => {
            let counters = counters.lock().await;
            Some(special_commands::top(&counters, parsed.args.first().map(String::as_str).unwrap_or("")))
        }
        "cve" => Some(special_commands::cve(cve_cache, parsed.args.first().map(String::as_str).unwrap_or(""))),
        _ => None,
    }
}
