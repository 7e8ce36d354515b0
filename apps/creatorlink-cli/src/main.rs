use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Local, Utc};
use clap::{Parser, Subcommand};
use creatorlink_store::{Profile, Store, StoreConfig};
use creatorlink_sync::{
    filter_and_group, format_label, Message, ParticipantRole, StatusFilter, SyncConfig,
    ThreadEvent, ThreadSynchronizer,
};
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEMO_CREATOR: &str = "creator-1";
const DEMO_BRAND: &str = "brand-1";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = "creatorlink.db")]
    db: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a viewer's conversations grouped by recency
    Inbox {
        #[arg(long)]
        viewer: String,
        #[arg(long)]
        role: ParticipantRole,
        /// Case-insensitive text to match
        #[arg(long, default_value = "")]
        search: String,
        /// all, unread or archived
        #[arg(long, default_value = "all")]
        filter: StatusFilter,
    },
    /// Open a conversation, print it and mark it read
    Thread {
        #[arg(long)]
        viewer: String,
        #[arg(long)]
        conversation: String,
    },
    /// Send a message
    Send {
        #[arg(long)]
        conversation: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        text: String,
    },
    /// Archive a conversation for one side
    Archive {
        #[arg(long)]
        conversation: String,
        #[arg(long)]
        role: ParticipantRole,
    },
    /// Restore an archived conversation for one side
    Unarchive {
        #[arg(long)]
        conversation: String,
        #[arg(long)]
        role: ParticipantRole,
    },
    /// Create demo profiles, conversations and messages
    Seed,
    /// Seed, open a thread and watch a live message arrive
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();

    let store = Store::open(StoreConfig {
        db_path: args.db.clone(),
        ..Default::default()
    })
    .await
    .with_context(|| format!("Failed to open store at {}", args.db.display()))?;
    let config = SyncConfig::default();

    match args.command {
        Command::Inbox {
            viewer,
            role,
            search,
            filter,
        } => print_inbox(&store, &config, &viewer, role, &search, filter).await,
        Command::Thread {
            viewer,
            conversation,
        } => print_thread(&store, config, &viewer, &conversation).await,
        Command::Send {
            conversation,
            from,
            to,
            text,
        } => {
            let message = store
                .messages
                .send(&conversation, &from, &to, &text)
                .await
                .context("Failed to send message")?;
            println!("Sent {}", message.id);
            Ok(())
        }
        Command::Archive { conversation, role } => {
            store
                .conversations
                .set_archived(&conversation, role, true)
                .await
                .context("Failed to archive conversation")?;
            println!("Archived {} for {}", conversation, role);
            Ok(())
        }
        Command::Unarchive { conversation, role } => {
            store
                .conversations
                .set_archived(&conversation, role, false)
                .await
                .context("Failed to unarchive conversation")?;
            println!("Unarchived {} for {}", conversation, role);
            Ok(())
        }
        Command::Seed => {
            let conversation = seed(&store).await?;
            println!("Seeded conversation {}", conversation);
            println!("Try: creatorlink inbox --viewer {} --role creator", DEMO_CREATOR);
            Ok(())
        }
        Command::Demo => demo(&store, config).await,
    }
}

async fn print_inbox(
    store: &Store,
    config: &SyncConfig,
    viewer: &str,
    role: ParticipantRole,
    search: &str,
    filter: StatusFilter,
) -> Result<()> {
    let conversations = store
        .conversations
        .list_for_viewer(viewer, role)
        .await
        .context("Failed to list conversations")?;

    let now = Local::now();
    let groups = filter_and_group(&conversations, search, filter, &now, config.week_start);
    if groups.is_empty() {
        println!("No conversations");
        return Ok(());
    }

    for group in groups {
        println!("{}", group.bucket);
        for conversation in group.conversations {
            let marker = if conversation.unread { "*" } else { " " };
            let campaign = conversation
                .campaign_name
                .as_deref()
                .map(|c| format!(" [{}]", c))
                .unwrap_or_default();
            println!(
                " {} {:<10} {} ({}){}  {}",
                marker,
                format_label(conversation.last_message_at, &now, config.week_start),
                conversation.participant_name,
                conversation.participant_handle,
                campaign,
                conversation.id
            );
            if !conversation.last_message.is_empty() {
                println!("              {}", conversation.last_message);
            }
        }
    }
    Ok(())
}

fn print_message(message: &Message, config: &SyncConfig) {
    let name = match message.sender_name() {
        "" => message.sender_id.as_str(),
        name => name,
    };
    println!(
        "  [{}] {}: {}",
        format_label(message.created_at, &Local::now(), config.week_start),
        name,
        message.body
    );
}

async fn print_thread(
    store: &Store,
    config: SyncConfig,
    viewer: &str,
    conversation: &str,
) -> Result<()> {
    let (sync, mut events) = ThreadSynchronizer::new(store.backend(), viewer, config.clone());
    sync.open(conversation)
        .await
        .with_context(|| format!("Failed to load conversation {}", conversation))?;

    for message in sync.messages() {
        print_message(&message, &config);
    }

    // Read marks are reported on the event stream once the load completes
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(50), events.next()).await
    {
        match event {
            ThreadEvent::ReadMarked { count, .. } => println!("Marked {} messages read", count),
            ThreadEvent::ReadFailed { error, .. } => warn!("Read state not saved: {}", error),
            _ => {}
        }
    }

    sync.close();
    Ok(())
}

/// Seed demo data, returning the main conversation id
async fn seed(store: &Store) -> Result<String> {
    let profiles = [
        (DEMO_CREATOR, "Maya Chen", "@mayacreates"),
        (DEMO_BRAND, "Acme Outdoor", "@acmeoutdoor"),
        ("brand-2", "Lumen Skincare", "@lumen"),
    ];
    for (id, name, handle) in profiles {
        store
            .profiles
            .upsert(&Profile {
                id: id.to_string(),
                display_name: name.to_string(),
                handle: handle.to_string(),
                avatar_url: Some(format!("https://cdn.creatorlink.app/avatars/{}.png", id)),
            })
            .await
            .context("Failed to save profile")?;
    }

    let main = store
        .conversations
        .create(DEMO_CREATOR, DEMO_BRAND, Some("Spring Trail Launch"))
        .await
        .context("Failed to create conversation")?;
    let other = store
        .conversations
        .create(DEMO_CREATOR, "brand-2", None)
        .await
        .context("Failed to create conversation")?;

    if !store.messages.history(&main).await?.is_empty() {
        info!("Demo data already present");
        return Ok(main);
    }

    let now = Utc::now();
    let script = [
        (&main, DEMO_BRAND, DEMO_CREATOR, "Hi Maya! Loved your last hiking reel.", 26),
        (&main, DEMO_CREATOR, DEMO_BRAND, "Thank you! Happy to hear about the launch.", 25),
        (&main, DEMO_BRAND, DEMO_CREATOR, "Brief is attached, can you post by Friday?", 2),
        (&other, "brand-2", DEMO_CREATOR, "Samples shipped this morning.", 72),
    ];
    for (conversation, from, to, body, hours_ago) in script {
        store
            .messages
            .send_at(conversation, from, to, body, now - ChronoDuration::hours(hours_ago))
            .await
            .context("Failed to store message")?;
    }

    info!("Seeded demo conversations {} and {}", main, other);
    Ok(main)
}

async fn wait_for_event<F>(
    events: &mut UnboundedReceiver<ThreadEvent>,
    pred: F,
) -> Result<ThreadEvent>
where
    F: Fn(&ThreadEvent) -> bool,
{
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.next().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .context("Timed out waiting for thread event")?;

    match found {
        Some(event) => Ok(event),
        None => bail!("Thread event stream closed"),
    }
}

async fn demo(store: &Store, config: SyncConfig) -> Result<()> {
    let conversation = seed(store).await?;

    println!("== Inbox for {}", DEMO_CREATOR);
    print_inbox(
        store,
        &config,
        DEMO_CREATOR,
        ParticipantRole::Creator,
        "",
        StatusFilter::All,
    )
    .await?;

    println!("\n== Opening {} as {}", conversation, DEMO_CREATOR);
    let (sync, mut events) =
        ThreadSynchronizer::new(store.backend(), DEMO_CREATOR, config.clone());
    sync.open(&conversation)
        .await
        .context("Failed to open conversation")?;
    for message in sync.messages() {
        print_message(&message, &config);
    }

    println!("\n== {} sends a message", DEMO_BRAND);
    let sent = store
        .messages
        .send(
            &conversation,
            DEMO_BRAND,
            DEMO_CREATOR,
            "Quick follow-up: we can extend to Monday if needed.",
        )
        .await
        .context("Failed to send message")?;

    let sent_id = sent.id.clone();
    wait_for_event(&mut events, |event| {
        matches!(event, ThreadEvent::MessageAppended { message_id, .. } if *message_id == sent_id)
    })
    .await?;
    if let Some(message) = sync.messages().iter().find(|m| m.id == sent.id) {
        print!("live");
        print_message(message, &config);
    }

    let event = wait_for_event(&mut events, |event| {
        matches!(
            event,
            ThreadEvent::ReadMarked { .. } | ThreadEvent::ReadFailed { .. }
        )
    })
    .await?;
    match event {
        ThreadEvent::ReadMarked { count, .. } => println!("Marked {} messages read", count),
        ThreadEvent::ReadFailed { error, .. } => println!("Read state not saved: {}", error),
        _ => {}
    }

    sync.close();
    Ok(())
}
