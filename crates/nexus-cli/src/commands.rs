//! CLI command implementations.

use crate::config::{Workspace, WORKSPACE_DIR};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use nexus_core::{parse_roster, Friendship};
use nexus_graph::{NetworkSnapshot, SocialNetwork};
use nexus_server::{NexusServer, ServerConfig};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Initialize a workspace under `root`.
pub fn init(root: &Path) -> Result<()> {
    if !Workspace::init(root)? {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    println!(
        "{} Initialized Nexus in {}",
        "✓".green(),
        root.join(WORKSPACE_DIR).display()
    );
    println!("  Run {} to load accounts", "nexus import <roster.csv>".cyan());

    Ok(())
}

/// Import accounts from a roster CSV.
pub fn import(root: &Path, csv: &Path) -> Result<()> {
    let ws = Workspace::locate(root)?;
    let text = fs::read_to_string(csv)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(format!("Reading {}...", csv.display()));

    let roster = parse_roster(&text, &ws.config.default_department);
    let parsed = roster.accounts.len();

    spinner.set_message("Writing accounts...");
    let store = ws.open_store()?;
    let added = store.import_accounts(roster.accounts)?;

    spinner.finish_and_clear();

    println!(
        "{} Imported {} accounts ({} parsed, {} already present)",
        "✓".green(),
        added.to_string().cyan(),
        parsed,
        parsed - added
    );

    let skipped = roster.malformed.len() + roster.duplicates.len();
    if skipped > 0 {
        println!("\n{} {} rows skipped:", "⚠".yellow(), skipped);
        for line in &roster.malformed {
            println!("  line {} - {}", line.to_string().red(), "missing name or key");
        }
        for line in &roster.duplicates {
            println!("  line {} - {}", line.to_string().red(), "repeated key");
        }
    }

    Ok(())
}

/// A friendship lifecycle command.
#[derive(Debug, Clone, Copy)]
pub enum Transition {
    Request,
    Accept,
    Reject,
    Unfriend,
}

/// Apply a lifecycle transition performed by `actor`.
pub fn transition(root: &Path, action: Transition, actor: &str, other: &str) -> Result<()> {
    let network = Workspace::locate(root)?.open_network()?;
    let edge = apply(&network, action, actor, other)?;

    let message = match action {
        Transition::Request => format!("{} sent a friend request to {}", actor, other),
        Transition::Accept => format!("{} and {} are now friends", actor, other),
        Transition::Reject => format!("{} declined the request from {}", actor, other),
        Transition::Unfriend => format!("{} and {} are no longer friends", actor, other),
    };
    println!("{} {}", "✓".green(), message);
    println!("  {}", edge.pair().to_string().dimmed());

    Ok(())
}

fn apply(
    network: &SocialNetwork,
    action: Transition,
    actor: &str,
    other: &str,
) -> std::result::Result<Friendship, nexus_graph::FriendshipError> {
    match action {
        Transition::Request => network.request(actor, other),
        Transition::Accept => network.accept(actor, other),
        Transition::Reject => network.reject(actor, other),
        Transition::Unfriend => network.unfriend(actor, other),
    }
}

fn require_account(snapshot: &NetworkSnapshot, key: &str) -> Result<()> {
    if snapshot.graph().contains(key) {
        Ok(())
    } else {
        Err(format!("Unknown account: {}", key).into())
    }
}

fn describe(snapshot: &NetworkSnapshot, key: &str) -> String {
    match snapshot.graph().account(key) {
        Some(account) => format!(
            "{} {} {}",
            account.key.as_str().cyan(),
            account.name,
            format!("({})", account.department).dimmed()
        ),
        None => key.cyan().to_string(),
    }
}

/// List the friends of an account.
pub fn friends(root: &Path, key: &str) -> Result<()> {
    let network = Workspace::locate(root)?.open_network()?;
    let snapshot = network.snapshot()?;
    require_account(&snapshot, key)?;

    let friends = snapshot.graph().neighbors(key);
    if friends.is_empty() {
        println!("{} has no friends yet", key);
        return Ok(());
    }

    println!("{} friends:\n", friends.len());
    for friend in &friends {
        println!("  {}", describe(&snapshot, friend.as_str()));
    }

    Ok(())
}

/// List the friends two accounts share.
pub fn mutual(root: &Path, a: &str, b: &str) -> Result<()> {
    let network = Workspace::locate(root)?.open_network()?;
    let snapshot = network.snapshot()?;
    require_account(&snapshot, a)?;
    require_account(&snapshot, b)?;

    let mutual = snapshot.graph().mutual_neighbors(a, b);
    if mutual.is_empty() {
        println!("{} and {} have no mutual friends", a, b);
        return Ok(());
    }

    println!("{} mutual friends:\n", mutual.len());
    for key in &mutual {
        println!("  {}", describe(&snapshot, key.as_str()));
    }

    Ok(())
}

/// Suggest new connections for an account.
pub fn recommend(root: &Path, key: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let ws = Workspace::locate(root)?;
    let limit = limit.unwrap_or(ws.config.recommendation_limit);
    let network = ws.open_network()?;
    require_account(&*network.snapshot()?, key)?;

    let mut recs = network.recommendations(key)?;
    recs.truncate(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&recs)?);
        return Ok(());
    }

    if recs.is_empty() {
        println!("No recommendations for {}", key);
        return Ok(());
    }

    println!("{}\n", format!("People {} may know", key).cyan().bold());
    for (rank, rec) in recs.iter().enumerate() {
        println!(
            "  {}. {} {} {}",
            rank + 1,
            rec.key.as_str().cyan(),
            rec.name,
            format!("({})", rec.department).dimmed()
        );
        let mutuals = match rec.mutual_count() {
            0 => "no mutual friends".to_string(),
            1 => "1 mutual friend".to_string(),
            n => format!("{} mutual friends", n),
        };
        println!(
            "     score {} · {}",
            rec.score.to_string().yellow(),
            mutuals.dimmed()
        );
    }

    Ok(())
}

/// Show pending requests for an account.
pub fn requests(root: &Path, key: &str) -> Result<()> {
    let network = Workspace::locate(root)?.open_network()?;
    let snapshot = network.snapshot()?;
    require_account(&snapshot, key)?;

    let incoming = snapshot.incoming_requests(key);
    let outgoing = snapshot.outgoing_requests(key);

    println!("{}", "Incoming".cyan().bold());
    if incoming.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for from in &incoming {
        println!("  {}", describe(&snapshot, from.as_str()));
    }

    println!("\n{}", "Outgoing".cyan().bold());
    if outgoing.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for to in &outgoing {
        println!("  {}", describe(&snapshot, to.as_str()));
    }

    Ok(())
}

/// Show graph statistics, and an account's summary when a key is given.
pub fn status(root: &Path, key: Option<&str>) -> Result<()> {
    let ws = Workspace::locate(root)?;
    let network = ws.open_network()?;
    let snapshot = network.snapshot()?;
    let stats = snapshot.graph().stats();

    println!("{}", "Nexus Status".cyan().bold());
    println!();
    println!("  {} {}", "Workspace:".dimmed(), ws.home.display());
    println!("  {} {}", "Accounts:".dimmed(), stats.account_count);
    println!("  {} {}", "Friendships:".dimmed(), stats.edge_count);
    if stats.skipped_edges > 0 {
        println!(
            "  {} {}",
            "Skipped:".dimmed(),
            stats.skipped_edges.to_string().yellow()
        );
    }

    if let Some(key) = key {
        require_account(&snapshot, key)?;
        let summary = snapshot.summary(key);
        println!();
        println!("  {}", describe(&snapshot, key));
        println!("  {} {}", "Friends:".dimmed(), summary.friends);
        println!("  {} {}", "Incoming:".dimmed(), summary.incoming_requests);
        println!("  {} {}", "Outgoing:".dimmed(), summary.outgoing_requests);
        println!("  {} {:.1}%", "Reach:".dimmed(), summary.reach_percent);
    }

    Ok(())
}

/// Export the graph to JSON.
pub fn export(root: &Path, output: &Path, viewer: Option<&str>) -> Result<()> {
    let network = Workspace::locate(root)?.open_network()?;
    if let Some(viewer) = viewer {
        require_account(&*network.snapshot()?, viewer)?;
    }

    let export = network.export(viewer)?;
    fs::write(output, serde_json::to_string_pretty(&export)?)?;

    println!(
        "{} Exported {} accounts and {} friendships to {}",
        "✓".green(),
        export.stats.account_count,
        export.stats.edge_count,
        output.display()
    );

    Ok(())
}

/// Start the Nexus server.
pub async fn serve(root: &Path, port: Option<u16>, headless: bool) -> Result<()> {
    let ws = Workspace::locate(root)?;
    let port = port.unwrap_or(ws.config.server_port);
    let ip = if headless {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    };

    if headless {
        println!("{}", "Starting Nexus server in headless mode...".cyan());
    } else {
        println!("{}", "Starting Nexus server...".cyan());
    }

    let network = ws.open_network()?;
    let stats = network.snapshot()?.graph().stats();
    println!(
        "{} Loaded {} accounts ({} friendships)",
        "✓".green(),
        stats.account_count,
        stats.edge_count
    );

    let addr = SocketAddr::new(ip, port);
    let server = NexusServer::new(network, ServerConfig { addr });

    println!("{} Listening on ws://{}", "✓".green(), addr);
    if headless {
        println!("  Headless mode: accepting connections from any host");
    }
    println!("  Press {} to stop", "Ctrl+C".cyan());

    server.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ROSTER: &str = "name,key,department\n\
                          Amy,a,CS\n\
                          Bob,b,CS\n\
                          Cat,c,\n\
                          ,x,CS\n\
                          Bob again,b,Math\n";

    fn workspace() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();
        let csv = dir.path().join("roster.csv");
        fs::write(&csv, ROSTER).unwrap();
        import(dir.path(), &csv).unwrap();
        dir
    }

    #[test]
    fn test_import_merges_roster() {
        let dir = workspace();
        // Importing again adds nothing
        import(dir.path(), &dir.path().join("roster.csv")).unwrap();

        let network = Workspace::locate(dir.path())
            .unwrap()
            .open_network()
            .unwrap();
        let snapshot = network.snapshot().unwrap();
        assert_eq!(snapshot.graph().account_count(), 3);
        assert_eq!(snapshot.graph().account("c").unwrap().department, "Agriculture");
        assert_eq!(snapshot.graph().account("b").unwrap().name, "Bob");
    }

    #[test]
    fn test_transitions_persist() {
        let dir = workspace();
        transition(dir.path(), Transition::Request, "a", "b").unwrap();
        transition(dir.path(), Transition::Accept, "b", "a").unwrap();
        assert!(transition(dir.path(), Transition::Request, "b", "a").is_err());

        {
            // The store allows one open handle at a time
            let network = Workspace::locate(dir.path())
                .unwrap()
                .open_network()
                .unwrap();
            assert!(network.are_connected("a", "b").unwrap());
        }

        friends(dir.path(), "a").unwrap();
        status(dir.path(), Some("a")).unwrap();
        recommend(dir.path(), "a", None, true).unwrap();
    }

    #[test]
    fn test_unknown_account_is_an_error() {
        let dir = workspace();
        assert!(friends(dir.path(), "nobody").is_err());
        assert!(requests(dir.path(), "nobody").is_err());
    }

    #[test]
    fn test_export_writes_json() {
        let dir = workspace();
        transition(dir.path(), Transition::Request, "a", "b").unwrap();
        transition(dir.path(), Transition::Accept, "b", "a").unwrap();

        let out = dir.path().join("graph.json");
        export(dir.path(), &out, Some("a")).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["viewer"], "a");
        assert_eq!(json["links"].as_array().unwrap().len(), 1);
        assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
    }
}
