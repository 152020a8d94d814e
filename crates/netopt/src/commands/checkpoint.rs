//! `netopt checkpoint {create,list,restore,delete,prune}` (§4.7).

use netopt_common::config::Config;
use netopt_common::error::Result;
use netopt_common::event::{Event, EventSink};

use crate::cli::CheckpointAction;

pub async fn run(config: &Config, action: &CheckpointAction) -> Result<i32> {
    let store = netopt_checkpoint::CheckpointStore::new(&config.state_root, config.checkpoint_retention);

    match action {
        CheckpointAction::Create { name, description } => {
            let (links, _) = super::inventory_with_gateways(config)?;
            let files = netopt_checkpoint::capture::capture_all(&links);
            let id = store.create(name, description, &files)?;
            EventSink.emit(&Event::CheckpointCreated { id: id.clone() });
            println!("{id}");
        }
        CheckpointAction::List => {
            let entries = store.list()?;
            if entries.is_empty() {
                println!("no checkpoints");
            }
            println!("{:<26} {:<20} {:<24} {}", "ID", "NAME", "CREATED", "DESCRIPTION");
            for meta in entries {
                println!(
                    "{:<26} {:<20} {:<24} {}",
                    meta.id, meta.name, meta.created_at_utc, meta.description
                );
            }
        }
        CheckpointAction::Restore { id } => {
            let extracted = store.restore(id)?;
            let restored = netopt_checkpoint::restore_scope::restore_net_sysctl(&extracted.dir)?;
            let (links, _) = super::inventory_with_gateways(config)?;
            let names: Vec<String> = links.into_iter().map(|l| l.name).collect();
            netopt_checkpoint::restore_scope::reset_qdiscs_to_default(&names);
            netopt_checkpoint::restore_scope::log_advisory_ethtool_review(&extracted.dir);
            EventSink.emit(&Event::CheckpointRestored { id: id.clone() });
            println!(
                "restored {restored} net.* sysctl key(s) and reset qdiscs on {} interface(s) from {id}",
                names.len()
            );
        }
        CheckpointAction::Delete { id } => {
            store.delete(id)?;
            println!("deleted {id}");
        }
        CheckpointAction::Prune => {
            let before = store.list()?.len();
            store.prune()?;
            let after = store.list()?.len();
            println!("pruned {} checkpoint(s), {after} remaining", before.saturating_sub(after));
        }
    }

    Ok(0)
}
