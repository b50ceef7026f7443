//! Slave listing and blacklist management.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use netrender_core::error::NetError;
use netrender_core::types::SlaveId;
use netrender_model::RenderSlave;

use super::CommandContext;
use crate::output::{print_list, print_success, OutputFormat};

#[derive(Debug, Args)]
pub struct SlaveArgs {
    #[command(subcommand)]
    pub command: SlaveCommands,
}

#[derive(Debug, Subcommand)]
pub enum SlaveCommands {
    /// List slaves connected to the master
    List,
    /// Exclude a slave from future dispatch consideration
    Blacklist {
        /// Slave id
        id: String,
    },
    /// Return a blacklisted slave to the active list
    Whitelist {
        /// Slave id
        id: String,
    },
}

pub async fn execute(
    args: &SlaveArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), NetError> {
    let mut ctx = CommandContext::open(config_path)?;

    match &args.command {
        SlaveCommands::List => {
            netrender_client::operators::refresh_slaves(&ctx.client, &mut ctx.session).await?;
            ctx.save_session()?;
            let rows: Vec<SlaveRow> = ctx
                .session
                .slaves
                .iter()
                .map(|s| SlaveRow::from_slave(s, false))
                .chain(
                    ctx.session
                        .blacklist
                        .iter()
                        .map(|s| SlaveRow::from_slave(s, true)),
                )
                .collect();
            print_list(&rows, format);
        }
        SlaveCommands::Blacklist { id } => {
            let slave_id = SlaveId::from(id.as_str());
            if ctx.session.blacklist_slave(&slave_id) {
                ctx.save_session()?;
                print_success(&format!("Slave {slave_id} blacklisted"));
            } else {
                return Err(NetError::not_found(format!(
                    "No active slave with id {slave_id} (run `netrender slaves list` first)"
                )));
            }
        }
        SlaveCommands::Whitelist { id } => {
            let slave_id = SlaveId::from(id.as_str());
            if ctx.session.whitelist_slave(&slave_id) {
                ctx.save_session()?;
                print_success(&format!("Slave {slave_id} whitelisted"));
            } else {
                return Err(NetError::not_found(format!(
                    "Slave {slave_id} is not blacklisted"
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
struct SlaveRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "State")]
    state: String,
}

impl SlaveRow {
    fn from_slave(slave: &RenderSlave, blacklisted: bool) -> Self {
        Self {
            id: slave.id.to_string(),
            name: slave.name.clone(),
            address: slave.address.clone().unwrap_or_default(),
            tags: slave.tags.iter().cloned().collect::<Vec<_>>().join(","),
            state: if blacklisted { "blacklisted" } else { "active" }.to_string(),
        }
    }
}
