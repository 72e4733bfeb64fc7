//! Admin command surface
//!
//! Text commands as typed into the bot (leading `/` optional):
//!
//! | Command | Effect |
//! |---|---|
//! | `addpoints <user> <amount>` | signed balance adjustment |
//! | `setpoints <user> <amount>` | overwrite balance |
//! | `orders [page]` | newest orders, 10 per page |
//! | `setreward <channel> <reward>` | catalog reward edit |
//! | `setstatus <order> <status>` | pending -> completed/cancelled/failed |
//! | `stats` | user/order counts |
//! | `user <user>` | show one user (read-only) |
//! | `channels` | show the catalog |
//!
//! Malformed input, including extra arguments, is rejected with
//! `InvalidInput` before any state is touched.

use std::fmt;
use std::str::FromStr;

use crate::channels::ChannelDescriptor;
use crate::core_types::{ChannelId, OrderId, Points, UserId};
use crate::error::{LedgerError, Result};
use crate::models::{OrderRecord, OrderStatus};
use crate::orderbook::OrderPage;
use crate::service::PointsService;
use crate::stats::Stats;
use crate::user_account::UserRecord;

pub const ORDERS_PAGE_SIZE: usize = 10;

/// Orders shown at the bottom of the stats reply
const STATS_RECENT_ORDERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    AddPoints { user_id: UserId, amount: i64 },
    SetPoints { user_id: UserId, amount: Points },
    Orders { page: usize },
    SetReward { channel_id: ChannelId, reward: Points },
    SetStatus { order_id: OrderId, status: OrderStatus },
    Stats,
    User { user_id: UserId },
    Channels,
}

fn arg<T: FromStr>(args: &[&str], idx: usize, name: &str) -> Result<T> {
    let raw = args
        .get(idx)
        .ok_or_else(|| LedgerError::InvalidInput(format!("missing <{}>", name)))?;
    raw.parse()
        .map_err(|_| LedgerError::InvalidInput(format!("<{}> must be a number, got '{}'", name, raw)))
}

impl AdminCommand {
    pub fn parse(tokens: &[&str]) -> Result<Self> {
        let (name, args) = tokens
            .split_first()
            .ok_or_else(|| LedgerError::InvalidInput("empty command".to_string()))?;
        let name = name.trim_start_matches('/').to_ascii_lowercase();

        let cmd = match name.as_str() {
            "addpoints" => AdminCommand::AddPoints {
                user_id: arg(args, 0, "user_id")?,
                amount: arg(args, 1, "amount")?,
            },
            "setpoints" => AdminCommand::SetPoints {
                user_id: arg(args, 0, "user_id")?,
                amount: arg(args, 1, "amount")?,
            },
            "orders" => AdminCommand::Orders {
                page: if args.is_empty() { 1 } else { arg(args, 0, "page")? },
            },
            "setreward" => AdminCommand::SetReward {
                channel_id: arg(args, 0, "channel_id")?,
                reward: arg(args, 1, "reward")?,
            },
            "setstatus" => AdminCommand::SetStatus {
                order_id: arg(args, 0, "order_id")?,
                status: args
                    .get(1)
                    .ok_or_else(|| LedgerError::InvalidInput("missing <status>".to_string()))?
                    .parse()?,
            },
            "stats" => AdminCommand::Stats,
            "user" => AdminCommand::User {
                user_id: arg(args, 0, "user_id")?,
            },
            "channels" => AdminCommand::Channels,
            other => {
                return Err(LedgerError::InvalidInput(format!(
                    "unknown command: {}",
                    other
                )));
            }
        };

        if let Some(extra) = args.get(cmd.max_args()) {
            return Err(LedgerError::InvalidInput(format!(
                "unexpected argument '{}' for {}",
                extra, name
            )));
        }
        Ok(cmd)
    }

    fn max_args(&self) -> usize {
        match self {
            AdminCommand::Stats | AdminCommand::Channels => 0,
            AdminCommand::Orders { .. } | AdminCommand::User { .. } => 1,
            AdminCommand::AddPoints { .. }
            | AdminCommand::SetPoints { .. }
            | AdminCommand::SetReward { .. }
            | AdminCommand::SetStatus { .. } => 2,
        }
    }
}

impl FromStr for AdminCommand {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        Self::parse(&tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminReply {
    Balance { user_id: UserId, balance: Points },
    Orders(OrderPage),
    Channel(ChannelDescriptor),
    Order(OrderRecord),
    Stats(Stats),
    User { user_id: UserId, record: Option<UserRecord> },
    Channels(Vec<ChannelDescriptor>),
}

pub async fn execute(service: &PointsService, cmd: AdminCommand) -> Result<AdminReply> {
    tracing::info!(target: "ADMIN", ?cmd, "admin command");

    let reply = match cmd {
        AdminCommand::AddPoints { user_id, amount } => AdminReply::Balance {
            user_id,
            balance: service.ledger().add_points(user_id, amount).await?,
        },
        AdminCommand::SetPoints { user_id, amount } => AdminReply::Balance {
            user_id,
            balance: service.ledger().set_points(user_id, amount).await?,
        },
        AdminCommand::Orders { page } => AdminReply::Orders(
            service
                .orders()
                .recent_orders(page, ORDERS_PAGE_SIZE)
                .await,
        ),
        AdminCommand::SetReward { channel_id, reward } => {
            AdminReply::Channel(service.channels().set_reward(channel_id, reward).await?)
        }
        AdminCommand::SetStatus { order_id, status } => {
            AdminReply::Order(service.orders().set_status(order_id, status).await?)
        }
        AdminCommand::Stats => AdminReply::Stats(service.get_stats().await),
        AdminCommand::User { user_id } => AdminReply::User {
            user_id,
            record: service.ledger().find_user(user_id).await,
        },
        AdminCommand::Channels => AdminReply::Channels(service.channels().list_channels().await),
    };
    Ok(reply)
}

fn write_order(f: &mut fmt::Formatter<'_>, o: &OrderRecord) -> fmt::Result {
    writeln!(
        f,
        "#{} user={} {} x{} -> {} cost={} [{}]",
        o.id, o.user_id, o.service, o.quantity, o.target, o.cost, o.status
    )
}

impl fmt::Display for AdminReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminReply::Balance { user_id, balance } => {
                write!(f, "User {} balance: {} points", user_id, balance)
            }
            AdminReply::Orders(page) => {
                writeln!(
                    f,
                    "Orders page {}/{} ({} total)",
                    page.page, page.total_pages, page.total_orders
                )?;
                if page.orders.is_empty() {
                    write!(f, "No orders.")?;
                }
                for o in &page.orders {
                    write_order(f, o)?;
                }
                Ok(())
            }
            AdminReply::Channel(c) => {
                write!(f, "Channel {} ({}) reward: {} points", c.title, c.id, c.reward)
            }
            AdminReply::Order(o) => write!(f, "Order #{} is now {}", o.id, o.status),
            AdminReply::Stats(s) => {
                writeln!(f, "Users: {}", s.user_count)?;
                writeln!(f, "Orders: {}", s.order_count)?;
                writeln!(f, "Pending: {}", s.pending_order_count)?;
                let skip = s.orders.len().saturating_sub(STATS_RECENT_ORDERS);
                for o in s.orders.iter().skip(skip) {
                    write_order(f, o)?;
                }
                Ok(())
            }
            AdminReply::User { user_id, record } => match record {
                Some(u) => write!(
                    f,
                    "User {} ({}): {} points, {} channels rewarded, welcome bonus {}",
                    user_id,
                    u.username().unwrap_or("-"),
                    u.points(),
                    u.joined_channels().len(),
                    if u.welcome_bonus_given() { "given" } else { "pending" }
                ),
                None => write!(f, "User {} not found", user_id),
            },
            AdminReply::Channels(channels) => {
                for c in channels {
                    writeln!(f, "{} {} reward={} {}", c.id, c.title, c.reward, c.link)?;
                }
                Ok(())
            }
        }
    }
}
