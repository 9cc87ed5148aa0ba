//! Dynamic configuration of a worker.
//!
//! A configuration string is either an option the coordinator applies to
//! its own dnode record or a raw setting meant for the worker's local
//! config system, which the coordinator forwards without interpreting.
//!
//! | option            | effect                                  | result       |
//! |-------------------|-----------------------------------------|--------------|
//! | `unremove`        | clear the pending-removal flag           | `Success`    |
//! | `score <int>`     | set the placement score, then rebalance | `InvalidSql` |
//! | `bandwidth <int>` | set the bandwidth limit                 | `Success`    |
//! | anything else     | forwarded as a `DnodeCfg` command       |              |
//!
//! `score` answers `InvalidSql` even when it was applied. Callers of the
//! configure-dnode path rely on that code, so it is kept.

use std::fmt;
use std::net::Ipv4Addr;

use thiserror::Error;
use tracing::{debug, info, warn};
use vgrid_core::{MsgType, ResultCode};
use vgrid_state::{DnodeInfo, DnodeStatus, MAX_BANDWIDTH_MB};

use crate::error::MgmtResult;
use crate::service::MgmtService;
use crate::wire::{CfgDnodeMsg, WireMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicOption {
    Unremove,
    SetScore(i32),
    SetBandwidth(i32),
    /// Not a coordinator option. Carries the trimmed input.
    PassThrough(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("{option} requires a value")]
    MissingValue { option: &'static str },

    #[error("{option} value is not an integer: {value}")]
    NotAnInteger { option: &'static str, value: String },

    #[error("{option} value {value} out of range")]
    OutOfRange { option: &'static str, value: i32 },
}

impl DynamicOption {
    /// Parse `<option> [<value>]`. Option names match case-insensitively.
    pub fn parse(input: &str) -> Result<Self, OptionError> {
        let mut tokens = input.split_whitespace();
        let Some(option) = tokens.next() else {
            return Ok(Self::PassThrough(String::new()));
        };

        if option.eq_ignore_ascii_case("unremove") {
            Ok(Self::Unremove)
        } else if option.eq_ignore_ascii_case("score") {
            let score = int_value("score", tokens.next())?;
            Ok(Self::SetScore(score))
        } else if option.eq_ignore_ascii_case("bandwidth") {
            let mb = int_value("bandwidth", tokens.next())?;
            if !(0..MAX_BANDWIDTH_MB).contains(&mb) {
                return Err(OptionError::OutOfRange {
                    option: "bandwidth",
                    value: mb,
                });
            }
            Ok(Self::SetBandwidth(mb))
        } else {
            Ok(Self::PassThrough(input.trim().to_string()))
        }
    }
}

impl fmt::Display for DynamicOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unremove => f.write_str("unremove"),
            Self::SetScore(v) => write!(f, "score {v}"),
            Self::SetBandwidth(v) => write!(f, "bandwidth {v}"),
            Self::PassThrough(s) => f.write_str(s),
        }
    }
}

fn int_value(option: &'static str, token: Option<&str>) -> Result<i32, OptionError> {
    let token = token.ok_or(OptionError::MissingValue { option })?;
    token.parse().map_err(|_| OptionError::NotAnInteger {
        option,
        value: token.to_string(),
    })
}

/// Result of running the option parser against a dnode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynCfgOutcome {
    Applied(ResultCode),
    /// The string is for the worker itself.
    Unhandled(String),
}

impl MgmtService {
    /// Parse `config` and apply it to `dnode` if it is a coordinator option.
    ///
    /// A malformed value yields `InvalidSql` and leaves the record untouched.
    pub fn cfg_dynamic_options(&self, dnode: &mut DnodeInfo, config: &str) -> MgmtResult<DynCfgOutcome> {
        match DynamicOption::parse(config) {
            Ok(option) => self.apply_option(dnode, option),
            Err(e) => {
                warn!(ip = %dnode.private_ip, error = %e, "rejected dynamic option");
                Ok(DynCfgOutcome::Applied(ResultCode::InvalidSql))
            }
        }
    }

    /// Apply `option` to the stored record of `dnode` and refresh `dnode`
    /// from the result.
    /// The read, change and write happen in one store update.
    pub fn apply_option(&self, dnode: &mut DnodeInfo, option: DynamicOption) -> MgmtResult<DynCfgOutcome> {
        let ip = dnode.private_ip;
        let mut previous = None;
        let (updated, code) = match &option {
            DynamicOption::Unremove => {
                let updated = self
                    .store
                    .update_dnode_with(ip, &mut |d: &mut DnodeInfo| d.pending_removal = false)?;
                (updated, ResultCode::Success)
            }
            DynamicOption::SetScore(score) => {
                let updated = self.store.update_dnode_with(ip, &mut |d: &mut DnodeInfo| {
                    previous = Some(d.custom_score);
                    d.custom_score = *score;
                })?;
                (updated, ResultCode::InvalidSql)
            }
            DynamicOption::SetBandwidth(mb) => {
                let updated = self.store.update_dnode_with(ip, &mut |d: &mut DnodeInfo| {
                    previous = Some(d.bandwidth_mb);
                    d.bandwidth_mb = *mb;
                })?;
                (updated, ResultCode::Success)
            }
            DynamicOption::PassThrough(raw) => return Ok(DynCfgOutcome::Unhandled(raw.clone())),
        };

        let Some(updated) = updated else {
            warn!(%ip, "dnode vanished before option could be applied");
            return Ok(DynCfgOutcome::Applied(ResultCode::NotConfigured));
        };
        *dnode = updated;

        match option {
            DynamicOption::Unremove => info!(%ip, "dnode removal cancelled"),
            DynamicOption::SetScore(score) => {
                info!(%ip, from = ?previous, to = score, "custom score set");
                self.rebalancer.request_rebalance(self.balance_delay);
            }
            DynamicOption::SetBandwidth(mb) => info!(%ip, from = ?previous, to = mb, "bandwidth set"),
            DynamicOption::PassThrough(_) => {}
        }
        Ok(DynCfgOutcome::Applied(code))
    }

    /// Configure the worker at `ip`.
    pub fn cfg_dnode(&self, ip: Ipv4Addr, config: &str) -> MgmtResult<ResultCode> {
        let Some(mut dnode) = self.store.dnode(ip)? else {
            warn!(%ip, "cfg dnode: dnode not configured");
            return Ok(ResultCode::NotConfigured);
        };

        let raw = match self.cfg_dynamic_options(&mut dnode, config)? {
            DynCfgOutcome::Applied(code) => return Ok(code),
            DynCfgOutcome::Unhandled(raw) => raw,
        };

        if dnode.status == DnodeStatus::Offline {
            warn!(%ip, "cfg dnode: dnode offline");
            return Ok(ResultCode::NodeOffline);
        }

        let payload = CfgDnodeMsg { ip, config: raw }.to_bytes()?;
        self.gateway.send_command(ip, MsgType::DnodeCfg, payload, None)?;
        debug!(%ip, "config forwarded to dnode");
        Ok(ResultCode::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_options() {
        assert_eq!(DynamicOption::parse("unremove"), Ok(DynamicOption::Unremove));
        assert_eq!(DynamicOption::parse("  SCORE  -4 "), Ok(DynamicOption::SetScore(-4)));
        assert_eq!(
            DynamicOption::parse("Bandwidth 9999999"),
            Ok(DynamicOption::SetBandwidth(9_999_999))
        );
    }

    #[test]
    fn bandwidth_bounds() {
        assert_eq!(DynamicOption::parse("bandwidth 0"), Ok(DynamicOption::SetBandwidth(0)));
        assert_eq!(
            DynamicOption::parse("bandwidth 10000000"),
            Err(OptionError::OutOfRange {
                option: "bandwidth",
                value: 10_000_000
            })
        );
        assert!(matches!(
            DynamicOption::parse("bandwidth -1"),
            Err(OptionError::OutOfRange { value: -1, .. })
        ));
    }

    #[test]
    fn malformed_values() {
        assert_eq!(
            DynamicOption::parse("score"),
            Err(OptionError::MissingValue { option: "score" })
        );
        assert!(matches!(
            DynamicOption::parse("bandwidth fast"),
            Err(OptionError::NotAnInteger { option: "bandwidth", .. })
        ));
    }

    #[test]
    fn everything_else_passes_through() {
        assert_eq!(
            DynamicOption::parse(" debugFlag 135 "),
            Ok(DynamicOption::PassThrough("debugFlag 135".to_string()))
        );
        // Whole-token match only.
        assert_eq!(
            DynamicOption::parse("scores 3"),
            Ok(DynamicOption::PassThrough("scores 3".to_string()))
        );
        assert_eq!(DynamicOption::parse(""), Ok(DynamicOption::PassThrough(String::new())));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for option in [
            DynamicOption::Unremove,
            DynamicOption::SetScore(12),
            DynamicOption::SetBandwidth(800),
        ] {
            assert_eq!(DynamicOption::parse(&option.to_string()), Ok(option));
        }
    }
}
