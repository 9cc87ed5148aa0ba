//! Protocol vocabulary shared by the coordinator and its workers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Control message types exchanged between the coordinator and workers.
///
/// Requests and commands occupy even codes; the matching response is always
/// the request code plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MsgType {
    DnodeCreateTable = 2,
    DnodeCreateTableRsp = 3,
    DnodeRemoveTable = 4,
    DnodeRemoveTableRsp = 5,
    DnodeVPeers = 6,
    DnodeVPeersRsp = 7,
    DnodeFreeVnode = 8,
    DnodeFreeVnodeRsp = 9,
    DnodeCfg = 10,
    DnodeCfgRsp = 11,
    AlterStream = 12,
    AlterStreamRsp = 13,
    TableCfg = 14,
    TableCfgRsp = 15,
    VnodeCfg = 16,
    VnodeCfgRsp = 17,
}

impl MsgType {
    pub fn from_u8(raw: u8) -> Option<Self> {
        let ty = match raw {
            2 => MsgType::DnodeCreateTable,
            3 => MsgType::DnodeCreateTableRsp,
            4 => MsgType::DnodeRemoveTable,
            5 => MsgType::DnodeRemoveTableRsp,
            6 => MsgType::DnodeVPeers,
            7 => MsgType::DnodeVPeersRsp,
            8 => MsgType::DnodeFreeVnode,
            9 => MsgType::DnodeFreeVnodeRsp,
            10 => MsgType::DnodeCfg,
            11 => MsgType::DnodeCfgRsp,
            12 => MsgType::AlterStream,
            13 => MsgType::AlterStreamRsp,
            14 => MsgType::TableCfg,
            15 => MsgType::TableCfgRsp,
            16 => MsgType::VnodeCfg,
            17 => MsgType::VnodeCfgRsp,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this is the response half of a request/response pair.
    pub fn is_response(self) -> bool {
        self.as_u8() % 2 == 1
    }

    /// The response type paired with this request, if it is a request.
    pub fn response(self) -> Option<Self> {
        if self.is_response() {
            None
        } else {
            Self::from_u8(self.as_u8() + 1)
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MsgType::DnodeCreateTable => "create-table",
            MsgType::DnodeCreateTableRsp => "create-table-rsp",
            MsgType::DnodeRemoveTable => "remove-table",
            MsgType::DnodeRemoveTableRsp => "remove-table-rsp",
            MsgType::DnodeVPeers => "vpeers",
            MsgType::DnodeVPeersRsp => "vpeers-rsp",
            MsgType::DnodeFreeVnode => "free-vnode",
            MsgType::DnodeFreeVnodeRsp => "free-vnode-rsp",
            MsgType::DnodeCfg => "dnode-cfg",
            MsgType::DnodeCfgRsp => "dnode-cfg-rsp",
            MsgType::AlterStream => "alter-stream",
            MsgType::AlterStreamRsp => "alter-stream-rsp",
            MsgType::TableCfg => "table-cfg",
            MsgType::TableCfgRsp => "table-cfg-rsp",
            MsgType::VnodeCfg => "vnode-cfg",
            MsgType::VnodeCfgRsp => "vnode-cfg-rsp",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result codes carried in responses and returned by coordinator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    Success,
    /// The receiving coordinator is not the master; retry against the master.
    Redirect,
    InvalidTable,
    /// No vgroup owns the vnode. Expected for vnodes never assigned.
    NotActiveVnode,
    NotConfigured,
    InvalidSql,
    NodeOffline,
}

impl ResultCode {
    pub fn as_i32(self) -> i32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::Redirect => 1,
            ResultCode::InvalidTable => 2,
            ResultCode::NotActiveVnode => 3,
            ResultCode::NotConfigured => 4,
            ResultCode::InvalidSql => 5,
            ResultCode::NodeOffline => 6,
        }
    }

    pub fn from_i32(raw: i32) -> Option<Self> {
        let code = match raw {
            0 => ResultCode::Success,
            1 => ResultCode::Redirect,
            2 => ResultCode::InvalidTable,
            3 => ResultCode::NotActiveVnode,
            4 => ResultCode::NotConfigured,
            5 => ResultCode::InvalidSql,
            6 => ResultCode::NodeOffline,
            _ => return None,
        };
        Some(code)
    }

    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultCode::Success => "success",
            ResultCode::Redirect => "redirect",
            ResultCode::InvalidTable => "invalid table",
            ResultCode::NotActiveVnode => "not active vnode",
            ResultCode::NotConfigured => "not configured",
            ResultCode::InvalidSql => "invalid sql",
            ResultCode::NodeOffline => "node offline",
        };
        f.write_str(s)
    }
}

/// Opaque transport handle: a connection for responses, or a caller
/// correlation token for commands. The core only passes it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(pub u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_request_pairs_with_next_code() {
        for raw in (2u8..=16).step_by(2) {
            let req = MsgType::from_u8(raw).unwrap();
            assert!(!req.is_response());
            let rsp = req.response().unwrap();
            assert_eq!(rsp.as_u8(), raw + 1);
            assert!(rsp.is_response());
            assert_eq!(rsp.response(), None);
        }
    }

    #[test]
    fn unknown_msg_type() {
        assert_eq!(MsgType::from_u8(0), None);
        assert_eq!(MsgType::from_u8(1), None);
        assert_eq!(MsgType::from_u8(18), None);
        assert_eq!(MsgType::from_u8(255), None);
    }

    #[test]
    fn table_cfg_responds_with_table_cfg_rsp() {
        assert_eq!(MsgType::TableCfg.response(), Some(MsgType::TableCfgRsp));
        assert_eq!(MsgType::VnodeCfg.response(), Some(MsgType::VnodeCfgRsp));
    }

    #[test]
    fn result_codes_are_closed() {
        let all = [
            ResultCode::Success,
            ResultCode::Redirect,
            ResultCode::InvalidTable,
            ResultCode::NotActiveVnode,
            ResultCode::NotConfigured,
            ResultCode::InvalidSql,
            ResultCode::NodeOffline,
        ];
        for code in all {
            assert_eq!(ResultCode::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(ResultCode::from_i32(-1), None);
        assert_eq!(ResultCode::from_i32(7), None);
    }
}
