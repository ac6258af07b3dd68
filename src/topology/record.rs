use std::ops::Range;

use crate::constants::FLAG_PRIMARY;
use crate::constants::FLAG_REPLICA;
use crate::constants::FLAG_SELF;
use crate::constants::LINK_DISCONNECTED;
use crate::constants::STALE_FLAGS;
use crate::Endpoint;
use crate::Result;
use crate::StorageError;

/// One member line of the topology record:
/// `<id> <ip:port@bus[,hostname]> <flags> <primary-id|-> <ping> <pong> <epoch> <link> [slots...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub id: String,
    pub ip: String,
    pub port: u16,
    pub bus_port: u16,
    pub hostname: Option<String>,
    pub flags: Vec<String>,
    pub primary_id: Option<String>,
    pub link_state: String,
    /// Line number in the record (0-based)
    line: usize,
    /// Byte range of `ip` inside its line
    ip_span: Range<usize>,
}

impl NodeEntry {
    pub fn has_flag(
        &self,
        flag: &str,
    ) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn is_self(&self) -> bool {
        self.has_flag(FLAG_SELF)
    }

    pub fn is_primary(&self) -> bool {
        self.has_flag(FLAG_PRIMARY)
    }

    pub fn is_replica(&self) -> bool {
        self.has_flag(FLAG_REPLICA)
    }

    /// Failure, address-less, unfinished handshake, or disconnected link.
    pub fn is_stale(&self) -> bool {
        STALE_FLAGS.iter().any(|f| self.has_flag(f)) || self.link_state == LINK_DISCONNECTED
    }

    /// Hostname when announced, recorded address otherwise.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.hostname.clone().unwrap_or_else(|| self.ip.clone()), self.port)
    }
}

fn malformed(
    line: usize,
    reason: impl Into<String>,
) -> StorageError {
    StorageError::MalformedRecord {
        line: line + 1,
        reason: reason.into(),
    }
}

/// Parses `ip:port@bus[,hostname]`, returning the entry fields and the byte
/// range of `ip` relative to the token start.
fn parse_address(
    token: &str,
    line: usize,
) -> Result<(String, u16, u16, Option<String>, Range<usize>)> {
    let (addr, hostname) = match token.split_once(',') {
        Some((addr, host)) => (addr, (!host.is_empty()).then(|| host.to_string())),
        None => (token, None),
    };
    let (host_port, bus) = addr
        .split_once('@')
        .ok_or_else(|| malformed(line, format!("address {token} lacks a bus port")))?;
    let (ip, port) = host_port
        .rsplit_once(':')
        .ok_or_else(|| malformed(line, format!("address {token} lacks a port")))?;
    let port = port
        .parse()
        .map_err(|_| malformed(line, format!("bad port in {token}")))?;
    let bus_port = bus
        .parse()
        .map_err(|_| malformed(line, format!("bad bus port in {token}")))?;
    Ok((ip.to_string(), port, bus_port, hostname, 0..ip.len()))
}

/// The durable cluster member table. Keeps the raw text so rewrites touch
/// nothing but the targeted bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyRecord {
    raw: String,
    entries: Vec<NodeEntry>,
}

impl TopologyRecord {
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("vars ") || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = Vec::new();
            let mut offset = 0;
            for token in line.split(' ') {
                if !token.is_empty() {
                    fields.push((offset, token));
                }
                offset += token.len() + 1;
            }
            if fields.len() < 8 {
                return Err(malformed(line_no, format!("expected at least 8 fields, found {}", fields.len())).into());
            }

            let (addr_offset, addr_token) = fields[1];
            let (ip, port, bus_port, hostname, ip_span) = parse_address(addr_token, line_no)?;
            let primary = fields[3].1;
            entries.push(NodeEntry {
                id: fields[0].1.to_string(),
                ip,
                port,
                bus_port,
                hostname,
                flags: fields[2].1.split(',').map(str::to_string).collect(),
                primary_id: (primary != "-").then(|| primary.to_string()),
                link_state: fields[7].1.to_string(),
                line: line_no,
                ip_span: (ip_span.start + addr_offset)..(ip_span.end + addr_offset),
            });
        }
        Ok(Self {
            raw: text.to_string(),
            entries,
        })
    }

    pub fn entries(&self) -> &[NodeEntry] {
        &self.entries
    }

    pub fn render(&self) -> &str {
        &self.raw
    }

    /// The entry flagged `myself`; anything but exactly one is an error.
    pub fn self_entry(&self) -> Result<&NodeEntry> {
        let mut selves = self.entries.iter().filter(|e| e.is_self());
        match (selves.next(), selves.next()) {
            (Some(entry), None) => Ok(entry),
            _ => Err(StorageError::SelfEntryCount(self.entries.iter().filter(|e| e.is_self()).count()).into()),
        }
    }

    pub fn entry(
        &self,
        id: &str,
    ) -> Option<&NodeEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Non-self members whose addressing may be out of date.
    pub fn stale_peers(&self) -> impl Iterator<Item = &NodeEntry> {
        self.entries.iter().filter(|e| !e.is_self() && e.is_stale())
    }

    /// Replaces the self entry's recorded address with `new_ip`, leaving every
    /// other byte of the record untouched. Returns whether anything changed.
    pub fn rewrite_self_address(
        &mut self,
        new_ip: &str,
    ) -> Result<bool> {
        let entry = self.self_entry()?.clone();
        if entry.ip == new_ip {
            return Ok(false);
        }

        let mut out = String::with_capacity(self.raw.len() + new_ip.len());
        for (line_no, segment) in self.raw.split_inclusive('\n').enumerate() {
            if line_no == entry.line {
                out.push_str(&segment[..entry.ip_span.start]);
                out.push_str(new_ip);
                out.push_str(&segment[entry.ip_span.end..]);
            } else {
                out.push_str(segment);
            }
        }
        *self = Self::parse(&out)?;
        Ok(true)
    }
}
