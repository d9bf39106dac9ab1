use crate::error::{DnsError, Result};
use crate::types::ServerEntry;
use parking_lot::RwLock;
use tracing::debug;

/// 内置 DNS 服务器，按此顺序测试
pub const DEFAULT_SERVERS: &[(&str, &str)] = &[
    ("Google", "8.8.8.8"),
    ("Cloudflare", "1.1.1.1"),
    ("OpenDNS", "208.67.222.222"),
    ("Quad9", "9.9.9.9"),
];

fn validate_address(address: &str) -> Result<&str> {
    let address = address.trim();
    if address.is_empty() {
        return Err(DnsError::InvalidInput(
            "DNS server address must not be empty".to_string(),
        ));
    }
    Ok(address)
}

/// The live set of servers under test, keyed by display name.
///
/// Entries keep insertion order. Re-inserting an existing name replaces its
/// address in place. Safe to share between threads: `add` and `snapshot`
/// each take the lock once, so a reader never sees a half-applied insert.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<Vec<ServerEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        let registry = Self::empty();
        for (name, address) in DEFAULT_SERVERS {
            registry.upsert(ServerEntry::new(name, address));
        }
        registry
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// 添加自定义服务器，名称为 `Custom-<address>`
    pub fn add(&self, address: &str) -> Result<ServerEntry> {
        let address = validate_address(address)?;
        let entry = ServerEntry::new(&format!("Custom-{}", address), address);
        self.upsert(entry.clone());
        Ok(entry)
    }

    /// Insert or overwrite `name`. Last write wins; position is kept.
    pub fn insert(&self, name: &str, address: &str) -> Result<ServerEntry> {
        let entry = ServerEntry::new(name, validate_address(address)?);
        self.upsert(entry.clone());
        Ok(entry)
    }

    fn upsert(&self, entry: ServerEntry) {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => {
                debug!(name = %entry.name, old = %existing.address, new = %entry.address, "overwriting server");
                existing.address = entry.address;
            }
            None => {
                debug!(name = %entry.name, address = %entry.address, "adding server");
                entries.push(entry);
            }
        }
    }

    /// Exact name first, then a case-insensitive match for CLI convenience.
    pub fn get(&self, name: &str) -> Option<ServerEntry> {
        let entries = self.entries.read();
        entries
            .iter()
            .find(|e| e.name == name)
            .or_else(|| entries.iter().find(|e| e.name.eq_ignore_ascii_case(name)))
            .cloned()
    }

    /// Point-in-time copy in insertion order.
    pub fn snapshot(&self) -> Vec<ServerEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}
