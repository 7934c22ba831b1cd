//! The client profile registry (component E): resolves a requesting
//! connection to a `ClientProfile` and the quirk flags that alter
//! Browse/Search response shape downstream.

use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ipnet::IpNet;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cds::storage::{ClientObservation, StorageBackend};

/// Boolean flags on a client profile that alter response shape — a
/// locally-scoped bitset rather than pulling in a dependency for one
/// more seven-bit set (mirrors `object::ObjectFlags`'s approach).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quirks(pub u32);

impl Quirks {
    pub const SAMSUNG: Quirks = Quirks(1 << 0);
    pub const SAMSUNG_FEATURES: Quirks = Quirks(1 << 1);
    pub const SAMSUNG_HIDE_DYNAMIC: Quirks = Quirks(1 << 2);
    pub const DCM10: Quirks = Quirks(1 << 3);
    pub const CAPTION_PROTOCOL: Quirks = Quirks(1 << 4);
    pub const IRADIO: Quirks = Quirks(1 << 5);
    pub const SIMPLE_DATE: Quirks = Quirks(1 << 6);
    pub const PANASONIC: Quirks = Quirks(1 << 7);
    pub const STRICT_XML: Quirks = Quirks(1 << 8);
    pub const ASCII_XML: Quirks = Quirks(1 << 9);
    pub const FORCE_NO_CONVERSION: Quirks = Quirks(1 << 10);
    pub const FORCE_SORT_CRITERIA_TITLE: Quirks = Quirks(1 << 11);
    pub const PV_SUBTITLES: Quirks = Quirks(1 << 12);

    pub fn empty() -> Self {
        Quirks(0)
    }

    pub fn contains(self, other: Quirks) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Quirks) {
        self.0 |= other.0;
    }

    pub fn from_name(name: &str) -> Option<Quirks> {
        Some(match name {
            "Samsung" => Quirks::SAMSUNG,
            "SamsungFeatures" => Quirks::SAMSUNG_FEATURES,
            "SamsungHideDynamic" => Quirks::SAMSUNG_HIDE_DYNAMIC,
            "DCM10" => Quirks::DCM10,
            "CaptionProtocol" => Quirks::CAPTION_PROTOCOL,
            "IRadio" => Quirks::IRADIO,
            "SimpleDate" => Quirks::SIMPLE_DATE,
            "Panasonic" => Quirks::PANASONIC,
            "StrictXML" => Quirks::STRICT_XML,
            "AsciiXML" => Quirks::ASCII_XML,
            "ForceNoConversion" => Quirks::FORCE_NO_CONVERSION,
            "ForceSortCriteriaTitle" => Quirks::FORCE_SORT_CRITERIA_TITLE,
            "PVSubtitles" => Quirks::PV_SUBTITLES,
            _ => return None,
        })
    }
}

impl std::ops::BitOr for Quirks {
    type Output = Quirks;
    fn bitor(self, rhs: Quirks) -> Quirks {
        Quirks(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    None,
    UserAgent,
    FriendlyName,
    ModelName,
    Manufacturer,
    Ip,
}

#[derive(Debug, Clone)]
pub struct ClientProfile {
    pub name: String,
    pub group: String,
    pub device_type: String,
    pub quirks: Quirks,
    pub match_type: MatchType,
    pub match_pattern: String,
    pub string_limit: Option<usize>,
}

impl ClientProfile {
    pub fn unknown() -> Self {
        Self {
            name: "Unknown".to_string(),
            group: "primary".to_string(),
            device_type: "generic".to_string(),
            quirks: Quirks::empty(),
            match_type: MatchType::None,
            match_pattern: String::new(),
            string_limit: None,
        }
    }

    fn matches_ip(&self, addr: IpAddr) -> bool {
        if let Ok(net) = IpNet::from_str(&self.match_pattern) {
            return net.contains(&addr);
        }
        IpAddr::from_str(&self.match_pattern).map(|ip| ip == addr).unwrap_or(false)
    }

    fn matches_user_agent(&self, user_agent: &str) -> bool {
        !self.match_pattern.is_empty() && user_agent.contains(&self.match_pattern)
    }

    /// Builds a profile from a configured entry, folding its `quirks`
    /// name list into the bitset via `Quirks::from_name`. Unknown quirk
    /// names are logged and skipped rather than rejecting the whole
    /// config — a typo in one quirk shouldn't take down client matching
    /// for every other configured profile.
    pub fn from_config(config: &crate::config::ClientProfileConfig) -> Self {
        let mut quirks = Quirks::empty();
        for name in &config.quirks {
            match Quirks::from_name(name) {
                Some(q) => quirks.set(q),
                None => tracing::warn!(quirk = %name, profile = %config.name, "unknown quirk name in client profile config"),
            }
        }
        Self {
            name: config.name.clone(),
            group: config.group.clone().unwrap_or_else(|| "primary".to_string()),
            device_type: "generic".to_string(),
            quirks,
            match_type: MatchType::from(config.match_type),
            match_pattern: config.pattern.clone(),
            string_limit: config.string_limit,
        }
    }
}

impl From<crate::config::ClientMatchTypeConfig> for MatchType {
    fn from(value: crate::config::ClientMatchTypeConfig) -> Self {
        use crate::config::ClientMatchTypeConfig as Cfg;
        match value {
            Cfg::UserAgent => MatchType::UserAgent,
            Cfg::FriendlyName => MatchType::FriendlyName,
            Cfg::ModelName => MatchType::ModelName,
            Cfg::Manufacturer => MatchType::Manufacturer,
            Cfg::Ip => MatchType::Ip,
        }
    }
}

fn builtin_profiles() -> Vec<ClientProfile> {
    vec![
        ClientProfile {
            name: "Samsung TV".to_string(),
            group: "primary".to_string(),
            device_type: "tv".to_string(),
            quirks: Quirks::SAMSUNG | Quirks::SAMSUNG_FEATURES | Quirks::SIMPLE_DATE,
            match_type: MatchType::UserAgent,
            match_pattern: "SEC_HHP".to_string(),
            string_limit: None,
        },
        ClientProfile {
            name: "Panasonic TV".to_string(),
            group: "primary".to_string(),
            device_type: "tv".to_string(),
            quirks: Quirks::PANASONIC | Quirks::STRICT_XML,
            match_type: MatchType::UserAgent,
            match_pattern: "Panasonic".to_string(),
            string_limit: Some(101),
        },
        ClientProfile {
            name: "PlayStation".to_string(),
            group: "primary".to_string(),
            device_type: "game-console".to_string(),
            quirks: Quirks::ASCII_XML,
            match_type: MatchType::UserAgent,
            match_pattern: "PLAYSTATION".to_string(),
            string_limit: None,
        },
    ]
}

struct CachedObservation {
    profile_name: String,
    last_seen: i64,
}

/// Holds the built-in plus configured profile table and an IP-keyed
/// observation cache. Stale entries are evicted lazily on the lookup
/// path rather than by a background timer.
pub struct ClientManager {
    profiles: Vec<ClientProfile>,
    cache: Mutex<HashMap<String, CachedObservation>>,
    eviction_threshold_secs: i64,
    storage: Arc<dyn StorageBackend>,
}

fn now_ts() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

impl ClientManager {
    pub fn new(storage: Arc<dyn StorageBackend>, configured: Vec<ClientProfile>) -> Self {
        let mut profiles = builtin_profiles();
        profiles.extend(configured);
        Self {
            profiles,
            cache: Mutex::new(HashMap::new()),
            eviction_threshold_secs: 7 * 24 * 3600,
            storage,
        }
    }

    /// Loads previously persisted observations from storage so profile
    /// resolution survives a restart.
    pub async fn reload_observations(&self) {
        if let Ok(rows) = self.storage.load_client_observations().await {
            let mut cache = self.cache.lock().await;
            for row in rows {
                if let Some(profile_name) = row.profile_name {
                    cache.insert(
                        row.addr,
                        CachedObservation { profile_name, last_seen: row.last_seen },
                    );
                }
            }
        }
    }

    fn evict_stale(&self, cache: &mut HashMap<String, CachedObservation>) {
        let threshold = now_ts() - self.eviction_threshold_secs;
        cache.retain(|_, obs| obs.last_seen >= threshold);
    }

    fn find_profile(&self, name: &str) -> ClientProfile {
        self.profiles.iter().find(|p| p.name == name).cloned().unwrap_or_else(ClientProfile::unknown)
    }

    /// Resolution order: IP match, then UA substring match in reverse
    /// declaration order (later/configured entries win), then cache hit
    /// by IP, then the `Unknown` fallback.
    pub async fn resolve(&self, addr: IpAddr, user_agent: Option<&str>) -> ClientProfile {
        for profile in &self.profiles {
            if profile.match_type == MatchType::Ip && profile.matches_ip(addr) {
                debug!(%addr, profile = %profile.name, "client resolved by IP match");
                return profile.clone();
            }
        }

        if let Some(ua) = user_agent {
            for profile in self.profiles.iter().rev() {
                if profile.match_type == MatchType::UserAgent && profile.matches_user_agent(ua) {
                    debug!(%addr, profile = %profile.name, "client resolved by user-agent match");
                    self.remember(addr, user_agent, &profile.name).await;
                    return profile.clone();
                }
            }
        }

        {
            let mut cache = self.cache.lock().await;
            self.evict_stale(&mut cache);
            if let Some(obs) = cache.get(&addr.to_string()) {
                return self.find_profile(&obs.profile_name);
            }
        }

        let unknown = ClientProfile::unknown();
        self.remember(addr, user_agent, &unknown.name).await;
        unknown
    }

    /// Records an observation both in the in-memory cache and (best
    /// effort) through the Storage Engine.
    async fn remember(&self, addr: IpAddr, user_agent: Option<&str>, profile_name: &str) {
        let ts = now_ts();
        {
            let mut cache = self.cache.lock().await;
            let entry = cache.entry(addr.to_string()).or_insert_with(|| CachedObservation {
                profile_name: profile_name.to_string(),
                last_seen: ts,
            });
            entry.profile_name = profile_name.to_string();
            entry.last_seen = ts;
        }

        let obs = ClientObservation {
            addr: addr.to_string(),
            port: 0,
            last_seen: ts,
            first_seen: ts,
            user_agent: user_agent.map(str::to_string),
            headers: String::new(),
            profile_name: Some(profile_name.to_string()),
        };
        let _ = self.storage.save_client_observation(&obs).await;
    }

    /// True when any observed client carries the `SamsungFeatures` quirk
    /// — drives whether SSDP advertises the Samsung MediaReceiverRegistrar
    /// service.
    pub async fn any_client_wants_samsung_features(&self) -> bool {
        let cache = self.cache.lock().await;
        cache.values().any(|obs| self.find_profile(&obs.profile_name).quirks.contains(Quirks::SAMSUNG_FEATURES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cds::storage::sqlite::SqliteStorage;

    async fn test_manager() -> ClientManager {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            SqliteStorage::new(&dir.path().join("clients.db"), true).await.unwrap(),
        ) as Arc<dyn StorageBackend>;
        // Keep the tempdir alive for the duration of the test by leaking it;
        // acceptable in a unit test that exits promptly.
        std::mem::forget(dir);
        ClientManager::new(storage, Vec::new())
    }

    #[tokio::test]
    async fn resolves_by_user_agent_substring() {
        let manager = test_manager().await;
        let profile = manager.resolve("10.0.0.5".parse().unwrap(), Some("SEC_HHP/TV")).await;
        assert_eq!(profile.name, "Samsung TV");
        assert!(profile.quirks.contains(Quirks::SAMSUNG));
    }

    #[tokio::test]
    async fn falls_back_to_unknown_profile() {
        let manager = test_manager().await;
        let profile = manager.resolve("10.0.0.6".parse().unwrap(), Some("curl/8.0")).await;
        assert_eq!(profile.name, "Unknown");
    }

    #[tokio::test]
    async fn ip_match_wins_over_unknown_user_agent() {
        let mut manager = test_manager().await;
        manager.profiles.push(ClientProfile {
            name: "Subnet Profile".to_string(),
            group: "primary".to_string(),
            device_type: "generic".to_string(),
            quirks: Quirks::empty(),
            match_type: MatchType::Ip,
            match_pattern: "192.168.2.0/24".to_string(),
            string_limit: None,
        });
        let profile = manager.resolve("192.168.2.100".parse().unwrap(), Some("unknown")).await;
        assert_eq!(profile.name, "Subnet Profile");
    }
}
