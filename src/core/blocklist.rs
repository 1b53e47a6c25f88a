//! Block rules: domains, applications, and per-feature toggles.
//!
//! Built-in domains are compiled in and immutable; user additions layer on
//! top of them. Readers take the merged domain view as an `Arc` snapshot
//! that is swapped whole on every mutation, so concurrent engine reads
//! never observe a partially updated set. App identifiers and feature flags
//! are read through their own concurrent structures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashSet;

use crate::store::Namespace;

const KEY_BLOCKED_DOMAINS: &str = "blocked_domains";
const KEY_BLOCKED_APPS: &str = "blocked_apps";
const KEY_BLOCK_YOUTUBE_SHORTS: &str = "block_youtube_shorts";
const KEY_BLOCK_INSTAGRAM_REELS: &str = "block_instagram_reels";

const LIST_DELIMITER: char = ',';

/// Domains blocked out of the box. Never removable.
pub const BUILT_IN_BLOCKED_DOMAINS: &[&str] = &[
    "pornhub.com",
    "pornhub.org",
    "pornhub.download",
    "xvideos.com",
    "xvideos2.com",
    "xvideos.download",
    "xnxx.com",
    "xnxx.tv",
    "xhamster.com",
    "xhamster1.com",
    "xhamster2.com",
    "redtube.com",
    "redtube.com.br",
    "youporn.com",
    "youporn.sexy",
    "pornhd.com",
    "pornhd8k.com",
    "spankbang.com",
    "tube8.com",
    "brazzers.com",
    "youjizz.com",
    "eporner.com",
    "beeg.com",
    "porntrex.com",
    "pornone.com",
    "porn.com",
    "pornmd.com",
    "porndig.com",
    "porngo.com",
    "pornhat.com",
    "pornkai.com",
    "pornburst.xxx",
    "pornoxo.com",
    "pornerbros.com",
    "pornheed.com",
    "pornhost.com",
    "pornktube.com",
    "pornlib.com",
    "pornmaki.com",
    "pornmaxim.com",
    "pornorips.com",
    "pornorip.com",
    "pornpros.com",
    "pornrabbit.com",
    "pornsocket.com",
    "pornsos.com",
    "porntube.com",
    "pornwatchers.com",
    "pornwhite.com",
    "pornzog.com",
    "pornflip.com",
    "pornleech.com",
    "imagefap.com",
    "erotic-pics.com",
    "pornpics.com",
    "adultfriendfinder.com",
    "fetlife.com",
    "chaturbate.com",
    "cam4.com",
    "myfreecams.com",
    "bongacams.com",
    "stripchat.com",
    "livejasmin.com",
    "ashleymadison.com",
    "onlyfans.com",
    "fansly.com",
    "nhentai.net",
    "hentaihaven.xxx",
    "hanime.tv",
    "hentai2read.com",
    "hentaifox.com",
    "nutaku.net",
    "f95zone.to",
    "mindgeek.com",
    "adultempire.com",
    "nudevista.com",
    "theporndude.com",
    "porngeek.com",
    "txxx.com",
    "upornia.com",
    "hclips.com",
    "hdzog.com",
    "drtuber.com",
    "tnaflix.com",
    "sunporno.com",
    "4tube.com",
];

/// A short-video surface that can be toggled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    YoutubeShorts,
    InstagramReels,
}

/// Thread-safe block-rule store backed by one persistence namespace.
pub struct BlocklistStore {
    prefs: Namespace,
    custom_domains: DashSet<String>,
    apps: DashSet<String>,
    youtube_shorts: AtomicBool,
    instagram_reels: AtomicBool,
    merged_domains: Mutex<Arc<HashSet<String>>>,
}

impl BlocklistStore {
    /// Load persisted rules from the namespace and materialize the merged
    /// view.
    pub fn new(prefs: Namespace) -> Self {
        let custom_domains = load_list(&prefs, KEY_BLOCKED_DOMAINS);
        let apps = load_list(&prefs, KEY_BLOCKED_APPS);
        let youtube_shorts =
            AtomicBool::new(prefs.get_bool(KEY_BLOCK_YOUTUBE_SHORTS).unwrap_or(false));
        let instagram_reels =
            AtomicBool::new(prefs.get_bool(KEY_BLOCK_INSTAGRAM_REELS).unwrap_or(false));

        let store = Self {
            prefs,
            custom_domains,
            apps,
            youtube_shorts,
            instagram_reels,
            merged_domains: Mutex::new(Arc::new(HashSet::new())),
        };
        store.rebuild_merged();
        store
    }

    /// Merged blocklist snapshot (custom ∪ built-in). The `Arc` is swapped
    /// whole on mutation; holders keep reading a consistent set.
    pub fn domains(&self) -> Arc<HashSet<String>> {
        Arc::clone(&self.merged_domains.lock().unwrap())
    }

    /// User-added domains only, sorted.
    pub fn custom_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .custom_domains
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        domains.sort();
        domains
    }

    /// Add a domain to the custom list. Normalized to trimmed lowercase;
    /// empty or malformed input and built-in duplicates are silent no-ops.
    pub fn add_domain(&self, domain: &str) {
        let Some(normalized) = normalize_domain(domain) else {
            return;
        };
        if BUILT_IN_BLOCKED_DOMAINS.contains(&normalized.as_str()) {
            return;
        }
        if !self.custom_domains.insert(normalized) {
            return;
        }
        self.persist_domains();
        self.rebuild_merged();
    }

    /// Remove a custom domain. Built-ins are permanent; removing one is a
    /// no-op.
    pub fn remove_domain(&self, domain: &str) {
        let Some(normalized) = normalize_domain(domain) else {
            return;
        };
        if BUILT_IN_BLOCKED_DOMAINS.contains(&normalized.as_str()) {
            return;
        }
        if self.custom_domains.remove(&normalized).is_none() {
            return;
        }
        self.persist_domains();
        self.rebuild_merged();
    }

    /// Blocked application identifiers, sorted.
    pub fn apps(&self) -> Vec<String> {
        let mut apps: Vec<String> = self.apps.iter().map(|entry| entry.key().clone()).collect();
        apps.sort();
        apps
    }

    /// Exact-match membership test. Platform identifiers are case-sensitive.
    pub fn is_app_blocked(&self, package: &str) -> bool {
        self.apps.contains(package)
    }

    /// Add an application identifier. Trimmed, otherwise stored verbatim.
    pub fn add_app(&self, package: &str) {
        let Some(normalized) = normalize_app(package) else {
            return;
        };
        if self.apps.insert(normalized) {
            self.persist_apps();
        }
    }

    pub fn remove_app(&self, package: &str) {
        let Some(normalized) = normalize_app(package) else {
            return;
        };
        if self.apps.remove(&normalized).is_some() {
            self.persist_apps();
        }
    }

    pub fn is_feature_enabled(&self, feature: Feature) -> bool {
        self.flag(feature).load(Ordering::Relaxed)
    }

    pub fn set_feature_enabled(&self, feature: Feature, enabled: bool) {
        self.flag(feature).store(enabled, Ordering::Relaxed);
        let key = match feature {
            Feature::YoutubeShorts => KEY_BLOCK_YOUTUBE_SHORTS,
            Feature::InstagramReels => KEY_BLOCK_INSTAGRAM_REELS,
        };
        self.prefs.put_bool(key, enabled);
        tracing::info!("Feature {feature:?} blocking set to {enabled}");
    }

    fn flag(&self, feature: Feature) -> &AtomicBool {
        match feature {
            Feature::YoutubeShorts => &self.youtube_shorts,
            Feature::InstagramReels => &self.instagram_reels,
        }
    }

    fn persist_domains(&self) {
        self.prefs
            .put_string(KEY_BLOCKED_DOMAINS, &join_list(&self.custom_domains));
    }

    fn persist_apps(&self) {
        self.prefs
            .put_string(KEY_BLOCKED_APPS, &join_list(&self.apps));
    }

    fn rebuild_merged(&self) {
        let mut merged: HashSet<String> = BUILT_IN_BLOCKED_DOMAINS
            .iter()
            .map(|d| d.to_string())
            .collect();
        for domain in self.custom_domains.iter() {
            merged.insert(domain.key().clone());
        }
        *self.merged_domains.lock().unwrap() = Arc::new(merged);
    }
}

/// Trim and lowercase. Rejects empty input and anything that would corrupt
/// the delimited persisted list.
fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw.trim().to_lowercase();
    if domain.is_empty()
        || domain.contains(LIST_DELIMITER)
        || domain.contains(char::is_whitespace)
    {
        return None;
    }
    Some(domain)
}

/// Trim only; platform identifiers are case-sensitive.
fn normalize_app(raw: &str) -> Option<String> {
    let package = raw.trim();
    if package.is_empty()
        || package.contains(LIST_DELIMITER)
        || package.contains(char::is_whitespace)
    {
        return None;
    }
    Some(package.to_string())
}

fn load_list(prefs: &Namespace, key: &str) -> DashSet<String> {
    match prefs.get_string(key) {
        Some(raw) => raw
            .split(LIST_DELIMITER)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        None => DashSet::new(),
    }
}

fn join_list(set: &DashSet<String>) -> String {
    let mut entries: Vec<String> = set.iter().map(|entry| entry.key().clone()).collect();
    entries.sort();
    entries.join(",")
}
