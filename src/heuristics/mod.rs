//! Foreground-UI classification and interruption.
//!
//! Layered heuristics evaluated in order of specificity over a [`UiNode`]
//! snapshot; first match wins, each heuristic is a pure function over the
//! tree. The engine runs inside the platform's event callback, so work is
//! bounded to one traversal per layer and nothing blocks. Corrective back
//! actions are throttled so the engine does not fight the app's own
//! navigation stack.

pub mod snapshot;

pub use snapshot::UiNode;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Serialize;

use crate::config;
use crate::core::blocklist::{BlocklistStore, Feature};
use crate::core::lock::{epoch_millis, LockManager, LockStatus};
use snapshot::contains_ignore_case;

const YOUTUBE_PACKAGE: &str = "com.google.android.youtube";
const SHORTS_TAB_TEXT: &str = "Shorts";
const SHORTS_ID_FRAGMENTS: &[&str] = &["shorts_player", "shorts_container"];

const INSTAGRAM_PACKAGE: &str = "com.instagram.android";
const REELS_TAB_TEXT: &str = "Reels";
const REELS_ID_FRAGMENTS: &[&str] = &["tab_reels", "reels_player"];

const CHROME_PACKAGE: &str = "com.android.chrome";
const CHROME_INCOGNITO_BADGE_ID: &str = "incognito_badge";

const BROWSER_PACKAGES: &[&str] = &[
    "com.android.chrome",
    "org.mozilla.firefox",
    "com.opera.browser",
    "com.opera.mini.native",
    "com.microsoft.emmx",
    "com.brave.browser",
    "com.duckduckgo.mobile.android",
    "com.sec.android.app.sbrowser",
    "com.huawei.browser",
];

/// Identifier fragments of browser URL and search inputs.
const URL_ID_FRAGMENTS: &[&str] = &["url_bar", "search_box"];

/// Curated term list for the browser scan. Substring, case-insensitive.
const PROHIBITED_TERMS: &[&str] = &[
    "porn",
    "xxx",
    "sex",
    "nude",
    "naked",
    "boobs",
    "tits",
    "pussy",
    "dick",
    "cock",
    "penis",
    "vagina",
    "fuck",
    "masturbat",
    "orgasm",
    "blowjob",
    "handjob",
    "anal",
    "hentai",
    "rule34",
    "nsfw",
    "adult video",
    "adult content",
    "adult site",
    "xvideos",
    "xnxx",
    "xhamster",
    "redtube",
    "youporn",
];

/// Substring indicators of a private/incognito browsing surface.
const INCOGNITO_INDICATORS: &[&str] = &["incognito", "private"];

/// Global navigation the platform dispatcher should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UiAction {
    /// Return to the launcher.
    GoHome,
    /// Navigate back out of the blocked surface.
    GoBack,
    /// Return to the launcher and bring the blocking app forward to explain.
    GoHomeAndSurface,
}

/// A corrective action plus the short notice to show the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intervention {
    pub action: UiAction,
    pub notice: String,
}

impl Intervention {
    fn new(action: UiAction, notice: &str) -> Self {
        Self {
            action,
            notice: notice.to_string(),
        }
    }
}

/// Classifies foreground snapshots while enforcement is mandatory.
///
/// Reads the blocklist and lock, never mutates either; the only state it
/// owns is the corrective-action throttle.
pub struct UiHeuristicEngine {
    blocklist: Arc<BlocklistStore>,
    lock: Arc<LockManager>,
    back_throttle: DefaultDirectRateLimiter,
}

impl UiHeuristicEngine {
    pub fn new(blocklist: Arc<BlocklistStore>, lock: Arc<LockManager>) -> Self {
        let quota = Quota::with_period(Duration::from_secs(config::BACK_ACTION_COOLDOWN_SECS))
            .expect("cooldown period is nonzero")
            .allow_burst(NonZeroU32::MIN);
        Self {
            blocklist,
            lock,
            back_throttle: RateLimiter::direct(quota),
        }
    }

    /// Classify one foreground snapshot.
    ///
    /// `None` means leave the app alone. Heuristics run in order of
    /// specificity; a wholly-blocked app short-circuits the rest.
    pub fn on_foreground_snapshot(&self, package: &str, root: &UiNode) -> Option<Intervention> {
        if self.lock.evaluate(epoch_millis()) == LockStatus::Inactive {
            return None;
        }

        if self.blocklist.is_app_blocked(package) {
            tracing::info!("Blocked app in foreground: {package}");
            return Some(Intervention::new(
                UiAction::GoHome,
                "App blocked during focus",
            ));
        }

        if package == YOUTUBE_PACKAGE
            && self.blocklist.is_feature_enabled(Feature::YoutubeShorts)
            && short_video_surface_active(root, SHORTS_TAB_TEXT, SHORTS_ID_FRAGMENTS)
        {
            return self.throttled_back("YouTube Shorts blocked during focus");
        }

        if package == INSTAGRAM_PACKAGE
            && self.blocklist.is_feature_enabled(Feature::InstagramReels)
            && short_video_surface_active(root, REELS_TAB_TEXT, REELS_ID_FRAGMENTS)
        {
            return self.throttled_back("Instagram Reels blocked during focus");
        }

        if BROWSER_PACKAGES.contains(&package) {
            if let Some(term) = prohibited_term(root) {
                tracing::debug!("Prohibited term match in {package}: {term}");
                return Some(if incognito_active(root, package) {
                    Intervention::new(
                        UiAction::GoHomeAndSurface,
                        "Prohibited content in a private tab",
                    )
                } else {
                    Intervention::new(UiAction::GoHome, "Prohibited content blocked during focus")
                });
            }
        }

        None
    }

    fn throttled_back(&self, notice: &str) -> Option<Intervention> {
        // Still inside the cooldown of the previous correction: stand down
        // and let the app's navigation settle.
        if self.back_throttle.check().is_err() {
            return None;
        }
        Some(Intervention::new(UiAction::GoBack, notice))
    }
}

/// Layered short-video detection: selected tab label, then identifier
/// fragment, then the structural fallback — the fallback only runs when the
/// feature label appears somewhere in the tree, to bound false positives.
fn short_video_surface_active(root: &UiNode, label: &str, id_fragments: &[&str]) -> bool {
    if root.any(&|n| n.selected && n.text_contains(label)) {
        return true;
    }
    if id_fragments
        .iter()
        .any(|fragment| root.any(&|n| n.identifier_contains(fragment)))
    {
        return true;
    }
    if root.any(&|n| n.text_contains(label)) {
        return vertical_feed_active(root);
    }
    false
}

/// Structural signal: a scrollable container whose subtree has a play/pause
/// affordance and at least two distinct social affordances.
fn vertical_feed_active(root: &UiNode) -> bool {
    let mut found = false;
    root.walk(&mut |node| {
        if !found && node.scrollable && feed_affordances_present(node) {
            found = true;
        }
    });
    found
}

fn feed_affordances_present(container: &UiNode) -> bool {
    if !container.any(&|n| n.text_contains("play") || n.text_contains("pause")) {
        return false;
    }
    let social = ["like", "comment", "share"]
        .iter()
        .filter(|&&affordance| container.any(&|n| n.text_contains(affordance)))
        .count();
    social >= 2
}

/// Scan editable nodes plus URL/search-box nodes for the term list. Other
/// visible text is deliberately not scanned, to bound false positives.
fn prohibited_term(root: &UiNode) -> Option<&'static str> {
    let mut matched = None;
    root.walk(&mut |node| {
        if matched.is_some() {
            return;
        }
        let candidate = node.editable
            || URL_ID_FRAGMENTS
                .iter()
                .any(|fragment| node.identifier_contains(fragment));
        if !candidate {
            return;
        }
        let Some(text) = node.text.as_deref() else {
            return;
        };
        if let Some(term) = PROHIBITED_TERMS
            .iter()
            .copied()
            .find(|term| contains_ignore_case(text, term))
        {
            matched = Some(term);
        }
    });
    matched
}

/// Private-mode detection: indicator text anywhere in the tree, or the
/// Chrome incognito badge identifier.
fn incognito_active(root: &UiNode, package: &str) -> bool {
    if INCOGNITO_INDICATORS
        .iter()
        .any(|indicator| root.any(&|n| n.text_contains(indicator)))
    {
        return true;
    }
    package == CHROME_PACKAGE && root.any(&|n| n.identifier_contains(CHROME_INCOGNITO_BADGE_ID))
}
