use crate::core::io_lock::IoLock;
use crate::models::error::SError;
use crate::models::mod_dto::{Mod, ModVariant};
use crate::models::mod_info::{ModId, VersionCheckerInfo};
use crate::models::version_checker::VersionCheckerCache;
use crate::utils::json::from_lenient_str;
use crate::utils::time::now_millis;
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::RwLock;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Downloads the text at a URL. Transport is up to the caller.
pub trait VersionFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, SError>;
}

/// Online version lookup for mods that ship a `.version` file, with the results
/// cached on disk between runs.
pub struct VersionChecker {
    io_lock: Arc<IoLock>,
    cache_file: Utf8PathBuf,
    cache: RwLock<VersionCheckerCache>,
    fetcher: Arc<dyn VersionFetcher>,
    interval: Duration,
}

fn github_file_page() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^https://github\.com/.+/blob/.+/assets/.+\.version$").expect("static regex")
    })
}

fn dropbox_dl_page() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^https://www\.dropbox\.com/s/.+/.+\.version\?dl=0$").expect("static regex")
    })
}

fn replace_ignore_case(input: &str, pattern: &str, replacement: &str) -> String {
    Regex::new(&format!("(?i){}", regex::escape(pattern)))
        .map(|re| re.replace_all(input, replacement).into_owned())
        .unwrap_or_else(|_| input.to_string())
}

/// Corrects links authors commonly paste instead of the raw file: a GitHub file page
/// instead of raw content, or a Dropbox preview (`dl=0`) instead of a download.
pub fn fix_url(url: &str) -> String {
    let fixed = if github_file_page().is_match(url) {
        let raw = replace_ignore_case(url, "github.com", "raw.githubusercontent.com");
        replace_ignore_case(&raw, "blob/", "")
    } else if dropbox_dl_page().is_match(url) {
        replace_ignore_case(url, "dl=0", "dl=1")
    } else {
        url.to_string()
    };

    if fixed != url {
        info!("Fixed version checker url from '{url}' to '{fixed}'.");
    }
    fixed
}

impl VersionChecker {
    /// Loads the persisted cache from `cache_file`. An unreadable cache starts empty.
    pub fn new(
        io_lock: Arc<IoLock>,
        cache_file: &Utf8Path,
        fetcher: Arc<dyn VersionFetcher>,
        interval: Duration,
    ) -> Self {
        let cache = io_lock
            .with_read(|| fs::read_to_string(cache_file))
            .ok()
            .and_then(|json| {
                from_lenient_str::<VersionCheckerCache>(&json)
                    .inspect_err(|e| warn!("Ignoring unreadable version cache {cache_file}: {e}"))
                    .ok()
            })
            .unwrap_or_default();

        Self {
            io_lock,
            cache_file: cache_file.to_path_buf(),
            cache: RwLock::new(cache),
            fetcher,
            interval,
        }
    }

    /// Cached online version info of a mod.
    pub fn online_version(&self, mod_id: &str) -> Option<VersionCheckerInfo> {
        self.cache.read().online_versions.get(mod_id).cloned()
    }

    pub fn last_check_timestamp(&self) -> i64 {
        self.cache.read().last_check_timestamp
    }

    /// True when the online version is newer than the highest installed one.
    pub fn has_update(&self, mod_: &Mod) -> bool {
        let Some(online) = self.online_version(&mod_.id).and_then(|i| i.mod_version) else {
            return false;
        };
        let Some(local) = mod_.find_highest_version() else {
            return false;
        };
        let local_version = local
            .version_checker_info
            .as_ref()
            .and_then(|i| i.mod_version.as_ref())
            .unwrap_or(local.version());

        online > *local_version
    }

    /// Fetches the online version of every mod that declares one. Skipped unless
    /// `force` or the check interval has passed. Individual failures are logged.
    /// Returns how many mods were looked up.
    pub fn lookup_versions(&self, mods: &[Mod], force: bool) -> Result<usize, SError> {
        let since_last_check = now_millis() - self.last_check_timestamp();
        let interval = self.interval.as_millis() as i64;

        if !force && since_last_check < interval {
            info!(
                "Skipping version check, it has only been {}s of {}s.",
                since_last_check / 1000,
                interval / 1000
            );
            return Ok(0);
        }

        let start = Instant::now();
        let mut seen = HashSet::new();
        let candidates: Vec<(&ModId, &ModVariant, String)> = mods
            .iter()
            .filter(|m| seen.insert(m.id.as_str()))
            .filter_map(|m| m.find_highest_version().map(|v| (&m.id, v)))
            .filter_map(|(id, v)| {
                v.version_checker_info
                    .as_ref()
                    .and_then(|i| i.master_version_file.as_deref())
                    .filter(|url| !url.trim().is_empty())
                    .map(|url| (id, v, url.to_string()))
            })
            .collect();

        let results: BTreeMap<ModId, VersionCheckerInfo> = candidates
            .par_iter()
            .filter_map(|(id, variant, url)| {
                let url = fix_url(url);
                match self
                    .fetcher
                    .fetch(&url)
                    .and_then(|text| from_lenient_str::<VersionCheckerInfo>(&text))
                {
                    Ok(online) => {
                        debug!(
                            "Version checked {}: existing: {:?}, online: {:?} (url: {url})",
                            variant.mod_info.display_name(),
                            variant.version_checker_info.as_ref().and_then(|i| i.mod_version.as_ref()),
                            online.mod_version
                        );
                        Some(((*id).clone(), online))
                    }
                    Err(e) => {
                        // Error pages tend to come back whole; the first line is enough.
                        let message = e.to_string();
                        warn!(
                            "Version check failed for {}: {} (url: {url})",
                            variant.mod_info.display_name(),
                            message.lines().next().unwrap_or_default()
                        );
                        None
                    }
                }
            })
            .collect();

        let count = results.len();
        {
            let mut cache = self.cache.write();
            cache.online_versions = results;
            cache.last_check_timestamp = now_millis();
        }
        self.save()?;

        info!("Version checked {} mods in {:?}.", candidates.len(), start.elapsed());
        Ok(count)
    }

    fn save(&self) -> Result<(), SError> {
        let json = serde_json::to_string_pretty(&*self.cache.read())?;
        self.io_lock.with_write(|| {
            if let Some(parent) = self.cache_file.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.cache_file, json)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_github_file_page() {
        assert_eq!(
            fix_url("https://github.com/someone/MyMod/blob/master/assets/MyMod.version"),
            "https://raw.githubusercontent.com/someone/MyMod/master/assets/MyMod.version"
        );
    }

    #[test]
    fn test_fix_dropbox_preview_link() {
        assert_eq!(
            fix_url("https://www.dropbox.com/s/abc123/MyMod.version?dl=0"),
            "https://www.dropbox.com/s/abc123/MyMod.version?dl=1"
        );
    }

    #[test]
    fn test_leaves_other_urls_alone() {
        let url = "https://raw.githubusercontent.com/someone/MyMod/master/MyMod.version";
        assert_eq!(fix_url(url), url);
        assert_eq!(fix_url("https://www.dropbox.com/s/abc/MyMod.version?dl=1"), "https://www.dropbox.com/s/abc/MyMod.version?dl=1");
    }
}
