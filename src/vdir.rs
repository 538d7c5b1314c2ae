//! Contact store backed by a vdir: a directory tree of `.vcf` files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::directory::SortOrder;
use crate::photo::ThumbnailCache;
use crate::record::ContactRecord;
use crate::search;
use crate::source::{
    is_included, AuthorizationStatus, ContactSource, FetchField, InclusionPredicate,
};
use crate::vcard_io;

/// How access to the vdir is authorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Ask once through the configured [`AccessPrompt`].
    #[default]
    Prompt,
    Allow,
    Deny,
    Restricted,
}

/// Asks the user whether `app_name` may read their contacts.
#[async_trait]
pub trait AccessPrompt: Send + Sync {
    /// `Some(true)` grants, `Some(false)` refuses, `None` means the prompt was
    /// dismissed without an answer.
    async fn ask(&self, app_name: &str) -> Option<bool>;
}

pub struct VdirSource {
    root: PathBuf,
    app_name: String,
    policy: AccessPolicy,
    prompt: Option<Arc<dyn AccessPrompt>>,
    answer: Mutex<Option<AuthorizationStatus>>,
    default_order: SortOrder,
    thumbnails: ThumbnailCache,
    /// Records from the last full read of the tree. Searches run against it.
    snapshot: Mutex<Option<Arc<Vec<ContactRecord>>>>,
}

impl VdirSource {
    pub fn new(root: impl Into<PathBuf>, app_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            thumbnails: ThumbnailCache::for_app(crate::APP_NAME),
            app_name: app_name.into(),
            policy: AccessPolicy::default(),
            prompt: None,
            answer: Mutex::new(None),
            default_order: SortOrder::GivenName,
            snapshot: Mutex::new(None),
        }
    }

    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn AccessPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_default_sort_order(mut self, order: SortOrder) -> Self {
        self.default_order = order.resolve(SortOrder::GivenName);
        self
    }

    pub fn with_thumbnails(mut self, thumbnails: ThumbnailCache) -> Self {
        self.thumbnails = thumbnails;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn remembered_answer(&self) -> Option<AuthorizationStatus> {
        *self
            .answer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remember(&self, status: AuthorizationStatus) {
        *self
            .answer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(status);
    }

    fn ensure_authorized(&self) -> Result<()> {
        if self.check_authorization() != AuthorizationStatus::Authorized {
            bail!("access to {} has not been granted", self.root.display());
        }
        Ok(())
    }

    /// Read the whole tree and replace the snapshot.
    async fn reload(&self) -> Result<Arc<Vec<ContactRecord>>> {
        self.ensure_authorized()?;
        let root = self.root.clone();
        let thumbnails = self.thumbnails.clone();
        let records = tokio::task::spawn_blocking(move || load_records(&root, &thumbnails))
            .await
            .map_err(|err| anyhow!("vdir loader task failed: {err}"))??;

        let records = Arc::new(records);
        *self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&records));
        Ok(records)
    }

    /// The snapshot, reading the tree only if nothing has been loaded yet.
    async fn cached(&self) -> Result<Arc<Vec<ContactRecord>>> {
        self.ensure_authorized()?;
        let cached = self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match cached {
            Some(records) => Ok(records),
            None => self.reload().await,
        }
    }
}

#[async_trait]
impl ContactSource for VdirSource {
    fn check_authorization(&self) -> AuthorizationStatus {
        match self.policy {
            AccessPolicy::Allow => AuthorizationStatus::Authorized,
            AccessPolicy::Deny => AuthorizationStatus::Denied,
            AccessPolicy::Restricted => AuthorizationStatus::Restricted,
            AccessPolicy::Prompt => self
                .remembered_answer()
                .unwrap_or(AuthorizationStatus::Undetermined),
        }
    }

    async fn request_access(&self) -> AuthorizationStatus {
        let current = self.check_authorization();
        if current != AuthorizationStatus::Undetermined {
            return current;
        }
        let Some(prompt) = &self.prompt else {
            debug!("no access prompt configured");
            return current;
        };

        match prompt.ask(&self.app_name).await {
            Some(true) => {
                info!(vdir = %self.root.display(), "access granted");
                self.remember(AuthorizationStatus::Authorized);
                AuthorizationStatus::Authorized
            }
            Some(false) => {
                info!(vdir = %self.root.display(), "access refused");
                self.remember(AuthorizationStatus::Denied);
                AuthorizationStatus::Denied
            }
            None => AuthorizationStatus::Undetermined,
        }
    }

    fn default_sort_order(&self) -> SortOrder {
        self.default_order
    }

    async fn enumerate_all(
        &self,
        fields: &[FetchField],
        include: Option<&InclusionPredicate>,
    ) -> Result<Vec<ContactRecord>> {
        let records = self.reload().await?;
        Ok(records
            .iter()
            .map(|record| record.clone().restricted_to(fields))
            .filter(|record| is_included(include, record))
            .collect())
    }

    async fn search(&self, query: &str, fields: &[FetchField]) -> Result<Vec<ContactRecord>> {
        let Some(normalized) = search::normalize_query(query) else {
            return Ok(Vec::new());
        };
        let records = self.cached().await?;
        Ok(records
            .iter()
            .filter(|record| search::record_matches(record, &normalized))
            .map(|record| record.clone().restricted_to(fields))
            .collect())
    }
}

/// Every card under `root`, in path order. Files that fail to read or parse
/// are skipped with a warning.
pub fn load_records(root: &Path, thumbnails: &ThumbnailCache) -> Result<Vec<ContactRecord>> {
    if !root.is_dir() {
        bail!("vdir does not exist: {}", root.display());
    }

    let mut paths = list_vcf_files(root)?;
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!("unable to read vCard file {}: {err}", path.display());
                continue;
            }
        };
        let cards = match vcard_io::parse_str(&content) {
            Ok(cards) => cards,
            Err(err) => {
                warn!("unable to parse vCard file {}: {err:#}", path.display());
                continue;
            }
        };
        for card in &cards {
            let thumbnail = vcard_io::card_uid(card).and_then(|uid| {
                thumbnails.load(&uid).unwrap_or_else(|err| {
                    warn!("{err:#}");
                    None
                })
            });
            records.push(vcard_io::to_record(card, thumbnail));
        }
    }

    debug!(vdir = %root.display(), count = records.len(), "loaded contacts");
    Ok(records)
}

pub fn list_vcf_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_vcf(root, &mut files)?;
    Ok(files)
}

fn collect_vcf(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_vcf(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("vcf"))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }
    Ok(())
}
