//! Entity resolver.
//!
//! Maps free-text holder names onto canonical holders. Known spellings are
//! answered from a read-locked directory; every change to the directory
//! (minting, fuzzy merges, alias growth) goes through one writer section so
//! two workers racing on the same new name cannot mint twice.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::aliases::AliasTable;
use super::normalize::{display_name, normalize_name};
use super::similarity::{NameSimilarity, SimilarityKind};
use crate::constants::{DEFAULT_CANDIDATE_FLOOR, DEFAULT_MERGE_THRESHOLD};
use crate::errors::{Error, Result};
use crate::holders::{CanonicalHolder, HolderId};

/// Resolver tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    /// Minimum similarity for merging an unseen name into an existing holder.
    pub merge_threshold: f64,
    /// Minimum similarity for flagging a minted holder for human review.
    pub candidate_floor: f64,
    pub similarity: SimilarityKind,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
            candidate_floor: DEFAULT_CANDIDATE_FLOOR,
            similarity: SimilarityKind::default(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.merge_threshold) || !in_unit(self.candidate_floor) {
            return Err(Error::InvalidConfigValue(
                "Resolver thresholds must be within [0, 1]".to_string(),
            ));
        }
        if self.candidate_floor > self.merge_threshold {
            return Err(Error::InvalidConfigValue(format!(
                "Candidate floor {} is above merge threshold {}",
                self.candidate_floor, self.merge_threshold
            )));
        }
        Ok(())
    }
}

/// How a name was resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionSource {
    /// The normalized name was already bound to a holder.
    Alias,
    /// Merged into an existing holder by similarity.
    Fuzzy { matched: String, score: f64 },
    /// A new holder was created.
    Minted,
}

/// A minted holder that looked like an existing one without clearing the
/// merge threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurationCandidate {
    pub raw_name: String,
    pub normalized_name: String,
    pub holder_id: HolderId,
    pub similar_holder_id: HolderId,
    pub similar_name: String,
    pub score: f64,
}

/// Result of resolving one raw name.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub holder: CanonicalHolder,
    pub source: ResolutionSource,
    /// True when the holder was created or its alias set grew, so it must be
    /// persisted before any fact referencing it.
    pub changed: bool,
    pub candidate: Option<CurationCandidate>,
}

#[derive(Default)]
struct Directory {
    keys: HashMap<String, HolderId>,
    holders: BTreeMap<HolderId, CanonicalHolder>,
}

impl Directory {
    fn bind(&mut self, key: String, holder_id: &HolderId) -> Result<()> {
        match self.keys.get(&key) {
            Some(existing) if existing != holder_id => Err(Error::ConstraintViolation(format!(
                "Alias '{}' is already bound to {}",
                key, existing
            ))),
            Some(_) => Ok(()),
            None => {
                self.keys.insert(key, holder_id.clone());
                Ok(())
            }
        }
    }

    /// Register a holder and every spelling it carries.
    fn absorb(&mut self, holder: CanonicalHolder) -> Result<()> {
        let holder_id = holder.holder_id.clone();
        self.bind(normalize_name(&holder.canonical_name), &holder_id)?;
        for alias in &holder.known_aliases {
            let key = normalize_name(alias);
            if !key.is_empty() {
                self.bind(key, &holder_id)?;
            }
        }
        match self.holders.get_mut(&holder_id) {
            Some(existing) => {
                if existing.canonical_name != holder.canonical_name {
                    return Err(Error::ConstraintViolation(format!(
                        "Holder {} is named '{}', not '{}'",
                        holder_id, existing.canonical_name, holder.canonical_name
                    )));
                }
                existing.known_aliases.extend(holder.known_aliases);
            }
            None => {
                self.holders.insert(holder_id, holder);
            }
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<&CanonicalHolder> {
        self.keys.get(key).and_then(|id| self.holders.get(id))
    }

    /// Highest-scoring bound key. Ties go to the lowest `holder_id`, then the
    /// lowest key, so the answer does not depend on hash order.
    fn best_match(&self, key: &str, similarity: &dyn NameSimilarity) -> Option<(HolderId, f64)> {
        let mut best: Option<(&HolderId, &str, f64)> = None;
        for (candidate, holder_id) in &self.keys {
            let score = similarity.score(key, candidate);
            let better = match best {
                None => true,
                Some((best_id, best_key, best_score)) => {
                    score > best_score
                        || (score == best_score
                            && (holder_id, candidate.as_str()) < (best_id, best_key))
                }
            };
            if better {
                best = Some((holder_id, candidate.as_str(), score));
            }
        }
        best.map(|(id, _, score)| (id.clone(), score))
    }
}

/// Resolves raw holder names to canonical holders.
pub struct EntityResolver {
    config: ResolverConfig,
    similarity: Box<dyn NameSimilarity>,
    directory: RwLock<Directory>,
    writer: Mutex<()>,
    candidates: Mutex<Vec<CurationCandidate>>,
}

impl EntityResolver {
    /// Build a resolver seeded from an alias table.
    pub fn new(config: ResolverConfig, aliases: &AliasTable) -> Result<Self> {
        let similarity = config.similarity.build();
        Self::with_similarity(config, aliases, similarity)
    }

    pub fn with_similarity(
        config: ResolverConfig,
        aliases: &AliasTable,
        similarity: Box<dyn NameSimilarity>,
    ) -> Result<Self> {
        config.validate()?;

        let mut directory = Directory::default();
        for (canonical, spellings) in aliases.iter() {
            let mut holder = CanonicalHolder::new(display_name(canonical));
            holder
                .known_aliases
                .extend(spellings.iter().map(|s| display_name(s)));
            directory.absorb(holder).map_err(|e| {
                Error::InvalidConfigValue(format!("Alias table entry '{}': {}", canonical, e))
            })?;
        }
        debug!(
            "Entity resolver seeded with {} holders using {}",
            directory.holders.len(),
            similarity.name()
        );

        Ok(Self {
            config,
            similarity,
            directory: RwLock::new(directory),
            writer: Mutex::new(()),
            candidates: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Load holders persisted by earlier runs so their ids stay stable.
    pub fn hydrate(&self, holders: Vec<CanonicalHolder>) -> Result<()> {
        let _writer = self.lock_writer();
        let mut directory = self.write_directory();
        let count = holders.len();
        for holder in holders {
            directory.absorb(holder)?;
        }
        debug!("Hydrated entity resolver with {} persisted holders", count);
        Ok(())
    }

    /// Resolve a raw name to its canonical holder, minting one if needed.
    pub fn resolve(&self, raw_name: &str) -> Result<Resolution> {
        let display = display_name(raw_name);
        let key = normalize_name(&display);
        if key.is_empty() {
            return Err(Error::Validation(format!(
                "Holder name '{}' has no identifying characters",
                raw_name
            )));
        }

        {
            let directory = self.read_directory();
            if let Some(holder) = directory.lookup(&key) {
                if holder.known_aliases.contains(&display) {
                    return Ok(Resolution {
                        holder: holder.clone(),
                        source: ResolutionSource::Alias,
                        changed: false,
                        candidate: None,
                    });
                }
            }
        }

        let _writer = self.lock_writer();

        // Another worker may have bound this key while we waited.
        let bound = self.read_directory().keys.get(&key).cloned();
        if let Some(holder_id) = bound {
            let (holder, changed) = self.add_spelling(&holder_id, &display)?;
            return Ok(Resolution {
                holder,
                source: ResolutionSource::Alias,
                changed,
                candidate: None,
            });
        }

        // Writers are serialized, so the directory cannot change under this scan.
        let best = self
            .read_directory()
            .best_match(&key, self.similarity.as_ref());

        if let Some((holder_id, score)) = &best {
            if *score >= self.config.merge_threshold {
                let holder = {
                    let mut directory = self.write_directory();
                    directory.bind(key.clone(), holder_id)?;
                    let holder = directory.holders.get_mut(holder_id).ok_or_else(|| {
                        Error::Unexpected(format!("Bound holder {} is missing", holder_id))
                    })?;
                    holder.known_aliases.insert(display.clone());
                    holder.clone()
                };
                info!(
                    "Merged '{}' into {} ({}) at similarity {:.3}",
                    display, holder.canonical_name, holder.holder_id, score
                );
                return Ok(Resolution {
                    source: ResolutionSource::Fuzzy {
                        matched: holder.canonical_name.clone(),
                        score: *score,
                    },
                    holder,
                    changed: true,
                    candidate: None,
                });
            }
        }

        let holder = CanonicalHolder {
            holder_id: HolderId::from_normalized(&key),
            canonical_name: display.clone(),
            known_aliases: [display.clone()].into_iter().collect(),
        };

        let candidate = {
            let mut directory = self.write_directory();
            if directory.holders.contains_key(&holder.holder_id) {
                return Err(Error::ConstraintViolation(format!(
                    "Holder id {} for '{}' collides with an existing holder",
                    holder.holder_id, display
                )));
            }
            directory.absorb(holder.clone())?;

            best.filter(|(_, score)| *score >= self.config.candidate_floor)
                .and_then(|(similar_id, score)| {
                    directory
                        .holders
                        .get(&similar_id)
                        .map(|similar| CurationCandidate {
                            raw_name: display.clone(),
                            normalized_name: key.clone(),
                            holder_id: holder.holder_id.clone(),
                            similar_holder_id: similar_id.clone(),
                            similar_name: similar.canonical_name.clone(),
                            score,
                        })
                })
        };

        match &candidate {
            Some(c) => {
                warn!(
                    "Ambiguous holder '{}' minted as {} near {} ({}) at similarity {:.3}",
                    c.raw_name, c.holder_id, c.similar_name, c.similar_holder_id, c.score
                );
                self.lock_candidates().push(c.clone());
            }
            None => debug!("Minted holder {} for '{}'", holder.holder_id, display),
        }

        Ok(Resolution {
            holder,
            source: ResolutionSource::Minted,
            changed: true,
            candidate,
        })
    }

    /// Bind a spelling to an existing holder, typically from curation.
    ///
    /// Fails if the spelling already resolves to a different holder.
    pub fn register_alias(&self, alias: &str, holder_id: &HolderId) -> Result<CanonicalHolder> {
        let display = display_name(alias);
        let key = normalize_name(&display);
        if key.is_empty() {
            return Err(Error::Validation(format!(
                "Alias '{}' has no identifying characters",
                alias
            )));
        }

        let _writer = self.lock_writer();
        let mut directory = self.write_directory();
        if !directory.holders.contains_key(holder_id) {
            return Err(Error::Validation(format!("Unknown holder {}", holder_id)));
        }
        directory.bind(key, holder_id)?;
        let holder = directory
            .holders
            .get_mut(holder_id)
            .ok_or_else(|| Error::Unexpected(format!("Holder {} vanished", holder_id)))?;
        holder.known_aliases.insert(display);
        info!("Registered alias '{}' for {}", alias, holder_id);
        Ok(holder.clone())
    }

    pub fn holder(&self, holder_id: &HolderId) -> Option<CanonicalHolder> {
        self.read_directory().holders.get(holder_id).cloned()
    }

    /// Every known holder, ordered by `holder_id`.
    pub fn holders(&self) -> Vec<CanonicalHolder> {
        self.read_directory().holders.values().cloned().collect()
    }

    /// Ambiguous mints recorded so far, in the order they happened.
    pub fn curation_candidates(&self) -> Vec<CurationCandidate> {
        self.lock_candidates().clone()
    }

    fn add_spelling(&self, holder_id: &HolderId, display: &str) -> Result<(CanonicalHolder, bool)> {
        let mut directory = self.write_directory();
        let holder = directory
            .holders
            .get_mut(holder_id)
            .ok_or_else(|| Error::Unexpected(format!("Bound holder {} is missing", holder_id)))?;
        let changed = holder.known_aliases.insert(display.to_string());
        Ok((holder.clone(), changed))
    }

    fn read_directory(&self) -> RwLockReadGuard<'_, Directory> {
        self.directory.read().unwrap_or_else(|poisoned| {
            warn!("Resolver directory lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_directory(&self) -> RwLockWriteGuard<'_, Directory> {
        self.directory.write().unwrap_or_else(|poisoned| {
            warn!("Resolver directory lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| {
            warn!("Resolver writer mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_candidates(&self) -> MutexGuard<'_, Vec<CurationCandidate>> {
        self.candidates.lock().unwrap_or_else(|poisoned| {
            warn!("Curation candidate mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
