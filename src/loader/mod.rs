//! Loading the fixed field list for one time and region.
//!
//! A [`FieldSource`] knows how to produce grids for one variable code at a set
//! of levels. The [`FieldLoader`] groups the catalog by code, fetches the groups
//! concurrently under a per-fetch timeout, converts units and returns a
//! [`FieldSet`] in catalog order.

pub mod cache;
pub mod catalog;
pub mod decode;
pub mod local;
pub mod remote;
pub mod units;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::{Result, SynopticError};
use crate::fields::{FieldKey, FieldSet, GridField, Level};
use crate::region::BoundingBox;

pub use cache::FieldCache;
pub use catalog::{FieldRequest, CFSR_FIELDS};
pub use local::DirectorySource;
pub use remote::{ThreddsConfig, ThreddsSource};
pub use units::Conversion;

/// Default per-fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Something that can produce gridded fields for one variable code
#[async_trait]
pub trait FieldSource: Send + Sync {
    /// Short name for logs and the heartbeat
    fn name(&self) -> &str;

    /// One field per requested level, in request order
    async fn fetch(
        &self,
        time: NaiveDateTime,
        bbox: &BoundingBox,
        code: &str,
        levels: &[Level],
    ) -> Result<Vec<GridField>>;
}

/// Fields that arrived plus one error per alias that did not
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub fields: FieldSet,
    pub failures: Vec<(String, SynopticError)>,
}

impl LoadOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Loads a list of [`FieldRequest`]s from a [`FieldSource`]
#[derive(Clone)]
pub struct FieldLoader {
    source: Arc<dyn FieldSource>,
    timeout: Duration,
    requests: &'static [FieldRequest],
}

impl FieldLoader {
    /// A loader for the full CFSR catalog
    pub fn new(source: Arc<dyn FieldSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            requests: CFSR_FIELDS,
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn requests(&self) -> &'static [FieldRequest] {
        self.requests
    }

    /// Load every field or fail with the first `DataUnavailable`
    pub async fn load(&self, time: NaiveDateTime, bbox: &BoundingBox) -> Result<FieldSet> {
        let outcome = self.load_partial(time, bbox).await;
        match outcome.failures.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(outcome.fields),
        }
    }

    /// Load what is available; missing aliases are reported, not fatal
    pub async fn load_partial(&self, time: NaiveDateTime, bbox: &BoundingBox) -> LoadOutcome {
        let start = Instant::now();
        let groups = catalog::group_by_code(self.requests);

        let fetches = groups.iter().map(|(code, members)| {
            let levels: Vec<Level> = members.iter().map(|r| r.level).collect();
            async move {
                let fetched =
                    tokio::time::timeout(self.timeout, self.source.fetch(time, bbox, code, &levels)).await;
                let result = match fetched {
                    Ok(result) => result,
                    Err(_) => Err(SynopticError::unavailable(
                        *code,
                        "any",
                        format!("fetch timed out after {}s", self.timeout.as_secs()),
                    )),
                };
                (*code, result)
            }
        });
        let results = join_all(fetches).await;

        // alias -> field or failure, filled group by group
        let mut arrived: Vec<(FieldRequest, Result<GridField>)> = Vec::with_capacity(self.requests.len());
        for ((code, result), (_, members)) in results.into_iter().zip(groups.iter()) {
            match result {
                Ok(fields) if fields.len() == members.len() => {
                    arrived.extend(members.iter().copied().zip(fields.into_iter().map(Ok)));
                }
                Ok(fields) => {
                    for member in members {
                        arrived.push((
                            *member,
                            Err(SynopticError::unavailable(
                                code,
                                member.level.to_string(),
                                format!("source returned {} fields for {} levels", fields.len(), members.len()),
                            )),
                        ));
                    }
                }
                Err(err) => {
                    let reason = match &err {
                        SynopticError::DataUnavailable { reason, .. } => reason.clone(),
                        other => other.to_string(),
                    };
                    for member in members {
                        arrived.push((
                            *member,
                            Err(SynopticError::unavailable(code, member.level.to_string(), reason.clone())),
                        ));
                    }
                }
            }
        }

        let mut outcome = LoadOutcome::default();
        for request in self.requests {
            let Some(pos) = arrived.iter().position(|(r, _)| r.alias == request.alias) else {
                continue;
            };
            let (request, result) = arrived.swap_remove(pos);
            match result {
                Ok(field) => {
                    let key = FieldKey {
                        variable: request.code.to_string(),
                        level: request.level,
                        time,
                    };
                    outcome
                        .fields
                        .insert(request.alias, key, request.conversion.apply(field));
                }
                Err(err) => {
                    warn!(alias = request.alias, error = %err, "Field unavailable");
                    outcome.failures.push((request.alias.to_string(), err));
                }
            }
        }

        info!(
            source = self.source.name(),
            time = %time,
            bbox = %bbox,
            loaded = outcome.fields.len(),
            missing = outcome.failures.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Field set loaded"
        );

        outcome
    }
}
