//! Renaming record files from a path template

mod template;

pub use template::{Template, NOW_FIELD};

use crate::error::Result;
use crate::model::{Fields, Record, RecordId};
use crate::records::PATH_FIELD;
use crate::store::Connection;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// One planned file move
#[derive(Debug, Clone, PartialEq)]
pub struct RenamePlan {
    pub id: RecordId,
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Work out where each record's file would go under `root`
///
/// Records without a path, records already in place, targets that would
/// leave `root` and targets claimed by an earlier record are skipped.
pub fn plan_renames(records: &[Record], template: &Template, root: &Path) -> Result<Vec<RenamePlan>> {
    let mut plans = Vec::new();
    let mut claimed = HashSet::new();

    for record in records {
        let Some(from) = record.text(PATH_FIELD).filter(|p| !p.is_empty()).map(PathBuf::from) else {
            log::debug!("Record {} has no path, skipping", record.id);
            continue;
        };

        let relative = template.render(record)?;
        if !is_contained(Path::new(&relative)) {
            log::warn!(
                "Target {:?} for record {} leaves the target root, skipping",
                relative,
                record.id
            );
            continue;
        }
        let to = root.join(&relative);

        if to == from {
            continue;
        }
        if !claimed.insert(to.clone()) {
            log::warn!("Target {:?} already claimed, skipping record {}", to, record.id);
            continue;
        }
        plans.push(RenamePlan {
            id: record.id,
            from,
            to,
        });
    }
    Ok(plans)
}

/// A rendered path must be relative, non-empty and free of `..`
fn is_contained(relative: &Path) -> bool {
    relative.components().next().is_some()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Move files and record their new paths in the store
///
/// Each move is independent: failures are logged and the rest continue.
/// Returns the ids of records whose files were moved.
pub fn apply_renames(conn: &mut Connection, database: &str, plans: &[RenamePlan]) -> Vec<RecordId> {
    let mut moved = Vec::new();

    for plan in plans {
        if plan.to.exists() {
            log::warn!("Not overwriting existing {:?}", plan.to);
            continue;
        }
        if let Err(e) = move_file(&plan.from, &plan.to) {
            log::warn!("Failed to move {:?} to {:?}: {}", plan.from, plan.to, e);
            continue;
        }

        let mut change = Fields::new();
        change.insert(
            PATH_FIELD.to_string(),
            serde_json::Value::from(plan.to.to_string_lossy().as_ref()),
        );
        if conn.update(database, plan.id, change).is_err() {
            log::warn!("Moved {:?} but could not record the new path", plan.to);
        }
        log::debug!("Moved {:?} -> {:?}", plan.from, plan.to);
        moved.push(plan.id);
    }

    log::info!("Renamed {} of {} files", moved.len(), plans.len());
    moved
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Cross-device moves need a copy
        Err(_) if from.is_file() => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}
