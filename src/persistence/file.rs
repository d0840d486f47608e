use super::{PersistenceResult, PlanningSnapshot};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

pub fn save_snapshot_to_json<P: AsRef<Path>>(
    snapshot: &PlanningSnapshot,
    path: P,
) -> PersistenceResult<()> {
    snapshot.validate()?;
    let file = File::create(path.as_ref())?;
    serde_json::to_writer_pretty(BufWriter::new(file), snapshot)?;
    info!(
        path = %path.as_ref().display(),
        resources = snapshot.resources.len(),
        activities = snapshot.activities.len(),
        "saved planning snapshot"
    );
    Ok(())
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<PlanningSnapshot> {
    let file = File::open(path.as_ref())?;
    let snapshot: PlanningSnapshot = serde_json::from_reader(BufReader::new(file))?;
    snapshot.validate()?;
    info!(
        path = %path.as_ref().display(),
        resources = snapshot.resources.len(),
        activities = snapshot.activities.len(),
        "loaded planning snapshot"
    );
    Ok(snapshot)
}
