//! Two-process tests for `SharedRegion`.
//!
//! Same self-spawning pattern as the other e2e suites: the test binary
//! re-runs itself with `--exact <test>` and a role in the environment. The
//! child signals progress by creating a marker file, so the parent never
//! relies on guessed sleep lengths to know the child got somewhere.
//!
//! ```bash
//! cargo test -p shmlock-region --test e2e_region -- --nocapture
//! ```

use anyhow::{Context, Result, bail, ensure};
use shmlock_region::{SharedRegion, exists, remove};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

const ENV_ROLE: &str = "SHMLOCK_E2E_ROLE";
const ENV_NAME: &str = "SHMLOCK_E2E_NAME";
const ENV_MARKER: &str = "SHMLOCK_E2E_MARKER";

const ROLE_WRITER: &str = "writer";
const ROLE_WRITE_AND_DESTROY: &str = "write-and-destroy";
const ROLE_DESTROYER: &str = "destroyer";

const TEST_COUNT: u32 = 1234;
const TEST_TIMESTAMP: i64 = 999_999;

/// How long the writer keeps its mapping after signalling.
const WRITER_LINGER: Duration = Duration::from_millis(500);
const SPAWN_DEADLINE: Duration = Duration::from_secs(10);

struct Scenario {
    test: &'static str,
    name: String,
    marker: PathBuf,
}

impl Scenario {
    fn new(test: &'static str) -> Self {
        let name = format!("shmlock-e2e-region-{}-{test}", std::process::id());
        let marker = env::temp_dir().join(format!("{name}.ready"));
        let _ = std::fs::remove_file(&marker);
        Self { test, name, marker }
    }

    fn spawn(&self, role: &str) -> Result<Child> {
        let exe = env::current_exe().context("no current executable")?;
        Command::new(exe)
            .arg("--exact")
            .arg(self.test)
            .arg("--nocapture")
            .env(ENV_ROLE, role)
            .env(ENV_NAME, &self.name)
            .env(ENV_MARKER, &self.marker)
            .spawn()
            .with_context(|| format!("failed to spawn {role} process"))
    }

    fn wait_for_marker(&self, child: &mut Child) -> Result<()> {
        let deadline = Instant::now() + SPAWN_DEADLINE;
        while !self.marker.exists() {
            if let Some(status) = child.try_wait()? {
                bail!("child exited before signalling: {status}");
            }
            ensure!(Instant::now() < deadline, "child never signalled");
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

impl Drop for Scenario {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.marker);
        let _ = remove(&self.name);
    }
}

fn wait_success(child: &mut Child) -> Result<ExitStatus> {
    let status = child.wait()?;
    ensure!(status.success(), "child failed: {status}");
    Ok(status)
}

fn signal(marker: &Path) -> Result<()> {
    std::fs::write(marker, b"").context("failed to write marker")
}

/// Child side. Returns `true` if this process is a spawned child.
fn run_child() -> Result<bool> {
    let Ok(role) = env::var(ENV_ROLE) else {
        return Ok(false);
    };
    let name = env::var(ENV_NAME).context("name not set")?;
    let marker = PathBuf::from(env::var(ENV_MARKER).context("marker not set")?);

    let mut region = SharedRegion::new(&name)?;
    region.create()?;
    let layout = region.get().context("region not mapped")?;

    match role.as_str() {
        ROLE_WRITER => {
            layout.set_reference_count(TEST_COUNT);
            layout.set_created_at(TEST_TIMESTAMP);
            signal(&marker)?;
            std::thread::sleep(WRITER_LINGER);
        }
        ROLE_WRITE_AND_DESTROY => {
            layout.set_reference_count(TEST_COUNT);
            layout.set_created_at(TEST_TIMESTAMP);
            region.destroy()?;
        }
        ROLE_DESTROYER => {
            region.destroy()?;
        }
        other => bail!("unknown role: {other}"),
    }
    Ok(true)
}

#[test]
fn two_processes_share_values() -> Result<()> {
    if run_child()? {
        return Ok(());
    }
    let scenario = Scenario::new("two_processes_share_values");

    let mut child = scenario.spawn(ROLE_WRITER)?;
    scenario.wait_for_marker(&mut child)?;

    let mut region = SharedRegion::new(&scenario.name)?;
    region.create()?;
    let layout = region.get().context("region not mapped")?;
    let counter = layout.reference_count();
    let timestamp = layout.created_at();

    wait_success(&mut child)?;
    region.destroy()?;

    assert_eq!(counter, TEST_COUNT, "shared values incorrect");
    assert_eq!(timestamp, TEST_TIMESTAMP, "shared values incorrect");
    Ok(())
}

#[test]
fn destroyed_region_is_not_seen_by_later_process() -> Result<()> {
    if run_child()? {
        return Ok(());
    }
    let scenario = Scenario::new("destroyed_region_is_not_seen_by_later_process");

    let mut child = scenario.spawn(ROLE_WRITE_AND_DESTROY)?;
    wait_success(&mut child)?;
    assert!(!exists(&scenario.name)?);

    let mut region = SharedRegion::new(&scenario.name)?;
    region.create()?;
    let layout = region.get().context("region not mapped")?;
    assert_eq!(layout.reference_count(), 0);
    assert_eq!(layout.created_at(), 0);
    region.destroy()?;
    Ok(())
}

#[test]
fn unlink_in_other_process_leaves_mapping_intact() -> Result<()> {
    if run_child()? {
        return Ok(());
    }
    let scenario = Scenario::new("unlink_in_other_process_leaves_mapping_intact");

    let mut region = SharedRegion::new(&scenario.name)?;
    region.create()?;
    {
        let layout = region.get().context("region not mapped")?;
        layout.set_reference_count(TEST_COUNT);
        layout.set_created_at(TEST_TIMESTAMP);
    }

    let mut child = scenario.spawn(ROLE_DESTROYER)?;
    wait_success(&mut child)?;

    assert!(!exists(&scenario.name)?, "child should have unlinked the object");
    let layout = region.get().context("local mapping lost")?;
    assert_eq!(layout.reference_count(), TEST_COUNT);
    assert_eq!(layout.created_at(), TEST_TIMESTAMP);

    // Already unlinked by the child: destroy still succeeds.
    region.destroy()?;
    Ok(())
}
