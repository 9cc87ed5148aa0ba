//! Status monitor: periodic reconciliation of worker-reported vnode slots.
//!
//! Each cycle walks every dnode's load table and compares what the worker
//! reports for a slot against the coordinator's vgroup and database
//! records. The drop state of a slot moves like this:
//!
//! ```text
//!            orphaned / unassigned slot
//!   Ready ──────────────────────────────▶ Dropping
//!     ▲                                      │
//!     └──────── worker reports 0 sessions ───┘  (status -> Offline,
//!                                                drop check scheduled)
//! ```
//!
//! A slot that is active and fully resolved is marked `Master` and has its
//! load refreshed. A slot whose vgroup resolves but whose database does not
//! is reported in [`CycleReport::unresolved_db`] and left as is.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vgrid_state::{DnodeInfo, DnodeStatus, DropStatus, VnodeLoad, VnodeStatus};

use crate::deferred::DropMonitor;
use crate::error::MgmtResult;
use crate::meta::MetaStore;

// ── Slot reports ──────────────────────────────────────────────────

/// What a worker last reported for one vnode slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotReport {
    /// Active sessions on the slot. Zero means the slot is vacated.
    pub sessions: u32,
    /// Vgroup the worker believes the slot belongs to.
    pub vg_id: u32,
    pub total_storage: u64,
    pub comp_storage: u64,
    pub points_written: u64,
}

impl SlotReport {
    pub fn is_active(&self) -> bool {
        self.sessions > 0
    }
}

/// Source of live per-slot statistics.
pub trait SlotReports: Send + Sync {
    /// `None` when the worker has not reported the slot yet.
    fn report(&self, ip: Ipv4Addr, vnode: u32) -> Option<SlotReport>;
}

/// Latest report per slot, kept in memory.
#[derive(Debug, Default)]
pub struct StatusBoard {
    slots: RwLock<HashMap<(Ipv4Addr, u32), SlotReport>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, ip: Ipv4Addr, vnode: u32, report: SlotReport) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.insert((ip, vnode), report);
    }

    pub fn forget(&self, ip: Ipv4Addr, vnode: u32) -> Option<SlotReport> {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.remove(&(ip, vnode))
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SlotReports for StatusBoard {
    fn report(&self, ip: Ipv4Addr, vnode: u32) -> Option<SlotReport> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots.get(&(ip, vnode)).copied()
    }
}

// ── Cycle ─────────────────────────────────────────────────────────

/// A slot whose vgroup resolves but whose owning database does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotFault {
    pub ip: Ipv4Addr,
    pub vnode: u32,
    pub vg_id: u32,
    pub db_name: String,
}

/// What one status cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub dnodes: usize,
    pub active_slots: usize,
    pub drops_started: usize,
    pub drops_completed: usize,
    pub unresolved_db: Vec<SlotFault>,
}

/// What the worker report and metadata lookups say about one slot, gathered
/// before the dnode record is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotView {
    /// No report yet, or the lookups failed this cycle.
    Unreported,
    Vacated,
    /// Active, but its vgroup is gone.
    Orphaned(SlotReport),
    /// Active, vgroup found, owning database gone.
    NoDatabase(SlotFault),
    Resolved(SlotReport),
}

/// Per-slot result, folded into the cycle report.
#[derive(Debug, PartialEq, Eq)]
enum SlotStep {
    Unreported,
    Idle,
    DropCompleted,
    Active { drop_started: bool, fault: Option<SlotFault> },
}

pub struct StatusMonitor {
    store: Arc<dyn MetaStore>,
    reports: Arc<dyn SlotReports>,
    drop_monitor: Arc<dyn DropMonitor>,
    drop_check_delay: Duration,
}

impl StatusMonitor {
    pub fn new(
        store: Arc<dyn MetaStore>,
        reports: Arc<dyn SlotReports>,
        drop_monitor: Arc<dyn DropMonitor>,
        drop_check_delay: Duration,
    ) -> Self {
        Self {
            store,
            reports,
            drop_monitor,
            drop_check_delay,
        }
    }

    /// Reconcile every dnode once.
    ///
    /// Slots are observed first. The dnode record is then re-read, updated
    /// and written in one store update, so changes made to it since the
    /// listing are kept. A dnode that fails to persist is logged and
    /// skipped; the cycle only fails if the dnode list itself cannot be read.
    pub fn run_cycle(&self) -> MgmtResult<CycleReport> {
        let mut report = CycleReport::default();

        for listed in self.store.list_dnodes()? {
            report.dnodes += 1;
            let ip = listed.private_ip;
            let views: Vec<SlotView> = (0..listed.vload.len())
                .map(|idx| self.observe_slot(ip, idx as u32))
                .collect();

            let mut steps = Vec::with_capacity(views.len());
            let updated = self.store.update_dnode_with(ip, &mut |dnode: &mut DnodeInfo| {
                steps.clear();
                for (idx, view) in views.iter().enumerate() {
                    let Some(load) = dnode.vload.get_mut(idx) else {
                        break;
                    };
                    steps.push(apply_slot(load, ip, idx as u32, view));
                }
                let active = steps
                    .iter()
                    .filter(|step| matches!(step, SlotStep::Active { .. }))
                    .count();
                dnode.open_vnodes = active as u32;
                if steps.iter().any(|step| *step != SlotStep::Unreported) {
                    dnode.status = DnodeStatus::Ready;
                }
            });

            match updated {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!(%ip, "dnode removed during status cycle");
                    continue;
                }
                Err(e) => {
                    error!(%ip, error = %e, "failed to persist dnode status");
                    continue;
                }
            }

            for step in steps {
                match step {
                    SlotStep::Unreported | SlotStep::Idle => {}
                    SlotStep::DropCompleted => {
                        report.drops_completed += 1;
                        self.drop_monitor.schedule_drop_check(self.drop_check_delay);
                    }
                    SlotStep::Active { drop_started, fault } => {
                        report.active_slots += 1;
                        if drop_started {
                            report.drops_started += 1;
                        }
                        report.unresolved_db.extend(fault);
                    }
                }
            }
        }

        debug!(
            dnodes = report.dnodes,
            active = report.active_slots,
            started = report.drops_started,
            completed = report.drops_completed,
            faults = report.unresolved_db.len(),
            "status cycle finished"
        );
        Ok(report)
    }

    fn observe_slot(&self, ip: Ipv4Addr, vnode: u32) -> SlotView {
        match self.resolve_slot(ip, vnode) {
            Ok(view) => view,
            Err(e) => {
                error!(%ip, vnode, error = %e, "slot lookup failed, skipping slot");
                SlotView::Unreported
            }
        }
    }

    fn resolve_slot(&self, ip: Ipv4Addr, vnode: u32) -> MgmtResult<SlotView> {
        let Some(live) = self.reports.report(ip, vnode) else {
            return Ok(SlotView::Unreported);
        };
        if !live.is_active() {
            return Ok(SlotView::Vacated);
        }
        let Some(vgroup) = self.store.vgroup(live.vg_id)? else {
            return Ok(SlotView::Orphaned(live));
        };
        if self.store.database(&vgroup.db_name)?.is_none() {
            return Ok(SlotView::NoDatabase(SlotFault {
                ip,
                vnode,
                vg_id: vgroup.vg_id,
                db_name: vgroup.db_name,
            }));
        }
        Ok(SlotView::Resolved(live))
    }

    /// Run a cycle every `interval` until `shutdown` fires.
    pub fn spawn(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> StatusTimer {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        // Created outside the task so an abort before the first poll still
        // clears the flag.
        let guard = LoopGuard {
            running: flag,
            clean: false,
        };
        let handle = tokio::spawn(async move {
            let mut guard = guard;
            info!(interval_ms = interval.as_millis() as u64, "status monitor started");

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = self.run_cycle() {
                            error!(error = %e, "status cycle failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("status monitor shutting down");
                        guard.clean = true;
                        break;
                    }
                }
            }
        });

        StatusTimer { handle, running }
    }
}

/// Move one slot through the drop state machine.
fn apply_slot(load: &mut VnodeLoad, ip: Ipv4Addr, vnode: u32, view: &SlotView) -> SlotStep {
    let was_dropping = load.drop_status == DropStatus::Dropping;
    match view {
        SlotView::Unreported => SlotStep::Unreported,
        SlotView::Vacated if was_dropping => {
            load.drop_status = DropStatus::Ready;
            load.status = VnodeStatus::Offline;
            load.vg_id = 0;
            info!(%ip, vnode, "drop finished");
            SlotStep::DropCompleted
        }
        SlotView::Vacated => SlotStep::Idle,
        SlotView::NoDatabase(fault) => {
            error!(%ip, vnode, vg_id = fault.vg_id, db = %fault.db_name, "vgroup belongs to no database");
            SlotStep::Active {
                drop_started: false,
                fault: Some(fault.clone()),
            }
        }
        SlotView::Orphaned(live) => {
            refresh_load(load, vnode, live);
            error!(%ip, vnode, vg_id = live.vg_id, "vgroup missing for reported vnode, dropping it");
            load.drop_status = DropStatus::Dropping;
            SlotStep::Active {
                drop_started: !was_dropping,
                fault: None,
            }
        }
        SlotView::Resolved(live) => {
            refresh_load(load, vnode, live);
            if load.vg_id == 0 || was_dropping {
                warn!(%ip, vnode, "vnode not assigned by coordinator, dropping it");
                load.drop_status = DropStatus::Dropping;
                return SlotStep::Active {
                    drop_started: !was_dropping,
                    fault: None,
                };
            }
            load.status = VnodeStatus::Master;
            SlotStep::Active {
                drop_started: false,
                fault: None,
            }
        }
    }
}

fn refresh_load(load: &mut VnodeLoad, vnode: u32, live: &SlotReport) {
    load.vnode = vnode;
    load.total_storage = live.total_storage;
    load.comp_storage = live.comp_storage;
    load.points_written = live.points_written;
}

/// Marks the loop stopped however the task ends.
struct LoopGuard {
    running: Arc<AtomicBool>,
    clean: bool,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if !self.clean {
            error!("status monitor stopped unexpectedly, status reconciliation has stopped");
        }
    }
}

/// Handle on a running status loop.
pub struct StatusTimer {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl StatusTimer {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                error!(error = %e, "status monitor panicked");
            }
        }
    }
}
