//! Status monitor: vnode drop lifecycle driven by worker slot reports.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use vgrid_core::ResultCode;
use vgrid_mgmt::*;
use vgrid_state::*;

const WORKER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
const DROP_CHECK: Duration = Duration::from_secs(10);

#[derive(Default)]
struct FakeDropMonitor {
    checks: Mutex<Vec<Duration>>,
}

impl DropMonitor for FakeDropMonitor {
    fn schedule_drop_check(&self, delay: Duration) {
        self.checks.lock().unwrap().push(delay);
    }
}

struct Harness {
    store: StateStore,
    board: Arc<StatusBoard>,
    drops: Arc<FakeDropMonitor>,
    monitor: Arc<StatusMonitor>,
}

fn harness() -> Harness {
    let store = StateStore::open_in_memory().unwrap();
    let mut dnode = DnodeInfo::new(WORKER, 4);
    dnode.vload[2].vg_id = 4;
    store.put_dnode(&dnode).unwrap();
    store
        .put_database(&DbInfo {
            name: "db1".to_string(),
            replications: 1,
            created_at: 1000,
        })
        .unwrap();
    store
        .put_vgroup(&VgroupInfo {
            vg_id: 4,
            db_name: "db1".to_string(),
            vnode_gids: vec![VnodeGid { ip: WORKER, vnode: 2 }],
        })
        .unwrap();

    let board = Arc::new(StatusBoard::new());
    let drops = Arc::new(FakeDropMonitor::default());
    let monitor = Arc::new(StatusMonitor::new(
        Arc::new(store.clone()),
        board.clone(),
        drops.clone(),
        DROP_CHECK,
    ));
    Harness {
        store,
        board,
        drops,
        monitor,
    }
}

fn active(vg_id: u32) -> SlotReport {
    SlotReport {
        sessions: 3,
        vg_id,
        total_storage: 4096,
        comp_storage: 1024,
        points_written: 500,
    }
}

fn vacated() -> SlotReport {
    SlotReport::default()
}

fn slot(h: &Harness, vnode: usize) -> VnodeLoad {
    h.store.get_dnode(WORKER).unwrap().unwrap().vload[vnode].clone()
}

#[test]
fn assigned_active_slot_is_refreshed() {
    let h = harness();
    h.board.record(WORKER, 2, active(4));

    let report = h.monitor.run_cycle().unwrap();
    assert_eq!(report.dnodes, 1);
    assert_eq!(report.active_slots, 1);
    assert_eq!(report.drops_started, 0);

    let load = slot(&h, 2);
    assert_eq!(load.status, VnodeStatus::Master);
    assert_eq!(load.drop_status, DropStatus::Ready);
    assert_eq!(load.total_storage, 4096);
    assert_eq!(load.comp_storage, 1024);
    assert_eq!(load.points_written, 500);
    assert_eq!(h.store.get_dnode(WORKER).unwrap().unwrap().open_vnodes, 1);
}

#[test]
fn unassigned_slot_drops_then_completes_once() {
    let h = harness();
    // Slot 1 was never assigned by the coordinator.
    h.board.record(WORKER, 1, active(4));

    let first = h.monitor.run_cycle().unwrap();
    assert_eq!(first.drops_started, 1);
    assert_eq!(slot(&h, 1).drop_status, DropStatus::Dropping);

    // Still active: the drop is re-affirmed, not restarted.
    let second = h.monitor.run_cycle().unwrap();
    assert_eq!(second.drops_started, 0);
    assert_eq!(slot(&h, 1).drop_status, DropStatus::Dropping);

    h.board.record(WORKER, 1, vacated());
    let third = h.monitor.run_cycle().unwrap();
    assert_eq!(third.drops_completed, 1);
    let load = slot(&h, 1);
    assert_eq!(load.status, VnodeStatus::Offline);
    assert_eq!(load.drop_status, DropStatus::Ready);
    assert_eq!(h.drops.checks.lock().unwrap().as_slice(), &[DROP_CHECK]);

    let fourth = h.monitor.run_cycle().unwrap();
    assert_eq!(fourth.drops_completed, 0);
    assert_eq!(h.drops.checks.lock().unwrap().len(), 1);
}

#[test]
fn dropped_slot_does_not_come_back_without_assignment() {
    let h = harness();
    h.board.record(WORKER, 2, active(4));
    let mut dnode = h.store.get_dnode(WORKER).unwrap().unwrap();
    dnode.vload[2].drop_status = DropStatus::Dropping;
    h.store.put_dnode(&dnode).unwrap();

    h.board.record(WORKER, 2, vacated());
    assert_eq!(h.monitor.run_cycle().unwrap().drops_completed, 1);
    assert_eq!(slot(&h, 2).status, VnodeStatus::Offline);

    // The worker reports the slot busy again under the old vgroup.
    h.board.record(WORKER, 2, active(4));
    let report = h.monitor.run_cycle().unwrap();
    assert_eq!(report.drops_started, 1);
    let load = slot(&h, 2);
    assert_eq!(load.status, VnodeStatus::Offline);
    assert_eq!(load.drop_status, DropStatus::Dropping);
}

#[test]
fn orphaned_vgroup_starts_drop() {
    let h = harness();
    h.board.record(WORKER, 2, active(99));

    let report = h.monitor.run_cycle().unwrap();
    assert_eq!(report.drops_started, 1);
    assert_eq!(slot(&h, 2).drop_status, DropStatus::Dropping);
}

#[test]
fn missing_database_is_reported_not_dropped() {
    let h = harness();
    h.store
        .put_vgroup(&VgroupInfo {
            vg_id: 5,
            db_name: "gone".to_string(),
            vnode_gids: vec![VnodeGid { ip: WORKER, vnode: 3 }],
        })
        .unwrap();
    h.board.record(WORKER, 3, active(5));

    let report = h.monitor.run_cycle().unwrap();
    assert_eq!(report.drops_started, 0);
    assert_eq!(
        report.unresolved_db,
        vec![SlotFault {
            ip: WORKER,
            vnode: 3,
            vg_id: 5,
            db_name: "gone".to_string(),
        }]
    );
    let load = slot(&h, 3);
    assert_eq!(load.drop_status, DropStatus::Ready);
    assert_eq!(load.status, VnodeStatus::Offline);
}

#[test]
fn unreported_dnode_is_left_alone() {
    let h = harness();
    let mut dnode = h.store.get_dnode(WORKER).unwrap().unwrap();
    dnode.status = DnodeStatus::Offline;
    h.store.put_dnode(&dnode).unwrap();

    let report = h.monitor.run_cycle().unwrap();
    assert_eq!(report.dnodes, 1);
    assert_eq!(report.active_slots, 0);
    assert_eq!(h.store.get_dnode(WORKER).unwrap().unwrap(), dnode);
}

/// Reconfigures the worker the first time the cycle asks for a report.
struct ReconfiguringReports {
    board: StatusBoard,
    svc: MgmtService,
    fired: AtomicBool,
}

impl SlotReports for ReconfiguringReports {
    fn report(&self, ip: Ipv4Addr, vnode: u32) -> Option<SlotReport> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            assert_eq!(self.svc.cfg_dnode(ip, "bandwidth 500").unwrap(), ResultCode::Success);
        }
        self.board.report(ip, vnode)
    }
}

#[test]
fn config_change_during_cycle_is_kept() {
    let h = harness();
    let transport = |_env: Envelope| -> MgmtResult<()> { Ok(()) };
    let svc = MgmtService::new(
        Arc::new(h.store.clone()),
        Arc::new(ClusterRole::new(true)),
        DispatchGateway::direct(Arc::new(transport)),
    );
    let reports = Arc::new(ReconfiguringReports {
        board: StatusBoard::new(),
        svc,
        fired: AtomicBool::new(false),
    });
    reports.board.record(WORKER, 2, active(4));
    let monitor = StatusMonitor::new(Arc::new(h.store.clone()), reports.clone(), h.drops.clone(), DROP_CHECK);

    let report = monitor.run_cycle().unwrap();
    assert!(reports.fired.load(Ordering::SeqCst));
    assert_eq!(report.active_slots, 1);

    let dnode = h.store.get_dnode(WORKER).unwrap().unwrap();
    assert_eq!(dnode.bandwidth_mb, 500);
    assert_eq!(dnode.vload[2].status, VnodeStatus::Master);
    assert_eq!(dnode.vload[2].points_written, 500);
}

/// Store whose database lookups always fail.
struct BrokenDatabases {
    inner: StateStore,
}

impl MetaStore for BrokenDatabases {
    fn table_by_location(&self, ip: Ipv4Addr, vnode: u32, sid: u32) -> StateResult<Option<TableInfo>> {
        self.inner.table_by_location(ip, vnode, sid)
    }

    fn vgroup_by_vnode(&self, ip: Ipv4Addr, vnode: u32) -> StateResult<Option<VgroupInfo>> {
        self.inner.vgroup_by_vnode(ip, vnode)
    }

    fn vgroup(&self, vg_id: u32) -> StateResult<Option<VgroupInfo>> {
        self.inner.get_vgroup(vg_id)
    }

    fn database(&self, _name: &str) -> StateResult<Option<DbInfo>> {
        Err(StateError::Read("database table unavailable".to_string()))
    }

    fn dnode(&self, ip: Ipv4Addr) -> StateResult<Option<DnodeInfo>> {
        self.inner.get_dnode(ip)
    }

    fn list_dnodes(&self) -> StateResult<Vec<DnodeInfo>> {
        self.inner.list_dnodes()
    }

    fn update_dnode_with(
        &self,
        ip: Ipv4Addr,
        f: &mut dyn FnMut(&mut DnodeInfo),
    ) -> StateResult<Option<DnodeInfo>> {
        MetaStore::update_dnode_with(&self.inner, ip, f)
    }
}

#[test]
fn failed_lookup_leaves_slot_untouched() {
    let h = harness();
    let before = h.store.get_dnode(WORKER).unwrap().unwrap();
    h.board.record(WORKER, 2, active(4));
    let monitor = StatusMonitor::new(
        Arc::new(BrokenDatabases { inner: h.store.clone() }),
        h.board.clone(),
        h.drops.clone(),
        DROP_CHECK,
    );

    let report = monitor.run_cycle().unwrap();
    assert_eq!(report.active_slots, 0);
    assert_eq!(report.drops_started, 0);
    assert_eq!(h.store.get_dnode(WORKER).unwrap().unwrap(), before);
}

#[tokio::test]
async fn timer_runs_until_shutdown() {
    let h = harness();
    h.board.record(WORKER, 2, active(4));
    let (tx, rx) = watch::channel(false);

    let timer = h.monitor.clone().spawn(Duration::from_millis(5), rx);
    assert!(timer.is_running());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(slot(&h, 2).status, VnodeStatus::Master);

    tx.send(true).unwrap();
    for _ in 0..100 {
        if !timer.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!timer.is_running());
    timer.join().await;
}

#[tokio::test]
async fn aborted_timer_reports_stopped() {
    let h = harness();
    let (_tx, rx) = watch::channel(false);

    let timer = h.monitor.clone().spawn(Duration::from_secs(3600), rx);
    timer.abort();
    for _ in 0..100 {
        if !timer.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!timer.is_running());
}
