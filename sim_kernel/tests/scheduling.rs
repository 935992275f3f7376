//! Scheduling Integration Tests
//!
//! These tests drive the kernel through its public entry points:
//! - Ready-queue order under each policy
//! - Timed sleep and wake latency
//! - Deferred destruction of finished threads
//! - Time-slicing under the Priority policy

use hal::TimerDevice;
use sim_kernel::scheduler::ScheduleEvent;
use sim_kernel::test_utils::{boot, drain_ready, run_ticks};
use sim_kernel::{KernelConfig, KernelError, SchedulerPolicy, SimulatedKernel, ThreadStatus};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_sjf_drains_shortest_first() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Sjf).unwrap();

    let five = kernel.fork("five", 0, 5);
    let one = kernel.fork("one", 0, 1);
    let three = kernel.fork("three", 0, 3);

    assert_eq!(drain_ready(&mut kernel), vec![one, three, five]);
}

#[test]
fn test_priority_drains_non_increasing() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Priority).unwrap();

    let priorities = [3, 8, 1, 8, 5, 3];
    let ids: Vec<_> = priorities
        .iter()
        .map(|&p| kernel.fork("t", p, 0))
        .collect();

    let order = drain_ready(&mut kernel);
    let drained: Vec<_> = order
        .iter()
        .map(|id| kernel.thread(*id).unwrap().priority)
        .collect();
    assert_eq!(drained, vec![8, 8, 5, 3, 3, 1]);

    // Equal priorities keep fork order
    assert_eq!(order[0], ids[1]);
    assert_eq!(order[1], ids[3]);
    assert_eq!(order[3], ids[0]);
    assert_eq!(order[4], ids[5]);
}

#[test]
fn test_fcfs_ignores_keys() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Fcfs).unwrap();

    let ids: Vec<_> = [(9, 1), (0, 50), (4, 4)]
        .iter()
        .map(|&(p, b)| kernel.fork("t", p, b))
        .collect();

    assert_eq!(drain_ready(&mut kernel), ids);
}

#[test]
fn test_sleeper_not_ready_before_deadline() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Fcfs).unwrap();
    let main = kernel.current_thread();
    let worker = kernel.fork("worker", 0, 0);

    // Bring the clock to tick 100 before sleeping
    run_ticks(&mut kernel, 100).unwrap();
    assert_eq!(kernel.now(), 100);

    kernel.sleep(10).unwrap();
    assert_eq!(kernel.current_thread(), worker);

    for tick in 101..110 {
        run_ticks(&mut kernel, 1).unwrap();
        assert_eq!(kernel.now(), tick);
        assert_eq!(kernel.thread(main).unwrap().status(), ThreadStatus::Blocked);
        assert_eq!(kernel.scheduler().ready_count(), 0);
    }

    let outcomes = run_ticks(&mut kernel, 1).unwrap();
    assert!(outcomes[0].woke);
    assert_eq!(kernel.now(), 110);
    assert_eq!(kernel.find_next_to_run(), Some(main));
}

#[test]
fn test_many_sleepers_wake_in_deadline_order() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Fcfs).unwrap();
    let main = kernel.current_thread();

    let a = kernel.fork("a", 0, 0);
    let b = kernel.fork("b", 0, 0);

    // main sleeps 6, a runs and sleeps 2, b runs and sleeps 4
    kernel.sleep(6).unwrap();
    assert_eq!(kernel.current_thread(), a);
    kernel.sleep(2).unwrap();
    assert_eq!(kernel.current_thread(), b);
    kernel.sleep(4).unwrap();

    // Nobody left: the idle loop runs until a wakes at tick 2
    assert_eq!(kernel.current_thread(), a);
    assert_eq!(kernel.now(), 2);

    run_ticks(&mut kernel, 2).unwrap();
    assert_eq!(kernel.find_next_to_run(), Some(b));
    run_ticks(&mut kernel, 2).unwrap();
    assert_eq!(kernel.find_next_to_run(), Some(main));
    assert!(kernel.alarm().registry().is_empty());
}

#[test]
fn test_at_most_one_pending_destruction() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Fcfs).unwrap();
    let main = kernel.current_thread();
    let workers: Vec<_> = (0..3).map(|_| kernel.fork("worker", 0, 0)).collect();

    kernel.finish().unwrap();
    for &worker in &workers[..2] {
        assert!(kernel.scheduler().pending_destruction().is_none());
        assert_eq!(kernel.current_thread(), worker);
        kernel.finish().unwrap();
    }

    assert_eq!(kernel.current_thread(), workers[2]);
    assert_eq!(kernel.thread_count(), 1);
    assert!(kernel.thread(main).is_none());

    let marks = kernel
        .scheduler()
        .audit_log()
        .iter()
        .filter(|e| matches!(e, ScheduleEvent::MarkedForDestruction { .. }))
        .count();
    let reclaims = kernel
        .scheduler()
        .audit_log()
        .iter()
        .filter(|e| matches!(e, ScheduleEvent::Reclaimed { .. }))
        .count();
    assert_eq!(marks, 3);
    assert_eq!(reclaims, 3);
}

#[test]
fn test_priority_time_slicing_rotates_equal_threads() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Priority).unwrap();
    let main = kernel.current_thread();
    let peer = kernel.fork("peer", 0, 0);

    run_ticks(&mut kernel, 1).unwrap();
    assert_eq!(kernel.current_thread(), peer);
    run_ticks(&mut kernel, 1).unwrap();
    assert_eq!(kernel.current_thread(), main);
}

#[test]
fn test_priority_preemption_keeps_higher_running_first() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Priority).unwrap();
    let low = kernel.fork("low", 1, 0);
    let high = kernel.fork("high", 9, 0);

    // main (priority 0) is preempted by the highest ready thread
    run_ticks(&mut kernel, 1).unwrap();
    assert_eq!(kernel.current_thread(), high);
    assert_eq!(kernel.scheduler().ready_threads()[0], low);
}

#[test]
fn test_idle_shutdown_halts_machine() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Fcfs).unwrap();
    let worker = kernel.fork("worker", 0, 0);

    kernel.finish().unwrap();
    assert_eq!(kernel.current_thread(), worker);

    assert!(matches!(kernel.finish(), Err(KernelError::Halted)));
    assert!(kernel.is_halted());
    assert!(!kernel.timer().is_enabled());
}

#[test]
fn test_randomized_timer_is_reproducible() {
    init_logger();
    let config = KernelConfig::new(SchedulerPolicy::Fcfs).with_timer_seed(1234);
    let mut first = SimulatedKernel::new(config.clone()).unwrap();
    let mut second = SimulatedKernel::new(config).unwrap();

    run_ticks(&mut first, 50).unwrap();
    run_ticks(&mut second, 50).unwrap();

    assert_eq!(first.now(), 50);
    assert_eq!(first.timer().current_ticks(), second.timer().current_ticks());
    assert!(first.timer().current_ticks() >= 50);
    assert!(first.timer().current_ticks() <= 50 * 200);
}

#[test]
fn test_interrupts_restored_after_every_entry_point() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Priority).unwrap();
    let level = |k: &SimulatedKernel| hal::InterruptHal::level(k.interrupt());

    kernel.fork("a", 1, 0);
    assert_eq!(level(&kernel), hal::IntLevel::On);
    kernel.yield_now().unwrap();
    assert_eq!(level(&kernel), hal::IntLevel::On);
    run_ticks(&mut kernel, 3).unwrap();
    assert_eq!(level(&kernel), hal::IntLevel::On);
    kernel.sleep(1).unwrap();
    assert_eq!(level(&kernel), hal::IntLevel::On);
}
