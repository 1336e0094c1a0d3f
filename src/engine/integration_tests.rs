// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::backends::{FaultyDriver, LoopbackDriver, RecordingDriver};
use crate::engine::{CompletionState, DeviceSet, RankId};
use crate::errors::{AggregatedError, DpuError, RankFailure};
use crate::observability::sinks::MemorySink;
use crate::symbols::ProgramImage;
use crate::traits::{CallbackInvocation, DriverCall, FnCallback, RankCallback, TransportDriver};

/// Integration tests for device sets running over the loopback and test drivers
#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: u32 = 0x0800_0000;

    fn program() -> Arc<ProgramImage> {
        Arc::new(ProgramImage::from_symbols([("input", INPUT, 64), ("slot", 0x0800_0100, 8)]).unwrap())
    }

    fn loopback_set(ranks: usize) -> (Arc<LoopbackDriver>, DeviceSet) {
        let driver = Arc::new(LoopbackDriver::default());
        let set = DeviceSet::new(ranks, driver.clone(), program()).unwrap();
        (driver, set)
    }

    fn recording_set(ranks: usize, driver: RecordingDriver) -> (Arc<RecordingDriver>, DeviceSet) {
        let driver = Arc::new(driver);
        let set = DeviceSet::new(ranks, driver.clone(), program()).unwrap();
        (driver, set)
    }

    fn recording_loopback() -> RecordingDriver {
        RecordingDriver::new(Arc::new(LoopbackDriver::default()))
    }

    fn per_rank(ranks: usize, len: usize) -> Vec<Vec<u8>> {
        (0..ranks).map(|rank| vec![rank as u8 + 1; len]).collect()
    }

    async fn sync_error(set: &DeviceSet) -> AggregatedError {
        match set.sync().await {
            Err(DpuError::Sync(error)) => error,
            other => panic!("expected an aggregated sync error, got {:?}", other),
        }
    }

    fn all_idle(set: &DeviceSet) -> bool {
        set.rank_states()
            .iter()
            .all(|(_, state)| *state == CompletionState::Idle)
    }

    /// Appends `(rank, tag)` to a shared log after an uneven delay.
    struct TagCallback {
        tag: usize,
        seen: Arc<Mutex<Vec<(RankId, usize)>>>,
    }

    #[async_trait]
    impl RankCallback for TagCallback {
        async fn call(&self, invocation: CallbackInvocation) -> Result<(), String> {
            tokio::time::sleep(Duration::from_millis((self.tag * 7 % 5) as u64)).await;
            let rank = invocation.rank().ok_or("expected a per-rank invocation")?;
            self.seen.lock().push((rank, self.tag));
            Ok(())
        }

        fn name(&self) -> &str {
            "tag"
        }
    }

    /// Parks until the semaphore hands out a permit.
    struct ParkedCallback {
        release: Arc<Semaphore>,
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RankCallback for ParkedCallback {
        async fn call(&self, _invocation: CallbackInvocation) -> Result<(), String> {
            let permit = self.release.acquire().await.map_err(|e| e.to_string())?;
            permit.forget();
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Writes a rank-specific pattern straight through the driver.
    struct DirectWrite;

    #[async_trait]
    impl RankCallback for DirectWrite {
        async fn call(&self, invocation: CallbackInvocation) -> Result<(), String> {
            let rank = invocation.rank().ok_or("expected a per-rank invocation")?;
            let pattern = vec![0xA0 + rank.index() as u8; 8];
            invocation
                .driver()
                .transfer_in(rank, 0x0800_0100, &pattern)
                .await
                .map_err(|e| e.to_string())
        }

        fn name(&self) -> &str {
            "direct_write"
        }
    }

    // Property 1
    #[tokio::test]
    async fn test_scatter_arity_mismatch_enqueues_nothing() {
        let (driver, set) = recording_set(4, recording_loopback());

        assert_eq!(
            set.scatter_in("input", per_rank(3, 8)).unwrap_err(),
            DpuError::ArityMismatch { expected: 4, actual: 3 }
        );
        assert_eq!(
            set.gather_out("input", per_rank(5, 8)).unwrap_err(),
            DpuError::ArityMismatch { expected: 4, actual: 5 }
        );
        assert_eq!(set.pending_operations(), 0);
        assert!(all_idle(&set));

        set.sync().await.unwrap();
        assert!(driver.events().is_empty());
    }

    // Property 2
    #[tokio::test]
    async fn test_callbacks_run_in_enqueue_order_per_rank() {
        let (_, set) = loopback_set(3);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..10 {
            let callback = TagCallback {
                tag,
                seen: Arc::clone(&seen),
            };
            set.register_callback(Arc::new(callback), true, false).unwrap();
        }
        set.sync().await.unwrap();

        let seen = seen.lock();
        for rank in set.rank_ids() {
            let order: Vec<usize> = seen.iter().filter(|(r, _)| *r == rank).map(|(_, tag)| *tag).collect();
            assert_eq!(order, (0..10).collect::<Vec<_>>(), "order on {}", rank);
        }
    }

    #[tokio::test]
    async fn test_mixed_operations_keep_fifo_order_per_rank() {
        let driver = recording_loopback().with_delay(RankId(1), Duration::from_millis(5));
        let (driver, set) = recording_set(2, driver);

        set.broadcast_in("input", vec![9u8; 16]).unwrap();
        set.launch().unwrap();
        set.scatter_in("slot", per_rank(2, 8)).unwrap();
        let gathered = set.gather_out("input", vec![vec![0; 16]; 2]).unwrap();
        set.sync().await.unwrap();

        for rank in set.rank_ids() {
            let calls: Vec<DriverCall> = driver.events_for(rank).iter().map(|event| event.call).collect();
            assert_eq!(
                calls,
                vec![
                    DriverCall::TransferIn,
                    DriverCall::Launch,
                    DriverCall::TransferIn,
                    DriverCall::TransferOut
                ]
            );
        }
        assert_eq!(gathered.buffers().await.unwrap(), vec![vec![9u8; 16]; 2]);
    }

    // Property 3
    #[tokio::test]
    async fn test_blocking_callback_completes_before_next_operation() {
        let (driver, set) = recording_set(2, recording_loopback());
        let clock = driver.clock();
        let done = Arc::new(Mutex::new(HashMap::new()));

        let stamps = Arc::clone(&done);
        let callback = FnCallback::new("slow", move |invocation: CallbackInvocation| {
            std::thread::sleep(Duration::from_millis(30));
            let rank = invocation.rank().ok_or("expected a per-rank invocation")?;
            stamps.lock().insert(rank, clock.fetch_add(1, Ordering::SeqCst));
            Ok(())
        });
        set.register_callback(Arc::new(callback), true, false).unwrap();
        set.scatter_in("input", per_rank(2, 8)).unwrap();
        set.sync().await.unwrap();

        let done = done.lock();
        for rank in set.rank_ids() {
            let transfer = &driver.events_for(rank)[0];
            assert_eq!(transfer.call, DriverCall::TransferIn);
            assert!(transfer.started > done[&rank], "transfer on {} started before the callback finished", rank);
        }
    }

    // Property 4
    #[tokio::test]
    async fn test_non_blocking_callback_does_not_delay_queue_but_sync_waits() {
        let (driver, set) = recording_set(2, recording_loopback());
        let release = Arc::new(Semaphore::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        let callback = ParkedCallback {
            release: Arc::clone(&release),
            finished: Arc::clone(&finished),
        };
        set.register_callback(Arc::new(callback), false, false).unwrap();
        set.scatter_in("input", per_rank(2, 8)).unwrap();

        let sync = set.sync();
        tokio::pin!(sync);
        assert!(
            tokio::time::timeout(Duration::from_millis(200), &mut sync).await.is_err(),
            "sync returned while callbacks were still parked"
        );
        assert_eq!(driver.count(DriverCall::TransferIn), 2);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        release.add_permits(2);
        sync.await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    // Property 5
    #[tokio::test]
    async fn test_single_call_callback_runs_once() {
        let driver = recording_loopback().with_delay(RankId(2), Duration::from_millis(20));
        let (driver, set) = recording_set(4, driver);
        let calls = Arc::new(AtomicUsize::new(0));
        let transfers_seen = Arc::new(AtomicUsize::new(0));

        let (counter, seen, recorder) = (Arc::clone(&calls), Arc::clone(&transfers_seen), Arc::clone(&driver));
        let callback = FnCallback::new("once", move |invocation: CallbackInvocation| {
            if invocation.rank().is_some() || invocation.ranks().len() != 4 {
                return Err("expected a single-call invocation over 4 ranks".into());
            }
            counter.fetch_add(1, Ordering::SeqCst);
            seen.store(recorder.count(DriverCall::TransferIn), Ordering::SeqCst);
            Ok(())
        });

        set.scatter_in("input", per_rank(4, 8)).unwrap();
        set.register_callback(Arc::new(callback), false, true).unwrap();
        set.sync().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // The slowest rank had finished its transfer before the callback ran.
        assert_eq!(transfers_seen.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_single_call_blocks_every_rank_until_done() {
        let (driver, set) = recording_set(3, recording_loopback());
        let clock = driver.clock();
        let finished_at = Arc::new(AtomicU64::new(u64::MAX));

        let stamp = Arc::clone(&finished_at);
        let callback = FnCallback::new("barrier", move |_| {
            std::thread::sleep(Duration::from_millis(20));
            stamp.store(clock.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            Ok(())
        });
        // Non-blocking is ignored for single-call callbacks.
        set.register_callback(Arc::new(callback), false, true).unwrap();
        set.launch().unwrap();
        set.sync().await.unwrap();

        let finished_at = finished_at.load(Ordering::SeqCst);
        for event in driver.events() {
            assert!(event.started > finished_at, "{} launched before the callback finished", event.rank);
        }
    }

    // Property 6
    #[tokio::test]
    async fn test_sync_reports_failing_rank_and_resets_to_idle() {
        let faulty = FaultyDriver::new(Arc::new(LoopbackDriver::default()));
        faulty.fail(RankId(2), DriverCall::TransferIn);
        let set = DeviceSet::new(4, Arc::new(faulty), program()).unwrap();

        set.scatter_in("input", per_rank(4, 8)).unwrap();
        let error = sync_error(&set).await;

        assert_eq!(error.rank, RankId(2));
        assert_eq!(error.failed_ranks, vec![RankId(2)]);
        assert!(matches!(
            error.failure,
            RankFailure::Transfer { rank: RankId(2), kind: crate::engine::OperationKind::ScatterIn, .. }
        ));
        assert!(all_idle(&set));
        assert_eq!(set.pending_operations(), 0);
    }

    #[tokio::test]
    async fn test_first_failure_by_index_not_by_time() {
        let faulty = FaultyDriver::new(Arc::new(LoopbackDriver::default()));
        faulty.fail(RankId(2), DriverCall::Launch);
        faulty.fail(RankId(3), DriverCall::Launch);
        // Rank 2 fails long after rank 3.
        let driver = RecordingDriver::new(Arc::new(faulty)).with_delay(RankId(2), Duration::from_millis(50));
        let (driver, set) = recording_set(4, driver);

        set.launch().unwrap();
        let error = sync_error(&set).await;

        let finished = |rank| driver.events_for(rank)[0].finished;
        assert!(finished(RankId(3)) < finished(RankId(2)));
        assert_eq!(error.rank, RankId(2));
        assert_eq!(error.failed_ranks, vec![RankId(2), RankId(3)]);
        assert_eq!(error.total, 4);
    }

    // Property 7
    #[tokio::test]
    async fn test_scatter_gather_round_trip() {
        let (_, set) = loopback_set(4);
        let buffers = per_rank(4, 64);

        set.scatter_in("input", buffers.clone()).unwrap();
        let gathered = set.gather_out("input", vec![vec![0; 64]; 4]).unwrap();
        set.sync().await.unwrap();

        assert_eq!(gathered.buffers().await.unwrap(), buffers);
    }

    #[tokio::test]
    async fn test_failed_rank_discards_until_sync_then_recovers() {
        let faulty = Arc::new(FaultyDriver::new(Arc::new(LoopbackDriver::default())));
        faulty.fail(RankId(1), DriverCall::Launch);
        let recording = Arc::new(RecordingDriver::new(faulty.clone() as Arc<dyn TransportDriver>));
        let set = DeviceSet::new(3, recording.clone(), program()).unwrap();

        set.launch().unwrap();
        set.scatter_in("input", per_rank(3, 8)).unwrap();
        let gathered = set.gather_out("input", vec![vec![0; 8]; 3]).unwrap();

        assert_eq!(
            gathered.buffers().await.unwrap_err(),
            DpuError::BufferUnavailable { rank: RankId(1) }
        );
        let error = sync_error(&set).await;
        assert!(matches!(error.failure, RankFailure::Launch { rank: RankId(1), .. }));
        let calls: Vec<DriverCall> = recording.events_for(RankId(1)).iter().map(|e| e.call).collect();
        assert_eq!(calls, vec![DriverCall::Launch]);
        assert_eq!(recording.events_for(RankId(0)).len(), 3);

        faulty.clear();
        set.scatter_in("input", per_rank(3, 8)).unwrap();
        let gathered = set.gather_out("input", vec![vec![0; 8]; 3]).unwrap();
        set.sync().await.unwrap();
        assert_eq!(gathered.buffers().await.unwrap(), per_rank(3, 8));
    }

    #[tokio::test]
    async fn test_states_move_through_running_and_succeeded() {
        let (_, set) = loopback_set(2);
        let release = Arc::new(Semaphore::new(0));
        let callback = ParkedCallback {
            release: Arc::clone(&release),
            finished: Arc::new(AtomicUsize::new(0)),
        };

        set.call(Arc::new(callback)).unwrap();
        assert!(set.rank_states().iter().all(|(_, state)| *state == CompletionState::Running));

        release.add_permits(2);
        while set.pending_operations() > 0 {
            tokio::task::yield_now().await;
        }
        assert!(set.rank_states().iter().all(|(_, state)| *state == CompletionState::Succeeded));

        set.sync().await.unwrap();
        assert!(all_idle(&set));
    }

    #[tokio::test]
    async fn test_exec_forwards_launch_logs_to_sink() {
        let (driver, set) = recording_set(3, recording_loopback());
        let sink = Arc::new(MemorySink::new());

        let handle = set.exec_with(Some(sink.clone())).unwrap();
        set.sync().await.unwrap();

        assert!(handle.log.is_some());
        assert!(handle.log.unwrap().id > handle.launch.id);
        for rank in set.rank_ids() {
            assert_eq!(sink.contents_string(rank), format!("launch #1 on {}\n", rank));
        }
        assert_eq!(driver.count(DriverCall::ReadLog), 3);
    }

    #[tokio::test]
    async fn test_exec_without_sink_adds_no_callback() {
        let (driver, set) = recording_set(2, recording_loopback());

        let handle = set.exec().unwrap();
        set.sync().await.unwrap();

        assert!(handle.log.is_none());
        assert_eq!(driver.count(DriverCall::Launch), 2);
        assert_eq!(driver.count(DriverCall::ReadLog), 0);
    }

    #[tokio::test]
    async fn test_exec_uses_configured_sink() {
        let sink = Arc::new(MemorySink::new());
        let set = DeviceSet::new(1, Arc::new(LoopbackDriver::default()), program())
            .unwrap()
            .with_log_sink(sink.clone());

        set.exec().unwrap();
        set.exec().unwrap();
        set.sync().await.unwrap();

        assert_eq!(sink.contents_string(RankId(0)), "launch #1 on rank#0\nlaunch #2 on rank#0\n");
    }

    #[tokio::test]
    async fn test_detached_callback_failure_is_reported_at_sync() {
        let (driver, set) = recording_set(3, recording_loopback());
        let callback = FnCallback::new("flaky", |invocation: CallbackInvocation| match invocation.rank() {
            Some(RankId(1)) => Err("rank 1 is unhappy".to_string()),
            _ => Ok(()),
        });

        set.register_callback(Arc::new(callback), false, false).unwrap();
        set.launch().unwrap();
        let error = sync_error(&set).await;

        assert_eq!(error.failed_ranks, vec![RankId(1)]);
        match error.failure {
            RankFailure::Callback { rank, callback, message } => {
                assert_eq!(rank, RankId(1));
                assert_eq!(callback, "flaky");
                assert_eq!(message, "rank 1 is unhappy");
            }
            other => panic!("expected a callback failure, got {:?}", other),
        }
        // The failure does not discard later entries.
        assert_eq!(driver.count(DriverCall::Launch), 3);
    }

    #[tokio::test]
    async fn test_queue_failure_outranks_detached_callback_failure() {
        let faulty = FaultyDriver::new(Arc::new(LoopbackDriver::default()));
        faulty.fail(RankId(0), DriverCall::Launch);
        let set = DeviceSet::new(1, Arc::new(faulty), program()).unwrap();

        let callback = FnCallback::new("bad", |_| Err("detached failure".to_string()));
        set.register_callback(Arc::new(callback), false, false).unwrap();
        set.launch().unwrap();
        let error = sync_error(&set).await;

        assert!(matches!(error.failure, RankFailure::Launch { .. }));
    }

    #[tokio::test]
    async fn test_single_call_failure_is_recorded_on_every_rank() {
        let (driver, set) = loopback_set(4);
        let callback = FnCallback::new("whole_set", |_| Err("nope".to_string()));

        set.register_callback(Arc::new(callback), true, true).unwrap();
        set.launch().unwrap();
        let error = sync_error(&set).await;

        assert_eq!(error.failed_ranks, set.rank_ids());
        assert_eq!(error.rank, RankId(0));
        assert!(matches!(error.failure, RankFailure::Callback { ref callback, .. } if callback == "whole_set"));
        for rank in set.rank_ids() {
            assert_eq!(driver.launch_count(rank), 0, "{} launched after the failed callback", rank);
        }
    }

    #[tokio::test]
    async fn test_blocking_callback_failure_discards_later_entries() {
        let (driver, set) = recording_set(3, recording_loopback());
        let callback = FnCallback::new("checker", |invocation: CallbackInvocation| match invocation.rank() {
            Some(RankId(2)) => Err("bad checksum".to_string()),
            _ => Ok(()),
        });

        set.call(Arc::new(callback)).unwrap();
        set.launch().unwrap();
        let gathered = set.gather_out("input", vec![vec![0; 8]; 3]).unwrap();
        let error = sync_error(&set).await;

        assert_eq!(error.failed_ranks, vec![RankId(2)]);
        match error.failure {
            RankFailure::Callback { rank, callback, message } => {
                assert_eq!(rank, RankId(2));
                assert_eq!(callback, "checker");
                assert_eq!(message, "bad checksum");
            }
            other => panic!("expected a callback failure, got {:?}", other),
        }
        assert_eq!(driver.count(DriverCall::Launch), 2);
        assert!(driver.events_for(RankId(2)).is_empty());
        assert_eq!(
            gathered.buffers().await,
            Err(DpuError::BufferUnavailable { rank: RankId(2) })
        );
        assert!(all_idle(&set));
    }

    #[tokio::test]
    async fn test_parked_detached_callback_keeps_rank_running() {
        let (_, set) = loopback_set(1);
        let release = Arc::new(Semaphore::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let callback = ParkedCallback {
            release: Arc::clone(&release),
            finished: Arc::clone(&finished),
        };

        set.register_callback(Arc::new(callback), false, false).unwrap();
        set.launch().unwrap();
        // Only the detached callback is left once the launch has run.
        while set.pending_operations() > 1 {
            tokio::task::yield_now().await;
        }
        assert_eq!(set.rank_states(), vec![(RankId(0), CompletionState::Running)]);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        release.add_permits(1);
        while set.pending_operations() > 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(set.rank_states(), vec![(RankId(0), CompletionState::Succeeded)]);

        set.sync().await.unwrap();
        assert!(all_idle(&set));
    }

    #[tokio::test]
    async fn test_failure_survives_a_sync_that_timed_out() {
        let faulty = FaultyDriver::new(Arc::new(LoopbackDriver::default()));
        faulty.fail(RankId(1), DriverCall::Launch);
        let set = DeviceSet::new(2, Arc::new(faulty), program()).unwrap();
        let release = Arc::new(Semaphore::new(0));
        let callback = ParkedCallback {
            release: Arc::clone(&release),
            finished: Arc::new(AtomicUsize::new(0)),
        };

        // Rank 0 parks in a callback so the sync cannot finish; rank 1 fails
        // its launch and reaches the barrier.
        set.launch().unwrap();
        set.call(Arc::new(callback)).unwrap();
        let timed_out = tokio::time::timeout(Duration::from_millis(50), set.sync()).await;
        assert!(timed_out.is_err());

        release.add_permits(1);
        let error = sync_error(&set).await;
        assert_eq!(error.rank, RankId(1));
        assert!(matches!(error.failure, RankFailure::Launch { .. }));

        // Reported once.
        set.sync().await.unwrap();
        assert!(all_idle(&set));
    }

    #[tokio::test]
    async fn test_single_call_is_skipped_when_a_rank_already_failed() {
        let faulty = FaultyDriver::new(Arc::new(LoopbackDriver::default()));
        faulty.fail(RankId(3), DriverCall::TransferIn);
        let set = DeviceSet::new(4, Arc::new(faulty), program()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let callback = FnCallback::new("after_scatter", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        set.scatter_in("input", per_rank(4, 8)).unwrap();
        set.register_callback(Arc::new(callback), true, true).unwrap();
        set.launch().unwrap();
        let error = sync_error(&set).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(error.failed_ranks, vec![RankId(3)]);
        assert!(all_idle(&set));
    }

    #[tokio::test]
    async fn test_callback_transfers_directly_on_its_rank() {
        let (driver, set) = loopback_set(2);

        set.call(Arc::new(DirectWrite)).unwrap();
        let gathered = set.gather_out("slot", vec![vec![0; 8]; 2]).unwrap();
        set.sync().await.unwrap();

        assert_eq!(gathered.buffers().await.unwrap(), vec![vec![0xA0; 8], vec![0xA1; 8]]);
        assert_eq!(driver.peek(RankId(1), 0x0800_0100, 8), vec![0xA1; 8]);
    }

    #[tokio::test]
    async fn test_explicit_rank_order_drives_buffer_assignment() {
        let driver = Arc::new(LoopbackDriver::default());
        let set = DeviceSet::with_ranks(vec![RankId(5), RankId(2)], driver.clone(), program()).unwrap();

        set.scatter_in("input", vec![vec![0x55; 4], vec![0x22; 4]]).unwrap();
        set.sync().await.unwrap();

        assert_eq!(driver.peek(RankId(5), INPUT, 4), vec![0x55; 4]);
        assert_eq!(driver.peek(RankId(2), INPUT, 4), vec![0x22; 4]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_interleave_single_calls_safely() {
        let (_, set) = loopback_set(4);
        let set = Arc::new(set);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut callers = Vec::new();
        for _ in 0..2 {
            let set = Arc::clone(&set);
            let calls = Arc::clone(&calls);
            callers.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let counter = Arc::clone(&calls);
                    let callback = FnCallback::new("shared", move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    });
                    set.register_callback(Arc::new(callback), true, true).unwrap();
                    set.launch().unwrap();
                }
            }));
        }
        for caller in callers {
            caller.await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(10), set.sync())
            .await
            .expect("sync deadlocked")
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exec_log_read_directly_follows_its_launch() {
        let (_, set) = loopback_set(2);
        let set = Arc::new(set);
        let sink = Arc::new(MemorySink::new());

        let mut tasks = Vec::new();
        for task in 0..8 {
            let set = Arc::clone(&set);
            let sink = Arc::clone(&sink);
            tasks.push(tokio::spawn(async move {
                let mut pairs = Vec::new();
                for _ in 0..10 {
                    if task % 2 == 0 {
                        let exec = set.exec_with(Some(sink.clone())).unwrap();
                        pairs.push((exec.launch.id.0, exec.log.map(|log| log.id.0)));
                    } else {
                        set.launch().unwrap();
                    }
                    tokio::task::yield_now().await;
                }
                pairs
            }));
        }

        for task in tasks {
            for (launch, log) in task.await.unwrap() {
                assert_eq!(log, Some(launch + 1));
            }
        }
        set.sync().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_is_reusable_after_failed_sync() {
        let faulty = Arc::new(FaultyDriver::new(Arc::new(LoopbackDriver::default())));
        faulty.fail_once(RankId(0), DriverCall::TransferOut);
        let set = DeviceSet::new(2, faulty.clone(), program()).unwrap();

        set.broadcast_in("input", vec![3u8; 8]).unwrap();
        let first = set.gather_out("input", vec![vec![0; 8]; 2]).unwrap();
        let error = sync_error(&set).await;
        assert_eq!(error.rank, RankId(0));
        assert!(first.buffers().await.is_err());

        let second = set.gather_out("input", vec![vec![0; 8]; 2]).unwrap();
        set.sync().await.unwrap();
        assert_eq!(second.buffers().await.unwrap(), vec![vec![3u8; 8]; 2]);
    }
}
