// SPDX-License-Identifier: CEPL-1.0
use crate::{
    AcquireOutcome, DrawableSurface, FrameBackend, FrameError, FrameSlot, FrameSlots, Overlay,
    PresentOutcome,
};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
    Recreating,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented {
        slot: FrameSlot,
        image: u32,
        /// The swapchain was rebuilt after this frame was presented.
        recreated: bool,
    },
    /// Nothing was drawn: the swapchain was out of date at acquire, or a
    /// pending recreation could not run yet.
    Skipped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub presented: u64,
    pub skipped: u64,
    pub recreations: u64,
}

/// Owns the backend (swapchain generation, frame-sync table, command
/// source) and drives wait → acquire → record → submit → present → advance.
///
/// Single-threaded by construction: recreation mutates the backend only
/// after `wait_idle`, so there are never readers of the old generation.
pub struct FrameDriver<B: FrameBackend, O: Overlay<B>> {
    backend: B,
    overlay: O,
    slots: FrameSlots,
    state: FrameState,
    stats: FrameStats,
    recreate_pending: bool,
}

impl<B: FrameBackend, O: Overlay<B>> FrameDriver<B, O> {
    pub fn new(backend: B, mut overlay: O) -> Result<Self, FrameError> {
        let slots = FrameSlots::new(backend.frames_in_flight()).ok_or(FrameError::NoFramesInFlight)?;
        overlay.retarget(backend.target());
        info!("frame driver ready ({} frames in flight)", slots.count());
        Ok(FrameDriver {
            backend,
            overlay,
            slots,
            state: FrameState::Idle,
            stats: FrameStats::default(),
            recreate_pending: false,
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Slot the next `draw_frame` will use.
    pub fn slot(&self) -> FrameSlot {
        self.slots.current()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn overlay_mut(&mut self) -> &mut O {
        &mut self.overlay
    }

    pub fn into_parts(self) -> (B, O) {
        (self.backend, self.overlay)
    }

    pub fn wait_idle(&mut self) -> Result<(), FrameError> {
        self.backend.wait_idle().map_err(FrameError::DeviceIdle)
    }

    // STRICT PER-FRAME ORDER:
    // 1) wait in-flight fence of the slot
    // 2) acquire (signals image-available); reset the fence only once we know we will submit
    // 3) record: begin pass, overlay begin, scene, overlay end, end pass
    // 4) submit (waits image-available, signals render-finished + fence)
    // 5) present (waits render-finished), then recreate if stale/suboptimal/resized
    // 6) advance slot
    pub fn draw_frame<S>(&mut self, surface: &mut S) -> Result<FrameStatus, FrameError>
    where
        S: DrawableSurface + ?Sized,
    {
        if self.recreate_pending && !self.recreate(surface)? {
            self.stats.skipped += 1;
            return Ok(FrameStatus::Skipped);
        }

        let slot = self.slots.current();

        // 1) Wait
        self.state = FrameState::Acquiring;
        self.backend
            .wait_for_slot(slot)
            .map_err(|source| FrameError::FenceWait { slot, source })?;

        // 2) Acquire
        let acquired = match self
            .backend
            .acquire_image(slot)
            .map_err(|source| FrameError::Acquire { slot, source })?
        {
            AcquireOutcome::Ready(acquired) => acquired,
            AcquireOutcome::OutOfDate => {
                // Fence stays signalled and the slot is not advanced, so the
                // next iteration waits on the same slot without blocking.
                debug!("{slot}: acquire out of date, frame dropped");
                self.stats.skipped += 1;
                self.recreate(surface)?;
                self.state = FrameState::Idle;
                return Ok(FrameStatus::Skipped);
            }
        };
        self.backend
            .reset_slot(slot)
            .map_err(|source| FrameError::FenceReset { slot, source })?;

        // 3) Record
        self.state = FrameState::Recording;
        let cmd = self.record(slot, acquired.image)?;

        // 4) Submit
        self.backend
            .submit(slot, cmd)
            .map_err(|source| FrameError::Submit { slot, source })?;
        self.state = FrameState::Submitted;

        // 5) Present. A failed present leaves the state at Submitted.
        let presented = self
            .backend
            .present(slot, acquired.image)
            .map_err(|source| FrameError::Present { slot, source })?;
        self.state = FrameState::Presenting;
        let resize_requested = surface.take_resize_request();
        let stale = presented != PresentOutcome::Optimal || acquired.suboptimal || resize_requested;

        let recreated = if stale {
            debug!(
                "{slot}: present={presented:?} acquire_suboptimal={} resize={resize_requested} → recreate",
                acquired.suboptimal
            );
            self.recreate(surface)?
        } else {
            false
        };

        // 6) Advance
        self.slots.advance();
        self.stats.presented += 1;
        self.state = FrameState::Idle;

        Ok(FrameStatus::Presented {
            slot,
            image: acquired.image,
            recreated,
        })
    }

    fn record(&mut self, slot: FrameSlot, image: u32) -> Result<B::Commands, FrameError> {
        let err = |source: anyhow::Error| FrameError::Record { slot, source };

        let cmd = self.backend.begin_frame_commands(slot, image).map_err(err)?;
        self.overlay.begin_frame();
        self.backend.draw_scene(cmd, slot).map_err(err)?;
        self.overlay.end_frame(&self.backend, cmd).map_err(err)?;
        self.backend.end_frame_commands(cmd).map_err(err)?;
        Ok(cmd)
    }

    /// Rebuild the swapchain for the surface's current size.
    ///
    /// Blocks while the drawable is zero-sized. Returns `Ok(false)` when the
    /// surface asks to close during that wait; the rebuild then stays
    /// pending and runs before the next frame.
    pub fn recreate<S>(&mut self, surface: &mut S) -> Result<bool, FrameError>
    where
        S: DrawableSurface + ?Sized,
    {
        self.state = FrameState::Recreating;
        self.backend.wait_idle().map_err(FrameError::DeviceIdle)?;

        let mut size = surface.drawable_size();
        if size.is_empty() {
            info!("drawable is {size}, waiting for a non-zero size");
        }
        while size.is_empty() {
            if surface.should_close() {
                self.recreate_pending = true;
                self.state = FrameState::Idle;
                return Ok(false);
            }
            surface.wait_events();
            size = surface.drawable_size();
        }

        // The rebuild uses the current size, so any resize reported so far is covered.
        surface.take_resize_request();
        self.backend
            .rebuild_swapchain(size)
            .map_err(FrameError::Recreate)?;
        self.overlay.retarget(self.backend.target());

        self.recreate_pending = false;
        self.stats.recreations += 1;
        self.state = FrameState::Idle;
        info!(
            "swapchain generation {} for {size}",
            self.backend.generation()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Acquired, NoOverlay, RenderSize};
    use anyhow::{anyhow, bail, Result};
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;

    #[derive(Clone, Debug, PartialEq)]
    enum Ev {
        Wait(usize),
        Reset(usize),
        Acquire(usize),
        Begin(usize, u32),
        OverlayBegin,
        Draw(usize),
        OverlayEnd,
        End,
        Submit(usize),
        Present(usize, u32),
        Idle,
        Rebuild(RenderSize),
    }

    type Log = Rc<RefCell<Vec<Ev>>>;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct MockTarget {
        generation: u64,
        extent: RenderSize,
    }

    /// Simulated GPU: a submission completes when its slot is waited on or
    /// the device goes idle. Protocol misuse is collected in `violations`.
    struct MockGpu {
        log: Log,
        image_count: u32,
        next_image: u32,
        acquires: usize,
        presents: usize,
        acquire_at: HashMap<usize, AcquireOutcome>,
        present_at: HashMap<usize, PresentOutcome>,
        fail_submit: bool,
        fail_present: bool,
        fence_signalled: Vec<bool>,
        waited: Vec<bool>,
        outstanding: Vec<bool>,
        violations: Vec<String>,
        target: MockTarget,
    }

    impl MockGpu {
        fn new(frames: usize, log: &Log) -> Self {
            MockGpu {
                log: log.clone(),
                image_count: 3,
                next_image: 0,
                acquires: 0,
                presents: 0,
                acquire_at: HashMap::new(),
                present_at: HashMap::new(),
                fail_submit: false,
                fail_present: false,
                fence_signalled: vec![true; frames],
                waited: vec![false; frames],
                outstanding: vec![false; frames],
                violations: Vec::new(),
                target: MockTarget {
                    generation: 0,
                    extent: RenderSize::new(1280, 720),
                },
            }
        }

        fn push(&self, ev: Ev) {
            self.log.borrow_mut().push(ev);
        }
    }

    impl FrameBackend for MockGpu {
        type Commands = usize;
        type Target = MockTarget;

        fn frames_in_flight(&self) -> usize {
            self.fence_signalled.len()
        }

        fn wait_for_slot(&mut self, slot: FrameSlot) -> Result<()> {
            let s = slot.index();
            self.push(Ev::Wait(s));
            if self.outstanding[s] {
                self.outstanding[s] = false;
                self.fence_signalled[s] = true;
            }
            if !self.fence_signalled[s] {
                bail!("{slot}: waiting on a fence nobody will signal");
            }
            self.waited[s] = true;
            Ok(())
        }

        fn reset_slot(&mut self, slot: FrameSlot) -> Result<()> {
            let s = slot.index();
            self.push(Ev::Reset(s));
            if !self.waited[s] {
                self.violations.push(format!("{slot}: reset without a wait"));
            }
            self.fence_signalled[s] = false;
            Ok(())
        }

        fn acquire_image(&mut self, slot: FrameSlot) -> Result<AcquireOutcome> {
            self.push(Ev::Acquire(slot.index()));
            let call = self.acquires;
            self.acquires += 1;
            if let Some(outcome) = self.acquire_at.get(&call) {
                return Ok(*outcome);
            }
            let image = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok(AcquireOutcome::Ready(Acquired {
                image,
                suboptimal: false,
            }))
        }

        fn begin_frame_commands(&mut self, slot: FrameSlot, image: u32) -> Result<usize> {
            self.push(Ev::Begin(slot.index(), image));
            if self.outstanding[slot.index()] {
                self.violations.push(format!("{slot}: recording into a buffer still in flight"));
            }
            Ok(slot.index())
        }

        fn draw_scene(&mut self, _cmd: usize, slot: FrameSlot) -> Result<()> {
            self.push(Ev::Draw(slot.index()));
            Ok(())
        }

        fn end_frame_commands(&mut self, _cmd: usize) -> Result<()> {
            self.push(Ev::End);
            Ok(())
        }

        fn submit(&mut self, slot: FrameSlot, cmd: usize) -> Result<()> {
            let s = slot.index();
            self.push(Ev::Submit(s));
            if self.fail_submit {
                return Err(anyhow!("VK_ERROR_DEVICE_LOST"));
            }
            if cmd != s {
                self.violations.push(format!("{slot}: submitted buffer of slot#{cmd}"));
            }
            if self.fence_signalled[s] {
                self.violations.push(format!("{slot}: submitted with a signalled fence"));
            }
            if self.outstanding[s] {
                self.violations.push(format!("{slot}: two submissions outstanding"));
            }
            self.outstanding[s] = true;
            self.waited[s] = false;
            Ok(())
        }

        fn present(&mut self, slot: FrameSlot, image: u32) -> Result<PresentOutcome> {
            self.push(Ev::Present(slot.index(), image));
            if self.fail_present {
                return Err(anyhow!("VK_ERROR_SURFACE_LOST_KHR"));
            }
            let call = self.presents;
            self.presents += 1;
            Ok(self
                .present_at
                .get(&call)
                .copied()
                .unwrap_or(PresentOutcome::Optimal))
        }

        fn wait_idle(&mut self) -> Result<()> {
            self.push(Ev::Idle);
            for s in 0..self.outstanding.len() {
                if self.outstanding[s] {
                    self.outstanding[s] = false;
                    self.fence_signalled[s] = true;
                }
            }
            Ok(())
        }

        fn rebuild_swapchain(&mut self, size: RenderSize) -> Result<()> {
            self.push(Ev::Rebuild(size));
            if size.is_empty() {
                self.violations.push("zero-extent swapchain".to_owned());
            }
            if self.outstanding.iter().any(|&o| o) {
                self.violations.push("rebuild with work in flight".to_owned());
            }
            self.target = MockTarget {
                generation: self.target.generation + 1,
                extent: size,
            };
            self.next_image = 0;
            Ok(())
        }

        fn target(&self) -> &MockTarget {
            &self.target
        }

        fn generation(&self) -> u64 {
            self.target.generation
        }
    }

    struct RecordingOverlay {
        log: Log,
        retargets: Vec<MockTarget>,
    }

    impl Overlay<MockGpu> for RecordingOverlay {
        fn begin_frame(&mut self) {
            self.log.borrow_mut().push(Ev::OverlayBegin);
        }

        fn end_frame(&mut self, _backend: &MockGpu, _cmd: usize) -> Result<()> {
            self.log.borrow_mut().push(Ev::OverlayEnd);
            Ok(())
        }

        fn retarget(&mut self, target: &MockTarget) {
            self.retargets.push(*target);
        }
    }

    struct MockSurface {
        size: RenderSize,
        upcoming: VecDeque<RenderSize>,
        resized: bool,
        close: bool,
        waits: usize,
    }

    impl MockSurface {
        fn new(width: u32, height: u32) -> Self {
            MockSurface {
                size: RenderSize::new(width, height),
                upcoming: VecDeque::new(),
                resized: false,
                close: false,
                waits: 0,
            }
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.size = RenderSize::new(width, height);
            self.resized = true;
        }
    }

    impl DrawableSurface for MockSurface {
        fn drawable_size(&self) -> RenderSize {
            self.size
        }

        fn wait_events(&mut self) {
            self.waits += 1;
            if let Some(next) = self.upcoming.pop_front() {
                self.size = next;
            }
        }

        fn should_close(&self) -> bool {
            self.close
        }

        fn take_resize_request(&mut self) -> bool {
            std::mem::take(&mut self.resized)
        }
    }

    type Driver = FrameDriver<MockGpu, RecordingOverlay>;

    fn driver(frames: usize) -> (Driver, Log) {
        let log: Log = Rc::default();
        let overlay = RecordingOverlay {
            log: log.clone(),
            retargets: Vec::new(),
        };
        let d = FrameDriver::new(MockGpu::new(frames, &log), overlay).unwrap();
        (d, log)
    }

    fn count(log: &Log, pred: impl Fn(&Ev) -> bool) -> usize {
        log.borrow().iter().filter(|e| pred(e)).count()
    }

    fn assert_clean(d: &Driver) {
        assert!(
            d.backend().violations.is_empty(),
            "violations: {:?}",
            d.backend().violations
        );
    }

    #[test]
    fn zero_frames_in_flight_is_rejected() {
        let log: Log = Rc::default();
        let r = FrameDriver::new(MockGpu::new(0, &log), NoOverlay);
        assert!(matches!(r, Err(FrameError::NoFramesInFlight)));
    }

    #[test]
    fn one_frame_runs_the_full_sequence_in_order() {
        let (mut d, log) = driver(2);
        let mut surface = MockSurface::new(1280, 720);

        let status = d.draw_frame(&mut surface).unwrap();

        assert!(matches!(
            status,
            FrameStatus::Presented {
                slot,
                image: 0,
                recreated: false
            } if slot.index() == 0
        ));
        assert_eq!(
            *log.borrow(),
            vec![
                Ev::Wait(0),
                Ev::Acquire(0),
                Ev::Reset(0),
                Ev::Begin(0, 0),
                Ev::OverlayBegin,
                Ev::Draw(0),
                Ev::OverlayEnd,
                Ev::End,
                Ev::Submit(0),
                Ev::Present(0, 0),
            ]
        );
        assert_eq!(d.state(), FrameState::Idle);
        assert_clean(&d);
    }

    #[test]
    fn round_robin_slots_and_one_wait_per_submit() {
        let (mut d, log) = driver(2);
        let mut surface = MockSurface::new(1280, 720);

        let mut used = Vec::new();
        for _ in 0..8 {
            match d.draw_frame(&mut surface).unwrap() {
                FrameStatus::Presented { slot, .. } => used.push(slot.index()),
                FrameStatus::Skipped => panic!("no frame should be skipped"),
            }
        }

        assert_eq!(used, vec![0, 1, 0, 1, 0, 1, 0, 1]);
        let waits = count(&log, |e| matches!(e, Ev::Wait(_)));
        let submits = count(&log, |e| matches!(e, Ev::Submit(_)));
        assert_eq!(waits, submits);
        assert_eq!(count(&log, |e| matches!(e, Ev::Rebuild(_))), 0);
        assert_eq!(d.stats().presented, 8);
        assert_clean(&d);
    }

    #[test]
    fn slot_is_frame_number_mod_frames_in_flight() {
        let (mut d, _log) = driver(3);
        let mut surface = MockSurface::new(800, 600);
        for n in 0..10 {
            assert_eq!(d.slot().index(), n % 3);
            d.draw_frame(&mut surface).unwrap();
        }
        assert_clean(&d);
    }

    #[test]
    fn fence_reset_sits_between_wait_and_submit() {
        let (mut d, log) = driver(2);
        let mut surface = MockSurface::new(1280, 720);
        for _ in 0..5 {
            d.draw_frame(&mut surface).unwrap();
        }

        let log = log.borrow();
        for (i, ev) in log.iter().enumerate() {
            if let Ev::Reset(s) = ev {
                let wait = log[..i].iter().rposition(|e| *e == Ev::Wait(*s)).unwrap();
                let submit = log[i..].iter().position(|e| *e == Ev::Submit(*s)).unwrap() + i;
                assert!(wait < i && i < submit);
                assert!(!log[wait + 1..i].contains(&Ev::Submit(*s)));
            }
        }
    }

    #[test]
    fn out_of_date_acquire_drops_the_frame_and_recreates() {
        let (mut d, log) = driver(2);
        d.backend_mut()
            .acquire_at
            .insert(4, AcquireOutcome::OutOfDate);
        let mut surface = MockSurface::new(1280, 720);

        for _ in 0..4 {
            d.draw_frame(&mut surface).unwrap();
        }
        let slot_before = d.slot();
        let generation_before = d.backend().generation();
        let mark = log.borrow().len();

        let status = d.draw_frame(&mut surface).unwrap();

        assert_eq!(status, FrameStatus::Skipped);
        assert_eq!(d.slot(), slot_before);
        assert_ne!(d.backend().generation(), generation_before);
        {
            let iteration = &log.borrow()[mark..];
            assert!(!iteration
                .iter()
                .any(|e| matches!(e, Ev::Begin(..) | Ev::Draw(_) | Ev::Submit(_) | Ev::Present(..))));
            assert!(!iteration.iter().any(|e| matches!(e, Ev::Reset(_))));
            assert_eq!(
                iteration
                    .iter()
                    .filter(|e| matches!(e, Ev::Rebuild(_)))
                    .count(),
                1
            );
        }

        // Same slot again; its fence was never reset so the wait returns.
        match d.draw_frame(&mut surface).unwrap() {
            FrameStatus::Presented { slot, .. } => assert_eq!(slot, slot_before),
            FrameStatus::Skipped => panic!("frame after recovery must be drawn"),
        }
        assert_eq!(d.stats().skipped, 1);
        assert_clean(&d);
    }

    #[test]
    fn suboptimal_present_still_counts_and_recreates_once_after_present() {
        let (mut d, log) = driver(2);
        d.backend_mut()
            .present_at
            .insert(0, PresentOutcome::Suboptimal);
        let mut surface = MockSurface::new(1280, 720);

        let status = d.draw_frame(&mut surface).unwrap();

        assert!(matches!(
            status,
            FrameStatus::Presented {
                recreated: true,
                ..
            }
        ));
        assert_eq!(d.slot().index(), 1);
        {
            let log = log.borrow();
            let present = log.iter().position(|e| matches!(e, Ev::Present(..))).unwrap();
            let rebuild = log.iter().position(|e| matches!(e, Ev::Rebuild(_))).unwrap();
            assert!(present < rebuild);
        }

        d.draw_frame(&mut surface).unwrap();
        assert_eq!(count(&log, |e| matches!(e, Ev::Rebuild(_))), 1);
        assert_clean(&d);
    }

    #[test]
    fn suboptimal_acquire_draws_then_recreates() {
        let (mut d, log) = driver(2);
        d.backend_mut().acquire_at.insert(
            0,
            AcquireOutcome::Ready(Acquired {
                image: 2,
                suboptimal: true,
            }),
        );
        let mut surface = MockSurface::new(1280, 720);

        let status = d.draw_frame(&mut surface).unwrap();

        assert!(matches!(
            status,
            FrameStatus::Presented {
                image: 2,
                recreated: true,
                ..
            }
        ));
        assert_eq!(count(&log, |e| matches!(e, Ev::Submit(_))), 1);
        assert_eq!(count(&log, |e| matches!(e, Ev::Rebuild(_))), 1);
        assert_clean(&d);
    }

    #[test]
    fn out_of_date_present_recreates() {
        let (mut d, log) = driver(2);
        d.backend_mut()
            .present_at
            .insert(1, PresentOutcome::OutOfDate);
        let mut surface = MockSurface::new(1280, 720);

        d.draw_frame(&mut surface).unwrap();
        let status = d.draw_frame(&mut surface).unwrap();

        assert!(matches!(
            status,
            FrameStatus::Presented {
                recreated: true,
                ..
            }
        ));
        assert_eq!(d.slot().index(), 0);
        assert_eq!(count(&log, |e| matches!(e, Ev::Rebuild(_))), 1);
        assert_clean(&d);
    }

    #[test]
    fn resize_rebuilds_once_with_the_new_size() {
        let (mut d, log) = driver(2);
        let mut surface = MockSurface::new(1280, 720);
        d.draw_frame(&mut surface).unwrap();

        surface.resize(640, 480);
        d.draw_frame(&mut surface).unwrap();
        d.draw_frame(&mut surface).unwrap();

        assert_eq!(
            log.borrow()
                .iter()
                .filter(|e| matches!(e, Ev::Rebuild(_)))
                .cloned()
                .collect::<Vec<_>>(),
            vec![Ev::Rebuild(RenderSize::new(640, 480))]
        );
        assert_eq!(d.backend().target().extent, RenderSize::new(640, 480));
        // initial publish + one per recreation
        let retargets = &d.overlay_mut().retargets;
        assert_eq!(retargets.len(), 2);
        assert_eq!(retargets[1].extent, RenderSize::new(640, 480));
        assert_clean(&d);
    }

    #[test]
    fn resize_with_out_of_date_acquire_rebuilds_once() {
        let (mut d, log) = driver(2);
        let mut surface = MockSurface::new(1280, 720);
        d.draw_frame(&mut surface).unwrap();

        surface.resize(640, 480);
        d.backend_mut()
            .acquire_at
            .insert(1, AcquireOutcome::OutOfDate);
        assert_eq!(d.draw_frame(&mut surface).unwrap(), FrameStatus::Skipped);
        for _ in 0..2 {
            assert!(matches!(
                d.draw_frame(&mut surface).unwrap(),
                FrameStatus::Presented {
                    recreated: false,
                    ..
                }
            ));
        }

        assert_eq!(
            log.borrow()
                .iter()
                .filter(|e| matches!(e, Ev::Rebuild(_)))
                .cloned()
                .collect::<Vec<_>>(),
            vec![Ev::Rebuild(RenderSize::new(640, 480))]
        );
        assert_eq!(d.stats().recreations, 1);
        assert_clean(&d);
    }

    #[test]
    fn resize_while_minimised_is_consumed_by_the_rebuild() {
        let (mut d, log) = driver(2);
        let mut surface = MockSurface::new(0, 0);
        surface.resized = true;
        surface.upcoming = VecDeque::from([RenderSize::new(800, 600)]);

        assert!(d.recreate(&mut surface).unwrap());
        d.draw_frame(&mut surface).unwrap();

        assert_eq!(count(&log, |e| matches!(e, Ev::Rebuild(_))), 1);
    }

    #[test]
    fn minimised_surface_blocks_until_it_has_a_size() {
        let (mut d, log) = driver(2);
        let mut surface = MockSurface::new(0, 0);
        surface.upcoming = VecDeque::from([RenderSize::new(0, 0), RenderSize::new(800, 600)]);

        assert!(d.recreate(&mut surface).unwrap());

        assert_eq!(surface.waits, 2);
        assert_eq!(
            log.borrow().iter().filter(|e| matches!(e, Ev::Rebuild(_))).cloned().collect::<Vec<_>>(),
            vec![Ev::Rebuild(RenderSize::new(800, 600))]
        );
        assert_clean(&d);
    }

    #[test]
    fn close_while_minimised_leaves_recreation_pending() {
        let (mut d, log) = driver(2);
        let mut surface = MockSurface::new(0, 0);
        surface.close = true;

        assert!(!d.recreate(&mut surface).unwrap());
        assert_eq!(d.draw_frame(&mut surface).unwrap(), FrameStatus::Skipped);
        assert_eq!(count(&log, |e| matches!(e, Ev::Rebuild(_) | Ev::Wait(_))), 0);

        surface.close = false;
        surface.size = RenderSize::new(320, 200);
        assert!(matches!(
            d.draw_frame(&mut surface).unwrap(),
            FrameStatus::Presented { .. }
        ));
        assert_eq!(count(&log, |e| matches!(e, Ev::Rebuild(_))), 1);
    }

    #[test]
    fn back_to_back_recreation_is_stable() {
        let (mut d, log) = driver(2);
        let mut surface = MockSurface::new(1280, 720);

        assert!(d.recreate(&mut surface).unwrap());
        let first = *d.backend().target();
        assert!(d.recreate(&mut surface).unwrap());
        let second = *d.backend().target();

        assert_eq!(first.extent, second.extent);
        assert_eq!(second.generation, first.generation + 1);
        let log = log.borrow();
        for (i, ev) in log.iter().enumerate() {
            if matches!(ev, Ev::Rebuild(_)) {
                assert_eq!(log[i - 1], Ev::Idle);
            }
        }
        assert_eq!(d.stats().recreations, 2);
    }

    #[test]
    fn idle_wait_drains_in_flight_work_before_rebuild() {
        let (mut d, _log) = driver(3);
        let mut surface = MockSurface::new(1280, 720);
        d.draw_frame(&mut surface).unwrap();
        d.draw_frame(&mut surface).unwrap();

        surface.resize(1000, 700);
        d.draw_frame(&mut surface).unwrap();

        assert_clean(&d);
    }

    #[test]
    fn submit_failure_is_fatal_and_skips_present() {
        let (mut d, log) = driver(2);
        d.backend_mut().fail_submit = true;
        let mut surface = MockSurface::new(1280, 720);

        let err = d.draw_frame(&mut surface).unwrap_err();

        assert!(matches!(err, FrameError::Submit { .. }));
        assert_eq!(d.state(), FrameState::Recording);
        assert_eq!(count(&log, |e| matches!(e, Ev::Present(..))), 0);
        assert!(std::error::Error::source(&err)
            .unwrap()
            .to_string()
            .contains("DEVICE_LOST"));
    }

    #[test]
    fn present_failure_is_fatal_and_stops_after_submit() {
        let (mut d, log) = driver(2);
        d.backend_mut().fail_present = true;
        let mut surface = MockSurface::new(1280, 720);

        let err = d.draw_frame(&mut surface).unwrap_err();

        assert!(matches!(err, FrameError::Present { .. }));
        assert_eq!(d.state(), FrameState::Submitted);
        assert_eq!(d.slot().index(), 0);
        assert_eq!(d.stats().presented, 0);
        assert_eq!(count(&log, |e| matches!(e, Ev::Rebuild(_))), 0);
    }

    #[test]
    fn overlay_is_published_the_initial_target() {
        let (mut d, _log) = driver(2);
        let retargets = &d.overlay_mut().retargets;
        assert_eq!(retargets.len(), 1);
        assert_eq!(retargets[0].generation, 0);
    }
}
