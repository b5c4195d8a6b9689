// SPDX-License-Identifier: CEPL-1.0
use crate::FrameSlot;
use thiserror::Error;

/// Unrecoverable failures of the frame loop. Out-of-date, suboptimal and
/// zero-size conditions are absorbed by the driver and never show up here.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("backend reports zero frames in flight")]
    NoFramesInFlight,
    #[error("waiting on the in-flight fence of {slot} failed")]
    FenceWait {
        slot: FrameSlot,
        #[source]
        source: anyhow::Error,
    },
    #[error("resetting the in-flight fence of {slot} failed")]
    FenceReset {
        slot: FrameSlot,
        #[source]
        source: anyhow::Error,
    },
    #[error("acquiring a swapchain image for {slot} failed")]
    Acquire {
        slot: FrameSlot,
        #[source]
        source: anyhow::Error,
    },
    #[error("recording commands for {slot} failed")]
    Record {
        slot: FrameSlot,
        #[source]
        source: anyhow::Error,
    },
    #[error("submitting {slot} to the graphics queue failed")]
    Submit {
        slot: FrameSlot,
        #[source]
        source: anyhow::Error,
    },
    #[error("presenting {slot} failed")]
    Present {
        slot: FrameSlot,
        #[source]
        source: anyhow::Error,
    },
    #[error("waiting for device idle failed")]
    DeviceIdle(#[source] anyhow::Error),
    #[error("swapchain recreation failed")]
    Recreate(#[source] anyhow::Error),
}
