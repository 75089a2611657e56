/// CommandSubmissionUnit - one allocator, one recorder, one direct queue.

use crate::error::Result;
use crate::graphics_device::{
    CommandAllocator, CommandList, CommandListKind, CommandQueue, CommandQueueDesc, GraphicsDevice,
};
use crate::qf_debug;

const SOURCE: &str = "quadframe::CommandSubmission";

pub struct CommandSubmissionUnit {
    // Drop order: the recorder before the allocator backing it
    list: Box<dyn CommandList>,
    allocator: Box<dyn CommandAllocator>,
    queue: Box<dyn CommandQueue>,
}

impl CommandSubmissionUnit {
    /// Create the allocator, a recorder bound to it (recording) and a
    /// direct queue with default flags, normal priority and node 0
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self> {
        let allocator = device.create_command_allocator(CommandListKind::Direct)?;
        let list = device.create_command_list(CommandListKind::Direct, &*allocator, None)?;
        let queue = device.create_command_queue(&CommandQueueDesc::default())?;

        qf_debug!(SOURCE, "Direct allocator, recorder and queue created");
        Ok(Self { list, allocator, queue })
    }

    /// Reset the allocator, then the recorder against it
    ///
    /// The GPU must have finished every submission recorded since the last
    /// reset; the caller guarantees this with a fence wait.
    pub fn reset(&mut self) -> Result<()> {
        self.allocator.reset()?;
        self.list.reset(&*self.allocator, None)
    }

    /// Recorder for the current frame
    pub fn recorder_mut(&mut self) -> &mut dyn CommandList {
        &mut *self.list
    }

    pub fn recorder(&self) -> &dyn CommandList {
        &*self.list
    }

    pub fn queue(&self) -> &dyn CommandQueue {
        &*self.queue
    }

    /// Close the recorder and submit it as the only list
    pub fn close_and_execute(&mut self) -> Result<()> {
        self.list.close()?;
        self.queue.execute_command_lists(&[&*self.list])
    }
}

#[cfg(test)]
#[path = "command_submission_tests.rs"]
mod tests;
