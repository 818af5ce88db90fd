// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command pools: recyclable storage for command list streams.

use super::api::command::{CommandListKind, CommandListState, CommandStream};

#[derive(Debug, Default)]
struct PoolEntry {
    state: CommandListState,
    /// `None` while the stream is checked out by a recording list.
    stream: Option<CommandStream>,
}

/// A stream checked out of a pool for one recording.
#[derive(Debug)]
pub struct PoolAllocation {
    /// Entry the stream belongs to.
    pub entry: usize,
    /// Pool epoch at allocation time.
    pub epoch: u64,
    /// The (empty) stream to record into.
    pub stream: CommandStream,
}

/// Owns the command streams of one frame slot or transfer context.
///
/// Lists move `Free → Recording → Closed/Submitted`; [`reset`](Self::reset)
/// returns every list to `Free`. A reset bumps the pool epoch, so a list that
/// was still recording across a reset can no longer be handed back.
#[derive(Debug)]
pub struct CommandPool {
    kind: CommandListKind,
    entries: Vec<PoolEntry>,
    epoch: u64,
}

impl CommandPool {
    /// Creates an empty pool for lists of `kind`.
    pub fn new(kind: CommandListKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            epoch: 0,
        }
    }

    /// Kind of the lists this pool hands out.
    pub fn kind(&self) -> CommandListKind {
        self.kind
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Checks out a free stream, creating an entry if none is free.
    pub fn allocate(&mut self) -> PoolAllocation {
        let index = match self
            .entries
            .iter()
            .position(|e| e.state == CommandListState::Free && e.stream.is_some())
        {
            Some(index) => index,
            None => {
                self.entries.push(PoolEntry {
                    state: CommandListState::Free,
                    stream: Some(CommandStream::new()),
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[index];
        entry.state = CommandListState::Recording;
        let mut stream = entry.stream.take().unwrap_or_default();
        stream.clear();
        PoolAllocation {
            entry: index,
            epoch: self.epoch,
            stream,
        }
    }

    /// Returns a checked-out stream with the list's final state.
    ///
    /// `Free` marks an abandoned recording. Returns `false` (and drops the
    /// stream) if the pool was reset since the allocation.
    pub fn give_back(
        &mut self,
        entry: usize,
        epoch: u64,
        stream: CommandStream,
        state: CommandListState,
    ) -> bool {
        if epoch != self.epoch {
            log::debug!(
                "CommandPool: dropping stream of entry {entry} from stale epoch {epoch} (now {})",
                self.epoch
            );
            return false;
        }
        match self.entries.get_mut(entry) {
            Some(slot) if slot.stream.is_none() => {
                slot.state = state;
                slot.stream = Some(stream);
                true
            }
            _ => {
                log::warn!("CommandPool: entry {entry} was not checked out");
                false
            }
        }
    }

    /// State of entry `entry`.
    pub fn state(&self, entry: usize) -> Option<CommandListState> {
        self.entries.get(entry).map(|e| e.state)
    }

    /// Number of entries ever created.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the pool has no entry yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recycles every list for the next use.
    pub fn reset(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.state == CommandListState::Recording {
                log::warn!("CommandPool: resetting entry {index} while it is still recording");
            }
            entry.state = CommandListState::Free;
            match entry.stream.as_mut() {
                Some(stream) => stream.clear(),
                None => entry.stream = Some(CommandStream::new()),
            }
        }
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::api::command::{RecordedCommand, ScissorRect};

    #[test]
    fn list_lifecycle() {
        let mut pool = CommandPool::new(CommandListKind::Graphics);
        let mut alloc = pool.allocate();
        assert_eq!(pool.state(alloc.entry), Some(CommandListState::Recording));

        alloc
            .stream
            .push(RecordedCommand::SetScissor(ScissorRect::full(4, 4)));
        assert!(pool.give_back(
            alloc.entry,
            alloc.epoch,
            alloc.stream,
            CommandListState::Submitted
        ));
        assert_eq!(pool.state(alloc.entry), Some(CommandListState::Submitted));

        pool.reset();
        assert_eq!(pool.state(alloc.entry), Some(CommandListState::Free));

        let again = pool.allocate();
        assert_eq!(again.entry, alloc.entry);
        assert!(again.stream.is_empty());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn submitted_lists_are_not_reused_before_reset() {
        let mut pool = CommandPool::new(CommandListKind::Transfer);
        let first = pool.allocate();
        pool.give_back(first.entry, first.epoch, first.stream, CommandListState::Submitted);

        let second = pool.allocate();
        assert_ne!(second.entry, first.entry);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn stale_epoch_is_refused() {
        let mut pool = CommandPool::new(CommandListKind::Graphics);
        let alloc = pool.allocate();
        pool.reset();
        assert!(!pool.give_back(
            alloc.entry,
            alloc.epoch,
            alloc.stream,
            CommandListState::Submitted
        ));
        assert_eq!(pool.state(alloc.entry), Some(CommandListState::Free));
    }
}
